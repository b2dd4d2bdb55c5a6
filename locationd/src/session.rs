//! Per-client session: three independently toggled update streams bound to
//! a provider selection.

use crate::engine::ProviderSelection;
use crate::observable::{Connection, Property, Signal};
use crate::provider::{Provider, ProviderError};

use location_types::{Heading, Position, Update, Velocity};

use std::sync::{Arc, Weak};

use tracing::warn;

/// Whether a session wants a given update kind delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatesStatus {
    #[default]
    Disabled,
    Enabled,
}

/// The observable session surface: one signal and one toggle per kind.
#[derive(Debug, Default)]
pub struct SessionUpdates {
    pub position: Signal<Update<Position>>,
    pub position_status: Property<UpdatesStatus>,
    pub heading: Signal<Update<Heading>>,
    pub heading_status: Property<UpdatesStatus>,
    pub velocity: Signal<Update<Velocity>>,
    pub velocity_status: Property<UpdatesStatus>,
}

/// A client's session.
///
/// While a kind's toggle is disabled, provider updates of that kind are
/// dropped, not queued; enabling delivers the next update onwards. Dropping
/// the session releases every activation it contributed.
pub struct Session {
    selection: ProviderSelection,
    updates: SessionUpdates,
    // Provider-side subscriptions live exactly as long as the session.
    _connections: Vec<Connection>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("selection", &self.selection)
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(selection: ProviderSelection) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Session>| {
            let mut connections = Vec::with_capacity(3);

            let session = weak.clone();
            connections.push(selection.position_updates.updates().position.connect(
                move |update| {
                    if let Some(session) = session.upgrade() {
                        if session.updates.position_status.get() == UpdatesStatus::Enabled {
                            session.updates.position.emit(update);
                        }
                    }
                },
            ));

            let session = weak.clone();
            connections.push(selection.heading_updates.updates().heading.connect(
                move |update| {
                    if let Some(session) = session.upgrade() {
                        if session.updates.heading_status.get() == UpdatesStatus::Enabled {
                            session.updates.heading.emit(update);
                        }
                    }
                },
            ));

            let session = weak.clone();
            connections.push(selection.velocity_updates.updates().velocity.connect(
                move |update| {
                    if let Some(session) = session.upgrade() {
                        if session.updates.velocity_status.get() == UpdatesStatus::Enabled {
                            session.updates.velocity.emit(update);
                        }
                    }
                },
            ));

            Self {
                selection,
                updates: SessionUpdates::default(),
                _connections: connections,
            }
        })
    }

    pub fn updates(&self) -> &SessionUpdates {
        &self.updates
    }

    pub fn start_position_updates(&self) -> Result<(), ProviderError> {
        if self.updates.position_status.get() == UpdatesStatus::Enabled {
            return Ok(());
        }
        self.selection.position_updates.start_position_updates()?;
        self.updates.position_status.set(UpdatesStatus::Enabled);
        Ok(())
    }

    pub fn stop_position_updates(&self) -> Result<(), ProviderError> {
        if self.updates.position_status.get() == UpdatesStatus::Disabled {
            return Ok(());
        }
        self.updates.position_status.set(UpdatesStatus::Disabled);
        self.selection.position_updates.stop_position_updates()
    }

    pub fn start_heading_updates(&self) -> Result<(), ProviderError> {
        if self.updates.heading_status.get() == UpdatesStatus::Enabled {
            return Ok(());
        }
        self.selection.heading_updates.start_heading_updates()?;
        self.updates.heading_status.set(UpdatesStatus::Enabled);
        Ok(())
    }

    pub fn stop_heading_updates(&self) -> Result<(), ProviderError> {
        if self.updates.heading_status.get() == UpdatesStatus::Disabled {
            return Ok(());
        }
        self.updates.heading_status.set(UpdatesStatus::Disabled);
        self.selection.heading_updates.stop_heading_updates()
    }

    pub fn start_velocity_updates(&self) -> Result<(), ProviderError> {
        if self.updates.velocity_status.get() == UpdatesStatus::Enabled {
            return Ok(());
        }
        self.selection.velocity_updates.start_velocity_updates()?;
        self.updates.velocity_status.set(UpdatesStatus::Enabled);
        Ok(())
    }

    pub fn stop_velocity_updates(&self) -> Result<(), ProviderError> {
        if self.updates.velocity_status.get() == UpdatesStatus::Disabled {
            return Ok(());
        }
        self.updates.velocity_status.set(UpdatesStatus::Disabled);
        self.selection.velocity_updates.stop_velocity_updates()
    }

    /// True while any kind holds an activation on the selection.
    pub fn is_active(&self) -> bool {
        self.updates.position_status.get() == UpdatesStatus::Enabled
            || self.updates.heading_status.get() == UpdatesStatus::Enabled
            || self.updates.velocity_status.get() == UpdatesStatus::Enabled
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Enabled toggles are treated as disabling transitions so that the
        // session's activation contributions are released.
        if self.updates.position_status.get() == UpdatesStatus::Enabled {
            if let Err(e) = self.selection.position_updates.stop_position_updates() {
                warn!("releasing position activation failed: {e}");
            }
        }
        if self.updates.heading_status.get() == UpdatesStatus::Enabled {
            if let Err(e) = self.selection.heading_updates.stop_heading_updates() {
                warn!("releasing heading activation failed: {e}");
            }
        }
        if self.updates.velocity_status.get() == UpdatesStatus::Enabled {
            if let Err(e) = self.selection.velocity_updates.stop_velocity_updates() {
                warn!("releasing velocity activation failed: {e}");
            }
        }
    }
}
