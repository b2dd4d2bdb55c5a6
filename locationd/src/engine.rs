//! The positioning engine: provider set, process-wide configuration and
//! selection policies.

use crate::bus::Bus;
use crate::events::Event;
use crate::observable::{Connection, Property};
use crate::provider::{Provider, ProviderError, ProviderHandle, ProviderId};
use crate::providers::{
    FusionProvider, NewerOrMoreAccurateSelector, NewerSelector, StateTrackingProvider,
};
use crate::state::{EngineStatus, SatelliteBasedPositioningState, WifiAndCellIdReportingState};

use location_types::{Criteria, Position, SpaceVehicle, SpaceVehicleKey, Update};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;

/// One provider per update kind, as picked by a selection policy.
#[derive(Clone)]
pub struct ProviderSelection {
    pub position_updates: Arc<StateTrackingProvider>,
    pub heading_updates: Arc<StateTrackingProvider>,
    pub velocity_updates: Arc<StateTrackingProvider>,
}

impl std::fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSelection").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("no provider satisfies the given criteria")]
    NoProviderForCriteria,
    #[error(transparent)]
    Lifecycle(#[from] ProviderError),
}

/// Picks providers for a session's criteria.
pub trait ProviderSelectionPolicy: Send + Sync {
    fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
        engine: &Engine,
    ) -> Result<ProviderSelection, SelectionError>;
}

/// Wraps all satisfying providers in one fusion provider per session. The
/// default policy.
#[derive(Debug, Default)]
pub struct FusionProviderSelectionPolicy;

impl ProviderSelectionPolicy for FusionProviderSelectionPolicy {
    fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
        engine: &Engine,
    ) -> Result<ProviderSelection, SelectionError> {
        let candidates = engine.providers_satisfying(criteria);
        if candidates.is_empty() {
            return Err(SelectionError::NoProviderForCriteria);
        }
        let fused = FusionProvider::new(candidates, Arc::new(NewerOrMoreAccurateSelector));
        let tracked = StateTrackingProvider::new(fused);
        tracked.enable()?;
        Ok(ProviderSelection {
            position_updates: tracked.clone(),
            heading_updates: tracked.clone(),
            velocity_updates: tracked,
        })
    }
}

/// No selection at all: every provider feeds every kind, every update is
/// passed through.
#[derive(Debug, Default)]
pub struct NonSelectingProviderSelectionPolicy;

impl ProviderSelectionPolicy for NonSelectingProviderSelectionPolicy {
    fn determine_provider_selection_for_criteria(
        &self,
        _criteria: &Criteria,
        engine: &Engine,
    ) -> Result<ProviderSelection, SelectionError> {
        let all = engine.provider_handles();
        if all.is_empty() {
            return Err(SelectionError::NoProviderForCriteria);
        }
        let multiplexed = FusionProvider::new(all, Arc::new(NewerSelector));
        let tracked = StateTrackingProvider::new(multiplexed);
        tracked.enable()?;
        Ok(ProviderSelection {
            position_updates: tracked.clone(),
            heading_updates: tracked.clone(),
            velocity_updates: tracked,
        })
    }
}

/// The engine's observable configuration record.
#[derive(Debug)]
pub struct Configuration {
    pub engine_state: Property<EngineStatus>,
    pub satellite_based_positioning_state: Property<SatelliteBasedPositioningState>,
    pub wifi_and_cell_id_reporting_state: Property<WifiAndCellIdReportingState>,
    pub reference_location: Property<Option<Update<Position>>>,
    pub visible_space_vehicles: Property<BTreeMap<SpaceVehicleKey, SpaceVehicle>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            engine_state: Property::new(EngineStatus::On),
            satellite_based_positioning_state: Property::new(SatelliteBasedPositioningState::On),
            wifi_and_cell_id_reporting_state: Property::new(WifiAndCellIdReportingState::Off),
            reference_location: Property::new(None),
            visible_space_vehicles: Property::new(BTreeMap::new()),
        }
    }
}

struct ProviderEntry {
    provider: Arc<StateTrackingProvider>,
    // Dropping these unwires reference-position, reporting-state and
    // visibility in one go.
    _connections: Vec<Connection>,
}

/// Holds the provider set, the configuration record and the selection
/// policy. Thread-safe; iteration works on snapshots.
pub struct Engine {
    providers: Mutex<Vec<ProviderEntry>>,
    configuration: Arc<Configuration>,
    selection_policy: Arc<dyn ProviderSelectionPolicy>,
    bus: Arc<dyn Bus>,
}

impl Engine {
    pub fn new(selection_policy: Arc<dyn ProviderSelectionPolicy>, bus: Arc<dyn Bus>) -> Arc<Self> {
        Arc::new(Self {
            providers: Mutex::new(Vec::new()),
            configuration: Arc::new(Configuration::default()),
            selection_policy,
            bus,
        })
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Registers a provider, wiring configuration changes to it and its
    /// satellite visibility back into the configuration. Returns the
    /// state-tracked wrapper shared with sessions.
    pub fn add_provider(&self, provider: ProviderHandle) -> Arc<StateTrackingProvider> {
        let tracked = StateTrackingProvider::new(provider);

        if self.configuration.engine_state.get() == EngineStatus::On {
            if let Err(e) = tracked.enable() {
                warn!("freshly added provider refused to enable: {e}");
            }
        }

        let mut connections = Vec::with_capacity(3);

        let subscriber = tracked.clone();
        connections.push(self.configuration.reference_location.changed().connect(
            move |update: &Option<Update<Position>>| {
                if let Some(update) = update {
                    subscriber.on_new_event(&Event::ReferencePositionUpdated(*update));
                }
            },
        ));

        let subscriber = tracked.clone();
        connections.push(
            self.configuration
                .wifi_and_cell_id_reporting_state
                .changed()
                .connect(move |state: &WifiAndCellIdReportingState| {
                    subscriber.on_new_event(&Event::WifiAndCellIdReportingStateChanged(*state));
                }),
        );

        let visibility = self.configuration.clone();
        connections.push(tracked.updates().space_vehicles.connect(
            move |update: &Update<Vec<SpaceVehicle>>| {
                let incoming = update.value.clone();
                visibility.visible_space_vehicles.update(move |map| {
                    let mut changed = false;
                    for sv in &incoming {
                        if map.insert(sv.key, *sv) != Some(*sv) {
                            changed = true;
                        }
                    }
                    changed
                });
            },
        ));

        self.providers
            .lock()
            .expect("engine provider set poisoned")
            .push(ProviderEntry {
                provider: tracked.clone(),
                _connections: connections,
            });
        tracked
    }

    /// Unregisters a provider, tearing down all three wirings.
    pub fn remove_provider(&self, id: ProviderId) {
        self.providers
            .lock()
            .expect("engine provider set poisoned")
            .retain(|entry| entry.provider.id() != id);
    }

    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.providers
            .lock()
            .expect("engine provider set poisoned")
            .iter()
            .any(|entry| entry.provider.id() == id)
    }

    /// Visits a snapshot of the providers in insertion order.
    pub fn for_each_provider(&self, mut visit: impl FnMut(&Arc<StateTrackingProvider>)) {
        for provider in self.snapshot() {
            visit(&provider);
        }
    }

    fn snapshot(&self) -> Vec<Arc<StateTrackingProvider>> {
        self.providers
            .lock()
            .expect("engine provider set poisoned")
            .iter()
            .map(|entry| entry.provider.clone())
            .collect()
    }

    pub(crate) fn provider_handles(&self) -> Vec<ProviderHandle> {
        self.snapshot()
            .into_iter()
            .map(|p| p as ProviderHandle)
            .collect()
    }

    pub(crate) fn providers_satisfying(&self, criteria: &Criteria) -> Vec<ProviderHandle> {
        self.snapshot()
            .into_iter()
            .filter(|p| p.satisfies(criteria))
            .map(|p| p as ProviderHandle)
            .collect()
    }

    pub fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
    ) -> Result<ProviderSelection, SelectionError> {
        self.selection_policy
            .determine_provider_selection_for_criteria(criteria, self)
    }

    // ── Configuration mutations ──────────────────────────────────────────────

    /// Publishes a new process-wide reference position to providers (via
    /// their event slots) and the bus (for the harvester).
    pub fn update_reference_location(&self, update: Update<Position>) {
        if self.configuration.reference_location.set(Some(update)) {
            self.bus.push(Event::ReferencePositionUpdated(update));
        }
    }

    pub fn set_wifi_and_cell_id_reporting_state(&self, state: WifiAndCellIdReportingState) {
        if self.configuration.wifi_and_cell_id_reporting_state.set(state) {
            self.bus
                .push(Event::WifiAndCellIdReportingStateChanged(state));
        }
    }

    pub fn set_satellite_based_positioning_state(&self, state: SatelliteBasedPositioningState) {
        self.configuration
            .satellite_based_positioning_state
            .set(state);
    }

    /// Turning the engine off forces every provider down while preserving
    /// session activation counts; turning it back on restores them.
    pub fn set_engine_state(&self, state: EngineStatus) {
        if !self.configuration.engine_state.set(state) {
            return;
        }
        for provider in self.snapshot() {
            let result = match state {
                EngineStatus::Off => provider.suspend(),
                EngineStatus::On => provider.resume(),
            };
            if let Err(e) = result {
                warn!("provider refused {state:?} transition: {e}");
            }
        }
    }
}
