//! The provider abstraction: a positioning source with a coarse enable gate,
//! a fine activation gate and three observable update streams.

use crate::events::Event;
use crate::observable::Signal;

use location_types::{Criteria, Heading, Position, SpaceVehicle, Update, Velocity};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

bitflags::bitflags! {
    /// System resources a provider relies on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Requirements: u8 {
        const SATELLITES = 1 << 0;
        const CELL_NETWORK = 1 << 1;
        const DATA_NETWORK = 1 << 2;
        const MONETARY_SPENDING = 1 << 3;
    }
}

/// Lifecycle states of a state-tracked provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Disabled,
    Enabled,
    Active,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Disabled => write!(f, "disabled"),
            State::Enabled => write!(f, "enabled"),
            State::Active => write!(f, "active"),
        }
    }
}

/// Failures surfaced by provider lifecycle operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: State, to: State },
    #[error("deactivate without a matching activate")]
    UnmatchedDeactivate,
    #[error("disable without a matching enable")]
    UnmatchedDisable,
    #[error("provider failed: {0}")]
    Failed(String),
}

/// Identity of a provider instance, stable for the life of the process.
///
/// Fusion's source comparison uses this strong identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    pub fn allocate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The three update streams plus satellite visibility.
#[derive(Debug, Default)]
pub struct UpdateSignals {
    pub position: Signal<Update<Position>>,
    pub heading: Signal<Update<Heading>>,
    pub velocity: Signal<Update<Velocity>>,
    pub space_vehicles: Signal<Update<Vec<SpaceVehicle>>>,
}

impl UpdateSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An abstract positioning source.
///
/// Implementations must tolerate repeated lifecycle calls with idempotent
/// effect on external state; reference counting of nested requests is the
/// business of [`StateTrackingProvider`](crate::providers::StateTrackingProvider).
/// Updates may be emitted only while enabled or active.
pub trait Provider: Send + Sync {
    /// Stable identity of this provider instance.
    fn id(&self) -> ProviderId;

    fn enable(&self) -> Result<(), ProviderError>;
    fn disable(&self) -> Result<(), ProviderError>;
    fn activate(&self) -> Result<(), ProviderError>;
    fn deactivate(&self) -> Result<(), ProviderError>;

    fn requirements(&self) -> Requirements;
    fn satisfies(&self, criteria: &Criteria) -> bool;

    /// Receives system events (reference position, reporting state).
    fn on_new_event(&self, event: &Event);

    fn updates(&self) -> &UpdateSignals;
}

pub type ProviderHandle = Arc<dyn Provider>;
