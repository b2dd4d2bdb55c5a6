//! Lifecycle enforcement and reference-counted activation.

use crate::events::Event;
use crate::observable::Property;
use crate::provider::{
    Provider, ProviderError, ProviderHandle, ProviderId, Requirements, State, UpdateSignals,
};

use location_types::Criteria;

use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Counters {
    enable_count: usize,
    activation_count: usize,
    suspended: bool,
}

/// Wraps any provider with the `disabled → enabled ↔ active` state machine.
///
/// N nested `enable()`/`activate()` requests reach the wrapped provider
/// exactly once; only the final matching `disable()`/`deactivate()`
/// transitions back. Multiple sessions sharing one provider rely on this.
pub struct StateTrackingProvider {
    inner: ProviderHandle,
    guard: Mutex<Counters>,
    state: Property<State>,
}

impl StateTrackingProvider {
    pub fn new(inner: ProviderHandle) -> Arc<Self> {
        Arc::new(Self {
            inner,
            guard: Mutex::new(Counters::default()),
            state: Property::new(State::Disabled),
        })
    }

    /// The current lifecycle state, observable.
    pub fn state(&self) -> &Property<State> {
        &self.state
    }

    // Per-kind start/stop used by sessions; every kind holds one activation
    // reference while its updates are enabled.

    pub fn start_position_updates(&self) -> Result<(), ProviderError> {
        self.activate()
    }

    pub fn stop_position_updates(&self) -> Result<(), ProviderError> {
        self.deactivate()
    }

    pub fn start_heading_updates(&self) -> Result<(), ProviderError> {
        self.activate()
    }

    pub fn stop_heading_updates(&self) -> Result<(), ProviderError> {
        self.deactivate()
    }

    pub fn start_velocity_updates(&self) -> Result<(), ProviderError> {
        self.activate()
    }

    pub fn stop_velocity_updates(&self) -> Result<(), ProviderError> {
        self.deactivate()
    }

    /// Forces the wrapped provider down without touching the reference
    /// counts. Used when the engine is switched off while sessions still
    /// hold activations.
    pub fn suspend(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if counters.suspended {
            return Ok(());
        }
        if counters.activation_count > 0 {
            self.inner.deactivate()?;
        }
        if counters.enable_count > 0 {
            self.inner.disable()?;
        }
        counters.suspended = true;
        self.state.set(State::Disabled);
        Ok(())
    }

    /// Restores the state the reference counts imply after a `suspend`.
    pub fn resume(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if !counters.suspended {
            return Ok(());
        }
        if counters.enable_count > 0 {
            self.inner.enable()?;
            self.state.set(State::Enabled);
        }
        if counters.activation_count > 0 {
            self.inner.activate()?;
            self.state.set(State::Active);
        }
        counters.suspended = false;
        Ok(())
    }
}

impl Provider for StateTrackingProvider {
    fn id(&self) -> ProviderId {
        // Identity is the wrapped provider's: fusion's same-source rule must
        // hold across wrapping.
        self.inner.id()
    }

    fn enable(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if counters.enable_count == 0 && !counters.suspended {
            self.inner.enable()?;
            self.state.set(State::Enabled);
        }
        counters.enable_count += 1;
        Ok(())
    }

    fn disable(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if counters.enable_count == 0 {
            return Err(ProviderError::UnmatchedDisable);
        }
        if counters.activation_count > 0 {
            return Err(ProviderError::InvalidStateTransition {
                from: State::Active,
                to: State::Disabled,
            });
        }
        counters.enable_count -= 1;
        if counters.enable_count == 0 && !counters.suspended {
            self.inner.disable()?;
            self.state.set(State::Disabled);
        }
        Ok(())
    }

    fn activate(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if counters.enable_count == 0 {
            return Err(ProviderError::InvalidStateTransition {
                from: State::Disabled,
                to: State::Active,
            });
        }
        if counters.activation_count == 0 && !counters.suspended {
            self.inner.activate()?;
            self.state.set(State::Active);
        }
        counters.activation_count += 1;
        Ok(())
    }

    fn deactivate(&self) -> Result<(), ProviderError> {
        let mut counters = self.guard.lock().expect("state tracking guard poisoned");
        if counters.activation_count == 0 {
            return Err(ProviderError::UnmatchedDeactivate);
        }
        counters.activation_count -= 1;
        if counters.activation_count == 0 && !counters.suspended {
            self.inner.deactivate()?;
            self.state.set(State::Enabled);
        }
        Ok(())
    }

    fn requirements(&self) -> Requirements {
        self.inner.requirements()
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        self.inner.satisfies(criteria)
    }

    fn on_new_event(&self, event: &Event) {
        self.inner.on_new_event(event);
    }

    fn updates(&self) -> &UpdateSignals {
        self.inner.updates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::StubProvider;
    use std::sync::atomic::Ordering;

    #[test]
    fn nested_activations_reach_the_provider_once() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());

        tracked.enable().unwrap();
        for _ in 0..4 {
            tracked.activate().unwrap();
        }
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 1);
        assert_eq!(tracked.state().get(), State::Active);

        for _ in 0..3 {
            tracked.deactivate().unwrap();
        }
        assert_eq!(stub.calls.deactivate.load(Ordering::SeqCst), 0);
        assert_eq!(tracked.state().get(), State::Active);

        tracked.deactivate().unwrap();
        assert_eq!(stub.calls.deactivate.load(Ordering::SeqCst), 1);
        assert_eq!(tracked.state().get(), State::Enabled);
    }

    #[test]
    fn nested_enables_reach_the_provider_once() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());

        tracked.enable().unwrap();
        tracked.enable().unwrap();
        assert_eq!(stub.calls.enable.load(Ordering::SeqCst), 1);

        tracked.disable().unwrap();
        assert_eq!(stub.calls.disable.load(Ordering::SeqCst), 0);
        tracked.disable().unwrap();
        assert_eq!(stub.calls.disable.load(Ordering::SeqCst), 1);
        assert_eq!(tracked.state().get(), State::Disabled);
    }

    #[test]
    fn activate_while_disabled_is_rejected() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());

        assert_eq!(
            tracked.activate(),
            Err(ProviderError::InvalidStateTransition {
                from: State::Disabled,
                to: State::Active,
            })
        );
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 0);
        assert_eq!(tracked.state().get(), State::Disabled);
    }

    #[test]
    fn disable_while_active_is_rejected() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());
        tracked.enable().unwrap();
        tracked.activate().unwrap();

        assert_eq!(
            tracked.disable(),
            Err(ProviderError::InvalidStateTransition {
                from: State::Active,
                to: State::Disabled,
            })
        );
        assert_eq!(tracked.state().get(), State::Active);
    }

    #[test]
    fn unmatched_deactivate_is_an_error() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());
        tracked.enable().unwrap();

        assert_eq!(tracked.deactivate(), Err(ProviderError::UnmatchedDeactivate));
        assert_eq!(tracked.disable(), Ok(()));
        assert_eq!(tracked.disable(), Err(ProviderError::UnmatchedDisable));
    }

    #[test]
    fn suspend_and_resume_preserve_reference_counts() {
        let stub = StubProvider::create();
        let tracked = StateTrackingProvider::new(stub.handle());
        tracked.enable().unwrap();
        tracked.activate().unwrap();
        tracked.activate().unwrap();

        tracked.suspend().unwrap();
        assert_eq!(stub.calls.deactivate.load(Ordering::SeqCst), 1);
        assert_eq!(stub.calls.disable.load(Ordering::SeqCst), 1);
        assert_eq!(tracked.state().get(), State::Disabled);

        tracked.resume().unwrap();
        assert_eq!(stub.calls.enable.load(Ordering::SeqCst), 2);
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 2);
        assert_eq!(tracked.state().get(), State::Active);

        // Counts were preserved: both deactivations are still owed.
        tracked.deactivate().unwrap();
        tracked.deactivate().unwrap();
        assert_eq!(stub.calls.deactivate.load(Ordering::SeqCst), 2);
        assert_eq!(tracked.state().get(), State::Enabled);
    }
}
