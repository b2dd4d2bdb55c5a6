//! A deterministic provider for tests and runtime diagnostics.

use crate::events::Event;
use crate::provider::{
    Provider, ProviderError, ProviderHandle, ProviderId, Requirements, UpdateSignals,
};

use location_types::{
    Criteria, Degrees, Heading, Meters, MetersPerSecond, Position, Update, Velocity,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// What the dummy emits every period while active.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub update_period: Duration,
    pub reference_position: Position,
    pub reference_heading: Heading,
    pub reference_velocity: Velocity,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            update_period: Duration::from_millis(100),
            reference_position: Position::new(Degrees(51.0), Degrees(7.0))
                .expect("static coordinates are in range")
                .with_horizontal_accuracy(Meters(25.0)),
            reference_heading: Heading::new(Degrees(0.0))
                .expect("static heading is in range"),
            reference_velocity: Velocity::new(MetersPerSecond(0.0))
                .expect("static velocity is non-negative"),
        }
    }
}

/// Emits the configured reference values on a fixed period while active.
pub struct DummyProvider {
    id: ProviderId,
    configuration: Configuration,
    updates: Arc<UpdateSignals>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DummyProvider {
    pub fn new(configuration: Configuration) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::allocate(),
            configuration,
            updates: Arc::new(UpdateSignals::new()),
            worker: Mutex::new(None),
        })
    }
}

/// Registry hook.
pub fn create_for_registry() -> anyhow::Result<ProviderHandle> {
    Ok(DummyProvider::new(Configuration::default()))
}

impl Provider for DummyProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn enable(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn disable(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn activate(&self) -> Result<(), ProviderError> {
        let mut worker = self.worker.lock().expect("dummy worker slot poisoned");
        if worker.is_some() {
            return Ok(());
        }
        let updates = self.updates.clone();
        let configuration = self.configuration.clone();
        *worker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(configuration.update_period);
            loop {
                ticker.tick().await;
                updates
                    .position
                    .emit(&Update::new(configuration.reference_position));
                updates
                    .heading
                    .emit(&Update::new(configuration.reference_heading));
                updates
                    .velocity
                    .emit(&Update::new(configuration.reference_velocity));
            }
        }));
        debug!("dummy provider activated");
        Ok(())
    }

    fn deactivate(&self) -> Result<(), ProviderError> {
        if let Some(worker) = self
            .worker
            .lock()
            .expect("dummy worker slot poisoned")
            .take()
        {
            worker.abort();
        }
        debug!("dummy provider deactivated");
        Ok(())
    }

    fn requirements(&self) -> Requirements {
        Requirements::empty()
    }

    fn satisfies(&self, _criteria: &Criteria) -> bool {
        true
    }

    fn on_new_event(&self, _event: &Event) {}

    fn updates(&self) -> &UpdateSignals {
        &self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emits_updates_only_while_active() {
        let provider = DummyProvider::new(Configuration {
            update_period: Duration::from_millis(10),
            ..Configuration::default()
        });

        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        let _c = provider.updates().position.connect(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        provider.enable().unwrap();
        provider.activate().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        provider.deactivate().unwrap();

        let after_deactivate = count.load(Ordering::SeqCst);
        assert!(after_deactivate > 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_deactivate);
    }
}
