//! Provider implementations and wrappers.

pub mod dummy;
pub mod fusion;
pub mod gnss;
pub mod state_tracking;

pub use fusion::{FusionProvider, NewerOrMoreAccurateSelector, NewerSelector, UpdateSelector};
pub use state_tracking::StateTrackingProvider;

use crate::provider::ProviderHandle;

use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

/// Builds a provider from daemon configuration.
pub type Factory = fn() -> anyhow::Result<ProviderHandle>;

/// Name → factory map backing the `list` and `provider` commands.
#[derive(Default)]
pub struct Registry {
    factories: Mutex<BTreeMap<&'static str, Factory>>,
}

impl Registry {
    pub fn instance() -> &'static Registry {
        static INSTANCE: OnceLock<Registry> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            let registry = Registry::default();
            registry.add("dummy::Provider", dummy::create_for_registry);
            registry.add("gps::Provider", gnss::create_for_registry);
            registry
        })
    }

    pub fn add(&self, name: &'static str, factory: Factory) {
        self.factories
            .lock()
            .expect("provider registry poisoned")
            .insert(name, factory);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories
            .lock()
            .expect("provider registry poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn create(&self, name: &str) -> Option<anyhow::Result<ProviderHandle>> {
        let factory = *self
            .factories
            .lock()
            .expect("provider registry poisoned")
            .get(name)?;
        Some(factory())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_in_tree_providers() {
        let names = Registry::instance().names();
        assert!(names.contains(&"dummy::Provider"));
        assert!(names.contains(&"gps::Provider"));
    }

    #[test]
    fn unknown_provider_name_yields_none() {
        assert!(Registry::instance().create("no-such::Provider").is_none());
    }
}
