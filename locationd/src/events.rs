//! System events and the process-wide event type registry.

use crate::state::WifiAndCellIdReportingState;

use location_types::{Position, Update};

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// A system-wide event as carried by the bus.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    /// The process-wide best-known position changed.
    ReferencePositionUpdated(Update<Position>),
    /// The reporting policy toggle changed.
    WifiAndCellIdReportingStateChanged(WifiAndCellIdReportingState),
}

impl Event {
    /// The registered type of this event.
    pub fn event_type(&self) -> Type {
        match self {
            Event::ReferencePositionUpdated(_) => {
                Registry::instance().find_or_insert(REFERENCE_POSITION_UPDATED_NAME)
            }
            Event::WifiAndCellIdReportingStateChanged(_) => {
                Registry::instance().find_or_insert(WIFI_AND_CELL_ID_REPORTING_STATE_CHANGED_NAME)
            }
        }
    }
}

pub const REFERENCE_POSITION_UPDATED_NAME: &str = "reference-position-updated";
pub const WIFI_AND_CELL_ID_REPORTING_STATE_CHANGED_NAME: &str =
    "wifi-and-cell-id-reporting-state-changed";

/// A process-unique event type handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Type(usize);

impl Type {
    /// Types below this value are reserved.
    pub const FIRST_USER_DEFINED: Type = Type(64);

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Maps event names to stable [`Type`] values for the life of the process.
///
/// Registration is idempotent per name and thread-safe; the registry is made
/// explicit here rather than relying on static initialization order.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    name_to_type: HashMap<String, Type>,
    type_to_name: HashMap<Type, String>,
    counter: usize,
}

impl Registry {
    /// The process-wide registry.
    pub fn instance() -> &'static Registry {
        static INSTANCE: OnceLock<Registry> = OnceLock::new();
        INSTANCE.get_or_init(Registry::default)
    }

    /// Returns the type registered for `name`, registering it first if
    /// needed. Repeated registration yields the same type.
    pub fn find_or_insert(&self, name: &str) -> Type {
        let mut inner = self.inner.lock().expect("event registry poisoned");
        if let Some(existing) = inner.name_to_type.get(name) {
            return *existing;
        }
        let assigned = Type(Type::FIRST_USER_DEFINED.0 + inner.counter);
        inner.counter += 1;
        inner.name_to_type.insert(name.to_string(), assigned);
        inner.type_to_name.insert(assigned, name.to_string());
        assigned
    }

    /// Looks up the name a type was registered under.
    pub fn find_name(&self, event_type: Type) -> Option<String> {
        let inner = self.inner.lock().expect("event registry poisoned");
        inner.type_to_name.get(&event_type).cloned()
    }

    /// Looks up a type without registering.
    pub fn find_type(&self, name: &str) -> Option<Type> {
        let inner = self.inner.lock().expect("event registry poisoned");
        inner.name_to_type.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_per_name() {
        let registry = Registry::default();
        let a = registry.find_or_insert("made-up-event");
        let b = registry.find_or_insert("made-up-event");
        assert_eq!(a, b);
        assert_eq!(registry.find_name(a).as_deref(), Some("made-up-event"));
    }

    #[test]
    fn distinct_names_get_distinct_types_at_or_above_the_floor() {
        let registry = Registry::default();
        let a = registry.find_or_insert("event-a");
        let b = registry.find_or_insert("event-b");
        assert_ne!(a, b);
        assert!(a >= Type::FIRST_USER_DEFINED);
        assert!(b >= Type::FIRST_USER_DEFINED);
    }

    #[test]
    fn registry_is_thread_safe() {
        let registry: &'static Registry = Registry::instance();
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(move || registry.find_or_insert("concurrent-event")))
            .collect();
        let types: Vec<Type> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(types.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn well_known_events_resolve_to_stable_types() {
        let position = Event::ReferencePositionUpdated(Update::new(
            location_types::Position::new(location_types::Degrees(0.0), location_types::Degrees(0.0))
                .unwrap(),
        ));
        let reporting =
            Event::WifiAndCellIdReportingStateChanged(WifiAndCellIdReportingState::On);
        assert_ne!(position.event_type(), reporting.event_type());
        assert_eq!(position.event_type(), position.event_type());
    }
}
