//! Aggregating many providers into one stream.
//!
//! Heading and velocity pass straight through; simultaneous position
//! sources are arbitrated by an [`UpdateSelector`] so the fused stream is
//! monotonically improving.

use crate::events::Event;
use crate::observable::Connection;
use crate::provider::{
    Provider, ProviderError, ProviderHandle, ProviderId, Requirements, UpdateSignals,
};

use location_types::{Criteria, Position, Update};

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// An update tagged with the identity of the provider that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithSource<T> {
    pub source: ProviderId,
    pub value: T,
}

/// Chooses between the last emitted position and an incoming candidate.
pub trait UpdateSelector: Send + Sync {
    fn select(
        &self,
        older: &WithSource<Update<Position>>,
        newer: &WithSource<Update<Position>>,
    ) -> WithSource<Update<Position>>;
}

/// Picks the incoming update iff it is newer, or more accurate, or from the
/// source already being followed.
#[derive(Debug, Default)]
pub struct NewerOrMoreAccurateSelector;

// Matches the cutoff the Android fusion provider settled on.
const CUTOFF: Duration = Duration::from_secs(11);

impl UpdateSelector for NewerOrMoreAccurateSelector {
    fn select(
        &self,
        older: &WithSource<Update<Position>>,
        newer: &WithSource<Update<Position>>,
    ) -> WithSource<Update<Position>> {
        // A source we already follow supersedes itself, regressions included.
        if newer.source == older.source {
            return *newer;
        }

        // Newer by a significant margin wins regardless of accuracy.
        if newer.value.when > older.value.when + CUTOFF {
            return *newer;
        }

        // Otherwise the smaller accuracy circle wins; ties keep the older.
        match (
            older.value.value.accuracy.horizontal,
            newer.value.value.accuracy.horizontal,
        ) {
            (None, _) => *newer,
            (Some(_), None) => *older,
            (Some(old_acc), Some(new_acc)) => {
                if new_acc < old_acc {
                    *newer
                } else {
                    *older
                }
            }
        }
    }
}

/// Always picks the incoming update; turns fusion into plain multiplexing.
#[derive(Debug, Default)]
pub struct NewerSelector;

impl UpdateSelector for NewerSelector {
    fn select(
        &self,
        _older: &WithSource<Update<Position>>,
        newer: &WithSource<Update<Position>>,
    ) -> WithSource<Update<Position>> {
        *newer
    }
}

/// The aggregate provider over a set of inner providers.
pub struct FusionProvider {
    id: ProviderId,
    providers: Vec<ProviderHandle>,
    selector: Arc<dyn UpdateSelector>,
    last_position: Mutex<Option<WithSource<Update<Position>>>>,
    updates: UpdateSignals,
    // Keeps the inner subscriptions alive for the provider's lifetime.
    _connections: Vec<Connection>,
}

impl FusionProvider {
    pub fn new(
        providers: Vec<ProviderHandle>,
        selector: Arc<dyn UpdateSelector>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<FusionProvider>| {
            let mut connections = Vec::with_capacity(providers.len() * 4);
            for provider in &providers {
                let source = provider.id();

                let fused = weak.clone();
                connections.push(provider.updates().position.connect(move |update| {
                    if let Some(fused) = fused.upgrade() {
                        fused.on_position_update(source, update);
                    }
                }));

                let fused = weak.clone();
                connections.push(provider.updates().heading.connect(move |update| {
                    if let Some(fused) = fused.upgrade() {
                        fused.updates.heading.emit(update);
                    }
                }));

                let fused = weak.clone();
                connections.push(provider.updates().velocity.connect(move |update| {
                    if let Some(fused) = fused.upgrade() {
                        fused.updates.velocity.emit(update);
                    }
                }));

                let fused = weak.clone();
                connections.push(provider.updates().space_vehicles.connect(move |update| {
                    if let Some(fused) = fused.upgrade() {
                        fused.updates.space_vehicles.emit(update);
                    }
                }));
            }

            Self {
                id: ProviderId::allocate(),
                providers,
                selector,
                last_position: Mutex::new(None),
                updates: UpdateSignals::new(),
                _connections: connections,
            }
        })
    }

    fn on_position_update(&self, source: ProviderId, update: &Update<Position>) {
        let candidate = WithSource {
            source,
            value: *update,
        };
        let chosen = {
            let mut last = self.last_position.lock().expect("fusion state poisoned");
            let chosen = match last.as_ref() {
                // The very first update is accepted unconditionally.
                None => candidate,
                Some(older) => self.selector.select(older, &candidate),
            };
            *last = Some(chosen);
            chosen
        };
        self.updates.position.emit(&chosen.value);
    }

    fn propagate(
        &self,
        operation: impl Fn(&ProviderHandle) -> Result<(), ProviderError>,
    ) -> Result<(), ProviderError> {
        for provider in &self.providers {
            operation(provider)?;
        }
        Ok(())
    }
}

impl Provider for FusionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn enable(&self) -> Result<(), ProviderError> {
        self.propagate(|p| p.enable())
    }

    fn disable(&self) -> Result<(), ProviderError> {
        self.propagate(|p| p.disable())
    }

    fn activate(&self) -> Result<(), ProviderError> {
        self.propagate(|p| p.activate())
    }

    fn deactivate(&self) -> Result<(), ProviderError> {
        self.propagate(|p| p.deactivate())
    }

    fn requirements(&self) -> Requirements {
        self.providers
            .iter()
            .fold(Requirements::empty(), |acc, p| acc | p.requirements())
    }

    fn satisfies(&self, criteria: &Criteria) -> bool {
        self.providers.iter().all(|p| p.satisfies(criteria))
    }

    fn on_new_event(&self, event: &Event) {
        for provider in &self.providers {
            provider.on_new_event(event);
        }
    }

    fn updates(&self) -> &UpdateSignals {
        &self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::StubProvider;
    use crate::state::WifiAndCellIdReportingState;
    use location_types::{Degrees, Meters, Timestamp};
    use std::sync::atomic::Ordering;

    fn position(accuracy: Option<f64>) -> Position {
        let position = Position::new(Degrees(48.0), Degrees(11.0)).unwrap();
        match accuracy {
            Some(meters) => position.with_horizontal_accuracy(Meters(meters)),
            None => position,
        }
    }

    fn at(seconds: u64) -> Timestamp {
        Timestamp::from_micros(seconds * 1_000_000)
    }

    fn collect_positions(
        fused: &Arc<FusionProvider>,
    ) -> (Connection, Arc<Mutex<Vec<Update<Position>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let connection = fused
            .updates()
            .position
            .connect(move |update| sink.lock().unwrap().push(*update));
        (connection, seen)
    }

    #[test]
    fn first_update_is_accepted_unconditionally() {
        let a = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(None), at(0)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn cross_source_regression_keeps_the_better_fix() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(Some(50.0)), at(0)));
        b.emit_position(Update::with_timestamp(position(Some(10.0)), at(1)));
        a.emit_position(Update::with_timestamp(position(Some(200.0)), at(2)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].value.accuracy.horizontal, Some(Meters(50.0)));
        // B's better accuracy takes over within the cutoff window.
        assert_eq!(seen[1].value.accuracy.horizontal, Some(Meters(10.0)));
        // A is no longer the followed source, arrives within the cutoff and
        // is less accurate than B: under strong source identity the fused
        // stream re-emits B's fix.
        assert_eq!(seen[2].value.accuracy.horizontal, Some(Meters(10.0)));
    }

    #[test]
    fn followed_source_may_regress() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(Some(50.0)), at(0)));
        a.emit_position(Update::with_timestamp(position(Some(200.0)), at(2)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].value.accuracy.horizontal, Some(Meters(200.0)));
    }

    #[test]
    fn much_newer_update_wins_across_sources() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(Some(5.0)), at(0)));
        b.emit_position(Update::with_timestamp(position(Some(500.0)), at(12)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].value.accuracy.horizontal, Some(Meters(500.0)));
    }

    #[test]
    fn within_cutoff_accuracy_decides_and_ties_keep_older() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(Some(10.0)), at(0)));
        // Same accuracy within the window: the older (A) stays selected.
        b.emit_position(Update::with_timestamp(position(Some(10.0)), at(1)));
        // Better accuracy within the window: B takes over.
        b.emit_position(Update::with_timestamp(position(Some(3.0)), at(2)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].when, at(0));
        assert_eq!(seen[2].value.accuracy.horizontal, Some(Meters(3.0)));
    }

    #[test]
    fn missing_accuracy_on_the_older_side_yields() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );
        let (_c, seen) = collect_positions(&fused);

        a.emit_position(Update::with_timestamp(position(None), at(0)));
        b.emit_position(Update::with_timestamp(position(Some(100.0)), at(1)));
        // And the reverse: an accuracy-less candidate loses to an accurate
        // incumbent.
        a.emit_position(Update::with_timestamp(position(None), at(2)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].value.accuracy.horizontal, Some(Meters(100.0)));
        assert_eq!(seen[2].value.accuracy.horizontal, Some(Meters(100.0)));
    }

    #[test]
    fn heading_and_velocity_pass_through() {
        use location_types::{Heading, MetersPerSecond, Velocity};

        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );

        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let _ch = fused.updates().heading.connect(move |_| {
            *sink.lock().unwrap() += 1;
        });
        let sink = seen.clone();
        let _cv = fused.updates().velocity.connect(move |_| {
            *sink.lock().unwrap() += 1;
        });

        a.emit_heading(Update::new(Heading::new(Degrees(10.0)).unwrap()));
        b.emit_heading(Update::new(Heading::new(Degrees(20.0)).unwrap()));
        a.emit_velocity(Update::new(Velocity::new(MetersPerSecond(1.0)).unwrap()));

        assert_eq!(*seen.lock().unwrap(), 3);
    }

    #[test]
    fn lifecycle_calls_fan_out_and_requirements_union() {
        use crate::provider::Requirements;

        let a = StubProvider::create_with_requirements(Requirements::SATELLITES);
        let b = StubProvider::create_with_requirements(Requirements::DATA_NETWORK);
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );

        fused.enable().unwrap();
        fused.activate().unwrap();
        assert_eq!(a.calls.activate.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.activate.load(Ordering::SeqCst), 1);

        assert_eq!(
            fused.requirements(),
            Requirements::SATELLITES | Requirements::DATA_NETWORK
        );
    }

    #[test]
    fn events_fan_out_to_all_inner_providers() {
        let a = StubProvider::create();
        let b = StubProvider::create();
        let fused = FusionProvider::new(
            vec![a.handle(), b.handle()],
            Arc::new(NewerOrMoreAccurateSelector),
        );

        fused.on_new_event(&Event::WifiAndCellIdReportingStateChanged(
            WifiAndCellIdReportingState::On,
        ));
        assert_eq!(a.events.lock().unwrap().len(), 1);
        assert_eq!(b.events.lock().unwrap().len(), 1);
    }
}
