//! Correlates reference positions with the observed radio environment and
//! hands the result to reporters for crowd-sourced uploads.

use crate::bus::{Bus, SubscriptionId};
use crate::connectivity::{Manager, RadioCell, WirelessNetwork};
use crate::events::Event;
use crate::state::WifiAndCellIdReportingState;

use location_types::{Position, Update};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Ships correlated observations somewhere. Injected, not specified.
pub trait Reporter: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn report(&self, update: &Update<Position>, wifis: &[WirelessNetwork], cells: &[RadioCell]);
}

/// What the harvester needs to run.
pub struct Configuration {
    pub connectivity_manager: Arc<dyn Manager>,
    pub reporter: Arc<dyn Reporter>,
}

/// Observes reference-position events; while started and while reporting is
/// allowed, each position is paired with the enumerated Wi-Fis and cells
/// and dispatched to the reporter. While stopped, positions are discarded.
pub struct Harvester {
    config: Configuration,
    is_running: AtomicBool,
    reporting_state: Mutex<WifiAndCellIdReportingState>,
    bus: Arc<dyn Bus>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl Harvester {
    pub fn new(config: Configuration, bus: Arc<dyn Bus>) -> Arc<Self> {
        let harvester = Arc::new(Self {
            config,
            is_running: AtomicBool::new(false),
            reporting_state: Mutex::new(WifiAndCellIdReportingState::Off),
            bus: bus.clone(),
            subscription: Mutex::new(None),
        });

        let weak: Weak<Harvester> = Arc::downgrade(&harvester);
        let id = bus.subscribe(Arc::new(move |event: &Event| {
            let Some(harvester) = weak.upgrade() else {
                return;
            };
            match event {
                Event::ReferencePositionUpdated(update) => {
                    harvester.report_position_update(update);
                }
                Event::WifiAndCellIdReportingStateChanged(state) => {
                    *harvester
                        .reporting_state
                        .lock()
                        .expect("harvester reporting state poisoned") = *state;
                }
            }
        }));
        *harvester
            .subscription
            .lock()
            .expect("harvester subscription poisoned") = Some(id);
        harvester
    }

    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.config.reporter.start();
    }

    pub fn stop(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.config.reporter.stop();
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    fn report_position_update(&self, update: &Update<Position>) {
        if !self.is_running.load(Ordering::SeqCst) {
            return;
        }
        if *self
            .reporting_state
            .lock()
            .expect("harvester reporting state poisoned")
            != WifiAndCellIdReportingState::On
        {
            return;
        }

        let mut wifis = Vec::new();
        self.config
            .connectivity_manager
            .enumerate_visible_wireless_networks(&mut |wifi| wifis.push(wifi.clone()));
        let mut cells = Vec::new();
        self.config
            .connectivity_manager
            .enumerate_connected_radio_cells(&mut |cell| cells.push(cell.clone()));

        debug!(
            "harvesting position with {} wifis and {} cells",
            wifis.len(),
            cells.len()
        );
        self.config.reporter.report(update, &wifis, &cells);
    }
}

impl Drop for Harvester {
    fn drop(&mut self) {
        if let Some(id) = self
            .subscription
            .lock()
            .expect("harvester subscription poisoned")
            .take()
        {
            self.bus.unsubscribe(id);
        }
    }
}

// ── Demultiplexing reporter ──────────────────────────────────────────────────

const QUEUE_CAPACITY: usize = 16;

struct QueuedReport {
    update: Update<Position>,
    wifis: Vec<WirelessNetwork>,
    cells: Vec<RadioCell>,
}

struct ReporterQueue {
    reports: Mutex<VecDeque<QueuedReport>>,
    available: Notify,
}

struct ReporterWorker {
    reporter: Arc<dyn Reporter>,
    queue: Arc<ReporterQueue>,
    handle: JoinHandle<()>,
}

/// Fans reports out to several reporters without ever blocking the
/// producer: each inner reporter drains its own bounded queue on its own
/// task, and the oldest report is dropped when a queue overflows.
pub struct DemultiplexingReporter {
    workers: Vec<ReporterWorker>,
}

impl DemultiplexingReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        let workers = reporters
            .into_iter()
            .map(|reporter| {
                let queue = Arc::new(ReporterQueue {
                    reports: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
                    available: Notify::new(),
                });

                let worker_queue = queue.clone();
                let worker_reporter = reporter.clone();
                let handle = tokio::spawn(async move {
                    loop {
                        let report = {
                            worker_queue
                                .reports
                                .lock()
                                .expect("reporter queue poisoned")
                                .pop_front()
                        };
                        match report {
                            Some(report) => worker_reporter.report(
                                &report.update,
                                &report.wifis,
                                &report.cells,
                            ),
                            None => worker_queue.available.notified().await,
                        }
                    }
                });

                ReporterWorker {
                    reporter,
                    queue,
                    handle,
                }
            })
            .collect();
        Self { workers }
    }
}

impl Reporter for DemultiplexingReporter {
    fn start(&self) {
        for worker in &self.workers {
            worker.reporter.start();
        }
    }

    fn stop(&self) {
        for worker in &self.workers {
            worker.reporter.stop();
        }
    }

    fn report(&self, update: &Update<Position>, wifis: &[WirelessNetwork], cells: &[RadioCell]) {
        for worker in &self.workers {
            let mut reports = worker
                .queue
                .reports
                .lock()
                .expect("reporter queue poisoned");
            if reports.len() >= QUEUE_CAPACITY {
                reports.pop_front();
                warn!("reporter queue full, dropping oldest report");
            }
            reports.push_back(QueuedReport {
                update: *update,
                wifis: wifis.to_vec(),
                cells: cells.to_vec(),
            });
            drop(reports);
            worker.queue.available.notify_one();
        }
    }
}

impl Drop for DemultiplexingReporter {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SerializingBus;
    use crate::connectivity::{sample_cell, sample_wifi, StaticManager};
    use location_types::{Degrees, Position};
    use std::time::Duration;

    struct RecordingReporter {
        started: AtomicBool,
        reports: Mutex<Vec<(Update<Position>, usize, usize)>>,
    }

    impl RecordingReporter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: AtomicBool::new(false),
                reports: Mutex::new(Vec::new()),
            })
        }
    }

    impl Reporter for RecordingReporter {
        fn start(&self) {
            self.started.store(true, Ordering::SeqCst);
        }

        fn stop(&self) {
            self.started.store(false, Ordering::SeqCst);
        }

        fn report(
            &self,
            update: &Update<Position>,
            wifis: &[WirelessNetwork],
            cells: &[RadioCell],
        ) {
            self.reports
                .lock()
                .unwrap()
                .push((*update, wifis.len(), cells.len()));
        }
    }

    fn reference_position() -> Update<Position> {
        Update::new(Position::new(Degrees(48.0), Degrees(11.0)).unwrap())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn correlates_position_with_wifis_and_cells_exactly_once() {
        let bus = SerializingBus::new();
        let reporter = RecordingReporter::new();
        let manager = StaticManager {
            wifis: vec![sample_wifi("aa:bb:cc:dd:ee:01"), sample_wifi("aa:bb:cc:dd:ee:02")],
            cells: vec![sample_cell()],
        };
        let harvester = Harvester::new(
            Configuration {
                connectivity_manager: Arc::new(manager),
                reporter: reporter.clone(),
            },
            bus.clone(),
        );
        harvester.start();

        bus.push(Event::WifiAndCellIdReportingStateChanged(
            WifiAndCellIdReportingState::On,
        ));
        let update = reference_position();
        bus.push(Event::ReferencePositionUpdated(update));
        settle().await;

        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0], (update, 2, 1));
    }

    #[tokio::test]
    async fn stopped_harvester_discards_positions() {
        let bus = SerializingBus::new();
        let reporter = RecordingReporter::new();
        let harvester = Harvester::new(
            Configuration {
                connectivity_manager: Arc::new(StaticManager::default()),
                reporter: reporter.clone(),
            },
            bus.clone(),
        );

        bus.push(Event::WifiAndCellIdReportingStateChanged(
            WifiAndCellIdReportingState::On,
        ));
        bus.push(Event::ReferencePositionUpdated(reference_position()));
        settle().await;
        assert!(reporter.reports.lock().unwrap().is_empty());

        // Starting later must not replay the missed position.
        harvester.start();
        settle().await;
        assert!(reporter.reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reporting_state_off_suppresses_reports() {
        let bus = SerializingBus::new();
        let reporter = RecordingReporter::new();
        let harvester = Harvester::new(
            Configuration {
                connectivity_manager: Arc::new(StaticManager::default()),
                reporter: reporter.clone(),
            },
            bus.clone(),
        );
        harvester.start();

        bus.push(Event::ReferencePositionUpdated(reference_position()));
        settle().await;
        assert!(reporter.reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_and_stop_reach_the_reporter() {
        let bus = SerializingBus::new();
        let reporter = RecordingReporter::new();
        let harvester = Harvester::new(
            Configuration {
                connectivity_manager: Arc::new(StaticManager::default()),
                reporter: reporter.clone(),
            },
            bus,
        );

        harvester.start();
        assert!(reporter.started.load(Ordering::SeqCst));
        harvester.stop();
        assert!(!reporter.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn demultiplexing_reporter_fans_out() {
        let first = RecordingReporter::new();
        let second = RecordingReporter::new();
        let demux =
            DemultiplexingReporter::new(vec![first.clone() as _, second.clone() as _]);

        demux.start();
        demux.report(&reference_position(), &[sample_wifi("aa:bb:cc:dd:ee:01")], &[]);
        settle().await;

        assert_eq!(first.reports.lock().unwrap().len(), 1);
        assert_eq!(second.reports.lock().unwrap().len(), 1);
        assert!(first.started.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overflowing_queue_drops_the_oldest() {
        struct Gated {
            gate: tokio::sync::Semaphore,
            seen: Mutex<Vec<f64>>,
        }

        impl Reporter for Gated {
            fn start(&self) {}
            fn stop(&self) {}
            fn report(
                &self,
                update: &Update<Position>,
                _wifis: &[WirelessNetwork],
                _cells: &[RadioCell],
            ) {
                // Block the worker until the test opens the gate.
                while self.gate.try_acquire().is_err() {
                    std::thread::yield_now();
                }
                self.seen.lock().unwrap().push(update.value.latitude().0);
            }
        }

        let gated = Arc::new(Gated {
            gate: tokio::sync::Semaphore::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let demux = DemultiplexingReporter::new(vec![gated.clone() as _]);

        // One report will occupy the worker, the rest fill the queue.
        for i in 0..(QUEUE_CAPACITY + 4) {
            let update = Update::new(Position::new(Degrees(i as f64), Degrees(0.0)).unwrap());
            demux.report(&update, &[], &[]);
        }
        gated.gate.add_permits(QUEUE_CAPACITY + 8);
        settle().await;

        let seen = gated.seen.lock().unwrap();
        // Some of the oldest latitudes were dropped, the newest survived.
        assert!(seen.len() <= QUEUE_CAPACITY + 1);
        assert_eq!(seen.last().copied(), Some((QUEUE_CAPACITY + 3) as f64));
    }
}
