//! The process-wide service façade: session factory, global state and the
//! authorization gateway.

use crate::engine::{Engine, SelectionError};
use crate::provider::State;
use crate::session::Session;
use crate::state::{
    EngineStatus, SatelliteBasedPositioningState, ServiceState, WifiAndCellIdReportingState,
};

use location_types::{Criteria, Position, SpaceVehicle, SpaceVehicleKey, Update};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Identity of the requesting client, as observed on the IPC transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub pid: u32,
    pub uid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResult {
    Granted,
    Rejected,
}

/// Decides whether a client may observe updates for the given criteria.
///
/// Lookups may block on an external authorization backend.
pub trait PermissionManager: Send + Sync {
    fn check_permission_for_credentials(
        &self,
        criteria: &Criteria,
        credentials: &Credentials,
    ) -> PermissionResult;
}

/// Grants everything; testing and trusted-environment setups.
#[derive(Debug, Default)]
pub struct AlwaysGrantingPermissionManager;

impl PermissionManager for AlwaysGrantingPermissionManager {
    fn check_permission_for_credentials(
        &self,
        _criteria: &Criteria,
        _credentials: &Credentials,
    ) -> PermissionResult {
        PermissionResult::Granted
    }
}

/// Grants requests from the daemon's own user, rejects everything else.
#[derive(Debug)]
pub struct DefaultPermissionManager {
    own_uid: u32,
}

impl DefaultPermissionManager {
    pub fn new(own_uid: u32) -> Self {
        Self { own_uid }
    }
}

impl PermissionManager for DefaultPermissionManager {
    fn check_permission_for_credentials(
        &self,
        _criteria: &Criteria,
        credentials: &Credentials,
    ) -> PermissionResult {
        if credentials.uid == self.own_uid {
            PermissionResult::Granted
        } else {
            PermissionResult::Rejected
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("permission denied for the requesting client")]
    PermissionDenied,
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// A server-chosen session address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionPath(pub String);

impl SessionPath {
    fn generate() -> Self {
        Self(format!("/sessions/{}", Uuid::new_v4().simple()))
    }
}

impl std::fmt::Display for SessionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the engine, gates session creation and tracks session lifetimes.
pub struct Service {
    engine: Arc<Engine>,
    permission_manager: Arc<dyn PermissionManager>,
    sessions: Mutex<HashMap<SessionPath, Arc<Session>>>,
}

impl Service {
    pub fn new(engine: Arc<Engine>, permission_manager: Arc<dyn PermissionManager>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            permission_manager,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Consults the permission manager, asks the selection policy and
    /// constructs a session. No provider is activated when either gate
    /// rejects the request.
    pub fn create_session_for_criteria(
        &self,
        criteria: &Criteria,
        credentials: &Credentials,
    ) -> Result<(SessionPath, Arc<Session>), ServiceError> {
        if self
            .permission_manager
            .check_permission_for_credentials(criteria, credentials)
            == PermissionResult::Rejected
        {
            return Err(ServiceError::PermissionDenied);
        }

        let selection = self
            .engine
            .determine_provider_selection_for_criteria(criteria)?;
        let session = Session::new(selection);
        let path = SessionPath::generate();
        self.sessions
            .lock()
            .expect("service session table poisoned")
            .insert(path.clone(), session.clone());
        info!("created session {path} for uid {}", credentials.uid);
        Ok((path, session))
    }

    pub fn session(&self, path: &SessionPath) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .expect("service session table poisoned")
            .get(path)
            .cloned()
    }

    /// Drops the service's reference; the session's activations are
    /// released once the last client-side handle goes away.
    pub fn release_session(&self, path: &SessionPath) {
        self.sessions
            .lock()
            .expect("service session table poisoned")
            .remove(path);
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .expect("service session table poisoned")
            .len()
    }

    // ── Observable service state ─────────────────────────────────────────────

    /// Derived from provider states: active beats enabled beats disabled.
    pub fn state(&self) -> ServiceState {
        let mut state = ServiceState::Disabled;
        self.engine.for_each_provider(|provider| {
            state = match provider.state().get() {
                State::Active => ServiceState::Active,
                State::Enabled if state != ServiceState::Active => ServiceState::Enabled,
                _ => state,
            };
        });
        state
    }

    pub fn is_online(&self) -> bool {
        self.engine.configuration().engine_state.get() == EngineStatus::On
    }

    pub fn does_satellite_based_positioning(&self) -> SatelliteBasedPositioningState {
        self.engine
            .configuration()
            .satellite_based_positioning_state
            .get()
    }

    pub fn set_does_satellite_based_positioning(&self, state: SatelliteBasedPositioningState) {
        self.engine.set_satellite_based_positioning_state(state);
    }

    pub fn does_report_cell_and_wifi_ids(&self) -> WifiAndCellIdReportingState {
        self.engine
            .configuration()
            .wifi_and_cell_id_reporting_state
            .get()
    }

    pub fn set_does_report_cell_and_wifi_ids(&self, state: WifiAndCellIdReportingState) {
        self.engine.set_wifi_and_cell_id_reporting_state(state);
    }

    pub fn set_is_online(&self, online: bool) {
        self.engine.set_engine_state(if online {
            EngineStatus::On
        } else {
            EngineStatus::Off
        });
    }

    pub fn visible_space_vehicles(&self) -> BTreeMap<SpaceVehicleKey, SpaceVehicle> {
        self.engine.configuration().visible_space_vehicles.get()
    }

    pub fn update_reference_location(&self, update: Update<Position>) {
        self.engine.update_reference_location(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SerializingBus;
    use crate::engine::FusionProviderSelectionPolicy;
    use crate::providers::testing::StubProvider;
    use std::sync::atomic::Ordering;

    struct AlwaysRejecting;

    impl PermissionManager for AlwaysRejecting {
        fn check_permission_for_credentials(
            &self,
            _criteria: &Criteria,
            _credentials: &Credentials,
        ) -> PermissionResult {
            PermissionResult::Rejected
        }
    }

    fn engine_with(stub: &Arc<StubProvider>) -> Arc<Engine> {
        let engine = Engine::new(
            Arc::new(FusionProviderSelectionPolicy),
            SerializingBus::new(),
        );
        engine.add_provider(stub.handle());
        engine
    }

    const CREDENTIALS: Credentials = Credentials { pid: 42, uid: 1000 };

    #[tokio::test]
    async fn rejected_permission_creates_no_session_and_activates_nothing() {
        let stub = StubProvider::create();
        let service = Service::new(engine_with(&stub), Arc::new(AlwaysRejecting));

        let result = service.create_session_for_criteria(&Criteria::position_only(), &CREDENTIALS);
        assert_eq!(result.unwrap_err(), ServiceError::PermissionDenied);
        assert_eq!(service.session_count(), 0);
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn granted_permission_yields_a_tracked_session() {
        let stub = StubProvider::create();
        let service = Service::new(
            engine_with(&stub),
            Arc::new(AlwaysGrantingPermissionManager),
        );

        let (path, session) = service
            .create_session_for_criteria(&Criteria::position_only(), &CREDENTIALS)
            .unwrap();
        assert!(path.0.starts_with("/sessions/"));
        assert_eq!(service.session_count(), 1);
        assert!(service.session(&path).is_some());

        session.start_position_updates().unwrap();
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_provider_error_reaches_the_caller() {
        let engine = Engine::new(
            Arc::new(FusionProviderSelectionPolicy),
            SerializingBus::new(),
        );
        let service = Service::new(engine, Arc::new(AlwaysGrantingPermissionManager));

        let result = service.create_session_for_criteria(&Criteria::position_only(), &CREDENTIALS);
        assert_eq!(
            result.unwrap_err(),
            ServiceError::Selection(SelectionError::NoProviderForCriteria)
        );
    }

    #[tokio::test]
    async fn default_permission_manager_grants_same_user_only() {
        let manager = DefaultPermissionManager::new(1000);
        assert_eq!(
            manager.check_permission_for_credentials(
                &Criteria::position_only(),
                &Credentials { pid: 1, uid: 1000 }
            ),
            PermissionResult::Granted
        );
        assert_eq!(
            manager.check_permission_for_credentials(
                &Criteria::position_only(),
                &Credentials { pid: 1, uid: 0 }
            ),
            PermissionResult::Rejected
        );
    }

    #[tokio::test]
    async fn service_state_follows_provider_activity() {
        let stub = StubProvider::create();
        let service = Service::new(
            engine_with(&stub),
            Arc::new(AlwaysGrantingPermissionManager),
        );
        assert_eq!(service.state(), ServiceState::Enabled);

        let (_, session) = service
            .create_session_for_criteria(&Criteria::position_only(), &CREDENTIALS)
            .unwrap();
        session.start_position_updates().unwrap();
        assert_eq!(service.state(), ServiceState::Active);

        session.stop_position_updates().unwrap();
        assert_eq!(service.state(), ServiceState::Enabled);

        service.set_is_online(false);
        assert_eq!(service.state(), ServiceState::Disabled);
    }

    #[tokio::test]
    async fn engine_off_keeps_session_flags_for_reactivation() {
        let stub = StubProvider::create();
        let service = Service::new(
            engine_with(&stub),
            Arc::new(AlwaysGrantingPermissionManager),
        );
        let (_, session) = service
            .create_session_for_criteria(&Criteria::position_only(), &CREDENTIALS)
            .unwrap();
        session.start_position_updates().unwrap();

        service.set_is_online(false);
        assert_eq!(stub.calls.deactivate.load(Ordering::SeqCst), 1);
        assert!(session.is_active());

        service.set_is_online(true);
        assert_eq!(stub.calls.activate.load(Ordering::SeqCst), 2);
    }
}
