//! Server side: publishes the service and its sessions on a Unix socket.

use crate::ipc::wire::{self, Envelope};
use crate::observable::Connection;
use crate::service::{Credentials, Service, ServiceError, SessionPath};
use crate::session::Session;
use crate::state::{SatelliteBasedPositioningState, WifiAndCellIdReportingState};

use location_types::Criteria;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A session as seen by one connection: the shared session object plus the
/// signal subscriptions forwarding its updates onto this connection.
struct SessionBinding {
    _session: Arc<Session>,
    _connections: Vec<Connection>,
}

/// Publishes a [`Service`] on a listener.
pub struct Skeleton {
    service: Arc<Service>,
}

impl Skeleton {
    pub fn new(service: Arc<Service>) -> Arc<Self> {
        Arc::new(Self { service })
    }

    /// Accepts clients until the listener fails or the task is cancelled.
    pub async fn serve(self: Arc<Self>, listener: UnixListener) -> std::io::Result<()> {
        info!(
            "serving {} at {}",
            wire::SERVICE_NAME,
            wire::SERVICE_PATH
        );
        loop {
            let (stream, _addr) = listener.accept().await?;
            let skeleton = self.clone();
            tokio::spawn(async move {
                if let Err(e) = skeleton.handle_client(stream).await {
                    debug!("client connection ended: {e}");
                }
            });
        }
    }

    async fn handle_client(self: Arc<Self>, stream: UnixStream) -> std::io::Result<()> {
        let credentials = match stream.peer_cred() {
            Ok(cred) => Credentials {
                pid: cred.pid().unwrap_or_default() as u32,
                uid: cred.uid(),
            },
            Err(e) => {
                warn!("cannot read peer credentials, treating as uid 0 sibling: {e}");
                Credentials { pid: 0, uid: 0 }
            }
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // All replies and signals funnel through one writer task so signal
        // subscribers never interleave partial lines.
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let writer = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if wire::write_envelope(&mut write_half, &envelope)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let mut bindings: HashMap<String, SessionBinding> = HashMap::new();
        let result = loop {
            match wire::read_envelope(&mut reader).await {
                Ok(Some(Envelope::MethodCall {
                    id,
                    path,
                    member,
                    body,
                    ..
                })) => {
                    let reply =
                        self.dispatch(id, &path, &member, body, &credentials, &tx, &mut bindings);
                    if tx.send(reply).is_err() {
                        break Ok(());
                    }
                }
                Ok(Some(other)) => {
                    debug!("ignoring non-call envelope from client: {other:?}");
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        // Dropping the bindings disconnects the signal forwarding and, with
        // the service's reference released, winds down the sessions'
        // activations.
        for path in bindings.keys() {
            self.service.release_session(&SessionPath(path.clone()));
        }
        drop(bindings);
        writer.abort();
        result
    }

    fn dispatch(
        &self,
        id: u64,
        path: &str,
        member: &str,
        body: Value,
        credentials: &Credentials,
        tx: &mpsc::UnboundedSender<Envelope>,
        bindings: &mut HashMap<String, SessionBinding>,
    ) -> Envelope {
        if path == wire::SERVICE_PATH {
            return self.dispatch_service(id, member, body, credentials, tx, bindings);
        }
        if let Some(binding) = bindings.get(path) {
            return dispatch_session(id, member, &binding._session);
        }
        Envelope::error(id, wire::ERROR_UNKNOWN_OBJECT, format!("no object at {path}"))
    }

    fn dispatch_service(
        &self,
        id: u64,
        member: &str,
        body: Value,
        credentials: &Credentials,
        tx: &mpsc::UnboundedSender<Envelope>,
        bindings: &mut HashMap<String, SessionBinding>,
    ) -> Envelope {
        match member {
            "CreateSessionForCriteria" => {
                let criteria: Criteria = match serde_json::from_value(body["criteria"].clone()) {
                    Ok(criteria) => criteria,
                    Err(e) => {
                        return Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, e.to_string())
                    }
                };
                match self.service.create_session_for_criteria(&criteria, credentials) {
                    Ok((path, session)) => {
                        let connections = forward_session_signals(&path, &session, tx.clone());
                        bindings.insert(
                            path.0.clone(),
                            SessionBinding {
                                _session: session,
                                _connections: connections,
                            },
                        );
                        Envelope::method_return(id, json!({ "path": path }))
                    }
                    Err(ServiceError::PermissionDenied) => Envelope::error(
                        id,
                        wire::ERROR_PERMISSION_DENIED,
                        "client is not allowed to observe location updates",
                    ),
                    Err(e) => Envelope::error(id, wire::ERROR_NO_PROVIDER, e.to_string()),
                }
            }
            "GetState" => Envelope::method_return(id, json!(self.service.state())),
            "GetIsOnline" => Envelope::method_return(id, json!(self.service.is_online())),
            "SetIsOnline" => match body["value"].as_bool() {
                Some(online) => {
                    self.service.set_is_online(online);
                    Envelope::method_return(id, Value::Null)
                }
                None => Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, "expected a bool"),
            },
            "GetDoesSatelliteBasedPositioning" => {
                Envelope::method_return(id, json!(self.service.does_satellite_based_positioning()))
            }
            "SetDoesSatelliteBasedPositioning" => {
                match serde_json::from_value::<SatelliteBasedPositioningState>(body["value"].clone())
                {
                    Ok(state) => {
                        self.service.set_does_satellite_based_positioning(state);
                        Envelope::method_return(id, Value::Null)
                    }
                    Err(e) => Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, e.to_string()),
                }
            }
            "GetDoesReportCellAndWifiIds" => {
                Envelope::method_return(id, json!(self.service.does_report_cell_and_wifi_ids()))
            }
            "SetDoesReportCellAndWifiIds" => {
                match serde_json::from_value::<WifiAndCellIdReportingState>(body["value"].clone()) {
                    Ok(state) => {
                        self.service.set_does_report_cell_and_wifi_ids(state);
                        Envelope::method_return(id, Value::Null)
                    }
                    Err(e) => Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, e.to_string()),
                }
            }
            "GetVisibleSpaceVehicles" => {
                let vehicles: Vec<_> = self.service.visible_space_vehicles().into_values().collect();
                Envelope::method_return(id, json!(vehicles))
            }
            _ => Envelope::error(
                id,
                wire::ERROR_UNKNOWN_METHOD,
                format!("no method {member} on the service"),
            ),
        }
    }
}

fn dispatch_session(id: u64, member: &str, session: &Arc<Session>) -> Envelope {
    let result = match member {
        "StartPositionUpdates" => session.start_position_updates(),
        "StopPositionUpdates" => session.stop_position_updates(),
        "StartHeadingUpdates" => session.start_heading_updates(),
        "StopHeadingUpdates" => session.stop_heading_updates(),
        "StartVelocityUpdates" => session.start_velocity_updates(),
        "StopVelocityUpdates" => session.stop_velocity_updates(),
        _ => {
            return Envelope::error(
                id,
                wire::ERROR_UNKNOWN_METHOD,
                format!("no method {member} on a session"),
            )
        }
    };
    match result {
        Ok(()) => Envelope::method_return(id, Value::Null),
        Err(e) => Envelope::error(id, wire::ERROR_FAILED, e.to_string()),
    }
}

fn session_signal(path: &str, member: &str, body: Value) -> Envelope {
    Envelope::Signal {
        path: path.to_string(),
        interface: wire::SESSION_INTERFACE.to_string(),
        member: member.to_string(),
        body,
    }
}

fn forward_session_signals(
    path: &SessionPath,
    session: &Arc<Session>,
    tx: mpsc::UnboundedSender<Envelope>,
) -> Vec<Connection> {
    let mut connections = Vec::with_capacity(3);

    let sink = tx.clone();
    let at = path.0.clone();
    connections.push(session.updates().position.connect(move |update| {
        let _ = sink.send(session_signal(&at, "PositionChanged", json!(update)));
    }));

    let sink = tx.clone();
    let at = path.0.clone();
    connections.push(session.updates().heading.connect(move |update| {
        let _ = sink.send(session_signal(&at, "HeadingChanged", json!(update)));
    }));

    let sink = tx;
    let at = path.0.clone();
    connections.push(session.updates().velocity.connect(move |update| {
        let _ = sink.send(session_signal(&at, "VelocityChanged", json!(update)));
    }));

    connections
}
