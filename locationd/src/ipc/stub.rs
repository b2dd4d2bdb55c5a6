//! Client side: remotes the service and session interfaces over the wire.

use crate::ipc::wire::{self, Envelope};
use crate::state::{SatelliteBasedPositioningState, ServiceState, WifiAndCellIdReportingState};

use location_types::{Criteria, SpaceVehicle};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

#[derive(Debug, Error)]
pub enum StubError {
    #[error("i/o error on the bus connection: {0}")]
    Io(#[from] std::io::Error),
    #[error("the service replied with {name}: {message}")]
    Remote { name: String, message: String },
    #[error("the bus connection is closed")]
    Closed,
    #[error("unexpected reply shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StubError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StubError::Remote { name, .. } if name == wire::ERROR_PERMISSION_DENIED)
    }
}

/// A signal as observed by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub path: String,
    pub member: String,
    pub body: Value,
}

type PendingMap = Mutex<HashMap<u64, oneshot::Sender<Result<Value, (String, String)>>>>;

struct Inner {
    tx: mpsc::UnboundedSender<Envelope>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    signals: Mutex<Option<mpsc::UnboundedReceiver<SignalEvent>>>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").finish_non_exhaustive()
    }
}

/// Client handle to the remote service object.
#[derive(Clone, Debug)]
pub struct ServiceStub {
    inner: Arc<Inner>,
}

impl ServiceStub {
    /// Connects to the daemon's socket and spawns the reader/writer tasks.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, StubError> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let (tx, mut tx_rx) = mpsc::unbounded_channel::<Envelope>();
        tokio::spawn(async move {
            while let Some(envelope) = tx_rx.recv().await {
                if wire::write_envelope(&mut write_half, &envelope)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<SignalEvent>();

        let routing = pending.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match wire::read_envelope(&mut reader).await {
                    Ok(Some(Envelope::MethodReturn { id, body })) => {
                        if let Some(waiter) =
                            routing.lock().expect("stub pending map poisoned").remove(&id)
                        {
                            let _ = waiter.send(Ok(body));
                        }
                    }
                    Ok(Some(Envelope::Error { id, name, message })) => {
                        if let Some(waiter) =
                            routing.lock().expect("stub pending map poisoned").remove(&id)
                        {
                            let _ = waiter.send(Err((name, message)));
                        }
                    }
                    Ok(Some(Envelope::Signal {
                        path, member, body, ..
                    })) => {
                        let _ = signal_tx.send(SignalEvent { path, member, body });
                    }
                    Ok(Some(Envelope::MethodCall { .. })) => {
                        debug!("server sent a method call, ignoring");
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            // Wake every in-flight call with a closed-connection error.
            routing.lock().expect("stub pending map poisoned").clear();
        });

        Ok(Self {
            inner: Arc::new(Inner {
                tx,
                pending,
                next_id: AtomicU64::new(1),
                signals: Mutex::new(Some(signal_rx)),
            }),
        })
    }

    /// Takes the signal stream; a second take yields `None`.
    pub fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<SignalEvent>> {
        self.inner
            .signals
            .lock()
            .expect("stub signal slot poisoned")
            .take()
    }

    async fn call(&self, path: &str, member: &str, body: Value) -> Result<Value, StubError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .expect("stub pending map poisoned")
            .insert(id, reply_tx);

        let interface = if path == wire::SERVICE_PATH {
            wire::SERVICE_INTERFACE
        } else {
            wire::SESSION_INTERFACE
        };
        let envelope = Envelope::MethodCall {
            id,
            path: path.to_string(),
            interface: interface.to_string(),
            member: member.to_string(),
            body,
        };
        self.inner.tx.send(envelope).map_err(|_| StubError::Closed)?;

        match reply_rx.await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err((name, message))) => Err(StubError::Remote { name, message }),
            Err(_) => Err(StubError::Closed),
        }
    }

    /// `CreateSessionForCriteria`: returns a handle to the newly published
    /// session object.
    pub async fn create_session_for_criteria(
        &self,
        criteria: &Criteria,
    ) -> Result<SessionStub, StubError> {
        let reply = self
            .call(
                wire::SERVICE_PATH,
                "CreateSessionForCriteria",
                json!({ "criteria": criteria }),
            )
            .await?;
        let path: String = serde_json::from_value(reply["path"].clone())?;
        Ok(SessionStub {
            stub: self.clone(),
            path,
        })
    }

    pub async fn state(&self) -> Result<ServiceState, StubError> {
        let reply = self.call(wire::SERVICE_PATH, "GetState", Value::Null).await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn is_online(&self) -> Result<bool, StubError> {
        let reply = self
            .call(wire::SERVICE_PATH, "GetIsOnline", Value::Null)
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn set_is_online(&self, online: bool) -> Result<(), StubError> {
        self.call(
            wire::SERVICE_PATH,
            "SetIsOnline",
            json!({ "value": online }),
        )
        .await?;
        Ok(())
    }

    pub async fn does_satellite_based_positioning(
        &self,
    ) -> Result<SatelliteBasedPositioningState, StubError> {
        let reply = self
            .call(
                wire::SERVICE_PATH,
                "GetDoesSatelliteBasedPositioning",
                Value::Null,
            )
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn set_does_satellite_based_positioning(
        &self,
        state: SatelliteBasedPositioningState,
    ) -> Result<(), StubError> {
        self.call(
            wire::SERVICE_PATH,
            "SetDoesSatelliteBasedPositioning",
            json!({ "value": state }),
        )
        .await?;
        Ok(())
    }

    pub async fn does_report_cell_and_wifi_ids(
        &self,
    ) -> Result<WifiAndCellIdReportingState, StubError> {
        let reply = self
            .call(
                wire::SERVICE_PATH,
                "GetDoesReportCellAndWifiIds",
                Value::Null,
            )
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn set_does_report_cell_and_wifi_ids(
        &self,
        state: WifiAndCellIdReportingState,
    ) -> Result<(), StubError> {
        self.call(
            wire::SERVICE_PATH,
            "SetDoesReportCellAndWifiIds",
            json!({ "value": state }),
        )
        .await?;
        Ok(())
    }

    pub async fn visible_space_vehicles(&self) -> Result<Vec<SpaceVehicle>, StubError> {
        let reply = self
            .call(wire::SERVICE_PATH, "GetVisibleSpaceVehicles", Value::Null)
            .await?;
        Ok(serde_json::from_value(reply)?)
    }
}

/// Client handle to one session object.
#[derive(Clone, Debug)]
pub struct SessionStub {
    stub: ServiceStub,
    path: String,
}

impl SessionStub {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn start_position_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StartPositionUpdates", Value::Null)
            .await?;
        Ok(())
    }

    pub async fn stop_position_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StopPositionUpdates", Value::Null)
            .await?;
        Ok(())
    }

    pub async fn start_heading_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StartHeadingUpdates", Value::Null)
            .await?;
        Ok(())
    }

    pub async fn stop_heading_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StopHeadingUpdates", Value::Null)
            .await?;
        Ok(())
    }

    pub async fn start_velocity_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StartVelocityUpdates", Value::Null)
            .await?;
        Ok(())
    }

    pub async fn stop_velocity_updates(&self) -> Result<(), StubError> {
        self.stub
            .call(&self.path, "StopVelocityUpdates", Value::Null)
            .await?;
        Ok(())
    }
}
