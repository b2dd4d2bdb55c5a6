//! Remoting a single provider: the `provider` subcommand publishes an
//! in-tree provider out-of-process, and the daemon consumes it through a
//! stub that behaves like any local provider.

use crate::events::Event;
use crate::ipc::wire::{self, Envelope};
use crate::observable::Connection;
use crate::provider::{
    Provider, ProviderError, ProviderHandle, ProviderId, Requirements, UpdateSignals,
};

use location_types::{Criteria, Heading, Position, SpaceVehicle, Update, Velocity};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub const PROVIDER_PATH: &str = "/providers/0";

// ── Skeleton ──────────────────────────────────────────────────────────────────

/// Publishes one provider on a listener.
pub struct ProviderSkeleton {
    provider: ProviderHandle,
}

impl ProviderSkeleton {
    pub fn new(provider: ProviderHandle) -> Arc<Self> {
        Arc::new(Self { provider })
    }

    pub async fn serve(self: Arc<Self>, listener: UnixListener) -> std::io::Result<()> {
        loop {
            let (stream, _addr) = listener.accept().await?;
            let skeleton = self.clone();
            tokio::spawn(async move {
                if let Err(e) = skeleton.handle_client(stream).await {
                    debug!("provider client connection ended: {e}");
                }
            });
        }
    }

    async fn handle_client(self: Arc<Self>, stream: UnixStream) -> std::io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

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

        let _connections = forward_provider_signals(&self.provider, tx.clone());

        let result = loop {
            match wire::read_envelope(&mut reader).await {
                Ok(Some(Envelope::MethodCall {
                    id, member, body, ..
                })) => {
                    let reply = self.dispatch(id, &member, body);
                    if tx.send(reply).is_err() {
                        break Ok(());
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        writer.abort();
        result
    }

    fn dispatch(&self, id: u64, member: &str, body: Value) -> Envelope {
        let lifecycle = |result: Result<(), ProviderError>| match result {
            Ok(()) => Envelope::method_return(id, Value::Null),
            Err(e) => Envelope::error(id, wire::ERROR_FAILED, e.to_string()),
        };
        match member {
            "Enable" => lifecycle(self.provider.enable()),
            "Disable" => lifecycle(self.provider.disable()),
            "Activate" => lifecycle(self.provider.activate()),
            "Deactivate" => lifecycle(self.provider.deactivate()),
            "GetRequirements" => {
                Envelope::method_return(id, json!(self.provider.requirements().bits()))
            }
            "Satisfies" => match serde_json::from_value::<Criteria>(body["criteria"].clone()) {
                Ok(criteria) => {
                    Envelope::method_return(id, json!(self.provider.satisfies(&criteria)))
                }
                Err(e) => Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, e.to_string()),
            },
            "OnNewEvent" => match serde_json::from_value::<Event>(body) {
                Ok(event) => {
                    self.provider.on_new_event(&event);
                    Envelope::method_return(id, Value::Null)
                }
                Err(e) => Envelope::error(id, wire::ERROR_INVALID_ARGUMENTS, e.to_string()),
            },
            _ => Envelope::error(
                id,
                wire::ERROR_UNKNOWN_METHOD,
                format!("no method {member} on a provider"),
            ),
        }
    }
}

fn provider_signal(member: &str, body: Value) -> Envelope {
    Envelope::Signal {
        path: PROVIDER_PATH.to_string(),
        interface: wire::PROVIDER_INTERFACE.to_string(),
        member: member.to_string(),
        body,
    }
}

fn forward_provider_signals(
    provider: &ProviderHandle,
    tx: mpsc::UnboundedSender<Envelope>,
) -> Vec<Connection> {
    let mut connections = Vec::with_capacity(4);

    let sink = tx.clone();
    connections.push(provider.updates().position.connect(move |update| {
        let _ = sink.send(provider_signal("PositionChanged", json!(update)));
    }));
    let sink = tx.clone();
    connections.push(provider.updates().heading.connect(move |update| {
        let _ = sink.send(provider_signal("HeadingChanged", json!(update)));
    }));
    let sink = tx.clone();
    connections.push(provider.updates().velocity.connect(move |update| {
        let _ = sink.send(provider_signal("VelocityChanged", json!(update)));
    }));
    let sink = tx;
    connections.push(provider.updates().space_vehicles.connect(move |update| {
        let _ = sink.send(provider_signal("SpaceVehiclesChanged", json!(update)));
    }));

    connections
}

// ── Stub ──────────────────────────────────────────────────────────────────────

/// A provider living in another process.
///
/// Lifecycle calls are queued towards the remote end; update signals stream
/// back and re-emit locally, so the daemon treats the stub like any other
/// provider.
pub struct RemoteProvider {
    id: ProviderId,
    requirements: Requirements,
    updates: Arc<UpdateSignals>,
    tx: mpsc::UnboundedSender<Envelope>,
    next_id: Arc<AtomicU64>,
}

impl RemoteProvider {
    pub async fn connect(socket_path: impl AsRef<Path>) -> std::io::Result<Arc<Self>> {
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

        let updates = Arc::new(UpdateSignals::new());
        let next_id = Arc::new(AtomicU64::new(1));

        // One outstanding requirements query; later replies are lifecycle
        // acknowledgements and only logged.
        let (requirements_tx, requirements_rx) = oneshot::channel::<u8>();
        let requirements_call_id = next_id.fetch_add(1, Ordering::Relaxed);
        tx.send(Envelope::MethodCall {
            id: requirements_call_id,
            path: PROVIDER_PATH.to_string(),
            interface: wire::PROVIDER_INTERFACE.to_string(),
            member: "GetRequirements".to_string(),
            body: Value::Null,
        })
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "writer gone"))?;

        let signal_sink = updates.clone();
        tokio::spawn(async move {
            let mut requirements_tx = Some((requirements_call_id, requirements_tx));
            let mut reader = BufReader::new(read_half);
            loop {
                match wire::read_envelope(&mut reader).await {
                    Ok(Some(Envelope::MethodReturn { id, body })) => {
                        match requirements_tx.take() {
                            Some((want, sender)) if want == id => {
                                let bits = body.as_u64().unwrap_or_default() as u8;
                                let _ = sender.send(bits);
                            }
                            other => {
                                requirements_tx = other;
                                debug!("remote provider acknowledged call {id}");
                            }
                        }
                    }
                    Ok(Some(Envelope::Error { name, message, .. })) => {
                        warn!("remote provider failed a call: {name}: {message}");
                    }
                    Ok(Some(Envelope::Signal { member, body, .. })) => {
                        dispatch_remote_signal(&signal_sink, &member, body);
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                }
            }
            debug!("remote provider connection closed");
        });

        let bits = requirements_rx.await.unwrap_or_default();
        Ok(Arc::new(Self {
            id: ProviderId::allocate(),
            requirements: Requirements::from_bits_truncate(bits),
            updates,
            tx,
            next_id,
        }))
    }

    fn enqueue(&self, member: &str, body: Value) -> Result<(), ProviderError> {
        let envelope = Envelope::MethodCall {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: PROVIDER_PATH.to_string(),
            interface: wire::PROVIDER_INTERFACE.to_string(),
            member: member.to_string(),
            body,
        };
        self.tx
            .send(envelope)
            .map_err(|_| ProviderError::Failed("remote provider connection closed".to_string()))
    }
}

fn dispatch_remote_signal(updates: &UpdateSignals, member: &str, body: Value) {
    match member {
        "PositionChanged" => {
            if let Ok(update) = serde_json::from_value::<Update<Position>>(body) {
                updates.position.emit(&update);
            }
        }
        "HeadingChanged" => {
            if let Ok(update) = serde_json::from_value::<Update<Heading>>(body) {
                updates.heading.emit(&update);
            }
        }
        "VelocityChanged" => {
            if let Ok(update) = serde_json::from_value::<Update<Velocity>>(body) {
                updates.velocity.emit(&update);
            }
        }
        "SpaceVehiclesChanged" => {
            if let Ok(update) = serde_json::from_value::<Update<Vec<SpaceVehicle>>>(body) {
                updates.space_vehicles.emit(&update);
            }
        }
        other => debug!("unknown provider signal {other}"),
    }
}

impl Provider for RemoteProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn enable(&self) -> Result<(), ProviderError> {
        self.enqueue("Enable", Value::Null)
    }

    fn disable(&self) -> Result<(), ProviderError> {
        self.enqueue("Disable", Value::Null)
    }

    fn activate(&self) -> Result<(), ProviderError> {
        self.enqueue("Activate", Value::Null)
    }

    fn deactivate(&self) -> Result<(), ProviderError> {
        self.enqueue("Deactivate", Value::Null)
    }

    fn requirements(&self) -> Requirements {
        self.requirements
    }

    fn satisfies(&self, _criteria: &Criteria) -> bool {
        // The remote end re-checks at selection time; the stub stays
        // optimistic to keep the call synchronous.
        true
    }

    fn on_new_event(&self, event: &Event) {
        if let Err(e) = self.enqueue("OnNewEvent", json!(event)) {
            warn!("dropping event towards remote provider: {e}");
        }
    }

    fn updates(&self) -> &UpdateSignals {
        &self.updates
    }
}
