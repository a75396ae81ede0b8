//! Async driver: one tokio task owns the link and the engine.
//!
//! [`Driver`] is a cheap, cloneable handle. Every call becomes a request on
//! an mpsc channel; the actor task serializes them with link traffic and
//! timer wake-ups, so the engine state is never shared.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};
use zwave_cc::{NodeId, SecurityManager, ValueId};
use zwave_config::ConfigHandle;
use zwave_frame::{ErrorCode, Frame, SerialCodec};
use zwave_message::{ControllerId, ControllerVersion, Message, MessagePriority, SerialApiInitData};
use zwave_transport::TransportConfig;

use crate::config::DriverConfig;
use crate::engine::{ControllerStatus, EngineAction, TransactionEngine};
use crate::error::{DriverError, Result};
use crate::link::{self, LinkIo};
use crate::node::NodeStatus;
use crate::transaction::{TransactionId, TransactionOutcome};
use crate::values::{ValueDb, ValueEvent, ValueStore};

const REQUEST_CAPACITY: usize = 64;

/// Notifications for subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DriverEvent {
    Value(ValueEvent),
    Message(Message),
    NodeStatus {
        node: NodeId,
        status: NodeStatus,
    },
    ControllerStatus(ControllerStatus),
    Fault {
        #[serde(serialize_with = "serialize_code")]
        code: ErrorCode,
        message: String,
    },
}

fn serialize_code<S: Serializer>(
    code: &ErrorCode,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(code)
}

/// What the controller says about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    pub version: ControllerVersion,
    pub init_data: SerialApiInitData,
    pub id: ControllerId,
}

enum Request {
    Send {
        message: Message,
        priority: Option<MessagePriority>,
        accepted: oneshot::Sender<TransactionId>,
        reply: oneshot::Sender<Result<TransactionOutcome>>,
    },
    Cancel(TransactionId),
    MarkAsleep(NodeId),
    SetCanSleep(NodeId, bool),
    SchedulePoll {
        node: NodeId,
        message: Message,
        delay: Duration,
    },
    Shutdown,
}

/// A queued transaction the caller can wait for or cancel.
#[derive(Debug)]
pub struct PendingTransaction {
    pub id: TransactionId,
    reply: oneshot::Receiver<Result<TransactionOutcome>>,
}

impl PendingTransaction {
    pub async fn wait(self) -> Result<TransactionOutcome> {
        self.reply.await.unwrap_or(Err(DriverError::Shutdown))
    }
}

/// Options for spawning a [`Driver`].
#[derive(Default)]
pub struct DriverBuilder {
    config: DriverConfig,
    transport: TransportConfig,
    devices: Option<ConfigHandle>,
    security: Option<Arc<dyn SecurityManager>>,
    value_store: Option<Arc<dyn ValueStore>>,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn devices(mut self, devices: ConfigHandle) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn security(mut self, manager: Arc<dyn SecurityManager>) -> Self {
        self.security = Some(manager);
        self
    }

    pub fn value_store(mut self, store: Arc<dyn ValueStore>) -> Self {
        self.value_store = Some(store);
        self
    }

    /// Open a port by name and start the driver on it.
    pub async fn open(self, spec: &str) -> Result<Driver> {
        let io = link::connect(spec, &self.transport).await?;
        Ok(self.spawn(io))
    }

    /// Start the driver on an already connected stream. Must be called
    /// from within a tokio runtime.
    pub fn spawn<T: LinkIo>(self, io: T) -> Driver {
        let mut engine = TransactionEngine::with_config(self.config.clone());
        if let Some(devices) = self.devices {
            engine = engine.with_devices(devices);
        }
        if let Some(security) = self.security {
            engine = engine.with_security(security);
        }

        let mut values = ValueDb::new();
        if let Some(store) = &self.value_store {
            match store.load_all() {
                Ok(entries) => {
                    debug!(count = entries.len(), "restored cached values");
                    values.restore(entries);
                }
                Err(err) => warn!(error = %err, "could not load cached values"),
            }
        }

        let (requests, commands) = mpsc::channel(REQUEST_CAPACITY);
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let values = Arc::new(RwLock::new(values));

        let actor = Actor {
            engine,
            framed: Framed::new(io, SerialCodec::new()),
            commands,
            waiters: HashMap::new(),
            events: events.clone(),
            values: Arc::clone(&values),
            store: self.value_store,
        };
        let task = tokio::spawn(actor.run());

        Driver {
            requests,
            events,
            values,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Handle to a running driver.
#[derive(Clone)]
pub struct Driver {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<DriverEvent>,
    values: Arc<RwLock<ValueDb>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Driver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Send a message at its default priority and wait for the outcome.
    pub async fn send(&self, message: Message) -> Result<TransactionOutcome> {
        self.submit(message, None).await?.wait().await
    }

    pub async fn send_with_priority(
        &self,
        message: Message,
        priority: MessagePriority,
    ) -> Result<TransactionOutcome> {
        self.submit(message, Some(priority)).await?.wait().await
    }

    /// Queue a message without waiting for it to complete.
    pub async fn submit(
        &self,
        message: Message,
        priority: Option<MessagePriority>,
    ) -> Result<PendingTransaction> {
        let (accepted, id) = oneshot::channel();
        let (reply, result) = oneshot::channel();
        self.request(Request::Send {
            message,
            priority,
            accepted,
            reply,
        })
        .await?;
        let id = id.await.map_err(|_| DriverError::Shutdown)?;
        Ok(PendingTransaction { id, reply: result })
    }

    pub async fn cancel(&self, id: TransactionId) -> Result<()> {
        self.request(Request::Cancel(id)).await
    }

    pub async fn mark_asleep(&self, node: NodeId) -> Result<()> {
        self.request(Request::MarkAsleep(node)).await
    }

    /// Tell the driver whether a node needs a wake-up before it listens.
    pub async fn set_node_can_sleep(&self, node: NodeId, can_sleep: bool) -> Result<()> {
        self.request(Request::SetCanSleep(node, can_sleep)).await
    }

    /// Send `message` to `node` once `delay` has passed.
    pub async fn schedule_poll(&self, node: NodeId, message: Message, delay: Duration) -> Result<()> {
        self.request(Request::SchedulePoll {
            node,
            message,
            delay,
        })
        .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.events.subscribe()
    }

    pub fn value(&self, id: &ValueId) -> Option<Value> {
        self.values.read().ok()?.get(id).cloned()
    }

    pub fn node_values(&self, node: NodeId) -> Vec<(ValueId, Value)> {
        self.values
            .read()
            .map(|values| {
                values
                    .node_values(node)
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Query version, capabilities and network identity.
    pub async fn controller_info(&self) -> Result<ControllerInfo> {
        let version = match self.send(Message::GetControllerVersion).await?.response {
            Some(Message::GetControllerVersionResponse(version)) => version,
            other => return Err(unexpected("GetControllerVersion", other)),
        };
        let init_data = match self.send(Message::GetSerialApiInitData).await?.response {
            Some(Message::GetSerialApiInitDataResponse(data)) => data,
            other => return Err(unexpected("GetSerialApiInitData", other)),
        };
        let id = match self.send(Message::GetControllerId).await?.response {
            Some(Message::GetControllerIdResponse(id)) => id,
            other => return Err(unexpected("GetControllerId", other)),
        };
        Ok(ControllerInfo {
            version,
            init_data,
            id,
        })
    }

    /// Fail everything pending and stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        // already stopped is fine
        let _ = self.requests.send(Request::Shutdown).await;
        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            task.await
                .map_err(|err| DriverError::Dropped(format!("driver task failed: {err}")))?;
        }
        Ok(())
    }

    async fn request(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| DriverError::Shutdown)
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("closed", &self.requests.is_closed())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

fn unexpected(query: &str, response: Option<Message>) -> DriverError {
    let got = response.map_or_else(|| "nothing".to_string(), |message| message.to_string());
    DriverError::Dropped(format!("{query} answered with {got}"))
}

/// Engine time follows tokio's clock so paused test time drives timeouts.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

struct Actor<T> {
    engine: TransactionEngine,
    framed: Framed<T, SerialCodec>,
    commands: mpsc::Receiver<Request>,
    waiters: HashMap<TransactionId, oneshot::Sender<Result<TransactionOutcome>>>,
    events: broadcast::Sender<DriverEvent>,
    values: Arc<RwLock<ValueDb>>,
    store: Option<Arc<dyn ValueStore>>,
}

impl<T: LinkIo> Actor<T> {
    async fn run(mut self) {
        info!("driver started");
        // a NAK makes the controller drop anything half-received
        if let Err(err) = self.framed.send(Frame::Nak).await {
            error!(error = %err, "cannot write to controller");
            self.stop().await;
            return;
        }

        loop {
            let deadline = self.engine.next_deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending().await,
                }
            };

            let actions = tokio::select! {
                request = self.commands.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.on_request(request),
                },
                event = self.framed.next() => match event {
                    Some(Ok(event)) => self.engine.on_read_event(event, now()),
                    Some(Err(err)) => {
                        error!(error = %err, "link failed");
                        self.emit_fault(&DriverError::Frame(err));
                        break;
                    }
                    None => {
                        info!("controller closed the link");
                        break;
                    }
                },
                () = timer => self.engine.poll(now()),
            };

            if let Err(err) = self.execute(actions).await {
                error!(error = %err, "cannot write to controller");
                self.emit_fault(&err);
                break;
            }
        }
        self.stop().await;
    }

    fn on_request(&mut self, request: Request) -> Vec<EngineAction> {
        let now = now();
        match request {
            Request::Send {
                message,
                priority,
                accepted,
                reply,
            } => {
                let (id, actions) = self.engine.enqueue(message, priority, now);
                self.waiters.insert(id, reply);
                let _ = accepted.send(id);
                actions
            }
            Request::Cancel(id) => self.engine.cancel(id, now),
            Request::MarkAsleep(node) => self.engine.mark_asleep(node, now),
            Request::SetCanSleep(node, can_sleep) => {
                self.engine.set_node_can_sleep(node, can_sleep);
                Vec::new()
            }
            Request::SchedulePoll {
                node,
                message,
                delay,
            } => {
                self.engine.schedule_poll(node, message, now + delay);
                Vec::new()
            }
            Request::Shutdown => Vec::new(),
        }
    }

    async fn execute(&mut self, actions: Vec<EngineAction>) -> Result<()> {
        for action in actions {
            match action {
                EngineAction::Write(frame) => self.framed.send(frame).await?,
                EngineAction::Resolve { id, result } => match self.waiters.remove(&id) {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => debug!(id, "transaction had no waiter"),
                },
                EngineAction::Deliver(message) => self.deliver(message),
                EngineAction::NodeStatusChanged { node, status } => {
                    let _ = self.events.send(DriverEvent::NodeStatus { node, status });
                }
                EngineAction::ControllerStatusChanged(status) => {
                    let _ = self.events.send(DriverEvent::ControllerStatus(status));
                }
                EngineAction::Fault(err) => self.emit_fault(&err),
            }
        }
        Ok(())
    }

    fn deliver(&mut self, message: Message) {
        if let Message::ApplicationCommand(request) = &message {
            if let Some(node) = request.source() {
                let events = match self.values.write() {
                    Ok(mut values) => values.apply_report(node, &request.command),
                    Err(_) => Vec::new(),
                };
                for event in events {
                    self.persist(&event);
                    let _ = self.events.send(DriverEvent::Value(event));
                }
            }
        }
        let _ = self.events.send(DriverEvent::Message(message));
    }

    fn persist(&self, event: &ValueEvent) {
        let Some(store) = &self.store else {
            return;
        };
        let result = match event {
            ValueEvent::Added { id, value } | ValueEvent::Updated { id, value, .. } => {
                store.store(id, value)
            }
            ValueEvent::Removed { id, .. } => store.remove(id),
            ValueEvent::MetadataUpdated { .. } => Ok(()),
        };
        if let Err(err) = result {
            warn!(id = ?event.id(), error = %err, "value store failed");
        }
    }

    fn emit_fault(&self, err: &DriverError) {
        let _ = self.events.send(DriverEvent::Fault {
            code: err.code(),
            message: err.to_string(),
        });
    }

    async fn stop(&mut self) {
        let actions = self.engine.shutdown();
        // the link may already be gone; callers still get their results
        for action in actions {
            match action {
                EngineAction::Write(frame) => {
                    let _ = self.framed.send(frame).await;
                }
                EngineAction::Resolve { id, result } => {
                    if let Some(waiter) = self.waiters.remove(&id) {
                        let _ = waiter.send(result);
                    }
                }
                _ => {}
            }
        }
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.send(Err(DriverError::Shutdown));
        }
        self.commands.close();
        while let Ok(request) = self.commands.try_recv() {
            if let Request::Send { reply, .. } = request {
                let _ = reply.send(Err(DriverError::Shutdown));
            }
        }
        info!("driver stopped");
    }
}
