//! Sans-IO transaction engine.
//!
//! The engine owns the send queue, the single in-flight transaction, the
//! callback id counter, the partial report accumulators and the per-node
//! state. It never touches the link or a clock itself: every entry point
//! takes `now` and returns the [`EngineAction`]s the caller must carry out,
//! in order. The async driver feeds it link events and timer wake-ups; tests
//! feed it frames directly.
//!
//! One transaction runs at a time. It moves through
//! ACK → response → callback → node report, skipping the steps its message
//! does not expect. Link failures (CAN, NAK, missing ACK) resend the same
//! frame a bounded number of times. Transmission failures start a fresh
//! attempt with a new callback id, up to the message's attempt budget. A
//! missing SendData callback is followed by exactly one SendDataAbort before
//! the attempt counts as failed.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace, warn};
use zwave_cc::cc::manufacturer_specific::ManufacturerSpecificCommand;
use zwave_cc::cc::thermostat_setpoint::ThermostatSetpointCommand;
use zwave_cc::cc::version::VersionCommand;
use zwave_cc::cc::wake_up::WakeUpCommand;
use zwave_cc::{Assembly, Command, CommandClass, NodeId, PartialAssembler, SecurityManager};
use zwave_config::{ConfigHandle, DeviceKey};
use zwave_frame::{DataFrame, Frame, ReadEvent};
use zwave_message::{
    ApplicationCommandRequest, Message, MessageContext, MessageError, MessagePriority,
    SendDataRequest, UpdateKind,
};

use crate::callback_id::CallbackIdAllocator;
use crate::config::DriverConfig;
use crate::context::DriverContext;
use crate::error::{DriverError, Result, Stage};
use crate::node::{NodeRegistry, NodeStatus};
use crate::queue::TransactionQueue;
use crate::transaction::{Transaction, TransactionId, TransactionOutcome, TransactionState};

/// Whether the controller's radio is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStatus {
    #[default]
    Ready,
    /// The last transmission failed outright. Sends are held back.
    Jammed,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Jammed => "jammed",
        })
    }
}

/// Work the caller must perform on the engine's behalf.
#[derive(Debug)]
pub enum EngineAction {
    Write(Frame),
    /// A transaction is finished. Sent exactly once per enqueued id.
    Resolve {
        id: TransactionId,
        result: Result<TransactionOutcome>,
    },
    /// A decoded message for subscribers: unsolicited traffic and every
    /// application command, including those that completed a transaction.
    Deliver(Message),
    NodeStatusChanged {
        node: NodeId,
        status: NodeStatus,
    },
    ControllerStatusChanged(ControllerStatus),
    /// Something went wrong that belongs to no transaction.
    Fault(DriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingForAck,
    WaitingForResponse,
    WaitingForCallback,
    WaitingForNode,
    /// Resend the same frame when the deadline passes.
    LinkBackoff,
    /// Start a new attempt when the deadline passes.
    RetryBackoff,
    /// SendDataAbort written, waiting for its ACK.
    Aborting,
}

/// What happens once an abort has been acknowledged.
#[derive(Debug)]
enum AfterAbort {
    /// Treat the attempt as failed with this error; it may be retried.
    Retry(DriverError),
    /// Fail the transaction without retrying.
    Fail(DriverError),
}

#[derive(Debug)]
struct Active {
    tx: Transaction,
    phase: Phase,
    deadline: Instant,
    /// The frame of the current attempt, for link-level resends.
    frame: Frame,
    link_attempts: u8,
    outcome: TransactionOutcome,
    after_abort: Option<AfterAbort>,
    /// Set by cancel or sleep while the transaction cannot be stopped yet.
    interrupt: Option<DriverError>,
}

pub struct TransactionEngine {
    config: DriverConfig,
    own_node_id: NodeId,
    queue: TransactionQueue,
    nodes: NodeRegistry,
    callback_ids: CallbackIdAllocator,
    assembler: PartialAssembler,
    security: Option<Arc<dyn SecurityManager>>,
    devices: Option<ConfigHandle>,
    controller_status: ControllerStatus,
    jammed_since: Option<Instant>,
    hold_until: Option<Instant>,
    active: Option<Active>,
    next_id: TransactionId,
    next_seq: u64,
}

fn context<'a>(
    own_node_id: NodeId,
    nodes: &'a NodeRegistry,
    security: &'a Option<Arc<dyn SecurityManager>>,
) -> DriverContext<'a> {
    DriverContext {
        own_node_id,
        nodes,
        security: security.as_ref(),
    }
}

impl TransactionEngine {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            config,
            own_node_id: 1,
            queue: TransactionQueue::new(),
            nodes: NodeRegistry::new(),
            callback_ids: CallbackIdAllocator::new(),
            assembler: PartialAssembler::new(),
            security: None,
            devices: None,
            controller_status: ControllerStatus::Ready,
            jammed_since: None,
            hold_until: None,
            active: None,
            next_id: 1,
            next_seq: 0,
        }
    }

    pub fn with_security(mut self, manager: Arc<dyn SecurityManager>) -> Self {
        self.security = Some(manager);
        self
    }

    pub fn with_devices(mut self, devices: ConfigHandle) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn own_node_id(&self) -> NodeId {
        self.own_node_id
    }

    pub fn set_own_node_id(&mut self, node: NodeId) {
        self.own_node_id = node;
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn set_node_can_sleep(&mut self, node: NodeId, can_sleep: bool) {
        self.nodes.set_can_sleep(node, can_sleep);
    }

    pub fn controller_status(&self) -> ControllerStatus {
        self.controller_status
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> TransactionState {
        match self.active.as_ref().map(|active| active.phase) {
            None => TransactionState::Idle,
            Some(Phase::WaitingForNode) => TransactionState::WaitingForNode,
            Some(_) => TransactionState::Sending,
        }
    }

    /// Parse context for decoding and encoding outside the engine.
    pub fn cc_context(&self) -> DriverContext<'_> {
        context(self.own_node_id, &self.nodes, &self.security)
    }

    /// Queue a message. The returned id appears in exactly one
    /// [`EngineAction::Resolve`].
    pub fn enqueue(
        &mut self,
        message: Message,
        priority: Option<MessagePriority>,
        now: Instant,
    ) -> (TransactionId, Vec<EngineAction>) {
        let id = self.next_id;
        self.next_id += 1;
        let mut actions = Vec::new();

        if self.queue.len() >= self.config.queue_capacity {
            warn!(id, %message, "queue full, dropping message");
            actions.push(EngineAction::Resolve {
                id,
                result: Err(DriverError::Dropped("queue is full".into())),
            });
            return (id, actions);
        }

        let seq = self.take_seq();
        let tx = Transaction::new(id, seq, message, priority, now);
        debug!(id, priority = %tx.priority, message = %tx.message, "queued");
        self.queue.push(tx);
        self.try_start(now, &mut actions);
        (id, actions)
    }

    /// Ask a node for something later, e.g. a status report after a Set.
    pub fn schedule_poll(&mut self, node: NodeId, message: Message, due: Instant) {
        debug!(node, %message, "poll scheduled");
        self.nodes.schedule_poll(node, message, due);
    }

    /// Handle one decoder event from the link.
    pub fn on_read_event(&mut self, event: ReadEvent, now: Instant) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        match event {
            ReadEvent::Frame(Frame::Ack) => self.on_ack(now, &mut actions),
            ReadEvent::Frame(frame @ (Frame::Nak | Frame::Can)) => {
                self.on_rejected(&frame, now, &mut actions)
            }
            ReadEvent::Frame(Frame::Data(frame)) => {
                actions.push(EngineAction::Write(Frame::Ack));
                self.on_data(&frame, now, &mut actions);
            }
            ReadEvent::Corrupt(err) => {
                warn!(error = %err, "corrupt frame, sending NAK");
                actions.push(EngineAction::Write(Frame::Nak));
            }
            ReadEvent::Discarded(bytes) => {
                warn!(len = bytes.len(), bytes = ?bytes.as_ref(), "discarded bytes");
            }
        }
        self.try_start(now, &mut actions);
        actions
    }

    /// Fire whatever timers have expired by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        if let Some(since) = self.jammed_since {
            if now >= since + self.config.jam_timeout {
                info!("jam timeout elapsed, controller assumed ready");
                self.set_ready(&mut actions);
            }
        }

        if self
            .active
            .as_ref()
            .is_some_and(|active| now >= active.deadline)
        {
            self.on_deadline(now, &mut actions);
        }

        for poll in self.nodes.take_due_polls(now) {
            let seq = self.take_seq();
            let id = self.next_id;
            self.next_id += 1;
            let tx = Transaction::new(id, seq, poll.message, Some(MessagePriority::Poll), now);
            debug!(id, message = %tx.message, "poll due");
            self.queue.push(tx);
        }

        self.try_start(now, &mut actions);
        actions
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let active = self.active.as_ref().map(|active| active.deadline);
        let hold = self
            .hold_until
            .filter(|_| self.active.is_none() && !self.queue.is_empty());
        let jam = self
            .jammed_since
            .map(|since| since + self.config.jam_timeout);
        [active, hold, jam, self.nodes.next_poll_due()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Cancel a transaction. Queued and parked ones resolve at once; the
    /// active one goes through the abort path first.
    pub fn cancel(&mut self, id: TransactionId, now: Instant) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        if let Some(tx) = self
            .queue
            .remove(id)
            .or_else(|| self.nodes.remove_parked(id))
        {
            debug!(id, message = %tx.message, "cancelled before sending");
            actions.push(EngineAction::Resolve {
                id,
                result: Err(DriverError::Cancelled),
            });
        } else if self.active.as_ref().is_some_and(|active| active.tx.id == id) {
            self.interrupt(DriverError::Cancelled, now, &mut actions);
        }
        self.try_start(now, &mut actions);
        actions
    }

    /// The node is asleep. Its queued transactions wait for the next wake
    /// up; an in-flight transaction for it is aborted and fails.
    pub fn mark_asleep(&mut self, node: NodeId, now: Instant) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        self.set_status(node, NodeStatus::Asleep, &mut actions);
        self.nodes.entry(node).awake_session = false;
        for tx in self.queue.drain_for_node(node) {
            debug!(id = tx.id, node, "parking until wake up");
            self.nodes.park(node, tx);
        }
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.tx.target_node() == Some(node))
        {
            self.interrupt(DriverError::NodeAsleep(node), now, &mut actions);
        }
        self.try_start(now, &mut actions);
        actions
    }

    /// Fail everything. The engine stays usable afterwards.
    pub fn shutdown(&mut self) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        if let Some(active) = self.active.take() {
            if active.phase == Phase::WaitingForCallback && active.tx.needs_abort_on_missing_callback()
            {
                actions.push(EngineAction::Write(abort_frame()));
            }
            actions.push(EngineAction::Resolve {
                id: active.tx.id,
                result: Err(DriverError::Shutdown),
            });
        }
        let mut pending = self.queue.drain();
        pending.extend(self.nodes.take_all_parked());
        pending.sort_by_key(|tx| tx.id);
        actions.extend(pending.into_iter().map(|tx| EngineAction::Resolve {
            id: tx.id,
            result: Err(DriverError::Shutdown),
        }));
        actions
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn try_start(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        while self.active.is_none() {
            if self.hold_until.is_some_and(|until| now < until) {
                return;
            }
            let Some(tx) = self.queue.pop() else {
                return;
            };
            if let Some(node) = tx.target_node() {
                if self.nodes.status(node) == NodeStatus::Asleep && self.nodes.can_sleep(node) {
                    debug!(id = tx.id, node, "node asleep, parking");
                    self.nodes.park(node, tx);
                    continue;
                }
            }
            self.start_attempt(tx, now, actions);
        }
    }

    /// Serialize and write a new attempt of `tx`.
    fn start_attempt(&mut self, mut tx: Transaction, now: Instant, actions: &mut Vec<EngineAction>) {
        tx.attempts += 1;
        if tx.message.needs_callback_id() && tx.message.callback_id().is_none() {
            tx.message.set_callback_id(self.callback_ids.next_id());
        }
        let ctx = context(self.own_node_id, &self.nodes, &self.security);
        let frame = match tx.message.to_frame(&ctx) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(id = tx.id, error = %err, "cannot serialize message");
                actions.push(EngineAction::Resolve {
                    id: tx.id,
                    result: Err(err.into()),
                });
                return;
            }
        };
        debug!(
            id = tx.id,
            attempt = tx.attempts,
            max = tx.max_attempts(),
            message = %tx.message,
            "sending"
        );
        actions.push(EngineAction::Write(frame.clone()));
        self.active = Some(Active {
            tx,
            phase: Phase::WaitingForAck,
            deadline: now + self.config.ack_timeout,
            frame,
            link_attempts: 1,
            outcome: TransactionOutcome::default(),
            after_abort: None,
            interrupt: None,
        });
    }

    fn on_ack(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        match self.active.as_ref().map(|active| active.phase) {
            Some(Phase::WaitingForAck) => {
                trace!("ACK");
                self.after_ack(now, actions);
            }
            Some(Phase::Aborting) => self.after_abort(now, actions),
            _ => trace!("unexpected ACK"),
        }
    }

    fn on_rejected(&mut self, frame: &Frame, now: Instant, actions: &mut Vec<EngineAction>) {
        match self.active.as_ref().map(|active| active.phase) {
            Some(Phase::WaitingForAck) => {
                debug!(%frame, "controller rejected frame");
                self.link_retry(now, actions);
            }
            Some(Phase::Aborting) => self.after_abort(now, actions),
            _ => trace!(%frame, "unexpected control byte"),
        }
    }

    /// Resend the current frame or give up on the link.
    fn link_retry(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let max = self.config.max_link_attempts;
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.link_attempts >= max {
            warn!(id = active.tx.id, attempts = max, "controller never acknowledged");
            self.attempt_failed(DriverError::MessageTimeout(Stage::Ack), now, actions);
            return;
        }
        let delay = self.config.retry_delay(active.link_attempts);
        active.phase = Phase::LinkBackoff;
        active.deadline = now + delay;
        debug!(id = active.tx.id, ?delay, "resending after back-off");
    }

    fn on_deadline(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.phase {
            Phase::WaitingForAck => self.link_retry(now, actions),
            Phase::WaitingForResponse => {
                self.attempt_failed(DriverError::MessageTimeout(Stage::Response), now, actions)
            }
            Phase::WaitingForCallback => {
                let err = DriverError::MessageTimeout(Stage::Callback);
                if active.tx.needs_abort_on_missing_callback() {
                    self.start_abort(AfterAbort::Retry(err), now, actions);
                } else {
                    self.attempt_failed(err, now, actions);
                }
            }
            Phase::WaitingForNode => {
                let node = active.tx.target_node().unwrap_or_default();
                self.attempt_failed(DriverError::NodeTimeout(node), now, actions);
            }
            Phase::LinkBackoff => {
                active.link_attempts += 1;
                active.phase = Phase::WaitingForAck;
                active.deadline = now + self.config.ack_timeout;
                debug!(id = active.tx.id, attempt = active.link_attempts, "resending frame");
                actions.push(EngineAction::Write(active.frame.clone()));
            }
            Phase::RetryBackoff => {
                if let Some(active) = self.active.take() {
                    self.start_attempt(active.tx, now, actions);
                }
            }
            Phase::Aborting => self.after_abort(now, actions),
        }
    }

    fn start_abort(&mut self, then: AfterAbort, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        debug!(id = active.tx.id, "aborting transmission");
        actions.push(EngineAction::Write(abort_frame()));
        active.phase = Phase::Aborting;
        active.deadline = now + self.config.ack_timeout;
        active.after_abort = Some(then);
    }

    fn after_abort(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(then) = self.active.as_mut().and_then(|active| active.after_abort.take()) else {
            return;
        };
        match then {
            AfterAbort::Retry(err) => self.attempt_failed(err, now, actions),
            AfterAbort::Fail(err) => self.finish(Err(err), now, actions),
        }
    }

    /// Stop the active transaction as soon as the link allows.
    fn interrupt(&mut self, err: DriverError, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        debug!(id = active.tx.id, reason = %err, "interrupting transaction");
        match active.phase {
            Phase::LinkBackoff | Phase::RetryBackoff => self.finish(Err(err), now, actions),
            Phase::WaitingForCallback | Phase::WaitingForNode
                if active.tx.needs_abort_on_missing_callback() =>
            {
                self.start_abort(AfterAbort::Fail(err), now, actions)
            }
            Phase::WaitingForNode => self.finish(Err(err), now, actions),
            Phase::Aborting => {
                active.after_abort = Some(AfterAbort::Fail(err));
            }
            Phase::WaitingForAck | Phase::WaitingForResponse | Phase::WaitingForCallback => {
                active.interrupt = Some(err);
            }
        }
    }

    fn after_ack(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.tx.message.expected_response().is_some() {
            active.phase = Phase::WaitingForResponse;
            active.deadline = now + self.config.response_timeout;
        } else {
            self.after_response(now, actions);
        }
    }

    fn after_response(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.tx.message.expected_callback().is_none() {
            self.after_callback(now, actions);
            return;
        }
        if let Some(err) = active.interrupt.take() {
            if active.tx.needs_abort_on_missing_callback() {
                self.start_abort(AfterAbort::Fail(err), now, actions);
            } else {
                active.interrupt = Some(err);
                active.phase = Phase::WaitingForCallback;
                active.deadline = now + self.config.callback_timeout;
            }
            return;
        }
        active.phase = Phase::WaitingForCallback;
        active.deadline = now + self.config.callback_timeout;
    }

    fn after_callback(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.tx.message.expects_node_update() || active.outcome.node_update.is_some() {
            self.finish(Ok(()), now, actions);
            return;
        }
        if let Some(err) = active.interrupt.take() {
            self.finish(Err(err), now, actions);
            return;
        }
        let timeout = active
            .tx
            .target_node()
            .and_then(|node| self.nodes.get(node))
            .map_or(self.config.node_report_timeout, |state| {
                state.report_timeout(self.config.node_report_timeout)
            });
        active.phase = Phase::WaitingForNode;
        active.deadline = now + timeout;
    }

    /// The current attempt failed: retry if the budget allows.
    fn attempt_failed(&mut self, err: DriverError, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if let Some(interrupt) = active.interrupt.take() {
            self.finish(Err(interrupt), now, actions);
            return;
        }
        if !err.is_retryable() || active.tx.attempts >= active.tx.max_attempts() {
            self.finish(Err(err), now, actions);
            return;
        }

        let mut delay = self.config.retry_delay(active.tx.attempts);
        if let Some(until) = self.hold_until {
            delay = delay.max(until.saturating_duration_since(now));
        }
        debug!(
            id = active.tx.id,
            attempt = active.tx.attempts,
            error = %err,
            ?delay,
            "attempt failed, retrying"
        );
        active.tx.message.prepare_retransmission();
        active.outcome = TransactionOutcome::default();
        active.phase = Phase::RetryBackoff;
        active.deadline = now + delay;
    }

    /// Resolve the active transaction and update node bookkeeping.
    fn finish(&mut self, result: Result<()>, now: Instant, actions: &mut Vec<EngineAction>) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let result = match (result, active.interrupt.take()) {
            (Ok(()), Some(err)) => Err(err),
            (result, _) => result,
        };
        let id = active.tx.id;
        let node = active.tx.target_node();

        match &result {
            Ok(()) => {
                debug!(id, message = %active.tx.message, "transaction complete");
                self.learn_from_outcome(&active.tx.message, &active.outcome);
                if let Some(node) = node {
                    self.nodes.entry(node).consecutive_failures = 0;
                    if !active.tx.ends_wake_up {
                        self.set_status(node, NodeStatus::Alive, actions);
                    }
                }
            }
            Err(err) => {
                debug!(id, message = %active.tx.message, error = %err, "transaction failed");
                self.note_setpoint_timeout(&active.tx.message, err);
                if let Some(node) = node.filter(|_| err.implicates_node()) {
                    if self.nodes.can_sleep(node) && !active.tx.ends_wake_up {
                        info!(node, "node did not answer, assuming it fell asleep");
                        self.set_status(node, NodeStatus::Asleep, actions);
                        self.nodes.entry(node).awake_session = false;
                        let mut tx = active.tx;
                        tx.attempts = 0;
                        tx.message.prepare_retransmission();
                        self.nodes.park(node, tx);
                        for queued in self.queue.drain_for_node(node) {
                            self.nodes.park(node, queued);
                        }
                        return;
                    }
                    self.count_node_failure(node, actions);
                }
            }
        }

        if active.tx.ends_wake_up {
            if let Some(node) = node {
                self.set_status(node, NodeStatus::Asleep, actions);
            }
        }

        actions.push(EngineAction::Resolve {
            id,
            result: result.map(|()| active.outcome),
        });
        if let Some(node) = node {
            self.maybe_end_wake_up(node, now);
        }
    }

    fn count_node_failure(&mut self, node: NodeId, actions: &mut Vec<EngineAction>) {
        let threshold = self.config.node_failure_threshold;
        let state = self.nodes.entry(node);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let failures = state.consecutive_failures;
        // a jammed radio says nothing about the node
        if failures < threshold || self.controller_status == ControllerStatus::Jammed {
            return;
        }
        warn!(node, failures, "node presumed dead");
        self.set_status(node, NodeStatus::Dead, actions);
        self.nodes.clear_polls(node);
        self.assembler.discard_for_node(node);
        let mut dropped = self.queue.drain_for_node(node);
        dropped.extend(self.nodes.take_parked(node));
        for tx in dropped {
            actions.push(EngineAction::Resolve {
                id: tx.id,
                result: Err(DriverError::Dropped(format!("node {node} is dead"))),
            });
        }
    }

    fn learn_from_outcome(&mut self, sent: &Message, outcome: &TransactionOutcome) {
        match (sent, &outcome.response) {
            (
                Message::GetNodeProtocolInfo { node_id },
                Some(Message::GetNodeProtocolInfoResponse(info)),
            ) if info.is_present() => {
                self.nodes.set_can_sleep(*node_id, info.can_sleep());
            }
            (Message::GetControllerId, Some(Message::GetControllerIdResponse(id))) => {
                self.own_node_id = id.own_node_id;
            }
            _ => {}
        }
    }

    fn note_setpoint_timeout(&mut self, sent: &Message, err: &DriverError) {
        let DriverError::NodeTimeout(node) = err else {
            return;
        };
        let Some(cc) = sent.command_class() else {
            return;
        };
        if let Command::ThermostatSetpoint(ThermostatSetpointCommand::Get { setpoint_type }) =
            cc.innermost().command
        {
            if let Some(probe) = self.nodes.setpoint_probe_mut(*node) {
                probe.on_timeout(setpoint_type);
            }
        }
    }

    fn on_data(&mut self, frame: &DataFrame, now: Instant, actions: &mut Vec<EngineAction>) {
        let ctx = context(self.own_node_id, &self.nodes, &self.security);
        let message = match Message::from_frame(frame, &MessageContext::controller(&ctx)) {
            Ok(message) => message,
            Err(err) => {
                log_decode_error(frame, &err);
                return;
            }
        };
        trace!(%message, "received");

        match message {
            Message::ApplicationCommand(request) => {
                self.on_application_command(request, now, actions)
            }
            Message::ApplicationUpdate(ref update) => {
                if update.kind == UpdateKind::NodeInfoReceived {
                    self.on_node_activity(update.node_id, actions);
                }
                if !self.match_active(&message, now, actions) {
                    actions.push(EngineAction::Deliver(message));
                }
            }
            message => {
                if !self.match_active(&message, now, actions) {
                    debug!(%message, "unsolicited message");
                    actions.push(EngineAction::Deliver(message));
                }
            }
        }
    }

    /// Offer a controller message to the active transaction as its
    /// response or callback. Returns whether it was consumed.
    fn match_active(
        &mut self,
        message: &Message,
        now: Instant,
        actions: &mut Vec<EngineAction>,
    ) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let sent = &active.tx.message;
        match active.phase {
            Phase::WaitingForResponse
                if sent
                    .expected_response()
                    .is_some_and(|expect| expect.matches(sent, message)) =>
            {
                active.outcome.response = Some(message.clone());
                if message.is_ok() {
                    self.after_response(now, actions);
                } else {
                    let kind = message.kind();
                    self.attempt_failed(DriverError::ResponseNok { kind }, now, actions);
                }
                true
            }
            Phase::WaitingForCallback
                if sent
                    .expected_callback()
                    .is_some_and(|expect| expect.matches(sent, message)) =>
            {
                active.outcome.callback = Some(message.clone());
                let status = message.transmit_status();
                match status {
                    Some(status) if status.is_jam() => self.set_jammed(now, actions),
                    Some(status) if status.is_ok() => self.set_ready(actions),
                    _ => {}
                }
                if message.is_ok() {
                    self.after_callback(now, actions);
                } else {
                    let kind = message.kind();
                    self.attempt_failed(DriverError::CallbackNok { kind, status }, now, actions);
                }
                true
            }
            _ => false,
        }
    }

    fn on_application_command(
        &mut self,
        mut request: ApplicationCommandRequest,
        now: Instant,
        actions: &mut Vec<EngineAction>,
    ) {
        let source = request.source();
        if let Some(node) = source {
            self.on_node_activity(node, actions);
        }

        match self.assembler.assemble(request.command) {
            Ok(Assembly::Complete(command)) => request.command = command,
            Ok(Assembly::Incomplete) => return,
            Err(err) => {
                warn!(error = %err, ?source, "partial report merge failed");
                actions.push(EngineAction::Fault(MessageError::from(err).into()));
                return;
            }
        }

        if let Some(node) = source {
            self.learn_from_report(node, &request.command, now);
        }

        let message = Message::ApplicationCommand(request);
        if let Some(active) = self.active.as_mut() {
            if active.tx.message.is_expected_node_update(&message) {
                trace!(id = active.tx.id, "node report arrived");
                active.outcome.node_update = Some(message.clone());
                if active.phase == Phase::WaitingForNode {
                    self.finish(Ok(()), now, actions);
                }
            }
        }
        actions.push(EngineAction::Deliver(message));
    }

    /// The node just talked to us, so it is awake.
    fn on_node_activity(&mut self, node: NodeId, actions: &mut Vec<EngineAction>) {
        let was = self.nodes.status(node);
        self.nodes.entry(node).consecutive_failures = 0;
        self.set_status(node, NodeStatus::Alive, actions);
        if was == NodeStatus::Asleep {
            self.requeue_parked(node);
        }
    }

    fn requeue_parked(&mut self, node: NodeId) {
        let parked = self.nodes.take_parked(node);
        if !parked.is_empty() {
            debug!(node, count = parked.len(), "node awake, re-queueing");
        }
        for tx in parked {
            self.queue.push(tx);
        }
    }

    fn learn_from_report(&mut self, node: NodeId, cc: &CommandClass, now: Instant) {
        let data = cc.innermost();
        match &data.command {
            Command::Version(VersionCommand::CommandClassReport {
                requested_cc,
                version,
            }) => {
                self.nodes
                    .set_cc_version(node, data.endpoint, u16::from(*requested_cc), *version);
            }
            Command::ManufacturerSpecific(ManufacturerSpecificCommand::Report {
                manufacturer_id,
                product_type,
                product_id,
            }) => {
                let key = DeviceKey::new(*manufacturer_id, *product_type, *product_id);
                match self.devices.as_ref().and_then(|devices| devices.lookup(&key)) {
                    Some(device) => {
                        debug!(node, %key, label = %device.label, "device identified");
                        self.nodes.set_device(node, device);
                    }
                    None => debug!(node, %key, "no device file"),
                }
            }
            Command::ThermostatSetpoint(ThermostatSetpointCommand::SupportedReport {
                bitmask,
                ..
            }) => {
                if self.nodes.setpoint_probe_mut(node).is_none() {
                    self.nodes.start_setpoint_probe(node, bitmask);
                }
            }
            Command::ThermostatSetpoint(ThermostatSetpointCommand::Report {
                setpoint_type,
                value: Some(_),
            }) => {
                if let Some(probe) = self.nodes.setpoint_probe_mut(node) {
                    probe.on_report(*setpoint_type);
                }
            }
            Command::WakeUp(WakeUpCommand::Notification) => {
                debug!(node, "wake up notification");
                self.nodes.set_can_sleep(node, true);
                self.nodes.entry(node).awake_session = true;
                self.maybe_end_wake_up(node, now);
            }
            _ => {}
        }
    }

    /// Send the node back to sleep once nothing is left for it.
    fn maybe_end_wake_up(&mut self, node: NodeId, now: Instant) {
        let Some(state) = self.nodes.get(node) else {
            return;
        };
        if !state.awake_session {
            return;
        }
        let busy = self.queue.has_node(node)
            || self.nodes.has_pending_messages(node)
            || self
                .active
                .as_ref()
                .is_some_and(|active| active.tx.target_node() == Some(node));
        if busy {
            return;
        }
        let send = state.sends_no_more_information();
        self.nodes.entry(node).awake_session = false;
        if !send {
            debug!(node, "device stays awake, not sending no more information");
            return;
        }

        let message: Message =
            SendDataRequest::new(CommandClass::new(node, WakeUpCommand::NoMoreInformation)).into();
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.take_seq();
        let mut tx = Transaction::new(id, seq, message, Some(MessagePriority::WakeUp), now);
        tx.ends_wake_up = true;
        debug!(id, node, "queue drained, sending node back to sleep");
        self.queue.push(tx);
    }

    fn set_status(&mut self, node: NodeId, status: NodeStatus, actions: &mut Vec<EngineAction>) {
        if self.nodes.set_status(node, status) {
            info!(node, %status, "node status changed");
            actions.push(EngineAction::NodeStatusChanged { node, status });
        }
    }

    fn set_jammed(&mut self, now: Instant, actions: &mut Vec<EngineAction>) {
        self.hold_until = Some(now + self.config.jam_backoff);
        if self.controller_status != ControllerStatus::Jammed {
            warn!("controller jammed");
            self.controller_status = ControllerStatus::Jammed;
            self.jammed_since = Some(now);
            actions.push(EngineAction::ControllerStatusChanged(ControllerStatus::Jammed));
        }
    }

    fn set_ready(&mut self, actions: &mut Vec<EngineAction>) {
        self.hold_until = None;
        self.jammed_since = None;
        if self.controller_status != ControllerStatus::Ready {
            info!("controller ready");
            self.controller_status = ControllerStatus::Ready;
            actions.push(EngineAction::ControllerStatusChanged(ControllerStatus::Ready));
        }
    }
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("state", &self.state())
            .field("controller_status", &self.controller_status)
            .field("queued", &self.queue.len())
            .field("has_security", &self.security.is_some())
            .finish()
    }
}

fn abort_frame() -> Frame {
    let abort = Message::SendDataAbort;
    Frame::data(abort.message_type(), abort.function_id().as_u8(), Vec::new())
}

fn log_decode_error(frame: &DataFrame, err: &MessageError) {
    if err.is_recoverable() {
        debug!(
            function_id = frame.function_id,
            error = %err,
            "dropping message"
        );
    } else {
        warn!(
            function_id = frame.function_id,
            payload = ?frame.payload.as_ref(),
            error = %err,
            "dropping undecodable message"
        );
    }
}

#[cfg(test)]
mod tests {
    use zwave_cc::cc::basic::BasicCommand;
    use zwave_cc::StaticContext;
    use zwave_message::{TransmitReport, TransmitResponse, TransmitStatus};

    use super::*;

    fn data(message: Message) -> ReadEvent {
        let ctx = StaticContext::new(1);
        ReadEvent::Frame(message.to_frame(&ctx).unwrap())
    }

    fn writes(actions: &[EngineAction]) -> Vec<&Frame> {
        actions
            .iter()
            .filter_map(|action| match action {
                EngineAction::Write(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    fn resolved(actions: &[EngineAction]) -> Vec<(TransactionId, bool)> {
        actions
            .iter()
            .filter_map(|action| match action {
                EngineAction::Resolve { id, result } => Some((*id, result.is_ok())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn controller_query_completes_on_response() {
        let mut engine = TransactionEngine::new();
        let now = Instant::now();
        let (id, actions) = engine.enqueue(Message::GetControllerId, None, now);
        assert_eq!(writes(&actions).len(), 1);
        assert_eq!(engine.state(), TransactionState::Sending);

        assert!(engine.on_read_event(ReadEvent::Frame(Frame::Ack), now).is_empty());
        let actions = engine.on_read_event(
            data(Message::GetControllerIdResponse(zwave_message::ControllerId {
                home_id: 0xC0FF_EE00,
                own_node_id: 3,
            })),
            now,
        );
        assert!(matches!(actions[0], EngineAction::Write(Frame::Ack)));
        assert_eq!(resolved(&actions), vec![(id, true)]);
        assert_eq!(engine.own_node_id(), 3);
        assert_eq!(engine.state(), TransactionState::Idle);
    }

    #[test]
    fn nak_resends_same_frame_then_gives_up() {
        let mut engine = TransactionEngine::new();
        let start = Instant::now();
        let (id, actions) = engine.enqueue(Message::GetControllerVersion, None, start);
        let first = writes(&actions)[0].clone();

        let mut now = start;
        for _ in 1..engine.config().max_link_attempts {
            assert!(engine
                .on_read_event(ReadEvent::Frame(Frame::Nak), now)
                .is_empty());
            now = engine.next_deadline().unwrap();
            let actions = engine.poll(now);
            assert_eq!(writes(&actions), vec![&first]);
        }
        let actions = engine.on_read_event(ReadEvent::Frame(Frame::Can), now);
        assert_eq!(resolved(&actions), vec![(id, false)]);
    }

    #[test]
    fn corrupt_frames_are_nakked() {
        let mut engine = TransactionEngine::new();
        let actions = engine.on_read_event(
            ReadEvent::Corrupt(zwave_frame::FrameError::Checksum {
                expected: 1,
                actual: 2,
            }),
            Instant::now(),
        );
        assert!(matches!(actions[..], [EngineAction::Write(Frame::Nak)]));
    }

    #[test]
    fn unsolicited_reports_are_delivered() {
        let mut engine = TransactionEngine::new();
        let report = Message::ApplicationCommand(ApplicationCommandRequest::new(
            CommandClass::new(4u8, BasicCommand::Report {
                current_value: 99,
                target_value: None,
                duration: None,
            }),
        ));
        let actions = engine.on_read_event(data(report), Instant::now());
        assert!(actions
            .iter()
            .any(|action| matches!(action, EngineAction::Deliver(Message::ApplicationCommand(_)))));
        assert_eq!(engine.nodes().status(4), NodeStatus::Alive);
    }

    #[test]
    fn full_queue_drops() {
        let mut engine = TransactionEngine::with_config(DriverConfig {
            queue_capacity: 1,
            ..DriverConfig::default()
        });
        let now = Instant::now();
        engine.enqueue(Message::GetControllerId, None, now);
        engine.enqueue(Message::GetControllerVersion, None, now);
        let (id, actions) = engine.enqueue(Message::SoftReset, None, now);
        let codes: Vec<_> = actions
            .iter()
            .filter_map(|action| match action {
                EngineAction::Resolve { id: rid, result: Err(err) } if *rid == id => {
                    Some(err.code())
                }
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![zwave_frame::ErrorCode::ControllerMessageDropped]);
    }

    #[test]
    fn callback_before_response_is_not_consumed() {
        let mut engine = TransactionEngine::new();
        let now = Instant::now();
        let message: Message =
            SendDataRequest::new(CommandClass::new(2u8, BasicCommand::Set { target_value: 1 }))
                .into();
        engine.enqueue(message, None, now);
        engine.on_read_event(ReadEvent::Frame(Frame::Ack), now);
        let actions = engine.on_read_event(
            data(Message::SendDataCallback(TransmitReport::new(
                1,
                TransmitStatus::Ok,
            ))),
            now,
        );
        assert!(resolved(&actions).is_empty());
        let actions = engine.on_read_event(
            data(Message::SendDataResponse(TransmitResponse { was_sent: true })),
            now,
        );
        assert!(resolved(&actions).is_empty());
        assert_eq!(engine.state(), TransactionState::Sending);
    }
}
