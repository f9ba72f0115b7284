//! The wire: an order-preserving channel from orchestrator to observer.
//!
//! The producer half ([`WireSoulSide`]) is cheap to clone and is handed to
//! tools. The consumer half ([`WireUISide`]) is exclusive: at most one is
//! alive at a time. Events are fire-and-forget; an [`ApprovalRequest`]
//! suspends its producer until the consumer resolves it or the wire shuts
//! down.

pub mod envelope;
pub mod message;
pub mod record;

pub use envelope::{encode, WireEnvelope, WireRegistry};
pub use message::{
    ApprovalRequest, ApprovalRequestResolved, ApprovalResponse, CompactionBegin, CompactionEnd,
    DisplayBlock, StatusUpdate, StepBegin, StepInterrupted, SubagentEvent, TodoItem, TodoStatus,
    TurnBegin, UserInput, WireMessage,
};
pub use record::{read_records, replay, WireRecord, WireRecorder};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::Stream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch, OwnedMutexGuard};

use crate::config::TurnwireConfig;
use crate::error::{Result, TurnwireError};

/// How [`Wire::shutdown`] treats messages not yet delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Deliver what is buffered, then stop.
    Graceful,
    /// Discard what is buffered.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireStatus {
    Open,
    Draining,
    Closed,
}

#[derive(Default)]
struct ApprovalBook {
    pending: HashMap<String, oneshot::Sender<ApprovalResponse>>,
    resolved: HashSet<String>,
}

/// Receiving end shared by successive consumers.
///
/// `lookahead` holds a message read past a merge run; it belongs to the
/// inbox, not to a consumer, so the next consumer sees it first.
struct Inbox {
    rx: mpsc::UnboundedReceiver<WireMessage>,
    lookahead: Option<WireMessage>,
}

struct WireShared {
    tx: mpsc::UnboundedSender<WireMessage>,
    inbox: Arc<tokio::sync::Mutex<Inbox>>,
    status: watch::Sender<WireStatus>,
    approvals: Mutex<ApprovalBook>,
    merge_by_default: bool,
}

impl WireShared {
    fn status(&self) -> WireStatus {
        *self.status.borrow()
    }

    fn book(&self) -> MutexGuard<'_, ApprovalBook> {
        self.approvals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The channel itself. Hands out producer and consumer halves.
#[derive(Clone)]
pub struct Wire {
    shared: Arc<WireShared>,
}

impl Wire {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A wire whose [`default_ui_side`](Self::default_ui_side) follows
    /// `config.wire_merge`.
    pub fn with_config(config: &TurnwireConfig) -> Self {
        Self::build(config.wire_merge)
    }

    fn build(merge_by_default: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(WireStatus::Open);
        Self {
            shared: Arc::new(WireShared {
                tx,
                inbox: Arc::new(tokio::sync::Mutex::new(Inbox {
                    rx,
                    lookahead: None,
                })),
                status,
                approvals: Mutex::new(ApprovalBook::default()),
                merge_by_default,
            }),
        }
    }

    pub fn soul_side(&self) -> WireSoulSide {
        WireSoulSide {
            shared: self.shared.clone(),
        }
    }

    /// The consumer half, waiting for any live consumer to be dropped first.
    pub async fn ui_side(&self, merge: bool) -> WireUISide {
        let inbox = self.shared.inbox.clone().lock_owned().await;
        WireUISide::new(self.shared.clone(), inbox, merge)
    }

    /// The consumer half, or [`TurnwireError::WireBusy`] if one is alive.
    pub fn try_ui_side(&self, merge: bool) -> Result<WireUISide> {
        let inbox = self
            .shared
            .inbox
            .clone()
            .try_lock_owned()
            .map_err(|_| TurnwireError::WireBusy)?;
        Ok(WireUISide::new(self.shared.clone(), inbox, merge))
    }

    /// Consumer half using the configured merge mode.
    pub async fn default_ui_side(&self) -> WireUISide {
        self.ui_side(self.shared.merge_by_default).await
    }

    /// Stop accepting messages and fail every outstanding approval wait.
    pub fn shutdown(&self, mode: ShutdownMode) {
        let next = match mode {
            ShutdownMode::Graceful => WireStatus::Draining,
            ShutdownMode::Immediate => WireStatus::Closed,
        };
        self.shared.status.send_if_modified(|status| {
            let upgrade = match (*status, next) {
                (WireStatus::Open, _) => true,
                (WireStatus::Draining, WireStatus::Closed) => true,
                _ => false,
            };
            if upgrade {
                *status = next;
            }
            upgrade
        });
        let abandoned: Vec<_> = self.shared.book().pending.drain().map(|(id, _)| id).collect();
        if !abandoned.is_empty() {
            tracing::warn!(
                count = abandoned.len(),
                "wire shut down with unresolved approval requests"
            );
        }
        tracing::debug!(?mode, "wire shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.status() != WireStatus::Open
    }
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wire")
            .field("status", &self.shared.status())
            .finish()
    }
}

/// Producer half, used by the orchestrator and by tools.
#[derive(Clone)]
pub struct WireSoulSide {
    shared: Arc<WireShared>,
}

impl WireSoulSide {
    /// Emit a message. Fails fast once the wire is shut down.
    ///
    /// A request sent this way is informational (e.g. replayed history): no
    /// one waits on it. Use [`request_approval`](Self::request_approval) to
    /// wait for a resolution.
    pub fn send(&self, msg: WireMessage) -> Result<()> {
        if self.shared.status() != WireStatus::Open {
            return Err(TurnwireError::WireShutdown);
        }
        tracing::trace!(message = msg.type_name(), "wire send");
        self.shared
            .tx
            .send(msg)
            .map_err(|_| TurnwireError::WireShutdown)
    }

    /// Emit `request` and wait for the observer's answer.
    ///
    /// Once answered, an [`ApprovalRequestResolved`] event follows on the
    /// wire. Fails with [`TurnwireError::ApprovalAbandoned`] if the consumer
    /// that received the request goes away or the wire shuts down first.
    pub async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalResponse> {
        let request_id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut book = self.shared.book();
            if book.pending.contains_key(&request_id) || book.resolved.contains(&request_id) {
                return Err(TurnwireError::InvalidState(format!(
                    "duplicate approval request id {request_id}"
                )));
            }
            book.pending.insert(request_id.clone(), tx);
        }
        if let Err(err) = self.send(WireMessage::ApprovalRequest(request)) {
            self.shared.book().pending.remove(&request_id);
            return Err(err);
        }

        let response = rx.await.map_err(|_| {
            tracing::warn!(request_id = %request_id, "approval request abandoned");
            TurnwireError::ApprovalAbandoned(request_id.clone())
        })?;
        tracing::debug!(request_id = %request_id, %response, "approval request resolved");
        let resolved = WireMessage::ApprovalRequestResolved(ApprovalRequestResolved {
            request_id,
            response,
        });
        if let Err(err) = self.send(resolved) {
            tracing::debug!(error = %err, "could not announce approval resolution");
        }
        Ok(response)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.status() != WireStatus::Open
    }
}

impl std::fmt::Debug for WireSoulSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireSoulSide")
            .field("status", &self.shared.status())
            .finish()
    }
}

/// Consumer half. Exclusive; dropping it frees the wire for another one.
pub struct WireUISide {
    shared: Arc<WireShared>,
    inbox: OwnedMutexGuard<Inbox>,
    merge: bool,
    delivered: HashSet<String>,
}

impl WireUISide {
    fn new(
        shared: Arc<WireShared>,
        inbox: OwnedMutexGuard<Inbox>,
        merge: bool,
    ) -> Self {
        Self {
            shared,
            inbox,
            merge,
            delivered: HashSet::new(),
        }
    }

    pub fn merges(&self) -> bool {
        self.merge
    }

    /// Next message, in emission order.
    ///
    /// In merge mode, adjacent mergeable events already buffered are
    /// coalesced first. Fails with [`TurnwireError::WireShutdown`] once the
    /// wire is shut down and (for a graceful shutdown) drained.
    pub async fn receive(&mut self) -> Result<WireMessage> {
        if self.shared.status() == WireStatus::Closed {
            self.inbox.lookahead = None;
        }
        let first = match self.inbox.lookahead.take() {
            Some(msg) => msg,
            None => self.next_raw().await?,
        };
        let msg = if self.merge && first.is_mergeable() {
            self.coalesce(first)
        } else {
            first
        };
        if let WireMessage::ApprovalRequest(request) = &msg {
            if self.shared.book().pending.contains_key(&request.id) {
                self.delivered.insert(request.id.clone());
            }
        }
        Ok(msg)
    }

    fn coalesce(&mut self, mut current: WireMessage) -> WireMessage {
        while self.shared.status() != WireStatus::Closed {
            let Ok(next) = self.inbox.rx.try_recv() else { break };
            if !current.merge_in_place(&next) {
                self.inbox.lookahead = Some(next);
                break;
            }
        }
        current
    }

    async fn next_raw(&mut self) -> Result<WireMessage> {
        let mut status_rx = self.shared.status.subscribe();
        loop {
            let status = *status_rx.borrow_and_update();
            if status == WireStatus::Closed {
                while self.inbox.rx.try_recv().is_ok() {}
                return Err(TurnwireError::WireShutdown);
            }
            match self.inbox.rx.try_recv() {
                Ok(msg) => return Ok(msg),
                Err(TryRecvError::Disconnected) => return Err(TurnwireError::WireShutdown),
                Err(TryRecvError::Empty) if status == WireStatus::Draining => {
                    return Err(TurnwireError::WireShutdown);
                }
                Err(TryRecvError::Empty) => {}
            }
            tokio::select! {
                msg = self.inbox.rx.recv() => {
                    // Immediate shutdown may have raced this receive.
                    if self.shared.status() == WireStatus::Closed {
                        continue;
                    }
                    return msg.ok_or(TurnwireError::WireShutdown);
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        return Err(TurnwireError::WireShutdown);
                    }
                }
            }
        }
    }

    /// Answer a pending approval request.
    pub fn resolve(&mut self, request_id: &str, response: ApprovalResponse) -> Result<()> {
        let waiter = {
            let mut book = self.shared.book();
            match book.pending.remove(request_id) {
                Some(waiter) => {
                    book.resolved.insert(request_id.to_string());
                    waiter
                }
                None if book.resolved.contains(request_id) => {
                    return Err(TurnwireError::ApprovalAlreadyResolved(request_id.to_string()));
                }
                None => return Err(TurnwireError::UnknownApprovalRequest(request_id.to_string())),
            }
        };
        self.delivered.remove(request_id);
        waiter
            .send(response)
            .map_err(|_| TurnwireError::ApprovalAbandoned(request_id.to_string()))
    }

    /// Consume as a stream that ends when the wire shuts down.
    pub fn into_stream(mut self) -> impl Stream<Item = WireMessage> + Send {
        async_stream::stream! {
            while let Ok(msg) = self.receive().await {
                yield msg;
            }
        }
    }
}

impl Drop for WireUISide {
    fn drop(&mut self) {
        if self.delivered.is_empty() {
            return;
        }
        let mut book = self.shared.book();
        for id in self.delivered.drain() {
            if book.pending.remove(&id).is_some() {
                tracing::warn!(
                    request_id = %id,
                    "consumer dropped without resolving approval request"
                );
            }
        }
    }
}

impl std::fmt::Debug for WireUISide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireUISide")
            .field("merge", &self.merge)
            .field("unresolved", &self.delivered.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentPart;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> WireMessage {
        WireMessage::ContentPart(ContentPart::text(s))
    }

    #[tokio::test]
    async fn second_consumer_is_busy() {
        let wire = Wire::new();
        let first = wire.try_ui_side(false).unwrap();
        assert!(matches!(wire.try_ui_side(false), Err(TurnwireError::WireBusy)));
        drop(first);
        assert!(wire.try_ui_side(false).is_ok());
    }

    #[tokio::test]
    async fn send_after_shutdown_fails_fast() {
        let wire = Wire::new();
        let soul = wire.soul_side();
        wire.shutdown(ShutdownMode::Graceful);
        assert!(matches!(soul.send(text("x")), Err(TurnwireError::WireShutdown)));
    }

    #[tokio::test]
    async fn merge_mode_stops_at_non_mergeable() {
        let wire = Wire::new();
        let soul = wire.soul_side();
        soul.send(text("a")).unwrap();
        soul.send(text("b")).unwrap();
        soul.send(WireMessage::StepBegin(StepBegin { n: 1 })).unwrap();
        soul.send(text("c")).unwrap();

        let mut ui = wire.ui_side(true).await;
        assert_eq!(ui.receive().await.unwrap(), text("ab"));
        assert_eq!(ui.receive().await.unwrap(), WireMessage::StepBegin(StepBegin { n: 1 }));
        assert_eq!(ui.receive().await.unwrap(), text("c"));
    }
}
