//! Handles to in-flight tool executions.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::outcome::{ToolOutcome, ToolResult};
use crate::error::{Result, TurnwireError};

/// Lifecycle of a [`ResultHandle`]: pending, then exactly one terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleState {
    Pending,
    Resolved(ToolResult),
    Cancelled,
}

impl HandleState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Called once when a handle leaves the pending state.
pub type CompletionListener = Box<dyn FnOnce(&HandleState) + Send>;

struct Shared {
    state: watch::Sender<HandleState>,
    listeners: Mutex<Vec<CompletionListener>>,
}

impl Shared {
    fn new(initial: HandleState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Move out of `Pending`. Only the first transition wins.
    fn settle(&self, next: HandleState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            let listeners = std::mem::take(&mut *lock(&self.listeners));
            let state = self.state.borrow().clone();
            for listener in listeners {
                notify(listener, &state);
            }
        }
        changed
    }
}

fn notify(listener: CompletionListener, state: &HandleState) {
    if std::panic::catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
        tracing::warn!("result handle listener panicked; ignoring");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Asynchronous handle to one tool execution.
///
/// Created when dispatch starts. Awaiting it yields the [`ToolResult`];
/// cancelling a pending handle aborts its task, while cancelling a terminal
/// one is a no-op. Dropping a pending handle cancels it.
pub struct ResultHandle {
    tool_call_id: String,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResultHandle {
    /// A handle that is already resolved (e.g. a tool that was not found).
    pub fn resolved(result: ToolResult) -> Self {
        Self {
            tool_call_id: result.tool_call_id.clone(),
            shared: Arc::new(Shared::new(HandleState::Resolved(result))),
            task: Mutex::new(None),
        }
    }

    /// Launch `work` as an independent task.
    ///
    /// A panic inside `work` resolves the handle with a `RuntimeError`
    /// outcome rather than tearing anything else down.
    pub fn spawn<F>(tool_call_id: impl Into<String>, work: F) -> Self
    where
        F: Future<Output = ToolResult> + Send + 'static,
    {
        let tool_call_id = tool_call_id.into();
        let shared = Arc::new(Shared::new(HandleState::Pending));
        let task_shared = shared.clone();
        let task_call_id = tool_call_id.clone();
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => ToolResult::new(
                    task_call_id,
                    ToolOutcome::RuntimeError {
                        message: panic_message(payload.as_ref()),
                    },
                ),
            };
            task_shared.settle(HandleState::Resolved(result));
        });
        Self {
            tool_call_id,
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> HandleState {
        self.shared.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        !self.shared.state.borrow().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.state.borrow(), HandleState::Cancelled)
    }

    /// The result, if the handle has resolved.
    pub fn try_result(&self) -> Option<ToolResult> {
        match &*self.shared.state.borrow() {
            HandleState::Resolved(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Wait for the result. Fails with [`TurnwireError::Cancelled`] if the
    /// handle was cancelled first.
    pub async fn wait(&self) -> Result<ToolResult> {
        let mut rx = self.shared.state.subscribe();
        let state = rx
            .wait_for(HandleState::is_terminal)
            .await
            .map_err(|_| TurnwireError::Cancelled)?;
        match &*state {
            HandleState::Resolved(result) => Ok(result.clone()),
            _ => Err(TurnwireError::Cancelled),
        }
    }

    /// Cancel the execution. Returns whether this call did the cancelling.
    pub fn cancel(&self) -> bool {
        if !self.shared.settle(HandleState::Cancelled) {
            return false;
        }
        if let Some(task) = lock(&self.task).as_ref() {
            task.abort();
        }
        tracing::debug!(tool_call_id = %self.tool_call_id, "tool execution cancelled");
        true
    }

    /// Wait for the underlying task to finish unwinding, suppressing its
    /// termination error. Cheap once drained.
    pub async fn drain(&self) {
        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if err.is_panic() {
                    tracing::warn!(
                        tool_call_id = %self.tool_call_id,
                        "tool task panicked while draining"
                    );
                }
            }
        }
    }

    /// Register a listener fired exactly once, at resolution or cancellation.
    ///
    /// If the handle is already terminal the listener fires immediately.
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(&HandleState) + Send + 'static,
    {
        let mut listeners = lock(&self.shared.listeners);
        let state = self.shared.state.borrow().clone();
        if state.is_terminal() {
            drop(listeners);
            notify(Box::new(listener), &state);
        } else {
            listeners.push(Box::new(listener));
        }
    }
}

impl Drop for ResultHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("tool_call_id", &self.tool_call_id)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("tool panicked: {message}")
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok(id: &str, output: &str) -> ToolResult {
        ToolResult::new(id, ToolOutcome::ok(output))
    }

    #[tokio::test]
    async fn resolved_handle_waits_immediately() {
        let handle = ResultHandle::resolved(ok("c1", "done"));
        assert_eq!(handle.wait().await.unwrap(), ok("c1", "done"));
        assert!(!handle.cancel());
        assert_eq!(handle.wait().await.unwrap(), ok("c1", "done"));
    }

    #[tokio::test]
    async fn cancel_aborts_pending_work() {
        let handle = ResultHandle::spawn("c1", async {
            futures::future::pending::<()>().await;
            ok("c1", "never")
        });
        assert!(handle.is_pending());
        assert!(handle.cancel());
        handle.drain().await;
        assert!(handle.is_cancelled());
        assert!(matches!(handle.wait().await, Err(TurnwireError::Cancelled)));
    }

    #[tokio::test]
    async fn panics_become_runtime_errors() {
        async fn explode() -> ToolResult {
            panic!("kaboom")
        }
        let handle = ResultHandle::spawn("c1", explode());
        let result = handle.wait().await.unwrap();
        match result.outcome {
            ToolOutcome::RuntimeError { message } => assert!(message.contains("kaboom")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn listener_fires_once_even_if_registered_late() {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = ResultHandle::spawn("c1", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ok("c1", "x")
        });
        let early = fired.clone();
        handle.on_complete(move |_| {
            early.fetch_add(1, Ordering::SeqCst);
        });
        handle.wait().await.unwrap();
        handle.cancel();

        let late = fired.clone();
        handle.on_complete(move |state| {
            assert!(matches!(state, HandleState::Resolved(_)));
            late.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listener_panics_are_swallowed() {
        let handle = ResultHandle::spawn("c1", async { ok("c1", "x") });
        handle.on_complete(|_| panic!("listener bug"));
        assert!(handle.wait().await.is_ok());
    }

    #[tokio::test]
    async fn listener_sees_cancellation() {
        let seen = Arc::new(Mutex::new(None));
        let handle = ResultHandle::spawn("c1", futures::future::pending::<ToolResult>());
        let sink = seen.clone();
        handle.on_complete(move |state| {
            *sink.lock().unwrap() = Some(state.clone());
        });
        drop(handle);
        assert_eq!(*seen.lock().unwrap(), Some(HandleState::Cancelled));
    }
}
