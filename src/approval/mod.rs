//! Approval of sensitive tool actions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::config::TurnwireConfig;
use crate::error::{Result, TurnwireError};
use crate::tools::ToolCallContext;
use crate::wire::{ApprovalRequest, ApprovalResponse, DisplayBlock};

/// Decides whether a tool may perform an action, asking the observer over
/// the wire when needed.
#[derive(Debug, Default)]
pub struct Approval {
    yolo: AtomicBool,
    session_actions: Mutex<HashSet<String>>,
}

impl Approval {
    /// With `yolo` set, every request is approved without asking.
    pub fn new(yolo: bool) -> Self {
        Self {
            yolo: AtomicBool::new(yolo),
            session_actions: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &TurnwireConfig) -> Self {
        Self::new(config.yolo)
    }

    pub fn set_yolo(&self, yolo: bool) {
        self.yolo.store(yolo, Ordering::Relaxed);
    }

    pub fn is_yolo(&self) -> bool {
        self.yolo.load(Ordering::Relaxed)
    }

    /// Whether `action` was approved for the rest of the session.
    pub fn is_auto_approved(&self, action: &str) -> bool {
        self.actions().contains(action)
    }

    /// Ask for permission to perform `action` on behalf of `ctx`'s tool call.
    ///
    /// Returns `Ok(false)` when the observer rejects.
    pub async fn request(
        &self,
        ctx: &ToolCallContext,
        sender: &str,
        action: &str,
        description: &str,
        display: Vec<DisplayBlock>,
    ) -> Result<bool> {
        if self.is_yolo() || self.is_auto_approved(action) {
            tracing::debug!(sender, action, "approval granted without asking");
            return Ok(true);
        }
        let wire = ctx.wire().ok_or_else(|| {
            TurnwireError::Configuration("approval requested without a wire".into())
        })?;

        let request = ApprovalRequest {
            id: Uuid::new_v4().to_string(),
            tool_call_id: ctx.tool_call_id().to_string(),
            sender: sender.to_string(),
            action: action.to_string(),
            description: description.to_string(),
            display,
        };
        tracing::debug!(request_id = %request.id, sender, action, "requesting approval");
        match wire.request_approval(request).await? {
            ApprovalResponse::Approve => Ok(true),
            ApprovalResponse::ApproveForSession => {
                self.actions().insert(action.to_string());
                Ok(true)
            }
            ApprovalResponse::Reject => Ok(false),
        }
    }

    fn actions(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.session_actions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
