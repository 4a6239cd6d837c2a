//! Progress events — the loop's fire-and-forget outward notifications.
//!
//! Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing
//! never blocks and never fails the loop; no subscribers is fine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the loop after each policy decision and at key
/// lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A loop iteration started.
    StepStarted { step: u32, max_steps: u32 },

    /// The policy chose an action (post-override).
    ActionSelected {
        step: u32,
        action: String,
        detail: Option<String>,
    },

    /// A hard override replaced the policy's proposal.
    ActionOverridden {
        step: u32,
        proposed: String,
        forced: String,
    },

    /// A handler failed; the error entered classification.
    ErrorOccurred {
        step: u32,
        kind: String,
        message: String,
    },

    /// A recovery strategy was applied.
    RecoveryApplied {
        step: u32,
        strategy: String,
        detail: Option<String>,
    },

    /// The step budget ran out before a terminal action.
    MaxStepsReached { step: u32 },

    /// The run reached a terminal state.
    Finished { step: u32, outcome: String },
}

impl ProgressEvent {
    /// Short label for this event type (log/SSE naming).
    pub fn label(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::ActionSelected { .. } => "action_selected",
            Self::ActionOverridden { .. } => "action_overridden",
            Self::ErrorOccurred { .. } => "error",
            Self::RecoveryApplied { .. } => "recovery",
            Self::MaxStepsReached { .. } => "max_steps_reached",
            Self::Finished { .. } => "finished",
        }
    }
}

/// A broadcast-based progress bus.
pub struct ProgressBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl ProgressBus {
    /// Create a new bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_publish_subscribe() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ProgressEvent::ActionSelected {
            step: 1,
            action: "search".into(),
            detail: Some("largest moon".into()),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            ProgressEvent::ActionSelected { step, action, .. } => {
                assert_eq!(*step, 1);
                assert_eq!(action, "search");
            }
            _ => panic!("Expected ActionSelected event"),
        }
    }

    #[test]
    fn bus_no_subscribers_doesnt_panic() {
        let bus = ProgressBus::new(16);
        bus.publish(ProgressEvent::MaxStepsReached { step: 10 });
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = ProgressEvent::ErrorOccurred {
            step: 3,
            kind: "timeout".into(),
            message: "request timed out".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error_occurred""#));
        assert_eq!(event.label(), "error");
    }
}
