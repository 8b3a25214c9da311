//! Delivery of outbound actions. Transport failures stay with the
//! implementation; the orchestrator never waits on a retry.

use std::sync::Mutex;

use {
    async_trait::async_trait,
    pelangi_common::{ConversationKey, OutboundAction},
};

#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_message(&self, conversation_key: &ConversationKey, text: &str);

    async fn notify_staff(&self, recipient: &str, text: &str);
}

/// Deliver `actions` in order.
pub async fn deliver(outbound: &dyn Outbound, actions: &[OutboundAction]) {
    for action in actions {
        match action {
            OutboundAction::SendMessage {
                conversation_key,
                text,
            } => outbound.send_message(conversation_key, text).await,
            OutboundAction::NotifyStaff { recipient, text } => {
                outbound.notify_staff(recipient, text).await;
            },
        }
    }
}

/// Keeps everything it is handed. Handy for tests and dry runs.
#[derive(Default)]
pub struct RecordingOutbound {
    actions: Mutex<Vec<OutboundAction>>,
}

impl RecordingOutbound {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, leaving the log empty.
    pub fn take(&self) -> Vec<OutboundAction> {
        std::mem::take(&mut *self.actions.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_message(&self, conversation_key: &ConversationKey, text: &str) {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OutboundAction::send(conversation_key, text));
    }

    async fn notify_staff(&self, recipient: &str, text: &str) {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OutboundAction::notify(recipient, text));
    }
}
