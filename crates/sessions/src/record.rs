use std::collections::VecDeque;

use {
    chrono::{DateTime, Utc},
    pelangi_common::{ConversationKey, InboundMessage, Language},
    pelangi_workflow::WorkflowInstance,
    serde::{Deserialize, Serialize},
};

/// Inbound messages whose handling ran out of time and must be redone,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRetry {
    pub messages: Vec<InboundMessage>,
    pub attempts: u32,
    pub since: DateTime<Utc>,
}

impl PendingRetry {
    pub fn new(message: InboundMessage) -> Self {
        Self {
            messages: vec![message],
            attempts: 1,
            since: Utc::now(),
        }
    }
}

/// Everything kept per conversation between inbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub key: ConversationKey,
    /// Last detected or declared language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// The single active workflow, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<WorkflowInstance>,
    /// Recent inbound texts, oldest first.
    #[serde(default)]
    pub history: VecDeque<String>,
    /// Recently handled message ids, oldest first.
    #[serde(default)]
    pub seen_message_ids: VecDeque<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_retry: Option<PendingRetry>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(key: ConversationKey) -> Self {
        Self {
            key,
            language: None,
            active: None,
            history: VecDeque::new(),
            seen_message_ids: VecDeque::new(),
            pending_retry: None,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn has_seen(&self, message_id: &str) -> bool {
        self.seen_message_ids.iter().any(|id| id == message_id)
    }

    /// Remember `message_id`, keeping at most `window` ids.
    pub fn remember_message_id(&mut self, message_id: impl Into<String>, window: usize) {
        let id = message_id.into();
        if window == 0 || self.has_seen(&id) {
            return;
        }
        self.seen_message_ids.push_back(id);
        while self.seen_message_ids.len() > window {
            self.seen_message_ids.pop_front();
        }
    }

    /// Append an inbound text, keeping at most `max` entries.
    pub fn push_history(&mut self, text: impl Into<String>, max: usize) {
        if max == 0 {
            return;
        }
        self.history.push_back(text.into());
        while self.history.len() > max {
            self.history.pop_front();
        }
    }

    #[must_use]
    pub fn active_workflow_id(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|i| i.is_active())
            .map(|i| i.workflow_id.as_str())
    }

    /// Detach the active instance so it can be archived.
    pub fn take_active(&mut self) -> Option<WorkflowInstance> {
        self.active.take()
    }

    /// Queue `message` behind any earlier retry and count another attempt.
    pub fn defer(&mut self, message: InboundMessage) {
        match self.pending_retry.as_mut() {
            Some(pending) => {
                if !pending.messages.contains(&message) {
                    pending.messages.push(message);
                }
                pending.attempts += 1;
            },
            None => self.pending_retry = Some(PendingRetry::new(message)),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_window_is_bounded() {
        let mut record = ConversationRecord::new("k".into());
        for i in 0..5 {
            record.remember_message_id(format!("m{i}"), 3);
        }
        assert_eq!(record.seen_message_ids, ["m2", "m3", "m4"]);
        assert!(!record.has_seen("m0"));
        assert!(record.has_seen("m4"));

        record.remember_message_id("m4", 3);
        assert_eq!(record.seen_message_ids.len(), 3);
    }

    #[test]
    fn history_keeps_latest() {
        let mut record = ConversationRecord::new("k".into());
        for text in ["a", "b", "c"] {
            record.push_history(text, 2);
        }
        assert_eq!(record.history, ["b", "c"]);
    }

    #[test]
    fn deferred_messages_queue_in_order() {
        let mut record = ConversationRecord::new("k".into());
        record.defer(InboundMessage::new("k", "first"));
        record.defer(InboundMessage::new("k", "second"));
        let pending = record.pending_retry.as_ref().unwrap();
        assert_eq!(pending.attempts, 2);
        let texts: Vec<_> = pending.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn finished_instance_is_not_active() {
        let mut record = ConversationRecord::new("k".into());
        let mut instance = WorkflowInstance::new("k".into(), "check_in", 1, "welcome");
        record.active = Some(instance.clone());
        assert_eq!(record.active_workflow_id(), Some("check_in"));

        instance.finish(pelangi_workflow::InstanceStatus::Completed, None);
        record.active = Some(instance);
        assert_eq!(record.active_workflow_id(), None);
    }
}
