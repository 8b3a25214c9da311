use std::fmt;

use {
    chrono::{DateTime, Utc},
    pelangi_common::ConversationKey,
    serde::{Deserialize, Serialize},
};

use crate::template::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Completed,
    Errored,
    /// Replaced by a newly started workflow.
    Superseded,
    /// The guest asked to stop.
    Cancelled,
}

impl InstanceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Superseded => "superseded",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "active" => Self::Active,
            "completed" => Self::Completed,
            "errored" => Self::Errored,
            "superseded" => Self::Superseded,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution state of one workflow for one conversation.
///
/// `current_node_id` names a node of the definition while the instance is
/// active and is `None` once it reached a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub conversation_key: ConversationKey,
    pub workflow_id: String,
    pub workflow_version: u32,
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub variables: Variables,
    pub status: InstanceStatus,
    /// Node transitions since the instance started. Never decreases.
    pub step_count: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Id of the last inbound message that resumed this instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowInstance {
    pub fn new(
        conversation_key: ConversationKey,
        workflow_id: impl Into<String>,
        workflow_version: u32,
        start_node_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            conversation_key,
            workflow_id: workflow_id.into(),
            workflow_version,
            current_node_id: Some(start_node_id.into()),
            variables: Variables::new(),
            status: InstanceStatus::Active,
            step_count: 0,
            started_at: now,
            updated_at: now,
            last_message_id: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    /// Move to a terminal status.
    pub fn finish(&mut self, status: InstanceStatus, error: Option<String>) {
        self.status = status;
        self.current_node_id = None;
        self.error = error;
        self.updated_at = Utc::now();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_clears_current_node() {
        let mut instance = WorkflowInstance::new("k".into(), "check_in", 1, "welcome");
        assert!(instance.is_active());
        instance.finish(InstanceStatus::Cancelled, None);
        assert!(instance.status.is_terminal());
        assert_eq!(instance.current_node_id, None);
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for status in [
            InstanceStatus::Active,
            InstanceStatus::Completed,
            InstanceStatus::Errored,
            InstanceStatus::Superseded,
            InstanceStatus::Cancelled,
        ] {
            assert_eq!(InstanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InstanceStatus::parse("paused"), None);
    }

    #[test]
    fn serializes_as_json() {
        let instance = WorkflowInstance::new("k".into(), "check_in", 2, "welcome");
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["conversation_key"], "k");
        let back: WorkflowInstance = serde_json::from_value(json).unwrap();
        assert_eq!(back, instance);
    }
}
