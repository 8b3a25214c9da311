//! Intent → action lookup with an escalation override layer.
//!
//! Precedence:
//! 1. Emergency-pattern results and emergency intents always escalate
//! 2. Intents in `always_escalate` escalate
//! 3. Table entry for the intent
//! 4. `routing.default`

use std::collections::{HashMap, HashSet};

use tracing::debug;

use {
    pelangi_classifier::ClassificationResult,
    pelangi_config::{PelangiConfig, RouteEntry, RoutingConfig, StaffConfig},
};

use crate::decision::{EscalationReason, RouteAction, RoutingDecision};

/// Per-conversation facts routing may consult.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationState<'a> {
    /// Id of the workflow currently active for this conversation.
    pub active_workflow: Option<&'a str>,
}

pub struct Router {
    table: HashMap<String, RouteEntry>,
    default: RouteEntry,
    always_escalate: HashSet<String>,
    emergency_intents: HashSet<String>,
    staff: StaffConfig,
    generated_reply_fallback: String,
}

impl Router {
    pub fn new(
        routing: &RoutingConfig,
        staff: &StaffConfig,
        emergency_intents: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            table: routing
                .intents
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            default: routing.default.clone(),
            always_escalate: routing.always_escalate.iter().cloned().collect(),
            emergency_intents: emergency_intents.into_iter().collect(),
            staff: staff.clone(),
            generated_reply_fallback: routing.generated_reply_fallback.clone(),
        }
    }

    pub fn from_config(config: &PelangiConfig) -> Self {
        Self::new(
            &config.routing,
            &config.staff,
            config
                .classifier
                .emergency
                .patterns
                .iter()
                .map(|p| p.intent.clone()),
        )
    }

    /// Decide what to do with one classification. No I/O.
    #[must_use]
    pub fn route(
        &self,
        result: &ClassificationResult,
        state: &ConversationState<'_>,
    ) -> RoutingDecision {
        let entry = self.table.get(&result.intent);

        let forced = if result.is_emergency() || self.emergency_intents.contains(&result.intent) {
            Some(EscalationReason::Emergency)
        } else if self.always_escalate.contains(&result.intent) {
            Some(EscalationReason::Policy)
        } else {
            None
        };

        let action = match forced {
            Some(reason) => self.escalation(entry, reason),
            None => self.action_for(entry.unwrap_or(&self.default), state),
        };

        let mut parameters = result.entities.clone();
        parameters.insert("intent".into(), result.intent.clone());
        parameters.insert("confidence".into(), format!("{:.2}", result.confidence));

        let decision = RoutingDecision {
            intent: result.intent.clone(),
            action,
            parameters,
        };
        debug!(
            intent = %decision.intent,
            action = %decision.kind(),
            target = decision.target(),
            table_hit = entry.is_some(),
            "routed"
        );
        decision
    }

    fn action_for(&self, entry: &RouteEntry, state: &ConversationState<'_>) -> RouteAction {
        match entry {
            RouteEntry::StaticReply { template } => RouteAction::StaticReply {
                template: template.clone(),
            },
            RouteEntry::GeneratedReply { instructions } => RouteAction::GeneratedReply {
                instructions: instructions.clone(),
                fallback_template: self.generated_reply_fallback.clone(),
            },
            RouteEntry::StartWorkflow { workflow } => RouteAction::StartWorkflow {
                workflow: workflow.clone(),
                supersedes: state.active_workflow.map(str::to_string),
            },
            RouteEntry::Escalate {
                recipient,
                reply_template,
            } => RouteAction::Escalate {
                recipient: self.recipient(recipient.as_deref()),
                reply_template: reply_template.clone(),
                reason: EscalationReason::Configured,
            },
        }
    }

    fn recipient(&self, name: Option<&str>) -> String {
        let name = name.unwrap_or(&self.staff.default_recipient);
        self.staff.resolve(name).to_string()
    }

    /// Forced escalation keeps whatever recipient/template the table or the
    /// default route names.
    fn escalation(&self, entry: Option<&RouteEntry>, reason: EscalationReason) -> RouteAction {
        let configured = [entry, Some(&self.default)]
            .into_iter()
            .flatten()
            .find_map(|e| match e {
                RouteEntry::Escalate {
                    recipient,
                    reply_template,
                } => Some((recipient.clone(), reply_template.clone())),
                _ => None,
            });
        let (recipient, reply_template) = configured.unwrap_or((None, None));
        RouteAction::Escalate {
            recipient: self.recipient(recipient.as_deref()),
            reply_template,
            reason,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use {
        pelangi_classifier::SourceTier,
        rstest::rstest,
    };

    use {super::*, crate::decision::ActionKind};

    fn router() -> Router {
        let mut intents = BTreeMap::new();
        intents.insert("thanks".to_string(), RouteEntry::StaticReply {
            template: "thanks".into(),
        });
        intents.insert("check_in_arrival".to_string(), RouteEntry::StartWorkflow {
            workflow: "check_in".into(),
        });
        intents.insert("pricing_inquiry".to_string(), RouteEntry::GeneratedReply {
            instructions: None,
        });
        // Misconfigured on purpose: emergencies must still escalate.
        intents.insert("fire_emergency".to_string(), RouteEntry::StaticReply {
            template: "thanks".into(),
        });
        intents.insert("noise_complaint_infant".to_string(), RouteEntry::StaticReply {
            template: "noise_reply".into(),
        });
        intents.insert("lost_item".to_string(), RouteEntry::Escalate {
            recipient: Some("housekeeping".into()),
            reply_template: Some("lost_item".into()),
        });
        let routing = RoutingConfig {
            intents,
            ..RoutingConfig::default()
        };
        let mut staff = StaffConfig::default();
        staff
            .recipients
            .insert("housekeeping".into(), "+60111111111".into());
        Router::new(&routing, &staff, ["fire_emergency".to_string()])
    }

    fn result(intent: &str, tier: SourceTier) -> ClassificationResult {
        ClassificationResult::new(intent, 0.9, tier)
    }

    #[rstest]
    #[case("thanks", ActionKind::StaticReply, "thanks")]
    #[case("check_in_arrival", ActionKind::StartWorkflow, "check_in")]
    #[case("pricing_inquiry", ActionKind::GeneratedReply, "fallback")]
    #[case("unknown", ActionKind::Escalate, "front_desk")]
    #[case("weather", ActionKind::Escalate, "front_desk")]
    fn table_lookup(#[case] intent: &str, #[case] kind: ActionKind, #[case] target: &str) {
        let decision = router().route(
            &result(intent, SourceTier::FuzzyKeyword),
            &ConversationState::default(),
        );
        assert_eq!(decision.kind(), kind);
        assert_eq!(decision.target(), target);
    }

    #[test]
    fn emergency_always_escalates_regardless_of_table() {
        let decision = router().route(
            &result("fire_emergency", SourceTier::EmergencyPattern),
            &ConversationState::default(),
        );
        let RouteAction::Escalate {
            reason,
            reply_template,
            ..
        } = decision.action
        else {
            panic!("expected escalation, got {:?}", decision.action);
        };
        assert_eq!(reason, EscalationReason::Emergency);
        // Falls back to the default route's reply template.
        assert_eq!(reply_template.as_deref(), Some("escalation_unknown"));
    }

    #[test]
    fn emergency_intent_from_a_later_tier_still_escalates() {
        let decision = router().route(
            &result("fire_emergency", SourceTier::GenerativeFallback),
            &ConversationState::default(),
        );
        assert_eq!(decision.kind(), ActionKind::Escalate);
    }

    #[test]
    fn always_escalate_overrides_table() {
        let decision = router().route(
            &result("noise_complaint_infant", SourceTier::GenerativeFallback),
            &ConversationState::default(),
        );
        assert!(matches!(decision.action, RouteAction::Escalate {
            reason: EscalationReason::Policy,
            ..
        }));
    }

    #[test]
    fn named_recipient_is_resolved() {
        let decision = router().route(
            &result("lost_item", SourceTier::SemanticExample),
            &ConversationState::default(),
        );
        assert_eq!(decision.target(), "+60111111111");
    }

    #[test]
    fn active_workflow_is_marked_superseded() {
        let decision = router().route(
            &result("check_in_arrival", SourceTier::FuzzyKeyword),
            &ConversationState {
                active_workflow: Some("late_checkout"),
            },
        );
        assert_eq!(decision.action, RouteAction::StartWorkflow {
            workflow: "check_in".into(),
            supersedes: Some("late_checkout".into()),
        });
    }

    #[test]
    fn entities_become_parameters() {
        let mut r = result("thanks", SourceTier::FuzzyKeyword);
        r.entities.insert("guests".into(), "2".into());
        let decision = router().route(&r, &ConversationState::default());
        assert_eq!(decision.parameters["guests"], "2");
        assert_eq!(decision.parameters["intent"], "thanks");
        assert_eq!(decision.parameters["confidence"], "0.90");
    }
}
