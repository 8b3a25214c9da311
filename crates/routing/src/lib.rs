//! Map a classified intent to exactly one action.
//!
//! Routing is a pure table lookup keyed by intent, with an override layer
//! that forces escalation for emergency and policy intents.

pub mod decision;
pub mod router;

pub use {
    decision::{ActionKind, EscalationReason, RouteAction, RoutingDecision},
    router::{ConversationState, Router},
};
