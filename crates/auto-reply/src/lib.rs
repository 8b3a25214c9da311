//! Inbound guest-message handling: the glue between a messaging channel and
//! the classifier, router and workflow engine.
//!
//! Flow: inbound message → duplicate check → language → waiting workflow
//! (emergency / cancel / resume) or classify → route → act → persist the
//! conversation record → deliver outbound actions.

pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod outbound;
pub mod runtime;

pub use {
    error::{Error, Result},
    orchestrator::{Disposition, HandleOutcome, MAX_RETRY_ATTEMPTS, Orchestrator},
    outbound::{Outbound, RecordingOutbound, deliver},
    runtime::{Collaborators, Runtime},
};
