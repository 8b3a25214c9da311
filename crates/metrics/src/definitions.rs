//! Metric name and label definitions.
//!
//! Centralizing names keeps dashboards and code in agreement about what is
//! recorded.

/// Inbound message handling (orchestrator)
pub mod messages {
    /// Inbound messages accepted for processing
    pub const RECEIVED_TOTAL: &str = "pelangi_messages_received_total";
    /// Inbound messages dropped as duplicate deliveries
    pub const DUPLICATES_TOTAL: &str = "pelangi_messages_duplicates_total";
    /// End-to-end handling duration in seconds
    pub const HANDLING_DURATION_SECONDS: &str = "pelangi_messages_handling_duration_seconds";
    /// Handling runs that exceeded the wall-clock budget
    pub const BUDGET_EXCEEDED_TOTAL: &str = "pelangi_messages_budget_exceeded_total";
    /// Conversations handed over to staff
    pub const ESCALATIONS_TOTAL: &str = "pelangi_messages_escalations_total";
}

/// Tier classifier
pub mod classifier {
    /// Classification results by source tier
    pub const RESULTS_TOTAL: &str = "pelangi_classifier_results_total";
    /// Tier invocations (including those that fell through)
    pub const TIER_INVOCATIONS_TOTAL: &str = "pelangi_classifier_tier_invocations_total";
    /// Internal tier failures treated as a non-match
    pub const TIER_ERRORS_TOTAL: &str = "pelangi_classifier_tier_errors_total";
    /// Time spent classifying one message in seconds
    pub const DURATION_SECONDS: &str = "pelangi_classifier_duration_seconds";
}

/// Provider fallback chain
pub mod provider {
    /// Successful generations
    pub const GENERATIONS_TOTAL: &str = "pelangi_provider_generations_total";
    /// Failed attempts by provider and error type
    pub const FAILURES_TOTAL: &str = "pelangi_provider_failures_total";
    /// Chains where every provider failed
    pub const EXHAUSTED_TOTAL: &str = "pelangi_provider_exhausted_total";
    /// Latency of successful generations in seconds
    pub const GENERATION_DURATION_SECONDS: &str = "pelangi_provider_generation_duration_seconds";
}

/// Workflow engine
pub mod workflow {
    /// Workflow instances started
    pub const STARTED_TOTAL: &str = "pelangi_workflow_started_total";
    /// Workflow instances that reached a terminal node
    pub const COMPLETED_TOTAL: &str = "pelangi_workflow_completed_total";
    /// Workflow instances marked errored (runaway, malformed, unhandled failure)
    pub const ERRORED_TOTAL: &str = "pelangi_workflow_errored_total";
    /// External action calls by outcome
    pub const EXTERNAL_CALLS_TOTAL: &str = "pelangi_workflow_external_calls_total";
}

/// Common label keys
pub mod labels {
    pub const TIER: &str = "tier";
    pub const INTENT: &str = "intent";
    pub const PROVIDER: &str = "provider";
    pub const ERROR_TYPE: &str = "error_type";
    pub const WORKFLOW: &str = "workflow";
    pub const ACTION: &str = "action";
    pub const SUCCESS: &str = "success";
    pub const REASON: &str = "reason";
}

/// Histogram buckets (seconds)
pub mod buckets {
    /// Classification spans sub-millisecond regex hits to multi-second LLM calls.
    pub const CLASSIFIER_DURATION: &[f64] = &[
        0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0,
    ];

    /// Provider round trips.
    pub const PROVIDER_DURATION: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0];
}
