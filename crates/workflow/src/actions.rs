//! The narrow façade `external_call` nodes go through.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{error::ActionError, template::Variables};

/// A named action on the booking system (check availability, create a
/// check-in link, …). Returns fields to merge into workflow variables.
#[async_trait]
pub trait ExternalActions: Send + Sync {
    async fn call(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Variables, ActionError>;
}

/// Backend used when no endpoint is configured: every action fails, so
/// workflows take their error edges.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActions;

#[async_trait]
impl ExternalActions for NoActions {
    async fn call(
        &self,
        action: &str,
        _params: &BTreeMap<String, String>,
    ) -> Result<Variables, ActionError> {
        Err(ActionError::NotConfigured(action.to_string()))
    }
}
