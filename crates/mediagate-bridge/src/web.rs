//! Web layer adapter.
//!
//! Accepts the web layer's string-typed request and answers with a
//! [`WebDecision`]. The web layer only ever sees a grant (possibly of a
//! subset), a denial, or the concurrent-request rejection.

use std::sync::Arc;

use tracing::error;

use mediagate_core::web::{WebCapabilityRequest, WebDecision};

use crate::permission::{AuthorizationCoordinator, AuthorizationError, AuthorizationOutcome};

/// Forwards web capability requests to the coordinator.
#[derive(Clone)]
pub struct WebPermissionHandler {
    coordinator: Arc<AuthorizationCoordinator>,
}

impl WebPermissionHandler {
    pub const fn new(coordinator: Arc<AuthorizationCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Resolve one web request.
    pub async fn handle(&self, request: &WebCapabilityRequest) -> WebDecision {
        match self.coordinator.authorize(request.media_resources()).await {
            Ok(AuthorizationOutcome::Granted { resources, .. }) => WebDecision::Grant {
                resources: request.echo_granted(&resources),
            },
            Ok(AuthorizationOutcome::Denied { .. }) => WebDecision::Deny,
            Err(e @ AuthorizationError::ConcurrentRequestRejected { .. }) => {
                WebDecision::Rejected {
                    reason: e.to_string(),
                }
            }
            Err(e @ AuthorizationError::NotReady { .. }) => {
                error!(error = %e, "Authorization failed internally, denying");
                WebDecision::Deny
            }
        }
    }

    pub fn coordinator(&self) -> &AuthorizationCoordinator {
        &self.coordinator
    }
}
