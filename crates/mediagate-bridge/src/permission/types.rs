//! Authorization bridge types.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use mediagate_core::{MediaResource, OsPermission};

/// Correlation code handed to the OS when a prompt is issued.
///
/// The OS echoes it back with every result so late answers to an earlier
/// prompt can be told apart from answers to the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestCode(pub u32);

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One web-originated ask for one or more media resources.
#[derive(Debug, Clone)]
pub struct CapabilityRequest {
    /// Opaque correlation token.
    pub id: String,
    /// Supported resources named by the request.
    pub resources: BTreeSet<MediaResource>,
    /// When the request was received.
    pub created_at: Instant,
}

impl CapabilityRequest {
    pub fn new(resources: BTreeSet<MediaResource>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resources,
            created_at: Instant::now(),
        }
    }
}

/// Correlation state between an issued OS prompt and the request awaiting it.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// The request being authorized.
    pub request: CapabilityRequest,
    /// Code the prompt was issued under.
    pub code: RequestCode,
    /// Permissions the prompt asked for.
    pub awaited: BTreeSet<OsPermission>,
    /// Awaited permissions the OS has granted so far.
    pub granted: BTreeSet<OsPermission>,
    /// Awaited permissions the OS has denied so far.
    pub denied: BTreeSet<OsPermission>,
    /// Required permissions that were already granted before the prompt.
    pub already_granted: BTreeSet<OsPermission>,
}

impl PendingAuthorization {
    /// Every awaited permission has an outcome.
    pub fn is_complete(&self) -> bool {
        self.awaited
            .iter()
            .all(|p| self.granted.contains(p) || self.denied.contains(p))
    }

    /// Permissions usable once this authorization resolves.
    pub fn effective_grants(&self) -> BTreeSet<OsPermission> {
        self.already_granted.union(&self.granted).copied().collect()
    }

    pub(crate) fn record(&mut self, permission: OsPermission, granted: bool) {
        if granted {
            self.denied.remove(&permission);
            self.granted.insert(permission);
        } else {
            self.granted.remove(&permission);
            self.denied.insert(permission);
        }
    }
}

/// Why a request resolved without any resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The request named no supported resource.
    NothingRequested,
    /// The OS (or the user) refused every requested permission.
    Refused,
    /// The OS never answered within the prompt timeout.
    TimedOut,
    /// The OS reported the prompt as interrupted.
    Cancelled,
    /// The OS could not show the prompt.
    PromptFailed,
}

/// Final resolution of an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// Enable exactly these resources (never empty).
    Granted {
        resources: BTreeSet<MediaResource>,
        /// Whether an OS prompt was needed.
        prompted: bool,
    },
    /// Enable nothing.
    Denied { reason: DenialReason },
}

impl AuthorizationOutcome {
    /// Resources to enable; empty on denial.
    pub fn granted_resources(&self) -> BTreeSet<MediaResource> {
        match self {
            Self::Granted { resources, .. } => resources.clone(),
            Self::Denied { .. } => BTreeSet::new(),
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Granted { .. } => "granted",
            Self::Denied { .. } => "denied",
        }
    }
}

/// Errors surfaced by [`super::AuthorizationCoordinator::authorize`].
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Another authorization is in flight: {in_flight}")]
    ConcurrentRequestRejected { in_flight: String },

    #[error("Completed authorization not available for request {request_id}")]
    NotReady { request_id: String },
}

/// Pending registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Authorization already in flight: {in_flight}")]
    Busy { in_flight: String },

    #[error("No completed authorization to take")]
    NotReady,

    #[error("No authorization pending")]
    NoPending,

    #[error("Result for code {got} does not match pending code {expected}")]
    CodeMismatch {
        expected: RequestCode,
        got: RequestCode,
    },

    #[error("Permission {permission} was not part of prompt {code}")]
    NotAwaited {
        code: RequestCode,
        permission: OsPermission,
    },
}

/// Errors reported by an OS permission backend.
#[derive(Debug, thiserror::Error)]
pub enum OsError {
    #[error("Permission query failed for {permission}: {reason}")]
    Query {
        permission: OsPermission,
        reason: String,
    },

    #[error("Could not issue prompt {code}: {reason}")]
    Prompt { code: RequestCode, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(awaited: &[OsPermission]) -> PendingAuthorization {
        PendingAuthorization {
            request: CapabilityRequest::new(BTreeSet::from(MediaResource::ALL)),
            code: RequestCode(1001),
            awaited: awaited.iter().copied().collect(),
            granted: BTreeSet::new(),
            denied: BTreeSet::new(),
            already_granted: BTreeSet::new(),
        }
    }

    #[test]
    fn fresh_pending_is_incomplete() {
        let auth = pending(&[OsPermission::Camera]);
        assert!(!auth.is_complete());
        assert!(auth.granted.is_empty() && auth.denied.is_empty());
    }

    #[test]
    fn later_record_overwrites_earlier() {
        let mut auth = pending(&[OsPermission::Camera]);
        auth.record(OsPermission::Camera, false);
        auth.record(OsPermission::Camera, true);
        assert!(auth.granted.contains(&OsPermission::Camera));
        assert!(auth.denied.is_empty());
        assert!(auth.is_complete());
    }

    #[test]
    fn effective_grants_include_already_granted() {
        let mut auth = pending(&[OsPermission::Microphone]);
        auth.already_granted.insert(OsPermission::Camera);
        auth.record(OsPermission::Microphone, false);
        assert_eq!(auth.effective_grants(), BTreeSet::from([OsPermission::Camera]));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = CapabilityRequest::new(BTreeSet::new());
        let b = CapabilityRequest::new(BTreeSet::new());
        assert_ne!(a.id, b.id);
    }
}
