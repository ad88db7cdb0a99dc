//! Authorization bridge between web capability requests and OS prompts.
//!
//! A request naming media resources is classified into OS permissions,
//! checked against the live OS state, and if anything is missing parked in a
//! single-slot registry while the OS prompt runs. Results come back through
//! the result channel and are translated back into media resources.

mod channel;
mod coordinator;
mod registry;
mod state;
mod types;

pub use channel::{
    OsResultMessage, PLATFORM_PERMISSION_GRANTED, PermissionResultReceiver,
    PermissionResultSender, result_channel,
};
pub use coordinator::{AuthorizationCoordinator, CoordinatorConfig};
pub use registry::{PendingRegistry, PendingTicket, RecordOutcome};
pub use state::PermissionStateStore;
pub use types::{
    AuthorizationError, AuthorizationOutcome, CapabilityRequest, DenialReason, OsError,
    PendingAuthorization, RegistryError, RequestCode,
};
