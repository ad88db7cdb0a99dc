//! OS permission backends.
//!
//! The bridge only needs two things from the host OS: a synchronous
//! "is this granted?" query and a way to show a prompt whose results come
//! back later through a [`crate::permission::PermissionResultSender`].

mod simulated;
mod terminal;

use mediagate_core::OsPermission;

use crate::permission::{OsError, RequestCode};

pub use simulated::{PromptRecord, ScriptedAnswer, SimulatedOs};
pub use terminal::TerminalOs;

/// Host OS permission subsystem.
pub trait OsPermissionSubsystem: Send + Sync {
    /// Live grant status of `permission`.
    fn query_granted(&self, permission: OsPermission) -> Result<bool, OsError>;

    /// Show the OS prompt for `permissions` under `code`.
    ///
    /// Returns once the prompt is issued; results are delivered later,
    /// possibly from another thread, or never.
    fn request_permissions(
        &self,
        code: RequestCode,
        permissions: &[OsPermission],
    ) -> Result<(), OsError>;
}
