//! Interactive backend that asks the operator on the terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use dialoguer::Confirm;
use tracing::warn;

use mediagate_core::OsPermission;

use crate::permission::{OsError, PermissionResultSender, RequestCode};

use super::OsPermissionSubsystem;

/// Shows each prompt as a yes/no question on a dedicated thread.
///
/// Grants live for the lifetime of the process only.
pub struct TerminalOs {
    results: PermissionResultSender,
    granted: Arc<Mutex<HashMap<OsPermission, bool>>>,
}

impl TerminalOs {
    pub fn new(results: PermissionResultSender) -> Self {
        Self {
            results,
            granted: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start with `permission` already granted.
    pub fn with_granted(self, permission: OsPermission) -> Self {
        self.granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(permission, true);
        self
    }
}

impl OsPermissionSubsystem for TerminalOs {
    fn query_granted(&self, permission: OsPermission) -> Result<bool, OsError> {
        Ok(self
            .granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&permission)
            .copied()
            .unwrap_or(false))
    }

    fn request_permissions(
        &self,
        code: RequestCode,
        permissions: &[OsPermission],
    ) -> Result<(), OsError> {
        let permissions = permissions.to_vec();
        let results = self.results.clone();
        let granted = Arc::clone(&self.granted);

        std::thread::Builder::new()
            .name(format!("prompt-{code}"))
            .spawn(move || {
                let mut answers = Vec::with_capacity(permissions.len());
                for permission in permissions {
                    let answer = Confirm::new()
                        .with_prompt(format!("Allow this page to use your {permission}?"))
                        .default(false)
                        .interact();
                    match answer {
                        Ok(allow) => answers.push((permission, allow)),
                        Err(e) => {
                            warn!(%code, error = %e, "Terminal prompt interrupted");
                            results.cancel(code);
                            return;
                        }
                    }
                }
                for (permission, allow) in answers {
                    granted
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(permission, allow);
                    results.deliver(code, permission, allow);
                }
            })
            .map(|_| ())
            .map_err(|e| OsError::Prompt {
                code,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::permission::result_channel;

    #[test]
    fn starts_with_nothing_granted() {
        let (tx, _rx) = result_channel();
        let os = TerminalOs::new(tx);
        for perm in OsPermission::ALL {
            assert!(!os.query_granted(perm).unwrap());
        }
    }

    #[test]
    fn preset_grant_is_reported() {
        let (tx, _rx) = result_channel();
        let os = TerminalOs::new(tx).with_granted(OsPermission::Camera);
        assert!(os.query_granted(OsPermission::Camera).unwrap());
        assert!(!os.query_granted(OsPermission::Microphone).unwrap());
    }
}
