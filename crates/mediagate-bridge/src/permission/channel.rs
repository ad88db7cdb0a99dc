//! OS result channel.
//!
//! Prompt results arrive on whatever thread the OS chooses, long after the
//! request path returned. They are posted here as messages and consumed by
//! the coordinator's pump task instead of calling back into request code.

use tokio::sync::mpsc;
use tracing::debug;

use mediagate_core::OsPermission;

use super::types::RequestCode;

/// Platform grant result meaning "granted"; any other value is a denial.
pub const PLATFORM_PERMISSION_GRANTED: i32 = 0;

/// A message from the OS about an issued prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsResultMessage {
    /// Outcome for one permission.
    Result {
        code: RequestCode,
        permission: OsPermission,
        granted: bool,
    },
    /// The prompt was interrupted before the user answered.
    Cancelled { code: RequestCode },
}

/// Sending half handed to OS backends. Usable from any thread.
#[derive(Debug, Clone)]
pub struct PermissionResultSender {
    tx: mpsc::UnboundedSender<OsResultMessage>,
}

/// Receiving half consumed by the coordinator.
#[derive(Debug)]
pub struct PermissionResultReceiver {
    rx: mpsc::UnboundedReceiver<OsResultMessage>,
}

/// Create a connected sender/receiver pair.
pub fn result_channel() -> (PermissionResultSender, PermissionResultReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PermissionResultSender { tx },
        PermissionResultReceiver { rx },
    )
}

impl PermissionResultSender {
    /// Deliver one permission outcome. Returns `false` if the coordinator is gone.
    pub fn deliver(&self, code: RequestCode, permission: OsPermission, granted: bool) -> bool {
        self.send(OsResultMessage::Result {
            code,
            permission,
            granted,
        })
    }

    /// Report the prompt as interrupted.
    pub fn cancel(&self, code: RequestCode) -> bool {
        self.send(OsResultMessage::Cancelled { code })
    }

    /// Deliver results in the platform's parallel-array form.
    ///
    /// Empty arrays mean the interaction was interrupted. Unknown permission
    /// names are skipped; extra entries in the longer array are ignored.
    pub fn deliver_platform_results<S: AsRef<str>>(
        &self,
        code: RequestCode,
        permissions: &[S],
        grant_results: &[i32],
    ) -> bool {
        if permissions.is_empty() || grant_results.is_empty() {
            return self.cancel(code);
        }

        let mut delivered = true;
        for (name, result) in permissions.iter().zip(grant_results) {
            let name = name.as_ref();
            let Some(permission) = OsPermission::from_platform_name(name) else {
                debug!(%code, permission = name, "Ignoring result for unknown permission");
                continue;
            };
            delivered &= self.deliver(code, permission, *result == PLATFORM_PERMISSION_GRANTED);
        }
        delivered
    }

    fn send(&self, msg: OsResultMessage) -> bool {
        self.tx.send(msg).is_ok()
    }
}

impl PermissionResultReceiver {
    /// Next message, or `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<OsResultMessage> {
        self.rx.recv().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn platform_arrays_translate_per_permission() {
        let (tx, mut rx) = result_channel();
        assert!(tx.deliver_platform_results(
            RequestCode(1003),
            &["android.permission.CAMERA", "android.permission.RECORD_AUDIO"],
            &[0, -1],
        ));

        assert_eq!(
            rx.recv().await.unwrap(),
            OsResultMessage::Result {
                code: RequestCode(1003),
                permission: OsPermission::Camera,
                granted: true
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            OsResultMessage::Result {
                code: RequestCode(1003),
                permission: OsPermission::Microphone,
                granted: false
            }
        );
    }

    #[tokio::test]
    async fn empty_platform_arrays_cancel() {
        let (tx, mut rx) = result_channel();
        let none: [&str; 0] = [];
        tx.deliver_platform_results(RequestCode(7), &none, &[]);
        assert_eq!(
            rx.recv().await.unwrap(),
            OsResultMessage::Cancelled {
                code: RequestCode(7)
            }
        );
    }

    #[tokio::test]
    async fn unknown_platform_names_skipped() {
        let (tx, mut rx) = result_channel();
        tx.deliver_platform_results(
            RequestCode(1),
            &["android.permission.INTERNET", "android.permission.CAMERA"],
            &[0, 0],
        );
        drop(tx);

        assert_eq!(
            rx.recv().await.unwrap(),
            OsResultMessage::Result {
                code: RequestCode(1),
                permission: OsPermission::Camera,
                granted: true
            }
        );
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn deliver_after_receiver_dropped() {
        let (tx, rx) = result_channel();
        drop(rx);
        assert!(!tx.deliver(RequestCode(1), OsPermission::Camera, true));
    }
}
