//! Pending authorization registry.
//!
//! Holds at most one authorization between "prompt issued" and "OS result
//! received". The single slot and the completion signal live behind one
//! mutex, so `begin_pending`, `record_result` and `take_completed` never
//! interleave.

use std::collections::BTreeSet;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use mediagate_core::OsPermission;

use super::types::{CapabilityRequest, PendingAuthorization, RegistryError, RequestCode};

/// Handle returned to the request path when a prompt slot is claimed.
#[derive(Debug)]
pub struct PendingTicket {
    /// State as registered.
    pub snapshot: PendingAuthorization,
    /// Fires once every awaited permission has an outcome. Dropped without
    /// firing when the slot is force-cleared first.
    pub completion: oneshot::Receiver<()>,
}

/// Result of folding one permission outcome into the live authorization.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// Every awaited permission has now been recorded at least once.
    pub completed: bool,
    /// State after the record.
    pub snapshot: PendingAuthorization,
}

#[derive(Debug)]
struct Slot {
    auth: PendingAuthorization,
    completion_tx: Option<oneshot::Sender<()>>,
}

/// Single-slot registry of the in-flight authorization.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    slot: Mutex<Option<Slot>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `request`, or fail with `Busy` if it is taken.
    pub async fn begin_pending(
        &self,
        request: CapabilityRequest,
        code: RequestCode,
        awaited: BTreeSet<OsPermission>,
        already_granted: BTreeSet<OsPermission>,
    ) -> Result<PendingTicket, RegistryError> {
        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Err(RegistryError::Busy {
                in_flight: existing.auth.request.id.clone(),
            });
        }

        let auth = PendingAuthorization {
            request,
            code,
            awaited,
            granted: BTreeSet::new(),
            denied: BTreeSet::new(),
            already_granted,
        };
        let (completion_tx, completion) = oneshot::channel();
        let snapshot = auth.clone();
        *slot = Some(Slot {
            auth,
            completion_tx: Some(completion_tx),
        });
        drop(slot);

        debug!(
            request_id = %snapshot.request.id,
            %code,
            awaited = ?snapshot.awaited,
            "Pending authorization registered"
        );
        Ok(PendingTicket {
            snapshot,
            completion,
        })
    }

    /// Fold one OS outcome into the live authorization.
    pub async fn record_result(
        &self,
        code: RequestCode,
        permission: OsPermission,
        granted: bool,
    ) -> Result<RecordOutcome, RegistryError> {
        let mut guard = self.slot.lock().await;
        let slot = guard.as_mut().ok_or(RegistryError::NoPending)?;

        if slot.auth.code != code {
            return Err(RegistryError::CodeMismatch {
                expected: slot.auth.code,
                got: code,
            });
        }
        if !slot.auth.awaited.contains(&permission) {
            return Err(RegistryError::NotAwaited { code, permission });
        }

        slot.auth.record(permission, granted);
        let completed = slot.auth.is_complete();
        let abandoned = completed
            && slot
                .completion_tx
                .take()
                .is_some_and(|tx| tx.send(()).is_err());
        let snapshot = slot.auth.clone();
        if abandoned {
            // Nobody is left to take it; free the slot for the next request.
            *guard = None;
        }
        drop(guard);

        if abandoned {
            warn!(%code, "Authorization completed but the request path is gone");
        }

        debug!(%code, %permission, granted, completed, "Recorded permission result");
        Ok(RecordOutcome {
            completed,
            snapshot,
        })
    }

    /// Consume the completed authorization, freeing the slot.
    pub async fn take_completed(&self) -> Result<PendingAuthorization, RegistryError> {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(s) if s.auth.is_complete() => {}
            _ => return Err(RegistryError::NotReady),
        }
        slot.take()
            .map(|s| s.auth)
            .ok_or(RegistryError::NotReady)
    }

    /// Clear the slot if it still holds `code`.
    ///
    /// Returns the cleared authorization, complete or not. A slot holding a
    /// different code is left untouched.
    pub async fn force_clear(&self, code: RequestCode) -> Option<PendingAuthorization> {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|s| s.auth.code == code) {
            let cleared = slot.take().map(|s| s.auth);
            drop(slot);
            warn!(%code, "Pending authorization force-cleared");
            cleared
        } else {
            None
        }
    }

    /// Whether an authorization is in flight.
    pub async fn is_busy(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Copy of the in-flight authorization, if any.
    pub async fn snapshot(&self) -> Option<PendingAuthorization> {
        self.slot.lock().await.as_ref().map(|s| s.auth.clone())
    }
}
