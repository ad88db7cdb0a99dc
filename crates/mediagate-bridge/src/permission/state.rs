//! Permission state store.
//!
//! The OS is the source of truth: every check is a live query. The
//! last-known table only mirrors what the OS reported, for diagnostics.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use mediagate_core::OsPermission;

use crate::platform::OsPermissionSubsystem;

pub struct PermissionStateStore {
    os: Arc<dyn OsPermissionSubsystem>,
    last_known: RwLock<HashMap<OsPermission, bool>>,
}

impl PermissionStateStore {
    pub fn new(os: Arc<dyn OsPermissionSubsystem>) -> Self {
        Self {
            os,
            last_known: RwLock::new(HashMap::new()),
        }
    }

    /// Query the OS. A failed query counts as not granted and is not retried.
    pub fn is_granted(&self, permission: OsPermission) -> bool {
        let granted = match self.os.query_granted(permission) {
            Ok(granted) => granted,
            Err(e) => {
                warn!(%permission, error = %e, "Permission query failed, treating as not granted");
                false
            }
        };
        self.remember(permission, granted);
        granted
    }

    /// Record what the OS just reported through a prompt result.
    pub fn record_reported(&self, permission: OsPermission, granted: bool) {
        debug!(%permission, granted, "OS reported permission state");
        self.remember(permission, granted);
    }

    /// Last state seen for `permission`, if any. Never used for decisions.
    pub fn last_known(&self, permission: OsPermission) -> Option<bool> {
        self.last_known
            .read()
            .ok()
            .and_then(|m| m.get(&permission).copied())
    }

    fn remember(&self, permission: OsPermission, granted: bool) {
        if let Ok(mut map) = self.last_known.write() {
            map.insert(permission, granted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::result_channel;
    use crate::platform::SimulatedOs;

    fn store_with(os: &Arc<SimulatedOs>) -> PermissionStateStore {
        PermissionStateStore::new(Arc::clone(os) as Arc<dyn OsPermissionSubsystem>)
    }

    #[test]
    fn queries_os_every_time() {
        let (tx, _rx) = result_channel();
        let os = Arc::new(SimulatedOs::new(tx));
        let store = store_with(&os);

        assert!(!store.is_granted(OsPermission::Camera));
        os.set_granted(OsPermission::Camera, true);
        assert!(store.is_granted(OsPermission::Camera));
        os.set_granted(OsPermission::Camera, false);
        assert!(!store.is_granted(OsPermission::Camera));
        assert_eq!(os.query_count(), 3);
    }

    #[test]
    fn query_failure_is_not_granted() {
        let (tx, _rx) = result_channel();
        let os = Arc::new(SimulatedOs::new(tx));
        os.set_granted(OsPermission::Microphone, true);
        os.fail_queries(true);
        let store = store_with(&os);

        assert!(!store.is_granted(OsPermission::Microphone));
        assert_eq!(store.last_known(OsPermission::Microphone), Some(false));
    }

    #[test]
    fn reported_state_is_remembered() {
        let (tx, _rx) = result_channel();
        let os = Arc::new(SimulatedOs::new(tx));
        let store = store_with(&os);

        assert_eq!(store.last_known(OsPermission::Camera), None);
        store.record_reported(OsPermission::Camera, true);
        assert_eq!(store.last_known(OsPermission::Camera), Some(true));
    }
}
