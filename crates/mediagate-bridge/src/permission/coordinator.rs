//! Authorization coordinator.
//!
//! Drives one capability request from classification to resolution:
//! classify resources into OS permissions, query the OS, and if anything is
//! missing claim the single prompt slot, issue the prompt and wait for the
//! pump task to fold in the OS results.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use mediagate_core::config::BridgeConfig;
use mediagate_core::resource::{media_resources_granted, os_permissions_for};
use mediagate_core::{MediaResource, OsPermission};

use crate::platform::OsPermissionSubsystem;

use super::channel::{OsResultMessage, PermissionResultReceiver};
use super::registry::PendingRegistry;
use super::state::PermissionStateStore;
use super::types::{
    AuthorizationError, AuthorizationOutcome, CapabilityRequest, DenialReason,
    PendingAuthorization, RegistryError, RequestCode,
};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on the wait for OS prompt results.
    pub prompt_timeout: Duration,
    /// First correlation code handed to the OS.
    pub request_code_base: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        BridgeConfig::default().into()
    }
}

impl From<BridgeConfig> for CoordinatorConfig {
    fn from(config: BridgeConfig) -> Self {
        Self {
            prompt_timeout: config.prompt_timeout(),
            request_code_base: config.request_code_base,
        }
    }
}

/// Reconciles web capability requests with the OS permission prompt flow.
pub struct AuthorizationCoordinator {
    os: Arc<dyn OsPermissionSubsystem>,
    state: Arc<PermissionStateStore>,
    registry: Arc<PendingRegistry>,
    config: CoordinatorConfig,
    next_code: AtomicU32,
    pump: JoinHandle<()>,
    #[cfg(feature = "metrics")]
    resolved: opentelemetry::metrics::Counter<u64>,
}

impl AuthorizationCoordinator {
    /// Create a coordinator and spawn its result pump.
    ///
    /// Must be called from within a tokio runtime. `results` must be the
    /// receiving half of the channel whose sender the OS backend delivers to.
    pub fn start(
        os: Arc<dyn OsPermissionSubsystem>,
        results: PermissionResultReceiver,
        config: CoordinatorConfig,
    ) -> Self {
        let state = Arc::new(PermissionStateStore::new(Arc::clone(&os)));
        let registry = Arc::new(PendingRegistry::new());
        let pump = tokio::spawn(run_pump(
            results,
            Arc::clone(&registry),
            Arc::clone(&state),
        ));

        Self {
            os,
            state,
            registry,
            next_code: AtomicU32::new(config.request_code_base),
            config,
            pump,
            #[cfg(feature = "metrics")]
            resolved: mediagate_core::metrics::authorization_counter(),
        }
    }

    /// Authorize `resources`, prompting the OS for whatever is missing.
    ///
    /// Resolves to the granted subset, or to a denial when nothing is
    /// usable. Fails with `ConcurrentRequestRejected` when another
    /// authorization is waiting on the OS.
    pub async fn authorize(
        &self,
        resources: BTreeSet<MediaResource>,
    ) -> Result<AuthorizationOutcome, AuthorizationError> {
        let request = CapabilityRequest::new(resources);
        let request_id = request.id.clone();

        if request.resources.is_empty() {
            debug!(request_id, "No supported resources requested");
            return Ok(self.finish(
                &request_id,
                AuthorizationOutcome::Denied {
                    reason: DenialReason::NothingRequested,
                },
            ));
        }

        // One authorization at a time, including ones needing no prompt.
        if let Some(in_flight) = self.registry.snapshot().await {
            let in_flight = in_flight.request.id;
            info!(request_id, in_flight, "Rejecting concurrent authorization");
            return Err(AuthorizationError::ConcurrentRequestRejected { in_flight });
        }

        let required = os_permissions_for(&request.resources);
        let (already_granted, missing): (BTreeSet<OsPermission>, BTreeSet<OsPermission>) =
            required
                .into_iter()
                .partition(|p| self.state.is_granted(*p));

        if missing.is_empty() {
            debug!(request_id, resources = ?request.resources, "All permissions already granted");
            return Ok(self.finish(
                &request_id,
                AuthorizationOutcome::Granted {
                    resources: request.resources,
                    prompted: false,
                },
            ));
        }

        let code = RequestCode(self.next_code.fetch_add(1, Ordering::Relaxed));
        let prompt: Vec<OsPermission> = missing.iter().copied().collect();
        let ticket = match self
            .registry
            .begin_pending(request, code, missing, already_granted)
            .await
        {
            Ok(ticket) => ticket,
            Err(RegistryError::Busy { in_flight }) => {
                info!(request_id, in_flight, "Rejecting concurrent authorization");
                return Err(AuthorizationError::ConcurrentRequestRejected { in_flight });
            }
            Err(e) => return Err(not_ready(request_id, &e)),
        };
        let mut guard = SlotGuard::new(Arc::clone(&self.registry), code);

        let outcome = self
            .await_resolution(&request_id, code, &prompt, ticket.completion)
            .await;
        guard.disarm();
        outcome
    }

    /// Issue the prompt and wait for the slot to resolve one way or another.
    async fn await_resolution(
        &self,
        request_id: &str,
        code: RequestCode,
        prompt: &[OsPermission],
        mut completion: oneshot::Receiver<()>,
    ) -> Result<AuthorizationOutcome, AuthorizationError> {
        if let Err(e) = self.os.request_permissions(code, prompt) {
            warn!(request_id, %code, error = %e, "OS prompt could not be issued");
            self.registry.force_clear(code).await;
            return Ok(self.finish(
                request_id,
                AuthorizationOutcome::Denied {
                    reason: DenialReason::PromptFailed,
                },
            ));
        }
        info!(request_id, %code, permissions = ?prompt, "OS prompt issued");

        let auth = match timeout(self.config.prompt_timeout, &mut completion).await {
            Ok(Ok(())) => match self.registry.take_completed().await {
                Ok(auth) => auth,
                Err(e) => return Err(not_ready(request_id.to_string(), &e)),
            },
            Ok(Err(_)) => {
                info!(request_id, %code, "OS prompt cancelled");
                return Ok(self.finish(
                    request_id,
                    AuthorizationOutcome::Denied {
                        reason: DenialReason::Cancelled,
                    },
                ));
            }
            Err(_) => return Ok(self.expire(request_id, code).await),
        };

        Ok(self.finish(request_id, reconcile(&auth)))
    }

    /// Resolve a prompt whose deadline passed, clearing its slot.
    async fn expire(&self, request_id: &str, code: RequestCode) -> AuthorizationOutcome {
        match self.registry.force_clear(code).await {
            // Last result raced the deadline.
            Some(auth) if auth.is_complete() => self.finish(request_id, reconcile(&auth)),
            _ => {
                warn!(
                    request_id,
                    %code,
                    timeout_secs = self.config.prompt_timeout.as_secs_f64(),
                    "OS prompt timed out"
                );
                self.finish(
                    request_id,
                    AuthorizationOutcome::Denied {
                        reason: DenialReason::TimedOut,
                    },
                )
            }
        }
    }

    /// The registry holding the in-flight authorization.
    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    /// The live permission state store.
    pub fn state(&self) -> &PermissionStateStore {
        &self.state
    }

    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn finish(&self, request_id: &str, outcome: AuthorizationOutcome) -> AuthorizationOutcome {
        match &outcome {
            AuthorizationOutcome::Granted {
                resources,
                prompted,
            } => info!(request_id, ?resources, prompted, "Authorization granted"),
            AuthorizationOutcome::Denied { reason } => {
                info!(request_id, ?reason, "Authorization denied");
            }
        }
        #[cfg(feature = "metrics")]
        self.resolved.add(
            1,
            &[opentelemetry::KeyValue::new("outcome", outcome.label())],
        );
        outcome
    }
}

impl Drop for AuthorizationCoordinator {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Frees the slot for `code` if the request future is dropped while waiting
/// on the OS.
struct SlotGuard {
    registry: Arc<PendingRegistry>,
    code: RequestCode,
    armed: bool,
}

impl SlotGuard {
    const fn new(registry: Arc<PendingRegistry>, code: RequestCode) -> Self {
        Self {
            registry,
            code,
            armed: true,
        }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let code = self.code;
        debug!(%code, "Authorization abandoned while waiting on the OS");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let registry = Arc::clone(&self.registry);
                handle.spawn(async move {
                    registry.force_clear(code).await;
                });
            }
            Err(e) => error!(%code, error = %e, "No runtime to clear abandoned authorization"),
        }
    }
}

/// The registry broke its own invariant; fatal in debug builds.
fn not_ready(request_id: String, e: &RegistryError) -> AuthorizationError {
    error!(request_id, error = %e, "Completed authorization not available");
    debug_assert!(false, "registry invariant violated: {e}");
    AuthorizationError::NotReady { request_id }
}

/// Translate a completed authorization back into media resources.
fn reconcile(auth: &PendingAuthorization) -> AuthorizationOutcome {
    let resources = media_resources_granted(&auth.request.resources, &auth.effective_grants());
    debug!(
        request_id = %auth.request.id,
        code = %auth.code,
        granted = ?auth.granted,
        denied = ?auth.denied,
        elapsed_ms = auth.request.created_at.elapsed().as_millis(),
        "Reconciled OS results"
    );
    if resources.is_empty() {
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused,
        }
    } else {
        AuthorizationOutcome::Granted {
            resources,
            prompted: true,
        }
    }
}

async fn run_pump(
    mut results: PermissionResultReceiver,
    registry: Arc<PendingRegistry>,
    state: Arc<PermissionStateStore>,
) {
    while let Some(msg) = results.recv().await {
        match msg {
            OsResultMessage::Result {
                code,
                permission,
                granted,
            } => {
                state.record_reported(permission, granted);
                match registry.record_result(code, permission, granted).await {
                    Ok(outcome) if outcome.completed => {
                        debug!(%code, "All awaited permissions answered");
                    }
                    Ok(_) => {}
                    Err(e) => debug!(%code, %permission, error = %e, "Dropping stale result"),
                }
            }
            OsResultMessage::Cancelled { code } => {
                let live_and_open = registry
                    .snapshot()
                    .await
                    .is_some_and(|a| a.code == code && !a.is_complete());
                if live_and_open {
                    registry.force_clear(code).await;
                } else {
                    debug!(%code, "Dropping stale cancellation");
                }
            }
        }
    }
    debug!("OS result channel closed");
}
