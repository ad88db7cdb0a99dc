//! In-memory OS backend with scripted prompt answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use mediagate_core::OsPermission;

use crate::permission::{OsError, PermissionResultSender, RequestCode};

use super::OsPermissionSubsystem;

/// How the simulated user answers a prompt for one permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptedAnswer {
    Grant,
    Deny,
    /// Never answer; the result must be delivered by hand or time out.
    #[default]
    Ignore,
}

impl std::str::FromStr for ScriptedAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grant" | "allow" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown answer '{other}' (expected grant, deny or ignore)")),
        }
    }
}

/// A prompt the simulated OS was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub code: RequestCode,
    pub permissions: Vec<OsPermission>,
}

#[derive(Debug, Default)]
struct Inner {
    granted: HashMap<OsPermission, bool>,
    answers: HashMap<OsPermission, ScriptedAnswer>,
    default_answer: ScriptedAnswer,
    answer_delay: Duration,
    fail_queries: bool,
    fail_prompts: bool,
    prompts: Vec<PromptRecord>,
}

/// Simulated OS permission subsystem.
///
/// Scripted answers are delivered from a separate thread, as a real OS
/// callback would be.
pub struct SimulatedOs {
    results: PermissionResultSender,
    inner: Arc<Mutex<Inner>>,
    queries: AtomicUsize,
    prompt_tx: mpsc::UnboundedSender<PromptRecord>,
    prompt_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PromptRecord>>,
}

impl SimulatedOs {
    /// Nothing granted, every prompt ignored.
    pub fn new(results: PermissionResultSender) -> Self {
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
        Self {
            results,
            inner: Arc::new(Mutex::new(Inner::default())),
            queries: AtomicUsize::new(0),
            prompt_tx,
            prompt_rx: tokio::sync::Mutex::new(prompt_rx),
        }
    }

    pub fn set_granted(&self, permission: OsPermission, granted: bool) {
        lock(&self.inner).granted.insert(permission, granted);
    }

    /// Script the answer for one permission.
    pub fn answer(&self, permission: OsPermission, answer: ScriptedAnswer) {
        lock(&self.inner).answers.insert(permission, answer);
    }

    /// Script the answer for every permission without a specific one.
    pub fn answer_all(&self, answer: ScriptedAnswer) {
        lock(&self.inner).default_answer = answer;
    }

    /// Delay scripted answers by `delay`.
    pub fn set_answer_delay(&self, delay: Duration) {
        lock(&self.inner).answer_delay = delay;
    }

    pub fn fail_queries(&self, fail: bool) {
        lock(&self.inner).fail_queries = fail;
    }

    pub fn fail_prompts(&self, fail: bool) {
        lock(&self.inner).fail_prompts = fail;
    }

    /// Number of grant queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Every prompt issued so far, oldest first.
    pub fn prompts(&self) -> Vec<PromptRecord> {
        lock(&self.inner).prompts.clone()
    }

    /// Wait for the next prompt to be issued.
    pub async fn next_prompt(&self) -> Option<PromptRecord> {
        self.prompt_rx.lock().await.recv().await
    }

    /// Answer one permission of prompt `code` by hand.
    pub fn respond(&self, code: RequestCode, permission: OsPermission, granted: bool) -> bool {
        lock(&self.inner).granted.insert(permission, granted);
        self.results.deliver(code, permission, granted)
    }

    /// Report prompt `code` as interrupted.
    pub fn cancel(&self, code: RequestCode) -> bool {
        self.results.cancel(code)
    }
}

impl OsPermissionSubsystem for SimulatedOs {
    fn query_granted(&self, permission: OsPermission) -> Result<bool, OsError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let inner = lock(&self.inner);
        if inner.fail_queries {
            return Err(OsError::Query {
                permission,
                reason: "simulated query failure".to_string(),
            });
        }
        Ok(inner.granted.get(&permission).copied().unwrap_or(false))
    }

    fn request_permissions(
        &self,
        code: RequestCode,
        permissions: &[OsPermission],
    ) -> Result<(), OsError> {
        let mut inner = lock(&self.inner);
        if inner.fail_prompts {
            return Err(OsError::Prompt {
                code,
                reason: "simulated prompt failure".to_string(),
            });
        }

        let record = PromptRecord {
            code,
            permissions: permissions.to_vec(),
        };
        inner.prompts.push(record.clone());
        let scripted: Vec<(OsPermission, bool)> = permissions
            .iter()
            .filter_map(|p| {
                match inner.answers.get(p).copied().unwrap_or(inner.default_answer) {
                    ScriptedAnswer::Grant => Some((*p, true)),
                    ScriptedAnswer::Deny => Some((*p, false)),
                    ScriptedAnswer::Ignore => None,
                }
            })
            .collect();
        let delay = inner.answer_delay;
        drop(inner);

        let _ = self.prompt_tx.send(record);
        debug!(%code, ?permissions, answered = scripted.len(), "Simulated prompt shown");

        if !scripted.is_empty() {
            let shared = Arc::clone(&self.inner);
            let results = self.results.clone();
            std::thread::spawn(move || {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                for (permission, granted) in scripted {
                    lock(&shared).granted.insert(permission, granted);
                    results.deliver(code, permission, granted);
                }
            });
        }
        Ok(())
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
