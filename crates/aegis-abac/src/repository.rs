//! File-backed policy repository with mtime-driven hot reload.
//!
//! The current policy set lives behind an [`ArcSwap`]: readers always see a
//! fully-constructed snapshot, and a reload replaces the whole snapshot in
//! one atomic pointer swap. The reload critical section is serialized by an
//! async mutex so concurrent readers never trigger duplicate reloads, while
//! the swap itself never blocks readers.
//!
//! Reload sequencing matters: the file mtime is read *before* the content,
//! and only recorded after a successful parse, so a writer slower than one
//! polling interval triggers at most one extra reload instead of a stale
//! snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;

use crate::error::PolicyError;
use crate::model::{Decision, EffectsDistribution, Policy, PolicySet, ValidationResult};
use crate::validator::PolicyValidator;

// =============================================================================
// Snapshot
// =============================================================================

/// One immutable, fully-validated view of the policy file.
#[derive(Debug)]
pub struct PolicySnapshot {
    /// Compiled, priority-ordered policy set.
    pub set: PolicySet,
    /// Raw document the set was compiled from (re-validated on demand).
    pub raw: Value,
    /// Modification time of the file this snapshot was loaded from.
    pub last_modified: Option<SystemTime>,
}

impl PolicySnapshot {
    fn empty() -> Self {
        Self {
            set: PolicySet::empty(),
            raw: serde_json::json!({ "policies": [] }),
            last_modified: None,
        }
    }
}

/// Metadata about the currently-loaded policy set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PolicySetMetadata {
    /// Version string from the policy file.
    pub version: String,
    /// Description from the policy file.
    pub description: String,
    /// Number of loaded policies.
    pub policies_count: usize,
    /// RFC 3339 timestamp of the backing file, if it existed at load time.
    pub last_modified: Option<String>,
    /// Path of the backing file.
    pub file_path: String,
    /// Count of policies per effect.
    pub effects_distribution: EffectsDistribution,
}

// =============================================================================
// Repository
// =============================================================================

/// In-memory policy repository backed by a JSON file.
pub struct PolicyRepository {
    file_path: PathBuf,
    snapshot: ArcSwap<PolicySnapshot>,
    generation: AtomicU64,
    reload_lock: Mutex<()>,
}

impl PolicyRepository {
    /// Opens the repository, loading the file if it exists.
    ///
    /// A missing file is not fatal: the repository starts with an empty
    /// policy set and a warning. A malformed file on first load also boots
    /// with an empty set; the error is reported, never swallowed.
    pub async fn open(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let repository = Self {
            file_path,
            snapshot: ArcSwap::from_pointee(PolicySnapshot::empty()),
            generation: AtomicU64::new(0),
            reload_lock: Mutex::new(()),
        };

        match repository.read_and_validate().await {
            Ok(Some(snapshot)) => {
                let count = snapshot.set.policies.len();
                repository.install(snapshot);
                tracing::info!(
                    policies_file = %repository.file_path.display(),
                    policies_count = count,
                    "Policy repository initialized"
                );
            }
            Ok(None) => {
                tracing::warn!(
                    policies_file = %repository.file_path.display(),
                    "Policies file not found, using empty policy set"
                );
            }
            Err(err) => {
                tracing::error!(
                    policies_file = %repository.file_path.display(),
                    error = %err,
                    "Initial policy load failed, using empty policy set"
                );
            }
        }

        repository
    }

    /// Path of the backing policy file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Monotonic counter incremented on every successful snapshot swap.
    ///
    /// The authorization service compares generations to flush its decision
    /// cache after a reload, never before.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the current snapshot, hot-reloading first if the backing
    /// file changed.
    pub async fn snapshot(&self) -> Arc<PolicySnapshot> {
        if self.needs_reload().await {
            tracing::info!("Hot-reloading policies due to file changes");
            let result = self.reload_policies().await;
            if !result.valid {
                tracing::warn!(
                    errors = ?result.errors,
                    "Hot reload failed, retaining previous policy set"
                );
            }
        }
        self.snapshot.load_full()
    }

    /// Returns a copy of all policies in evaluation order.
    pub async fn get_all_policies(&self) -> Vec<Policy> {
        self.snapshot().await.set.policies.clone()
    }

    /// Finds a policy by rule id.
    pub async fn get_policy_by_id(&self, rule_id: &str) -> Option<Policy> {
        self.snapshot()
            .await
            .set
            .policies
            .iter()
            .find(|p| p.rule_id == rule_id)
            .cloned()
    }

    /// Returns all policies with the given effect.
    pub async fn get_policies_by_effect(&self, effect: Decision) -> Vec<Policy> {
        self.snapshot()
            .await
            .set
            .policies
            .iter()
            .filter(|p| p.effect == effect)
            .cloned()
            .collect()
    }

    /// Forces a re-read and re-validate of the policy file.
    ///
    /// On success the new snapshot is swapped in atomically; on failure the
    /// current snapshot is retained and the validation result reports why.
    pub async fn reload_policies(&self) -> ValidationResult {
        let _guard = self.reload_lock.lock().await;

        match self.read_and_validate().await {
            Ok(Some(snapshot)) => {
                let count = snapshot.set.policies.len();
                let result = PolicyValidator::validate_document(&snapshot.raw);
                self.install(snapshot);
                tracing::info!(policies_count = count, "Policies reloaded");
                result
            }
            Ok(None) => {
                let current = self.snapshot.load();
                tracing::warn!(
                    policies_file = %self.file_path.display(),
                    "Policies file not found on reload, retaining current set"
                );
                ValidationResult::failed(
                    format!("Policies file not found: {}", self.file_path.display()),
                    current.set.policies.len(),
                )
            }
            Err(err) => {
                let current = self.snapshot.load();
                tracing::error!(error = %err, "Policy reload failed, retaining current set");
                match err {
                    ReloadFailure::Invalid(mut result) => {
                        result.policies_count = current.set.policies.len();
                        result
                    }
                    ReloadFailure::Other(err) => {
                        ValidationResult::failed(err.to_string(), current.set.policies.len())
                    }
                }
            }
        }
    }

    /// Re-runs the validator against the in-memory document.
    pub fn validate_current_policies(&self) -> ValidationResult {
        let snapshot = self.snapshot.load();
        PolicyValidator::validate_document(&snapshot.raw)
    }

    /// Returns metadata about the current policy set.
    pub async fn metadata(&self) -> PolicySetMetadata {
        let snapshot = self.snapshot().await;
        PolicySetMetadata {
            version: snapshot.set.version.clone(),
            description: snapshot.set.description.clone(),
            policies_count: snapshot.set.policies.len(),
            last_modified: snapshot.last_modified.and_then(format_system_time),
            file_path: self.file_path.display().to_string(),
            effects_distribution: snapshot.set.effects_distribution(),
        }
    }

    /// Installs a new snapshot and bumps the generation counter.
    fn install(&self, snapshot: PolicySnapshot) {
        self.snapshot.store(Arc::new(snapshot));
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Checks whether the backing file is newer than the loaded snapshot.
    async fn needs_reload(&self) -> bool {
        let mtime = match tokio::fs::metadata(&self.file_path).await {
            Ok(meta) => meta.modified().ok(),
            Err(_) => return false,
        };
        let Some(mtime) = mtime else {
            return false;
        };

        match self.snapshot.load().last_modified {
            None => true,
            Some(loaded) => mtime > loaded,
        }
    }

    /// Reads and validates the file, producing a ready-to-install snapshot.
    ///
    /// `Ok(None)` means the file does not exist. The mtime is captured from
    /// the metadata read *before* the content read.
    async fn read_and_validate(&self) -> Result<Option<PolicySnapshot>, ReloadFailure> {
        let metadata = match tokio::fs::metadata(&self.file_path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ReloadFailure::Other(err.into())),
        };
        let mtime = metadata.modified().ok();

        let content = tokio::fs::read_to_string(&self.file_path)
            .await
            .map_err(|err| ReloadFailure::Other(err.into()))?;
        let raw: Value =
            serde_json::from_str(&content).map_err(|err| ReloadFailure::Other(err.into()))?;

        let set = PolicyValidator::compile_document(&raw).map_err(ReloadFailure::Invalid)?;

        let result = PolicyValidator::validate_document(&raw);
        if !result.warnings.is_empty() {
            tracing::warn!(warnings = ?result.warnings, "Policy validation warnings");
        }

        Ok(Some(PolicySnapshot {
            set,
            raw,
            last_modified: mtime,
        }))
    }
}

enum ReloadFailure {
    Invalid(ValidationResult),
    Other(PolicyError),
}

impl std::fmt::Display for ReloadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(result) => {
                write!(f, "Invalid policies: {}", result.errors.join("; "))
            }
            Self::Other(err) => write!(f, "{err}"),
        }
    }
}

fn format_system_time(time: SystemTime) -> Option<String> {
    OffsetDateTime::from(time).format(&Rfc3339).ok()
}
