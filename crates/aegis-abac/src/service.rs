//! Authorization service: orchestrates policy evaluation.
//!
//! The service flattens the request, consults the decision cache, evaluates
//! policies in priority order, resolves precedence
//! (Deny > Challenge > Permit > default Deny), and emits one audit record
//! per evaluation. It never returns an error: internal failures collapse
//! into a safe-default Deny response so callers always receive a decision.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;

use crate::cache::{DEFAULT_TTL, DecisionCache, fingerprint};
use crate::evaluator::{evaluate_node, flatten_request};
use crate::model::{AbacRequest, AbacResponse, Decision, FlattenedContext, ValidationResult};
use crate::repository::{PolicyRepository, PolicySetMetadata};

// =============================================================================
// Auxiliary response types
// =============================================================================

/// Per-policy applicability row for the debug listing.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyApplicability {
    /// Rule identifier.
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    /// Policy effect.
    pub effect: Decision,
    /// Policy description.
    pub description: String,
    /// Evaluation priority.
    pub priority: i64,
    /// Whether the policy's conditions hold for the request.
    pub applicable: bool,
}

/// Applicability breakdown returned by [`AuthzService::get_applicable_policies`].
#[derive(Debug, Serialize)]
pub struct ApplicablePolicies {
    /// Total number of loaded policies.
    pub total_policies: usize,
    /// Policies whose conditions hold.
    pub applicable_policies: Vec<PolicyApplicability>,
    /// Policies whose conditions do not hold.
    pub non_applicable_policies: Vec<PolicyApplicability>,
    /// Flattened context the conditions were checked against.
    pub evaluation_context: FlattenedContext,
}

/// Result of a forced policy reload.
#[derive(Debug, Serialize)]
pub struct ReloadOutcome {
    /// Validation result of the reload attempt.
    pub reload_result: ValidationResult,
    /// Always `true`: the decision cache is flushed on every reload.
    pub cache_cleared: bool,
}

/// Service metrics for the `/authz/metrics` endpoint.
#[derive(Debug, Serialize)]
pub struct AuthzMetrics {
    /// Policy set figures.
    pub policies: PolicyMetrics,
    /// Decision cache figures.
    pub cache: CacheMetrics,
    /// Service status.
    pub service: ServiceStatus,
}

/// Policy set figures inside [`AuthzMetrics`].
#[derive(Debug, Serialize)]
pub struct PolicyMetrics {
    /// Number of loaded policies.
    pub total_count: usize,
    /// Count of policies per effect.
    pub effects_distribution: crate::model::EffectsDistribution,
    /// RFC 3339 mtime of the policy file, if known.
    pub last_modified: Option<String>,
}

/// Decision cache figures inside [`AuthzMetrics`].
#[derive(Debug, Serialize)]
pub struct CacheMetrics {
    /// Current number of cached decisions.
    pub entries_count: usize,
    /// Configured TTL in seconds.
    pub ttl_seconds: u64,
}

/// Service status inside [`AuthzMetrics`].
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    /// `"healthy"` while the service can reach its policy set.
    pub status: String,
}

// =============================================================================
// Authorization Service
// =============================================================================

/// ABAC authorization service.
///
/// One live instance per process, constructor-injected wherever decisions
/// are needed.
pub struct AuthzService {
    repository: Arc<PolicyRepository>,
    cache: DecisionCache,
    cache_generation: AtomicU64,
}

impl AuthzService {
    /// Creates a service with the default cache TTL.
    #[must_use]
    pub fn new(repository: Arc<PolicyRepository>) -> Self {
        Self::with_cache_ttl(repository, DEFAULT_TTL)
    }

    /// Creates a service with an explicit cache TTL.
    #[must_use]
    pub fn with_cache_ttl(repository: Arc<PolicyRepository>, ttl: Duration) -> Self {
        let generation = repository.generation();
        Self {
            repository,
            cache: DecisionCache::new(ttl),
            cache_generation: AtomicU64::new(generation),
        }
    }

    /// The decision cache (exposed for metrics and tests).
    #[must_use]
    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Evaluates an authorization request.
    ///
    /// Always produces a well-formed response; an unrecoverable internal
    /// failure degrades to Deny with an `Evaluation error` reason rather
    /// than surfacing an error to the caller.
    pub async fn evaluate(&self, request: &AbacRequest, correlation_id: Option<&str>) -> AbacResponse {
        let started = Instant::now();
        let correlation_id = correlation_id
            .map(str::to_string)
            .unwrap_or_else(generate_correlation_id);

        tracing::info!(
            correlation_id = %correlation_id,
            subject_dept = ?request.subject.dept,
            resource_type = ?request.resource.resource_type,
            action = %request.action,
            "Authorization evaluation started"
        );

        let outcome = AssertUnwindSafe(self.evaluate_inner(request, &correlation_id, started))
            .catch_unwind()
            .await;

        match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(&panic);
                tracing::error!(
                    correlation_id = %correlation_id,
                    error = %message,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Authorization evaluation failed"
                );
                AbacResponse {
                    decision: Decision::Deny,
                    reasons: vec![format!("Evaluation error: {message}")],
                    advice: vec!["Contact system administrator".to_string()],
                    obligations: vec![
                        "Log authorization failure".to_string(),
                        "Alert security team".to_string(),
                    ],
                }
            }
        }
    }

    async fn evaluate_inner(
        &self,
        request: &AbacRequest,
        correlation_id: &str,
        started: Instant,
    ) -> AbacResponse {
        // Snapshot first: a hot reload may swap the set, and the cache must
        // be flushed after the swap so stale decisions never outlive it.
        let snapshot = self.repository.snapshot().await;
        self.sync_cache_with_repository();

        let ctx = flatten_request(request);
        let key = fingerprint(&ctx);

        if let Some(mut response) = self.cache.get(&key) {
            tracing::info!(
                correlation_id = %correlation_id,
                cache_key = %&key[..16],
                "Cache hit for authorization request"
            );
            tag_correlation(&mut response, correlation_id);
            self.log_decision(&response, correlation_id, started, true);
            return response;
        }

        let mut permit_reasons = Vec::new();
        let mut deny_reasons = Vec::new();
        let mut challenge_reasons = Vec::new();

        for policy in &snapshot.set.policies {
            let matched =
                std::panic::catch_unwind(AssertUnwindSafe(|| evaluate_node(&policy.conditions, &ctx)));
            match matched {
                Ok(true) => {
                    tracing::debug!(
                        rule_id = %policy.rule_id,
                        effect = %policy.effect,
                        "Policy matched"
                    );
                    let reference = format!("ruleId: {}", policy.rule_id);
                    match policy.effect {
                        Decision::Permit => permit_reasons.push(reference),
                        Decision::Deny => deny_reasons.push(reference),
                        Decision::Challenge => challenge_reasons.push(reference),
                    }
                }
                Ok(false) => {}
                Err(panic) => {
                    tracing::warn!(
                        rule_id = %policy.rule_id,
                        error = %panic_message(&panic),
                        "Error evaluating policy, skipping"
                    );
                }
            }
        }

        let response = resolve_decision(permit_reasons, deny_reasons, challenge_reasons);

        // The cache stores the untagged response; the correlation obligation
        // is appended per call so hits carry a fresh id.
        self.cache.insert(key, response.clone());

        let mut response = response;
        tag_correlation(&mut response, correlation_id);
        self.log_decision(&response, correlation_id, started, false);
        response
    }

    /// Returns which policies would apply to a request, without deciding.
    pub async fn get_applicable_policies(&self, request: &AbacRequest) -> ApplicablePolicies {
        let snapshot = self.repository.snapshot().await;
        let ctx = flatten_request(request);

        let mut applicable = Vec::new();
        let mut non_applicable = Vec::new();
        for policy in &snapshot.set.policies {
            let row = PolicyApplicability {
                rule_id: policy.rule_id.clone(),
                effect: policy.effect,
                description: policy.description.clone(),
                priority: policy.priority,
                applicable: evaluate_node(&policy.conditions, &ctx),
            };
            if row.applicable {
                applicable.push(row);
            } else {
                non_applicable.push(row);
            }
        }

        ApplicablePolicies {
            total_policies: snapshot.set.policies.len(),
            applicable_policies: applicable,
            non_applicable_policies: non_applicable,
            evaluation_context: ctx,
        }
    }

    /// Forces a reload of the policy file and flushes the decision cache.
    pub async fn reload_policies(&self) -> ReloadOutcome {
        let reload_result = self.repository.reload_policies().await;
        // Flush after the swap so readers never pair new policies with
        // stale cached decisions.
        self.cache.clear();
        self.cache_generation
            .store(self.repository.generation(), Ordering::Release);

        tracing::info!(
            valid = reload_result.valid,
            policies_count = reload_result.policies_count,
            "Policies reloaded"
        );

        ReloadOutcome {
            reload_result,
            cache_cleared: true,
        }
    }

    /// Re-validates the currently loaded policy document.
    #[must_use]
    pub fn validate_current_policies(&self) -> ValidationResult {
        self.repository.validate_current_policies()
    }

    /// Metadata of the current policy set.
    pub async fn policy_metadata(&self) -> PolicySetMetadata {
        self.repository.metadata().await
    }

    /// Service metrics.
    pub async fn metrics(&self) -> AuthzMetrics {
        let metadata = self.repository.metadata().await;
        AuthzMetrics {
            policies: PolicyMetrics {
                total_count: metadata.policies_count,
                effects_distribution: metadata.effects_distribution,
                last_modified: metadata.last_modified,
            },
            cache: CacheMetrics {
                entries_count: self.cache.len(),
                ttl_seconds: self.cache.ttl().as_secs(),
            },
            service: ServiceStatus {
                status: "healthy".to_string(),
            },
        }
    }

    /// Flushes the cache when the repository swapped a new set in
    /// (hot reload path; manual reloads flush explicitly).
    fn sync_cache_with_repository(&self) {
        let generation = self.repository.generation();
        let seen = self.cache_generation.swap(generation, Ordering::AcqRel);
        if seen != generation {
            self.cache.clear();
        }
    }

    fn log_decision(
        &self,
        response: &AbacResponse,
        correlation_id: &str,
        started: Instant,
        from_cache: bool,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            audit = true,
            correlation_id = %correlation_id,
            decision = %response.decision,
            reasons_count = response.reasons.len(),
            advice_count = response.advice.len(),
            obligations_count = response.obligations.len(),
            elapsed_ms,
            from_cache,
            "Authorization decision"
        );

        if matches!(response.decision, Decision::Deny | Decision::Challenge) {
            tracing::warn!(
                audit = true,
                correlation_id = %correlation_id,
                decision = %response.decision,
                reasons = ?response.reasons,
                advice = ?response.advice,
                obligations = ?response.obligations,
                "Critical authorization decision"
            );
        }
    }
}

/// Precedence resolution: Deny > Challenge > Permit > default Deny.
fn resolve_decision(
    permit_reasons: Vec<String>,
    deny_reasons: Vec<String>,
    challenge_reasons: Vec<String>,
) -> AbacResponse {
    if !deny_reasons.is_empty() {
        return AbacResponse {
            decision: Decision::Deny,
            reasons: deny_reasons,
            advice: vec!["Access explicitly denied by policy".to_string()],
            obligations: vec!["Log denied access attempt".to_string()],
        };
    }

    if !challenge_reasons.is_empty() {
        return AbacResponse {
            decision: Decision::Challenge,
            reasons: challenge_reasons,
            advice: vec![
                "Additional authentication required".to_string(),
                "Contact administrator if needed".to_string(),
            ],
            obligations: vec![
                "Log challenge requirement".to_string(),
                "Initiate step-up authentication".to_string(),
            ],
        };
    }

    if !permit_reasons.is_empty() {
        return AbacResponse {
            decision: Decision::Permit,
            reasons: permit_reasons,
            advice: Vec::new(),
            obligations: vec!["Log successful access".to_string()],
        };
    }

    AbacResponse {
        decision: Decision::Deny,
        reasons: vec!["No applicable policies found".to_string()],
        advice: vec![
            "Contact administrator for access".to_string(),
            "Review policy configuration".to_string(),
        ],
        obligations: vec![
            "Log policy gap".to_string(),
            "Alert security team".to_string(),
        ],
    }
}

fn tag_correlation(response: &mut AbacResponse, correlation_id: &str) {
    if matches!(response.decision, Decision::Deny | Decision::Challenge) {
        response
            .obligations
            .push(format!("correlation_id: {correlation_id}"));
    }
}

fn generate_correlation_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("authz-{}", &id[..8])
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}
