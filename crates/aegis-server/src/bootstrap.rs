//! Startup assembly: default policy file, seed data, service construction.

use std::path::Path;
use std::sync::Arc;

use aegis_abac::{AuthzService, PolicyRepository};
use aegis_auth::{AuthService, CredentialsTable, TokenManager};
use aegis_core::CoreError;
use aegis_scim::{InMemoryDirectory, seed_initial_data};
use serde_json::json;

use crate::config::AppConfig;
use crate::state::AppState;

/// Writes the initial policy file when none exists yet.
///
/// # Errors
///
/// Returns a configuration error when the file cannot be written.
pub fn ensure_policies_file(path: &Path) -> Result<(), CoreError> {
    if path.exists() {
        return Ok(());
    }

    let initial = json!({
        "version": "1.0",
        "description": "Initial access policies",
        "policies": [
            {
                "ruleId": "HR-Payroll-01",
                "effect": "Permit",
                "description": "HR department can access payroll on trusted devices",
                "conditions": {
                    "subject.dept": {"eq": "HR"},
                    "resource.type": {"eq": "payroll"},
                    "context.deviceTrusted": {"eq": true}
                }
            },
            {
                "ruleId": "Risk-StepUp-01",
                "effect": "Challenge",
                "description": "High risk users or non-approved geo require step-up",
                "conditions": {
                    "OR": [
                        {"subject.riskScore": {"gte": 70}},
                        {"context.geo": {"not_in": ["CL", "CO"]}}
                    ]
                }
            },
            {
                "ruleId": "Admins-NonProd-01",
                "effect": "Permit",
                "description": "Admins can access non-prod, challenge for prod",
                "conditions": {
                    "subject.groups": {"contains": "ADMINS"},
                    "resource.env": {"ne": "prod"}
                }
            }
        ]
    });

    let body = serde_json::to_string_pretty(&initial)
        .map_err(|e| CoreError::configuration(format!("Cannot render initial policies: {e}")))?;
    std::fs::write(path, body).map_err(|e| {
        CoreError::configuration(format!(
            "Cannot write initial policies file {}: {e}",
            path.display()
        ))
    })?;

    tracing::info!(path = %path.display(), "Initial policies file created");
    Ok(())
}

/// Validates configuration and assembles the application state.
///
/// # Errors
///
/// Returns a configuration error for invalid settings, unloadable key
/// material, or an unwritable policies path.
pub async fn build_state(config: AppConfig) -> Result<AppState, CoreError> {
    config.validate()?;
    ensure_policies_file(&config.policies_path)?;

    let repository = Arc::new(PolicyRepository::open(&config.policies_path).await);
    let authz_service = Arc::new(AuthzService::new(repository));

    let token_manager = Arc::new(
        TokenManager::new(&config.token).map_err(|e| CoreError::configuration(e.to_string()))?,
    );

    let directory = InMemoryDirectory::shared();
    seed_initial_data(&directory).await?;

    let auth_service = Arc::new(
        AuthService::new(token_manager, CredentialsTable::with_defaults())
            .with_directory(directory.clone()),
    );

    tracing::info!(
        environment = %config.environment,
        policies_path = %config.policies_path.display(),
        "Application state assembled"
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_service,
        authz_service,
        directory,
    })
}
