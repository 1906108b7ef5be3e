//! Directory lookup trait.
//!
//! The auth core reads the SCIM directory through exactly two operations:
//! user lookup by name and group existence checks. Store implementations
//! (in-memory, database-backed) live elsewhere and implement this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// Attributes of a directory user as seen by the auth core.
///
/// This is the read-side projection used for claims binding and the
/// active-status check during the password grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAttributes {
    /// Unique username (SCIM `userName`).
    pub username: String,

    /// Whether the account is active. Inactive users cannot authenticate.
    pub active: bool,

    /// Department attribute, if assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,

    /// Display names of the groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Risk score in `[0, 100]`, if assigned.
    #[serde(rename = "riskScore", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i64>,
}

/// Read-side directory operations consumed by the auth core.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Looks up a user by `userName`. Returns `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    async fn lookup_user_by_name(&self, name: &str) -> CoreResult<Option<UserAttributes>>;

    /// Returns `true` if a group with the given display name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    async fn validate_group_exists(&self, name: &str) -> CoreResult<bool>;
}
