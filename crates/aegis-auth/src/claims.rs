//! Typed claims carried inside bearer tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;
use crate::jwt::ClaimsMap;

/// Claims carried inside an access token.
///
/// Subject attributes here (`dept`, `groups`, `riskScore`) are the primary
/// source of the authorization Subject bag when the caller does not
/// override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    pub sub: String,

    /// Granted scopes, space-joined.
    pub scope: String,

    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Department.
    pub dept: String,

    /// Risk score in `[0, 100]`.
    #[serde(rename = "riskScore")]
    pub risk_score: i64,

    /// Issuer, present on verified tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience, present on verified tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Expiration, Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at, Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Builds typed claims from a verified claim map.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` when a required claim is missing or has the
    /// wrong type.
    pub fn from_map(map: ClaimsMap) -> Result<Self, AuthError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| AuthError::token_invalid(format!("Malformed claims: {e}")))
    }

    /// Serializes the domain claims into a signing payload.
    ///
    /// Standard time claims are left out; the token manager stamps them.
    #[must_use]
    pub fn to_payload(&self) -> ClaimsMap {
        let mut map = ClaimsMap::new();
        map.insert("sub".to_string(), Value::from(self.sub.clone()));
        map.insert("scope".to_string(), Value::from(self.scope.clone()));
        map.insert("groups".to_string(), Value::from(self.groups.clone()));
        map.insert("dept".to_string(), Value::from(self.dept.clone()));
        map.insert("riskScore".to_string(), Value::from(self.risk_score));
        map
    }

    /// Returns `true` when the subject belongs to the given group.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Returns `true` when the granted scopes include `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}
