//! Authentication service: grant flows and claims assembly.

use std::sync::Arc;
use std::time::Duration;

use aegis_core::DirectoryLookup;
use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::credentials::{CredentialsTable, SubjectProfile};
use crate::error::AuthError;
use crate::jwt::TokenManager;

/// Bound on the non-fatal directory consultation during the password grant.
const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(2);

fn default_grant_type() -> String {
    "client_credentials".to_string()
}

fn default_scope() -> String {
    "read".to_string()
}

/// Token endpoint request body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    /// OAuth2 grant type: `client_credentials` or `password`.
    #[serde(default = "default_grant_type")]
    pub grant_type: String,

    /// Client id (client_credentials grant).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_credentials grant).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Username (password grant).
    #[serde(default)]
    pub username: Option<String>,

    /// Password (password grant).
    #[serde(default)]
    pub password: Option<String>,

    /// Requested scopes, space-separated.
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Token endpoint response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed bearer token.
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Seconds until expiration.
    pub expires_in: i64,
    /// Granted scopes, space-joined.
    pub scope: String,
}

/// Authentication service.
///
/// Validates credentials, assembles claims, and delegates signing to the
/// token manager. The SCIM directory is consulted during the password
/// grant only for the active-status check, under a bounded timeout;
/// a failed or timed-out lookup means "status unknown" and the grant
/// proceeds.
pub struct AuthService {
    token_manager: Arc<TokenManager>,
    credentials: CredentialsTable,
    directory: Option<Arc<dyn DirectoryLookup>>,
    directory_timeout: Duration,
}

impl AuthService {
    /// Creates a service over the given token manager and credential table.
    #[must_use]
    pub fn new(token_manager: Arc<TokenManager>, credentials: CredentialsTable) -> Self {
        Self {
            token_manager,
            credentials,
            directory: None,
            directory_timeout: DEFAULT_DIRECTORY_TIMEOUT,
        }
    }

    /// Attaches the SCIM directory for the password-grant active check.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Overrides the directory lookup timeout.
    #[must_use]
    pub fn with_directory_timeout(mut self, timeout: Duration) -> Self {
        self.directory_timeout = timeout;
        self
    }

    /// The token manager backing this service.
    #[must_use]
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// Authenticates the request credentials and issues a token.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` when required credentials for the grant are missing
    /// - `InvalidCredentials` when they do not match
    /// - `UserInactive` when the directory marks the user inactive
    /// - `UnsupportedGrantType` for any other grant
    pub async fn authenticate_and_issue(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        tracing::info!(grant_type = %request.grant_type, "Starting authentication");

        let (profile, allowed_scopes) = match request.grant_type.as_str() {
            "client_credentials" => {
                let (Some(client_id), Some(client_secret)) =
                    (&request.client_id, &request.client_secret)
                else {
                    return Err(AuthError::invalid_request(
                        "client_id and client_secret are required for client_credentials",
                    ));
                };
                self.credentials
                    .validate_client(client_id, client_secret)
                    .ok_or(AuthError::InvalidCredentials)?
            }
            "password" => {
                let (Some(username), Some(password)) = (&request.username, &request.password)
                else {
                    return Err(AuthError::invalid_request(
                        "username and password are required for the password grant",
                    ));
                };
                let matched = self
                    .credentials
                    .validate_user(username, password)
                    .ok_or(AuthError::InvalidCredentials)?;

                self.check_user_active(username).await?;
                matched
            }
            other => return Err(AuthError::unsupported_grant_type(other)),
        };

        let claims = assemble_claims(profile, &request.scope, allowed_scopes);
        let token = self.token_manager.issue(&claims.to_payload(), None)?;
        let expires_in = self.token_manager.default_ttl_minutes() * 60;

        tracing::info!(
            subject = %claims.sub,
            grant_type = %request.grant_type,
            scope = %claims.scope,
            "Authentication successful"
        );

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: claims.scope,
        })
    }

    /// Verifies a token and returns its typed claims.
    ///
    /// # Errors
    ///
    /// `TokenExpired` or `TokenInvalid` per the verification outcome.
    pub fn validate_token_and_get_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let map = self.token_manager.verify(token)?;
        let claims = Claims::from_map(map)?;
        tracing::debug!(subject = %claims.sub, "Token validation successful");
        Ok(claims)
    }

    /// Consults the directory for the user's active flag.
    ///
    /// Only a definitive "known and inactive" fails the grant; lookup
    /// errors and timeouts leave the status unknown and the grant proceeds.
    async fn check_user_active(&self, username: &str) -> Result<(), AuthError> {
        let Some(ref directory) = self.directory else {
            return Ok(());
        };

        match tokio::time::timeout(self.directory_timeout, directory.lookup_user_by_name(username))
            .await
        {
            Ok(Ok(Some(user))) if !user.active => {
                tracing::warn!(username = %username, "User is inactive");
                Err(AuthError::user_inactive(username))
            }
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => {
                tracing::warn!(
                    username = %username,
                    error = %err,
                    "Could not check user status in directory"
                );
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    username = %username,
                    "Directory lookup timed out, user status unknown"
                );
                Ok(())
            }
        }
    }
}

/// Builds claims for a matched credential: granted scope is the
/// intersection of requested and allowed, defaulting to `read`.
fn assemble_claims(profile: &SubjectProfile, requested_scope: &str, allowed: &[String]) -> Claims {
    let mut granted: Vec<&str> = requested_scope
        .split_whitespace()
        .filter(|scope| allowed.iter().any(|a| a == scope))
        .collect();
    if granted.is_empty() {
        granted.push("read");
    }

    Claims {
        sub: profile.sub.clone(),
        scope: granted.join(" "),
        groups: profile.groups.clone(),
        dept: profile.dept.clone(),
        risk_score: profile.risk_score,
        iss: None,
        aud: None,
        exp: None,
        iat: None,
    }
}
