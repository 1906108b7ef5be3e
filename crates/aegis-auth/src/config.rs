//! Token configuration.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Minimum HS256 secret length (bytes) enforced in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Signing algorithms supported by the token manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    /// HMAC with SHA-256 (shared secret).
    #[serde(rename = "HS256")]
    Hs256,
    /// RSA with SHA-256 (2048-bit keypair).
    #[serde(rename = "RS256")]
    Rs256,
}

impl TokenAlgorithm {
    /// Returns the algorithm name as used in configuration and JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Rs256 => "RS256",
        }
    }

    /// Parses an algorithm from its configuration name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HS256" => Some(Self::Hs256),
            "RS256" => Some(Self::Rs256),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; missing RSA keys are generated in-process.
    Development,
    /// CI / test runs.
    Testing,
    /// Production; weak or missing key material fails startup.
    Production,
}

impl Environment {
    /// Parses an environment from its lowercase name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" => Some(Self::Development),
            "testing" => Some(Self::Testing),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    /// Returns `true` in development.
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns `true` in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the token manager.
///
/// Key material is loaded once per process at startup.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Signing algorithm.
    pub algorithm: TokenAlgorithm,

    /// Shared secret for HS256.
    pub secret: Option<String>,

    /// PEM-encoded RSA private key for RS256 (may be base64-wrapped).
    pub private_key_pem: Option<String>,

    /// PEM-encoded RSA public key for RS256 (may be base64-wrapped).
    pub public_key_pem: Option<String>,

    /// `iss` claim stamped into every token and required on verification.
    pub issuer: String,

    /// `aud` claim stamped into every token and required on verification.
    pub audience: String,

    /// Default token lifetime in minutes.
    pub expiration_minutes: i64,

    /// Deployment environment; governs key-material strictness.
    pub environment: Environment,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::Hs256,
            secret: None,
            private_key_pem: None,
            public_key_pem: None,
            issuer: "aegis-identity".to_string(),
            audience: "aegis-api".to_string(),
            expiration_minutes: 30,
            environment: Environment::Development,
        }
    }
}

impl TokenConfig {
    /// Validates the configuration for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when production requirements are not
    /// met: a short/missing HS256 secret, or missing RS256 key material.
    pub fn validate(&self) -> Result<(), AuthError> {
        match self.algorithm {
            TokenAlgorithm::Hs256 => {
                let Some(ref secret) = self.secret else {
                    return Err(AuthError::configuration(
                        "JWT_SECRET is required for HS256",
                    ));
                };
                if self.environment.is_production() && secret.len() < MIN_PRODUCTION_SECRET_LEN {
                    return Err(AuthError::configuration(format!(
                        "JWT_SECRET must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production"
                    )));
                }
            }
            TokenAlgorithm::Rs256 => {
                let has_keys = self.private_key_pem.is_some() && self.public_key_pem.is_some();
                if !has_keys && !self.environment.is_development() {
                    return Err(AuthError::configuration(
                        "JWT_PRIVATE_KEY and JWT_PUBLIC_KEY are required for RS256 outside development",
                    ));
                }
            }
        }

        if self.expiration_minutes <= 0 {
            return Err(AuthError::configuration(
                "JWT_EXPIRATION_MINUTES must be positive",
            ));
        }

        Ok(())
    }
}
