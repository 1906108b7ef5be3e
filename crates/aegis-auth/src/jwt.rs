//! Token manager: signing, verification, refresh, and inspection.
//!
//! Times on the wire are integer seconds since the Unix epoch, UTC.
//! Verification is strict: signature, `exp` (zero leeway), `iss`, and
//! `aud` must all check out.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::{TokenAlgorithm, TokenConfig};
use crate::error::AuthError;
use crate::keys::SigningKeys;

/// JSON object used as the claim container on the wire.
pub type ClaimsMap = serde_json::Map<String, Value>;

/// Claim names owned by the manager; stripped before a refresh re-signs.
const RESERVED_CLAIMS: [&str; 4] = ["iat", "exp", "iss", "aud"];

/// Signs and verifies bearer tokens.
///
/// One live instance per process; keys are loaded once at construction.
pub struct TokenManager {
    algorithm: TokenAlgorithm,
    keys: SigningKeys,
    issuer: String,
    audience: String,
    default_ttl_minutes: i64,
}

impl TokenManager {
    /// Builds a manager from configuration, loading key material.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when key material is missing, weak
    /// (production HS256), or malformed.
    pub fn new(config: &TokenConfig) -> Result<Self, AuthError> {
        let keys = SigningKeys::load(config)?;
        tracing::info!(algorithm = %config.algorithm, "Token manager initialized");
        Ok(Self {
            algorithm: config.algorithm,
            keys,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            default_ttl_minutes: config.expiration_minutes,
        })
    }

    /// The configured signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> TokenAlgorithm {
        self.algorithm
    }

    /// The configured default token lifetime in minutes.
    #[must_use]
    pub fn default_ttl_minutes(&self) -> i64 {
        self.default_ttl_minutes
    }

    /// The verification key in PEM form, for RS256 only.
    #[must_use]
    pub fn public_key_pem(&self) -> Option<&str> {
        self.keys.public_key_pem()
    }

    /// Signs a token carrying `payload` plus the standard claims.
    ///
    /// `iat` is now, `exp` is now plus the given (or default) lifetime,
    /// `iss`/`aud` come from configuration. Payload entries override the
    /// standard claims on collision.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn issue(&self, payload: &ClaimsMap, ttl_minutes: Option<i64>) -> Result<String, AuthError> {
        let ttl_minutes = ttl_minutes.unwrap_or(self.default_ttl_minutes);
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let mut claims = ClaimsMap::new();
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + ttl_minutes * 60));
        claims.insert("iss".to_string(), Value::from(self.issuer.clone()));
        claims.insert("aud".to_string(), Value::from(self.audience.clone()));
        for (key, value) in payload {
            claims.insert(key.clone(), value.clone());
        }

        let header = Header::new(self.jwt_algorithm());
        let token = encode(&header, &claims, self.encoding_key())
            .map_err(|e| AuthError::internal(format!("Failed to sign token: {e}")))?;

        tracing::info!(
            subject = claims.get("sub").and_then(serde_json::Value::as_str).unwrap_or(""),
            algorithm = %self.algorithm,
            expires_in_minutes = ttl_minutes,
            "Token issued"
        );

        Ok(token)
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// `TokenExpired` when `exp` is in the past; `TokenInvalid` for every
    /// other failure (signature, issuer, audience, structure).
    pub fn verify(&self, token: &str) -> Result<ClaimsMap, AuthError> {
        let mut validation = Validation::new(self.jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;

        let data = decode::<ClaimsMap>(token, self.decoding_key(), &validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    tracing::warn!(algorithm = %self.algorithm, "Token expired");
                    AuthError::TokenExpired
                }
                _ => {
                    tracing::warn!(algorithm = %self.algorithm, error = %err, "Invalid token");
                    AuthError::token_invalid(err.to_string())
                }
            }
        })?;

        Ok(data.claims)
    }

    /// Re-signs a still-valid token with a fresh lifetime.
    ///
    /// The standard claims are stripped and re-stamped; everything else is
    /// carried over unchanged.
    ///
    /// # Errors
    ///
    /// Propagates verification failures; an expired token cannot be
    /// refreshed.
    pub fn refresh(&self, token: &str, ttl_minutes: Option<i64>) -> Result<String, AuthError> {
        let mut claims = self.verify(token)?;
        for reserved in RESERVED_CLAIMS {
            claims.remove(reserved);
        }
        self.issue(&claims, ttl_minutes)
    }

    /// Decodes a token's claims without verifying anything.
    ///
    /// Inspection only. Never used on any authorization path.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` when the token is not structurally a JWT.
    pub fn decode_unverified(token: &str) -> Result<ClaimsMap, AuthError> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::token_invalid("Malformed token structure"));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::token_invalid(format!("Cannot decode token: {e}")))?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::token_invalid(format!("Cannot decode token: {e}")))?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(AuthError::token_invalid("Token payload is not an object")),
        }
    }

    fn jwt_algorithm(&self) -> Algorithm {
        match self.algorithm {
            TokenAlgorithm::Hs256 => Algorithm::HS256,
            TokenAlgorithm::Rs256 => Algorithm::RS256,
        }
    }

    fn encoding_key(&self) -> &EncodingKey {
        self.keys.encoding_key()
    }

    fn decoding_key(&self) -> &DecodingKey {
        self.keys.decoding_key()
    }
}
