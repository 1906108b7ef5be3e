//! Signing key material: loading, base64 unwrapping, and development
//! keypair generation.
//!
//! `jsonwebtoken` does not generate keys, so RS256 development keypairs are
//! produced with the `rsa` crate and exported as PKCS#8 / SPKI PEM.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::config::{MIN_PRODUCTION_SECRET_LEN, TokenAlgorithm, TokenConfig};
use crate::error::AuthError;

/// Loaded key material for one signing algorithm.
pub enum SigningKeys {
    /// Shared-secret HMAC keys.
    Hmac {
        /// Signing key.
        encoding: EncodingKey,
        /// Verification key.
        decoding: DecodingKey,
    },
    /// RSA keypair.
    Rsa {
        /// Signing key (private).
        encoding: EncodingKey,
        /// Verification key (public).
        decoding: DecodingKey,
        /// SPKI PEM export of the public key for out-of-band sharing.
        public_pem: String,
    },
}

impl SigningKeys {
    /// Loads key material per the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when required material is missing or
    /// malformed, or when production requirements are not met.
    pub fn load(config: &TokenConfig) -> Result<Self, AuthError> {
        match config.algorithm {
            TokenAlgorithm::Hs256 => Self::load_hmac(config),
            TokenAlgorithm::Rs256 => Self::load_rsa(config),
        }
    }

    /// Public verification key PEM, for RS256 only.
    #[must_use]
    pub fn public_key_pem(&self) -> Option<&str> {
        match self {
            Self::Hmac { .. } => None,
            Self::Rsa { public_pem, .. } => Some(public_pem),
        }
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        match self {
            Self::Hmac { encoding, .. } | Self::Rsa { encoding, .. } => encoding,
        }
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        match self {
            Self::Hmac { decoding, .. } | Self::Rsa { decoding, .. } => decoding,
        }
    }

    fn load_hmac(config: &TokenConfig) -> Result<Self, AuthError> {
        let Some(ref secret) = config.secret else {
            return Err(AuthError::configuration(
                "JWT_SECRET is required for HS256",
            ));
        };
        if config.environment.is_production() && secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "JWT_SECRET must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production"
            )));
        }

        tracing::info!("HS256 secret key loaded");
        Ok(Self::Hmac {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    fn load_rsa(config: &TokenConfig) -> Result<Self, AuthError> {
        match (&config.private_key_pem, &config.public_key_pem) {
            (Some(private_pem), Some(public_pem)) => {
                let private_pem = unwrap_base64_pem(private_pem)?;
                let public_pem = unwrap_base64_pem(public_pem)?;

                let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
                    .map_err(|e| AuthError::configuration(format!("Invalid JWT_PRIVATE_KEY: {e}")))?;
                let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
                    .map_err(|e| AuthError::configuration(format!("Invalid JWT_PUBLIC_KEY: {e}")))?;

                tracing::info!("RS256 keys loaded from configuration");
                Ok(Self::Rsa {
                    encoding,
                    decoding,
                    public_pem,
                })
            }
            _ if config.environment.is_development() => {
                tracing::warn!(
                    "Generating RSA keys for development. Configure JWT_PRIVATE_KEY and JWT_PUBLIC_KEY in production."
                );
                Self::generate_rsa()
            }
            _ => Err(AuthError::configuration(
                "JWT_PRIVATE_KEY and JWT_PUBLIC_KEY are required for RS256 outside development",
            )),
        }
    }

    /// Generates an in-process RSA-2048 keypair.
    ///
    /// The resulting public key only lives for this process; external
    /// verifiers must not trust it across restarts.
    fn generate_rsa() -> Result<Self, AuthError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| AuthError::configuration(format!("RSA key generation failed: {e}")))?;
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::configuration(format!("RSA key export failed: {e}")))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::configuration(format!("RSA key export failed: {e}")))?;

        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::configuration(format!("Generated key rejected: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| AuthError::configuration(format!("Generated key rejected: {e}")))?;

        Ok(Self::Rsa {
            encoding,
            decoding,
            public_pem,
        })
    }
}

/// Unwraps a base64-wrapped PEM value.
///
/// `LS0t` is base64 for `---`, so a value with that prefix is an encoded
/// PEM document rather than a literal one.
fn unwrap_base64_pem(value: &str) -> Result<String, AuthError> {
    if !value.starts_with("LS0t") {
        return Ok(value.to_string());
    }
    let decoded = BASE64_STANDARD
        .decode(value.trim())
        .map_err(|e| AuthError::configuration(format!("Invalid base64-wrapped PEM: {e}")))?;
    String::from_utf8(decoded)
        .map_err(|e| AuthError::configuration(format!("Invalid base64-wrapped PEM: {e}")))
}
