//! Environment-driven application configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use aegis_auth::{Environment, TokenAlgorithm, TokenConfig};
use aegis_core::CoreError;
use rand::Rng;
use rand::distributions::Alphanumeric;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Application configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name for banners and logs (`APP_NAME`).
    pub app_name: String,
    /// Bind host (`HOST`).
    pub host: String,
    /// Bind port (`PORT`).
    pub port: u16,
    /// Deployment environment (`ENVIRONMENT`).
    pub environment: Environment,
    /// SQLite path of the directory store collaborator (`DB_PATH`).
    pub db_path: PathBuf,
    /// Path of the ABAC policy file (`POLICIES_PATH`).
    pub policies_path: PathBuf,
    /// Log level (`LOG_LEVEL`).
    pub log_level: String,
    /// Allowed CORS origins (`CORS_ORIGINS`, JSON array or comma-separated).
    pub cors_origins: Vec<String>,
    /// Token manager configuration (`JWT_*`).
    pub token: TokenConfig,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is honoured when present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparseable values.
    pub fn from_env() -> Result<Self, CoreError> {
        let _ = dotenvy::dotenv();

        let environment = match env_var("ENVIRONMENT") {
            Some(value) => Environment::parse(&value).ok_or_else(|| {
                CoreError::configuration(format!(
                    "ENVIRONMENT must be one of development, testing, production (got '{value}')"
                ))
            })?,
            None => Environment::Development,
        };

        let algorithm = match env_var("JWT_ALGORITHM") {
            Some(value) => TokenAlgorithm::parse(&value).ok_or_else(|| {
                CoreError::configuration(format!(
                    "JWT_ALGORITHM must be HS256 or RS256 (got '{value}')"
                ))
            })?,
            None => TokenAlgorithm::Hs256,
        };

        let secret = match env_var("JWT_SECRET") {
            Some(secret) => Some(secret),
            // Development convenience only: production validation requires a
            // configured secret of proper length.
            None if algorithm == TokenAlgorithm::Hs256 && environment.is_development() => {
                tracing::warn!("JWT_SECRET not set, generated an ephemeral development secret");
                Some(generate_secret())
            }
            None => None,
        };

        let expiration_minutes = match env_var("JWT_EXPIRATION_MINUTES") {
            Some(value) => value.parse::<i64>().map_err(|_| {
                CoreError::configuration(format!(
                    "JWT_EXPIRATION_MINUTES must be an integer (got '{value}')"
                ))
            })?,
            None => 30,
        };

        let port = match env_var("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| {
                CoreError::configuration(format!("PORT must be a port number (got '{value}')"))
            })?,
            None => 8000,
        };

        Ok(Self {
            app_name: env_var("APP_NAME").unwrap_or_else(|| "Aegis Identity Microservice".to_string()),
            host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            environment,
            db_path: env_var("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/identity.db")),
            policies_path: env_var("POLICIES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./policies/policies.json")),
            log_level: env_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            cors_origins: parse_cors_origins(env_var("CORS_ORIGINS").as_deref()),
            token: TokenConfig {
                algorithm,
                secret,
                private_key_pem: env_var("JWT_PRIVATE_KEY"),
                public_key_pem: env_var("JWT_PUBLIC_KEY"),
                issuer: env_var("JWT_ISSUER").unwrap_or_else(|| "aegis-identity".to_string()),
                audience: env_var("JWT_AUDIENCE").unwrap_or_else(|| "aegis-api".to_string()),
                expiration_minutes,
                environment,
            },
        })
    }

    /// Validates the configuration and prepares required directories.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings or unwritable
    /// paths.
    pub fn validate(&self) -> Result<(), CoreError> {
        let level = self.log_level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(CoreError::configuration(format!(
                "LOG_LEVEL must be one of {VALID_LOG_LEVELS:?} (got '{}')",
                self.log_level
            )));
        }

        self.token
            .validate()
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        for path in [&self.db_path, &self.policies_path] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CoreError::configuration(format!(
                        "Cannot create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Socket address to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        let host: IpAddr = self
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::from((host, self.port))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect()
}

fn parse_cors_origins(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return vec![
            "http://localhost:3000".to_string(),
            "http://localhost:8080".to_string(),
        ];
    };

    if let Ok(origins) = serde_json::from_str::<Vec<String>>(value) {
        return origins;
    }
    value
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
