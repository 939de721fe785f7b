//! Configuration management for Lambda functions.

use std::env;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::{Error, Result};

/// Environment variables the service cannot run without in production.
pub const REQUIRED_ENV_VARS: [&str; 6] = [
    "AMADEUS_API_KEY",
    "AMADEUS_API_SECRET",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_HOST",
];

/// Locations searched for a `.env` file, relative to the working directory.
const DOTENV_CANDIDATES: [&str; 3] = [".env", "../../.env", "../../../.env"];

/// Amadeus API settings.
#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// `production`, `test` or an explicit base URL
    pub hostname: String,
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: u16,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment (`NODE_ENV`)
    pub node_env: String,
    /// Local server port
    pub port: u16,
    pub amadeus: AmadeusConfig,
    pub db: DbConfig,
    /// Prefix for API routes
    pub api_prefix: String,
    /// Value for `Access-Control-Allow-Origin`
    pub cors_origin: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            node_env: var("NODE_ENV").unwrap_or_else(|| "development".to_string()),
            port: parse_or("PORT", var("PORT"), 3000),
            amadeus: AmadeusConfig {
                api_key: var("AMADEUS_API_KEY"),
                api_secret: var("AMADEUS_API_SECRET"),
                hostname: var("AMADEUS_HOSTNAME").unwrap_or_else(|| "production".to_string()),
            },
            db: DbConfig {
                user: var("DB_USER"),
                password: var("DB_PASSWORD"),
                name: var("DB_NAME"),
                host: var("DB_HOST"),
                port: parse_or("DB_PORT", var("DB_PORT"), 5432),
            },
            api_prefix: var("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            cors_origin: var("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
        }
    }

    /// Load `.env`, read the environment and check required variables.
    ///
    /// Missing variables are fatal in production and a warning otherwise.
    pub fn load() -> Result<Self> {
        load_dotenv();
        Self::load_from(env_lookup)
    }

    /// Build from `lookup` and check required variables.
    pub fn load_from<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = missing_required(&lookup);
        let config = Self::from_lookup(lookup);

        if !missing.is_empty() {
            error!(
                missing = %missing.join(", "),
                "Missing required environment variables"
            );
            if config.is_production() {
                return Err(Error::Config(format!(
                    "Missing required environment variables: {}",
                    missing.join(", ")
                )));
            }
            warn!("Running in development mode with missing environment variables");
        }

        info!(
            node_env = %config.node_env,
            amadeus_hostname = %config.amadeus.hostname,
            db_host = config.db.host.as_deref().unwrap_or("not set"),
            "configuration loaded"
        );

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.node_env == "production"
    }

    pub fn is_development(&self) -> bool {
        !self.is_production()
    }
}

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    name: &str,
    value: Option<String>,
    default: T,
) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "invalid number, using default");
            default
        }),
        None => default,
    }
}

/// Names from [`REQUIRED_ENV_VARS`] that are unset or empty.
pub fn missing_required<F>(lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_ENV_VARS
        .into_iter()
        .filter(|name| lookup(*name).map_or(true, |v| v.is_empty()))
        .collect()
}

/// Populate the process environment from the first `.env` file found.
///
/// Returns the path that was loaded, if any. Never fails.
pub fn load_dotenv() -> Option<PathBuf> {
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            warn!(error = %e, "Cannot determine working directory, using process environment only");
            return None;
        }
    };

    for candidate in DOTENV_CANDIDATES {
        let path = cwd.join(candidate);
        match dotenv::from_path(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Loaded .env file");
                return Some(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load .env file");
            }
        }
    }

    warn!("No .env file found, using process environment only");
    None
}

/// Amadeus API credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub hostname: String,
}

/// A place credentials can come from.
pub trait CredentialSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Complete credentials, or `None` if this source cannot supply them.
    fn credentials(&self) -> Option<Credentials>;
}

/// Reads credentials straight from the process environment at call time.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn credentials(&self) -> Option<Credentials> {
        let var = |name: &str| env_lookup(name).filter(|v| !v.is_empty());

        Some(Credentials {
            api_key: var("AMADEUS_API_KEY")?,
            api_secret: var("AMADEUS_API_SECRET")?,
            hostname: var("AMADEUS_HOSTNAME").unwrap_or_else(|| "production".to_string()),
        })
    }
}

impl CredentialSource for Config {
    fn name(&self) -> &'static str {
        "config"
    }

    fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            api_key: self.amadeus.api_key.clone()?,
            api_secret: self.amadeus.api_secret.clone()?,
            hostname: self.amadeus.hostname.clone(),
        })
    }
}

/// Query each source in order; the first complete set of credentials wins.
pub fn resolve_credentials(sources: &[&dyn CredentialSource]) -> Result<Credentials> {
    for source in sources {
        if let Some(credentials) = source.credentials() {
            info!(source = source.name(), "Using Amadeus credentials");
            return Ok(credentials);
        }
    }

    Err(Error::Config(
        "Failed to load configuration: Amadeus API key and secret are not set".to_string(),
    ))
}
