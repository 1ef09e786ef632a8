use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_u32_env, parse_usize_env, require_env};
use crate::session::SessionPolicy;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_JWT_AUDIENCE: &str = "authenticated";
const DEFAULT_HISTORY_WINDOW: usize = 10;
const DEFAULT_MIN_HUMAN_TURNS: usize = 2;
const DEFAULT_END_TRIGGER: &str = "end conversation";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub auth: AuthConfig,
    pub session_policy: SessionPolicy,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
            auth: AuthConfig::from_env()?,
            session_policy: session_policy_from_env()?,
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            jwt_secret: require_env("SUPABASE_JWT_SECRET")?,
            jwt_audience: optional_trimmed_env("SUPABASE_JWT_AUDIENCE")
                .unwrap_or_else(|| DEFAULT_JWT_AUDIENCE.to_string()),
            jwt_issuer: optional_trimmed_env("SUPABASE_JWT_ISSUER"),
        })
    }
}

fn session_policy_from_env() -> Result<SessionPolicy, ConfigError> {
    let policy = SessionPolicy {
        history_window: parse_usize_env("CHAT_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?,
        min_human_turns: parse_usize_env("CHAT_MIN_HUMAN_TURNS", DEFAULT_MIN_HUMAN_TURNS)?,
        end_trigger: optional_trimmed_env("CHAT_END_TRIGGER")
            .unwrap_or_else(|| DEFAULT_END_TRIGGER.to_string()),
    };

    validate_session_policy(&policy)?;
    Ok(policy)
}

pub(crate) fn validate_session_policy(policy: &SessionPolicy) -> Result<(), ConfigError> {
    if policy.history_window < 2 {
        return Err(ConfigError::InvalidConfiguration(
            "CHAT_HISTORY_WINDOW must be at least 2".to_string(),
        ));
    }
    if policy.end_trigger.trim().is_empty() {
        return Err(ConfigError::InvalidConfiguration(
            "CHAT_END_TRIGGER must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            min_human_turns: DEFAULT_MIN_HUMAN_TURNS,
            end_trigger: DEFAULT_END_TRIGGER.to_string(),
        }
    }
}
