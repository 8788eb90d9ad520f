//! Service configuration from environment variables
//!
//! A `.env` file in the working directory is loaded first when present, so
//! the API key can stay out of the shell environment.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL: &str = "gemini-pro";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Alternative endpoint base (e.g. a credential-injecting proxy)
    pub llm_gateway: Option<String>,
    pub persona_path: Option<PathBuf>,
    pub context_turns: usize,
    pub session_ttl: Duration,
    pub show_error_detail: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            llm_gateway: None,
            persona_path: None,
            context_turns: crate::state_machine::state::DEFAULT_CONTEXT_TURNS,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            show_error_detail: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let context_turns = parse_or(
            var("TERASU_CONTEXT_TURNS"),
            "TERASU_CONTEXT_TURNS",
            "a positive integer",
            defaults.context_turns,
        )?;
        if context_turns == 0 {
            return Err(ConfigError::Invalid {
                name: "TERASU_CONTEXT_TURNS",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            port: parse_or(var("TERASU_PORT"), "TERASU_PORT", "a port number", defaults.port)?,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            llm_gateway: var("LLM_GATEWAY"),
            persona_path: var("TERASU_PERSONA_PATH").map(PathBuf::from),
            context_turns,
            session_ttl: Duration::from_secs(parse_or(
                var("TERASU_SESSION_TTL_SECS"),
                "TERASU_SESSION_TTL_SECS",
                "a number of seconds",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            show_error_detail: parse_bool(
                var("TERASU_SHOW_ERROR_DETAIL"),
                "TERASU_SHOW_ERROR_DETAIL",
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
    }
}

fn parse_bool(value: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            expected: "a boolean",
            value: other.to_string(),
        }),
    }
}
