use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use integration_linear::{
    DEFAULT_DETAIL_CACHE_TTL_SECS, DEFAULT_LINEAR_API_URL, DEFAULT_LINEAR_TIMEOUT_SECS,
    DEFAULT_LISTING_CACHE_TTL_SECS,
};
use integration_openai::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_TIMEOUT_SECS,
};
use tracing::info;
use triage_core::{CoreError, DEFAULT_JPEG_QUALITY, DEFAULT_WORKFLOW_STATE_NAME};

pub const ENV_TRIAGE_CONFIG: &str = "TRIAGE_CONFIG";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_LINEAR_API_KEY: &str = "LINEAR_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_LINEAR_TEAM_ID: &str = "LINEAR_TEAM_ID";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
    #[error("{name} is not set. Export it (or add it to your environment) before running triage.")]
    MissingSecret { name: &'static str },
    #[error("{name} is empty. Provide a non-empty value.")]
    BlankSecret { name: &'static str },
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<ConfigError> for CoreError {
    fn from(error: ConfigError) -> Self {
        CoreError::Configuration(error.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TriageConfig {
    #[serde(default)]
    pub ai: AiConfigToml,
    #[serde(default)]
    pub linear: LinearConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfigToml {
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ai_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for AiConfigToml {
    fn default() -> Self {
        Self {
            model: default_ai_model(),
            base_url: default_ai_base_url(),
            timeout_secs: default_ai_timeout_secs(),
            jpeg_quality: default_ai_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinearConfigToml {
    #[serde(default = "default_linear_api_url")]
    pub api_url: String,
    #[serde(default = "default_linear_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_linear_listing_cache_ttl_secs")]
    pub listing_cache_ttl_secs: u64,
    #[serde(default = "default_linear_detail_cache_ttl_secs")]
    pub detail_cache_ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_team_id: Option<String>,
    #[serde(default = "default_linear_state_name")]
    pub default_state_name: String,
}

impl Default for LinearConfigToml {
    fn default() -> Self {
        Self {
            api_url: default_linear_api_url(),
            timeout_secs: default_linear_timeout_secs(),
            listing_cache_ttl_secs: default_linear_listing_cache_ttl_secs(),
            detail_cache_ttl_secs: default_linear_detail_cache_ttl_secs(),
            default_team_id: None,
            default_state_name: default_linear_state_name(),
        }
    }
}

fn default_ai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_owned()
}

fn default_ai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_owned()
}

fn default_ai_timeout_secs() -> u64 {
    DEFAULT_OPENAI_TIMEOUT_SECS
}

fn default_ai_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_linear_api_url() -> String {
    DEFAULT_LINEAR_API_URL.to_owned()
}

fn default_linear_timeout_secs() -> u64 {
    DEFAULT_LINEAR_TIMEOUT_SECS
}

fn default_linear_listing_cache_ttl_secs() -> u64 {
    DEFAULT_LISTING_CACHE_TTL_SECS
}

fn default_linear_detail_cache_ttl_secs() -> u64 {
    DEFAULT_DETAIL_CACHE_TTL_SECS
}

fn default_linear_state_name() -> String {
    DEFAULT_WORKFLOW_STATE_NAME.to_owned()
}

/// Credentials read from the environment only; never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub openai_api_key: String,
    pub linear_api_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Secrets")
            .field("openai_api_key", &"<redacted>")
            .field("linear_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            openai_api_key: required_env(ENV_OPENAI_API_KEY)?,
            linear_api_key: required_env(ENV_LINEAR_API_KEY)?,
        })
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(name).map_err(|_| ConfigError::MissingSecret { name })?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::BlankSecret { name });
    }
    Ok(value.to_owned())
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Loads the file config and layers the optional `OPENAI_MODEL` and
/// `LINEAR_TEAM_ID` overrides on top. Overrides are not written back.
pub fn load_from_env() -> Result<TriageConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<TriageConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn apply_env_overrides(config: &mut TriageConfig) {
    if let Some(model) = optional_env(ENV_OPENAI_MODEL) {
        config.ai.model = model;
    }
    if let Some(team_id) = optional_env(ENV_LINEAR_TEAM_ID) {
        config.linear.default_team_id = Some(team_id);
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("triage").join("config.toml"))
}

pub fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_TRIAGE_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.trim().into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "TRIAGE_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn persist_config(path: &Path, config: &TriageConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize TRIAGE_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write TRIAGE_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<TriageConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for TRIAGE_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = TriageConfig::default();
            persist_config(path, &default_config)?;
            info!(path = %path.display(), "wrote default triage config");
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read TRIAGE_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: TriageConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse TRIAGE_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut TriageConfig) -> bool {
    let mut changed = false;

    changed |= normalize_non_empty_string(&mut config.ai.model, default_ai_model());
    changed |= normalize_non_empty_string(&mut config.ai.base_url, default_ai_base_url());
    changed |= normalize_positive(&mut config.ai.timeout_secs, DEFAULT_OPENAI_TIMEOUT_SECS);
    if config.ai.jpeg_quality == 0 || config.ai.jpeg_quality > 100 {
        config.ai.jpeg_quality = DEFAULT_JPEG_QUALITY;
        changed = true;
    }

    changed |= normalize_non_empty_string(&mut config.linear.api_url, default_linear_api_url());
    changed |= normalize_positive(&mut config.linear.timeout_secs, DEFAULT_LINEAR_TIMEOUT_SECS);
    changed |= normalize_positive(
        &mut config.linear.listing_cache_ttl_secs,
        DEFAULT_LISTING_CACHE_TTL_SECS,
    );
    changed |= normalize_positive(
        &mut config.linear.detail_cache_ttl_secs,
        DEFAULT_DETAIL_CACHE_TTL_SECS,
    );
    changed |= normalize_non_empty_string(
        &mut config.linear.default_state_name,
        default_linear_state_name(),
    );
    changed |= normalize_optional_string(&mut config.linear.default_team_id);

    changed
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn normalize_optional_string(value: &mut Option<String>) -> bool {
    let normalized = value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    if *value != normalized {
        *value = normalized;
        return true;
    }
    false
}

fn normalize_positive(value: &mut u64, default: u64) -> bool {
    if *value == 0 {
        *value = default;
        return true;
    }
    false
}
