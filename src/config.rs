use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::departments::DepartmentRegistry;
use crate::models::enums::Environment;

/// Application-level constants
pub const APP_NAME: &str = "discharge-docs";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_API_VERSION: &str = "2024-06-01";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_PLACEHOLDER_FRACTION: f32 = 0.9;
pub const DEFAULT_MIN_STAY_HOURS: i64 = 24;
pub const DEFAULT_PSEUDONYM_SALT: &str = "aiva";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Departments file is not valid JSON: {0}")]
    DepartmentsParse(#[from] serde_json::Error),

    #[error("Invalid department {code}: {reason}")]
    InvalidDepartment { code: String, reason: String },

    #[error("Unknown department: {0}")]
    UnknownDepartment(String),
}

/// Default tracing filter, overridable through `RUST_LOG`.
pub fn default_log_filter() -> String {
    "discharge_docs_lib=info,audit=info,tower_http=warn".to_string()
}

/// Default database location under the platform data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("letters.db")
}

/// Model-service settings for the active environment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Overrides the deployment's known context length.
    pub max_prompt_tokens: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_concurrency: usize,
    pub max_placeholder_fraction: f32,
    pub min_stay_hours: i64,
    pub redact_names: Vec<String>,
    pub redact_locations: Vec<String>,
    pub pseudonym_salt: String,
}

/// Immutable application configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub api_key: Option<String>,
    pub llm: LlmConfig,
    pub pipeline: PipelineSettings,
    pub departments: DepartmentRegistry,
}

impl AppConfig {
    /// Resolve from process environment variables (after `.env` loading).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let environment = match get("DISCHARGE_ENVIRONMENT") {
            Some(raw) => Environment::from_str(&raw.to_lowercase()).map_err(|_| ConfigError::Invalid {
                key: "DISCHARGE_ENVIRONMENT".into(),
                reason: format!("'{raw}' is not one of acc, prod, bulk, eval"),
            })?,
            None => Environment::Acc,
        };

        let deployment_key = format!("DISCHARGE_DEPLOYMENT_{}", environment.as_str().to_uppercase());
        let deployment = get(&deployment_key).unwrap_or_else(|| default_deployment(environment).to_string());

        let llm = LlmConfig {
            endpoint: require("AZURE_OPENAI_ENDPOINT")?.trim_end_matches('/').to_string(),
            api_key: require("AZURE_OPENAI_KEY")?,
            api_version: get("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            deployment,
            temperature: parse_or(&get, "DISCHARGE_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            timeout_secs: parse_or(&get, "DISCHARGE_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
            max_prompt_tokens: get("DISCHARGE_MAX_PROMPT_TOKENS")
                .map(|raw| parse_value::<usize>("DISCHARGE_MAX_PROMPT_TOKENS", &raw))
                .transpose()?,
        };

        let pipeline = PipelineSettings {
            max_concurrency: parse_or(&get, "DISCHARGE_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?,
            max_placeholder_fraction: parse_or(
                &get,
                "DISCHARGE_MAX_PLACEHOLDER_FRACTION",
                DEFAULT_MAX_PLACEHOLDER_FRACTION,
            )?,
            min_stay_hours: parse_or(&get, "DISCHARGE_MIN_STAY_HOURS", DEFAULT_MIN_STAY_HOURS)?,
            redact_names: get("DISCHARGE_REDACT_NAMES").map(|raw| split_list(&raw)).unwrap_or_default(),
            redact_locations: get("DISCHARGE_REDACT_LOCATIONS").map(|raw| split_list(&raw)).unwrap_or_default(),
            pseudonym_salt: get("DISCHARGE_PSEUDONYM_SALT").unwrap_or_else(|| DEFAULT_PSEUDONYM_SALT.to_string()),
        };

        let departments = match get("DISCHARGE_DEPARTMENTS_FILE") {
            Some(path) => DepartmentRegistry::from_file(&PathBuf::from(path))?,
            None => DepartmentRegistry::builtin()?,
        };

        let config = Self {
            environment,
            db_path: get("DISCHARGE_DB_PATH").map(PathBuf::from).unwrap_or_else(default_db_path),
            bind_addr: get("DISCHARGE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            api_key: get("DISCHARGE_API_KEY"),
            llm,
            pipeline,
            departments,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                key: "DISCHARGE_TEMPERATURE".into(),
                reason: "must be between 0 and 2".into(),
            });
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "DISCHARGE_MAX_CONCURRENCY".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.pipeline.max_placeholder_fraction) {
            return Err(ConfigError::Invalid {
                key: "DISCHARGE_MAX_PLACEHOLDER_FRACTION".into(),
                reason: "must be between 0 and 1".into(),
            });
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DISCHARGE_LLM_TIMEOUT_SECS".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Deployment names per environment when no override is set.
pub fn default_deployment(environment: Environment) -> &'static str {
    match environment {
        Environment::Prod => "aiva-gpt4-new",
        Environment::Acc | Environment::Bulk | Environment::Eval => "aiva-gpt4",
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        reason: format!("cannot parse '{raw}'"),
    })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Config with the required model settings filled in and everything else
/// at its default.
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "AZURE_OPENAI_ENDPOINT" => Some("http://127.0.0.1:9".to_string()),
        "AZURE_OPENAI_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .expect("test config resolves")
}
