//! Application configuration for docskill.
//!
//! User config lives at `~/.docskill/docskill.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocSkillError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docskill.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docskill";

// ---------------------------------------------------------------------------
// Config structs (matching docskill.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Retry policy for model calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Name of the output directory created inside the analyzed directory.
    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,

    /// Number of documents analyzed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Text documents longer than this are truncated before analysis.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir_name: default_output_dir_name(),
            concurrency: default_concurrency(),
            max_document_chars: default_max_document_chars(),
        }
    }
}

fn default_output_dir_name() -> String {
    "_analysis".into()
}
fn default_concurrency() -> u32 {
    4
}
fn default_max_document_chars() -> usize {
    120_000
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model; must accept images and PDFs for media documents.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API base URL (overridable for proxies and tests).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.5-pro".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    300
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for a transient failure (first call included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; later retries wait a multiple of it.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    10_000
}

// ---------------------------------------------------------------------------
// Retry policy (runtime)
// ---------------------------------------------------------------------------

/// Bounded retry policy for transient model-call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never waits between attempts (tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
        }
    }

    /// How long to wait after the given 1-based failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime analysis configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Directory holding the documents to analyze.
    pub doc_dir: PathBuf,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Maximum documents in flight.
    pub concurrency: u32,
    /// Text documents are truncated to this many chars.
    pub max_document_chars: usize,
    /// Retry policy for every model call.
    pub retry: RetryPolicy,
    /// Recompute artifacts even when they already exist.
    pub force: bool,
}

impl AnalysisConfig {
    /// Build from the app config with the output directory placed inside `doc_dir`.
    pub fn new(config: &AppConfig, doc_dir: impl Into<PathBuf>) -> Self {
        let doc_dir = doc_dir.into();
        Self {
            output_dir: doc_dir.join(&config.defaults.output_dir_name),
            doc_dir,
            concurrency: config.defaults.concurrency.max(1),
            max_document_chars: config.defaults.max_document_chars,
            retry: RetryPolicy::from(&config.retry),
            force: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docskill/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocSkillError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docskill/docskill.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocSkillError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocSkillError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocSkillError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocSkillError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocSkillError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the OpenRouter API key from its env var.
///
/// Fails with a config error when the variable is unset or empty, so a run can
/// abort before any document work begins.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(DocSkillError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir_name"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("max_attempts"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(parsed.retry.max_attempts, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
concurrency = 8

[openrouter]
default_model = "anthropic/claude-sonnet-4"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.concurrency, 8);
        assert_eq!(config.defaults.output_dir_name, "_analysis");
        assert_eq!(config.openrouter.default_model, "anthropic/claude-sonnet-4");
        assert_eq!(config.openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.retry.base_delay_ms, 10_000);
    }

    #[test]
    fn analysis_config_from_app_config() {
        let app = AppConfig::default();
        let analysis = AnalysisConfig::new(&app, "/tmp/docs");
        assert_eq!(analysis.output_dir, PathBuf::from("/tmp/docs/_analysis"));
        assert_eq!(analysis.concurrency, 4);
        assert_eq!(analysis.retry.max_attempts, 3);
        assert!(!analysis.force);
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10_000,
        });
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(20));
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "DS_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
