//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "prospector.db";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Candidate discovery and selection.
    #[serde(default)]
    pub search: SearchSection,

    /// Per-company enrichment.
    #[serde(default)]
    pub enrichment: EnrichmentSection,

    /// Website scraping.
    #[serde(default)]
    pub scrape: ScrapeSection,

    /// In-memory extraction cache.
    #[serde(default)]
    pub cache: CacheSection,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmSection,

    /// Local database.
    #[serde(default)]
    pub storage: StorageSection,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Number of companies to enrich per search.
    #[serde(default = "default_desired_count")]
    pub desired_count: usize,

    /// How many candidates to request from discovery per desired company.
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Hard cap on candidates requested from discovery.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Shuffle within selection tiers so repeated searches vary.
    #[serde(default = "default_true")]
    pub randomize: bool,

    /// Discovery temperature when `randomize` is on.
    #[serde(default = "default_randomized_temperature")]
    pub randomized_temperature: f32,

    /// Discovery temperature when `randomize` is off.
    #[serde(default = "default_stable_temperature")]
    pub stable_temperature: f32,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            desired_count: default_desired_count(),
            oversample_factor: default_oversample_factor(),
            max_candidates: default_max_candidates(),
            randomize: true,
            randomized_temperature: default_randomized_temperature(),
            stable_temperature: default_stable_temperature(),
        }
    }
}

fn default_desired_count() -> usize {
    10
}
fn default_oversample_factor() -> usize {
    2
}
fn default_max_candidates() -> usize {
    20
}
fn default_true() -> bool {
    true
}
fn default_randomized_temperature() -> f32 {
    0.9
}
fn default_stable_temperature() -> f32 {
    0.2
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Companies processed concurrently per chunk.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Character budget for the combined scraped text sent to the oracle.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}
fn default_max_text_chars() -> usize {
    15_000
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSection {
    /// Per-request timeout in seconds.
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,

    /// Responses larger than this are rejected.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_scrape_timeout() -> u64 {
    8
}
fn default_max_body_bytes() -> u64 {
    2 * 1024 * 1024
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Seconds before a cached extraction is considered stale.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of cached domains.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_max_entries() -> usize {
    500
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every oracle call.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Database path. Defaults to `~/.prospector/prospector.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub timeout: Duration,
    pub max_body_bytes: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScrapeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.scrape.timeout_secs),
            max_body_bytes: config.scrape.max_body_bytes,
        }
    }
}

/// Runtime extraction-cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.cache.ttl_secs),
            max_entries: config.cache.max_entries,
        }
    }
}

/// Runtime enrichment configuration.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Chunk size *k*; values below 1 are treated as 1.
    pub concurrency: usize,
    pub max_text_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EnrichmentConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.enrichment.concurrency,
            max_text_chars: config.enrichment.max_text_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else the config dir default.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.db_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join(DB_FILE_NAME)),
    }
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
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProspectorError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the LLM API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProspectorError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}
