//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`] — the unified error type
//! - Domain types ([`CompanyCandidate`], [`CompanyOutcome`], [`InsightPayload`], [`Person`])
//! - Domain normalization and niche keys ([`normalize_domain`], [`NicheKey`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod domain;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CacheSection, EnrichmentConfig, EnrichmentSection, LlmSection,
    ScrapeConfig, ScrapeSection, SearchSection, StorageSection, config_dir, config_file_path,
    database_path, init_config, load_config, load_config_from, resolve_api_key, validate_api_key,
};
pub use domain::{DomainSet, NicheKey, normalize_domain, normalize_website};
pub use error::{ProspectorError, Result};
pub use types::{CompanyCandidate, CompanyOutcome, InsightPayload, InsightScores, Person, SearchId};
