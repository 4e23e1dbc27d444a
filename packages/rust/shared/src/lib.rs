//! Shared types, error model, and configuration for docskill.
//!
//! This crate is the foundation depended on by all other docskill crates.
//! It provides:
//! - [`DocSkillError`], the unified error type and failure taxonomy
//! - Domain types ([`Document`], [`DocumentId`], [`Report`], [`ContentPart`])
//! - The [`ModelTransport`] seam used by every model call
//! - Configuration ([`AppConfig`], [`AnalysisConfig`], config loading)

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AppConfig, DefaultsConfig, OpenRouterConfig, RetryConfig, RetryPolicy,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key,
};
pub use error::{DocSkillError, Result};
pub use transport::{ModelTransport, PromptSpec, Stage};
pub use types::{
    CURRENT_SCHEMA_VERSION, ContentPart, Document, DocumentContent, DocumentFormat, DocumentId,
    DocumentOutcome, MediaRef, Report, ReportLevel, RunOutcome,
};
