//! Core pipeline orchestration and domain logic for docskill.
//!
//! This crate ties together discovery, the per-document model stages,
//! scoring and ranking, and guidance synthesis into the end-to-end
//! `analyze` workflow.

pub mod agents;
pub mod pipeline;
pub mod prompts;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod synthesis;

#[cfg(test)]
mod testing;

pub use pipeline::{Pipeline, ProgressReporter, RunReport, SilentProgress};
pub use ranking::Ranking;
pub use scoring::{Dimension, ScoreCard};
