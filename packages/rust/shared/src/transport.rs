//! The model-call seam between the pipeline and a language-model provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ContentPart;

/// Which pipeline stage a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Level-1 structural analysis.
    Structural,
    /// Level-2 semantic analysis.
    Semantic,
    /// 8-dimension quality review.
    Review,
    /// Cross-document summary report.
    Summary,
    /// Conversion of the summary into the guidance artifact.
    Guidance,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Review => "review",
            Self::Summary => "summary",
            Self::Guidance => "guidance",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instructions for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub stage: Stage,
    pub instructions: String,
}

impl PromptSpec {
    pub fn new(stage: Stage, instructions: impl Into<String>) -> Self {
        Self {
            stage,
            instructions: instructions.into(),
        }
    }
}

/// A language-model provider.
///
/// Implementations make exactly one attempt per call and classify failures as
/// [`DocSkillError::Transient`](crate::DocSkillError::Transient) or
/// [`DocSkillError::ContentRejected`](crate::DocSkillError::ContentRejected);
/// retrying is the caller's job. Authentication and model selection are
/// entirely the implementation's concern.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Model identifier, recorded in the run manifest.
    fn model_id(&self) -> &str;

    /// Send the instructions followed by `content` and return the raw text answer.
    async fn invoke(&self, prompt: &PromptSpec, content: &[ContentPart]) -> Result<String>;
}
