//! The per-document model stages: Level-1/Level-2 analysis and quality review.
//!
//! Each stage is one logical model call. Transient failures are retried with a
//! linear backoff; `ContentRejected` surfaces immediately; a review answer that
//! cannot be parsed gets exactly one more attempt with stricter instructions.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use docskill_shared::{
    ContentPart, DocSkillError, Document, DocumentContent, ModelTransport, PromptSpec, Report,
    ReportLevel, Result, RetryPolicy, Stage,
};

use crate::prompts;
use crate::scoring::{self, ScoreCard};

/// Source text cap inside the review request, in chars.
pub const REVIEW_SOURCE_MAX_CHARS: usize = 80_000;
/// Per-report cap inside the review request, in chars.
pub const REVIEW_REPORT_MAX_CHARS: usize = 60_000;

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Invoke the transport, retrying transient failures per `policy`.
pub async fn call_with_retry(
    transport: &dyn ModelTransport,
    prompt: &PromptSpec,
    content: &[ContentPart],
    policy: &RetryPolicy,
) -> Result<String> {
    let mut attempt = 1;
    loop {
        match transport.invoke(prompt, content).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    stage = %prompt.stage,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient model failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Level-1 / Level-2 analysis
// ---------------------------------------------------------------------------

/// Produces one level of report for a document. The Structural and Semantic
/// analyzers differ only in level and instructions.
#[derive(Clone)]
pub struct ReportAnalyzer {
    level: ReportLevel,
    transport: Arc<dyn ModelTransport>,
    retry: RetryPolicy,
}

impl ReportAnalyzer {
    /// Level-1: structural and stylistic profile.
    pub fn structural(transport: Arc<dyn ModelTransport>, retry: RetryPolicy) -> Self {
        Self {
            level: ReportLevel::Level1,
            transport,
            retry,
        }
    }

    /// Level-2: meta-logical and cognitive-structure profile.
    pub fn semantic(transport: Arc<dyn ModelTransport>, retry: RetryPolicy) -> Self {
        Self {
            level: ReportLevel::Level2,
            transport,
            retry,
        }
    }

    pub fn level(&self) -> ReportLevel {
        self.level
    }

    #[instrument(skip_all, fields(document = %document.id, level = %self.level))]
    pub async fn analyze(&self, document: &Document) -> Result<Report> {
        let (stage, instructions) = match self.level {
            ReportLevel::Level1 => (Stage::Structural, prompts::STRUCTURAL),
            ReportLevel::Level2 => (Stage::Semantic, prompts::SEMANTIC),
        };
        let prompt = PromptSpec::new(stage, instructions);
        let content = source_parts(document, None);

        let text = call_with_retry(self.transport.as_ref(), &prompt, &content, &self.retry).await?;
        debug!(chars = text.len(), "report produced");

        Ok(Report {
            document: document.id.clone(),
            level: self.level,
            text,
        })
    }
}

// ---------------------------------------------------------------------------
// Quality review
// ---------------------------------------------------------------------------

/// Scores a document on the eight dimensions from the source and both reports.
#[derive(Clone)]
pub struct QualityReviewer {
    transport: Arc<dyn ModelTransport>,
    retry: RetryPolicy,
}

impl QualityReviewer {
    pub fn new(transport: Arc<dyn ModelTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Score `document`. Requires both reports, which the signature enforces.
    #[instrument(skip_all, fields(document = %document.id))]
    pub async fn score(
        &self,
        document: &Document,
        level1: &Report,
        level2: &Report,
    ) -> Result<ScoreCard> {
        let mut content = source_parts(document, Some(REVIEW_SOURCE_MAX_CHARS));
        content.push(ContentPart::text(format!(
            "# Level-1 analysis\n\n{}",
            docskill_markdown::truncate_chars(&level1.text, REVIEW_REPORT_MAX_CHARS)
        )));
        content.push(ContentPart::text(format!(
            "# Level-2 analysis\n\n{}",
            docskill_markdown::truncate_chars(&level2.text, REVIEW_REPORT_MAX_CHARS)
        )));

        let first = PromptSpec::new(Stage::Review, prompts::review(false));
        let raw = call_with_retry(self.transport.as_ref(), &first, &content, &self.retry).await?;

        match scoring::parse_scorecard(&raw) {
            Ok(card) => Ok(card),
            Err(DocSkillError::MalformedResponse(reason)) => {
                warn!(%reason, "review response malformed, retrying with strict format");
                let strict = PromptSpec::new(Stage::Review, prompts::review(true));
                let raw =
                    call_with_retry(self.transport.as_ref(), &strict, &content, &self.retry).await?;
                scoring::parse_scorecard(&raw)
            }
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The document as request parts, headed by its identity.
fn source_parts(document: &Document, max_chars: Option<usize>) -> Vec<ContentPart> {
    match &document.content {
        DocumentContent::Text(text) => {
            let text = match max_chars {
                Some(max) => docskill_markdown::truncate_chars(text, max),
                None => text.clone(),
            };
            vec![ContentPart::text(format!("# Source document: {}\n\n{text}", document.id))]
        }
        DocumentContent::Parts(parts) => {
            let mut out = Vec::with_capacity(parts.len() + 1);
            out.push(ContentPart::text(format!(
                "# Source document: {} (attached file)",
                document.id
            )));
            out.extend(parts.iter().cloned());
            out
        }
    }
}
