//! Core domain types shared by every docskill crate.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// Stable identity of a document: its path relative to the analyzed directory,
/// always with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Build an identity from a path relative to the document root.
    pub fn from_relative(path: &Path) -> Self {
        let parts: Vec<String> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Self(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe form used for per-document artifacts.
    ///
    /// `notes/intro.md` becomes `notes__intro-md`. The mapping is injective:
    /// alphanumerics are kept, `/` is `__`, `.` is `-`, a literal `_` or `-` is
    /// escaped as `_u` or `_d`, and anything else is `_x<hex>_`.
    pub fn slug(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            match c {
                '/' => out.push_str("__"),
                '.' => out.push('-'),
                '_' => out.push_str("_u"),
                '-' => out.push_str("_d"),
                c if c.is_alphanumeric() => out.push(c),
                c => {
                    let _ = write!(out, "_x{:x}_", u32::from(c));
                }
            }
        }
        out
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.replace('\\', "/"))
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// DocumentFormat
// ---------------------------------------------------------------------------

/// The fixed set of formats the document source understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markdown,
    PlainText,
    ReStructuredText,
    Html,
    Docx,
    Pdf,
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl DocumentFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            "rst" => Some(Self::ReStructuredText),
            "html" | "htm" => Some(Self::Html),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// MIME type for media formats; `None` for text-like formats.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some("application/pdf"),
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::Webp => Some("image/webp"),
            _ => None,
        }
    }

    /// Whether the document is sent to the model as a media payload.
    pub fn is_multimodal(&self) -> bool {
        self.mime_type().is_some()
    }
}

// ---------------------------------------------------------------------------
// Document content
// ---------------------------------------------------------------------------

/// Reference to a media file that the transport inlines at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// MIME type (e.g. `application/pdf`).
    pub mime_type: String,
}

/// One part of a model request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Media { media: MediaRef },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// The analyzable content of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    /// Plain text (Markdown, text, reStructuredText, converted HTML).
    Text(String),
    /// Ordered multimodal parts (media files, optionally with text).
    Parts(Vec<ContentPart>),
}

impl DocumentContent {
    /// The text, when the content is plain text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A loaded, immutable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identity (relative path).
    pub id: DocumentId,
    /// Detected format.
    pub format: DocumentFormat,
    /// Analyzable content.
    pub content: DocumentContent,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Which analysis level a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    /// Structural / stylistic profile.
    Level1,
    /// Meta-logical / cognitive-structure profile.
    Level2,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level1 => "level1",
            Self::Level2 => "level2",
        }
    }
}

impl std::fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Level-1 or Level-2 analysis report. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub document: DocumentId,
    pub level: ReportLevel,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Final state of one document in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Both reports and a ScoreCard exist.
    Scored { composite: f64 },
    /// A Level-1 or Level-2 report could not be produced.
    ReportsMissing { reason: String },
    /// Both reports exist but the quality review failed.
    Unscorable { reason: String },
    /// The run was cancelled before this document started.
    NotStarted,
}

impl DocumentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scored { .. } => "scored",
            Self::ReportsMissing { .. } => "reports-missing",
            Self::Unscorable { .. } => "unscorable",
            Self::NotStarted => "not-started",
        }
    }

    /// Failure reason, for outcomes that have one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::ReportsMissing { reason } | Self::Unscorable { reason } => Some(reason),
            Self::NotStarted => Some("run cancelled before the document started"),
            Self::Scored { .. } => None,
        }
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The guidance artifact was written.
    Done,
    /// No guidance artifact; per-document artifacts remain valid.
    Failed { reason: String },
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_uses_forward_slashes() {
        let id = DocumentId::from_relative(Path::new("guides").join("intro.md").as_path());
        assert_eq!(id.as_str(), "guides/intro.md");
    }

    #[test]
    fn slug_never_merges_distinct_identities() {
        let ids = [
            "a.b.md", "a-b.md", "a_b.md", "x/y.md", "x__y.md", "x_uy.md", "a b.md", "a_x20_.md",
            "notes/intro.md", "notes-intro.md",
        ];
        let slugs: std::collections::HashSet<String> =
            ids.iter().map(|id| DocumentId::from(*id).slug()).collect();
        assert_eq!(slugs.len(), ids.len());

        assert_eq!(DocumentId::from("a.b.md").slug(), "a-b-md");
        assert_eq!(DocumentId::from("a-b.md").slug(), "a_db-md");
        assert_eq!(DocumentId::from("a b.md").slug(), "a_x20_b-md");
        assert!(
            DocumentId::from("a b.md")
                .slug()
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn slug_keeps_extension_distinct() {
        let md = DocumentId::from("notes/intro.md");
        let txt = DocumentId::from("notes/intro.txt");
        assert_eq!(md.slug(), "notes__intro-md");
        assert_ne!(md.slug(), txt.slug());
    }

    #[test]
    fn format_detection() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/B.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_extension("htm"), Some(DocumentFormat::Html));
        assert_eq!(DocumentFormat::from_extension("DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("odt"), None);
        assert!(!DocumentFormat::Docx.is_multimodal());
        assert!(DocumentFormat::Jpeg.is_multimodal());
        assert!(!DocumentFormat::Markdown.is_multimodal());
    }

    #[test]
    fn content_part_serialization() {
        let part = ContentPart::text("hello");
        let json = serde_json::to_string(&part).expect("serialize");
        assert_eq!(json, r#"{"type":"text","text":"hello"}"#);
    }

    #[test]
    fn outcome_serialization() {
        let outcome = DocumentOutcome::Scored { composite: 72.5 };
        let json = serde_json::to_string(&outcome).expect("serialize");
        assert_eq!(json, r#"{"status":"scored","composite":72.5}"#);
        assert_eq!(DocumentOutcome::NotStarted.label(), "not-started");
        assert!(DocumentOutcome::Unscorable { reason: "x".into() }.reason().is_some());
    }

    #[test]
    fn text_content_exposes_text() {
        let content = DocumentContent::Text("body".into());
        assert_eq!(content.as_text(), Some("body"));
    }
}
