//! Persistence for analysis artifacts.
//!
//! Every artifact lives at a fixed path under the output directory:
//!
//! ```text
//! <output_dir>/
//! ├── level1/<slug>_L1.md
//! ├── level2/<slug>_L2.md
//! ├── scores/<slug>_score.md
//! ├── scores/ranking.md
//! ├── summary.md
//! ├── SKILL.md
//! └── run.json
//! ```
//!
//! Writes are atomic (temp file, then rename) so an interrupted run never
//! leaves a half-written artifact behind; a later run treats any existing
//! non-empty file as already computed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use docskill_shared::{
    CURRENT_SCHEMA_VERSION, DocSkillError, DocumentId, DocumentOutcome, ReportLevel, Result,
    RunOutcome,
};

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// Per-document artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Level1,
    Level2,
    Score,
}

impl ArtifactKind {
    fn subdir(&self) -> &'static str {
        match self {
            Self::Level1 => "level1",
            Self::Level2 => "level2",
            Self::Score => "scores",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Level1 => "_L1.md",
            Self::Level2 => "_L2.md",
            Self::Score => "_score.md",
        }
    }
}

impl From<ReportLevel> for ArtifactKind {
    fn from(level: ReportLevel) -> Self {
        match level {
            ReportLevel::Level1 => Self::Level1,
            ReportLevel::Level2 => Self::Level2,
        }
    }
}

/// Run-level artifacts, one of each per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunArtifact {
    Ranking,
    Summary,
    Guidance,
    Manifest,
}

impl RunArtifact {
    /// Path relative to the output directory, with `/` separators.
    pub fn relative_path(&self) -> &'static str {
        match self {
            Self::Ranking => "scores/ranking.md",
            Self::Summary => "summary.md",
            Self::Guidance => "SKILL.md",
            Self::Manifest => "run.json",
        }
    }
}

/// Size and checksum of a written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Path relative to the output directory.
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

// ---------------------------------------------------------------------------
// Run manifest
// ---------------------------------------------------------------------------

/// Per-document line of the run manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

/// `run.json`: what one run did and what it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub tool_version: String,
    pub model: String,
    pub doc_dir: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub documents: Vec<DocumentRecord>,
    pub artifacts: Vec<ArtifactMeta>,
}

impl RunManifest {
    /// Start a manifest for a new run; `finished_at` is set by [`RunManifest::finish`].
    pub fn begin(model: impl Into<String>, doc_dir: &Path) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: Uuid::now_v7(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            model: model.into(),
            doc_dir: doc_dir.display().to_string(),
            started_at: now,
            finished_at: now,
            outcome: RunOutcome::Failed {
                reason: "run did not finish".into(),
            },
            documents: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.finished_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Keyed access to the artifacts of one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output directory layout.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn prepare(&self) -> Result<()> {
        let dirs = [
            self.root.clone(),
            self.root.join(ArtifactKind::Level1.subdir()),
            self.root.join(ArtifactKind::Level2.subdir()),
            self.root.join(ArtifactKind::Score.subdir()),
        ];

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| DocSkillError::io(dir, e))?;
        }

        debug!("output layout created");
        Ok(())
    }

    pub fn document_path(&self, id: &DocumentId, kind: ArtifactKind) -> PathBuf {
        self.root
            .join(kind.subdir())
            .join(format!("{}{}", id.slug(), kind.suffix()))
    }

    pub fn run_path(&self, artifact: RunArtifact) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    /// Read-before-write: the stored artifact, if present and non-empty.
    pub fn read_document(&self, id: &DocumentId, kind: ArtifactKind) -> Result<Option<String>> {
        read_existing(&self.document_path(id, kind))
    }

    /// Atomically write a per-document artifact, replacing any previous version.
    pub fn write_document(
        &self,
        id: &DocumentId,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<ArtifactMeta> {
        let path = self.document_path(id, kind);
        let meta = write_atomic(&self.root, &path, content.as_bytes())?;
        debug!(document = %id, kind = ?kind, size = meta.size_bytes, "wrote document artifact");
        Ok(meta)
    }

    pub fn read_run_artifact(&self, artifact: RunArtifact) -> Result<Option<String>> {
        read_existing(&self.run_path(artifact))
    }

    /// Atomically write a run-level artifact.
    pub fn write_run_artifact(&self, artifact: RunArtifact, content: &str) -> Result<ArtifactMeta> {
        let path = self.run_path(artifact);
        let meta = write_atomic(&self.root, &path, content.as_bytes())?;
        info!(file = %meta.filename, size = meta.size_bytes, "wrote run artifact");
        Ok(meta)
    }

    /// Write `run.json` (pretty-printed).
    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| DocSkillError::validation(format!("JSON serialization failed: {e}")))?;
        write_atomic(&self.root, &self.run_path(RunArtifact::Manifest), json.as_bytes())?;
        debug!("run manifest written");
        Ok(())
    }

    /// Load and validate a previous run's manifest.
    pub fn read_manifest(&self) -> Result<Option<RunManifest>> {
        let Some(content) = self.read_run_artifact(RunArtifact::Manifest)? else {
            return Ok(None);
        };

        let manifest: RunManifest = serde_json::from_str(&content)
            .map_err(|e| DocSkillError::validation(format!("invalid run.json: {e}")))?;

        if manifest.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(DocSkillError::validation(format!(
                "unsupported schema_version: {} (expected {})",
                manifest.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }

        Ok(Some(manifest))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn read_existing(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(None),
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DocSkillError::io(path, e)),
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(root: &Path, path: &Path, bytes: &[u8]) -> Result<ArtifactMeta> {
    let parent = path
        .parent()
        .ok_or_else(|| DocSkillError::validation(format!("no parent for {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| DocSkillError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| DocSkillError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocSkillError::io(path, e))?;

    let filename = path
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or(file_name);

    Ok(ArtifactMeta {
        filename,
        sha256: sha256_hex(bytes),
        size_bytes: bytes.len(),
    })
}
