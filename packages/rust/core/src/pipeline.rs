//! End-to-end `analyze` pipeline: directory → per-document analysis → ranking → synthesis.
//!
//! Per document: Level-1 and Level-2 run concurrently, the review runs only
//! after both succeed. Documents are processed by a bounded pool of tasks and
//! collected in enumeration order at a single point once all have finished.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use docskill_artifacts::{ArtifactKind, ArtifactStore, DocumentRecord, RunArtifact, RunManifest};
use docskill_discovery::{ListOptions, SkippedFile};
use docskill_shared::{
    AnalysisConfig, DocSkillError, Document, DocumentId, DocumentOutcome, ModelTransport, Report,
    Result, RunOutcome,
};

use crate::agents::{QualityReviewer, ReportAnalyzer};
use crate::ranking::{self, Ranking, ScoreInput};
use crate::report;
use crate::scoring::ScoreCard;
use crate::synthesis::GuidanceSynthesizer;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document's analysis starts.
    fn document_started(&self, id: &DocumentId, current: usize, total: usize);
    /// Called when a document reaches its final state.
    fn document_finished(&self, id: &DocumentId, outcome: &DocumentOutcome);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_started(&self, _id: &DocumentId, _current: usize, _total: usize) {}
    fn document_finished(&self, _id: &DocumentId, _outcome: &DocumentOutcome) {}
    fn done(&self, _report: &RunReport) {}
}

/// Result of one `analyze` run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub output_dir: PathBuf,
    pub outcome: RunOutcome,
    /// Per-document outcomes in enumeration order.
    pub documents: Vec<(DocumentId, DocumentOutcome)>,
    pub ranking: Ranking,
    /// Files found but not analyzed.
    pub skipped: Vec<SkippedFile>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn count(&self, label: &str) -> usize {
        self.documents.iter().filter(|(_, o)| o.label() == label).count()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Drives one analysis run over a document directory.
pub struct Pipeline {
    transport: Arc<dyn ModelTransport>,
    config: AnalysisConfig,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn ModelTransport>, config: AnalysisConfig) -> Self {
        Self {
            transport,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once set, stops new documents from starting. In-flight
    /// documents run to completion so no artifact is left half-written.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run the full pipeline.
    ///
    /// 1. Collect documents
    /// 2. Analyze each document (bounded concurrency)
    /// 3. Rank scored documents and write the ranking table
    /// 4. Synthesize the summary and SKILL.md
    /// 5. Write the run manifest
    #[instrument(skip_all, fields(doc_dir = %self.config.doc_dir.display(), model = %self.transport.model_id()))]
    pub async fn run(&self, progress: Arc<dyn ProgressReporter>) -> Result<RunReport> {
        let start = Instant::now();
        let store = ArtifactStore::new(&self.config.output_dir);
        let mut manifest = RunManifest::begin(self.transport.model_id(), &self.config.doc_dir);

        info!(run_id = %manifest.run_id, "starting analyze pipeline");

        // --- Phase 1: Collect ---
        progress.phase("Collecting documents");
        let listing = docskill_discovery::list_documents(
            &self.config.doc_dir,
            &ListOptions {
                exclude_dir: Some(self.config.output_dir.clone()),
                max_document_chars: self.config.max_document_chars,
            },
        )?;

        if listing.documents.is_empty() {
            return Err(DocSkillError::validation(format!(
                "no analyzable documents found in {}",
                self.config.doc_dir.display()
            )));
        }
        store.prepare()?;

        // --- Phase 2: Analyze ---
        progress.phase("Analyzing documents");
        let documents: Vec<Arc<Document>> = listing.documents.into_iter().map(Arc::new).collect();
        let results = self.analyze_all(&store, &documents, progress.clone()).await;

        // --- Phase 3: Aggregate ---
        progress.phase("Ranking documents");
        let inputs: Vec<ScoreInput> = results
            .iter()
            .map(|r| ScoreInput {
                id: r.id.clone(),
                result: match (&r.card, r.outcome.reason()) {
                    (Some(card), _) => Ok(card.clone()),
                    (None, reason) => Err(reason.unwrap_or("not scored").to_string()),
                },
            })
            .collect();
        let ranking = ranking::rank(&inputs);
        manifest
            .artifacts
            .push(store.write_run_artifact(RunArtifact::Ranking, &report::render_ranking(&ranking))?);

        info!(
            scored = ranking.entries.len(),
            unscored = ranking.unscored.len(),
            "aggregation complete"
        );

        // --- Phase 4: Synthesize ---
        let outcome = if self.cancel.load(Ordering::SeqCst) {
            RunOutcome::Failed {
                reason: "run cancelled".into(),
            }
        } else if ranking.is_empty() {
            RunOutcome::Failed {
                reason: "no document reached the scored state".into(),
            }
        } else {
            progress.phase("Synthesizing guidance");
            self.synthesize(&store, &documents, &results, &ranking, &mut manifest)
                .await?
        };

        if let RunOutcome::Failed { reason } = &outcome {
            warn!(%reason, "run failed; per-document artifacts remain valid");
        }

        // --- Phase 5: Manifest ---
        manifest.documents = results
            .iter()
            .map(|r| DocumentRecord {
                id: r.id.clone(),
                outcome: r.outcome.clone(),
            })
            .collect();
        manifest.finish(outcome.clone());
        store.write_manifest(&manifest)?;

        let report = RunReport {
            run_id: manifest.run_id,
            output_dir: self.config.output_dir.clone(),
            outcome,
            documents: results.into_iter().map(|r| (r.id, r.outcome)).collect(),
            ranking,
            skipped: listing.skipped,
            elapsed: start.elapsed(),
        };

        progress.done(&report);

        info!(
            run_id = %report.run_id,
            outcome = ?report.outcome,
            scored = report.count("scored"),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "analyze pipeline complete"
        );

        Ok(report)
    }

    /// Scatter documents over a bounded pool, gather results in enumeration order.
    async fn analyze_all(
        &self,
        store: &ArtifactStore,
        documents: &[Arc<Document>],
        progress: Arc<dyn ProgressReporter>,
    ) -> Vec<DocumentResult> {
        let ctx = Arc::new(DocumentContext {
            store: store.clone(),
            structural: ReportAnalyzer::structural(self.transport.clone(), self.config.retry),
            semantic: ReportAnalyzer::semantic(self.transport.clone(), self.config.retry),
            reviewer: QualityReviewer::new(self.transport.clone(), self.config.retry),
            force: self.config.force,
        });
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        let total = documents.len();

        let mut handles = Vec::with_capacity(total);
        for (i, doc) in documents.iter().enumerate() {
            let ctx = ctx.clone();
            let doc = doc.clone();
            let sem = semaphore.clone();
            let cancel = self.cancel.clone();
            let progress = progress.clone();
            let id = doc.id.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return DocumentResult::not_started(&doc.id);
                };
                if cancel.load(Ordering::SeqCst) {
                    debug!(document = %doc.id, "cancelled before start");
                    return DocumentResult::not_started(&doc.id);
                }
                progress.document_started(&doc.id, i + 1, total);
                ctx.process(&doc).await
            });
            handles.push((id, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => DocumentResult {
                    id: id.clone(),
                    outcome: DocumentOutcome::ReportsMissing {
                        reason: format!("analysis task failed: {e}"),
                    },
                    level1: None,
                    level2: None,
                    card: None,
                },
            };
            progress.document_finished(&id, &result.outcome);
            results.push(result);
        }
        results
    }

    async fn synthesize(
        &self,
        store: &ArtifactStore,
        documents: &[Arc<Document>],
        results: &[DocumentResult],
        ranking: &Ranking,
        manifest: &mut RunManifest,
    ) -> Result<RunOutcome> {
        let docs: Vec<Document> = documents.iter().map(|d| d.as_ref().clone()).collect();
        let level1: Vec<Report> = results.iter().filter_map(|r| r.level1.clone()).collect();
        let level2: Vec<Report> = results.iter().filter_map(|r| r.level2.clone()).collect();

        let skill_name = self
            .config
            .doc_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "document-guidance".to_string());

        let synthesizer =
            GuidanceSynthesizer::new(self.transport.clone(), self.config.retry, skill_name);

        let summary = match synthesizer.summarize(&docs, &level1, &level2, ranking).await {
            Ok(summary) => summary,
            Err(e) => {
                return Ok(RunOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };
        // Persisted before the guidance call so a guidance failure keeps it.
        manifest
            .artifacts
            .push(store.write_run_artifact(RunArtifact::Summary, &summary)?);

        match synthesizer.write_guidance(&summary).await {
            Ok(guidance) => {
                manifest
                    .artifacts
                    .push(store.write_run_artifact(RunArtifact::Guidance, &guidance)?);
                Ok(RunOutcome::Done)
            }
            Err(e) => Ok(RunOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-document state
// ---------------------------------------------------------------------------

/// Everything one document produced.
#[derive(Debug, Clone)]
struct DocumentResult {
    id: DocumentId,
    outcome: DocumentOutcome,
    level1: Option<Report>,
    level2: Option<Report>,
    card: Option<ScoreCard>,
}

impl DocumentResult {
    fn not_started(id: &DocumentId) -> Self {
        Self {
            id: id.clone(),
            outcome: DocumentOutcome::NotStarted,
            level1: None,
            level2: None,
            card: None,
        }
    }
}

/// A report and whether it came from a previous run.
struct StageReport {
    report: Report,
    reused: bool,
}

/// Shared, read-only state for document tasks.
struct DocumentContext {
    store: ArtifactStore,
    structural: ReportAnalyzer,
    semantic: ReportAnalyzer,
    reviewer: QualityReviewer,
    force: bool,
}

impl DocumentContext {
    #[instrument(skip_all, fields(document = %doc.id))]
    async fn process(&self, doc: &Document) -> DocumentResult {
        // Join: both levels run concurrently; the review waits for both.
        let (l1, l2) = tokio::join!(
            self.load_or_analyze(&self.structural, doc),
            self.load_or_analyze(&self.semantic, doc),
        );

        let (l1, l2) = match (l1, l2) {
            (Ok(l1), Ok(l2)) => (l1, l2),
            (l1, l2) => {
                let reason = [("level1", l1.as_ref().err()), ("level2", l2.as_ref().err())]
                    .into_iter()
                    .filter_map(|(level, err)| err.map(|e| format!("{level}: {e}")))
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(%reason, "reports missing, document will not be scored");
                return DocumentResult {
                    id: doc.id.clone(),
                    outcome: DocumentOutcome::ReportsMissing { reason },
                    level1: l1.ok().map(|s| s.report),
                    level2: l2.ok().map(|s| s.report),
                    card: None,
                };
            }
        };

        let reuse_score = l1.reused && l2.reused;
        let (outcome, card) = match self.load_or_score(doc, &l1.report, &l2.report, reuse_score).await {
            Ok(card) => {
                let composite = card.composite();
                info!(composite, "document scored");
                (DocumentOutcome::Scored { composite }, Some(card))
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "review failed, document is unscorable");
                (DocumentOutcome::Unscorable { reason: e.to_string() }, None)
            }
        };

        DocumentResult {
            id: doc.id.clone(),
            outcome,
            level1: Some(l1.report),
            level2: Some(l2.report),
            card,
        }
    }

    /// Read-before-write: reuse a stored report, otherwise analyze and persist it.
    async fn load_or_analyze(&self, analyzer: &ReportAnalyzer, doc: &Document) -> Result<StageReport> {
        let kind = ArtifactKind::from(analyzer.level());

        if !self.force {
            if let Some(text) = self.store.read_document(&doc.id, kind)? {
                debug!(level = %analyzer.level(), "reusing stored report");
                return Ok(StageReport {
                    report: Report {
                        document: doc.id.clone(),
                        level: analyzer.level(),
                        text,
                    },
                    reused: true,
                });
            }
        }

        let report = analyzer.analyze(doc).await?;
        self.store.write_document(&doc.id, kind, &report.text)?;
        Ok(StageReport {
            report,
            reused: false,
        })
    }

    /// Reuse a stored score only when both reports were reused too.
    async fn load_or_score(
        &self,
        doc: &Document,
        level1: &Report,
        level2: &Report,
        reuse: bool,
    ) -> Result<ScoreCard> {
        if reuse && !self.force {
            if let Some(content) = self.store.read_document(&doc.id, ArtifactKind::Score)? {
                match report::parse_score_file(&content) {
                    Ok(card) => {
                        debug!("reusing stored score");
                        return Ok(card);
                    }
                    Err(e) => warn!(error = %e, "stored score unreadable, re-reviewing"),
                }
            }
        }

        let card = self.reviewer.score(doc, level1, level2).await?;
        self.store.write_document(
            &doc.id,
            ArtifactKind::Score,
            &report::render_score_file(&doc.id, &card),
        )?;
        Ok(card)
    }
}
