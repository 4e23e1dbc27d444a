//! Cross-document synthesis: summary report, then the SKILL.md guidance file.
//!
//! The summary call sees every available Level-1 and Level-2 report, ordered
//! by ranking, plus a quality brief that names the exemplars and the strongest
//! dimensions. The guidance call converts that summary into SKILL.md.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, instrument};

use docskill_shared::{
    ContentPart, DocSkillError, Document, DocumentId, ModelTransport, PromptSpec, Report,
    ReportLevel, Result, RetryPolicy, Stage,
};

use crate::agents::call_with_retry;
use crate::prompts;
use crate::ranking::Ranking;

/// Cap for each merged report set, in chars.
pub const MERGED_REPORTS_MAX_CHARS: usize = 100_000;
/// Cap for the summary fed to the guidance call, in chars.
pub const SUMMARY_MAX_CHARS: usize = 80_000;
/// Number of top-ranked documents presented as exemplars.
pub const DEFAULT_EXEMPLARS: usize = 3;

const MAX_SKILL_NAME_CHARS: usize = 64;
const MAX_SKILL_DESCRIPTION_CHARS: usize = 1024;

pub struct GuidanceSynthesizer {
    transport: Arc<dyn ModelTransport>,
    retry: RetryPolicy,
    exemplars: usize,
    skill_name: String,
}

impl GuidanceSynthesizer {
    /// `skill_name` is used when the model's SKILL.md lacks frontmatter.
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        retry: RetryPolicy,
        skill_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            retry,
            exemplars: DEFAULT_EXEMPLARS,
            skill_name: skill_name.into(),
        }
    }

    /// Produce the cross-document summary report.
    ///
    /// Any failure is returned as [`DocSkillError::Synthesis`].
    #[instrument(skip_all, fields(documents = documents.len(), ranked = ranking.entries.len()))]
    pub async fn summarize(
        &self,
        documents: &[Document],
        level1: &[Report],
        level2: &[Report],
        ranking: &Ranking,
    ) -> Result<String> {
        let order = report_order(documents, ranking);
        let l1_merged = merge_reports(&order, level1, ranking, ReportLevel::Level1);
        let l2_merged = merge_reports(&order, level2, ranking, ReportLevel::Level2);
        let brief = quality_brief(ranking, documents.len(), self.exemplars);

        let content = vec![
            ContentPart::text(format!("# Level-1 analyses\n\n{l1_merged}")),
            ContentPart::text(format!("# Level-2 analyses\n\n{l2_merged}")),
            ContentPart::text(brief),
        ];
        let prompt = PromptSpec::new(Stage::Summary, prompts::SUMMARY);
        let summary = call_with_retry(self.transport.as_ref(), &prompt, &content, &self.retry)
            .await
            .map_err(|e| DocSkillError::Synthesis(format!("summary: {e}")))?;
        info!(chars = summary.len(), "summary report produced");
        Ok(summary)
    }

    /// Turn a summary report into the SKILL.md guidance artifact.
    #[instrument(skip_all, fields(summary_chars = summary.len()))]
    pub async fn write_guidance(&self, summary: &str) -> Result<String> {
        let content = vec![ContentPart::text(docskill_markdown::truncate_chars(
            summary,
            SUMMARY_MAX_CHARS,
        ))];
        let prompt = PromptSpec::new(Stage::Guidance, prompts::GUIDANCE);
        let raw = call_with_retry(self.transport.as_ref(), &prompt, &content, &self.retry)
            .await
            .map_err(|e| DocSkillError::Synthesis(format!("guidance: {e}")))?;

        let guidance = normalize_skill(&raw, &self.skill_name, summary);
        info!(chars = guidance.len(), "guidance artifact produced");
        Ok(guidance)
    }
}

// ---------------------------------------------------------------------------
// Brief and report merging (pure)
// ---------------------------------------------------------------------------

/// Ranked documents first (by rank), then the rest in enumeration order.
fn report_order(documents: &[Document], ranking: &Ranking) -> Vec<DocumentId> {
    let mut order: Vec<DocumentId> = ranking.entries.iter().map(|e| e.id.clone()).collect();
    for doc in documents {
        if !order.contains(&doc.id) {
            order.push(doc.id.clone());
        }
    }
    order
}

fn merge_reports(
    order: &[DocumentId],
    reports: &[Report],
    ranking: &Ranking,
    level: ReportLevel,
) -> String {
    let sections: Vec<String> = order
        .iter()
        .filter_map(|id| {
            let report = reports.iter().find(|r| &r.document == id && r.level == level)?;
            let standing = match ranking.position(id) {
                Some(i) => format!(
                    "rank {}, composite {:.1}",
                    ranking.entries[i].rank, ranking.entries[i].composite
                ),
                None => "unscored".to_string(),
            };
            Some(format!("## Document: {id} ({standing})\n\n{}", report.text.trim()))
        })
        .collect();

    docskill_markdown::truncate_chars(&sections.join("\n\n---\n\n"), MERGED_REPORTS_MAX_CHARS)
}

/// A Markdown brief telling the summarizer what to foreground.
pub fn quality_brief(ranking: &Ranking, total_documents: usize, exemplars: usize) -> String {
    let mut out = String::from("# Quality brief\n\n");
    let _ = writeln!(
        out,
        "Scored documents: {} of {}.\n",
        ranking.entries.len(),
        total_documents
    );

    out.push_str("## Top-ranked exemplars\n\n");
    for entry in ranking.entries.iter().take(exemplars) {
        let mut dims: Vec<_> = entry.card.scores().iter().collect();
        dims.sort_by(|a, b| b.value.total_cmp(&a.value));
        let strongest: Vec<&str> = dims.iter().take(2).map(|s| s.dimension.label()).collect();
        let _ = writeln!(
            out,
            "{}. {} (composite {:.1}; strongest: {})",
            entry.rank,
            entry.id,
            entry.composite,
            strongest.join(", ")
        );
    }

    out.push_str("\n## Dimension averages (highest first)\n\n");
    for (dimension, avg) in ranking.dimension_averages() {
        let _ = writeln!(
            out,
            "- {} (weight {}%): {:.1}",
            dimension.label(),
            dimension.weight_pct(),
            avg
        );
    }

    out.push_str("\n## Best document per dimension\n\n");
    for (dimension, entry) in ranking.best_per_dimension() {
        let _ = writeln!(
            out,
            "- {}: {} ({})",
            dimension.label(),
            entry.id,
            entry.card.value(dimension)
        );
    }

    out.push_str("\n## Full ranking\n\n");
    for entry in &ranking.entries {
        let values: Vec<String> = entry.card.scores().iter().map(|s| s.value.to_string()).collect();
        let _ = writeln!(
            out,
            "- {}: {} | composite {:.1}",
            entry.id,
            values.join(" | "),
            entry.composite
        );
    }

    if !ranking.unscored.is_empty() {
        out.push_str("\n## Unscored (structural observations only)\n\n");
        for entry in &ranking.unscored {
            let _ = writeln!(out, "- {}", entry.id);
        }
    }

    out
}

// ---------------------------------------------------------------------------
// SKILL.md normalisation
// ---------------------------------------------------------------------------

/// Strip a wrapping fence and make sure the file opens with YAML frontmatter.
pub fn normalize_skill(raw: &str, fallback_name: &str, summary: &str) -> String {
    let body = docskill_markdown::strip_outer_fence(raw);

    if has_frontmatter(body) {
        return format!("{body}\n");
    }

    let name = sanitize_skill_name(fallback_name);
    let description = sanitize_description(&first_paragraph(summary).unwrap_or_else(|| {
        format!("Writing guidance distilled from the {fallback_name} document corpus.")
    }));
    let description = description.replace('\\', "\\\\").replace('"', "\\\"");

    format!("---\nname: {name}\ndescription: \"{description}\"\n---\n\n{body}\n")
}

fn has_frontmatter(text: &str) -> bool {
    text.strip_prefix("---")
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
        .is_some_and(|rest| rest.lines().any(|line| line.trim_end() == "---"))
}

/// Lowercase, `[a-z0-9-]` only, single dashes, at most 64 chars.
pub fn sanitize_skill_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    let collapsed = mapped
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let truncated: String = collapsed.chars().take(MAX_SKILL_NAME_CHARS).collect();
    let trimmed = truncated.trim_matches('-');

    if trimmed.is_empty() {
        "unnamed-skill".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Collapse whitespace and cap at 1024 chars.
pub fn sanitize_description(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(MAX_SKILL_DESCRIPTION_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// The first non-heading paragraph of a Markdown text.
fn first_paragraph(text: &str) -> Option<String> {
    text.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#') && !p.starts_with("---"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{ScoreInput, rank};
    use crate::scoring::parse_scorecard;
    use crate::testing::{ScriptedTransport, sample_review, text_document};

    fn ranking_of(values: &[(&str, Option<f64>)]) -> Ranking {
        let inputs: Vec<ScoreInput> = values
            .iter()
            .map(|(id, v)| ScoreInput {
                id: DocumentId::from(*id),
                result: match v {
                    Some(v) => Ok(parse_scorecard(&sample_review([*v; 8])).unwrap()),
                    None => Err("reports missing".into()),
                },
            })
            .collect();
        rank(&inputs)
    }

    fn report(id: &str, level: ReportLevel, text: &str) -> Report {
        Report {
            document: DocumentId::from(id),
            level,
            text: text.into(),
        }
    }

    #[test]
    fn skill_name_sanitization() {
        assert_eq!(sanitize_skill_name("Research Reports (2024)"), "research-reports-2024");
        assert_eq!(sanitize_skill_name("--__--"), "unnamed-skill");
        assert_eq!(sanitize_skill_name("研究"), "unnamed-skill");
        assert_eq!(sanitize_skill_name(&"a".repeat(100)).len(), 64);
    }

    #[test]
    fn description_sanitization() {
        assert_eq!(sanitize_description("  Use\n\nwhen   writing  "), "Use when writing");
        assert_eq!(sanitize_description(&"x ".repeat(2000)).chars().count(), 1023);
    }

    #[test]
    fn normalize_keeps_existing_frontmatter() {
        let raw = "```markdown\n---\nname: memo-writing\ndescription: Memos.\n---\n\n# Memo\n```";
        let skill = normalize_skill(raw, "docs", "summary");
        assert_eq!(skill, "---\nname: memo-writing\ndescription: Memos.\n---\n\n# Memo\n");
    }

    #[test]
    fn normalize_adds_missing_frontmatter() {
        let summary = "# Writing conventions summary\n\nReports lead with a \"thesis\"\nand then evidence.\n\n## Structure";
        let skill = normalize_skill("# Guide\n\nDo this.", "Quarterly Reports", summary);
        assert!(skill.starts_with(
            "---\nname: quarterly-reports\ndescription: \"Reports lead with a \\\"thesis\\\" and then evidence.\"\n---\n\n# Guide"
        ));
    }

    #[test]
    fn brief_foregrounds_top_documents() {
        let ranking = ranking_of(&[("low.md", Some(40.0)), ("gone.md", None), ("top.md", Some(90.0))]);
        let brief = quality_brief(&ranking, 3, 1);

        assert!(brief.contains("Scored documents: 2 of 3."));
        assert!(brief.contains("1. top.md (composite 90.0"));
        assert!(!brief.contains("2. low.md"));
        assert!(brief.contains("- low.md: 40 | 40"));
        assert!(brief.contains("## Unscored (structural observations only)\n\n- gone.md"));
    }

    #[test]
    fn reports_merge_in_rank_order_including_unscored() {
        let ranking = ranking_of(&[("a.md", Some(50.0)), ("b.md", None), ("c.md", Some(90.0))]);
        let docs = vec![
            text_document("a.md", "A"),
            text_document("b.md", "B"),
            text_document("c.md", "C"),
        ];
        let order = report_order(&docs, &ranking);
        let reports = vec![
            report("a.md", ReportLevel::Level1, "alpha"),
            report("b.md", ReportLevel::Level1, "beta"),
            report("c.md", ReportLevel::Level1, "gamma"),
        ];
        let merged = merge_reports(&order, &reports, &ranking, ReportLevel::Level1);

        let c = merged.find("gamma").unwrap();
        let a = merged.find("alpha").unwrap();
        let b = merged.find("beta").unwrap();
        assert!(c < a && a < b);
        assert!(merged.contains("## Document: c.md (rank 1, composite 90.0)"));
        assert!(merged.contains("## Document: b.md (unscored)"));
    }

    #[tokio::test]
    async fn summary_then_guidance() {
        let transport = ScriptedTransport::new();
        transport.push(Stage::Summary, Ok("# Writing conventions summary\n\nBe direct.".into()));
        transport.push(Stage::Guidance, Ok("# Skill body".into()));

        let docs = vec![text_document("a.md", "A")];
        let ranking = ranking_of(&[("a.md", Some(80.0))]);
        let synthesizer =
            GuidanceSynthesizer::new(transport.clone(), RetryPolicy::immediate(1), "essays");
        let summary = synthesizer
            .summarize(
                &docs,
                &[report("a.md", ReportLevel::Level1, "l1 text")],
                &[report("a.md", ReportLevel::Level2, "l2 text")],
                &ranking,
            )
            .await
            .unwrap();
        let guidance = synthesizer.write_guidance(&summary).await.unwrap();

        assert!(summary.contains("Be direct."));
        assert!(guidance.starts_with("---\nname: essays\ndescription: \"Be direct.\"\n---"));
        let summary_request = transport.last_request(Stage::Summary).unwrap();
        assert!(summary_request.contains("l1 text"));
        assert!(summary_request.contains("l2 text"));
        assert!(summary_request.contains("# Quality brief"));
        assert_eq!(
            transport.last_request(Stage::Guidance).unwrap(),
            "# Writing conventions summary\n\nBe direct."
        );
    }

    #[tokio::test]
    async fn summary_failure_is_a_synthesis_error() {
        let transport = ScriptedTransport::new();
        transport.push(Stage::Summary, Err(DocSkillError::rejected("too long")));

        let synthesizer =
            GuidanceSynthesizer::new(transport.clone(), RetryPolicy::immediate(3), "essays");
        let err = synthesizer
            .summarize(&[], &[], &[], &Ranking::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocSkillError::Synthesis(_)));
        assert_eq!(transport.calls(Stage::Summary), 1);
    }

    #[tokio::test]
    async fn guidance_failure_is_a_synthesis_error() {
        let transport = ScriptedTransport::new();
        transport.push(Stage::Guidance, Err(DocSkillError::rejected("refused")));

        let synthesizer =
            GuidanceSynthesizer::new(transport.clone(), RetryPolicy::immediate(3), "essays");
        let err = synthesizer.write_guidance("# Summary").await.unwrap_err();

        assert!(matches!(err, DocSkillError::Synthesis(ref m) if m.starts_with("guidance:")));
    }
}
