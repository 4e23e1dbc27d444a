//! Markdown renderers for score files and the ranking table.
//!
//! A score file ends with a fenced JSON block holding the ScoreCard; the
//! resume path reads that block back with [`parse_score_file`].

use std::fmt::Write as _;

use docskill_shared::{DocSkillError, DocumentId, Result};

use crate::ranking::Ranking;
use crate::scoring::{self, Dimension, ScoreCard};

/// Render the per-document score file.
pub fn render_score_file(id: &DocumentId, card: &ScoreCard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Quality review: {id}\n");
    let _ = writeln!(out, "**Composite score: {:.1} / 100** (weighted, rounded to 0.5)\n", card.composite());
    out.push_str("| Dimension | Weight | Score | Rationale |\n");
    out.push_str("|---|---|---|---|\n");
    for s in card.scores() {
        let _ = writeln!(
            out,
            "| {} | {}% | {} | {} |",
            s.dimension.label(),
            s.dimension.weight_pct(),
            format_value(s.value),
            table_cell(&s.rationale),
        );
    }

    let json = serde_json::to_string_pretty(&card.to_json()).unwrap_or_else(|_| "{}".into());
    let _ = write!(out, "\n## Score data\n\n```json\n{json}\n```\n");
    out
}

/// Read the ScoreCard back out of a score file.
pub fn parse_score_file(content: &str) -> Result<ScoreCard> {
    let start = content
        .rfind("```json")
        .ok_or_else(|| DocSkillError::validation("score file has no JSON block"))?;
    let body = &content[start + "```json".len()..];
    let end = body
        .find("```")
        .ok_or_else(|| DocSkillError::validation("score file JSON block is not closed"))?;

    let value: serde_json::Value = serde_json::from_str(body[..end].trim())
        .map_err(|e| DocSkillError::validation(format!("invalid score JSON: {e}")))?;
    scoring::scorecard_from_json(&value)
}

/// Render `scores/ranking.md`.
pub fn render_ranking(ranking: &Ranking) -> String {
    let mut out = String::from("# Quality ranking\n\nDocuments sorted by composite score, highest first.\n\n");

    let abbrevs: Vec<&str> = Dimension::ALL.iter().map(|d| d.abbrev()).collect();
    let _ = writeln!(out, "| Rank | Document | {} | Composite |", abbrevs.join(" | "));
    let _ = writeln!(out, "|{}|", vec!["---"; Dimension::ALL.len() + 3].join("|"));

    for entry in &ranking.entries {
        let values: Vec<String> = entry.card.scores().iter().map(|s| format_value(s.value)).collect();
        let _ = writeln!(
            out,
            "| {} | {} | {} | **{:.1}** |",
            entry.rank,
            table_cell(entry.id.as_str()),
            values.join(" | "),
            entry.composite
        );
    }

    out.push_str("\nColumns: ");
    let legend: Vec<String> = Dimension::ALL
        .iter()
        .map(|d| format!("{} = {} ({}%)", d.abbrev(), d.label(), d.weight_pct()))
        .collect();
    out.push_str(&legend.join("; "));
    out.push('\n');

    if !ranking.unscored.is_empty() {
        out.push_str("\n## Unscored documents\n\n");
        for entry in &ranking.unscored {
            let _ = writeln!(out, "- {}: {}", entry.id, entry.reason);
        }
    }

    out
}

/// Integers print without a decimal point.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

fn table_cell(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{ScoreInput, rank};
    use crate::scoring::DimensionScore;

    fn card(values: [f64; 8]) -> ScoreCard {
        ScoreCard::new(
            Dimension::ALL
                .iter()
                .zip(values)
                .map(|(d, value)| DimensionScore {
                    dimension: *d,
                    value,
                    rationale: format!("why | {}\nsecond line", d.key()),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn score_file_roundtrips_through_json_block() {
        let id = DocumentId::from("guides/intro.md");
        let c = card([100.0, 0.0, 100.0, 0.0, 100.0, 0.0, 100.0, 0.0]);
        let rendered = render_score_file(&id, &c);

        assert!(rendered.contains("**Composite score: 55.0 / 100**"));
        assert!(rendered.contains("| Factual accuracy | 20% | 100 | why \\| factual_accuracy second line |"));
        assert_eq!(parse_score_file(&rendered).unwrap(), c);
    }

    #[test]
    fn parse_rejects_damaged_score_file() {
        assert!(parse_score_file("# Quality review\n\nno data").is_err());
        assert!(parse_score_file("```json\n{\"factual_accuracy\": 1}\n```").is_err());
        assert!(parse_score_file("```json\n{ not json").is_err());
    }

    #[test]
    fn ranking_table_lists_entries_and_unscored() {
        let ranking = rank(&[
            ScoreInput {
                id: DocumentId::from("a.md"),
                result: Ok(card([50.0; 8])),
            },
            ScoreInput {
                id: DocumentId::from("b.md"),
                result: Err("reports missing: level2 content rejected".into()),
            },
            ScoreInput {
                id: DocumentId::from("c.md"),
                result: Ok(card([80.5; 8])),
            },
        ]);
        let table = render_ranking(&ranking);

        assert!(table.contains("| Rank | Document | Fact | Src | Depth | Obj | Cov | Time | Clar | Insight | Composite |"));
        assert!(table.contains("|---|---|---|---|---|---|---|---|---|---|---|"));
        assert!(table.contains("| 1 | c.md | 80.5 | 80.5 | 80.5 | 80.5 | 80.5 | 80.5 | 80.5 | 80.5 | **80.5** |"));
        assert!(table.contains("| 2 | a.md | 50 | 50 | 50 | 50 | 50 | 50 | 50 | 50 | **50.0** |"));
        assert!(table.contains("## Unscored documents"));
        assert!(table.contains("- b.md: reports missing: level2 content rejected"));
    }
}
