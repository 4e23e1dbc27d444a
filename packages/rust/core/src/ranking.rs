//! Corpus-wide ranking of scored documents.

use docskill_shared::DocumentId;

use crate::scoring::{Dimension, ScoreCard};

/// Review result for one document, in enumeration order.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub id: DocumentId,
    /// The ScoreCard, or why the document has none.
    pub result: std::result::Result<ScoreCard, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    pub id: DocumentId,
    pub composite: f64,
    pub card: ScoreCard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnscoredEntry {
    pub id: DocumentId,
    pub reason: String,
}

/// Scored documents by descending composite, plus the ones left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub entries: Vec<RankedEntry>,
    pub unscored: Vec<UnscoredEntry>,
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of a document in the ranking, if scored.
    pub fn position(&self, id: &DocumentId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Corpus-wide mean per dimension, highest first (ties in canonical order).
    pub fn dimension_averages(&self) -> Vec<(Dimension, f64)> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let n = self.entries.len() as f64;
        let mut averages: Vec<(Dimension, f64)> = Dimension::ALL
            .iter()
            .map(|d| {
                let sum: f64 = self.entries.iter().map(|e| e.card.value(*d)).sum();
                (*d, sum / n)
            })
            .collect();
        averages.sort_by(|a, b| b.1.total_cmp(&a.1));
        averages
    }

    /// For each dimension, the highest-ranked document with the best value.
    pub fn best_per_dimension(&self) -> Vec<(Dimension, &RankedEntry)> {
        Dimension::ALL
            .iter()
            .filter_map(|d| {
                self.entries
                    .iter()
                    .reduce(|best, e| if e.card.value(*d) > best.card.value(*d) { e } else { best })
                    .map(|e| (*d, e))
            })
            .collect()
    }
}

/// Rank scored documents by composite, descending.
///
/// Equal composites keep their input (enumeration) order; documents without a
/// ScoreCard go to `unscored` in input order. Pure and idempotent.
pub fn rank(inputs: &[ScoreInput]) -> Ranking {
    let mut scored: Vec<(&DocumentId, &ScoreCard, f64)> = Vec::new();
    let mut unscored = Vec::new();

    for input in inputs {
        match &input.result {
            Ok(card) => scored.push((&input.id, card, card.composite())),
            Err(reason) => unscored.push(UnscoredEntry {
                id: input.id.clone(),
                reason: reason.clone(),
            }),
        }
    }

    // `sort_by` is stable, so ties stay in enumeration order.
    scored.sort_by(|a, b| b.2.total_cmp(&a.2));

    let entries = scored
        .into_iter()
        .enumerate()
        .map(|(i, (id, card, composite))| RankedEntry {
            rank: i + 1,
            id: id.clone(),
            composite,
            card: card.clone(),
        })
        .collect();

    Ranking { entries, unscored }
}
