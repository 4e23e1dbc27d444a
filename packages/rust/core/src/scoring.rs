//! The 8-dimension quality model: dimensions, weights, ScoreCards, and the
//! composite-score arithmetic.
//!
//! Everything here is pure. Parsing accepts the JSON shape the reviewer is
//! asked to produce (also used inside score files):
//!
//! ```json
//! { "factual_accuracy": { "score": 85, "rationale": "..." }, ... }
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use docskill_shared::{DocSkillError, Result};

/// Lowest and highest accepted dimension values.
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// One of the eight fixed review dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    FactualAccuracy,
    SourceCredibility,
    LogicalRigor,
    Objectivity,
    Comprehensiveness,
    Timeliness,
    Clarity,
    PracticalValue,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Dimension; 8] = [
        Self::FactualAccuracy,
        Self::SourceCredibility,
        Self::LogicalRigor,
        Self::Objectivity,
        Self::Comprehensiveness,
        Self::Timeliness,
        Self::Clarity,
        Self::PracticalValue,
    ];

    /// Weight in whole percent; the eight weights sum to 100.
    pub fn weight_pct(self) -> u32 {
        match self {
            Self::FactualAccuracy => 20,
            Self::SourceCredibility => 15,
            Self::LogicalRigor => 20,
            Self::Objectivity => 15,
            Self::Comprehensiveness => 10,
            Self::Timeliness => 10,
            Self::Clarity => 5,
            Self::PracticalValue => 5,
        }
    }

    /// JSON key used in reviewer responses and score files.
    pub fn key(self) -> &'static str {
        match self {
            Self::FactualAccuracy => "factual_accuracy",
            Self::SourceCredibility => "source_credibility",
            Self::LogicalRigor => "logical_rigor",
            Self::Objectivity => "objectivity",
            Self::Comprehensiveness => "comprehensiveness",
            Self::Timeliness => "timeliness",
            Self::Clarity => "clarity",
            Self::PracticalValue => "practical_value",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FactualAccuracy => "Factual accuracy",
            Self::SourceCredibility => "Source credibility",
            Self::LogicalRigor => "Depth & logical rigor",
            Self::Objectivity => "Objectivity & bias control",
            Self::Comprehensiveness => "Comprehensiveness & coverage",
            Self::Timeliness => "Timeliness & forward-looking value",
            Self::Clarity => "Clarity & structure",
            Self::PracticalValue => "Practical value & insight",
        }
    }

    /// Column header in the ranking table.
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::FactualAccuracy => "Fact",
            Self::SourceCredibility => "Src",
            Self::LogicalRigor => "Depth",
            Self::Objectivity => "Obj",
            Self::Comprehensiveness => "Cov",
            Self::Timeliness => "Time",
            Self::Clarity => "Clar",
            Self::PracticalValue => "Insight",
        }
    }

    /// Look a dimension up by key, tolerating case, spaces and dashes.
    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        Self::ALL.into_iter().find(|d| d.key() == normalized)
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ScoreCard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Value in `[0, 100]`.
    pub value: f64,
    pub rationale: String,
}

/// Exactly one score per dimension, held in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    scores: Vec<DimensionScore>,
}

impl ScoreCard {
    /// Validate and order a set of dimension scores.
    ///
    /// Fails with `MalformedResponse` when a dimension is missing or repeated,
    /// or a value is outside `[0, 100]`.
    pub fn new(mut scores: Vec<DimensionScore>) -> Result<Self> {
        for score in &scores {
            if !score.value.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score.value) {
                return Err(DocSkillError::malformed(format!(
                    "{} score {} is outside [0, 100]",
                    score.dimension.key(),
                    score.value
                )));
            }
        }

        scores.sort_by_key(|s| s.dimension);
        for (expected, score) in Dimension::ALL.iter().zip(&scores) {
            if *expected != score.dimension {
                return Err(DocSkillError::malformed(format!(
                    "missing or duplicated dimension near {}",
                    expected.key()
                )));
            }
        }
        if scores.len() != Dimension::ALL.len() {
            return Err(DocSkillError::malformed(format!(
                "expected {} dimension scores, got {}",
                Dimension::ALL.len(),
                scores.len()
            )));
        }

        Ok(Self { scores })
    }

    pub fn scores(&self) -> &[DimensionScore] {
        &self.scores
    }

    pub fn value(&self, dimension: Dimension) -> f64 {
        self.scores
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| s.value)
            .unwrap_or(0.0)
    }

    /// Weighted composite rounded to the nearest 0.5, halves rounding up.
    pub fn composite(&self) -> f64 {
        let values: Vec<f64> = self.scores.iter().map(|s| s.value).collect();
        composite_of(&values)
    }

    /// The JSON form (`{ key: { score, rationale } }`).
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for s in &self.scores {
            map.insert(
                s.dimension.key().to_string(),
                serde_json::json!({ "score": s.value, "rationale": s.rationale }),
            );
        }
        Value::Object(map)
    }
}

/// Composite of eight values given in canonical dimension order.
///
/// The weighted sum is taken in whole-percent units so integer inputs stay exact,
/// then rounded half-up to 0.5 granularity.
pub fn composite_of(values: &[f64]) -> f64 {
    let weighted: f64 = Dimension::ALL
        .iter()
        .zip(values)
        .map(|(d, v)| v * f64::from(d.weight_pct()))
        .sum();
    // weighted / 100 gives the composite; doubling it gives half-point units.
    let halves = (weighted / 50.0 + 0.5).floor();
    (halves / 2.0).clamp(MIN_SCORE, MAX_SCORE)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a reviewer response (or score-file block) into a ScoreCard.
///
/// Prefers a fenced ```` ```json ```` block, then the outermost `{...}` span,
/// then `key: value` lines. Anything that does not yield all eight in-range
/// values is `MalformedResponse`.
pub fn parse_scorecard(raw: &str) -> Result<ScoreCard> {
    if let Some(json) = extract_json_object(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(json) {
            return scorecard_from_json(&value);
        }
    }
    parse_score_lines(raw)
}

/// Build a ScoreCard from the JSON object form.
pub fn scorecard_from_json(value: &Value) -> Result<ScoreCard> {
    let obj = value
        .as_object()
        .ok_or_else(|| DocSkillError::malformed("score block is not a JSON object"))?;
    // Some models wrap the dimensions in a "scores" object.
    let obj = match obj.get("scores").and_then(Value::as_object) {
        Some(inner) => inner,
        None => obj,
    };

    let mut scores = Vec::with_capacity(Dimension::ALL.len());
    for (key, entry) in obj {
        let Some(dimension) = Dimension::from_key(key) else {
            continue;
        };
        let (value, rationale) = match entry {
            Value::Object(fields) => (
                fields.get("score").and_then(number_of),
                fields
                    .get("rationale")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            other => (number_of(other), String::new()),
        };
        let value = value.ok_or_else(|| {
            DocSkillError::malformed(format!("{key} has no numeric score"))
        })?;
        scores.push(DimensionScore {
            dimension,
            value,
            rationale,
        });
    }

    ScoreCard::new(scores)
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The JSON text of the last fenced json block, or the outermost brace span.
fn extract_json_object(raw: &str) -> Option<&str> {
    static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n(\{.*?\})\s*```").expect("valid regex")
    });

    if let Some(caps) = FENCED_JSON_RE.captures_iter(raw).last() {
        return caps.get(1).map(|m| m.as_str());
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Fallback: `factual_accuracy: 85` style lines (keys or labels, optional bullets).
fn parse_score_lines(raw: &str) -> Result<ScoreCard> {
    static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[\s\-*#|]*\**([A-Za-z][A-Za-z &_\-]*?)\**\s*[:=|]\s*\**(-?\d+(?:\.\d+)?)")
            .expect("valid regex")
    });

    let mut scores: Vec<DimensionScore> = Vec::new();
    for line in raw.lines() {
        let Some(caps) = LINE_RE.captures(line) else {
            continue;
        };
        let name = &caps[1];
        let dimension = Dimension::from_key(name).or_else(|| {
            Dimension::ALL
                .into_iter()
                .find(|d| d.label().eq_ignore_ascii_case(name.trim()))
        });
        let (Some(dimension), Ok(value)) = (dimension, caps[2].parse::<f64>()) else {
            continue;
        };
        if scores.iter().any(|s| s.dimension == dimension) {
            continue;
        }
        scores.push(DimensionScore {
            dimension,
            value,
            rationale: String::new(),
        });
    }

    if scores.is_empty() {
        return Err(DocSkillError::malformed("response contains no score block"));
    }
    ScoreCard::new(scores)
}
