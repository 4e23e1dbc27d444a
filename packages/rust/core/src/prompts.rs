//! Instruction text for every model call.
//!
//! The instructions are always the first part of the request; document
//! content and reports follow as separate parts.

use std::fmt::Write as _;

use crate::scoring::Dimension;

pub const STRUCTURAL: &str = "\
You are a document structure and style analyst. Produce a Level-1 specification of the \
document that follows: the surface-level writing conventions a writer would need to reproduce \
its form.

Cover these eight sections, each under a `##` heading:

## 1. Overall structure
Architecture (e.g. general-specific-general, progressive, parallel), section hierarchy, and how \
paragraphs relate.
## 2. Section planning
Typical section names, length and density, transitions between sections.
## 3. Argument development
How claims are introduced, supported and contrasted.
## 4. Evidence presentation
Kinds of evidence (data, cases, quotations, analogies), their order, and how they attach to claims.
## 5. Language style
Register and formality, sentence patterns, person and point of view.
## 6. Vocabulary
Domain terms, connectives and transition phrases, recurring qualifiers.
## 7. Rhetorical devices
Metaphor, analogy, parallelism, emphasis and hedging.
## 8. Citation practice
Citation format and placement, density, choice of sources.

Output the analysis directly, with no preamble.";

pub const SEMANTIC: &str = "\
You are an analyst of meta-logic and cognitive structure. Produce a Level-2 specification of \
the document that follows: the abstract thinking patterns underneath the text, independent of \
its surface form.

Cover these five sections, each under a `##` heading:

## 1. Concept construction
How core concepts are defined and decomposed, how they relate, how abstractions are made concrete.
## 2. Metaphor systems
Metaphor families in use, their role in the argument, patterns of reasoning by analogy.
## 3. Argument progression
Layers and depth of reasoning, movement between concrete and abstract, rebuttal and self-correction.
## 4. Choice of perspective
How multiple angles are introduced, the logic of switching between them, primary versus secondary views.
## 5. Analytical architecture
The overall cognitive frame (problem-solution, causal, comparative), the shape of the inference \
chain, and the path to conclusions.

Output the analysis directly, with no preamble.";

pub const SUMMARY: &str = "\
You extract writing conventions and meta-knowledge from a corpus. You are given, for every \
document in one directory, a Level-1 (structural/stylistic) analysis, a Level-2 (meta-logical) \
analysis, and a quality brief built from 8-dimension review scores (0-100, composite out of 100).

1. Focus on high-scoring material. Distil the core writing technique of the top-ranked \
exemplars, and take the best practice for each dimension from the document that scored \
highest on it. Give most weight to the dimensions with the highest corpus averages.
2. Find the features the documents share across the Level-1 and Level-2 dimensions. \
Lower-ranked documents still contribute structural observations but are not held up as models.
3. Group the shared features by dimension into a structured summary.
4. Turn the result into a practical guide for writing documents of this kind: structure, \
argument patterns, language and rhetoric, cognitive frameworks, and quality benchmarks \
drawn from the exemplars.

Format: Markdown, a single `#` title \"Writing conventions summary\", `##` headings per \
dimension. Mark explicitly which points come from top-ranked documents or high-scoring \
dimensions. Be concrete and actionable.";

pub const GUIDANCE: &str = "\
Convert the writing conventions summary that follows into an agent skill file (SKILL.md).

Requirements:
1. Start with YAML frontmatter:
   ---
   name: <lowercase-hyphenated-name, e.g. doc-writing-research-report>
   description: <one or two sentences saying what the skill does and when to use it>
   ---
2. The body is Markdown with: a `#` title, `## Structure`, `## Argument and evidence`, \
`## Language and rhetoric`, `## Thinking frameworks`, and `## Quality benchmarks` (give this \
section ample room; it carries the practice of the top-ranked documents).
3. Every section is written as executable guidance for a language model producing a new \
document of this kind.
4. Keep it concise and actionable.

Output the complete SKILL.md content only.";

/// Reviewer instructions. `strict` is used for the retry after a malformed answer.
pub fn review(strict: bool) -> String {
    let mut out = String::from(
        "You are a writing-quality reviewer. Using the source document, its Level-1 \
         (structural) analysis and its Level-2 (meta-logical) analysis that follow, score the \
         document independently on each of these eight dimensions, from 0 (worst) to 100 (best):\n\n",
    );

    for d in Dimension::ALL {
        let _ = writeln!(out, "- `{}`: {} (weight {}%)", d.key(), d.label(), d.weight_pct());
    }

    out.push_str(
        "\nAnchors: 0-20 pervasive problems; 40-60 broadly sound with clear gaps; 80-100 rigorous, \
         well sourced and insightful.\n\n\
         Give a one- or two-sentence rationale per dimension, then end with a fenced JSON block:\n\n\
         ```json\n{\n",
    );
    let lines: Vec<String> = Dimension::ALL
        .iter()
        .map(|d| format!("  \"{}\": {{\"score\": <0-100>, \"rationale\": \"...\"}}", d.key()))
        .collect();
    out.push_str(&lines.join(",\n"));
    out.push_str("\n}\n```\n");

    if strict {
        out.push_str(
            "\nYour previous answer could not be parsed. Respond with ONLY the fenced JSON block. \
             It must contain all eight keys exactly as written above, each with a numeric \
             `score` between 0 and 100. No other text.\n",
        );
    }

    out
}
