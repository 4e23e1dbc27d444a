//! Text preparation for analysis: HTML-to-Markdown conversion, cleanup, and
//! char-safe truncation.
//!
//! HTML documents are converted with the `htmd` crate after the page chrome
//! (nav, header, footer, scripts) is stripped; every text document then goes
//! through the same cleanup passes.

mod cleanup;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use docskill_shared::{DocSkillError, Result};

/// Marker appended when a text is cut to fit a model context window.
pub const TRUNCATION_MARKER: &str = "[... content truncated for model context window ...]";

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert an HTML document to clean Markdown.
///
/// 1. Extract the content container (`article`, `main`, `[role=main]`, or `<body>`)
/// 2. Rewrite `<table>` elements as Markdown tables
/// 3. Convert HTML → Markdown via `htmd`
/// 4. Run the cleanup passes
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn html_to_markdown(html: &str) -> Result<String> {
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let raw = converter
        .convert(&content_html)
        .map_err(|e| DocSkillError::Conversion(format!("htmd conversion failed: {e}")))?;

    let cleaned = cleanup::run_pipeline(&raw);
    debug!(raw_len = raw.len(), final_len = cleaned.len(), "html conversion complete");
    Ok(cleaned)
}

/// Normalize a plain-text document (line endings, trailing space, blank runs).
pub fn normalize_text(text: &str) -> String {
    cleanup::run_pipeline(text)
}

// ---------------------------------------------------------------------------
// Truncation and model-output helpers
// ---------------------------------------------------------------------------

/// Truncate `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was cut. Never splits a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            format!("{}\n\n{TRUNCATION_MARKER}", &text[..byte_idx])
        }
    }
}

/// Remove a code fence wrapping the whole text (models often answer
/// ```` ```markdown ... ``` ```` when asked for a file).
pub fn strip_outer_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body_start) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[body_start + 1..];
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

/// Extract the main content HTML, stripping page chrome.
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    let selectors = ["article", "main", "[role=\"main\"]", ".content", "body"];

    for sel_str in &selectors {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    html.to_string()
}

/// Rewrite HTML `<table>` elements as Markdown tables before conversion.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };

    let doc = Html::parse_fragment(html);
    let mut result = html.to_string();

    for table in doc.select(&table_sel) {
        let md_table = table_to_markdown(&table);
        result = result.replacen(&table.html(), &md_table, 1);
    }

    result
}

/// Convert one table element; the first row is treated as the header.
fn table_to_markdown(table: &ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return String::new();
    };

    let mut rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().replace('|', "\\|"))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }
    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");
    for (i, row) in rows.iter().enumerate() {
        md.push_str(&format!("| {} |\n", row.join(" | ")));
        if i == 0 {
            md.push_str(&format!("| {} |\n", vec!["---"; col_count].join(" | ")));
        }
    }
    md.push('\n');
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_simple_html() {
        let html = "<html><body><main><h1>Hello World</h1><p>Some text.</p></main></body></html>";
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("# Hello World"));
        assert!(md.contains("Some text."));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn convert_strips_chrome() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>Essay</h1><p>The argument.</p></main>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("The argument."));
        assert!(!md.contains("Copyright 2024"));
    }

    #[test]
    fn convert_preserves_tables() {
        let html = r#"<html><body><main>
            <table>
                <thead><tr><th>Metric</th><th>Value</th></tr></thead>
                <tbody><tr><td>growth</td><td>12%</td></tr></tbody>
            </table>
        </main></body></html>"#;
        let md = html_to_markdown(html).unwrap();
        assert!(md.contains("| Metric | Value |"));
        assert!(md.contains("| growth | 12% |"));
    }

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "写作规范".repeat(10);
        let result = truncate_chars(&text, 5);
        assert!(result.starts_with("写作规范写\n\n"));
        assert!(result.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn strip_outer_fence_variants() {
        assert_eq!(strip_outer_fence("```markdown\n# Skill\nbody\n```"), "# Skill\nbody");
        assert_eq!(strip_outer_fence("  # Plain  \n"), "# Plain");
        assert_eq!(strip_outer_fence("```\nunterminated"), "```\nunterminated");
    }
}
