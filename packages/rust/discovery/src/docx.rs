//! Paragraph text extraction for Word (`.docx`) documents.

use std::io::Read;
use std::path::Path;

use docskill_shared::{DocSkillError, Result};
use roxmltree::{Document, Node};
use zip::ZipArchive;

const BODY_PART: &str = "word/document.xml";
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Read the main document part and return its paragraphs, one per block.
pub(crate) fn extract_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| DocSkillError::io(path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| DocSkillError::Conversion(format!("not a docx archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(BODY_PART)
        .map_err(|e| DocSkillError::Conversion(format!("missing {BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DocSkillError::io(path, e))?;

    paragraphs_from_xml(&xml)
}

fn paragraphs_from_xml(xml: &str) -> Result<String> {
    let doc = Document::parse(xml)
        .map_err(|e| DocSkillError::Conversion(format!("invalid {BODY_PART}: {e}")))?;

    let paragraphs: Vec<String> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(paragraph_text)
        .collect();

    Ok(paragraphs.join("\n\n"))
}

fn paragraph_text(paragraph: Node) -> String {
    let mut out = String::new();
    for node in paragraph.descendants() {
        if node.has_tag_name((W_NS, "t")) {
            out.push_str(node.text().unwrap_or_default());
        } else if node.has_tag_name((W_NS, "tab")) {
            out.push('\t');
        } else if node.has_tag_name((W_NS, "br")) {
            out.push('\n');
        }
    }
    out
}
