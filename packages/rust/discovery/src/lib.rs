//! Document discovery: enumerate the analyzable documents in a directory.
//!
//! Text-like formats are read, normalized (HTML is converted to Markdown,
//! Word paragraphs are extracted) and truncated to fit a model context window. Images and PDFs are not read here;
//! they become a [`MediaRef`] that the transport inlines at call time.
//!
//! Unsupported files, empty documents and unreadable files are skipped and
//! reported back instead of failing the whole listing.

use std::path::{Path, PathBuf};

use docskill_shared::{
    ContentPart, DocSkillError, Document, DocumentContent, DocumentFormat, DocumentId, MediaRef,
    Result,
};
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

mod docx;

/// Default truncation limit for text documents, in chars.
pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 120_000;

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Configuration for a listing.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Directory never descended into (the run's own output directory).
    pub exclude_dir: Option<PathBuf>,
    /// Text documents longer than this are truncated.
    pub max_document_chars: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            exclude_dir: None,
            max_document_chars: DEFAULT_MAX_DOCUMENT_CHARS,
        }
    }
}

/// Why a file was left out of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The extension is not one of the supported formats.
    UnsupportedFormat,
    /// The document has no analyzable content.
    Empty,
    /// The file could not be read or converted.
    Unreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat => f.write_str("unsupported format"),
            Self::Empty => f.write_str("empty document"),
            Self::Unreadable(reason) => write!(f, "unreadable: {reason}"),
        }
    }
}

/// A file that was found but not turned into a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path relative to the listed directory.
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// The result of listing a directory.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Documents in enumeration order (sorted by identity).
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// List every analyzable document under `dir`, recursively.
///
/// Hidden files and directories are ignored, as is `opts.exclude_dir`. The
/// returned documents are sorted by identity so enumeration order is stable
/// across runs.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn list_documents(dir: &Path, opts: &ListOptions) -> Result<Listing> {
    if !dir.is_dir() {
        return Err(DocSkillError::validation(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let root = dir.canonicalize().map_err(|e| DocSkillError::io(dir, e))?;
    let exclude = opts
        .exclude_dir
        .as_ref()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()));

    let mut listing = Listing::default();

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(is_hidden(entry) || exclude.as_deref().is_some_and(|ex| entry.path() == ex))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());

        match load_document(entry.path(), &relative, opts.max_document_chars) {
            Ok(doc) => {
                debug!(id = %doc.id, format = ?doc.format, "document loaded");
                listing.documents.push(doc);
            }
            Err(reason) => {
                warn!(path = %relative.display(), %reason, "skipping file");
                listing.skipped.push(SkippedFile {
                    path: relative,
                    reason,
                });
            }
        }
    }

    listing.documents.sort_by(|a, b| a.id.cmp(&b.id));

    info!(
        documents = listing.documents.len(),
        skipped = listing.skipped.len(),
        "document listing complete"
    );

    Ok(listing)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Resolve one file into a document, or the reason it was skipped.
fn load_document(
    path: &Path,
    relative: &Path,
    max_chars: usize,
) -> std::result::Result<Document, SkipReason> {
    let format = DocumentFormat::from_path(path).ok_or(SkipReason::UnsupportedFormat)?;
    let id = DocumentId::from_relative(relative);

    if let Some(mime) = format.mime_type() {
        let meta = std::fs::metadata(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        if meta.len() == 0 {
            return Err(SkipReason::Empty);
        }
        let media = MediaRef {
            path: path.to_path_buf(),
            mime_type: mime.to_string(),
        };
        return Ok(Document {
            id,
            format,
            content: DocumentContent::Parts(vec![ContentPart::Media { media }]),
        });
    }

    let text = match format {
        DocumentFormat::Docx => docx::extract_text(path)
            .map(|raw| docskill_markdown::normalize_text(&raw))
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?,
        _ => {
            let bytes = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
            let raw = String::from_utf8_lossy(&bytes);
            match format {
                DocumentFormat::Html => docskill_markdown::html_to_markdown(&raw)
                    .map_err(|e| SkipReason::Unreadable(e.to_string()))?,
                _ => docskill_markdown::normalize_text(&raw),
            }
        }
    };

    if text.trim().is_empty() {
        return Err(SkipReason::Empty);
    }

    Ok(Document {
        id,
        format,
        content: DocumentContent::Text(docskill_markdown::truncate_chars(&text, max_chars)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docskill-discovery-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn lists_supported_documents_in_order() {
        let root = temp_dir();
        write(&root, "b.txt", b"plain notes\r\nsecond line");
        write(&root, "a.md", b"# Essay\n\nBody.");
        write(&root, "sub/c.html", b"<html><body><main><h1>Page</h1></main></body></html>");
        write(&root, "d.pdf", b"%PDF-1.4 fake");
        write(&root, "e.docx", b"binary");
        write(&root, "f.odt", b"binary");
        write(&root, "empty.md", b"  \n\n");
        write(&root, ".hidden/x.md", b"# Hidden");
        write(&root, "_analysis/level1/y_L1.md", b"# Old report");

        let opts = ListOptions {
            exclude_dir: Some(root.join("_analysis")),
            ..ListOptions::default()
        };
        let listing = list_documents(&root, &opts).unwrap();

        let ids: Vec<&str> = listing.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt", "d.pdf", "sub/c.html"]);

        let html = &listing.documents[3];
        assert_eq!(html.format, DocumentFormat::Html);
        assert!(html.content.as_text().unwrap().contains("# Page"));

        let txt = &listing.documents[1];
        assert_eq!(txt.content.as_text(), Some("plain notes\nsecond line\n"));

        let pdf = &listing.documents[2];
        match &pdf.content {
            DocumentContent::Parts(parts) => match &parts[0] {
                ContentPart::Media { media } => assert_eq!(media.mime_type, "application/pdf"),
                other => panic!("expected media part, got {other:?}"),
            },
            other => panic!("expected parts, got {other:?}"),
        }

        assert!(listing.skipped.contains(&SkippedFile {
            path: PathBuf::from("f.odt"),
            reason: SkipReason::UnsupportedFormat,
        }));
        assert!(
            listing
                .skipped
                .iter()
                .any(|s| s.path == Path::new("e.docx") && matches!(s.reason, SkipReason::Unreadable(_)))
        );
        assert!(listing.skipped.contains(&SkippedFile {
            path: PathBuf::from("empty.md"),
            reason: SkipReason::Empty,
        }));
        assert_eq!(listing.skipped.len(), 3);

        std::fs::remove_dir_all(&root).ok();
    }

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_become_text() {
        let root = temp_dir();
        write(
            &root,
            "memo.docx",
            &docx_bytes(&["Quarterly memo", "Revenue grew 12%.", "Next steps follow."]),
        );

        let listing = list_documents(&root, &ListOptions::default()).unwrap();

        assert_eq!(listing.documents.len(), 1);
        let doc = &listing.documents[0];
        assert_eq!(doc.id.as_str(), "memo.docx");
        assert_eq!(doc.format, DocumentFormat::Docx);
        let text = doc.content.as_text().unwrap();
        assert!(text.contains("Quarterly memo\n\nRevenue grew 12%.\n\nNext steps follow."));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn long_text_is_truncated() {
        let root = temp_dir();
        write(&root, "long.md", "x".repeat(500).as_bytes());

        let opts = ListOptions {
            exclude_dir: None,
            max_document_chars: 100,
        };
        let listing = list_documents(&root, &opts).unwrap();
        let text = listing.documents[0].content.as_text().unwrap();
        assert!(text.starts_with(&"x".repeat(100)));
        assert!(text.ends_with(docskill_markdown::TRUNCATION_MARKER));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_directory_is_an_error() {
        let missing = std::env::temp_dir().join(format!("docskill-missing-{}", uuid::Uuid::now_v7()));
        let err = list_documents(&missing, &ListOptions::default()).unwrap_err();
        assert!(matches!(err, DocSkillError::Validation { .. }));
    }
}
