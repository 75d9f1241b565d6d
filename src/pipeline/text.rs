//! Text line stream: per-page ordered lines from a PDF or a text export.
//!
//! ## Why keep page boundaries?
//!
//! A rider window never crosses a page break: the segmenter restarts at the
//! table start of every page, and a short tail at the bottom of a page is
//! the end of that page's data, not the first half of a rider. The stream
//! therefore stays grouped by page even though it reads in one sequence.
//!
//! ## Why drop blank lines?
//!
//! Field offsets count printed lines. pdfium never emits blank lines between
//! cells, but `pdftotext` exports do; removing them makes both backends agree
//! on every offset.

use crate::config::PageSelection;
use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Page separator in `pdftotext`-style exports.
pub const PAGE_BREAK: char = '\x0c';

/// One line of text with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// 0-indexed page.
    pub page: usize,
    /// 0-indexed position within the page.
    pub index: usize,
    pub text: &'a str,
}

/// The ordered, trimmed, non-empty lines of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLines {
    /// 0-indexed page number in the source document.
    pub page: usize,
    pub lines: Vec<String>,
}

impl PageLines {
    pub fn new(page: usize, text: &str) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self { page, lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn raw_lines(&self) -> impl Iterator<Item = RawLine<'_>> {
        self.lines.iter().enumerate().map(move |(index, text)| RawLine {
            page: self.page,
            index,
            text,
        })
    }

    /// Index of the first line containing `marker`.
    pub fn find(&self, marker: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.contains(marker))
    }
}

/// All selected pages of one document, in page order.
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    pub pages: Vec<PageLines>,
    /// Page count of the whole source, before selection.
    pub total_pages: usize,
    pub title: Option<String>,
    pub producer: Option<String>,
}

impl TextDocument {
    /// The document as one line sequence, page boundaries kept on each line.
    pub fn raw_lines(&self) -> impl Iterator<Item = RawLine<'_>> {
        self.pages.iter().flat_map(PageLines::raw_lines)
    }

    pub fn line_counts(&self) -> Vec<usize> {
        self.pages.iter().map(PageLines::len).collect()
    }
}

/// Split a text export into pages on form feeds.
///
/// A trailing form feed does not create an extra empty page.
pub fn parse_text_dump(text: &str) -> Vec<PageLines> {
    let mut chunks: Vec<&str> = text.split(PAGE_BREAK).collect();
    if chunks.len() > 1 && chunks.last().is_some_and(|c| c.trim().is_empty()) {
        chunks.pop();
    }
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| PageLines::new(i, chunk))
        .collect()
}

/// Keep only the selected pages, failing when the selection matches none.
pub fn select_pages(
    pages: Vec<PageLines>,
    selection: &PageSelection,
) -> Result<Vec<PageLines>, ExtractError> {
    let total = pages.len();
    let wanted = selection.to_indices(total);
    if wanted.is_empty() {
        return Err(ExtractError::PageOutOfRange { total });
    }
    Ok(pages
        .into_iter()
        .filter(|p| wanted.binary_search(&p.page).is_ok())
        .collect())
}

/// Read a UTF-8 text export.
pub fn read_text_document(
    path: &Path,
    selection: &PageSelection,
) -> Result<TextDocument, ExtractError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractError::UnsupportedInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let pages = parse_text_dump(&text);
    let total_pages = pages.len();
    let pages = select_pages(pages, selection)?;
    debug!(
        "Read {} of {} text pages from {}",
        pages.len(),
        total_pages,
        path.display()
    );
    Ok(TextDocument {
        pages,
        total_pages,
        title: None,
        producer: None,
    })
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory,
/// then the system library.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.trim().is_empty() => {
            let p = Path::new(&p);
            if p.is_dir() {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
            } else {
                Pdfium::bind_to_library(p)
            }
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Extract the text lines of the selected pages of a PDF.
///
/// Blocking; callers in async contexts go through `spawn_blocking`.
pub fn read_pdf_document(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<TextDocument, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let title = get_meta(PdfDocumentMetadataTagType::Title);
    let producer = get_meta(PdfDocumentMetadataTagType::Producer);

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(ExtractError::PageOutOfRange { total: total_pages });
    }

    let mut out = Vec::with_capacity(indices.len());
    for idx in indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractError::TextExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let text = page
            .text()
            .map_err(|e| ExtractError::TextExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        let lines = PageLines::new(idx, &text);
        if lines.is_empty() {
            warn!("Page {} has no text layer", idx + 1);
        }
        debug!("Page {} → {} lines", idx + 1, lines.len());
        out.push(lines);
    }

    Ok(TextDocument {
        pages: out,
        total_pages,
        title,
        producer,
    })
}
