//! Error types for the dhsplits library.
//!
//! Three distinct types reflect three distinct failure scopes:
//!
//! * [`ExtractError`] — **Fatal** for one document: the file is missing, is
//!   not a PDF, cannot be decoded, or the output cannot be written. Returned
//!   as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`WindowError`] — **Non-fatal**: one rider window could not be decoded
//!   (too few lines, unexpected token at an offset). The segmenter abandons
//!   the window, advances one line and carries on. Recorded as a
//!   [`crate::output::Diagnostic`] so callers can audit what was skipped.
//!
//! * [`Rejection`] — a record decoded fine but is not a finisher with usable
//!   times (DNF, boilerplate in a time field, malformed final time). Rejected
//!   rows never reach ranking.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the dhsplits library.
///
/// Window-level failures use [`WindowError`] and are stored in
/// [`crate::output::ExtractionOutput::diagnostics`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Timing sheet not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither a PDF nor a UTF-8 text dump.
    #[error("Unsupported input '{path}': {reason}")]
    UnsupportedInput { path: PathBuf, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is unreadable: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page selection matches no page (document has {total} pages)")]
    PageOutOfRange { total: usize },

    /// Text extraction failed for a specific page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// The configured table start could not be located on any page.
    #[error("No result table found in '{path}': {detail}")]
    NoTableFound { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output table.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not serialise the table to CSV/TSV/JSON.
    #[error("Failed to serialise result table: {0}")]
    Serialisation(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n\
  • Export the sheet with `pdftotext` and pass the .txt file instead.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<csv::Error> for ExtractError {
    fn from(e: csv::Error) -> Self {
        ExtractError::Serialisation(e.to_string())
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(e: serde_json::Error) -> Self {
        ExtractError::Serialisation(e.to_string())
    }
}

/// A non-fatal failure to decode one rider window.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WindowError {
    /// Fewer lines remain than the selected schema needs.
    #[error("window has {available} lines, schema '{schema}' needs {required}")]
    TooShort {
        schema: String,
        available: usize,
        required: usize,
    },

    /// The first lines do not look like a rank line followed by number + name.
    #[error("line {offset} is not a rider start: {found:?}")]
    NotARiderStart { offset: usize, found: String },

    /// A field at a schema offset had the wrong token shape.
    #[error("field '{field}' at offset {offset} has unexpected token {found:?}")]
    UnexpectedToken {
        field: String,
        offset: usize,
        found: String,
    },
}

/// Why a decoded record was dropped before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// Final time is DNF, DNS or DSQ.
    #[error("terminal status {0}")]
    TerminalStatus(String),

    /// Final time does not match `M:SS.fff`.
    #[error("invalid final time {0:?}")]
    InvalidFinalTime(String),

    /// The last regular split does not match `M:SS.fff`.
    #[error("invalid last split {0:?}")]
    InvalidLastSplit(String),

    /// A required time field contains a known non-data token.
    #[error("non-data token {token:?} in {field}")]
    NonDataToken { field: String, token: String },

    /// A training run carried no split times at all.
    #[error("run has no split times")]
    NoSplits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_too_short_display() {
        let e = WindowError::TooShort {
            schema: "event/team".into(),
            available: 12,
            required: 19,
        };
        let msg = e.to_string();
        assert!(msg.contains("12 lines"), "got: {msg}");
        assert!(msg.contains("event/team"));
    }

    #[test]
    fn unexpected_token_display() {
        let e = WindowError::UnexpectedToken {
            field: "speed".into(),
            offset: 9,
            found: "ALPHA".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("speed"));
        assert!(msg.contains("offset 9"));
    }

    #[test]
    fn rejection_display() {
        assert_eq!(
            Rejection::TerminalStatus("DNF".into()).to_string(),
            "terminal status DNF"
        );
        let e = Rejection::NonDataToken {
            field: "final_time".into(),
            token: "Average".into(),
        };
        assert!(e.to_string().contains("Average"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = ExtractError::PageOutOfRange { total: 3 };
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn binding_failed_mentions_env_var() {
        let e = ExtractError::PdfiumBindingFailed("not found".into());
        assert!(e.to_string().contains("PDFIUM_LIB_PATH"));
    }
}
