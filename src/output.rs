//! Result types returned by the extraction entry points.

use crate::error::{Rejection, WindowError};
use crate::pipeline::schema::SheetFamily;
use crate::pipeline::timing::RaceTime;
use crate::record::{RiderIdentity, SourceSpan};
use serde::{Deserialize, Serialize};

/// One retained rider-run with every derived column filled in.
///
/// Vectors are indexed by split position (0 = first split). Ranks use
/// competition ranking; an unavailable value carries the "worse than all"
/// rank of its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub identity: RiderIdentity,
    pub run: Option<u32>,
    pub speed: Option<f64>,
    pub speed_rank: Option<u32>,
    pub final_time: RaceTime,
    pub time_rank: u32,
    pub gap: Option<String>,
    pub points: Option<String>,
    pub splits: Vec<Option<RaceTime>>,
    pub split_ranks: Vec<u32>,
    /// Ranks as printed beside each split on the sheet.
    pub split_printed_ranks: Vec<Option<u32>>,
    /// One more entry than `splits`; the last is finish minus last split.
    pub sectors: Vec<Option<RaceTime>>,
    pub sector_ranks: Vec<u32>,
    /// Time from each split to the finish.
    pub cumulative: Vec<Option<RaceTime>>,
    pub cumulative_ranks: Vec<u32>,
    pub source: SourceSpan,
}

impl TableRow {
    /// Key identifying the same rider across training runs.
    pub fn rider_key(&self) -> (&str, &str) {
        (self.identity.number.as_str(), self.identity.name.as_str())
    }
}

/// The ordered rows extracted from one document.
///
/// Rows keep document order; sort by `time_rank` for a finishing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Splits per row (sectors = splits + 1). Every row's vectors have this length.
    pub split_count: usize,
    pub rows: Vec<TableRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableRow> {
        self.rows.iter()
    }

    /// Rows ordered by finishing time (ties keep document order).
    pub fn by_time_rank(&self) -> Vec<&TableRow> {
        let mut rows: Vec<&TableRow> = self.rows.iter().collect();
        rows.sort_by_key(|r| r.time_rank);
        rows
    }
}

/// Something the pipeline skipped or dropped, kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-indexed page.
    pub page: usize,
    /// 0-indexed line on the page.
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A window could not be decoded; the segmenter advanced one line.
    WindowSkipped(WindowError),
    /// A decoded record was excluded before ranking.
    Rejected { rider: String, reason: Rejection },
    /// A training line was discarded (best-of column, run overflow).
    LineDiscarded { text: String, reason: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} line {}: ", self.page, self.line)?;
        match &self.kind {
            DiagnosticKind::WindowSkipped(e) => write!(f, "window skipped ({e})"),
            DiagnosticKind::Rejected { rider, reason } => write!(f, "{rider} excluded ({reason})"),
            DiagnosticKind::LineDiscarded { text, reason } => {
                write!(f, "discarded {text:?} ({reason})")
            }
        }
    }
}

/// Where the text lines came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    Pdf,
    /// A plain-text line dump with form-feed page breaks.
    Text,
}

/// Document-level facts gathered before decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub path: String,
    pub source: SourceKind,
    pub page_count: usize,
    /// Text lines per page, in page order.
    pub line_counts: Vec<usize>,
    pub family: SheetFamily,
    pub title: Option<String>,
    pub producer: Option<String>,
}

/// Counters for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    /// Records produced by the decoder (one per rider-run).
    pub records_decoded: usize,
    pub windows_skipped: usize,
    pub lines_discarded: usize,
    /// Records dropped by validation.
    pub excluded: usize,
    pub rows: usize,
    pub total_duration_ms: u64,
}

/// Complete result of extracting one timing sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub table: ResultTable,
    pub metadata: DocumentMetadata,
    pub stats: ExtractionStats,
    pub diagnostics: Vec<Diagnostic>,
}
