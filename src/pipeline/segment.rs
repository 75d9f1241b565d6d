//! Row segmenter for fixed-offset event sheets.
//!
//! From the table start of each page, the segmenter looks for a rank line,
//! claims a window of lines after it, picks a schema from the window's
//! signature and hands it to the decoder. A decoded rider advances the
//! cursor by the lines it claimed; a failed window advances it by one, so
//! noise between riders costs a few skipped lines and never loops.

use super::decode::{decode_window, is_rank_line, RiderWindow};
use super::schema::select_schema;
use super::text::PageLines;
use crate::config::{ExtractionConfig, TableStart};
use crate::error::WindowError;
use crate::output::{Diagnostic, DiagnosticKind};
use crate::record::RiderRecord;
use tracing::{debug, warn};

/// Lines examined when choosing a schema for one window.
pub const WINDOW_LEN: usize = 25;

/// Everything the segmenter produced for one page.
#[derive(Debug, Default)]
pub struct PageSegments {
    pub records: Vec<RiderRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// First line of the result table on `page`, if the table is there.
pub fn table_start(page: &PageLines, start: &TableStart) -> Option<usize> {
    match start {
        TableStart::Line(n) => (*n < page.len()).then_some(*n),
        TableStart::Marker(m) => page.find(m).map(|i| i + 1),
    }
}

/// Segment and decode one page of an event sheet.
///
/// `on_skip` is called for every abandoned window with the 0-indexed line.
pub fn segment_page(
    page: &PageLines,
    config: &ExtractionConfig,
    mut on_skip: impl FnMut(usize, &WindowError),
) -> PageSegments {
    let mut out = PageSegments::default();
    let page_num = page.page + 1;

    let Some(start) = table_start(page, &config.table_start) else {
        debug!("Page {}: table start not found", page_num);
        return out;
    };

    let lines = &page.lines;
    let mut i = start;
    while i < lines.len() {
        if !is_rank_line(&lines[i]) {
            i += 1;
            continue;
        }

        let end = (i + WINDOW_LEN).min(lines.len());
        let head: Vec<&str> = lines[i..end].iter().map(String::as_str).collect();
        let schema = select_schema(&head);
        let offsets = schema.offsets(config.split_count);

        let window = RiderWindow {
            page: page.page,
            start: i,
            lines: &lines[i..end],
        };

        if window.len() < offsets.min_len {
            // Too few lines left for a rider: the rest of the page is footer.
            let err = WindowError::TooShort {
                schema: schema.name.to_string(),
                available: window.len(),
                required: offsets.min_len,
            };
            debug!("Page {} line {}: {}", page_num, i, err);
            on_skip(i, &err);
            out.diagnostics.push(Diagnostic {
                page: page_num,
                line: i,
                kind: DiagnosticKind::WindowSkipped(err),
            });
            break;
        }

        match decode_window(&window, schema, config.split_count) {
            Ok(decoded) => {
                let who = &decoded.record.identity;
                debug!(
                    "Page {} line {}: #{} {} via {}",
                    page_num, i, who.number, who.name, schema.name
                );
                out.records.push(decoded.record);
                i += decoded.consumed.max(1);
            }
            Err(err) => {
                warn!("Page {} line {}: window skipped: {}", page_num, i, err);
                on_skip(i, &err);
                out.diagnostics.push(Diagnostic {
                    page: page_num,
                    line: i,
                    kind: DiagnosticKind::WindowSkipped(err),
                });
                i += 1;
            }
        }
    }

    out
}
