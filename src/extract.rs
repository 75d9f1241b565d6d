//! Extraction entry points.
//!
//! ## Why a synchronous core?
//!
//! Every stage after text extraction is pure CPU work over a few thousand
//! lines, and pdfium itself is blocking. The whole document therefore runs in
//! one call to [`extract_sync`]; the async functions move that call onto the
//! blocking pool so they can be awaited from a Tokio application, and
//! [`extract_batch`] runs several documents side by side. Pages inside one
//! document are always processed in order.

use crate::config::{ExtractionConfig, LayoutChoice, OutputFormat, PageSelection, MAX_SPLITS};
use crate::error::ExtractError;
use crate::output::{
    Diagnostic, DiagnosticKind, DocumentMetadata, ExtractionOutput, ExtractionStats, SourceKind,
};
use crate::pipeline::assemble::{assemble, render_output};
use crate::pipeline::decode::decode_training_entry;
use crate::pipeline::derive::derive;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::schema::SheetFamily;
use crate::pipeline::segment::segment_page;
use crate::pipeline::text::{self, TextDocument};
use crate::pipeline::timing::{split_value_and_rank, RaceTime};
use crate::pipeline::training::TrainingMachine;
use crate::pipeline::validate::validate;
use crate::progress::{ExtractionProgressCallback, NoopProgressCallback};
use crate::record::RiderRecord;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// File-name tokens that mark an event result sheet.
const EVENT_NAME_TOKENS: &[&str] = &["qr", "q1", "q2", "semi", "f", "final"];

/// Extract the result table from a timing sheet (PDF or text export).
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some windows were skipped or
/// riders excluded (see `output.diagnostics`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for document-level failures:
/// - File not found / permission denied / unsupported format
/// - PDF cannot be opened or pdfium cannot be bound
/// - No rider could be decoded on any selected page
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input = input_str.as_ref().to_string();
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract_sync(&input, &config))
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking version of [`extract`].
pub fn extract_sync(
    input_str: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    info!("Starting extraction: {}", input_str);
    let resolved = input::resolve_input(input_str)?;
    extract_resolved(&resolved, input_str, config)
}

/// Extract from a document held in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
///
/// # Example
/// ```rust,no_run
/// use dhsplits::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("results_dhi_me_f.pdf")?;
/// let output = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// println!("{} riders", output.table.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let resolved = input::resolve_bytes(bytes)?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract_resolved(&resolved, "<memory>", &config))
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Extract from a text export already in memory (pages separated by form feeds).
pub fn extract_lines(
    text_dump: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let pages = text::parse_text_dump(text_dump);
    let total_pages = pages.len();
    let doc = TextDocument {
        pages: text::select_pages(pages, &config.pages)?,
        total_pages,
        title: None,
        producer: None,
    };
    run_pipeline(doc, "<lines>", SourceKind::Text, config, Instant::now())
}

/// Extract and write the table to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(input_str, config).await?;
    write_output_file(&output, output_path.as_ref(), format, &config.missing_marker).await?;
    Ok(output.stats)
}

/// Serialise `output` and write it atomically to `path`.
pub async fn write_output_file(
    output: &ExtractionOutput,
    path: &Path,
    format: OutputFormat,
    missing_marker: &str,
) -> Result<(), ExtractError> {
    let body = render_output(output, format, missing_marker)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, body.as_bytes())
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

/// Extract several documents concurrently.
///
/// Documents share nothing; at most `config.concurrency` run at once.
/// Results come back in input order, one per input.
pub async fn extract_batch<I, S>(
    inputs: I,
    config: &ExtractionConfig,
) -> Vec<(String, Result<ExtractionOutput, ExtractError>)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    let concurrency = config.concurrency.max(1);
    info!(
        "Batch extraction: {} documents, concurrency {}",
        inputs.len(),
        concurrency
    );

    let mut results: Vec<(usize, String, Result<ExtractionOutput, ExtractError>)> =
        stream::iter(inputs.into_iter().enumerate())
            .map(|(idx, input)| async move {
                let result = extract(&input, config).await;
                if let Err(ref e) = result {
                    warn!("{}: {}", input, e);
                }
                (idx, input, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

    results.sort_by_key(|(idx, _, _)| *idx);
    results.into_iter().map(|(_, i, r)| (i, r)).collect()
}

/// Read page structure and detect the layout without decoding riders.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let input = input_str.as_ref().to_string();
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let resolved = input::resolve_input(&input)?;
        let doc = read_document(&resolved, password.as_deref(), &PageSelection::All)?;
        let family = detect_layout(Some(&input), &doc, &ExtractionConfig::default());
        Ok::<_, ExtractError>(metadata_for(&doc, &input, resolved.kind(), family))
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Inspect task panicked: {}", e)))?
}

/// Choose the sheet family: file-name hint, then header phrase, then token shapes.
pub fn detect_layout(
    file_name: Option<&str>,
    doc: &TextDocument,
    config: &ExtractionConfig,
) -> SheetFamily {
    if let Some(family) = file_name.and_then(family_from_file_name) {
        debug!("Layout from file name: {}", family);
        return family;
    }

    if doc.pages.iter().any(|p| p.find(&config.training_header).is_some()) {
        debug!("Layout from training header");
        return SheetFamily::Training;
    }

    let (mut ranked, mut bare) = (0usize, 0usize);
    for line in doc.raw_lines() {
        let (value, rank) = split_value_and_rank(line.text);
        if RaceTime::parse(&value).is_some() {
            if rank.is_some() {
                ranked += 1;
            } else {
                bare += 1;
            }
        }
    }
    debug!("Layout vote: {} ranked times, {} bare times", ranked, bare);
    if ranked == 0 && bare > 0 {
        SheetFamily::Training
    } else if ranked * 2 >= bare {
        SheetFamily::Event
    } else {
        SheetFamily::Training
    }
}

/// `_tt` marks timed training; `_qr`, `_q1`, `_semi`, `_f` mark event sheets.
pub fn family_from_file_name(name: &str) -> Option<SheetFamily> {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())?;
    let tokens: Vec<&str> = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.contains(&"tt") {
        Some(SheetFamily::Training)
    } else if tokens.iter().any(|t| EVENT_NAME_TOKENS.contains(t)) {
        Some(SheetFamily::Event)
    } else {
        None
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn read_document(
    resolved: &ResolvedInput,
    password: Option<&str>,
    pages: &PageSelection,
) -> Result<TextDocument, ExtractError> {
    match resolved.kind() {
        SourceKind::Pdf => text::read_pdf_document(resolved.path(), password, pages),
        SourceKind::Text => text::read_text_document(resolved.path(), pages),
    }
}

fn extract_resolved(
    resolved: &ResolvedInput,
    label: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();
    let doc = read_document(resolved, config.password.as_deref(), &config.pages)?;
    run_pipeline(doc, label, resolved.kind(), config, start)
}

fn metadata_for(
    doc: &TextDocument,
    label: &str,
    source: SourceKind,
    family: SheetFamily,
) -> DocumentMetadata {
    DocumentMetadata {
        path: label.to_string(),
        source,
        page_count: doc.total_pages,
        line_counts: doc.line_counts(),
        family,
        title: doc.title.clone(),
        producer: doc.producer.clone(),
    }
}

fn run_pipeline(
    doc: TextDocument,
    label: &str,
    source: SourceKind,
    config: &ExtractionConfig,
    start: Instant,
) -> Result<ExtractionOutput, ExtractError> {
    let cb: &dyn ExtractionProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback);

    // ── Step 1: Choose layout ────────────────────────────────────────────
    let family = match config.layout {
        LayoutChoice::Event => SheetFamily::Event,
        LayoutChoice::Training => SheetFamily::Training,
        LayoutChoice::Auto => detect_layout(Some(label), &doc, config),
    };
    let metadata = metadata_for(&doc, label, source, family);
    let selected = doc.pages.len();
    info!(
        "{}: {} of {} pages, {} layout",
        label, selected, doc.total_pages, family
    );
    cb.on_document_start(selected);

    // ── Step 2: Segment and decode page by page ──────────────────────────
    let mut records: Vec<RiderRecord> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut training = TrainingMachine::new(config);

    for page in &doc.pages {
        let page_num = page.page + 1;
        let before = records.len();
        match family {
            SheetFamily::Event => {
                let seg = segment_page(page, config, |line, err| {
                    cb.on_window_skipped(page_num, line, &err.to_string())
                });
                records.extend(seg.records);
                diagnostics.extend(seg.diagnostics);
            }
            SheetFamily::Training => {
                for entry in training.scan_page(page) {
                    records.extend(decode_training_entry(&entry));
                }
                diagnostics.extend(training.take_diagnostics());
            }
        }
        let found = records.len() - before;
        debug!("Page {}: {} records", page_num, found);
        cb.on_page_complete(page_num, selected, found);
    }

    let records_decoded = records.len();
    if records_decoded == 0 {
        return Err(ExtractError::NoTableFound {
            path: label.into(),
            detail: format!(
                "no rider rows on {} page(s) using the {} layout",
                selected, family
            ),
        });
    }

    // ── Step 3: Validate ─────────────────────────────────────────────────
    let mut valid = Vec::with_capacity(records.len());
    let mut excluded = 0usize;
    for record in records {
        let rider = format!("#{} {}", record.identity.number, record.identity.name);
        let span = record.source;
        match validate(record, config) {
            Ok(v) => valid.push(v),
            Err(reason) => {
                debug!("{} excluded: {}", rider, reason);
                excluded += 1;
                diagnostics.push(Diagnostic {
                    page: span.page,
                    line: span.line,
                    kind: DiagnosticKind::Rejected { rider, reason },
                });
            }
        }
    }

    // ── Step 4: Derive and assemble ──────────────────────────────────────
    let split_count = match family {
        SheetFamily::Event => config.split_count,
        SheetFamily::Training => valid
            .iter()
            .map(|v| v.record.splits.len())
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_SPLITS),
    };
    let derived = valid.into_iter().map(|v| derive(v, split_count)).collect();
    let table = assemble(derived, split_count);

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let stats = ExtractionStats {
        total_pages: doc.total_pages,
        processed_pages: selected,
        records_decoded,
        windows_skipped: count_kind(&diagnostics, |k| {
            matches!(k, DiagnosticKind::WindowSkipped(_))
        }),
        lines_discarded: count_kind(&diagnostics, |k| {
            matches!(k, DiagnosticKind::LineDiscarded { .. })
        }),
        excluded,
        rows: table.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} rows, {} excluded, {}ms",
        stats.rows, stats.excluded, stats.total_duration_ms
    );
    cb.on_document_complete(stats.rows, stats.excluded);

    Ok(ExtractionOutput {
        table,
        metadata,
        stats,
        diagnostics,
    })
}

fn count_kind(diagnostics: &[Diagnostic], pred: impl Fn(&DiagnosticKind) -> bool) -> usize {
    diagnostics.iter().filter(|d| pred(&d.kind)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::text::parse_text_dump;

    #[test]
    fn file_name_hints() {
        assert_eq!(
            family_from_file_name("2024_val_di_sole_dhi_me_tt.pdf"),
            Some(SheetFamily::Training)
        );
        assert_eq!(
            family_from_file_name("/data/2024_leogang_dhi_we_semi.pdf"),
            Some(SheetFamily::Event)
        );
        assert_eq!(family_from_file_name("dhi_me_f.txt"), Some(SheetFamily::Event));
        assert_eq!(family_from_file_name("results.pdf"), None);
        assert_eq!(family_from_file_name("ttt_results.pdf"), None);
    }

    #[test]
    fn token_vote_prefers_ranked_times_for_events() {
        let doc = TextDocument {
            pages: parse_text_dump("1.\n0:32.100 (2)\n1:04.220 (1)\n2:45.300"),
            total_pages: 1,
            ..Default::default()
        };
        assert_eq!(
            detect_layout(None, &doc, &ExtractionConfig::default()),
            SheetFamily::Event
        );
    }

    #[test]
    fn token_vote_bare_times_mean_training() {
        let doc = TextDocument {
            pages: parse_text_dump("1.\n12 SMITH JOHN\n55.1\n0:32.100\n2:45.300\n+0.000"),
            total_pages: 1,
            ..Default::default()
        };
        assert_eq!(
            detect_layout(None, &doc, &ExtractionConfig::default()),
            SheetFamily::Training
        );
    }

    #[test]
    fn empty_document_has_no_table() {
        let config = ExtractionConfig::builder()
            .layout(LayoutChoice::Event)
            .start_line(0)
            .build()
            .unwrap();
        let r = extract_lines("Title\nNothing here", &config);
        assert!(matches!(r, Err(ExtractError::NoTableFound { .. })));
    }
}
