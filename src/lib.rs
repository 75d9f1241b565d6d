//! # dhsplits
//!
//! Extract rider results, split and sector times, and rankings from downhill
//! mountain-bike World Cup timing sheets.
//!
//! ## Why this crate?
//!
//! Timing sheets are published as PDFs whose text layer is one field per
//! line, with no column structure left. Generic PDF table extractors either
//! merge cells or lose the rank printed beside each split. This crate reads
//! the line stream directly and rebuilds each rider from known layouts,
//! then derives what the sheet never prints: sector times, time-to-finish
//! from every split, and an independent ranking for each of them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / text export
//!  │
//!  ├─ 1. Input     validate path, sniff PDF vs text
//!  ├─ 2. Text      per-page line stream (pdfium, spawn_blocking)
//!  ├─ 3. Segment   fixed-offset windows (event) or state machine (training)
//!  ├─ 4. Decode    window → RiderRecord via per-layout field tables
//!  ├─ 5. Validate  drop DNF/DNS/DSQ, boilerplate, malformed times
//!  ├─ 6. Derive    sectors + cumulative time to finish
//!  └─ 7. Assemble  competition ranks, fixed columns, CSV/TSV/JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dhsplits::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract("2024_leogang_dhi_me_f.pdf", &config).await?;
//!     for row in output.table.by_time_rank() {
//!         println!("{:>3} {:<24} {}", row.time_rank, row.identity.name, row.final_time);
//!     }
//!     eprintln!("{} excluded", output.stats.excluded);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dhsplits` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! dhsplits = { version = "0.3", default-features = false }
//! ```
//!
//! ## Sheet layouts
//!
//! | Family | Sheets | Segmentation |
//! |--------|--------|--------------|
//! | Event  | qualification, semi-final, final | fixed 19/20-line windows, team detected at line 5 |
//! | Event (compact) | condensed exports | 10/11-line windows, no UCI id |
//! | Training | timed training | one entry per rider, 1–5 runs each |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{
    apply_view, best_runs, hypothetical_best, reference_index, reference_value, top_n_average,
    Metric,
};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, LayoutChoice, OutputFormat, PageSelection,
    TableStart, TableView, MAX_SPLITS,
};
pub use error::{ExtractError, Rejection, WindowError};
pub use extract::{
    extract, extract_batch, extract_from_bytes, extract_lines, extract_sync, extract_to_file,
    inspect, write_output_file,
};
pub use output::{
    Diagnostic, DiagnosticKind, DocumentMetadata, ExtractionOutput, ExtractionStats, ResultTable,
    SourceKind, TableRow,
};
pub use pipeline::schema::SheetFamily;
pub use pipeline::timing::RaceTime;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{FinalTime, RiderIdentity, RiderRecord, SourceSpan, TerminalStatus, TimedField};
