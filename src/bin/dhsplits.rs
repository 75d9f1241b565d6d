//! CLI binary for dhsplits.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and writes the result table.

use anyhow::{Context, Result};
use clap::Parser;
use dhsplits::pipeline::assemble::render_output;
use dhsplits::{
    apply_view, extract, extract_batch, inspect, write_output_file, ExtractionConfig,
    ExtractionOutput, ExtractionProgressCallback, LayoutChoice, OutputFormat, PageSelection,
    ProgressCallback, TableStart, TableView,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a page bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Windows skipped so far, shown in the page log.
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_document_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading sheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} pages…"))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, rows_found: usize) {
        let skipped = self.skipped.swap(0, Ordering::SeqCst);
        let mark = if rows_found > 0 { green("✓") } else { dim("·") };
        let note = if skipped > 0 {
            red(&format!("{skipped} skipped"))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            mark,
            page_num,
            total_pages,
            dim(&format!("{rows_found:>3} riders")),
            note,
        ));
        self.bar.inc(1);
    }

    fn on_window_skipped(&self, _page_num: usize, _line: usize, _reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, rows: usize, excluded: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} rows  {}",
            green("✔"),
            bold(&rows.to_string()),
            dim(&format!("({excluded} excluded)")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Final results to stdout as CSV
  dhsplits 2024_leogang_dhi_me_f.pdf

  # Write TSV to a file
  dhsplits 2024_leogang_dhi_me_f.pdf -o leogang_final.tsv --format tsv

  # Timed training, each rider's best run only
  dhsplits 2024_leogang_dhi_me_tt.pdf --view best -o best.csv

  # Sheet whose table starts after a heading instead of at line 24
  dhsplits --start-marker "Rank Nr Name" results.pdf

  # Text export already split into pages with form feeds
  dhsplits --layout event --split-count 3 results.txt

  # Several sheets at once into a directory
  dhsplits -o out/ *_dhi_*.pdf

  # Page count, line counts and detected layout only
  dhsplits --inspect-only 2024_leogang_dhi_me_f.pdf

LAYOUTS:
  event      qualification, semi-final and final sheets; one fixed-size
             block of lines per rider, splits with printed ranks
  training   timed training; one block per rider with up to five runs
  auto       file name (_tt, _qr, _semi, _f), then header text, then
             the share of times carrying a printed rank

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override the log filter (e.g. dhsplits=debug)
  DHSPLITS_*              Every flag below also reads its DHSPLITS_ variable
"#;

/// Extract rider split times and rankings from downhill MTB timing sheets.
#[derive(Parser, Debug)]
#[command(
    name = "dhsplits",
    version,
    about = "Extract rider split times and rankings from downhill MTB timing sheets",
    long_about = "Read the text layer of downhill mountain-bike World Cup timing sheets \
(qualification, semi-final, final and timed training), rebuild one row per rider or run, \
derive sector times and time-to-finish from every split, and rank every column.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Timing sheet PDFs or text exports.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (one input) or directory (several inputs). Default: stdout.
    #[arg(short, long, env = "DHSPLITS_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "DHSPLITS_FORMAT", value_enum, default_value = "csv")]
    format: FormatArg,

    /// Rows to emit: every run, each rider's best run, or best sectors combined.
    #[arg(long, env = "DHSPLITS_VIEW", value_enum, default_value = "runs")]
    view: ViewArg,

    /// Sheet layout.
    #[arg(long, env = "DHSPLITS_LAYOUT", value_enum, default_value = "auto")]
    layout: LayoutArg,

    /// 0-based line where the result table begins on each page.
    #[arg(long, env = "DHSPLITS_START_LINE", conflicts_with = "start_marker")]
    start_line: Option<usize>,

    /// Begin the table on the line after the first line containing this text.
    #[arg(long, env = "DHSPLITS_START_MARKER")]
    start_marker: Option<String>,

    /// Column header line that opens a training table.
    #[arg(long, env = "DHSPLITS_TRAINING_HEADER")]
    training_header: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DHSPLITS_PAGES", default_value = "all")]
    pages: String,

    /// Intermediate splits on event sheets (1–5).
    #[arg(long, env = "DHSPLITS_SPLIT_COUNT", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=5))]
    split_count: u8,

    /// Maximum runs per rider on training sheets.
    #[arg(long, env = "DHSPLITS_MAX_RUNS", default_value_t = 5)]
    max_runs: usize,

    /// Cell text for values a sheet does not provide.
    #[arg(long, env = "DHSPLITS_MISSING_MARKER", default_value = "N/A")]
    missing_marker: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DHSPLITS_PASSWORD")]
    password: Option<String>,

    /// Documents extracted at once in batch mode.
    #[arg(short, long, env = "DHSPLITS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print document structure only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "DHSPLITS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DHSPLITS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DHSPLITS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Tsv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Tsv => OutputFormat::Tsv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Runs,
    Best,
    Perfect,
}

impl From<ViewArg> for TableView {
    fn from(v: ViewArg) -> Self {
        match v {
            ViewArg::Runs => TableView::Runs,
            ViewArg::Best => TableView::BestRuns,
            ViewArg::Perfect => TableView::Perfect,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Auto,
    Event,
    Training,
}

impl From<LayoutArg> for LayoutChoice {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Auto => LayoutChoice::Auto,
            LayoutArg::Event => LayoutChoice::Event,
            LayoutArg::Training => LayoutChoice::Training,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let batch = cli.inputs.len() > 1;

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar replaces INFO logs; batch mode has no bar since documents
    // finish out of order.
    let show_progress = !cli.quiet && !cli.no_progress && !batch && !cli.inspect_only;
    let filter = if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        for input in &cli.inputs {
            let meta = inspect(input, cli.password.as_deref())
                .await
                .with_context(|| format!("Failed to inspect {input}"))?;

            if matches!(cli.format, FormatArg::Json) {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
                );
            } else {
                println!("File:         {}", meta.path);
                if let Some(ref t) = meta.title {
                    println!("Title:        {}", t);
                }
                if let Some(ref p) = meta.producer {
                    println!("Producer:     {}", p);
                }
                println!("Source:       {:?}", meta.source);
                println!("Pages:        {}", meta.page_count);
                println!("Layout:       {}", meta.family);
                for (i, n) in meta.line_counts.iter().enumerate() {
                    println!("  page {:>3}:   {} lines", i + 1, n);
                }
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let format: OutputFormat = cli.format.into();
    let view: TableView = cli.view.into();

    // ── Batch mode ───────────────────────────────────────────────────────
    if batch {
        return run_batch(&cli, &config, format, view).await;
    }

    // ── Single document ──────────────────────────────────────────────────
    let input = &cli.inputs[0];
    let mut output = extract(input, &config)
        .await
        .with_context(|| format!("Extraction failed for {input}"))?;
    output.table = apply_view(&output.table, view);

    emit(&output, cli.output.as_deref(), format, &config.missing_marker).await?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Extracted {} rows from {}/{} pages in {}ms ({} excluded)",
            output.stats.rows,
            output.stats.processed_pages,
            output.stats.total_pages,
            output.stats.total_duration_ms,
            output.stats.excluded,
        );
    }

    Ok(())
}

/// Extract every input, writing one file per document into `--output`.
async fn run_batch(
    cli: &Cli,
    config: &ExtractionConfig,
    format: OutputFormat,
    view: TableView,
) -> Result<()> {
    let results = extract_batch(cli.inputs.iter().cloned(), config).await;
    let mut failed = 0usize;

    for (input, result) in results {
        match result {
            Ok(mut output) => {
                output.table = apply_view(&output.table, view);
                let target = cli
                    .output
                    .as_ref()
                    .map(|dir| dir.join(output_name(&input, format)));
                emit(&output, target.as_deref(), format, &config.missing_marker).await?;
                if !cli.quiet {
                    eprintln!(
                        "  {} {:<40} {}",
                        green("✓"),
                        input,
                        dim(&format!(
                            "{} rows, {} excluded",
                            output.stats.rows, output.stats.excluded
                        )),
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {:<40} {}", red("✗"), input, red(&e.to_string()));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} documents failed", failed, cli.inputs.len());
    }
    Ok(())
}

/// Write to `path`, or stdout when absent.
async fn emit(
    output: &ExtractionOutput,
    path: Option<&Path>,
    format: OutputFormat,
    missing: &str,
) -> Result<()> {
    match path {
        Some(path) => {
            write_output_file(output, path, format, missing)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let body = render_output(output, format, missing).context("Failed to render table")?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// `2024_leogang_dhi_me_f.pdf` → `2024_leogang_dhi_me_f.csv`.
fn output_name(input: &str, format: OutputFormat) -> PathBuf {
    let stem = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}.{}", stem, format.extension()))
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .layout(cli.layout.into())
        .pages(pages)
        .split_count(cli.split_count as usize)
        .max_runs(cli.max_runs)
        .missing_marker(cli.missing_marker.clone())
        .concurrency(cli.concurrency);

    if let Some(ref marker) = cli.start_marker {
        builder = builder.table_start(TableStart::Marker(marker.clone()));
    } else if let Some(n) = cli.start_line {
        builder = builder.start_line(n);
    }
    if let Some(ref header) = cli.training_header {
        builder = builder.training_header(header.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_parse() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5)));
        assert!(matches!(
            parse_pages("3-15").unwrap(),
            PageSelection::Range(3, 15)
        ));
        match parse_pages("1,3,5").unwrap() {
            PageSelection::Set(p) => assert_eq!(p, vec![1, 3, 5]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-2").is_err());
        assert!(parse_pages("x").is_err());
    }

    #[test]
    fn batch_output_names() {
        assert_eq!(
            output_name("data/2024_leogang_dhi_me_f.pdf", OutputFormat::Tsv),
            PathBuf::from("2024_leogang_dhi_me_f.tsv")
        );
    }

    #[test]
    fn cli_maps_onto_config() {
        let cli = Cli::parse_from([
            "dhsplits",
            "--layout",
            "training",
            "--start-marker",
            "Rank Nr",
            "--split-count",
            "3",
            "--pages",
            "2-4",
            "sheet.txt",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.layout, LayoutChoice::Training);
        assert_eq!(config.split_count, 3);
        assert!(matches!(config.table_start, TableStart::Marker(ref m) if m == "Rank Nr"));
        assert!(matches!(config.pages, PageSelection::Range(2, 4)));
    }
}
