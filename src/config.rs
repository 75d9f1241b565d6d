//! Configuration types for timing-sheet extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Sheet layouts drift between event
//! editions; every layout constant the engine depends on (start line, header
//! phrase, split count, keyword lists) lives here so a new edition is a
//! config change rather than a code change.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest split count any supported sheet prints. The output schema always
/// carries this many split columns so that it is stable across event types.
pub const MAX_SPLITS: usize = 5;

/// Configuration for extracting one timing sheet.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use dhsplits::{ExtractionConfig, LayoutChoice};
///
/// let config = ExtractionConfig::builder()
///     .layout(LayoutChoice::Event)
///     .start_line(25)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which sheet family to decode. Default: [`LayoutChoice::Auto`].
    pub layout: LayoutChoice,

    /// Where the result table begins on each page of an event sheet.
    /// Default: `TableStart::Line(24)`.
    ///
    /// The segmenter resynchronises on the next rank line anyway, so
    /// starting a line early is harmless; starting late loses the leader.
    pub table_start: TableStart,

    /// Header phrase that precedes rider rows on training sheets.
    /// Default: `"Nr Name / UCI MTB Team"`.
    pub training_header: String,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Number of intermediate splits printed on event sheets (1–5). Default: 4.
    pub split_count: usize,

    /// Maximum training runs kept per rider. Default: 5.
    pub max_runs: usize,

    /// Maximum time lines (splits plus finish) per training run. Default: 6.
    ///
    /// A time line beyond this is treated as a "Best" summary column.
    pub max_times_per_run: usize,

    /// An all-uppercase line containing one of these is a team, otherwise a
    /// nationality. Default: TEAM, FACTORY, RACING, GRAVITY.
    pub team_keywords: Vec<String>,

    /// Substrings that mark a required time field as header/footer debris.
    pub invalid_tokens: Vec<String>,

    /// Text written for unavailable and not-applicable cells. Default: `"N/A"`.
    pub missing_marker: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Documents processed at once by [`crate::extract::extract_batch`]. Default: 4.
    pub concurrency: usize,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

/// Non-data tokens seen in the final-time and last-split columns of real
/// sheets when a window is misaligned: terminal statuses, placeholders,
/// column headers, footer text and a few rider names that surface from
/// summary boxes.
pub const DEFAULT_INVALID_TOKENS: &[&str] = &[
    "DNF",
    "DNS",
    "DSQ",
    "-",
    "N/A",
    "Average",
    "YOB",
    "In",
    "Year",
    "MACDERMID",
    "GUIONNET",
    "TRUMMER",
    "RIESCO",
    "SCHLEBES",
    "DORVAL AM COMMENCAL",
    "Time",
    "Points",
];

pub const DEFAULT_TEAM_KEYWORDS: &[&str] = &["TEAM", "FACTORY", "RACING", "GRAVITY"];

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            layout: LayoutChoice::default(),
            table_start: TableStart::default(),
            training_header: "Nr Name / UCI MTB Team".to_string(),
            pages: PageSelection::default(),
            split_count: 4,
            max_runs: 5,
            max_times_per_run: MAX_SPLITS + 1,
            team_keywords: DEFAULT_TEAM_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            invalid_tokens: DEFAULT_INVALID_TOKENS.iter().map(|s| s.to_string()).collect(),
            missing_marker: "N/A".to_string(),
            password: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("layout", &self.layout)
            .field("table_start", &self.table_start)
            .field("training_header", &self.training_header)
            .field("pages", &self.pages)
            .field("split_count", &self.split_count)
            .field("max_runs", &self.max_runs)
            .field("max_times_per_run", &self.max_times_per_run)
            .field("team_keywords", &self.team_keywords)
            .field("invalid_tokens", &self.invalid_tokens.len())
            .field("missing_marker", &self.missing_marker)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `line` names a team rather than a nationality.
    pub fn is_team_line(&self, line: &str) -> bool {
        self.team_keywords.iter().any(|k| line.contains(k.as_str()))
    }

    /// The first configured non-data token contained in `field`, if any.
    pub fn non_data_token(&self, field: &str) -> Option<&str> {
        self.invalid_tokens
            .iter()
            .map(String::as_str)
            .find(|t| field.contains(t))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn layout(mut self, layout: LayoutChoice) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn table_start(mut self, start: TableStart) -> Self {
        self.config.table_start = start;
        self
    }

    /// Shorthand for `table_start(TableStart::Line(n))`.
    pub fn start_line(mut self, n: usize) -> Self {
        self.config.table_start = TableStart::Line(n);
        self
    }

    pub fn training_header(mut self, header: impl Into<String>) -> Self {
        self.config.training_header = header.into();
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn split_count(mut self, n: usize) -> Self {
        self.config.split_count = n;
        self
    }

    pub fn max_runs(mut self, n: usize) -> Self {
        self.config.max_runs = n;
        self
    }

    pub fn max_times_per_run(mut self, n: usize) -> Self {
        self.config.max_times_per_run = n;
        self
    }

    pub fn team_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.team_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn invalid_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.invalid_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn missing_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.missing_marker = marker.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.split_count == 0 || c.split_count > MAX_SPLITS {
            return Err(ExtractError::InvalidConfig(format!(
                "split count must be 1–{MAX_SPLITS}, got {}",
                c.split_count
            )));
        }
        if c.max_times_per_run < 2 || c.max_times_per_run > MAX_SPLITS + 1 {
            return Err(ExtractError::InvalidConfig(format!(
                "time lines per run must be 2–{}, got {}",
                MAX_SPLITS + 1,
                c.max_times_per_run
            )));
        }
        if c.max_runs == 0 {
            return Err(ExtractError::InvalidConfig("max runs must be ≥ 1".into()));
        }
        if let TableStart::Marker(m) = &c.table_start {
            if m.trim().is_empty() {
                return Err(ExtractError::InvalidConfig(
                    "table start marker must not be empty".into(),
                ));
            }
        }
        if c.training_header.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "training header must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which sheet family to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutChoice {
    /// Detect from the file name and token shapes (default).
    #[default]
    Auto,
    /// Qualification / semi-final / final result sheets with fixed offsets.
    Event,
    /// Timed-training sheets with a variable number of runs per rider.
    Training,
}

/// Where rider rows begin on an event-sheet page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStart {
    /// Fixed 0-indexed line offset on every page.
    Line(usize),
    /// First line after the line containing this phrase.
    Marker(String),
}

impl Default for TableStart {
    fn default() -> Self {
        TableStart::Line(24)
    }
}

/// Specifies which pages of the sheet to extract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Serialisation of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Comma-separated with a header row (default).
    #[default]
    Csv,
    /// Tab-separated with a header row.
    Tsv,
    /// Pretty-printed JSON of [`crate::output::ExtractionOutput`].
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

/// Which table to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableView {
    /// One row per retained rider-run (default).
    #[default]
    Runs,
    /// Each rider's fastest run, re-ranked.
    BestRuns,
    /// Each rider's best sectors recomposed into one hypothetical run.
    Perfect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sheet_conventions() {
        let c = ExtractionConfig::default();
        assert_eq!(c.table_start, TableStart::Line(24));
        assert_eq!(c.split_count, 4);
        assert_eq!(c.missing_marker, "N/A");
        assert!(c.is_team_line("MS MONDRAKER TEAM"));
        assert!(!c.is_team_line("GBR"));
    }

    #[test]
    fn builder_rejects_bad_split_count() {
        assert!(ExtractionConfig::builder().split_count(0).build().is_err());
        assert!(ExtractionConfig::builder().split_count(6).build().is_err());
        assert!(ExtractionConfig::builder().split_count(5).build().is_ok());
    }

    #[test]
    fn builder_rejects_empty_marker() {
        let r = ExtractionConfig::builder()
            .table_start(TableStart::Marker("  ".into()))
            .build();
        assert!(matches!(r, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn non_data_token_finds_boilerplate() {
        let c = ExtractionConfig::default();
        assert_eq!(c.non_data_token("DNF"), Some("DNF"));
        assert_eq!(c.non_data_token("Average Speed"), Some("Average"));
        assert_eq!(c.non_data_token("2:45.300"), None);
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn test_page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }
}
