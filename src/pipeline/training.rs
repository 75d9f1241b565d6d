//! Variable-run segmentation for timed-training sheets.
//!
//! Training sheets list each rider once, followed by however many runs they
//! completed. Entries have no fixed length, so instead of windows the page is
//! read line by line through a small state machine:
//!
//! ```text
//!  rank / number+name          UPPER line             speed
//! ───────────────────▶ AwaitingTeamOrNat ──────▶ (team/nat) ──▶ CollectingSplits
//!                                                                  │  time*
//!           AwaitingRunSpeed ◀── "+delta" ── AwaitingDelta ◀───────┘ (full)
//!                  │  speed                       ▲
//!                  └──────────▶ CollectingSplits ─┘ "+delta" closes the run
//! ```
//!
//! One [`TrainingMachine`] owns the accumulator for the rider being read;
//! nothing is shared between documents.

use super::decode::{is_rank_line, parse_number_name, parse_rank_line};
use super::text::PageLines;
use super::timing::{parse_speed, split_value_and_rank, RaceTime};
use crate::config::ExtractionConfig;
use crate::output::{Diagnostic, DiagnosticKind};
use crate::record::{RiderIdentity, SourceSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_NUMBER_NAME_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+[A-Z]").unwrap());

static RE_SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\s*(?:km/?h)?(?:\s*\(\d+\))?$").unwrap());

static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}\.\d+(?:\s*\(\d+\))?$").unwrap());

/// `+1.200` or `+0:01.200`.
static RE_DELTA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+(?:\d+:)?\d+\.\d+$").unwrap());

/// What a single line of a training sheet is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Rank,
    NumberName,
    Speed,
    Time,
    Delta,
    /// `-` printed in place of a missing time.
    Placeholder,
    /// All-uppercase text: a team or a nationality.
    Upper,
    Other,
}

pub fn classify_line(line: &str) -> LineClass {
    let line = line.trim();
    if RE_TIME.is_match(line) {
        LineClass::Time
    } else if RE_DELTA.is_match(line) {
        LineClass::Delta
    } else if line == "-" {
        LineClass::Placeholder
    } else if is_rank_line(line) {
        LineClass::Rank
    } else if RE_SPEED.is_match(line) {
        LineClass::Speed
    } else if RE_NUMBER_NAME_START.is_match(line) {
        LineClass::NumberName
    } else if is_upper(line) {
        LineClass::Upper
    } else {
        LineClass::Other
    }
}

/// At least one cased character, and every cased character uppercase.
fn is_upper(line: &str) -> bool {
    let mut cased = line.chars().filter(|c| c.is_lowercase() || c.is_uppercase());
    let mut any = false;
    let all_upper = cased.all(|c| {
        any = true;
        c.is_uppercase()
    });
    any && all_upper
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingRider,
    AwaitingTeamOrNat,
    AwaitingRunSpeed,
    CollectingSplits,
    /// The current run is full or over the run limit; time lines are dropped
    /// until a delta, speed or new rider arrives.
    AwaitingDelta,
}

/// One run as printed: speed, then time lines, then a delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingRun {
    pub speed: Option<f64>,
    pub speed_rank: Option<u32>,
    /// Time lines in order; the last one is the run's finish.
    pub times: Vec<String>,
    pub gap: Option<String>,
    /// 0-indexed line of the first line of the run.
    pub line: usize,
}

/// A rider and all runs read for them on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingEntry {
    pub identity: RiderIdentity,
    pub runs: Vec<TrainingRun>,
    pub source: SourceSpan,
}

impl TrainingEntry {
    fn new(identity: RiderIdentity, page: usize, line: usize) -> Self {
        Self {
            identity,
            runs: Vec::new(),
            source: SourceSpan { page: page + 1, line },
        }
    }

    fn repeats_previous_final(&self, token: &str) -> bool {
        let (value, _) = split_value_and_rank(token);
        let Some(t) = RaceTime::parse(&value) else {
            return false;
        };
        self.runs.iter().any(|r| {
            r.times
                .last()
                .and_then(|last| RaceTime::parse(&split_value_and_rank(last).0))
                .is_some_and(|f| f.millis() == t.millis())
        })
    }
}

/// Per-document scanner for training sheets.
pub struct TrainingMachine<'c> {
    config: &'c ExtractionConfig,
    state: State,
    entry: Option<TrainingEntry>,
    run: Option<TrainingRun>,
    marker_seen: bool,
    done: Vec<TrainingEntry>,
    diagnostics: Vec<Diagnostic>,
    page: usize,
}

impl<'c> TrainingMachine<'c> {
    pub fn new(config: &'c ExtractionConfig) -> Self {
        Self {
            config,
            state: State::AwaitingRider,
            entry: None,
            run: None,
            marker_seen: false,
            done: Vec::new(),
            diagnostics: Vec::new(),
            page: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Scan one page and return the entries completed on it.
    ///
    /// Rows start after the header phrase. Pages without the phrase are
    /// continuation pages if it appeared earlier, and are skipped otherwise.
    pub fn scan_page(&mut self, page: &PageLines) -> Vec<TrainingEntry> {
        self.page = page.page;
        let start = match page.find(&self.config.training_header) {
            Some(i) => {
                self.marker_seen = true;
                i + 1
            }
            None if self.marker_seen => 0,
            None => {
                debug!(
                    "Page {}: no training header, skipping",
                    page.page + 1
                );
                return Vec::new();
            }
        };

        for (index, line) in page.lines.iter().enumerate().skip(start) {
            self.feed(index, line);
        }
        self.flush_entry();
        self.state = State::AwaitingRider;
        std::mem::take(&mut self.done)
    }

    /// Diagnostics gathered so far (discarded lines).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn feed(&mut self, index: usize, line: &str) {
        let class = classify_line(line);
        match class {
            LineClass::Rank => {
                self.flush_entry();
                let (rank, protected) = parse_rank_line(line).unwrap_or_default();
                let identity = RiderIdentity {
                    rank: Some(rank),
                    protected,
                    ..Default::default()
                };
                self.entry = Some(TrainingEntry::new(identity, self.page, index));
                self.state = State::AwaitingRider;
            }
            LineClass::NumberName => self.on_number_name(index, line),
            LineClass::Upper if self.state == State::AwaitingTeamOrNat => {
                if let Some(entry) = self.entry.as_mut() {
                    let value = Some(line.trim().to_string());
                    if self.config.is_team_line(line) {
                        entry.identity.team = value;
                    } else {
                        entry.identity.country = value;
                    }
                }
            }
            LineClass::Speed => self.on_speed(index, line),
            LineClass::Time => self.on_time(index, line),
            LineClass::Placeholder if self.state == State::CollectingSplits => {
                self.push_time(line.trim().to_string());
            }
            LineClass::Delta => {
                if let Some(mut run) = self.run.take() {
                    run.gap = Some(line.trim().to_string());
                    self.close_run(run);
                }
                if self.entry.is_some() {
                    self.state = State::AwaitingRunSpeed;
                }
            }
            LineClass::Placeholder | LineClass::Upper | LineClass::Other => {
                debug!("Page {} line {}: ignored {:?}", self.page + 1, index, line);
            }
        }
    }

    fn on_number_name(&mut self, index: usize, line: &str) {
        let Some((number, name)) = parse_number_name(line) else {
            return;
        };
        let needs_new = self
            .entry
            .as_ref()
            .map_or(true, |e| !e.identity.number.is_empty());
        if needs_new {
            self.flush_entry();
            self.entry = Some(TrainingEntry::new(
                RiderIdentity::default(),
                self.page,
                index,
            ));
        }
        if let Some(entry) = self.entry.as_mut() {
            entry.identity.number = number;
            entry.identity.name = name;
        }
        self.state = State::AwaitingTeamOrNat;
    }

    fn on_speed(&mut self, index: usize, line: &str) {
        if self.entry.is_none() {
            self.discard(index, line, "speed before any rider");
            return;
        }
        if let Some(run) = self.run.take() {
            self.close_run(run);
        }
        if self.run_limit_reached() {
            self.discard(index, line, "run limit reached");
            self.state = State::AwaitingDelta;
            return;
        }
        let (value, speed_rank) = split_value_and_rank(line);
        self.run = Some(TrainingRun {
            speed: parse_speed(&value),
            speed_rank,
            line: index,
            ..Default::default()
        });
        self.state = State::CollectingSplits;
    }

    fn on_time(&mut self, index: usize, line: &str) {
        let token = line.trim().to_string();
        match self.state {
            State::CollectingSplits => self.push_time(token),
            State::AwaitingDelta => self.discard(index, line, "best-of column"),
            State::AwaitingRunSpeed | State::AwaitingTeamOrNat => {
                let repeats = self
                    .entry
                    .as_ref()
                    .is_some_and(|e| e.repeats_previous_final(&token));
                if repeats {
                    self.discard(index, line, "repeats an earlier run's final time");
                } else if self.run_limit_reached() {
                    self.discard(index, line, "run limit reached");
                    self.state = State::AwaitingDelta;
                } else {
                    // Run printed without a speed line.
                    self.run = Some(TrainingRun {
                        times: vec![token],
                        line: index,
                        ..Default::default()
                    });
                    self.state = State::CollectingSplits;
                }
            }
            State::AwaitingRider => self.discard(index, line, "time before any rider"),
        }
    }

    /// Append to the open run; a placeholder keeps its slot so later
    /// splits stay at their checkpoint.
    fn push_time(&mut self, token: String) {
        let cap = self.config.max_times_per_run;
        if let Some(run) = self.run.as_mut() {
            run.times.push(token);
            if run.times.len() >= cap {
                self.state = State::AwaitingDelta;
            }
        }
    }

    fn run_limit_reached(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.runs.len() >= self.config.max_runs)
    }

    fn close_run(&mut self, run: TrainingRun) {
        if let Some(entry) = self.entry.as_mut() {
            entry.runs.push(run);
        }
    }

    fn flush_entry(&mut self) {
        if let Some(run) = self.run.take() {
            self.close_run(run);
        }
        if let Some(entry) = self.entry.take() {
            if entry.identity.number.is_empty() {
                debug!(
                    "Page {} line {}: rank line without rider, dropped",
                    entry.source.page, entry.source.line
                );
            } else {
                self.done.push(entry);
            }
        }
    }

    fn discard(&mut self, index: usize, line: &str, reason: &str) {
        debug!(
            "Page {} line {}: discarded {:?} ({})",
            self.page + 1,
            index,
            line,
            reason
        );
        self.diagnostics.push(Diagnostic {
            page: self.page + 1,
            line: index,
            kind: DiagnosticKind::LineDiscarded {
                text: line.trim().to_string(),
                reason: reason.to_string(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Nr Name / UCI MTB Team";

    fn page(n: usize, lines: &[&str]) -> PageLines {
        PageLines::new(n, &lines.join("\n"))
    }

    #[test]
    fn classifies_training_lines() {
        assert_eq!(classify_line("1."), LineClass::Rank);
        assert_eq!(classify_line("12 SMITH JOHN"), LineClass::NumberName);
        assert_eq!(classify_line("GBR"), LineClass::Upper);
        assert_eq!(classify_line("MS MONDRAKER TEAM"), LineClass::Upper);
        assert_eq!(classify_line("56.123kmh"), LineClass::Speed);
        assert_eq!(classify_line("56.1"), LineClass::Speed);
        assert_eq!(classify_line("0:32.100"), LineClass::Time);
        assert_eq!(classify_line("2:45.300 (4)"), LineClass::Time);
        assert_eq!(classify_line("+1.200"), LineClass::Delta);
        assert_eq!(classify_line("+0:01.200"), LineClass::Delta);
        assert_eq!(classify_line("-"), LineClass::Placeholder);
        assert_eq!(classify_line("Best"), LineClass::Other);
    }

    #[test]
    fn reads_rider_with_two_runs() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let p = page(
            0,
            &[
                "Timed Training",
                HEADER,
                "1.",
                "12 SMITH JOHN",
                "MS MONDRAKER TEAM",
                "GBR",
                "55.1",
                "0:30.000",
                "1:00.000",
                "2:30.000",
                "+0.000",
                "56.2kmh",
                "0:29.500",
                "0:59.000",
                "2:28.000",
                "+0.000",
            ],
        );
        let entries = m.scan_page(&p);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.identity.rank, Some(1));
        assert_eq!(e.identity.number, "12");
        assert_eq!(e.identity.team.as_deref(), Some("MS MONDRAKER TEAM"));
        assert_eq!(e.identity.country.as_deref(), Some("GBR"));
        assert_eq!(e.runs.len(), 2);
        assert_eq!(e.runs[0].times.len(), 3);
        assert_eq!(e.runs[0].gap.as_deref(), Some("+0.000"));
        assert_eq!(e.runs[1].speed, Some(56.2));
        assert_eq!(m.state(), State::AwaitingRider);
    }

    #[test]
    fn best_column_is_discarded() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let p = page(
            0,
            &[
                HEADER, "1.", "7 DOE JANE", "FRA", "50.0", "0:40.000", "3:00.000", "+0.000",
                "Best", "3:00.000",
            ],
        );
        let entries = m.scan_page(&p);
        assert_eq!(entries[0].runs.len(), 1);
        let diags = m.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].kind, DiagnosticKind::LineDiscarded { .. }));
    }

    #[test]
    fn number_line_without_rank_starts_new_rider() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let p = page(
            0,
            &[
                HEADER, "3 ONE RIDER", "GBR", "50.0", "0:40.000", "3:00.000", "+1.000",
                "4 TWO RIDER", "FRA", "51.0", "0:41.000", "3:01.000", "+2.000",
            ],
        );
        let entries = m.scan_page(&p);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identity.rank, None);
        assert_eq!(entries[1].identity.name, "TWO RIDER");
        assert_eq!(entries[1].identity.country.as_deref(), Some("FRA"));
    }

    #[test]
    fn run_limit_drops_extra_runs() {
        let config = ExtractionConfig::builder().max_runs(1).build().unwrap();
        let mut m = TrainingMachine::new(&config);
        let p = page(
            0,
            &[
                HEADER, "1.", "7 DOE JANE", "FRA", "50.0", "0:40.000", "3:00.000", "+0.000",
                "51.0", "0:39.000", "2:59.000", "+0.000",
            ],
        );
        let entries = m.scan_page(&p);
        assert_eq!(entries[0].runs.len(), 1);
        assert!(!m.take_diagnostics().is_empty());
    }

    #[test]
    fn pages_before_header_are_skipped_and_continuations_read() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let cover = page(0, &["1.", "99 NOT A RIDER", "GBR", "50.0", "1:00.000"]);
        assert!(m.scan_page(&cover).is_empty());

        let first = page(1, &[HEADER, "1.", "7 DOE JANE", "FRA", "50.0", "0:40.000", "3:00.000"]);
        assert_eq!(m.scan_page(&first).len(), 1);

        let cont = page(2, &["2.", "8 ROE RICH", "USA", "49.0", "0:41.000", "3:02.000", "+2.000"]);
        let entries = m.scan_page(&cont);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source.page, 3);
    }

    #[test]
    fn dash_split_keeps_its_position() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let p = page(
            0,
            &[
                HEADER, "2.", "8 DOE JANE", "FRA", "54.0", "0:31.000", "-", "1:32.000",
                "2:02.000", "+2.000",
            ],
        );
        let entries = m.scan_page(&p);
        assert_eq!(
            entries[0].runs[0].times,
            vec!["0:31.000", "-", "1:32.000", "2:02.000"]
        );

        let records = crate::pipeline::decode::decode_training_entry(&entries[0]);
        let splits: Vec<_> = records[0].splits.iter().map(|s| s.time).collect();
        assert!(splits[0].is_some());
        assert!(splits[1].is_none());
        assert_eq!(splits[2].map(RaceTime::millis), Some(92_000));
        assert_eq!(records[0].final_time.raw(), "2:02.000");
    }

    #[test]
    fn dash_outside_a_run_is_ignored() {
        let config = ExtractionConfig::default();
        let mut m = TrainingMachine::new(&config);
        let p = page(0, &[HEADER, "1.", "7 DOE JANE", "-", "FRA", "50.0", "0:40.000", "3:00.000"]);
        let entries = m.scan_page(&p);
        assert_eq!(entries[0].runs[0].times, vec!["0:40.000", "3:00.000"]);
        assert!(m.take_diagnostics().is_empty());
    }
}
