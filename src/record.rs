//! Decoded, typed result for one rider in one run.

use crate::pipeline::timing::RaceTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a record came from in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    /// 1-indexed page number.
    pub page: usize,
    /// 0-indexed line within the page where the rider's entry starts.
    pub line: usize,
}

/// Non-finishing outcomes printed in place of a final time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalStatus {
    Dnf,
    Dns,
    Dsq,
}

impl TerminalStatus {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "DNF" => Some(TerminalStatus::Dnf),
            "DNS" => Some(TerminalStatus::Dns),
            "DSQ" => Some(TerminalStatus::Dsq),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerminalStatus::Dnf => "DNF",
            TerminalStatus::Dns => "DNS",
            TerminalStatus::Dsq => "DSQ",
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The finish column of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinalTime {
    Time(RaceTime),
    Status(TerminalStatus),
    /// Whatever was printed, when it is neither a time nor a status.
    Invalid(String),
}

impl FinalTime {
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        if let Some(status) = TerminalStatus::from_token(token) {
            FinalTime::Status(status)
        } else if let Some(t) = RaceTime::parse(token) {
            FinalTime::Time(t)
        } else {
            FinalTime::Invalid(token.to_string())
        }
    }

    pub fn time(&self) -> Option<RaceTime> {
        match self {
            FinalTime::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// The text as printed (or re-rendered, for times).
    pub fn raw(&self) -> String {
        match self {
            FinalTime::Time(t) => t.render(),
            FinalTime::Status(s) => s.to_string(),
            FinalTime::Invalid(raw) => raw.clone(),
        }
    }
}

/// A timed field as it appeared on the sheet, e.g. `"0:32.100 (2)"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedField {
    /// The value part, without the rank parenthetical.
    pub raw: String,
    /// Parsed duration; `None` for `-` placeholders and anything malformed.
    pub time: Option<RaceTime>,
    /// The rank printed by the timing system, if any.
    pub printed_rank: Option<u32>,
}

impl TimedField {
    pub fn new(raw: impl Into<String>, printed_rank: Option<u32>) -> Self {
        let raw = raw.into();
        let time = RaceTime::parse(&raw);
        Self {
            raw,
            time,
            printed_rank,
        }
    }
}

/// Who the rider is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiderIdentity {
    /// Printed overall rank; `None` for non-finishers and unranked training rows.
    pub rank: Option<u32>,
    /// Protection marker printed beside the rank (empty when absent).
    pub protected: String,
    /// Bib number as printed; may carry leading zeros.
    pub number: String,
    /// Name exactly as printed (`"SMITH JOHN"`).
    pub name: String,
    pub team: Option<String>,
    pub uci_id: Option<String>,
    pub country: Option<String>,
    pub birth_year: Option<String>,
}

/// One rider's result for one run or session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRecord {
    pub identity: RiderIdentity,
    /// Training run number (1-based); `None` on event sheets.
    pub run: Option<u32>,
    pub speed: Option<f64>,
    pub speed_rank: Option<u32>,
    /// Intermediate splits in course order.
    pub splits: Vec<TimedField>,
    pub final_time: FinalTime,
    /// Gap to the leader (`+0:01.200`) as printed.
    pub gap: Option<String>,
    pub points: Option<String>,
    pub source: SourceSpan,
}

impl RiderRecord {
    /// A record with identity only; performance fields are filled by the decoder.
    pub fn new(identity: RiderIdentity, final_time: FinalTime, source: SourceSpan) -> Self {
        Self {
            identity,
            run: None,
            speed: None,
            speed_rank: None,
            splits: Vec::new(),
            final_time,
            gap: None,
            points: None,
            source,
        }
    }

    pub fn is_finisher(&self) -> bool {
        !matches!(self.final_time, FinalTime::Status(_))
    }

    pub fn last_split(&self) -> Option<&TimedField> {
        self.splits.last()
    }
}
