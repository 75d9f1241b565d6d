//! Field decoder: rider window or training entry → [`RiderRecord`].
//!
//! Event windows are decoded by indexing through a [`FieldSchema`]; training
//! entries arrive already classified by the state machine in
//! [`super::training`] and only need their runs unfolded.
//!
//! Time fields are kept as printed here. Whether they are usable is decided
//! by [`super::validate`], so a DNF rider still decodes with full identity.

use super::schema::{FieldSchema, NUMBER_NAME_OFFSET, RANK_OFFSET};
use super::timing::{parse_speed, split_value_and_rank};
use super::training::TrainingEntry;
use crate::error::WindowError;
use crate::record::{FinalTime, RiderIdentity, RiderRecord, SourceSpan, TimedField};
use once_cell::sync::Lazy;
use regex::Regex;

/// `1.` or `1. P` (rank with an optional protection marker).
static RE_RANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<rank>\d+)\.(?:\s+(?P<mark>\S+))?$").unwrap());

/// `12 SMITH JOHN`.
static RE_NUMBER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<number>\d+)\s+(?P<name>\S.*)$").unwrap());

static RE_BIRTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

static RE_POINTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());

/// A contiguous slice of one page's lines believed to hold one rider.
#[derive(Debug, Clone, Copy)]
pub struct RiderWindow<'a> {
    /// 0-indexed page.
    pub page: usize,
    /// 0-indexed line of the rank line on that page.
    pub start: usize,
    pub lines: &'a [String],
}

impl<'a> RiderWindow<'a> {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn get(&self, offset: usize) -> Option<&'a str> {
        self.lines.get(offset).map(String::as_str)
    }

    fn required(&self, offset: usize, field: &str) -> Result<&'a str, WindowError> {
        self.get(offset).ok_or_else(|| WindowError::UnexpectedToken {
            field: field.to_string(),
            offset,
            found: String::new(),
        })
    }

    pub fn source(&self) -> SourceSpan {
        SourceSpan {
            page: self.page + 1,
            line: self.start,
        }
    }
}

/// A decoded window and the number of lines it claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub record: RiderRecord,
    pub consumed: usize,
}

/// `true` if `line` can open a rider window.
pub fn is_rank_line(line: &str) -> bool {
    RE_RANK_LINE.is_match(line.trim())
}

/// Parse `"1."` / `"1. P"` into the rank and protection marker.
pub fn parse_rank_line(line: &str) -> Option<(u32, String)> {
    let caps = RE_RANK_LINE.captures(line.trim())?;
    let rank = caps["rank"].parse().ok()?;
    let mark = caps.name("mark").map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((rank, mark))
}

/// Split `"12 SMITH  JOHN"` into `("12", "SMITH JOHN")`.
pub fn parse_number_name(line: &str) -> Option<(String, String)> {
    let caps = RE_NUMBER_NAME.captures(line.trim())?;
    let name = caps["name"].split_whitespace().collect::<Vec<_>>().join(" ");
    Some((caps["number"].to_string(), name))
}

fn is_placeholder(token: &str) -> bool {
    matches!(token.trim(), "" | "-" | "N/A")
}

/// Decode one event-sheet window through `schema`.
pub fn decode_window(
    window: &RiderWindow<'_>,
    schema: &FieldSchema,
    split_count: usize,
) -> Result<Decoded, WindowError> {
    let offsets = schema.offsets(split_count);
    if window.len() < offsets.min_len {
        return Err(WindowError::TooShort {
            schema: schema.name.to_string(),
            available: window.len(),
            required: offsets.min_len,
        });
    }

    // ── Identity ─────────────────────────────────────────────────────────
    let rank_line = window.required(RANK_OFFSET, "rank")?;
    let (rank, protected) =
        parse_rank_line(rank_line).ok_or_else(|| WindowError::NotARiderStart {
            offset: RANK_OFFSET,
            found: rank_line.to_string(),
        })?;

    let number_line = window.required(NUMBER_NAME_OFFSET, "number")?;
    let (number, name) =
        parse_number_name(number_line).ok_or_else(|| WindowError::NotARiderStart {
            offset: NUMBER_NAME_OFFSET,
            found: number_line.to_string(),
        })?;

    let birth_year = window.required(schema.birth_year, "birth_year")?;
    if !is_placeholder(birth_year) && !RE_BIRTH_YEAR.is_match(birth_year) {
        return Err(WindowError::UnexpectedToken {
            field: "birth_year".into(),
            offset: schema.birth_year,
            found: birth_year.to_string(),
        });
    }

    let identity = RiderIdentity {
        rank: Some(rank),
        protected,
        number,
        name,
        team: schema.team.and_then(|o| window.get(o)).map(str::to_string),
        uci_id: schema.uci_id.and_then(|o| window.get(o)).map(str::to_string),
        country: Some(window.required(schema.country, "country")?.to_string()),
        birth_year: (!is_placeholder(birth_year)).then(|| birth_year.to_string()),
    };

    // ── Performance ──────────────────────────────────────────────────────
    let speed_field = window.required(schema.speed, "speed")?;
    let (speed_raw, speed_rank) = split_value_and_rank(speed_field);
    let speed = if is_placeholder(&speed_raw) {
        None
    } else {
        Some(parse_speed(&speed_raw).ok_or_else(|| WindowError::UnexpectedToken {
            field: "speed".into(),
            offset: schema.speed,
            found: speed_field.to_string(),
        })?)
    };

    let splits = offsets
        .splits
        .clone()
        .map(|o| {
            let (value, rank) = split_value_and_rank(window.required(o, "split")?);
            Ok(TimedField::new(value, rank))
        })
        .collect::<Result<Vec<_>, WindowError>>()?;

    let (final_raw, _) = split_value_and_rank(window.required(offsets.final_time, "final_time")?);
    let final_time = FinalTime::from_token(&final_raw);

    // The points line is absent on some rows; the next rank line or the page
    // footer then sits where points would be.
    let gap = window
        .get(offsets.gap)
        .filter(|l| !is_rank_line(l))
        .map(str::to_string);
    let points = window
        .get(offsets.points)
        .filter(|l| gap.is_some() && RE_POINTS.is_match(l.trim()))
        .map(str::to_string);
    let consumed = match (&gap, &points) {
        (_, Some(_)) => offsets.next_offset,
        (Some(_), None) => offsets.points,
        (None, _) => offsets.gap,
    };

    let mut record = RiderRecord::new(identity, final_time, window.source());
    record.speed = speed;
    record.speed_rank = speed_rank;
    record.splits = splits;
    record.gap = gap;
    record.points = points;

    Ok(Decoded { record, consumed })
}

/// Unfold a training entry into one record per run.
///
/// The last time line of a run is its finish; earlier ones are splits.
pub fn decode_training_entry(entry: &TrainingEntry) -> Vec<RiderRecord> {
    entry
        .runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            let mut times: Vec<TimedField> = run
                .times
                .iter()
                .map(|t| {
                    let (value, rank) = split_value_and_rank(t);
                    TimedField::new(value, rank)
                })
                .collect();
            let final_time = match times.pop() {
                Some(last) => FinalTime::from_token(&last.raw),
                None => FinalTime::Invalid(String::new()),
            };

            let mut record = RiderRecord::new(
                entry.identity.clone(),
                final_time,
                SourceSpan {
                    page: entry.source.page,
                    line: run.line,
                },
            );
            record.run = Some(i as u32 + 1);
            record.speed = run.speed;
            record.speed_rank = run.speed_rank;
            record.splits = times;
            record.gap = run.gap.clone();
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::{COMPACT_TEAM, EVENT_NO_TEAM, EVENT_TEAM};
    use crate::pipeline::training::TrainingRun;
    use crate::record::TerminalStatus;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn compact_window() -> Vec<String> {
        lines(&[
            "1.",
            "12 SMITH JOHN",
            "TEAMX",
            "GBR",
            "1995",
            "45.2 (3)",
            "0:32.100 (2)",
            "1:04.220 (1)",
            "1:38.900 (4)",
            "2:10.050 (2)",
            "2:45.300",
            "+0:01.200",
            "10",
        ])
    }

    fn event_team_window(final_time: &str) -> Vec<String> {
        lines(&[
            "3.",
            "7 DOE JANE",
            "JANE",
            "DOE",
            "ELITE",
            "MS MONDRAKER TEAM",
            "10012345678",
            "FRA",
            "1998",
            "58.4 (1)",
            "0:31.000 (1)",
            "1:03.500 (3)",
            "1:37.000 (2)",
            "2:09.000 (1)",
            final_time,
            "x",
            "x",
            "x",
            "+0:00.300",
            "150",
        ])
    }

    #[test]
    fn decodes_compact_team_window() {
        let l = compact_window();
        let w = RiderWindow { page: 0, start: 24, lines: &l };
        let d = decode_window(&w, &COMPACT_TEAM, 4).unwrap();
        let r = d.record;
        assert_eq!(r.identity.rank, Some(1));
        assert_eq!(r.identity.number, "12");
        assert_eq!(r.identity.name, "SMITH JOHN");
        assert_eq!(r.identity.team.as_deref(), Some("TEAMX"));
        assert_eq!(r.identity.country.as_deref(), Some("GBR"));
        assert_eq!(r.identity.birth_year.as_deref(), Some("1995"));
        assert_eq!(r.speed, Some(45.2));
        assert_eq!(r.speed_rank, Some(3));
        let ranks: Vec<_> = r.splits.iter().map(|s| s.printed_rank).collect();
        assert_eq!(ranks, vec![Some(2), Some(1), Some(4), Some(2)]);
        assert_eq!(r.final_time.raw(), "2:45.300");
        assert_eq!(r.gap.as_deref(), Some("+0:01.200"));
        assert_eq!(r.points.as_deref(), Some("10"));
        assert_eq!(d.consumed, 13);
        assert_eq!(r.source, SourceSpan { page: 1, line: 24 });
    }

    #[test]
    fn decodes_event_team_window() {
        let l = event_team_window("2:40.100");
        let w = RiderWindow { page: 2, start: 30, lines: &l };
        let d = decode_window(&w, &EVENT_TEAM, 4).unwrap();
        assert_eq!(d.record.identity.team.as_deref(), Some("MS MONDRAKER TEAM"));
        assert_eq!(d.record.identity.uci_id.as_deref(), Some("10012345678"));
        assert_eq!(d.record.speed, Some(58.4));
        assert_eq!(d.record.splits.len(), 4);
        assert_eq!(d.record.points.as_deref(), Some("150"));
        assert_eq!(d.consumed, 20);
    }

    #[test]
    fn missing_points_claims_one_line_less() {
        let mut l = event_team_window("2:40.100");
        l[19] = "4.".into();
        let w = RiderWindow { page: 0, start: 0, lines: &l };
        let d = decode_window(&w, &EVENT_TEAM, 4).unwrap();
        assert!(d.record.points.is_none());
        assert_eq!(d.consumed, 19);
    }

    #[test]
    fn footer_after_last_row_is_not_points() {
        let mut l = event_team_window("2:40.100");
        l[19] = "Jury president: MAYR Peter".into();
        let w = RiderWindow { page: 0, start: 0, lines: &l };
        let d = decode_window(&w, &EVENT_TEAM, 4).unwrap();
        assert_eq!(d.record.gap.as_deref(), Some("+0:00.300"));
        assert!(d.record.points.is_none());
        assert_eq!(d.consumed, 19);
    }

    #[test]
    fn terminal_status_still_decodes_identity() {
        let l = event_team_window("DNF");
        let w = RiderWindow { page: 0, start: 0, lines: &l };
        let d = decode_window(&w, &EVENT_TEAM, 4).unwrap();
        assert_eq!(d.record.final_time, FinalTime::Status(TerminalStatus::Dnf));
        assert_eq!(d.record.identity.name, "DOE JANE");
        assert_eq!(d.consumed, 20);
    }

    #[test]
    fn short_window_is_rejected() {
        let l = event_team_window("2:40.100");
        let w = RiderWindow { page: 0, start: 0, lines: &l[..12] };
        assert!(matches!(
            decode_window(&w, &EVENT_NO_TEAM, 4),
            Err(WindowError::TooShort { available: 12, required: 19, .. })
        ));
    }

    #[test]
    fn misaligned_speed_is_unexpected_token() {
        let mut l = compact_window();
        l[5] = "FAST".into();
        let w = RiderWindow { page: 0, start: 0, lines: &l };
        assert!(matches!(
            decode_window(&w, &COMPACT_TEAM, 4),
            Err(WindowError::UnexpectedToken { offset: 5, .. })
        ));
    }

    #[test]
    fn rank_and_name_lines() {
        assert_eq!(parse_rank_line("1."), Some((1, String::new())));
        assert_eq!(parse_rank_line("14. P"), Some((14, "P".into())));
        assert_eq!(parse_rank_line("45.2 (3)"), None);
        assert!(!is_rank_line("45.2"));
        assert_eq!(
            parse_number_name("12  SMITH   JOHN"),
            Some(("12".into(), "SMITH JOHN".into()))
        );
        assert_eq!(parse_number_name("SMITH JOHN"), None);
    }

    #[test]
    fn training_entry_unfolds_runs() {
        let entry = TrainingEntry {
            identity: RiderIdentity {
                number: "5".into(),
                name: "ROE RICHARD".into(),
                ..Default::default()
            },
            runs: vec![
                TrainingRun {
                    speed: Some(55.0),
                    times: vec!["0:30.000".into(), "1:00.000".into(), "2:30.000".into()],
                    gap: Some("+0:02.000".into()),
                    line: 10,
                    ..Default::default()
                },
                TrainingRun {
                    speed: Some(56.0),
                    times: vec!["0:29.000".into(), "2:28.000".into()],
                    line: 16,
                    ..Default::default()
                },
            ],
            source: SourceSpan { page: 1, line: 8 },
        };
        let records = decode_training_entry(&entry);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].run, Some(1));
        assert_eq!(records[0].splits.len(), 2);
        assert_eq!(records[0].final_time.raw(), "2:30.000");
        assert_eq!(records[1].run, Some(2));
        assert_eq!(records[1].splits.len(), 1);
        assert_eq!(records[1].source.line, 16);
    }
}
