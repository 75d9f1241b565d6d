//! Per-layout field-offset tables and layout-signature selection.
//!
//! Every event-sheet variant maps a window of printed lines to the same named
//! fields; only the offsets differ. Each variant is one [`FieldSchema`]
//! constant, so the decoder never indexes with inline numbers and each layout
//! can be tested on its own.
//!
//! Offsets after the speed line depend on how many splits the sheet prints,
//! so they are resolved per document through [`FieldSchema::offsets`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// `45.2`, `45.2 (3)`, `56.123kmh`.
static RE_SPEED_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\s*(?:km/?h)?\s*(?:\(\d+\))?$").unwrap());

static RE_BIRTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").unwrap());

/// A birth year, or the marker printed when it is unknown.
fn is_birth_year_slot(line: &str) -> bool {
    RE_BIRTH_YEAR.is_match(line) || matches!(line, "-" | "N/A")
}

/// Which family of sheet a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SheetFamily {
    /// Fixed-offset result sheets (qualification, semi-final, final).
    #[default]
    Event,
    /// Variable-run timed-training sheets.
    Training,
}

impl std::fmt::Display for SheetFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SheetFamily::Event => "event",
            SheetFamily::Training => "training",
        })
    }
}

/// Field offsets of one fixed-layout variant, relative to the rank line.
///
/// Offsets 0 (rank) and 1 (number + name) are shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub team: Option<usize>,
    pub uci_id: Option<usize>,
    pub country: usize,
    pub birth_year: usize,
    pub speed: usize,
    /// Lines from the final time to the gap.
    gap_after_final: usize,
    /// Minimum window length minus the split count.
    min_len_base: usize,
}

/// Resolved offsets for a given split count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offsets {
    pub splits: Range<usize>,
    pub final_time: usize,
    /// Optional on compact exports.
    pub gap: usize,
    /// Optional: absent on the last row of some pages.
    pub points: usize,
    /// Windows shorter than this are never decoded.
    pub min_len: usize,
    /// Lines claimed by one decoded rider.
    pub next_offset: usize,
}

pub const RANK_OFFSET: usize = 0;
pub const NUMBER_NAME_OFFSET: usize = 1;

/// Full result sheet with a team line (20 lines).
pub const EVENT_TEAM: FieldSchema = FieldSchema {
    name: "event/team",
    team: Some(5),
    uci_id: Some(6),
    country: 7,
    birth_year: 8,
    speed: 9,
    gap_after_final: 4,
    min_len_base: 15,
};

/// Full result sheet without a team line (19 lines).
pub const EVENT_NO_TEAM: FieldSchema = FieldSchema {
    name: "event/no-team",
    team: None,
    uci_id: Some(5),
    country: 6,
    birth_year: 7,
    speed: 8,
    gap_after_final: 4,
    min_len_base: 15,
};

/// Condensed export with identity packed into the first lines.
pub const COMPACT_TEAM: FieldSchema = FieldSchema {
    name: "compact/team",
    team: Some(2),
    uci_id: None,
    country: 3,
    birth_year: 4,
    speed: 5,
    gap_after_final: 1,
    min_len_base: 7,
};

pub const COMPACT_NO_TEAM: FieldSchema = FieldSchema {
    name: "compact/no-team",
    team: None,
    uci_id: None,
    country: 2,
    birth_year: 3,
    speed: 4,
    gap_after_final: 1,
    min_len_base: 6,
};

pub const ALL_SCHEMAS: [&FieldSchema; 4] =
    [&EVENT_TEAM, &EVENT_NO_TEAM, &COMPACT_TEAM, &COMPACT_NO_TEAM];

/// Offset of the line that tells full sheets with and without a team apart.
pub const TEAM_SLOT_OFFSET: usize = 5;

impl FieldSchema {
    pub fn offsets(&self, split_count: usize) -> Offsets {
        let first_split = self.speed + 1;
        let final_time = first_split + split_count;
        let gap = final_time + self.gap_after_final;
        let points = gap + 1;
        Offsets {
            splits: first_split..final_time,
            final_time,
            gap,
            points,
            min_len: self.min_len_base + split_count,
            next_offset: points + 1,
        }
    }

    pub fn has_team(&self) -> bool {
        self.team.is_some()
    }
}

/// Choose the schema whose signature matches the window.
///
/// Compact exports are recognised by a birth year (or its `-` / `N/A`
/// placeholder) directly followed by a speed line. Everything else is a full
/// sheet, split on whether the team slot is purely numeric (a UCI id, so no
/// team) or not.
pub fn select_schema(window: &[&str]) -> &'static FieldSchema {
    let at = |i: usize| window.get(i).copied().unwrap_or("");
    let compact_at = |s: &FieldSchema| {
        is_birth_year_slot(at(s.birth_year)) && RE_SPEED_SHAPE.is_match(at(s.speed))
    };

    if compact_at(&COMPACT_TEAM) {
        &COMPACT_TEAM
    } else if compact_at(&COMPACT_NO_TEAM) {
        &COMPACT_NO_TEAM
    } else if is_all_digits(at(TEAM_SLOT_OFFSET)) {
        &EVENT_NO_TEAM
    } else {
        &EVENT_TEAM
    }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `true` if the line looks like a speed, with or without a rank or unit.
pub fn is_speed_shape(line: &str) -> bool {
    RE_SPEED_SHAPE.is_match(line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_offsets_match_printed_layout() {
        let team = EVENT_TEAM.offsets(4);
        assert_eq!(team.splits, 10..14);
        assert_eq!(team.final_time, 14);
        assert_eq!(team.gap, 18);
        assert_eq!(team.points, 19);
        assert_eq!(team.min_len, 19);
        assert_eq!(team.next_offset, 20);

        let solo = EVENT_NO_TEAM.offsets(4);
        assert_eq!(solo.splits, 9..13);
        assert_eq!(solo.final_time, 13);
        assert_eq!(solo.gap, 17);
        assert_eq!(solo.points, 18);
        assert_eq!(solo.min_len, 19);
        assert_eq!(solo.next_offset, 19);
    }

    #[test]
    fn compact_offsets() {
        let o = COMPACT_TEAM.offsets(4);
        assert_eq!(o.splits, 6..10);
        assert_eq!((o.final_time, o.gap, o.points), (10, 11, 12));
        assert_eq!(o.min_len, 11);

        let o = COMPACT_NO_TEAM.offsets(4);
        assert_eq!(o.splits, 5..9);
        assert_eq!((o.final_time, o.gap, o.points), (9, 10, 11));
        assert_eq!(o.min_len, 10);
    }

    #[test]
    fn every_schema_fits_its_minimum() {
        for s in ALL_SCHEMAS {
            let o = s.offsets(4);
            assert!(o.final_time < o.min_len, "{}: final time outside minimum", s.name);
            assert!(o.next_offset >= o.min_len, "{}", s.name);
        }
    }

    #[test]
    fn selects_compact_team() {
        let w = ["1.", "12 SMITH JOHN", "TEAMX", "GBR", "1995", "45.2 (3)", "0:32.100 (2)"];
        assert_eq!(select_schema(&w).name, "compact/team");
    }

    #[test]
    fn selects_compact_no_team() {
        let w = ["1.", "12 SMITH JOHN", "GBR", "1995", "45.2 (3)", "0:32.100 (2)"];
        assert_eq!(select_schema(&w).name, "compact/no-team");
    }

    #[test]
    fn unknown_birth_year_still_compact() {
        let w = ["1.", "12 SMITH JOHN", "GBR", "-", "45.2 (3)", "0:32.100 (2)"];
        assert_eq!(select_schema(&w).name, "compact/no-team");
        let w = ["1.", "12 SMITH JOHN", "TEAMX", "GBR", "N/A", "45.2", "0:32.100"];
        assert_eq!(select_schema(&w).name, "compact/team");
        // A dash away from the birth-year slot proves nothing.
        let w = ["1.", "12 SMITH JOHN", "-", "x", "x", "MS MONDRAKER TEAM"];
        assert_eq!(select_schema(&w).name, "event/team");
    }

    #[test]
    fn full_sheet_team_slot() {
        let mut w = vec!["1.", "12 SMITH JOHN", "x", "x", "x", "10012345678"];
        assert_eq!(select_schema(&w).name, "event/no-team");
        w[5] = "MS MONDRAKER TEAM";
        assert_eq!(select_schema(&w).name, "event/team");
    }

    #[test]
    fn speed_shapes() {
        assert!(is_speed_shape("45.2"));
        assert!(is_speed_shape("45.2 (3)"));
        assert!(is_speed_shape("56.123kmh"));
        assert!(is_speed_shape("56.1 km/h"));
        assert!(!is_speed_shape("1995"));
        assert!(!is_speed_shape("0:32.100"));
    }
}
