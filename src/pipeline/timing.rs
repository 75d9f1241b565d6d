//! Duration handling: strict parsing, canonical seconds, display rendering.
//!
//! Timing sheets print every duration as `M:SS.fff`. Internally a duration is
//! a [`RaceTime`] holding floating-point seconds; arithmetic goes through
//! whole milliseconds so that `render(parse(t)) == t` for every canonical
//! string and subtraction never accumulates float drift.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// `minutes:seconds.fraction`, the only accepted duration shape.
static RE_STRICT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):([0-5]\d)\.(\d{1,6})$").unwrap());

/// `<value> (<rank>)` with an optional space before the parenthetical.
static RE_VALUE_RANK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<value>.*?)\s*\((?P<rank>[^()]*)\)$").unwrap());

/// A non-negative race duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceTime(f64);

impl RaceTime {
    pub const ZERO: RaceTime = RaceTime(0.0);

    pub fn from_secs_f64(secs: f64) -> Self {
        RaceTime(secs)
    }

    pub fn from_millis(ms: i64) -> Self {
        RaceTime(ms as f64 / 1000.0)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Whole milliseconds, rounded to nearest.
    pub fn millis(self) -> i64 {
        (self.0 * 1000.0).round() as i64
    }

    /// Parse a strict `M:SS.fff` string. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = RE_STRICT_TIME.captures(s.trim())?;
        let minutes: u32 = caps[1].parse().ok()?;
        let seconds: f64 = format!("{}.{}", &caps[2], &caps[3]).parse().ok()?;
        Some(RaceTime(f64::from(minutes) * 60.0 + seconds))
    }

    /// `self − earlier`, or `None` when the result would be negative.
    ///
    /// A negative interval cannot be rendered as `M:SS.fff`, so it is treated
    /// as an unavailable value rather than a time.
    pub fn checked_sub(self, earlier: RaceTime) -> Option<RaceTime> {
        let diff = self.millis() - earlier.millis();
        (diff >= 0).then(|| RaceTime::from_millis(diff))
    }

    /// Render as `M:SS.mmm`.
    pub fn render(self) -> String {
        let ms = self.millis().max(0);
        let minutes = ms / 60_000;
        let rem = ms % 60_000;
        format!("{}:{:02}.{:03}", minutes, rem / 1000, rem % 1000)
    }
}

impl Add for RaceTime {
    type Output = RaceTime;

    fn add(self, rhs: RaceTime) -> RaceTime {
        RaceTime::from_millis(self.millis() + rhs.millis())
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// `true` iff `s` matches the strict `M:SS.fff` shape.
pub fn is_valid_time_format(s: &str) -> bool {
    RaceTime::parse(s).is_some()
}

/// Split `"0:32.100 (2)"` into `("0:32.100", Some(2))`.
///
/// A field without a trailing parenthetical yields `None` for the rank rather
/// than failing; so does a parenthetical that is not a number.
pub fn split_value_and_rank(field: &str) -> (String, Option<u32>) {
    let field = field.trim();
    match RE_VALUE_RANK.captures(field) {
        Some(caps) => {
            let value = caps["value"].trim().to_string();
            let rank = caps["rank"].trim().parse().ok();
            (value, rank)
        }
        None => (field.to_string(), None),
    }
}

/// Parse a speed token such as `45.2`, `56.123kmh` or `56.1 km/h`.
pub fn parse_speed(token: &str) -> Option<f64> {
    let token = token.trim();
    let numeric = token
        .strip_suffix("km/h")
        .or_else(|| token.strip_suffix("kmh"))
        .unwrap_or(token)
        .trim();
    numeric.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_canonical_times() {
        assert_eq!(RaceTime::parse("0:32.100").map(RaceTime::millis), Some(32_100));
        assert_eq!(RaceTime::parse("2:45.300").map(RaceTime::millis), Some(165_300));
        assert_eq!(RaceTime::parse("10:00.5").map(RaceTime::millis), Some(600_500));
        assert_eq!(RaceTime::parse(" 1:04.220 ").map(RaceTime::millis), Some(64_220));
    }

    #[test]
    fn rejects_non_times() {
        for bad in ["-", "N/A", "DNF", "DSQ", "45.2", "1:4", "1:75.000", "Average", "", "+0:01.200"] {
            assert!(RaceTime::parse(bad).is_none(), "{bad:?} should not parse");
            assert!(!is_valid_time_format(bad));
        }
    }

    #[test]
    fn seconds_need_two_digits() {
        for bad in ["1:5.000", "0:7.25", "2:0.100"] {
            assert!(RaceTime::parse(bad).is_none(), "{bad:?} should not parse");
            assert!(!is_valid_time_format(bad));
        }
        assert_eq!(RaceTime::parse("1:05.000").map(RaceTime::millis), Some(65_000));
    }

    #[test]
    fn renders_minutes_seconds_millis() {
        assert_eq!(RaceTime::from_millis(32_120).render(), "0:32.120");
        assert_eq!(RaceTime::from_millis(165_300).render(), "2:45.300");
        assert_eq!(RaceTime::from_secs_f64(61.0).to_string(), "1:01.000");
    }

    #[test]
    fn checked_sub_refuses_negative() {
        let a = RaceTime::parse("1:04.220").unwrap();
        let b = RaceTime::parse("0:32.100").unwrap();
        assert_eq!(a.checked_sub(b).map(RaceTime::render).as_deref(), Some("0:32.120"));
        assert!(b.checked_sub(a).is_none());
    }

    #[test]
    fn splits_value_and_rank() {
        assert_eq!(split_value_and_rank("0:32.100 (2)"), ("0:32.100".into(), Some(2)));
        assert_eq!(split_value_and_rank("45.2 (3)"), ("45.2".into(), Some(3)));
        assert_eq!(split_value_and_rank("0:32.100(12)"), ("0:32.100".into(), Some(12)));
        assert_eq!(split_value_and_rank("2:45.300"), ("2:45.300".into(), None));
        assert_eq!(split_value_and_rank("- (-)"), ("-".into(), None));
    }

    #[test]
    fn parses_speed_with_units() {
        assert_eq!(parse_speed("45.2"), Some(45.2));
        assert_eq!(parse_speed("56.123kmh"), Some(56.123));
        assert_eq!(parse_speed("56.1 km/h"), Some(56.1));
        assert_eq!(parse_speed("-"), None);
    }

    proptest! {
        #[test]
        fn prop_render_parse_round_trip(m in 0u32..60, s in 0u32..60, ms in 0u32..1000) {
            let text = format!("{m}:{s:02}.{ms:03}");
            let parsed = RaceTime::parse(&text).expect("canonical time parses");
            prop_assert_eq!(parsed.render(), text);
        }

        #[test]
        fn prop_sub_then_add_restores(a in 0i64..3_600_000, b in 0i64..3_600_000) {
            let (lo, hi) = (a.min(b), a.max(b));
            let diff = RaceTime::from_millis(hi).checked_sub(RaceTime::from_millis(lo)).unwrap();
            prop_assert_eq!((diff + RaceTime::from_millis(lo)).millis(), hi);
        }
    }
}
