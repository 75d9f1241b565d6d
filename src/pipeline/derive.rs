//! Sector and cumulative derivation.
//!
//! For splits `S1..Sn` and finish `F`:
//!
//! * `sector_1 = S1`, `sector_i = Si − (last available split before i)`;
//!   an unavailable split yields an unavailable sector and leaves the
//!   baseline where it was.
//! * `sector_(n+1) = F − Sn`.
//! * `cumulative_i = F − Si`, the time still to ride from split `i`.
//!
//! A negative difference (a misprinted split later than the next one) is
//! unavailable rather than a time.

use super::timing::RaceTime;
use super::validate::ValidRecord;
use crate::record::RiderRecord;

/// A validated record with every derived duration filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub record: RiderRecord,
    pub final_time: RaceTime,
    /// Exactly `split_count` entries; missing trailing splits are `None`.
    pub splits: Vec<Option<RaceTime>>,
    /// `split_count + 1` entries.
    pub sectors: Vec<Option<RaceTime>>,
    /// `split_count` entries.
    pub cumulative: Vec<Option<RaceTime>>,
}

/// Sectors from splits and finish, retaining the last valid baseline.
pub fn sectors(splits: &[Option<RaceTime>], final_time: RaceTime) -> Vec<Option<RaceTime>> {
    let mut out = Vec::with_capacity(splits.len() + 1);
    let mut baseline = RaceTime::ZERO;
    for split in splits {
        match split {
            Some(t) => {
                out.push(t.checked_sub(baseline));
                baseline = *t;
            }
            None => out.push(None),
        }
    }
    out.push(match splits.last() {
        Some(Some(last)) => final_time.checked_sub(*last),
        Some(None) => None,
        None => Some(final_time),
    });
    out
}

/// Remaining time from each split to the finish.
pub fn cumulative(splits: &[Option<RaceTime>], final_time: RaceTime) -> Vec<Option<RaceTime>> {
    splits
        .iter()
        .map(|s| s.and_then(|t| final_time.checked_sub(t)))
        .collect()
}

/// Derive one row, padding splits to `split_count`.
///
/// Training runs can print fewer splits than the widest run in the document.
/// The finish sector is always the last sector, so the missing middle
/// positions are padded before it.
pub fn derive(valid: ValidRecord, split_count: usize) -> DerivedRow {
    let mut splits: Vec<Option<RaceTime>> = valid.record.splits.iter().map(|s| s.time).collect();
    let printed = splits.len();
    splits.truncate(split_count);

    let mut sec = sectors(&splits, valid.final_time);
    let mut cum = cumulative(&splits, valid.final_time);
    if printed < split_count {
        let finish = sec.pop().flatten();
        let pad = split_count - printed;
        sec.extend(std::iter::repeat(None).take(pad));
        sec.push(finish);
        splits.extend(std::iter::repeat(None).take(pad));
        cum.extend(std::iter::repeat(None).take(pad));
    }

    DerivedRow {
        record: valid.record,
        final_time: valid.final_time,
        splits,
        sectors: sec,
        cumulative: cum,
    }
}
