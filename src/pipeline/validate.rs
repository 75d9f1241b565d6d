//! Validation: decide which decoded records may be ranked.
//!
//! Only the finish and the last regular split are required. Intermediate
//! splits may be `-` or otherwise unreadable; they become unavailable values
//! in [`super::derive`] without costing the rider their row.

use super::timing::{is_valid_time_format, RaceTime};
use crate::config::ExtractionConfig;
use crate::error::Rejection;
use crate::record::{FinalTime, RiderRecord};

/// A record whose required fields are valid durations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub record: RiderRecord,
    pub final_time: RaceTime,
}

/// Accept or reject one record.
///
/// Checks run in order: terminal status, non-data tokens in the required
/// fields, then strict format of the final time and the last split.
pub fn validate(record: RiderRecord, config: &ExtractionConfig) -> Result<ValidRecord, Rejection> {
    if !record.is_finisher() {
        return Err(Rejection::TerminalStatus(record.final_time.raw()));
    }

    let final_raw = record.final_time.raw();
    if let Some(token) = config.non_data_token(&final_raw) {
        return Err(Rejection::NonDataToken {
            field: "final_time".into(),
            token: token.to_string(),
        });
    }

    let last = record.last_split().ok_or(Rejection::NoSplits)?;
    if let Some(token) = config.non_data_token(&last.raw) {
        return Err(Rejection::NonDataToken {
            field: format!("split_{}", record.splits.len()),
            token: token.to_string(),
        });
    }

    let final_time = match (&record.final_time, is_valid_time_format(&final_raw)) {
        (FinalTime::Time(t), true) => *t,
        _ => return Err(Rejection::InvalidFinalTime(final_raw)),
    };
    if last.time.is_none() {
        return Err(Rejection::InvalidLastSplit(last.raw.clone()));
    }

    Ok(ValidRecord { record, final_time })
}
