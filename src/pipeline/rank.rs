//! Competition ranking ("1224") over table columns.
//!
//! Equal values share the lowest rank of their group and the next distinct
//! value skips ahead by the group size. Unavailable values never take part:
//! they all receive `available + 1`, one worse than every real value.
//!
//! Durations are compared in whole milliseconds so that two times printed
//! identically always tie.

use super::timing::RaceTime;
use crate::output::TableRow;

/// Ascending competition ranks for `values`; `None` ranks last.
pub fn competition_rank<K: Ord + Copy>(values: &[Option<K>]) -> Vec<u32> {
    let mut present: Vec<(K, usize)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|k| (k, i)))
        .collect();
    present.sort_unstable();

    let worst = present.len() as u32 + 1;
    let mut ranks = vec![worst; values.len()];
    let mut prev: Option<(K, u32)> = None;
    for (pos, (key, idx)) in present.into_iter().enumerate() {
        let rank = match prev {
            Some((k, r)) if k == key => r,
            _ => pos as u32 + 1,
        };
        ranks[idx] = rank;
        prev = Some((key, rank));
    }
    ranks
}

/// Smallest duration = rank 1.
pub fn rank_times(values: &[Option<RaceTime>]) -> Vec<u32> {
    let keys: Vec<Option<i64>> = values.iter().map(|v| v.map(RaceTime::millis)).collect();
    competition_rank(&keys)
}

/// Highest speed = rank 1. Speeds compare at 0.001 km/h.
pub fn rank_speeds(values: &[Option<f64>]) -> Vec<u32> {
    let keys: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.filter(|s| s.is_finite()).map(|s| -(s * 1000.0).round() as i64))
        .collect();
    competition_rank(&keys)
}

/// Where speed ranks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedRanking {
    /// Keep the ranks printed beside the speed.
    Printed,
    /// Rank speeds across the table's rows.
    Computed,
}

impl SpeedRanking {
    /// Printed ranks are used only when every row with a speed has one.
    pub fn for_rows(rows: &[TableRow]) -> Self {
        let complete = rows.iter().any(|r| r.speed.is_some())
            && rows
                .iter()
                .all(|r| r.speed.is_none() || r.speed_rank.is_some());
        if complete {
            SpeedRanking::Printed
        } else {
            SpeedRanking::Computed
        }
    }
}

/// Fill every rank column of `rows` from its values.
///
/// Split, sector and cumulative columns are ranked independently of one
/// another and of any rank printed on the sheet.
pub fn rank_table(rows: &mut [TableRow], speed: SpeedRanking) {
    if rows.is_empty() {
        return;
    }

    let finals: Vec<Option<RaceTime>> = rows.iter().map(|r| Some(r.final_time)).collect();
    for (row, rank) in rows.iter_mut().zip(rank_times(&finals)) {
        row.time_rank = rank;
    }

    if speed == SpeedRanking::Computed {
        let speeds: Vec<Option<f64>> = rows.iter().map(|r| r.speed).collect();
        for (row, rank) in rows.iter_mut().zip(rank_speeds(&speeds)) {
            row.speed_rank = Some(rank);
        }
    }

    let width = rows.iter().map(|r| r.splits.len()).max().unwrap_or(0);
    for col in 0..width {
        rank_column(rows, |r| r.splits.get(col).copied().flatten(), |r, k| {
            set_at(&mut r.split_ranks, col, k)
        });
        rank_column(rows, |r| r.cumulative.get(col).copied().flatten(), |r, k| {
            set_at(&mut r.cumulative_ranks, col, k)
        });
    }
    for col in 0..=width {
        rank_column(rows, |r| r.sectors.get(col).copied().flatten(), |r, k| {
            set_at(&mut r.sector_ranks, col, k)
        });
    }
}

fn rank_column(
    rows: &mut [TableRow],
    value: impl Fn(&TableRow) -> Option<RaceTime>,
    mut store: impl FnMut(&mut TableRow, u32),
) {
    let values: Vec<Option<RaceTime>> = rows.iter().map(&value).collect();
    for (row, rank) in rows.iter_mut().zip(rank_times(&values)) {
        store(row, rank);
    }
}

fn set_at(ranks: &mut Vec<u32>, col: usize, rank: u32) {
    if ranks.len() <= col {
        ranks.resize(col + 1, 0);
    }
    ranks[col] = rank;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ties_share_minimum_rank() {
        assert_eq!(
            competition_rank(&[Some(10), Some(20), Some(10), Some(30)]),
            vec![1, 3, 1, 4]
        );
    }

    #[test]
    fn unavailable_ranks_after_all_values() {
        assert_eq!(
            competition_rank(&[None, Some(5), Some(3), None]),
            vec![3, 2, 1, 3]
        );
        assert_eq!(competition_rank::<i64>(&[None, None]), vec![1, 1]);
        assert!(competition_rank::<i64>(&[]).is_empty());
    }

    #[test]
    fn times_rank_by_millisecond() {
        let v = [
            RaceTime::parse("0:32.100"),
            RaceTime::parse("0:31.000"),
            RaceTime::parse("0:32.1000"),
            None,
        ];
        assert_eq!(rank_times(&v), vec![2, 1, 2, 4]);
    }

    #[test]
    fn faster_speed_ranks_first() {
        assert_eq!(rank_speeds(&[Some(45.2), Some(58.4), None, Some(45.2)]), vec![2, 1, 4, 2]);
    }

    #[test]
    fn thirty_distinct_values_rank_one_to_thirty() {
        let v: Vec<Option<RaceTime>> = (0..30)
            .map(|i| Some(RaceTime::from_millis(30_000 + i * 10)))
            .collect();
        assert_eq!(rank_times(&v), (1..=30).collect::<Vec<u32>>());
    }

    proptest! {
        #[test]
        fn prop_competition_ranking_law(values in prop::collection::vec(prop::option::of(0i64..20), 0..40)) {
            let ranks = competition_rank(&values);
            let present: Vec<i64> = values.iter().flatten().copied().collect();
            for (v, r) in values.iter().zip(&ranks) {
                match v {
                    Some(x) => {
                        let better = present.iter().filter(|y| *y < x).count() as u32;
                        prop_assert_eq!(*r, better + 1);
                    }
                    None => prop_assert_eq!(*r, present.len() as u32 + 1),
                }
            }
        }
    }
}
