//! Comparisons computed over an extracted table.
//!
//! These are what a results dashboard asks of the table: "how far is this
//! rider from 30th place", "what does the top ten average on sector 3",
//! "what is each rider's best run", and "what would a run made of each
//! rider's best sectors look like". Nothing here renders; every function
//! returns plain values or a new [`ResultTable`].

use crate::config::TableView;
use crate::output::{ResultTable, TableRow};
use crate::pipeline::derive::cumulative;
use crate::pipeline::rank::{rank_table, SpeedRanking};
use crate::pipeline::timing::RaceTime;
use std::collections::HashMap;

/// A duration column of the table. Indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    FinalTime,
    Split(usize),
    Sector(usize),
    /// Time from split `i` to the finish.
    Cumulative(usize),
}

impl Metric {
    pub fn value(self, row: &TableRow) -> Option<RaceTime> {
        match self {
            Metric::FinalTime => Some(row.final_time),
            Metric::Split(i) => row.splits.get(i).copied().flatten(),
            Metric::Sector(i) => row.sectors.get(i).copied().flatten(),
            Metric::Cumulative(i) => row.cumulative.get(i).copied().flatten(),
        }
    }
}

/// Index of the "Nth place" row in a table of `len` rows.
///
/// Asking for 30th place in a 25-row table yields the last row (index 24)
/// instead of running off the end. `None` for an empty table or `n == 0`.
pub fn reference_index(len: usize, n: usize) -> Option<usize> {
    (len > 0 && n > 0).then(|| len.min(n) - 1)
}

/// Available values of `metric`, fastest first.
fn sorted_values(table: &ResultTable, metric: Metric) -> Vec<RaceTime> {
    let mut values: Vec<RaceTime> = table.iter().filter_map(|r| metric.value(r)).collect();
    values.sort_by_key(|t| t.millis());
    values
}

/// The `n`th fastest value of `metric`, clamped to the slowest available.
pub fn reference_value(table: &ResultTable, metric: Metric, n: usize) -> Option<RaceTime> {
    let values = sorted_values(table, metric);
    reference_index(values.len(), n).map(|i| values[i])
}

/// Mean of the `n` fastest available values of `metric`.
pub fn top_n_average(table: &ResultTable, metric: Metric, n: usize) -> Option<RaceTime> {
    let values = sorted_values(table, metric);
    let take = values.len().min(n);
    if take == 0 {
        return None;
    }
    let total: i64 = values[..take].iter().map(|t| t.millis()).sum();
    Some(RaceTime::from_millis(
        (total as f64 / take as f64).round() as i64,
    ))
}

/// Each rider's runs grouped in order of first appearance.
fn group_by_rider(table: &ResultTable) -> Vec<Vec<&TableRow>> {
    let mut order: Vec<Vec<&TableRow>> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    for row in table.iter() {
        let slot = *index.entry(row.rider_key()).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push(row);
    }
    order
}

/// Each rider's fastest run, re-ranked among those runs only.
///
/// Ties go to the earlier run.
pub fn best_runs(table: &ResultTable) -> ResultTable {
    let mut rows: Vec<TableRow> = group_by_rider(table)
        .into_iter()
        .filter_map(|runs| {
            runs.into_iter()
                .min_by_key(|r| r.final_time.millis())
                .cloned()
        })
        .collect();
    rank_table(&mut rows, SpeedRanking::Computed);
    ResultTable {
        split_count: table.split_count,
        rows,
    }
}

/// Each rider's best sector times recomposed into one hypothetical run.
///
/// Riders with a sector they never completed in any run are left out, since
/// their recomposed finish would be meaningless.
pub fn hypothetical_best(table: &ResultTable) -> ResultTable {
    let sector_count = table.split_count + 1;
    let mut rows: Vec<TableRow> = group_by_rider(table)
        .into_iter()
        .filter_map(|runs| perfect_run(&runs, sector_count))
        .collect();
    rank_table(&mut rows, SpeedRanking::Computed);
    ResultTable {
        split_count: table.split_count,
        rows,
    }
}

fn perfect_run(runs: &[&TableRow], sector_count: usize) -> Option<TableRow> {
    let first = runs.first()?;
    let sectors: Vec<RaceTime> = (0..sector_count)
        .map(|i| {
            runs.iter()
                .filter_map(|r| r.sectors.get(i).copied().flatten())
                .min_by_key(|t| t.millis())
        })
        .collect::<Option<_>>()?;

    let mut elapsed = RaceTime::ZERO;
    let mut splits = Vec::with_capacity(sector_count - 1);
    for s in &sectors[..sector_count - 1] {
        elapsed = elapsed + *s;
        splits.push(Some(elapsed));
    }
    let final_time = elapsed + sectors[sector_count - 1];

    Some(TableRow {
        identity: first.identity.clone(),
        run: None,
        speed: runs
            .iter()
            .filter_map(|r| r.speed)
            .max_by(|a, b| a.total_cmp(b)),
        speed_rank: None,
        final_time,
        time_rank: 0,
        gap: None,
        points: None,
        split_ranks: vec![0; splits.len()],
        split_printed_ranks: vec![None; splits.len()],
        sector_ranks: vec![0; sectors.len()],
        cumulative: cumulative(&splits, final_time),
        cumulative_ranks: vec![0; splits.len()],
        sectors: sectors.into_iter().map(Some).collect(),
        splits,
        source: first.source,
    })
}

/// The table for a [`TableView`].
pub fn apply_view(table: &ResultTable, view: TableView) -> ResultTable {
    match view {
        TableView::Runs => table.clone(),
        TableView::BestRuns => best_runs(table),
        TableView::Perfect => hypothetical_best(table),
    }
}
