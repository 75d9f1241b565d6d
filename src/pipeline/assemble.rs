//! Tabular assembly: derived rows → ranked [`ResultTable`] → CSV/TSV/JSON.
//!
//! The delimited formats always carry the same columns, sized for
//! [`MAX_SPLITS`] splits, whatever the sheet printed. Cells a layout cannot
//! fill hold the configured missing marker so consumers can address every
//! column by name on every event type.

use super::derive::DerivedRow;
use super::rank::{rank_table, SpeedRanking};
use super::timing::RaceTime;
use crate::config::{OutputFormat, MAX_SPLITS};
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ResultTable, TableRow};
use std::io::Write;

/// Build the ranked table from derived rows, keeping their order.
pub fn assemble(rows: Vec<DerivedRow>, split_count: usize) -> ResultTable {
    let mut rows: Vec<TableRow> = rows.into_iter().map(into_table_row).collect();
    let speed = SpeedRanking::for_rows(&rows);
    rank_table(&mut rows, speed);
    ResultTable { split_count, rows }
}

fn into_table_row(d: DerivedRow) -> TableRow {
    let r = d.record;
    let n = d.splits.len();
    let mut printed: Vec<Option<u32>> = r.splits.iter().map(|s| s.printed_rank).collect();
    printed.resize(n, None);
    TableRow {
        identity: r.identity,
        run: r.run,
        speed: r.speed,
        speed_rank: r.speed_rank,
        final_time: d.final_time,
        time_rank: 0,
        gap: r.gap,
        points: r.points,
        split_ranks: vec![0; n],
        split_printed_ranks: printed,
        sector_ranks: vec![0; d.sectors.len()],
        cumulative_ranks: vec![0; d.cumulative.len()],
        splits: d.splits,
        sectors: d.sectors,
        cumulative: d.cumulative,
        source: r.source,
    }
}

/// Column names of the delimited formats, in order.
pub fn header() -> Vec<String> {
    let mut cols: Vec<String> = [
        "rank",
        "protected",
        "number",
        "name",
        "team",
        "uci_id",
        "country",
        "birth_year",
        "run",
        "speed",
        "speed_rank",
        "final_time",
        "time_rank",
        "gap",
        "points",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for i in 1..=MAX_SPLITS {
        cols.push(format!("split_{i}"));
        cols.push(format!("split_{i}_rank"));
        cols.push(format!("split_{i}_printed_rank"));
    }
    for i in 1..=MAX_SPLITS + 1 {
        cols.push(format!("sector_{i}"));
        cols.push(format!("sector_{i}_rank"));
    }
    for i in 1..=MAX_SPLITS {
        cols.push(format!("cumulative_from_split_{i}"));
        cols.push(format!("cumulative_from_split_{i}_rank"));
    }
    cols.push("page".into());
    cols.push("line".into());
    cols
}

/// One table row rendered as text cells matching [`header`].
pub fn render_row(row: &TableRow, missing: &str) -> Vec<String> {
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| missing.to_string());
    let num = |v: Option<u32>| v.map_or_else(|| missing.to_string(), |n| n.to_string());
    let time = |v: Option<&Option<RaceTime>>| match v {
        Some(Some(t)) => t.render(),
        _ => missing.to_string(),
    };
    let rank = |v: Option<&u32>| v.map_or_else(|| missing.to_string(), u32::to_string);

    let id = &row.identity;
    let mut cells = vec![
        num(id.rank),
        id.protected.clone(),
        id.number.clone(),
        id.name.clone(),
        text(&id.team),
        text(&id.uci_id),
        text(&id.country),
        text(&id.birth_year),
        num(row.run),
        row.speed.map_or_else(|| missing.to_string(), |s| s.to_string()),
        num(row.speed_rank),
        row.final_time.render(),
        row.time_rank.to_string(),
        text(&row.gap),
        text(&row.points),
    ];

    for i in 0..MAX_SPLITS {
        cells.push(time(row.splits.get(i)));
        cells.push(rank(row.split_ranks.get(i)));
        cells.push(num(row.split_printed_ranks.get(i).copied().flatten()));
    }
    for i in 0..=MAX_SPLITS {
        cells.push(time(row.sectors.get(i)));
        cells.push(rank(row.sector_ranks.get(i)));
    }
    for i in 0..MAX_SPLITS {
        cells.push(time(row.cumulative.get(i)));
        cells.push(rank(row.cumulative_ranks.get(i)));
    }
    cells.push(row.source.page.to_string());
    cells.push(row.source.line.to_string());
    cells
}

/// Write the table as delimited text with a header row.
pub fn write_delimited<W: Write>(
    table: &ResultTable,
    writer: W,
    delimiter: u8,
    missing: &str,
) -> Result<(), ExtractError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    wtr.write_record(header())?;
    for row in &table.rows {
        wtr.write_record(render_row(row, missing))?;
    }
    wtr.flush()
        .map_err(|e| ExtractError::Serialisation(e.to_string()))?;
    Ok(())
}

/// Write `output` in `format`.
pub fn write_output<W: Write>(
    output: &ExtractionOutput,
    format: OutputFormat,
    missing: &str,
    mut writer: W,
) -> Result<(), ExtractError> {
    match format {
        OutputFormat::Csv => write_delimited(&output.table, writer, b',', missing),
        OutputFormat::Tsv => write_delimited(&output.table, writer, b'\t', missing),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, output)?;
            writer
                .write_all(b"\n")
                .map_err(|e| ExtractError::Serialisation(e.to_string()))
        }
    }
}

/// Render `output` in `format` to a string.
pub fn render_output(
    output: &ExtractionOutput,
    format: OutputFormat,
    missing: &str,
) -> Result<String, ExtractError> {
    let mut buf = Vec::new();
    write_output(output, format, missing, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExtractError::Serialisation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::derive::derive;
    use crate::pipeline::validate::ValidRecord;
    use crate::record::{FinalTime, RiderIdentity, RiderRecord, SourceSpan, TimedField};

    fn derived(name: &str, splits: &[(&str, Option<u32>)], final_time: &str) -> DerivedRow {
        let mut r = RiderRecord::new(
            RiderIdentity {
                rank: Some(1),
                number: "12".into(),
                name: name.into(),
                team: Some("TEAMX".into()),
                country: Some("GBR".into()),
                birth_year: Some("1995".into()),
                ..Default::default()
            },
            FinalTime::from_token(final_time),
            SourceSpan { page: 1, line: 24 },
        );
        r.speed = Some(45.2);
        r.speed_rank = Some(3);
        r.splits = splits.iter().map(|(t, k)| TimedField::new(*t, *k)).collect();
        let final_time = r.final_time.time().unwrap();
        derive(ValidRecord { record: r, final_time }, splits.len())
    }

    #[test]
    fn header_is_stable() {
        let h = header();
        assert_eq!(h[0], "rank");
        assert!(h.contains(&"sector_6_rank".to_string()));
        assert!(h.contains(&"cumulative_from_split_5".to_string()));
        assert_eq!(h.len(), 15 + MAX_SPLITS * 3 + (MAX_SPLITS + 1) * 2 + MAX_SPLITS * 2 + 2);
    }

    #[test]
    fn rows_render_with_missing_marker() {
        let table = assemble(
            vec![derived(
                "SMITH JOHN",
                &[
                    ("0:32.100", Some(2)),
                    ("1:04.220", Some(1)),
                    ("1:38.900", Some(4)),
                    ("2:10.050", Some(2)),
                ],
                "2:45.300",
            )],
            4,
        );
        let cells = render_row(&table.rows[0], "N/A");
        assert_eq!(cells.len(), header().len());
        let col = |name: &str| {
            let i = header().iter().position(|h| h == name).unwrap();
            cells[i].clone()
        };
        assert_eq!(col("name"), "SMITH JOHN");
        assert_eq!(col("uci_id"), "N/A");
        assert_eq!(col("run"), "N/A");
        assert_eq!(col("speed"), "45.2");
        assert_eq!(col("speed_rank"), "3");
        assert_eq!(col("sector_2"), "0:32.120");
        assert_eq!(col("split_1_printed_rank"), "2");
        assert_eq!(col("split_5"), "N/A");
        assert_eq!(col("sector_6"), "N/A");
        assert_eq!(col("sector_5"), "0:35.250");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let table = assemble(
            vec![
                derived("A", &[("0:30.000", None)], "1:00.000"),
                derived("B", &[("0:29.000", None)], "1:01.000"),
            ],
            1,
        );
        let mut buf = Vec::new();
        write_delimited(&table, &mut buf, b',', "N/A").unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("rank,protected,number,name"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn assembled_ranks_are_independent() {
        let table = assemble(
            vec![
                derived("A", &[("0:30.000", None)], "1:00.000"),
                derived("B", &[("0:29.000", None)], "1:01.000"),
            ],
            1,
        );
        assert_eq!(table.rows[0].time_rank, 1);
        assert_eq!(table.rows[1].time_rank, 2);
        assert_eq!(table.rows[0].split_ranks, vec![2]);
        assert_eq!(table.rows[1].split_ranks, vec![1]);
        // Sector 2: A 30.000, B 32.000.
        assert_eq!(table.rows[0].sector_ranks, vec![2, 1]);
    }
}
