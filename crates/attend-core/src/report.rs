//! Flat report rows and CSV export.
//!
//! Column order is fixed:
//! - daily: `identity_id, name, department, date, first_in, last_out, scan_count, hours`
//! - total: `identity_id, name, department, distinct_day_count, total_hours, total_scan_count`

use crate::aggregate::{aggregate_daily, aggregate_total, round2, DailySummary, TotalSummary};
use crate::range::DateRange;
use crate::types::AttendanceEntry;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the daily table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub identity_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub date: String,
    pub first_in: String,
    pub last_out: String,
    pub scan_count: u32,
    pub hours: f64,
}

impl From<&DailySummary> for DailyRow {
    fn from(day: &DailySummary) -> Self {
        Self {
            identity_id: day.identity_id,
            name: day.name.clone(),
            department: day.department.clone(),
            date: day.date.to_string(),
            first_in: day.first_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            last_out: day.last_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            scan_count: day.scan_count,
            hours: round2(day.hours),
        }
    }
}

/// One row of the totals table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalRow {
    pub identity_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub distinct_day_count: u32,
    pub total_hours: f64,
    pub total_scan_count: u32,
}

impl From<&TotalSummary> for TotalRow {
    fn from(total: &TotalSummary) -> Self {
        Self {
            identity_id: total.identity_id,
            name: total.name.clone(),
            department: total.department.clone(),
            distinct_day_count: total.distinct_day_count,
            total_hours: total.total_hours,
            total_scan_count: total.total_scan_count,
        }
    }
}

/// Daily and total views over one date range.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub range: DateRange,
    pub daily: Vec<DailySummary>,
    pub totals: Vec<TotalSummary>,
}

impl Report {
    /// Aggregate already range-filtered attendance entries.
    pub fn build(range: DateRange, entries: &[AttendanceEntry]) -> Self {
        let daily = aggregate_daily(entries);
        let totals = aggregate_total(&daily);
        Self { range, daily, totals }
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    pub fn daily_rows(&self) -> Vec<DailyRow> {
        self.daily.iter().map(DailyRow::from).collect()
    }

    pub fn total_rows(&self) -> Vec<TotalRow> {
        self.totals.iter().map(TotalRow::from).collect()
    }
}

/// Write the daily table as CSV. An empty report yields a header-only file.
pub fn write_daily_csv<W: Write>(out: W, rows: &[DailyRow], bom: bool) -> Result<(), ReportError> {
    write_csv(out, rows, &DAILY_HEADER, bom)
}

/// Write the totals table as CSV. An empty report yields a header-only file.
pub fn write_total_csv<W: Write>(out: W, rows: &[TotalRow], bom: bool) -> Result<(), ReportError> {
    write_csv(out, rows, &TOTAL_HEADER, bom)
}

const DAILY_HEADER: [&str; 8] = [
    "identity_id",
    "name",
    "department",
    "date",
    "first_in",
    "last_out",
    "scan_count",
    "hours",
];

const TOTAL_HEADER: [&str; 6] = [
    "identity_id",
    "name",
    "department",
    "distinct_day_count",
    "total_hours",
    "total_scan_count",
];

fn write_csv<W: Write, R: Serialize>(
    mut out: W,
    rows: &[R],
    header: &[&str],
    bom: bool,
) -> Result<(), ReportError> {
    if bom {
        out.write_all(UTF8_BOM)?;
    }
    // Header is written explicitly so that empty tables still carry one.
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn entry(identity_id: i64, ts: &str) -> AttendanceEntry {
        AttendanceEntry {
            identity_id,
            name: Some("Tran Binh".into()),
            department: Some("QA".into()),
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            source_device: "desktop".into(),
        }
    }

    fn sample_report() -> Report {
        Report::build(
            DateRange::all(),
            &[
                entry(1, "2024-01-10 08:00:00"),
                entry(1, "2024-01-10 17:30:00"),
                entry(1, "2024-01-11 09:00:00"),
            ],
        )
    }

    #[test]
    fn test_daily_csv_columns_and_values() {
        let report = sample_report();
        let mut buf = Vec::new();
        write_daily_csv(&mut buf, &report.daily_rows(), false).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "identity_id,name,department,date,first_in,last_out,scan_count,hours",
                "1,Tran Binh,QA,2024-01-10,2024-01-10 08:00:00,2024-01-10 17:30:00,2,9.5",
                "1,Tran Binh,QA,2024-01-11,2024-01-11 09:00:00,2024-01-11 09:00:00,1,0.0",
            ]
        );
    }

    #[test]
    fn test_total_csv_columns_and_values() {
        let report = sample_report();
        let mut buf = Vec::new();
        write_total_csv(&mut buf, &report.total_rows(), false).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "identity_id,name,department,distinct_day_count,total_hours,total_scan_count",
                "1,Tran Binh,QA,2,9.5,3",
            ]
        );
    }

    #[test]
    fn test_bom_prefix() {
        let mut buf = Vec::new();
        write_total_csv(&mut buf, &[], true).unwrap();
        assert!(buf.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&buf[UTF8_BOM.len()..]).unwrap();
        assert_eq!(
            text.trim_end(),
            "identity_id,name,department,distinct_day_count,total_hours,total_scan_count"
        );
    }

    #[test]
    fn test_daily_row_rounds_hours() {
        let report = Report::build(
            DateRange::all(),
            &[entry(2, "2024-01-10 08:00:00"), entry(2, "2024-01-10 08:20:00")],
        );
        let rows = report.daily_rows();
        assert_eq!(rows[0].hours, 0.33);
        assert!((report.daily[0].hours - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_identity_renders_blank() {
        let mut e = entry(9, "2024-01-10 08:00:00");
        e.name = None;
        e.department = None;
        let report = Report::build(DateRange::all(), &[e]);
        let mut buf = Vec::new();
        write_daily_csv(&mut buf, &report.daily_rows(), false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\n9,,,2024-01-10,"));
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(DateRange::all(), &[]);
        assert!(report.is_empty());
        assert!(report.total_rows().is_empty());
    }
}
