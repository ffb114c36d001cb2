//! Work-hour aggregation over scan events.
//!
//! Scan events are grouped by `(identity, calendar date)` into daily
//! summaries: the first scan of the day stands in for clock-in and the last
//! for clock-out. Daily summaries are then grouped by identity into totals
//! over the queried range.

use crate::types::AttendanceEntry;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// One identity's attendance on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub identity_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub date: NaiveDate,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
    pub scan_count: u32,
    /// Hours between first and last scan; `0.0` when there was a single scan.
    pub hours: f64,
}

/// One identity's attendance totals across the queried range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalSummary {
    pub identity_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub distinct_day_count: u32,
    /// Sum of daily hours, rounded to 2 decimal places.
    pub total_hours: f64,
    pub total_scan_count: u32,
}

/// Round to 2 decimal places for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Group scan events into per-(identity, date) summaries.
///
/// Output is ordered by identity id, then date. Input order does not matter.
pub fn aggregate_daily(entries: &[AttendanceEntry]) -> Vec<DailySummary> {
    let mut groups: BTreeMap<(i64, NaiveDate), DailySummary> = BTreeMap::new();

    for entry in entries {
        let key = (entry.identity_id, entry.date());
        groups
            .entry(key)
            .and_modify(|day| {
                day.first_timestamp = day.first_timestamp.min(entry.timestamp);
                day.last_timestamp = day.last_timestamp.max(entry.timestamp);
                day.scan_count += 1;
                if day.name.is_none() {
                    day.name = entry.name.clone();
                }
                if day.department.is_none() {
                    day.department = entry.department.clone();
                }
            })
            .or_insert_with(|| DailySummary {
                identity_id: entry.identity_id,
                name: entry.name.clone(),
                department: entry.department.clone(),
                date: key.1,
                first_timestamp: entry.timestamp,
                last_timestamp: entry.timestamp,
                scan_count: 1,
                hours: 0.0,
            });
    }

    groups
        .into_values()
        .map(|mut day| {
            // A single scan cannot bound an interval, whatever its timestamps say.
            day.hours = if day.scan_count > 1 {
                let span = day.last_timestamp - day.first_timestamp;
                let seconds = match span.num_nanoseconds() {
                    Some(ns) => ns as f64 / 1e9,
                    None => span.num_milliseconds() as f64 / 1000.0,
                };
                seconds / SECONDS_PER_HOUR
            } else {
                0.0
            };
            day
        })
        .collect()
}

/// Group daily summaries into per-identity totals, ordered by identity id.
///
/// Hours are summed at full precision and rounded once at the end.
pub fn aggregate_total(daily: &[DailySummary]) -> Vec<TotalSummary> {
    struct Acc<'a> {
        first: &'a DailySummary,
        dates: BTreeSet<NaiveDate>,
        hours: f64,
        scans: u32,
    }

    let mut groups: BTreeMap<i64, Acc<'_>> = BTreeMap::new();

    for day in daily {
        let acc = groups.entry(day.identity_id).or_insert_with(|| Acc {
            first: day,
            dates: BTreeSet::new(),
            hours: 0.0,
            scans: 0,
        });
        acc.dates.insert(day.date);
        acc.hours += day.hours;
        acc.scans += day.scan_count;
    }

    groups
        .into_iter()
        .map(|(identity_id, acc)| TotalSummary {
            identity_id,
            name: acc.first.name.clone(),
            department: acc.first.department.clone(),
            distinct_day_count: acc.dates.len() as u32,
            total_hours: round2(acc.hours),
            total_scan_count: acc.scans,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn scan(identity_id: i64, date: &str, time: &str) -> AttendanceEntry {
        AttendanceEntry {
            identity_id,
            name: Some(format!("Employee {identity_id}")),
            department: Some("Assembly".into()),
            timestamp: at(date, time),
            source_device: "desktop".into(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_two_scans_bound_the_day() {
        let entries = vec![scan(1, "2024-01-10", "08:00:00"), scan(1, "2024-01-10", "17:30:00")];
        let daily = aggregate_daily(&entries);

        assert_eq!(daily.len(), 1);
        let day = &daily[0];
        assert_eq!(day.identity_id, 1);
        assert_eq!(day.date, d("2024-01-10"));
        assert_eq!(day.first_timestamp, at("2024-01-10", "08:00:00"));
        assert_eq!(day.last_timestamp, at("2024-01-10", "17:30:00"));
        assert_eq!(day.scan_count, 2);
        assert_eq!(day.hours, 9.5);
    }

    #[test]
    fn test_single_scan_has_zero_hours() {
        let daily = aggregate_daily(&[scan(1, "2024-01-11", "09:00:00")]);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].scan_count, 1);
        assert_eq!(daily[0].first_timestamp, daily[0].last_timestamp);
        assert_eq!(daily[0].hours, 0.0);
    }

    #[test]
    fn test_middle_scans_do_not_change_bounds() {
        let entries = vec![
            scan(1, "2024-01-10", "12:00:00"),
            scan(1, "2024-01-10", "17:15:00"),
            scan(1, "2024-01-10", "08:45:00"),
            scan(1, "2024-01-10", "13:00:00"),
        ];
        let daily = aggregate_daily(&entries);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].scan_count, 4);
        assert_eq!(daily[0].first_timestamp, at("2024-01-10", "08:45:00"));
        assert_eq!(daily[0].last_timestamp, at("2024-01-10", "17:15:00"));
        assert_eq!(daily[0].hours, 8.5);
    }

    #[test]
    fn test_days_and_identities_are_separate_groups() {
        let entries = vec![
            scan(2, "2024-01-10", "09:00:00"),
            scan(1, "2024-01-11", "09:00:00"),
            scan(1, "2024-01-10", "08:00:00"),
            scan(2, "2024-01-10", "18:00:00"),
            scan(1, "2024-01-10", "17:30:00"),
        ];
        let daily = aggregate_daily(&entries);

        let keys: Vec<_> = daily.iter().map(|s| (s.identity_id, s.date)).collect();
        assert_eq!(
            keys,
            vec![(1, d("2024-01-10")), (1, d("2024-01-11")), (2, d("2024-01-10"))]
        );
        assert_eq!(daily[2].hours, 9.0);
    }

    #[test]
    fn test_scans_across_midnight_split_into_two_days() {
        let entries = vec![scan(1, "2024-01-10", "22:00:00"), scan(1, "2024-01-11", "06:00:00")];
        let daily = aggregate_daily(&entries);

        assert_eq!(daily.len(), 2);
        assert!(daily.iter().all(|s| s.scan_count == 1 && s.hours == 0.0));
    }

    #[test]
    fn test_totals_across_days() {
        let entries = vec![
            scan(1, "2024-01-10", "08:00:00"),
            scan(1, "2024-01-10", "17:30:00"),
            scan(1, "2024-01-11", "09:00:00"),
        ];
        let totals = aggregate_total(&aggregate_daily(&entries));

        assert_eq!(totals.len(), 1);
        let total = &totals[0];
        assert_eq!(total.identity_id, 1);
        assert_eq!(total.name.as_deref(), Some("Employee 1"));
        assert_eq!(total.distinct_day_count, 2);
        assert_eq!(total.total_hours, 9.5);
        assert_eq!(total.total_scan_count, 3);
    }

    #[test]
    fn test_total_rounds_after_summing() {
        // 20 minutes = 0.3333.. h per day; rounding each day first would give 0.99.
        let entries = vec![
            scan(1, "2024-01-10", "08:00:00"),
            scan(1, "2024-01-10", "08:20:00"),
            scan(1, "2024-01-11", "08:00:00"),
            scan(1, "2024-01-11", "08:20:00"),
            scan(1, "2024-01-12", "08:00:00"),
            scan(1, "2024-01-12", "08:20:00"),
        ];
        let totals = aggregate_total(&aggregate_daily(&entries));
        assert_eq!(totals[0].total_hours, 1.0);
    }

    #[test]
    fn test_order_invariance() {
        let mut entries = vec![
            scan(3, "2024-02-01", "07:59:10"),
            scan(1, "2024-02-01", "08:00:00"),
            scan(1, "2024-02-01", "16:10:30"),
            scan(3, "2024-02-02", "08:30:00"),
            scan(1, "2024-02-03", "09:00:00"),
            scan(3, "2024-02-01", "17:05:45"),
            scan(3, "2024-02-02", "12:00:00"),
        ];
        let daily = aggregate_daily(&entries);
        let totals = aggregate_total(&daily);

        entries.reverse();
        assert_eq!(aggregate_daily(&entries), daily);
        assert_eq!(aggregate_total(&aggregate_daily(&entries)), totals);

        entries.rotate_left(3);
        assert_eq!(aggregate_daily(&entries), daily);
        assert_eq!(aggregate_total(&aggregate_daily(&entries)), totals);
    }

    #[test]
    fn test_deleted_identity_keeps_its_scans() {
        let mut entry = scan(5, "2024-01-10", "08:00:00");
        entry.name = None;
        entry.department = None;
        let daily = aggregate_daily(&[entry]);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].name, None);
        assert_eq!(aggregate_total(&daily)[0].name, None);
    }

    #[test]
    fn test_sub_millisecond_spans_are_kept() {
        let first = at("2024-01-10", "08:00:00");
        let last = first + chrono::Duration::microseconds(360);
        let mut a = scan(1, "2024-01-10", "08:00:00");
        let mut b = a.clone();
        a.timestamp = first;
        b.timestamp = last;

        let daily = aggregate_daily(&[b, a]);
        assert_eq!(daily[0].scan_count, 2);
        assert!((daily[0].hours - 1e-7).abs() < 1e-15);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_daily(&[]).is_empty());
        assert!(aggregate_total(&[]).is_empty());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(9.499999), 9.5);
        assert_eq!(round2(0.333333), 0.33);
        assert_eq!(round2(0.0), 0.0);
    }
}
