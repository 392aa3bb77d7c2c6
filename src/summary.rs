use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, round2};

/// Status-bucket rollup over a date-filtered record slice.
#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    #[schema(example = 22)]
    pub total_days: u64,
    #[schema(example = 18)]
    pub present: u64,
    #[schema(example = 1)]
    pub absent: u64,
    #[schema(example = 2)]
    pub leave: u64,
    #[schema(example = 0)]
    pub holiday: u64,
    #[schema(example = 1)]
    pub half_day: u64,
    #[schema(example = 152.25)]
    pub total_working_hours: f64,
    #[schema(example = 8.46)]
    pub average_working_hours: f64,
}

/// Per-date projection for direct calendar rendering.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayEntry {
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
    #[schema(example = "2026-01-01T09:00:00", format = "date-time", value_type = String)]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(example = "2026-01-01T17:30:00", format = "date-time", value_type = String)]
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(example = 8.5)]
    pub working_hours: f64,
    pub notes: Option<String>,
}

/// Expand `YYYY-MM` into the inclusive first..last day range of that
/// calendar month (leap-year aware).
pub fn month_range(month: &str) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let invalid = || ApiError::InvalidArgument(format!("invalid month '{}', expected YYYY-MM", month));

    let (year_s, month_s) = month.split_once('-').ok_or_else(invalid)?;
    if year_s.len() != 4 || month_s.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year_s.parse().map_err(|_| invalid())?;
    let month_no: u32 = month_s.parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, month_no, 1).ok_or_else(invalid)?;
    let last = if month_no == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month_no + 1, 1)
    }
    .and_then(|d| d.pred_opt())
    .ok_or_else(invalid)?;

    Ok((first, last))
}

/// Compute the status buckets and working-hour totals for a record set.
///
/// The average divides by the number of present days; an empty or
/// present-free set yields 0 rather than a division error.
pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        total_days: records.len() as u64,
        ..Default::default()
    };

    let mut hours = 0.0;
    for record in records {
        match record.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Leave => summary.leave += 1,
            AttendanceStatus::Holiday => summary.holiday += 1,
            AttendanceStatus::HalfDay => summary.half_day += 1,
        }
        hours += record.working_hours;
    }

    summary.total_working_hours = round2(hours);
    summary.average_working_hours = if summary.present > 0 {
        round2(summary.total_working_hours / summary.present as f64)
    } else {
        0.0
    };

    summary
}

/// Keyed view: date -> day snapshot, ordered by date.
pub fn calendar(records: &[AttendanceRecord]) -> BTreeMap<String, DayEntry> {
    records
        .iter()
        .map(|r| {
            (
                r.date.format("%Y-%m-%d").to_string(),
                DayEntry {
                    status: r.status,
                    check_in_time: r.check_in_time,
                    check_out_time: r.check_out_time,
                    working_hours: r.working_hours,
                    notes: r.notes.clone(),
                },
            )
        })
        .collect()
}

/// Full weekday name for a date, used by the CSV renderer.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}
