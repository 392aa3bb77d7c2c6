use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Maximum length accepted for the free-text notes field.
pub const NOTES_MAX_LEN: usize = 500;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Holiday,
    HalfDay,
}

impl AttendanceStatus {
    /// Human label for CSV rendering: first letter capitalized.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
            AttendanceStatus::Holiday => "Holiday",
            AttendanceStatus::HalfDay => "Half-day",
        }
    }
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Present
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Location {
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
}

/// One status correction; rows are append-only.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEdit {
    pub id: u64,
    pub attendance_id: u64,
    #[schema(example = "2026-01-01T10:30:00", format = "date-time", value_type = String)]
    pub edited_at: NaiveDateTime,
    #[schema(example = "present", value_type = String)]
    pub previous_status: AttendanceStatus,
    #[schema(example = "leave", value_type = String)]
    pub new_status: AttendanceStatus,
    pub edited_by: u64,
    pub reason: Option<String>,
}

/// The per-user-per-day attendance fact. Unique on (user_id, date).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
    #[schema(example = "2026-01-01T09:00:00", format = "date-time", value_type = String)]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(example = "2026-01-01T17:30:00", format = "date-time", value_type = String)]
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(example = 8.5)]
    pub working_hours: f64,
    pub notes: Option<String>,
    pub marked_by: u64,
    pub ip_address: Option<String>,
    #[sqlx(flatten)]
    pub location: Location,
    pub is_edited: bool,
    #[sqlx(skip)]
    #[serde(default)]
    pub edit_history: Vec<AttendanceEdit>,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Derived month view (`YYYY-MM`), never stored.
    pub fn month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// Round to 2 decimal places, the precision working hours are kept at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Hours between check-in and check-out, 2-decimal, never negative.
pub fn working_hours_between(check_in: NaiveDateTime, check_out: NaiveDateTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds();
    if seconds <= 0 {
        return 0.0;
    }
    round2(seconds as f64 / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn status_parses_kebab_case() {
        assert_eq!(
            AttendanceStatus::from_str("half-day").unwrap(),
            AttendanceStatus::HalfDay
        );
        assert_eq!(
            AttendanceStatus::from_str("present").unwrap(),
            AttendanceStatus::Present
        );
        assert!(AttendanceStatus::from_str("sick").is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(AttendanceStatus::HalfDay.to_string(), "half-day");
        assert_eq!(AttendanceStatus::Leave.as_ref(), "leave");
        assert_eq!(AttendanceStatus::HalfDay.label(), "Half-day");
    }

    #[test]
    fn working_hours_standard_day() {
        let h = working_hours_between(dt("2024-01-05 09:00:00"), dt("2024-01-05 17:30:00"));
        assert_eq!(h, 8.5);
    }

    #[test]
    fn working_hours_rounds_to_two_decimals() {
        // 7h 47m = 7.7833... -> 7.78
        let h = working_hours_between(dt("2024-01-05 09:13:00"), dt("2024-01-05 17:00:00"));
        assert_eq!(h, 7.78);
    }

    #[test]
    fn working_hours_never_negative() {
        let h = working_hours_between(dt("2024-01-05 17:00:00"), dt("2024-01-05 09:00:00"));
        assert_eq!(h, 0.0);
    }

    #[test]
    fn month_is_first_seven_chars_of_date() {
        let record = AttendanceRecord {
            id: 1,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            status: AttendanceStatus::default(),
            check_in_time: None,
            check_out_time: None,
            working_hours: 0.0,
            notes: None,
            marked_by: 1,
            ip_address: None,
            location: Location::default(),
            is_edited: false,
            edit_history: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(record.month(), "2024-02");
        assert_eq!(record.date.to_string()[..7], record.month());
    }
}
