use crate::error::ApiError;
use crate::model::attendance::AttendanceRecord;
use crate::model::user::PublicUser;
use crate::summary::{summarize, weekday_name};

/// Fixed column order for the monthly export.
pub const CSV_HEADER: [&str; 9] = [
    "Date",
    "Day-of-week",
    "Status",
    "Check-In",
    "Check-Out",
    "Working Hours",
    "Notes",
    "Employee Name",
    "Employee ID",
];

fn render_failed(e: impl std::fmt::Display) -> ApiError {
    ApiError::Storage(format!("csv rendering failed: {}", e))
}

/// Render one data row per record (ascending by date), then a blank
/// separator row and a synthetic SUMMARY row carrying the aggregates.
///
/// The SUMMARY row reuses the data columns as free-form text; it is not a
/// parseable data record.
pub fn render_monthly_csv(
    user: &PublicUser,
    records: &[AttendanceRecord],
) -> Result<String, ApiError> {
    if records.is_empty() {
        return Err(ApiError::NotFound(
            "no attendance records found for this month".into(),
        ));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(render_failed)?;

    for record in records {
        writer
            .write_record(&[
                record.date.format("%Y-%m-%d").to_string(),
                weekday_name(record.date).to_string(),
                record.status.label().to_string(),
                record
                    .check_in_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                record
                    .check_out_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                format!("{:.2}", record.working_hours),
                record.notes.clone().unwrap_or_default(),
                user.full_name.clone(),
                user.employee_id(),
            ])
            .map_err(render_failed)?;
    }

    let summary = summarize(records);

    // blank separator row, then the aggregate trailer
    writer.write_record(&[""; 9]).map_err(render_failed)?;
    writer
        .write_record(&[
            "SUMMARY".to_string(),
            format!("Total Days: {}", summary.total_days),
            format!("Present: {}", summary.present),
            format!("Absent: {}", summary.absent),
            format!("Leave: {}", summary.leave),
            format!("Half-day: {}", summary.half_day),
            format!("Total Hours: {:.2}", summary.total_working_hours),
            String::new(),
            String::new(),
        ])
        .map_err(render_failed)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| render_failed(e.to_string()))?;
    String::from_utf8(bytes).map_err(render_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceRecord, AttendanceStatus, Location};
    use chrono::{NaiveDate, NaiveDateTime};

    fn user() -> PublicUser {
        PublicUser {
            id: 7,
            username: "jdoe".into(),
            email: "jdoe@company.com".into(),
            full_name: "John Doe".into(),
            employee_code: Some("EMP-001".into()),
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn record(date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 7,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            status,
            check_in_time: None,
            check_out_time: None,
            working_hours: 0.0,
            notes: None,
            marked_by: 7,
            ip_address: None,
            location: Location::default(),
            is_edited: false,
            edit_history: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn empty_month_is_not_found() {
        let err = render_monthly_csv(&user(), &[]).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn single_present_day_renders_row_and_summary() {
        let mut rec = record("2024-01-05", AttendanceStatus::Present);
        rec.check_in_time = Some(dt("2024-01-05 09:00:00"));
        rec.check_out_time = Some(dt("2024-01-05 17:30:00"));
        rec.working_hours = 8.5;

        let csv = render_monthly_csv(&user(), &[rec]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Date,Day-of-week,Status,Check-In,Check-Out,Working Hours,Notes,Employee Name,Employee ID"
        );
        assert_eq!(
            lines[1],
            "2024-01-05,Friday,Present,09:00,17:30,8.50,,John Doe,EMP-001"
        );
        // blank separator then the aggregate trailer
        assert_eq!(lines[2], ",,,,,,,,");
        assert!(lines[3].starts_with("SUMMARY,Total Days: 1,Present: 1,"));
        assert!(lines[3].contains("Total Hours: 8.50"));
    }

    #[test]
    fn unset_times_render_as_na_and_zero_hours() {
        let rec = record("2024-01-06", AttendanceStatus::Leave);
        let csv = render_monthly_csv(&user(), &[rec]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[1],
            "2024-01-06,Saturday,Leave,N/A,N/A,0.00,,John Doe,EMP-001"
        );
    }

    #[test]
    fn notes_with_commas_are_quoted() {
        let mut rec = record("2024-01-08", AttendanceStatus::Present);
        rec.notes = Some("late, traffic on \"ring road\"".into());
        let csv = render_monthly_csv(&user(), &[rec]).unwrap();
        assert!(csv.contains("\"late, traffic on \"\"ring road\"\"\""));
    }

    #[test]
    fn employee_id_falls_back_to_user_id() {
        let mut u = user();
        u.employee_code = None;
        let rec = record("2024-01-09", AttendanceStatus::Present);
        let csv = render_monthly_csv(&u, &[rec]).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",John Doe,7"));
    }
}
