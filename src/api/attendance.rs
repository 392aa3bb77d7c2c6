use std::str::FromStr;

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::csv_export::render_monthly_csv;
use crate::error::ApiError;
use crate::model::attendance::{AttendanceStatus, Location, NOTES_MAX_LEN, working_hours_between};
use crate::store::attendance::{AttendanceStore, MarkInput};
use crate::store::users::UserStore;
use crate::summary::{calendar, month_range, summarize};

#[derive(Deserialize, ToSchema)]
pub struct MarkRequest {
    #[schema(example = 1)]
    pub user_id: u64,
    /// One of: present, absent, leave, holiday, half-day. Defaults to present.
    #[schema(example = "present")]
    pub status: Option<String>,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[schema(example = "worked from office")]
    pub notes: Option<String>,
    pub location: Option<Location>,
    /// Carried into the edit-history entry when this mark corrects an
    /// existing record.
    #[schema(example = "was mis-marked as absent")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    #[schema(example = 1)]
    pub user_id: u64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct StatsQuery {
    #[schema(example = 1)]
    pub user_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    #[param(example = "2026-01-01", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-31", format = "date", value_type = String)]
    #[param(example = "2026-01-31", value_type = String)]
    pub end_date: NaiveDate,
}

/// A check-in ahead of "now" would let a later checkout persist
/// check_out_time < check_in_time; rejected up front.
fn validate_check_in(
    check_in: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    match check_in {
        Some(t) if t > now => Err(ApiError::InvalidArgument(
            "check_in_time cannot be in the future".into(),
        )),
        _ => Ok(()),
    }
}

fn parse_status(raw: Option<&str>) -> Result<AttendanceStatus, ApiError> {
    match raw {
        None | Some("") => Ok(AttendanceStatus::default()),
        Some(value) => AttendanceStatus::from_str(value).map_err(|_| {
            ApiError::InvalidArgument(format!(
                "invalid status '{}', allowed: present, absent, leave, holiday, half-day",
                value
            ))
        }),
    }
}

/// Mark today's attendance (create-or-correct)
#[utoipa::path(
    post,
    path = "/api/v1/attendance/mark",
    request_body = MarkRequest,
    responses(
        (status = 201, description = "Attendance record created", body = Object, example = json!({
            "success": true,
            "created": true
        })),
        (status = 200, description = "Existing record corrected, edit history appended", body = Object, example = json!({
            "success": true,
            "created": false
        })),
        (status = 400, description = "Invalid status or oversized notes"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn mark_today(
    req: HttpRequest,
    users: web::Data<UserStore>,
    store: web::Data<AttendanceStore>,
    payload: web::Json<MarkRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    if payload.user_id == 0 {
        return Err(ApiError::InvalidArgument("user_id is required".into()));
    }

    let status = parse_status(payload.status.as_deref())?;

    if let Some(notes) = &payload.notes {
        if notes.chars().count() > NOTES_MAX_LEN {
            return Err(ApiError::InvalidArgument(format!(
                "notes must be at most {} characters",
                NOTES_MAX_LEN
            )));
        }
    }

    let now = Utc::now();
    validate_check_in(payload.check_in_time, now)?;

    users.require(payload.user_id).await?;

    let today = now.date_naive();

    let conn_info = req.connection_info();
    let caller_ip = conn_info.realip_remote_addr().map(str::to_string);
    let location = payload.location.unwrap_or_default();

    let outcome = store
        .mark_today(
            payload.user_id,
            today,
            now.naive_utc(),
            MarkInput {
                status,
                check_in_time: payload.check_in_time.map(|t| t.naive_utc()),
                notes: payload.notes,
                latitude: location.latitude,
                longitude: location.longitude,
                ip_address: caller_ip,
                reason: payload.reason,
            },
        )
        .await?;

    let body = json!({
        "success": true,
        "created": outcome.created,
        "attendance": outcome.record,
    });

    if outcome.created {
        Ok(HttpResponse::Created().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

/// Check out for today
#[utoipa::path(
    post,
    path = "/api/v1/attendance/checkout",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out, working hours computed", body = Object, example = json!({
            "success": true
        })),
        (status = 404, description = "No check-in found for today"),
        (status = 409, description = "Already checked out today"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    users: web::Data<UserStore>,
    store: web::Data<AttendanceStore>,
    payload: web::Json<CheckOutRequest>,
) -> Result<HttpResponse, ApiError> {
    users.require(payload.user_id).await?;

    let now = Utc::now();
    let today = now.date_naive();

    let record = store
        .find_by_day(payload.user_id, today)
        .await?
        .ok_or_else(|| ApiError::NotFound("no check-in found for today".into()))?;

    if record.check_out_time.is_some() {
        return Err(ApiError::Conflict("already checked out today".into()));
    }

    let check_out = now.naive_utc();
    let hours = record
        .check_in_time
        .map(|check_in| working_hours_between(check_in, check_out))
        .unwrap_or(0.0);

    let updated_rows = store
        .complete_checkout(record.id, check_out, hours)
        .await?;
    if updated_rows == 0 {
        // a concurrent checkout won between the read and the update
        return Err(ApiError::Conflict("already checked out today".into()));
    }

    let record = store
        .find_by_day(payload.user_id, today)
        .await?
        .ok_or_else(|| ApiError::Storage("attendance record vanished after checkout".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attendance": record,
    })))
}

/// Get today's attendance status (pure read, never creates a record)
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today/{user_id}",
    params(
        ("user_id", Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Today's state for the user", body = Object, example = json!({
            "success": true,
            "date": "2026-01-01",
            "is_marked": false,
            "attendance": null
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn get_today(
    store: web::Data<AttendanceStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let today = Utc::now().date_naive();

    let record = store.find_by_day(user_id, today).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": today.format("%Y-%m-%d").to_string(),
        "is_marked": record.is_some(),
        "attendance": record,
    })))
}

/// Monthly summary: aggregate buckets, per-date calendar map, record list
#[utoipa::path(
    get,
    path = "/api/v1/attendance/monthly/{user_id}/{month}",
    params(
        ("user_id", Path, description = "User ID"),
        ("month", Path, description = "Month as YYYY-MM")
    ),
    responses(
        (status = 200, description = "Summary over the calendar month (empty month is zero-filled)", body = Object, example = json!({
            "success": true,
            "month": "2026-01"
        })),
        (status = 400, description = "Malformed month"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    users: web::Data<UserStore>,
    store: web::Data<AttendanceStore>,
    path: web::Path<(u64, String)>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, month) = path.into_inner();

    users.require(user_id).await?;
    let (start, end) = month_range(&month)?;

    let records = store.find_range(user_id, start, end).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "month": month,
        "summary": summarize(&records),
        "calendar": calendar(&records),
        "records": records,
    })))
}

/// Range statistics over an explicit inclusive date range
#[utoipa::path(
    get,
    path = "/api/v1/attendance/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Summary over the range", body = Object, example = json!({
            "success": true
        })),
        (status = 400, description = "start_date after end_date"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn range_stats(
    users: web::Data<UserStore>,
    store: web::Data<AttendanceStore>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    if query.start_date > query.end_date {
        return Err(ApiError::InvalidArgument(
            "start_date cannot be after end_date".into(),
        ));
    }

    users.require(query.user_id).await?;

    let records = store
        .find_range(query.user_id, query.start_date, query.end_date)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user_id": query.user_id,
        "start_date": query.start_date,
        "end_date": query.end_date,
        "summary": summarize(&records),
    })))
}

/// Download the monthly attendance CSV
#[utoipa::path(
    get,
    path = "/api/v1/attendance/download/{user_id}/{month}",
    params(
        ("user_id", Path, description = "User ID"),
        ("month", Path, description = "Month as YYYY-MM")
    ),
    responses(
        (status = 200, description = "CSV attachment; trailing SUMMARY row is not a data record", content_type = "text/csv"),
        (status = 400, description = "Malformed month"),
        (status = 404, description = "User not found, or no records in the month"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn download_csv(
    users: web::Data<UserStore>,
    store: web::Data<AttendanceStore>,
    path: web::Path<(u64, String)>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, month) = path.into_inner();

    let user = users.require(user_id).await?;
    let (start, end) = month_range(&month)?;

    let records = store.find_range(user_id, start, end).await?;
    let csv = render_monthly_csv(&user, &records)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"attendance_{}.csv\"", month),
        ))
        .body(csv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_defaults_to_present() {
        assert_eq!(parse_status(None).unwrap(), AttendanceStatus::Present);
        assert_eq!(parse_status(Some("")).unwrap(), AttendanceStatus::Present);
    }

    #[test]
    fn unknown_status_is_invalid_argument() {
        let err = parse_status(Some("vacation")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(err.to_string().contains("vacation"));
    }

    #[test]
    fn future_check_in_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();

        let err = validate_check_in(Some(now + Duration::hours(1)), now).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));

        assert!(validate_check_in(Some(now), now).is_ok());
        assert!(validate_check_in(Some(now - Duration::hours(2)), now).is_ok());
        assert!(validate_check_in(None, now).is_ok());
    }
}
