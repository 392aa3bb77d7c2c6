use crate::api::attendance::{CheckOutRequest, MarkRequest, StatsQuery};
use crate::api::users::{LoginRequest, RegisterRequest};
use crate::model::attendance::{AttendanceEdit, AttendanceRecord, AttendanceStatus, Location};
use crate::model::user::PublicUser;
use crate::summary::{AttendanceSummary, DayEntry};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Employee Attendance Tracking API",
        version = "1.0.0",
        description = r#"
## Employee Attendance Tracking Service

Tracks per-user-per-day attendance records with working-hours computation,
an append-only edit history for corrections, monthly/range aggregation,
and CSV export.

### Key features
- **Mark attendance** — one record per user per day; a second mark on the
  same day corrects the record and appends to its edit history
- **Check-in / check-out** — working hours computed on checkout
- **Summaries** — monthly and arbitrary-range status-bucket statistics
- **CSV export** — fixed-column monthly export with a trailing SUMMARY row
  (the SUMMARY row is informational, not a parseable data record)

### Response format
JSON envelopes with a `success` flag; failures carry `kind` + `message`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::users::register,
        crate::api::users::login,
        crate::api::users::get_user,
        crate::api::users::list_users,
        crate::api::users::delete_user,

        crate::api::attendance::mark_today,
        crate::api::attendance::check_out,
        crate::api::attendance::get_today,
        crate::api::attendance::monthly_summary,
        crate::api::attendance::range_stats,
        crate::api::attendance::download_csv,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            PublicUser,
            MarkRequest,
            CheckOutRequest,
            StatsQuery,
            AttendanceRecord,
            AttendanceEdit,
            AttendanceStatus,
            Location,
            AttendanceSummary,
            DayEntry
        )
    ),
    tags(
        (name = "Auth", description = "User registration and login"),
        (name = "Users", description = "User directory APIs"),
        (name = "Attendance", description = "Attendance lifecycle, summaries and export"),
    )
)]
pub struct ApiDoc;
