use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;
use tracing::{debug, error, warn};

use crate::error::ApiError;
use crate::model::attendance::{AttendanceEdit, AttendanceRecord, AttendanceStatus};

const RECORD_COLUMNS: &str = "id, user_id, date, status, check_in_time, check_out_time, \
     working_hours, notes, marked_by, ip_address, latitude, longitude, is_edited, \
     created_at, updated_at";

/// Bounded retry for the insert-vs-insert race on (user_id, date).
const MARK_ATTEMPTS: u32 = 3;

/// Inputs of a mark call after request validation.
#[derive(Debug)]
pub struct MarkInput {
    pub status: AttendanceStatus,
    pub check_in_time: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ip_address: Option<String>,
    pub reason: Option<String>,
}

pub struct MarkOutcome {
    pub record: AttendanceRecord,
    pub created: bool,
}

/// Pure projection of a correction: the previous/new pair the edit entry
/// records, and the field overwrites to persist (`set_*` of None keeps the
/// prior value).
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionPlan {
    pub previous_status: AttendanceStatus,
    pub new_status: AttendanceStatus,
    pub set_notes: Option<String>,
    pub set_latitude: Option<f64>,
    pub set_longitude: Option<f64>,
}

/// Empty or absent notes preserve the prior value; location is replaced
/// only when supplied. `check_in_time` is never part of a correction.
pub fn plan_correction(existing: &AttendanceRecord, input: &MarkInput) -> CorrectionPlan {
    CorrectionPlan {
        previous_status: existing.status,
        new_status: input.status,
        set_notes: input.notes.clone().filter(|n| !n.is_empty()),
        set_latitude: input.latitude,
        set_longitude: input.longitude,
    }
}

/// Persistence handle for attendance records and their edit trail.
#[derive(Clone)]
pub struct AttendanceStore {
    pool: MySqlPool,
}

impl AttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Fetch the record for (user, date) with its edit history.
    pub async fn find_by_day(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, ApiError> {
        let sql = format!(
            "SELECT {} FROM attendance_records WHERE user_id = ? AND date = ?",
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, user_id, %date, "Failed to fetch attendance record");
                ApiError::from(e)
            })?;

        match record {
            Some(mut record) => {
                record.edit_history = self.edits_for(record.id).await?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Records for the user with date in [start, end], ascending by date.
    /// Edit histories are not loaded here; summaries don't need them.
    pub async fn find_range(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        let sql = format!(
            "SELECT {} FROM attendance_records \
             WHERE user_id = ? AND date BETWEEN ? AND ? \
             ORDER BY date ASC",
            RECORD_COLUMNS
        );

        sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, user_id, %start, %end, "Failed to fetch attendance range");
                ApiError::from(e)
            })
    }

    async fn edits_for(&self, attendance_id: u64) -> Result<Vec<AttendanceEdit>, ApiError> {
        sqlx::query_as::<_, AttendanceEdit>(
            "SELECT id, attendance_id, edited_at, previous_status, new_status, edited_by, reason \
             FROM attendance_edits WHERE attendance_id = ? ORDER BY id ASC",
        )
        .bind(attendance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, attendance_id, "Failed to fetch edit history");
            ApiError::from(e)
        })
    }

    /// Create-or-correct today's record.
    ///
    /// First writer inserts; a concurrent second writer hits the
    /// (user_id, date) unique key, observes the winner's row on the next
    /// attempt and takes the correction path. Never surfaces the duplicate
    /// key to the caller.
    pub async fn mark_today(
        &self,
        user_id: u64,
        today: NaiveDate,
        now: NaiveDateTime,
        input: MarkInput,
    ) -> Result<MarkOutcome, ApiError> {
        for attempt in 0..MARK_ATTEMPTS {
            if let Some(existing) = self.find_by_day(user_id, today).await? {
                let record = self.apply_correction(existing, &input, user_id, now).await?;
                return Ok(MarkOutcome {
                    record,
                    created: false,
                });
            }

            match self.insert_new(user_id, today, now, &input).await {
                Ok(()) => {
                    let record = self.find_by_day(user_id, today).await?.ok_or_else(|| {
                        ApiError::Storage("attendance record vanished after insert".into())
                    })?;
                    return Ok(MarkOutcome {
                        record,
                        created: true,
                    });
                }
                Err(e) if is_duplicate_key(&e) => {
                    // lost the first-writer race; re-read and correct
                    warn!(user_id, %today, attempt, "Concurrent mark detected, retrying as update");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, user_id, %today, "Failed to insert attendance record");
                    return Err(e.into());
                }
            }
        }

        Err(ApiError::Storage(
            "attendance mark did not settle after retries".into(),
        ))
    }

    async fn insert_new(
        &self,
        user_id: u64,
        today: NaiveDate,
        now: NaiveDateTime,
        input: &MarkInput,
    ) -> Result<(), sqlx::Error> {
        let check_in = input.check_in_time.unwrap_or(now);

        sqlx::query(
            "INSERT INTO attendance_records \
             (user_id, date, status, check_in_time, notes, marked_by, ip_address, latitude, longitude) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(today)
        .bind(input.status)
        .bind(check_in)
        .bind(input.notes.as_deref())
        .bind(user_id)
        .bind(input.ip_address.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .execute(&self.pool)
        .await?;

        debug!(user_id, %today, status = %input.status, "Attendance record created");
        Ok(())
    }

    /// Correction path: append one edit entry, overwrite status, flag the
    /// record as edited. `check_in_time` is never altered; notes/location
    /// are replaced only when a new value was supplied.
    async fn apply_correction(
        &self,
        existing: AttendanceRecord,
        input: &MarkInput,
        edited_by: u64,
        now: NaiveDateTime,
    ) -> Result<AttendanceRecord, ApiError> {
        let plan = plan_correction(&existing, input);

        let mut tx = self.pool.begin().await.map_err(ApiError::from)?;

        sqlx::query(
            "INSERT INTO attendance_edits \
             (attendance_id, edited_at, previous_status, new_status, edited_by, reason) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(existing.id)
        .bind(now)
        .bind(plan.previous_status)
        .bind(plan.new_status)
        .bind(edited_by)
        .bind(input.reason.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, attendance_id = existing.id, "Failed to append edit entry");
            ApiError::from(e)
        })?;

        sqlx::query(
            "UPDATE attendance_records SET \
             status = ?, \
             is_edited = TRUE, \
             notes = COALESCE(?, notes), \
             latitude = COALESCE(?, latitude), \
             longitude = COALESCE(?, longitude) \
             WHERE id = ?",
        )
        .bind(plan.new_status)
        .bind(plan.set_notes.as_deref())
        .bind(plan.set_latitude)
        .bind(plan.set_longitude)
        .bind(existing.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, attendance_id = existing.id, "Failed to apply status correction");
            ApiError::from(e)
        })?;

        tx.commit().await.map_err(ApiError::from)?;

        debug!(
            attendance_id = existing.id,
            from = %plan.previous_status,
            to = %plan.new_status,
            "Attendance status corrected"
        );

        self.find_by_day(existing.user_id, existing.date)
            .await?
            .ok_or_else(|| ApiError::Storage("attendance record vanished after update".into()))
    }

    /// Conditional checkout: only fires while `check_out_time` is unset,
    /// so two concurrent checkouts cannot both win. Returns rows affected.
    pub async fn complete_checkout(
        &self,
        record_id: u64,
        check_out: NaiveDateTime,
        working_hours: f64,
    ) -> Result<u64, ApiError> {
        let result = sqlx::query(
            "UPDATE attendance_records \
             SET check_out_time = ?, working_hours = ? \
             WHERE id = ? AND check_out_time IS NULL",
        )
        .bind(check_out)
        .bind(working_hours)
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, record_id, "Check-out update failed");
            ApiError::from(e)
        })?;

        Ok(result.rows_affected())
    }
}

/// MySQL reports unique-key violations as SQLSTATE 23000.
fn is_duplicate_key(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::Location;

    fn existing_record(status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 10,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            status,
            check_in_time: None,
            check_out_time: None,
            working_hours: 0.0,
            notes: Some("on site".into()),
            marked_by: 1,
            ip_address: None,
            location: Location {
                latitude: Some(23.8103),
                longitude: Some(90.4125),
            },
            is_edited: false,
            edit_history: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn correction(status: AttendanceStatus) -> MarkInput {
        MarkInput {
            status,
            check_in_time: None,
            notes: None,
            latitude: None,
            longitude: None,
            ip_address: None,
            reason: None,
        }
    }

    #[test]
    fn correction_pairs_previous_and_new_status() {
        let record = existing_record(AttendanceStatus::Present);
        let plan = plan_correction(&record, &correction(AttendanceStatus::Leave));
        assert_eq!(plan.previous_status, AttendanceStatus::Present);
        assert_eq!(plan.new_status, AttendanceStatus::Leave);
    }

    #[test]
    fn consecutive_corrections_chain_their_pairs() {
        let mut record = existing_record(AttendanceStatus::Present);

        let first = plan_correction(&record, &correction(AttendanceStatus::Leave));
        record.status = first.new_status;
        record.is_edited = true;
        record.edit_history.push(AttendanceEdit {
            id: 1,
            attendance_id: record.id,
            edited_at: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            previous_status: first.previous_status,
            new_status: first.new_status,
            edited_by: 1,
            reason: None,
        });

        let second = plan_correction(&record, &correction(AttendanceStatus::HalfDay));

        // one entry per correction, each pairing previous with new
        assert_eq!(record.edit_history.len(), 1);
        assert!(record.is_edited);
        assert_eq!(first.previous_status, AttendanceStatus::Present);
        assert_eq!(first.new_status, AttendanceStatus::Leave);
        assert_eq!(second.previous_status, AttendanceStatus::Leave);
        assert_eq!(second.new_status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn absent_or_empty_notes_keep_prior_value() {
        let record = existing_record(AttendanceStatus::Present);

        let plan = plan_correction(&record, &correction(AttendanceStatus::Absent));
        assert_eq!(plan.set_notes, None);

        let mut with_empty = correction(AttendanceStatus::Absent);
        with_empty.notes = Some(String::new());
        assert_eq!(plan_correction(&record, &with_empty).set_notes, None);

        let mut with_new = correction(AttendanceStatus::Absent);
        with_new.notes = Some("doctor visit".into());
        assert_eq!(
            plan_correction(&record, &with_new).set_notes.as_deref(),
            Some("doctor visit")
        );
    }

    #[test]
    fn location_is_replaced_only_when_supplied() {
        let record = existing_record(AttendanceStatus::Present);

        let plan = plan_correction(&record, &correction(AttendanceStatus::HalfDay));
        assert_eq!(plan.set_latitude, None);
        assert_eq!(plan.set_longitude, None);

        let mut moved = correction(AttendanceStatus::HalfDay);
        moved.latitude = Some(40.7128);
        moved.longitude = Some(-74.0060);
        let plan = plan_correction(&record, &moved);
        assert_eq!(plan.set_latitude, Some(40.7128));
        assert_eq!(plan.set_longitude, Some(-74.0060));
    }
}
