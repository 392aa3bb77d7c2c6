use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use tracing::{error, info};

use crate::error::ApiError;
use crate::model::user::{PublicUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password, full_name, employee_code, created_at, last_login_at";

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub employee_code: Option<String>,
}

/// User directory handle.
///
/// Carries a taken-username cache so registration availability checks do
/// not hit the database for recently seen names.
#[derive(Clone)]
pub struct UserStore {
    pool: MySqlPool,
    // true => username TAKEN (only taken names are stored)
    taken_usernames: Cache<String, bool>,
}

impl UserStore {
    pub fn new(pool: MySqlPool) -> Self {
        let taken_usernames = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(86_400)) // 24h TTL
            .build();

        Self {
            pool,
            taken_usernames,
        }
    }

    pub async fn find_by_id(&self, user_id: u64) -> Result<Option<User>, ApiError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, user_id, "Failed to fetch user");
                ApiError::from(e)
            })
    }

    /// Resolve the user or fail with `NotFound`; the precondition every
    /// attendance operation starts with.
    pub async fn require(&self, user_id: u64) -> Result<PublicUser, ApiError> {
        self.find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, username, "Failed to fetch user by username");
                ApiError::from(e)
            })
    }

    pub async fn list(&self) -> Result<Vec<PublicUser>, ApiError> {
        sqlx::query_as::<_, PublicUser>(
            "SELECT id, username, email, full_name, employee_code FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list users");
            ApiError::from(e)
        })
    }

    /// Insert a new user; the unique keys on username/email are the
    /// backstop behind the cached availability check.
    pub async fn insert(&self, new_user: &NewUser) -> Result<u64, ApiError> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password, full_name, employee_code) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.full_name)
        .bind(new_user.employee_code.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                self.mark_taken(&new_user.username).await;
                Ok(done.last_insert_id())
            }
            Err(e) => {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(ApiError::Conflict(
                            "username or email already registered".into(),
                        ));
                    }
                }
                error!(error = %e, username = %new_user.username, "Failed to insert user");
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, user_id: u64) -> Result<Option<PublicUser>, ApiError> {
        let Some(user) = self.find_by_id(user_id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error(user_id, e))?;

        self.taken_usernames
            .invalidate(&user.username.to_lowercase())
            .await;

        Ok(Some(PublicUser::from(user)))
    }

    /// Non-fatal bookkeeping after a successful login.
    pub async fn touch_last_login(&self, user_id: u64) {
        if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
        {
            error!(error = %e, user_id, "Failed to update last_login_at");
            // intentionally not failing login
        }
    }

    /// true  => username AVAILABLE
    /// false => username TAKEN
    pub async fn username_available(&self, username: &str) -> bool {
        let username = username.to_lowercase();

        // fast positive from the cache
        if self.taken_usernames.get(&username).await.unwrap_or(false) {
            return false;
        }

        // database fallback
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
        )
        .bind(&username)
        .fetch_one(&self.pool)
        .await
        .unwrap_or(true); // fail-safe

        if exists {
            self.taken_usernames.insert(username, true).await;
            return false;
        }

        true
    }

    pub async fn mark_taken(&self, username: &str) {
        self.taken_usernames
            .insert(username.to_lowercase(), true)
            .await;
    }

    async fn batch_mark(&self, usernames: &[String]) {
        let futures: Vec<_> = usernames
            .iter()
            .map(|u| self.taken_usernames.insert(u.to_lowercase(), true))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Load recently active usernames into the cache (batched).
    pub async fn warmup_username_cache(&self, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>(
            "SELECT username FROM users \
             WHERE last_login_at >= NOW() - INTERVAL ? DAY \
             ORDER BY last_login_at DESC",
        )
        .bind(days)
        .fetch(&self.pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total_count = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row?;
            batch.push(username);
            total_count += 1;

            if batch.len() >= batch_size {
                self.batch_mark(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.batch_mark(&batch).await;
        }

        info!(
            total_count,
            days, "Username cache warmup complete"
        );

        Ok(())
    }
}

/// Attendance history is retained when its owner is deleted: the FK on
/// attendance_records restricts the delete, and that constraint hit is a
/// Conflict the caller can act on, not a server fault.
fn map_delete_error(user_id: u64, e: sqlx::Error) -> ApiError {
    if is_constraint_violation(&e) {
        return ApiError::Conflict(
            "user has attendance history and cannot be deleted".into(),
        );
    }
    error!(error = %e, user_id, "Failed to delete user");
    ApiError::from(e)
}

/// MySQL reports FK and unique-key violations as SQLSTATE 23000.
fn is_constraint_violation(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct FkViolation;

    impl std::fmt::Display for FkViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "a foreign key constraint fails")
        }
    }

    impl std::error::Error for FkViolation {}

    impl sqlx::error::DatabaseError for FkViolation {
        fn message(&self) -> &str {
            "a foreign key constraint fails"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some("23000".into())
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::ForeignKeyViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn deleting_user_with_history_is_a_conflict() {
        let e = sqlx::Error::Database(Box::new(FkViolation));
        let mapped = map_delete_error(1, e);
        assert!(matches!(mapped, ApiError::Conflict(_)));
        assert!(mapped.to_string().contains("attendance history"));
    }

    #[test]
    fn other_delete_failures_stay_storage_errors() {
        let mapped = map_delete_error(1, sqlx::Error::RowNotFound);
        assert!(matches!(mapped, ApiError::Storage(_)));
    }
}
