use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub employee_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Directory view handed to callers; never carries the password hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PublicUser {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "jdoe@company.com")]
    pub email: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    #[schema(example = "EMP-001")]
    pub employee_code: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        PublicUser {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            employee_code: u.employee_code,
        }
    }
}

impl PublicUser {
    /// Identifier printed in the CSV Employee ID column.
    pub fn employee_id(&self) -> String {
        self.employee_code
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}
