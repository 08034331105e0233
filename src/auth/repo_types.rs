use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database. Decoded once at the store boundary; the
/// credential and code fields never leave the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_code: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires_at: Option<OffsetDateTime>,
    pub description: String,
    pub avatar_key: Option<String>,
    pub created_at: OffsetDateTime,
}
