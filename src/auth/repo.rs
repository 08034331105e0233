use crate::auth::repo_types::User;
use sqlx::PgPool;
use time::OffsetDateTime;

impl User {
    /// Find a user by (lowercased) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verified,
                   verification_code, verification_expires_at,
                   reset_code, reset_expires_at,
                   description, avatar_key, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verified,
                   verification_code, verification_expires_at,
                   reset_code, reset_expires_at,
                   description, avatar_key, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_reset_code(db: &PgPool, code: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verified,
                   verification_code, verification_expires_at,
                   reset_code, reset_expires_at,
                   description, avatar_key, created_at
            FROM users
            WHERE reset_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(db)
        .await
    }

    /// Create a new unverified user with a pending verification code.
    /// Uniqueness of email/username is enforced by the table constraints;
    /// a violation surfaces as a database error, not a second row.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        description: &str,
        verification_code: &str,
        verification_expires_at: OffsetDateTime,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (username, email, password_hash, description,
                 verification_code, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, verified,
                      verification_code, verification_expires_at,
                      reset_code, reset_expires_at,
                      description, avatar_key, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(description)
        .bind(verification_code)
        .bind(verification_expires_at)
        .fetch_one(db)
        .await
    }

    /// Flip to verified and consume the pending code.
    pub async fn mark_verified(db: &PgPool, id: i64) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE, verification_code = NULL, verification_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Overwrite any pending verification code with a fresh one.
    pub async fn set_verification_code(
        db: &PgPool,
        id: i64,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_code = $2, verification_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Consume an expired verification code so it cannot validate later.
    pub async fn clear_verification_code(db: &PgPool, id: i64) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_code = NULL, verification_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_reset_code(
        db: &PgPool,
        id: i64,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = $2, reset_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_code(db: &PgPool, id: i64) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = NULL, reset_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Persist a new password hash and consume the reset code in one step.
    pub async fn update_password(db: &PgPool, id: i64, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_code = NULL, reset_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    /// True when another user already holds this username.
    pub async fn username_taken(db: &PgPool, username: &str, exclude_id: i64) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id <> $2)"#,
        )
        .bind(username)
        .bind(exclude_id)
        .fetch_one(db)
        .await
    }

    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        username: &str,
        description: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $2, description = $3
            WHERE id = $1
            RETURNING id, username, email, password_hash, verified,
                      verification_code, verification_expires_at,
                      reset_code, reset_expires_at,
                      description, avatar_key, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(description)
        .fetch_one(db)
        .await
    }

    pub async fn set_avatar_key(db: &PgPool, id: i64, key: &str) -> sqlx::Result<()> {
        sqlx::query(r#"UPDATE users SET avatar_key = $2 WHERE id = $1"#)
            .bind(id)
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }
}
