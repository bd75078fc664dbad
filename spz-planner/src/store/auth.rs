//! Identity, session and recovery token persistence
//!
//! Used by the sign-up, sign-in and recovery flows before any user-bound
//! store exists.

use chrono::{DateTime, Duration, Utc};
use spz_common::api::auth::generate_token;
use spz_common::db::UserRecord;
use spz_common::{uuid_utils, Error, Result};
use sqlx::SqlitePool;

/// Fields of a new identity
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub password_salt: &'a str,
    pub claims_admin: bool,
    pub claims_approved: bool,
}

#[derive(Clone)]
pub struct AuthStore {
    pool: SqlitePool,
}

impl AuthStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, new_user: NewUser<'_>) -> Result<UserRecord> {
        if self.find_by_email(new_user.email).await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "email already registered: {}",
                new_user.email
            )));
        }

        let record = UserRecord {
            id: uuid_utils::generate_id(),
            email: new_user.email.to_string(),
            password_hash: new_user.password_hash.to_string(),
            password_salt: new_user.password_salt.to_string(),
            claims_admin: new_user.claims_admin,
            claims_approved: new_user.claims_approved,
            created_at: Utc::now(),
            last_sign_in_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, password_salt, claims_admin, claims_approved, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.password_salt)
        .bind(record.claims_admin)
        .bind(record.claims_approved)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password_hash, password_salt, claims_admin, claims_approved,
                   created_at, last_sign_in_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>> {
        user_by_id(&self.pool, user_id).await
    }

    pub async fn record_sign_in(&self, user_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_sign_in_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_password(&self, user_id: &str, hash: &str, salt: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE id = ?")
            .bind(hash)
            .bind(salt)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Issue a bearer token for `user_id`
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let token = generate_token();

        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    /// User id behind a persisted bearer token issued less than `ttl` ago
    pub async fn session_user(&self, token: &str, ttl: Duration) -> Result<Option<String>> {
        let row: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, created_at FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .filter(|(_, created_at)| *created_at + ttl > Utc::now())
            .map(|(user_id, _)| user_id))
    }

    /// Delete sessions issued before `cutoff`; returns their tokens
    pub async fn purge_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let rows: Vec<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT token, created_at FROM sessions")
                .fetch_all(&self.pool)
                .await?;

        let mut purged = Vec::new();
        for (token, created_at) in rows {
            if created_at >= cutoff {
                continue;
            }
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(&token)
                .execute(&self.pool)
                .await?;
            purged.push(token);
        }
        Ok(purged)
    }

    /// Delete recovery tokens that can no longer be exchanged
    pub async fn purge_expired_recovery_tokens(&self) -> Result<u64> {
        let rows: Vec<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT token, expires_at FROM recovery_tokens")
                .fetch_all(&self.pool)
                .await?;

        let now = Utc::now();
        let mut purged = 0;
        for (token, _) in rows.into_iter().filter(|(_, expires_at)| *expires_at <= now) {
            purged += sqlx::query("DELETE FROM recovery_tokens WHERE token = ?")
                .bind(&token)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        Ok(purged)
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn create_recovery_token(&self, user_id: &str, ttl: Duration) -> Result<String> {
        let token = generate_token();

        sqlx::query("INSERT INTO recovery_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now() + ttl)
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    /// Consume a recovery token
    ///
    /// The token is deleted whether or not it has expired. Returns the user
    /// id only for a live token.
    pub async fn consume_recovery_token(&self, token: &str) -> Result<Option<String>> {
        let row: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM recovery_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM recovery_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        if expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(user_id))
    }
}

pub(super) async fn user_by_id(pool: &SqlitePool, user_id: &str) -> Result<Option<UserRecord>> {
    let user = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, password_hash, password_salt, claims_admin, claims_approved,
               created_at, last_sign_in_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
