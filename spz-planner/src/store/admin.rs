//! Unrestricted credential tier
//!
//! Only reachable from handlers behind the admin middleware.

use spz_common::db::{UserRecord, UserResponse, UserSettings};
use spz_common::Result;
use sqlx::SqlitePool;
use tracing::info;

use super::user::{responses_of, settings_of};

/// Rows removed by a cascading account delete
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DeletionReport {
    pub responses: u64,
    pub settings: u64,
    pub messages: u64,
    pub progress: u64,
    pub completed: u64,
    pub sessions: u64,
    pub recovery_tokens: u64,
    pub identities: u64,
}

impl DeletionReport {
    pub fn total(&self) -> u64 {
        self.responses
            + self.settings
            + self.messages
            + self.progress
            + self.completed
            + self.sessions
            + self.recovery_tokens
            + self.identities
    }
}

#[derive(Clone)]
pub struct AdminStore {
    pool: SqlitePool,
}

impl AdminStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Every identity, newest sign-up first
    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password_hash, password_salt, claims_admin, claims_approved,
                   created_at, last_sign_in_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        super::auth::user_by_id(&self.pool, user_id).await
    }

    /// Patch the approval claim; returns whether the identity exists
    pub async fn set_approved(&self, user_id: &str, approved: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET claims_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn responses_for(&self, user_id: &str) -> Result<Vec<UserResponse>> {
        responses_of(&self.pool, user_id).await
    }

    pub async fn settings_for(&self, user_id: &str) -> Result<Option<UserSettings>> {
        settings_of(&self.pool, user_id).await
    }

    /// Purge every row owned by `user_id`, then the identity itself
    ///
    /// Runs in one transaction. Deleting an id that no longer exists
    /// succeeds with an all-zero report.
    pub async fn delete_user(&self, user_id: &str) -> Result<DeletionReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = DeletionReport::default();

        // Strip the admin claim first so a half-deleted admin can't act
        sqlx::query("UPDATE users SET claims_admin = 0 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        report.responses = sqlx::query("DELETE FROM user_responses WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.settings = sqlx::query("DELETE FROM user_settings WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.messages = sqlx::query("DELETE FROM messages WHERE sender_id = ? OR receiver_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.progress = sqlx::query("DELETE FROM module_progress WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.completed = sqlx::query("DELETE FROM completed_modules WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.sessions = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.recovery_tokens = sqlx::query("DELETE FROM recovery_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.identities = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!(user_id, rows = report.total(), "Deleted user account");
        Ok(report)
    }
}
