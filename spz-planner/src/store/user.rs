//! Restricted credential tier
//!
//! A [`UserStore`] is bound to exactly one user id at construction. Every
//! per-user query it issues filters on that id, so a handler holding one
//! cannot read or write another user's rows.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use spz_common::db::{
    Message, Module, ModuleProgress, Question, UserResponse, UserSettings, FINAL_REPORT_SLUG,
};
use spz_common::{uuid_utils, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::reference;

/// Another user as visible to a messaging participant
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: String,
    pub email: String,
    pub is_admin: bool,
}

/// Unread message count from one sender
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UnreadCount {
    pub sender_id: String,
    pub count: i64,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    user_id: String,
}

impl UserStore {
    pub fn new(pool: SqlitePool, user_id: impl Into<String>) -> Self {
        Self {
            pool,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // ------------------------------------------------------------------
    // Reference data
    // ------------------------------------------------------------------

    pub async fn list_modules(&self) -> Result<Vec<Module>> {
        reference::list_modules(&self.pool).await
    }

    pub async fn module_by_slug(&self, slug: &str) -> Result<Option<Module>> {
        reference::module_by_slug(&self.pool, slug).await
    }

    pub async fn module_by_order(&self, order: i64) -> Result<Option<Module>> {
        reference::module_by_order(&self.pool, order).await
    }

    pub async fn questions_for_module(&self, module_id: &str) -> Result<Vec<Question>> {
        reference::questions_for_module(&self.pool, module_id).await
    }

    pub async fn all_questions(&self) -> Result<Vec<Question>> {
        reference::all_questions(&self.pool).await
    }

    // ------------------------------------------------------------------
    // Responses
    // ------------------------------------------------------------------

    /// This user's responses for exactly the given question ids
    ///
    /// Oldest first, so a caller folding into a map keeps the latest row if
    /// a racing insert ever produced two.
    pub async fn responses_for_questions(&self, question_ids: &[String]) -> Result<Vec<UserResponse>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, question_id, content, created_at, updated_at \
             FROM user_responses WHERE user_id = ",
        );
        qb.push_bind(self.user_id.clone());
        qb.push(" AND question_id IN (");
        let mut separated = qb.separated(", ");
        for id in question_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY updated_at ASC");

        let responses = qb
            .build_query_as::<UserResponse>()
            .fetch_all(&self.pool)
            .await?;

        Ok(responses)
    }

    /// Every response this user has saved, oldest first
    pub async fn all_responses(&self) -> Result<Vec<UserResponse>> {
        responses_of(&self.pool, &self.user_id).await
    }

    /// Upsert keyed by (user, question): point lookup, then update or insert
    ///
    /// Not atomic. Two racing saves of the same question resolve
    /// last-write-wins on `updated_at`.
    pub async fn upsert_response(&self, question_id: &str, content: &str) -> Result<()> {
        let now = Utc::now();

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM user_responses WHERE user_id = ? AND question_id = ? LIMIT 1",
        )
        .bind(&self.user_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE user_responses SET content = ?, updated_at = ? WHERE id = ?")
                    .bind(content)
                    .bind(now)
                    .bind(&id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO user_responses (id, user_id, question_id, content, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(uuid_utils::generate_id())
                .bind(&self.user_id)
                .bind(question_id)
                .bind(content)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Progress and completion
    // ------------------------------------------------------------------

    pub async fn progress_rows(&self) -> Result<Vec<ModuleProgress>> {
        let rows = sqlx::query_as::<_, ModuleProgress>(
            r#"
            SELECT id, user_id, module_id, completed, current_question, updated_at
            FROM module_progress
            WHERE user_id = ?
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a progress row unless one already exists
    ///
    /// Returns true when a row was inserted. An existing row, and its
    /// bookmark, is left untouched.
    pub async fn insert_progress_if_absent(
        &self,
        module_id: &str,
        current_question: Option<&str>,
    ) -> Result<bool> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM module_progress WHERE user_id = ? AND module_id = ? LIMIT 1",
        )
        .bind(&self.user_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO module_progress (id, user_id, module_id, completed, current_question, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(uuid_utils::generate_id())
        .bind(&self.user_id)
        .bind(module_id)
        .bind(current_question)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    /// Move the bookmark of an existing progress row
    ///
    /// Never creates a row (that would unlock the module). Returns whether a
    /// row was updated.
    pub async fn update_bookmark(&self, module_id: &str, question_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE module_progress SET current_question = ?, updated_at = ? WHERE user_id = ? AND module_id = ?",
        )
        .bind(question_id)
        .bind(Utc::now())
        .bind(&self.user_id)
        .bind(module_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn completed_module_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT module_id FROM completed_modules WHERE user_id = ?")
            .bind(&self.user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// Append the completion marker; repeating it is a no-op
    pub async fn mark_completed(&self, module_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO completed_modules (user_id, module_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, module_id) DO NOTHING
            "#,
        )
        .bind(&self.user_id)
        .bind(module_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn settings(&self) -> Result<Option<UserSettings>> {
        settings_of(&self.pool, &self.user_id).await
    }

    /// Store the analysis blob for a module slug
    ///
    /// Other slugs in the `analyses` map are preserved. The final report is
    /// mirrored into its own column.
    pub async fn save_analysis(&self, slug: &str, analysis: &Value) -> Result<()> {
        let path = format!("$.\"{}\"", slug);
        let json = serde_json::to_string(analysis)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, analyses, updated_at)
            VALUES (?, json_object(?, json(?)), ?)
            ON CONFLICT(user_id) DO UPDATE SET
                analyses = json_set(COALESCE(analyses, '{}'), ?, json(?)),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.user_id)
        .bind(slug)
        .bind(&json)
        .bind(now)
        .bind(&path)
        .bind(&json)
        .execute(&self.pool)
        .await?;

        if slug == FINAL_REPORT_SLUG {
            sqlx::query("UPDATE user_settings SET final_report = ? WHERE user_id = ?")
                .bind(&json)
                .bind(&self.user_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    pub async fn set_selected_practice(&self, practice: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, selected_practice, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                selected_practice = excluded.selected_practice,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.user_id)
        .bind(practice)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_selected_niche(&self, niche: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, selected_niche, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                selected_niche = excluded.selected_niche,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.user_id)
        .bind(niche)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update chat preferences; `None` leaves a preference unchanged
    pub async fn set_chat_preferences(
        &self,
        notifications: Option<bool>,
        sounds: Option<bool>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, chat_notifications, chat_sounds, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                chat_notifications = COALESCE(excluded.chat_notifications, chat_notifications),
                chat_sounds = COALESCE(excluded.chat_sounds, chat_sounds),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.user_id)
        .bind(notifications)
        .bind(sounds)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    pub async fn contact(&self, user_id: &str) -> Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT id, email, claims_admin AS is_admin FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Users this user may start a conversation with
    pub async fn contacts(&self, admins_only: bool) -> Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, email, claims_admin AS is_admin
            FROM users
            WHERE id != ? AND (? = 0 OR claims_admin = 1)
            ORDER BY email ASC
            "#,
        )
        .bind(&self.user_id)
        .bind(admins_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message> {
        let message = Message {
            id: uuid_utils::generate_id(),
            sender_id: self.user_id.clone(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            read: false,
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content, created_at, read)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    /// Every message sent or received by this user, newest first
    pub async fn messages_involving_me(&self) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, content, created_at, read
            FROM messages
            WHERE sender_id = ? OR receiver_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(&self.user_id)
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Messages between this user and `other`, oldest first
    pub async fn thread_with(&self, other: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, content, created_at, read
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&self.user_id)
        .bind(other)
        .bind(other)
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Mark messages received from `sender` as read; returns rows changed
    pub async fn mark_read_from(&self, sender: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read = 1 WHERE receiver_id = ? AND sender_id = ? AND read = 0",
        )
        .bind(&self.user_id)
        .bind(sender)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_counts(&self) -> Result<Vec<UnreadCount>> {
        let counts = sqlx::query_as::<_, UnreadCount>(
            r#"
            SELECT sender_id, COUNT(*) AS count
            FROM messages
            WHERE receiver_id = ? AND read = 0
            GROUP BY sender_id
            ORDER BY sender_id ASC
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Delete both directions of the conversation with `other`
    pub async fn delete_conversation(&self, other: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
        )
        .bind(&self.user_id)
        .bind(other)
        .bind(other)
        .bind(&self.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub(super) async fn responses_of(pool: &SqlitePool, user_id: &str) -> Result<Vec<UserResponse>> {
    let responses = sqlx::query_as::<_, UserResponse>(
        r#"
        SELECT id, user_id, question_id, content, created_at, updated_at
        FROM user_responses
        WHERE user_id = ?
        ORDER BY updated_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(responses)
}

pub(super) async fn settings_of(pool: &SqlitePool, user_id: &str) -> Result<Option<UserSettings>> {
    let settings = sqlx::query_as::<_, UserSettings>(
        r#"
        SELECT user_id, selected_practice, selected_niche, analyses,
               chat_notifications, chat_sounds, final_report, updated_at
        FROM user_settings
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(settings)
}
