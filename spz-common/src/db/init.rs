//! Database initialization
//!
//! Creates the SQLite file on first run and the full schema on every start
//! (`CREATE TABLE IF NOT EXISTS`, safe to run repeatedly).

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers alongside the autosave writers
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table used by the planner
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_recovery_tokens_table(pool).await?;

    // Reference data (provisioned out-of-band)
    create_modules_table(pool).await?;
    create_questions_table(pool).await?;

    // Per-user state
    create_user_responses_table(pool).await?;
    create_module_progress_table(pool).await?;
    create_completed_modules_table(pool).await?;
    create_user_settings_table(pool).await?;
    create_messages_table(pool).await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            claims_admin INTEGER NOT NULL DEFAULT 0,
            claims_approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_sign_in_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recovery_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recovery_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            "order" INTEGER NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            module_id TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            "order" INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_questions_module ON questions(module_id, \"order\")")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per (user, question) is maintained by the application
/// (select-then-update-or-insert), so there is intentionally no UNIQUE index.
async fn create_user_responses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_responses (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_user_responses_lookup ON user_responses(user_id, question_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_module_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_progress (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            module_id TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            current_question TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_module_progress_lookup ON module_progress(user_id, module_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_completed_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS completed_modules (
            user_id TEXT NOT NULL,
            module_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, module_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_settings (
            user_id TEXT PRIMARY KEY,
            selected_practice TEXT,
            selected_niche TEXT,
            analyses TEXT NOT NULL DEFAULT '{}',
            chat_notifications INTEGER,
            chat_sounds INTEGER,
            final_report TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, read)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
