//! Shared fixtures: a throwaway database with a small curriculum

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use spz_common::api::auth::{generate_salt, hash_password};
use spz_common::db::{init_database, UserRecord};
use spz_common::EventBus;
use spz_planner::analysis::StubGenerator;
use spz_planner::engine::ProgressEngine;
use spz_planner::provision::{provision, Curriculum};
use spz_planner::store::{AuthStore, NewUser, UserStore};
use spz_planner::{AppState, PlannerConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse";

pub const CURRICULUM: &str = r#"
[[modules]]
slug = "introduction-video"
title = "Introduction"
order = 0
questions = ["What made you start consulting?"]

[[modules]]
slug = "capabilities-inventory"
title = "Capabilities Inventory"
order = 1
questions = ["What services have you delivered?", "Which results are you proudest of?"]

[[modules]]
slug = "strategy-framework"
title = "Strategy Framework"
order = 2
questions = ["Where do you want to be in three years?"]

[[modules]]
slug = "pricing"
title = "Pricing"
order = 3
questions = ["How do you price today?", "What would you charge if you could?"]

[[modules]]
slug = "final-report"
title = "Final Report"
order = 4
questions = []
"#;

/// Keeps the temp directory alive as long as the pool
pub struct TestDb {
    pub dir: TempDir,
    pub pool: SqlitePool,
}

pub async fn empty_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("spz.db")).await.unwrap();
    TestDb { dir, pool }
}

pub async fn provisioned_db() -> TestDb {
    let db = empty_db().await;
    let curriculum = Curriculum::parse(CURRICULUM).unwrap();
    provision(&db.pool, &curriculum).await.unwrap();
    db
}

pub async fn create_user(pool: &SqlitePool, email: &str, admin: bool, approved: bool) -> UserRecord {
    let salt = generate_salt();
    let hash = hash_password(PASSWORD, &salt);
    AuthStore::new(pool.clone())
        .create_user(NewUser {
            email,
            password_hash: &hash,
            password_salt: &salt,
            claims_admin: admin,
            claims_approved: approved,
        })
        .await
        .unwrap()
}

pub async fn hydrated_engine(pool: &SqlitePool, user_id: &str, debounce: Duration) -> ProgressEngine {
    let mut engine = ProgressEngine::new(UserStore::new(pool.clone(), user_id), debounce);
    engine.hydrate().await.unwrap();
    engine
}

pub fn module_id(engine: &ProgressEngine, slug: &str) -> String {
    engine.module_by_slug(slug).unwrap().id.clone()
}

pub fn test_config() -> PlannerConfig {
    PlannerConfig {
        autosave_debounce: Duration::from_millis(20),
        poll_interval: Duration::from_millis(50),
        allow_admin_signup: true,
        recovery_token_ttl: chrono::Duration::minutes(5),
        session_ttl: chrono::Duration::days(1),
        session_idle: Duration::from_secs(3600),
    }
}

pub fn app_state(pool: SqlitePool, generator: Arc<StubGenerator>) -> AppState {
    app_state_with(pool, generator, test_config())
}

pub fn app_state_with(pool: SqlitePool, generator: Arc<StubGenerator>, config: PlannerConfig) -> AppState {
    AppState::new(pool, generator, EventBus::new(16), config)
}
