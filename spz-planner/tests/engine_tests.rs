//! Integration tests for the module progress engine
//!
//! - Implicit unlock of order 0 and capabilities-inventory
//! - Unlock-next inserts one row and keeps an existing bookmark
//! - Answers round-trip through storage
//! - Empty answers are allowed only on the last question
//! - Debounced autosave writes once, after input goes quiet

mod common;

use std::time::Duration;

use common::{create_user, hydrated_engine, module_id, provisioned_db};
use spz_common::Error;
use spz_planner::engine::{Direction, Step, View, INTRODUCTION_SLUG};
use spz_planner::store::UserStore;

const SLOW: Duration = Duration::from_secs(60);

fn question_view(view: &View) -> &spz_planner::engine::QuestionView {
    match view {
        View::Question(q) => q,
        other => panic!("expected a question view, got {:?}", other),
    }
}

#[tokio::test]
async fn test_implicit_unlock_rules() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    let unlocked: Vec<(String, bool)> = engine
        .module_statuses()
        .into_iter()
        .map(|s| (s.slug, s.unlocked))
        .collect();

    assert_eq!(
        unlocked,
        vec![
            ("introduction-video".to_string(), true),
            ("capabilities-inventory".to_string(), true),
            ("strategy-framework".to_string(), false),
            ("pricing".to_string(), false),
            ("final-report".to_string(), false),
        ]
    );
    assert!(engine.module_statuses().iter().all(|s| !s.completed));
}

#[tokio::test]
async fn test_introduction_needs_no_storage() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    let view = engine.load(INTRODUCTION_SLUG).await.unwrap();
    assert_eq!(
        view,
        View::Introduction {
            first_module: Some("introduction-video".to_string())
        }
    );

    // Next from the introduction opens the first module
    let step = engine.advance(Direction::Next).await.unwrap();
    let Step::View(view) = step else {
        panic!("expected navigation");
    };
    assert_eq!(question_view(&view).module_slug, "introduction-video");
}

#[tokio::test]
async fn test_unknown_slug_is_not_found() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    let err = engine.load("does-not-exist").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_unlock_next_is_idempotent_and_keeps_bookmark() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());

    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let strategy = module_id(&engine, "strategy-framework");
    let pricing = module_id(&engine, "pricing");

    let unlocked = engine.unlock_next(&strategy).await.unwrap();
    assert_eq!(unlocked.as_deref(), Some("pricing"));

    let pricing_questions = store.questions_for_module(&pricing).await.unwrap();
    let first = pricing_questions[0].id.clone();
    let second = pricing_questions[1].id.clone();
    assert_eq!(
        engine.progress_entry(&pricing).unwrap().current_question.as_deref(),
        Some(first.as_str())
    );

    // The user moves on within the module, then the predecessor is re-analyzed
    assert!(store.update_bookmark(&pricing, &second).await.unwrap());
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    engine.unlock_next(&strategy).await.unwrap();
    engine.unlock_next(&strategy).await.unwrap();

    let rows: Vec<_> = store
        .progress_rows()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.module_id == pricing)
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].current_question.as_deref(), Some(second.as_str()));
    assert!(!rows[0].completed);
    assert_eq!(
        engine.progress_entry(&pricing).unwrap().current_question.as_deref(),
        Some(second.as_str())
    );
}

#[tokio::test]
async fn test_unlock_after_last_module_is_noop() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let last = module_id(&engine, "final-report");

    assert_eq!(engine.unlock_next(&last).await.unwrap(), None);
}

#[tokio::test]
async fn test_answer_round_trip_through_storage() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("  Fractional finance leadership  ").unwrap();
    engine.advance(Direction::Next).await.unwrap();

    engine.clear_answer_cache();
    let view = engine.load("capabilities-inventory").await.unwrap();
    assert_eq!(question_view(&view).answer.trim(), "Fractional finance leadership");

    // A fresh session sees the same text
    let mut other = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let view = other.load("capabilities-inventory").await.unwrap();
    assert_eq!(question_view(&view).answer.trim(), "Fractional finance leadership");
}

#[tokio::test]
async fn test_empty_answer_allowed_only_on_last_question() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&engine, "capabilities-inventory");

    engine.load("capabilities-inventory").await.unwrap();

    let err = engine.advance(Direction::Next).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    engine.edit("   ").unwrap();
    assert!(engine.advance(Direction::Next).await.is_err());

    engine.edit("Audits").unwrap();
    let Step::View(view) = engine.advance(Direction::Next).await.unwrap() else {
        panic!("expected navigation to the second question");
    };
    let q = question_view(&view);
    assert_eq!(q.index, 1);
    assert!(q.is_last);
    assert!(!q.has_typed);

    let step = engine.advance(Direction::Next).await.unwrap();
    assert_eq!(
        step,
        Step::Analyze {
            module_id: capabilities
        }
    );
}

#[tokio::test]
async fn test_prev_walks_back_across_modules() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    engine.load("capabilities-inventory").await.unwrap();
    let Step::View(view) = engine.advance(Direction::Prev).await.unwrap() else {
        panic!("expected navigation");
    };
    assert_eq!(question_view(&view).module_slug, "introduction-video");
    assert_eq!(question_view(&view).index, 0);

    let Step::View(view) = engine.advance(Direction::Prev).await.unwrap() else {
        panic!("expected navigation");
    };
    assert!(matches!(view, View::Introduction { .. }));
}

#[tokio::test]
async fn test_debounced_autosave_writes_latest_text_once_quiet() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, Duration::from_millis(50)).await;

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("Ops").unwrap();
    engine.edit("Ops and finance").unwrap();
    assert!(engine.pending_autosave().is_some());
    assert!(store.all_responses().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;

    let responses = store.all_responses().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].content, "Ops and finance");
    assert!(engine.warnings().is_empty());
}

#[tokio::test]
async fn test_reset_cancels_pending_autosave() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, Duration::from_millis(50)).await;

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("never saved").unwrap();
    engine.reset();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.all_responses().await.unwrap().is_empty());
    assert_eq!(engine.current_view(), View::Idle);
    assert!(engine.modules().is_empty());
}

#[tokio::test]
async fn test_last_write_wins_for_same_question() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());

    let engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&engine, "capabilities-inventory");
    let question = store.questions_for_module(&capabilities).await.unwrap()[0].id.clone();

    let a = store.clone();
    let b = store.clone();
    let qa = question.clone();
    let qb = question.clone();
    let (ra, rb) = tokio::join!(
        async move { a.upsert_response(&qa, "first tab").await },
        async move { b.upsert_response(&qb, "second tab").await },
    );
    ra.unwrap();
    rb.unwrap();

    store.upsert_response(&question, "final edit").await.unwrap();

    let stored: Vec<_> = store
        .all_responses()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.question_id == question)
        .collect();
    assert!(!stored.is_empty());
    assert_eq!(stored.last().unwrap().content, "final edit");

    let mut reader = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let view = reader.load("capabilities-inventory").await.unwrap();
    assert_eq!(question_view(&view).answer, "final edit");
}

#[tokio::test]
async fn test_failed_autosave_keeps_cache_and_queues_warning() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, Duration::from_millis(30)).await;

    engine.load("capabilities-inventory").await.unwrap();
    db.pool.close().await;

    engine.edit("typed while offline").unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let warnings = engine.warnings().drain();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Failed to save your answer"));
    assert_eq!(question_view(&engine.current_view()).answer, "typed while offline");
}

#[tokio::test]
async fn test_switching_questions_cancels_pending_autosave() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, Duration::from_millis(50)).await;

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("Audits").unwrap();
    engine.advance(Direction::Next).await.unwrap();

    engine.edit("draft on the second question").unwrap();
    assert!(engine.pending_autosave().is_some());
    engine.advance(Direction::Prev).await.unwrap();
    assert!(engine.pending_autosave().is_none());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let contents: Vec<String> = store
        .all_responses()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect();
    assert_eq!(contents, vec!["Audits".to_string()]);

    // Loading another module cancels as well
    engine.edit("Audits and tax").unwrap();
    engine.load("introduction-video").await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(store.all_responses().await.unwrap()[0].content, "Audits");
}

#[tokio::test]
async fn test_later_debounced_write_wins_across_sessions() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let debounce = Duration::from_millis(100);
    let mut first_tab = hydrated_engine(&db.pool, &user.id, debounce).await;
    let mut second_tab = hydrated_engine(&db.pool, &user.id, debounce).await;

    first_tab.load("capabilities-inventory").await.unwrap();
    second_tab.load("capabilities-inventory").await.unwrap();

    // Both writes are pending at once; the second timer fires last
    first_tab.edit("first tab").unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    second_tab.edit("second tab").unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(first_tab.warnings().is_empty());
    assert!(second_tab.warnings().is_empty());

    let mut reader = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let view = reader.load("capabilities-inventory").await.unwrap();
    assert_eq!(question_view(&view).answer, "second tab");
}
