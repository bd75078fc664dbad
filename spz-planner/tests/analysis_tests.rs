//! Integration tests for the analysis orchestrator
//!
//! - A module stays locked until its predecessor's analysis succeeds
//! - Capabilities inventory leads to practice selection, and the chosen
//!   practice is carried into the next prompt
//! - A failed generation leaves no trace and can be retried
//! - The final report is built from every saved answer

mod common;

use std::time::Duration;

use common::{create_user, hydrated_engine, module_id, provisioned_db};
use serde_json::json;
use spz_common::db::FINAL_REPORT_SLUG;
use spz_planner::analysis::{self, AnalysisError, AnalysisView, StubGenerator};
use spz_planner::analysis::prompt::NO_RESPONSES_PLACEHOLDER;
use spz_planner::engine::{Direction, Step};
use spz_planner::store::UserStore;

const SLOW: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_module_locked_until_predecessor_analysis_succeeds() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&engine, "capabilities-inventory");
    let strategy = engine.module_by_slug("strategy-framework").unwrap().clone();

    assert!(!engine.is_unlocked(&strategy));

    let generator = StubGenerator::new();
    generator.push_reply(json!({"practices": ["Fractional CFO"], "niches": []}));
    let outcome = analysis::generate(&mut engine, &generator, &capabilities)
        .await
        .unwrap();

    assert_eq!(outcome.unlocked.as_deref(), Some("strategy-framework"));
    assert!(engine.is_unlocked(&strategy));
    assert!(engine.is_completed(&capabilities));

    // Persisted: a new session sees the same lock state
    let fresh = hydrated_engine(&db.pool, &user.id, SLOW).await;
    assert!(fresh.is_unlocked(&strategy));
    assert!(fresh.is_completed(&capabilities));
}

#[tokio::test]
async fn test_practice_selection_feeds_next_analysis() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let generator = StubGenerator::new();

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("Ran finance for three startups").unwrap();
    engine.advance(Direction::Next).await.unwrap();
    engine.edit("Cut burn by 40%").unwrap();
    let step = engine.advance(Direction::Next).await.unwrap();
    let Step::Analyze { module_id: capabilities } = step else {
        panic!("expected the module to be ready for analysis");
    };

    generator.push_reply(json!({
        "practices": ["Fractional CFO", "FP&A Advisory", "Fundraising Support"],
        "niches": []
    }));
    let outcome = analysis::generate(&mut engine, &generator, &capabilities)
        .await
        .unwrap();
    assert_eq!(
        outcome.view,
        AnalysisView::PracticeSelection {
            practices: vec![
                "Fractional CFO".to_string(),
                "FP&A Advisory".to_string(),
                "Fundraising Support".to_string()
            ]
        }
    );
    assert!(generator.prompts()[0].contains("Ran finance for three startups"));
    assert!(generator.prompts()[0].contains("Cut burn by 40%"));

    engine
        .set_selected_practice(Some("Fractional CFO".to_string()))
        .await
        .unwrap();
    let settings = store.settings().await.unwrap().unwrap();
    assert_eq!(settings.selected_practice.as_deref(), Some("Fractional CFO"));
    assert!(settings.analysis("capabilities-inventory").is_some());

    // Re-running the inventory with a practice asks for niches
    generator.push_reply(json!({"practices": ["Fractional CFO"], "niches": ["SaaS", "Biotech"]}));
    let outcome = analysis::generate(&mut engine, &generator, &capabilities)
        .await
        .unwrap();
    assert_eq!(
        outcome.view,
        AnalysisView::NicheSelection {
            practice: "Fractional CFO".to_string(),
            niches: vec!["SaaS".to_string(), "Biotech".to_string()]
        }
    );
    assert!(generator.prompts()[1].contains("Fractional CFO"));

    // Answered in another session; this one never loaded the module
    let strategy = module_id(&engine, "strategy-framework");
    let strategy_question = store.questions_for_module(&strategy).await.unwrap()[0].id.clone();
    store
        .upsert_response(&strategy_question, "Own the Series A finance niche")
        .await
        .unwrap();

    generator.push_reply(json!({"summary": "Lead with cash discipline"}));
    analysis::generate(&mut engine, &generator, &strategy)
        .await
        .unwrap();
    let prompts = generator.prompts();
    let prompt = &prompts[2];
    assert!(prompt.contains("Fractional CFO"));
    assert!(prompt.contains("Own the Series A finance niche"));
    assert!(!prompt.contains(NO_RESPONSES_PLACEHOLDER));
}

#[tokio::test]
async fn test_placeholder_only_when_nothing_answered() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let pricing = module_id(&engine, "pricing");
    let generator = StubGenerator::new();

    generator.push_reply(json!({"summary": "Raise rates"}));
    analysis::generate(&mut engine, &generator, &pricing)
        .await
        .unwrap();
    assert!(generator.prompts()[0].contains(NO_RESPONSES_PLACEHOLDER));
}

#[tokio::test]
async fn test_resumed_session_analyzes_saved_answers_without_loading() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());

    let engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&engine, "capabilities-inventory");
    let questions = store.questions_for_module(&capabilities).await.unwrap();
    store.upsert_response(&questions[0].id, "Month-end close").await.unwrap();
    store.upsert_response(&questions[1].id, "Board reporting").await.unwrap();

    // Fresh session: hydrated but nothing loaded
    let mut resumed = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let generator = StubGenerator::new();
    generator.push_reply(json!({"practices": ["Fractional CFO"], "niches": []}));
    analysis::generate(&mut resumed, &generator, &capabilities)
        .await
        .unwrap();

    let prompts = generator.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("Month-end close"));
    assert!(prompt.contains("Board reporting"));
    assert!(!prompt.contains(NO_RESPONSES_PLACEHOLDER));
}

#[tokio::test]
async fn test_unlock_in_one_session_reaches_another() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let mut first_tab = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let mut second_tab = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&first_tab, "capabilities-inventory");

    let generator = StubGenerator::new();
    generator.push_reply(json!({"practices": ["A"], "niches": []}));
    analysis::generate(&mut first_tab, &generator, &capabilities)
        .await
        .unwrap();

    let strategy = second_tab.module_by_slug("strategy-framework").unwrap().clone();
    assert!(!second_tab.is_unlocked(&strategy));

    second_tab.refresh_modules().await.unwrap();
    assert!(second_tab.is_unlocked(&strategy));
    assert!(second_tab.is_completed(&capabilities));

    let status = second_tab
        .module_statuses()
        .into_iter()
        .find(|s| s.slug == "strategy-framework")
        .unwrap();
    assert!(status.unlocked);
    assert!(status.current_question.is_some());
}

#[tokio::test]
async fn test_failed_generation_leaves_no_marker_and_can_retry() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;
    let capabilities = module_id(&engine, "capabilities-inventory");
    let strategy = engine.module_by_slug("strategy-framework").unwrap().clone();
    let generator = StubGenerator::new();

    generator.push_failure("gateway timeout");
    let err = analysis::generate(&mut engine, &generator, &capabilities)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Generation(_)));
    assert!(err.to_string().contains("gateway timeout"));

    assert!(store.completed_module_ids().await.unwrap().is_empty());
    assert!(store.settings().await.unwrap().is_none());
    assert!(!engine.is_completed(&capabilities));
    assert!(!engine.is_unlocked(&strategy));

    generator.push_reply(json!({"practices": ["A"], "niches": []}));
    analysis::generate(&mut engine, &generator, &capabilities)
        .await
        .unwrap();
    assert_eq!(store.completed_module_ids().await.unwrap(), vec![capabilities]);
    assert!(engine.is_unlocked(&strategy));
}

#[tokio::test]
async fn test_final_report_uses_every_saved_answer() {
    let db = provisioned_db().await;
    let user = create_user(&db.pool, "u@example.com", false, true).await;
    let store = UserStore::new(db.pool.clone(), user.id.clone());
    let mut engine = hydrated_engine(&db.pool, &user.id, SLOW).await;

    let pricing = module_id(&engine, "pricing");
    let pricing_question = store.questions_for_module(&pricing).await.unwrap()[0].id.clone();
    store
        .upsert_response(&pricing_question, "Day rate of 1500")
        .await
        .unwrap();

    engine.load("capabilities-inventory").await.unwrap();
    engine.edit("Unsaved draft about audits").unwrap();

    let final_report = module_id(&engine, FINAL_REPORT_SLUG);
    let generator = StubGenerator::new();
    generator.push_reply(json!({"report": "done"}));
    let outcome = analysis::generate(&mut engine, &generator, &final_report)
        .await
        .unwrap();

    let prompts = generator.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("Day rate of 1500"));
    assert!(prompt.contains("Unsaved draft about audits"));
    assert_eq!(outcome.unlocked, None);

    let settings = store.settings().await.unwrap().unwrap();
    assert_eq!(settings.final_report.map(|r| r.0), Some(json!({"report": "done"})));
}
