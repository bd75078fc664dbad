//! Questionnaire endpoints: module list, navigation, answers and analysis
//!
//! Each call locks the caller's session for its whole duration, so
//! navigation and analysis of one user never interleave.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::auth::CurrentSession;
use super::Envelope;
use crate::analysis::{self, AnalysisOutcome, AnalysisView};
use crate::engine::{Direction, ModuleStatus, ProgressEngine, Step, View, INTRODUCTION_SLUG};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub direction: Direction,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryRequest {
    /// Module slug; defaults to the active module
    #[serde(default)]
    pub module: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Navigated { view: View },
    Analyzed { result: AnalysisOutcome },
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedAnalysis {
    pub module_slug: String,
    pub analysis: Value,
    pub view: AnalysisView,
}

/// Reject access to a module the caller has not unlocked
///
/// A module unknown or locked in this session is re-checked against storage
/// first: it may have been provisioned since, or unlocked by another session.
async fn ensure_unlocked(engine: &mut ProgressEngine, slug: &str) -> ApiResult<()> {
    let unlocked_here = engine
        .module_by_slug(slug)
        .is_some_and(|m| engine.is_unlocked(m));
    if !unlocked_here {
        engine.refresh_modules().await?;
    }

    match engine.module_by_slug(slug) {
        Some(module) if !engine.is_unlocked(module) => {
            debug!(slug, "Rejected access to locked module");
            Err(ApiError::Forbidden(format!("module {} is locked", slug)))
        }
        _ => Ok(()),
    }
}

async fn run_analysis(state: &AppState, engine: &mut ProgressEngine, module_id: &str) -> ApiResult<AnalysisOutcome> {
    Ok(analysis::generate(engine, state.generator.as_ref(), module_id).await?)
}

/// GET /api/modules
///
/// Re-reads progress so unlocks from the user's other sessions show up.
pub async fn list_modules(
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Envelope<Vec<ModuleStatus>>>> {
    let mut guard = session.handle.lock().await;
    guard.engine.refresh_modules().await?;
    Ok(Envelope::wrap(guard.engine.module_statuses(), &guard.engine))
}

/// POST /api/modules/:slug/load
pub async fn load_module(
    Extension(session): Extension<CurrentSession>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<View>>> {
    let mut guard = session.handle.lock().await;
    let engine = &mut guard.engine;

    if slug != INTRODUCTION_SLUG {
        ensure_unlocked(engine, &slug).await?;
    }
    let view = engine.load(&slug).await?;
    Ok(Envelope::wrap(view, engine))
}

/// PUT /api/answer
pub async fn edit_answer(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<EditRequest>,
) -> ApiResult<Json<Envelope<View>>> {
    let mut guard = session.handle.lock().await;
    let view = guard.engine.edit(&req.text)?;
    Ok(Envelope::wrap(view, &guard.engine))
}

/// POST /api/advance
///
/// Next on the last question runs the analysis for the module. A failed
/// analysis returns a retryable error and leaves the answers saved.
pub async fn advance(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<AdvanceRequest>,
) -> ApiResult<Json<Envelope<AdvanceOutcome>>> {
    let mut guard = session.handle.lock().await;
    let engine = &mut guard.engine;

    let outcome = match engine.advance(req.direction).await? {
        Step::View(view) => AdvanceOutcome::Navigated { view },
        Step::Analyze { module_id } => AdvanceOutcome::Analyzed {
            result: run_analysis(&state, engine, &module_id).await?,
        },
    };
    Ok(Envelope::wrap(outcome, engine))
}

/// POST /api/analysis/retry
pub async fn retry_analysis(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    body: Option<Json<RetryRequest>>,
) -> ApiResult<Json<Envelope<AnalysisOutcome>>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let mut guard = session.handle.lock().await;
    let engine = &mut guard.engine;

    let module_id = match req.module {
        Some(slug) => {
            ensure_unlocked(engine, &slug).await?;
            engine
                .module_by_slug(&slug)
                .map(|m| m.id.clone())
                .ok_or_else(|| ApiError::NotFound(format!("module {}", slug)))?
        }
        None => engine
            .active_module()
            .map(|m| m.id.clone())
            .ok_or_else(|| ApiError::BadRequest("no module loaded".to_string()))?,
    };

    let result = run_analysis(&state, engine, &module_id).await?;
    Ok(Envelope::wrap(result, engine))
}

/// GET /api/analyses/:slug
pub async fn get_analysis(
    Extension(session): Extension<CurrentSession>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<CachedAnalysis>>> {
    let guard = session.handle.lock().await;
    let engine = &guard.engine;

    let settings = engine.store().settings().await?;
    let analysis = settings
        .as_ref()
        .and_then(|s| s.analysis(&slug))
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("analysis for {}", slug)))?;

    let view = AnalysisView::for_result(&slug, &analysis, engine.selected_practice());
    Ok(Envelope::wrap(
        CachedAnalysis {
            module_slug: slug,
            analysis,
            view,
        },
        engine,
    ))
}
