//! Analysis orchestrator
//!
//! Assembles the prompt for a module, asks the generator for a JSON object,
//! then persists the result, records completion and unlocks the next
//! module, in that order. A generation failure leaves storage untouched, so
//! the call can be repeated.

pub mod generator;
pub mod prompt;

pub use generator::{GenerationError, OpenAiGenerator, StubGenerator, TextGenerator};

use serde::Serialize;
use serde_json::Value;
use spz_common::db::{CAPABILITIES_INVENTORY_SLUG, FINAL_REPORT_SLUG};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::ProgressEngine;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to analyze responses: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] spz_common::Error),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Generation(e) => {
                ApiError::Analysis(format!("Failed to analyze responses: {}", e))
            }
            AnalysisError::Storage(e) => e.into(),
        }
    }
}

/// What the client should show after an analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisView {
    /// Pick one of the suggested practices
    PracticeSelection { practices: Vec<String> },
    /// Pick a niche within the chosen practice
    NicheSelection { practice: String, niches: Vec<String> },
    Summary,
}

impl AnalysisView {
    pub fn for_result(slug: &str, analysis: &Value, selected_practice: Option<&str>) -> Self {
        if slug != CAPABILITIES_INVENTORY_SLUG {
            return AnalysisView::Summary;
        }

        let practices = string_array(analysis, "practices");
        let niches = string_array(analysis, "niches");

        match selected_practice {
            Some(practice) if !niches.is_empty() => AnalysisView::NicheSelection {
                practice: practice.to_string(),
                niches,
            },
            _ if !practices.is_empty() && niches.is_empty() => {
                AnalysisView::PracticeSelection { practices }
            }
            _ => AnalysisView::Summary,
        }
    }
}

fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub module_slug: String,
    pub analysis: Value,
    pub view: AnalysisView,
    /// Slug of the module unlocked by this completion, if any
    pub unlocked: Option<String>,
}

/// Generate, persist and propagate the analysis for `module_id`
///
/// Concurrent calls for the same module are not prevented; the later
/// write wins.
pub async fn generate(
    engine: &mut ProgressEngine,
    generator: &dyn TextGenerator,
    module_id: &str,
) -> Result<AnalysisOutcome, AnalysisError> {
    let module = engine
        .module(module_id)
        .cloned()
        .ok_or_else(|| spz_common::Error::NotFound(format!("module {}", module_id)))?;

    let answers = if module.slug == FINAL_REPORT_SLUG {
        engine.all_answers().await?
    } else {
        engine.collect_answers(&module.id).await?
    };

    let practice = engine
        .selected_practice()
        .filter(|_| prompt::uses_practice_context(&module.slug))
        .map(str::to_string);

    let prompt = prompt::build_prompt(&module.slug, &answers, practice.as_deref());

    let analysis = match generator.generate_json(&prompt).await {
        Ok(value) => value,
        Err(e) => {
            warn!(slug = %module.slug, "Analysis generation failed: {}", e);
            return Err(e.into());
        }
    };

    let store = engine.store().clone();
    store.save_analysis(&module.slug, &analysis).await?;
    store.mark_completed(&module.id).await?;
    engine.mark_completed(&module.id);
    let unlocked = engine.unlock_next(&module.id).await?;

    info!(
        user_id = store.user_id(),
        slug = %module.slug,
        answers = answers.len(),
        "Analysis complete"
    );

    let view = AnalysisView::for_result(&module.slug, &analysis, engine.selected_practice());
    Ok(AnalysisOutcome {
        module_slug: module.slug,
        analysis,
        view,
        unlocked,
    })
}
