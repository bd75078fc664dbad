//! Per-user settings: selections carried into prompts and chat preferences

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::auth::CurrentSession;
use super::Envelope;
use crate::engine::ProgressEngine;
use crate::error::ApiResult;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsResponse {
    pub selected_practice: Option<String>,
    pub selected_niche: Option<String>,
    pub chat_notifications: bool,
    pub chat_sounds: bool,
    /// Stored analysis results keyed by module slug
    pub analyses: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatPreferences {
    pub chat_notifications: Option<bool>,
    pub chat_sounds: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeSelection {
    pub practice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NicheSelection {
    pub niche: Option<String>,
}

fn normalize(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn snapshot(engine: &ProgressEngine) -> ApiResult<SettingsResponse> {
    let Some(settings) = engine.store().settings().await? else {
        return Ok(SettingsResponse {
            chat_notifications: true,
            chat_sounds: true,
            ..Default::default()
        });
    };
    Ok(SettingsResponse {
        selected_practice: settings.selected_practice,
        selected_niche: settings.selected_niche,
        chat_notifications: settings.chat_notifications.unwrap_or(true),
        chat_sounds: settings.chat_sounds.unwrap_or(true),
        analyses: settings.analyses.0,
    })
}

/// GET /api/settings
pub async fn get_settings(
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Envelope<SettingsResponse>>> {
    let guard = session.handle.lock().await;
    let settings = snapshot(&guard.engine).await?;
    Ok(Envelope::wrap(settings, &guard.engine))
}

/// PUT /api/settings
///
/// Absent fields keep their stored value.
pub async fn update_chat_preferences(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<ChatPreferences>,
) -> ApiResult<Json<Envelope<SettingsResponse>>> {
    let guard = session.handle.lock().await;
    guard
        .engine
        .store()
        .set_chat_preferences(req.chat_notifications, req.chat_sounds)
        .await?;
    let settings = snapshot(&guard.engine).await?;
    Ok(Envelope::wrap(settings, &guard.engine))
}

/// PUT /api/settings/practice
pub async fn select_practice(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<PracticeSelection>,
) -> ApiResult<Json<Envelope<SettingsResponse>>> {
    let mut guard = session.handle.lock().await;
    guard.engine.set_selected_practice(normalize(req.practice)).await?;
    let settings = snapshot(&guard.engine).await?;
    Ok(Envelope::wrap(settings, &guard.engine))
}

/// PUT /api/settings/niche
pub async fn select_niche(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<NicheSelection>,
) -> ApiResult<Json<Envelope<SettingsResponse>>> {
    let mut guard = session.handle.lock().await;
    guard.engine.set_selected_niche(normalize(req.niche)).await?;
    let settings = snapshot(&guard.engine).await?;
    Ok(Envelope::wrap(settings, &guard.engine))
}
