//! HTTP API handlers for spz-planner

pub mod admin;
pub mod auth;
pub mod health;
pub mod identity;
pub mod messages;
pub mod modules;
pub mod settings;

use axum::Json;
use serde::Serialize;

use crate::engine::ProgressEngine;

pub use auth::{require_admin, require_approved, require_session, CurrentSession};
pub use health::health_routes;

/// Response body for session-scoped questionnaire calls
///
/// `warnings` carries background failures (autosave, bookmark) queued since
/// the previous response. They are drained only into successful responses.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> Envelope<T> {
    pub fn wrap(data: T, engine: &ProgressEngine) -> Json<Self> {
        Json(Self {
            data,
            warnings: engine.warnings().drain(),
        })
    }
}
