//! spz-planner library - SPZ strategy planner service
//!
//! Guided questionnaire with per-user module unlocking, debounced answer
//! autosave and AI analysis per module, plus identity, messaging and admin
//! endpoints over one SQLite database.

use std::sync::Arc;

use axum::Router;
use spz_common::EventBus;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod analysis;
pub mod api;
pub mod autosave;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod provision;
pub mod realtime;
pub mod store;

pub use config::PlannerConfig;
pub use error::{ApiError, ApiResult};

use analysis::TextGenerator;
use identity::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Live sessions keyed by bearer token
    pub sessions: SessionRegistry,
    pub generator: Arc<dyn TextGenerator>,
    /// Invalidation signals for polling streams
    pub events: EventBus,
    pub config: PlannerConfig,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        generator: Arc<dyn TextGenerator>,
        events: EventBus,
        config: PlannerConfig,
    ) -> Self {
        Self {
            db,
            sessions: SessionRegistry::new(),
            generator,
            events,
            config,
        }
    }
}

/// Build application router
///
/// Route tiers: public, session (signed in), approved (signed in and
/// approved) and admin.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware::from_fn_with_state;
    use axum::routing::{get, post, put};

    let approved = Router::new()
        .route("/api/modules", get(api::modules::list_modules))
        .route("/api/modules/:slug/load", post(api::modules::load_module))
        .route("/api/answer", put(api::modules::edit_answer))
        .route("/api/advance", post(api::modules::advance))
        .route("/api/analysis/retry", post(api::modules::retry_analysis))
        .route("/api/analyses/:slug", get(api::modules::get_analysis))
        .route(
            "/api/settings",
            get(api::settings::get_settings).put(api::settings::update_chat_preferences),
        )
        .route("/api/settings/practice", put(api::settings::select_practice))
        .route("/api/settings/niche", put(api::settings::select_niche))
        .route_layer(from_fn_with_state(state.clone(), api::require_approved))
        .route_layer(from_fn_with_state(state.clone(), api::require_session));

    let admin = Router::new()
        .route("/api/admin/users", get(api::admin::list_users))
        .route(
            "/api/admin/users/:user_id",
            get(api::admin::inspect_user).delete(api::admin::delete_user),
        )
        .route("/api/admin/users/:user_id/approve", post(api::admin::approve_user))
        .route("/api/admin/growth", get(api::admin::growth))
        .route_layer(from_fn_with_state(state.clone(), api::require_admin))
        .route_layer(from_fn_with_state(state.clone(), api::require_session));

    let session = Router::new()
        .route("/api/auth/signout", post(api::identity::sign_out))
        .route("/api/auth/password", post(api::identity::update_password))
        .route("/api/auth/me", get(api::identity::me))
        .route("/api/auth/approval/stream", get(api::identity::approval_stream))
        .route("/api/messages", post(api::messages::send))
        .route("/api/messages/contacts", get(api::messages::contacts))
        .route("/api/messages/conversations", get(api::messages::conversations))
        .route(
            "/api/messages/conversations/stream",
            get(api::messages::conversations_stream),
        )
        .route("/api/messages/unread", get(api::messages::unread))
        .route("/api/messages/unread/stream", get(api::messages::unread_stream))
        .route(
            "/api/messages/threads/:participant_id",
            get(api::messages::thread).delete(api::messages::delete_thread),
        )
        .route(
            "/api/messages/threads/:participant_id/stream",
            get(api::messages::thread_stream),
        )
        .route_layer(from_fn_with_state(state.clone(), api::require_session));

    let public = Router::new()
        .route("/api/auth/signup", post(api::identity::sign_up))
        .route("/api/auth/signin", post(api::identity::sign_in))
        .route("/api/auth/recovery", post(api::identity::request_recovery))
        .route(
            "/api/auth/recovery/exchange",
            post(api::identity::exchange_recovery),
        )
        .merge(api::health_routes());

    Router::new()
        .merge(approved)
        .merge(admin)
        .merge(session)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
