//! Messaging endpoints and their polling streams

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::{sse::Event, Sse},
    Extension, Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use spz_common::db::Message;

use super::auth::CurrentSession;
use crate::error::ApiResult;
use crate::messaging::{self, ConversationSummary};
use crate::realtime::poll_stream;
use crate::store::{Contact, UnreadCount, UserStore};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

fn store_for(state: &AppState, session: &CurrentSession) -> UserStore {
    UserStore::new(state.db.clone(), session.user_id.clone())
}

async fn caller_is_admin(session: &CurrentSession) -> bool {
    session.handle.lock().await.identity().is_admin
}

/// GET /api/messages/contacts
pub async fn contacts(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Vec<Contact>>> {
    let is_admin = caller_is_admin(&session).await;
    let store = store_for(&state, &session);
    Ok(Json(messaging::contacts(&store, is_admin).await?))
}

/// POST /api/messages
pub async fn send(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<Message>> {
    let is_admin = caller_is_admin(&session).await;
    let store = store_for(&state, &session);
    let message = messaging::send(&store, &state.events, is_admin, &req.receiver_id, &req.content).await?;
    Ok(Json(message))
}

/// GET /api/messages/conversations
pub async fn conversations(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    let store = store_for(&state, &session);
    Ok(Json(messaging::conversations(&store).await?))
}

/// GET /api/messages/conversations/stream
pub async fn conversations_stream(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let store = store_for(&state, &session);
    let snapshots = poll_stream(state.config.poll_interval, &state.events, session.user_id, move || {
        let store = store.clone();
        async move { messaging::conversations(&store).await }
    });
    spz_common::sse::json_sse("Conversations", snapshots)
}

/// GET /api/messages/unread
pub async fn unread(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Vec<UnreadCount>>> {
    let store = store_for(&state, &session);
    Ok(Json(messaging::unread_counts(&store).await?))
}

/// GET /api/messages/unread/stream
pub async fn unread_stream(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let store = store_for(&state, &session);
    let snapshots = poll_stream(state.config.poll_interval, &state.events, session.user_id, move || {
        let store = store.clone();
        async move { messaging::unread_counts(&store).await }
    });
    spz_common::sse::json_sse("UnreadCounts", snapshots)
}

/// GET /api/messages/threads/:participant_id
///
/// Marks the caller's received messages in this thread as read.
pub async fn thread(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let store = store_for(&state, &session);
    Ok(Json(messaging::thread(&store, &state.events, &participant_id).await?))
}

/// GET /api/messages/threads/:participant_id/stream
pub async fn thread_stream(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(participant_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let store = store_for(&state, &session);
    let events = state.events.clone();
    let snapshots = poll_stream(state.config.poll_interval, &state.events, session.user_id, move || {
        let store = store.clone();
        let events = events.clone();
        let participant_id = participant_id.clone();
        async move { messaging::thread(&store, &events, &participant_id).await }
    });
    spz_common::sse::json_sse("Thread", snapshots)
}

/// DELETE /api/messages/threads/:participant_id
pub async fn delete_thread(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let store = store_for(&state, &session);
    let deleted = messaging::delete_conversation(&store, &state.events, &participant_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}
