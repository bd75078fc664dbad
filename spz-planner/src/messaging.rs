//! Direct messages between users and admins
//!
//! Writes emit [`PlannerEvent::MessagesChanged`] so open streams refetch
//! early; the streams stay correct without it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spz_common::db::Message;
use spz_common::{EventBus, PlannerEvent};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::store::{Contact, UnreadCount, UserStore};

/// Latest message with one participant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub participant_id: String,
    pub participant_email: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread: i64,
}

fn changed(events: &EventBus, a: &str, b: &str) {
    events.emit_lossy(PlannerEvent::MessagesChanged {
        sender_id: a.to_string(),
        receiver_id: b.to_string(),
    });
}

/// Contacts the caller may write to: admins see everyone, users see admins
pub async fn contacts(store: &UserStore, caller_is_admin: bool) -> ApiResult<Vec<Contact>> {
    Ok(store.contacts(!caller_is_admin).await?)
}

pub async fn send(
    store: &UserStore,
    events: &EventBus,
    caller_is_admin: bool,
    receiver_id: &str,
    content: &str,
) -> ApiResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("message is empty".to_string()));
    }
    if receiver_id == store.user_id() {
        return Err(ApiError::BadRequest("cannot message yourself".to_string()));
    }

    let receiver = store
        .contact(receiver_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", receiver_id)))?;
    if !caller_is_admin && !receiver.is_admin {
        return Err(ApiError::Forbidden(
            "messages can only be sent to an administrator".to_string(),
        ));
    }

    let message = store.send_message(receiver_id, content).await?;
    changed(events, store.user_id(), receiver_id);
    debug!(message_id = %message.id, "Message sent");
    Ok(message)
}

/// One row per participant, most recent conversation first
pub async fn conversations(store: &UserStore) -> ApiResult<Vec<ConversationSummary>> {
    let me = store.user_id();
    let messages = store.messages_involving_me().await?;

    let mut unread: HashMap<&str, i64> = HashMap::new();
    for m in messages.iter().filter(|m| m.receiver_id == me && !m.read) {
        *unread.entry(m.sender_id.as_str()).or_default() += 1;
    }

    let mut summaries: Vec<ConversationSummary> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    // Newest first, so the first message per participant is the latest
    for message in &messages {
        let participant = message.participant_for(me);
        if !seen.insert(participant) {
            continue;
        }
        let email = store
            .contact(participant)
            .await?
            .map(|c| c.email)
            .unwrap_or_else(|| "unknown".to_string());
        summaries.push(ConversationSummary {
            participant_id: participant.to_string(),
            participant_email: email,
            last_message: message.content.clone(),
            last_message_at: message.created_at,
            unread: unread.get(participant).copied().unwrap_or(0),
        });
    }

    Ok(summaries)
}

/// Messages with `participant`, oldest first
///
/// Fetching marks the caller's received unread messages as read.
pub async fn thread(store: &UserStore, events: &EventBus, participant: &str) -> ApiResult<Vec<Message>> {
    let marked = store.mark_read_from(participant).await?;
    if marked > 0 {
        changed(events, participant, store.user_id());
    }
    Ok(store.thread_with(participant).await?)
}

pub async fn unread_counts(store: &UserStore) -> ApiResult<Vec<UnreadCount>> {
    Ok(store.unread_counts().await?)
}

/// Delete both directions of the conversation; returns rows removed
pub async fn delete_conversation(store: &UserStore, events: &EventBus, participant: &str) -> ApiResult<u64> {
    let removed = store.delete_conversation(participant).await?;
    if removed > 0 {
        changed(events, store.user_id(), participant);
    }
    Ok(removed)
}
