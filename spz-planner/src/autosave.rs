//! Debounced response autosave
//!
//! Every edit reschedules a single pending write that fires after the quiet
//! period. At most one write is pending per session: a new edit, a question
//! switch or a reset cancels it. Failed writes never roll back the answer
//! cache; they land in [`Warnings`] and are reported on the next response.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::UserStore;

/// Non-fatal problems queued for the next API response
#[derive(Clone, Default)]
pub struct Warnings(Arc<Mutex<Vec<String>>>);

impl Warnings {
    pub fn push(&self, warning: impl Into<String>) {
        let mut queue = self.0.lock().unwrap_or_else(|e| e.into_inner());
        queue.push(warning.into());
    }

    /// Take every queued warning, leaving the queue empty
    pub fn drain(&self) -> Vec<String> {
        let mut queue = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *queue)
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().map(|q| q.is_empty()).unwrap_or(true)
    }
}

struct PendingSave {
    question_id: String,
    token: CancellationToken,
}

pub struct Autosaver {
    store: UserStore,
    debounce: Duration,
    pending: Option<PendingSave>,
    warnings: Warnings,
}

impl Autosaver {
    pub fn new(store: UserStore, debounce: Duration, warnings: Warnings) -> Self {
        Self {
            store,
            debounce,
            pending: None,
            warnings,
        }
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Question id of the write currently waiting out its debounce
    pub fn pending_question(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .filter(|p| !p.token.is_cancelled())
            .map(|p| p.question_id.as_str())
    }

    /// Replace any pending write with one for `content`
    pub fn schedule(&mut self, question_id: &str, content: &str) {
        self.cancel_all();

        let token = CancellationToken::new();
        let child = token.clone();
        let store = self.store.clone();
        let warnings = self.warnings.clone();
        let debounce = self.debounce;
        let question_id_owned = question_id.to_string();
        let content = content.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    debug!(question_id = %question_id_owned, "Autosave cancelled");
                }
                _ = tokio::time::sleep(debounce) => {
                    // Claim the slot so a late cancel is a no-op
                    child.cancel();
                    persist(&store, &warnings, &question_id_owned, &content).await;
                }
            }
        });

        self.pending = Some(PendingSave {
            question_id: question_id.to_string(),
            token,
        });
    }

    /// Cancel the pending write if it belongs to `question_id`
    pub fn cancel(&mut self, question_id: &str) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.question_id == question_id)
        {
            self.cancel_all();
        }
    }

    pub fn cancel_all(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
    }

    /// Synchronous save used when navigating away from a question
    ///
    /// Cancels the pending write for the question first. Failure is queued as
    /// a warning and never returned as an error.
    pub async fn save_now(&mut self, question_id: &str, content: &str) {
        self.cancel(question_id);
        persist(&self.store, &self.warnings, question_id, content).await;
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn persist(store: &UserStore, warnings: &Warnings, question_id: &str, content: &str) {
    if content.trim().is_empty() {
        return;
    }

    match store.upsert_response(question_id, content).await {
        Ok(()) => debug!(question_id, "Saved response"),
        Err(e) => {
            warn!(question_id, "Failed to save response: {}", e);
            warnings.push(format!(
                "Failed to save your answer; it is kept only in this session ({})",
                e
            ));
        }
    }
}
