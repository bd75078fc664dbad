//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;

/// Slug of the module that is always unlocked alongside the order-0 module
pub const CAPABILITIES_INVENTORY_SLUG: &str = "capabilities-inventory";
/// Slug of the module whose analysis synthesizes every prior answer
pub const FINAL_REPORT_SLUG: &str = "final-report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Module {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl Module {
    /// Order-0 and capabilities-inventory are unlocked regardless of progress rows
    pub fn is_implicitly_unlocked(&self) -> bool {
        self.order == 0 || self.slug == CAPABILITIES_INVENTORY_SLUG
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: String,
    pub module_id: String,
    pub content: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserResponse {
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Existence of a row means "unlocked"; `current_question` is an advisory bookmark
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleProgress {
    pub id: String,
    pub user_id: String,
    pub module_id: String,
    pub completed: bool,
    pub current_question: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompletedModule {
    pub user_id: String,
    pub module_id: String,
    pub created_at: DateTime<Utc>,
}

/// One row per user; cached analyses are keyed by module slug
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: String,
    pub selected_practice: Option<String>,
    pub selected_niche: Option<String>,
    pub analyses: Json<Map<String, Value>>,
    pub chat_notifications: Option<bool>,
    pub chat_sounds: Option<bool>,
    pub final_report: Option<Json<Value>>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Cached `analysis_<slug>` blob, if generated
    pub fn analysis(&self, slug: &str) -> Option<&Value> {
        self.analyses.0.get(slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// The other side of the conversation as seen by `user_id`
    pub fn participant_for(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Identity record; credential columns never leave the server
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub claims_admin: bool,
    pub claims_approved: bool,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}
