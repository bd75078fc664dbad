//! Serializable snapshots of engine state returned to clients

use serde::{Deserialize, Serialize};

/// Pseudo-slug of the static introduction view
pub const INTRODUCTION_SLUG: &str = "introduction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

/// Lock and completion state of one module as seen by one user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressEntry {
    pub unlocked: bool,
    pub completed: bool,
    pub current_question: Option<String>,
}

/// Module list row with the caller's flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStatus {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub order: i64,
    pub unlocked: bool,
    pub completed: bool,
    pub current_question: Option<String>,
}

/// The question currently on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub module_id: String,
    pub module_slug: String,
    pub module_title: String,
    pub question_id: String,
    pub content: String,
    /// Zero-based position within the module
    pub index: usize,
    pub total: usize,
    pub answer: String,
    pub has_typed: bool,
    pub is_last: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Static introduction; never touches storage
    Introduction { first_module: Option<String> },
    Question(QuestionView),
    /// A module with no questions
    EmptyModule {
        module_id: String,
        module_slug: String,
        module_title: String,
    },
    /// Nothing loaded yet in this session
    Idle,
}

/// Result of one navigation step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    View(View),
    /// Next was pressed on the last question; the module is ready for analysis
    Analyze { module_id: String },
}
