//! Module progress engine
//!
//! Per-session state machine over the ordered module list. Questions are a
//! read-through cache keyed by module id: presence of a key means the module
//! was fetched, so a module with no questions is never fetched twice.
//!
//! Unlock rule for a module:
//! - `order == 0` or slug `capabilities-inventory` (implicit), or
//! - a `module_progress` row exists for the user, or
//! - the module is in the user's completed set.
//!
//! Completion comes only from the completed set; the `completed` column of
//! `module_progress` is never consulted.

mod view;

pub use view::{Direction, ModuleStatus, ProgressEntry, QuestionView, Step, View, INTRODUCTION_SLUG};

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use spz_common::db::{Module, Question};
use spz_common::{Error, Result};
use tracing::{debug, info};

use crate::autosave::{Autosaver, Warnings};
use crate::store::UserStore;

#[derive(Debug, Clone, PartialEq)]
enum Active {
    Introduction,
    Module(String),
}

pub struct ProgressEngine {
    store: UserStore,
    autosave: Autosaver,
    modules: Vec<Module>,
    questions: HashMap<String, Vec<Question>>,
    answers: HashMap<String, String>,
    progress: HashMap<String, ProgressEntry>,
    completed: HashSet<String>,
    selected_practice: Option<String>,
    selected_niche: Option<String>,
    active: Option<Active>,
    question_index: usize,
    has_typed: bool,
}

impl ProgressEngine {
    pub fn new(store: UserStore, debounce: Duration) -> Self {
        let autosave = Autosaver::new(store.clone(), debounce, Warnings::default());
        Self {
            store,
            autosave,
            modules: Vec::new(),
            questions: HashMap::new(),
            answers: HashMap::new(),
            progress: HashMap::new(),
            completed: HashSet::new(),
            selected_practice: None,
            selected_niche: None,
            active: None,
            question_index: 0,
            has_typed: false,
        }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn warnings(&self) -> &Warnings {
        self.autosave.warnings()
    }

    pub fn pending_autosave(&self) -> Option<&str> {
        self.autosave.pending_question()
    }

    /// Rebuild the persisted subset of state at session start
    pub async fn hydrate(&mut self) -> Result<()> {
        self.modules = self.store.list_modules().await?;
        self.completed = self.store.completed_module_ids().await?.into_iter().collect();

        self.progress.clear();
        for row in self.store.progress_rows().await? {
            self.progress.insert(
                row.module_id.clone(),
                ProgressEntry {
                    unlocked: true,
                    completed: self.completed.contains(&row.module_id),
                    current_question: row.current_question,
                },
            );
        }
        for module in self.modules.iter().filter(|m| m.is_implicitly_unlocked()) {
            let entry = self.progress.entry(module.id.clone()).or_default();
            entry.unlocked = true;
            entry.completed = self.completed.contains(&module.id);
        }

        if let Some(settings) = self.store.settings().await? {
            self.selected_practice = settings.selected_practice;
            self.selected_niche = settings.selected_niche;
        }

        debug!(
            user_id = self.store.user_id(),
            modules = self.modules.len(),
            unlocked = self.progress.len(),
            completed = self.completed.len(),
            "Hydrated progress engine"
        );
        Ok(())
    }

    /// Re-read the module list, progress rows and completed set
    ///
    /// Picks up unlocks written by another session of the same user. Caches
    /// and in-memory bookmarks are kept.
    pub async fn refresh_modules(&mut self) -> Result<()> {
        self.modules = self.store.list_modules().await?;
        self.completed = self.store.completed_module_ids().await?.into_iter().collect();

        for row in self.store.progress_rows().await? {
            let entry = self.progress.entry(row.module_id).or_default();
            entry.unlocked = true;
            if entry.current_question.is_none() {
                entry.current_question = row.current_question;
            }
        }
        for module in self.modules.iter().filter(|m| m.is_implicitly_unlocked()) {
            self.progress.entry(module.id.clone()).or_default().unlocked = true;
        }
        for (module_id, entry) in self.progress.iter_mut() {
            entry.completed = self.completed.contains(module_id);
        }
        Ok(())
    }

    /// Clear everything and cancel any pending autosave
    pub fn reset(&mut self) {
        self.autosave.cancel_all();
        self.modules.clear();
        self.questions.clear();
        self.answers.clear();
        self.progress.clear();
        self.completed.clear();
        self.selected_practice = None;
        self.selected_niche = None;
        self.active = None;
        self.question_index = 0;
        self.has_typed = false;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    pub fn module_by_slug(&self, slug: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.slug == slug)
    }

    pub fn is_unlocked(&self, module: &Module) -> bool {
        module.is_implicitly_unlocked()
            || self.progress.get(&module.id).is_some_and(|p| p.unlocked)
            || self.completed.contains(&module.id)
    }

    pub fn is_completed(&self, module_id: &str) -> bool {
        self.completed.contains(module_id)
    }

    pub fn progress_entry(&self, module_id: &str) -> Option<&ProgressEntry> {
        self.progress.get(module_id)
    }

    pub fn module_statuses(&self) -> Vec<ModuleStatus> {
        self.modules
            .iter()
            .map(|m| ModuleStatus {
                id: m.id.clone(),
                slug: m.slug.clone(),
                title: m.title.clone(),
                order: m.order,
                unlocked: self.is_unlocked(m),
                completed: self.is_completed(&m.id),
                current_question: self
                    .progress
                    .get(&m.id)
                    .and_then(|p| p.current_question.clone()),
            })
            .collect()
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn has_typed(&self) -> bool {
        self.has_typed
    }

    pub fn selected_practice(&self) -> Option<&str> {
        self.selected_practice.as_deref()
    }

    pub fn selected_niche(&self) -> Option<&str> {
        self.selected_niche.as_deref()
    }

    pub fn active_module(&self) -> Option<&Module> {
        match &self.active {
            Some(Active::Module(id)) => self.module(id),
            _ => None,
        }
    }

    fn active_questions(&self) -> &[Question] {
        match &self.active {
            Some(Active::Module(id)) => self.questions.get(id).map(Vec::as_slice).unwrap_or(&[]),
            _ => &[],
        }
    }

    fn current_question(&self) -> Option<&Question> {
        self.active_questions().get(self.question_index)
    }

    /// Non-empty trimmed answers for a module, in question order
    pub fn answers_for_module(&self, module_id: &str) -> Vec<String> {
        self.questions
            .get(module_id)
            .into_iter()
            .flatten()
            .filter_map(|q| self.answers.get(&q.id))
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Non-empty trimmed answers for a module, reading stored answers for
    /// questions this session has not cached
    ///
    /// Cached text wins over stored text for the same question.
    pub async fn collect_answers(&mut self, module_id: &str) -> Result<Vec<String>> {
        let question_ids: Vec<String> = self
            .ensure_questions(module_id)
            .await?
            .iter()
            .map(|q| q.id.clone())
            .collect();
        let missing: Vec<String> = question_ids
            .into_iter()
            .filter(|id| !self.answers.contains_key(id))
            .collect();

        if !missing.is_empty() {
            for response in self.store.responses_for_questions(&missing).await? {
                self.answers.insert(response.question_id, response.content);
            }
        }
        Ok(self.answers_for_module(module_id))
    }

    /// Every answer the user has saved, merged with unsaved cache entries
    ///
    /// Cached text wins over stored text for the same question.
    pub async fn all_answers(&self) -> Result<Vec<String>> {
        let mut merged: HashMap<String, String> = self
            .store
            .all_responses()
            .await?
            .into_iter()
            .map(|r| (r.question_id, r.content))
            .collect();
        for (question_id, text) in &self.answers {
            merged.insert(question_id.clone(), text.clone());
        }

        let order = self.store.all_questions().await?;
        let mut ordered = Vec::new();
        for question in &order {
            if let Some(text) = merged.remove(&question.id) {
                ordered.push(text);
            }
        }
        // Answers to questions no longer provisioned go last
        let mut leftovers: Vec<(String, String)> = merged.into_iter().collect();
        leftovers.sort();
        ordered.extend(leftovers.into_iter().map(|(_, text)| text));

        Ok(ordered
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect())
    }

    /// Snapshot of what the client should display
    pub fn current_view(&self) -> View {
        match &self.active {
            None => View::Idle,
            Some(Active::Introduction) => View::Introduction {
                first_module: self.modules.first().map(|m| m.slug.clone()),
            },
            Some(Active::Module(id)) => {
                let Some(module) = self.module(id) else {
                    return View::Idle;
                };
                let questions = self.active_questions();
                match questions.get(self.question_index) {
                    Some(q) => View::Question(QuestionView {
                        module_id: module.id.clone(),
                        module_slug: module.slug.clone(),
                        module_title: module.title.clone(),
                        question_id: q.id.clone(),
                        content: q.content.clone(),
                        index: self.question_index,
                        total: questions.len(),
                        answer: self.answers.get(&q.id).cloned().unwrap_or_default(),
                        has_typed: self.has_typed,
                        is_last: self.question_index + 1 == questions.len(),
                    }),
                    None => View::EmptyModule {
                        module_id: module.id.clone(),
                        module_slug: module.slug.clone(),
                        module_title: module.title.clone(),
                    },
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Activate a module (or the introduction) at its first question
    pub async fn load(&mut self, slug: &str) -> Result<View> {
        self.autosave.cancel_all();

        if slug == INTRODUCTION_SLUG {
            self.active = Some(Active::Introduction);
            self.question_index = 0;
            self.has_typed = false;
            return Ok(self.current_view());
        }

        let module = match self.module_by_slug(slug) {
            Some(m) => m.clone(),
            None => {
                let m = self
                    .store
                    .module_by_slug(slug)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("module {}", slug)))?;
                self.modules.push(m.clone());
                self.modules.sort_by_key(|m| m.order);
                m
            }
        };

        let question_ids: Vec<String> = self
            .ensure_questions(&module.id)
            .await?
            .iter()
            .map(|q| q.id.clone())
            .collect();

        for response in self.store.responses_for_questions(&question_ids).await? {
            self.answers.insert(response.question_id, response.content);
        }

        if module.is_implicitly_unlocked() {
            self.progress.entry(module.id.clone()).or_default().unlocked = true;
        }

        self.active = Some(Active::Module(module.id.clone()));
        self.question_index = 0;
        self.has_typed = false;

        debug!(slug, questions = question_ids.len(), "Loaded module");
        Ok(self.current_view())
    }

    /// Update the cached answer for the current question and schedule a save
    pub fn edit(&mut self, text: &str) -> Result<View> {
        let question_id = self
            .current_question()
            .map(|q| q.id.clone())
            .ok_or_else(|| Error::InvalidInput("no active question".to_string()))?;

        self.answers.insert(question_id.clone(), text.to_string());
        self.has_typed = true;
        self.autosave.schedule(&question_id, text);

        Ok(self.current_view())
    }

    pub async fn advance(&mut self, direction: Direction) -> Result<Step> {
        match direction {
            Direction::Next => self.next().await,
            Direction::Prev => self.prev().await,
        }
    }

    async fn next(&mut self) -> Result<Step> {
        let module_id = match &self.active {
            None => return Err(Error::InvalidInput("no module loaded".to_string())),
            Some(Active::Introduction) => {
                let first = self
                    .modules
                    .first()
                    .map(|m| m.slug.clone())
                    .ok_or_else(|| Error::NotFound("no modules provisioned".to_string()))?;
                return Ok(Step::View(self.load(&first).await?));
            }
            Some(Active::Module(id)) => id.clone(),
        };

        let total = self.active_questions().len();
        let question_id = self
            .current_question()
            .map(|q| q.id.clone())
            .ok_or_else(|| Error::InvalidInput("module has no questions".to_string()))?;
        let is_last = self.question_index + 1 == total;
        let answer = self.answers.get(&question_id).cloned().unwrap_or_default();

        if answer.trim().is_empty() && !is_last {
            return Err(Error::InvalidInput(
                "an answer is required before continuing".to_string(),
            ));
        }

        if answer.trim().is_empty() {
            self.autosave.cancel(&question_id);
        } else {
            self.autosave.save_now(&question_id, &answer).await;
        }

        if is_last {
            return Ok(Step::Analyze { module_id });
        }

        self.question_index += 1;
        self.has_typed = false;
        if let Some(next_id) = self.current_question().map(|q| q.id.clone()) {
            self.set_bookmark(&module_id, &next_id).await;
        }

        Ok(Step::View(self.current_view()))
    }

    async fn prev(&mut self) -> Result<Step> {
        let module_id = match &self.active {
            None => return Err(Error::InvalidInput("no module loaded".to_string())),
            Some(Active::Introduction) => return Ok(Step::View(self.current_view())),
            Some(Active::Module(id)) => id.clone(),
        };

        if self.question_index > 0 {
            self.autosave.cancel_all();
            self.question_index -= 1;
            self.has_typed = false;
            return Ok(Step::View(self.current_view()));
        }

        let order = self.module(&module_id).map(|m| m.order).unwrap_or(0);
        let previous = self
            .modules
            .iter()
            .find(|m| m.order == order - 1)
            .map(|m| m.slug.clone());

        let target = previous.unwrap_or_else(|| INTRODUCTION_SLUG.to_string());
        Ok(Step::View(self.load(&target).await?))
    }

    /// Unlock the module that follows `module_id` in order
    ///
    /// Inserts a progress row (bookmarked at the first question) only if none
    /// exists. Returns the slug of the unlocked module, or `None` when
    /// `module_id` is the last module.
    pub async fn unlock_next(&mut self, module_id: &str) -> Result<Option<String>> {
        let order = match self.module(module_id) {
            Some(m) => m.order,
            None => return Err(Error::NotFound(format!("module {}", module_id))),
        };

        let Some(next) = self.store.module_by_order(order + 1).await? else {
            debug!(module_id, "No module after this one");
            return Ok(None);
        };

        let first_question = self
            .ensure_questions(&next.id)
            .await?
            .first()
            .map(|q| q.id.clone());

        let inserted = self
            .store
            .insert_progress_if_absent(&next.id, first_question.as_deref())
            .await?;

        let entry = self.progress.entry(next.id.clone()).or_default();
        entry.unlocked = true;
        if inserted && entry.current_question.is_none() {
            entry.current_question = first_question;
        }

        if self.module(&next.id).is_none() {
            self.modules.push(next.clone());
            self.modules.sort_by_key(|m| m.order);
        }

        info!(user_id = self.store.user_id(), slug = %next.slug, inserted, "Unlocked module");
        Ok(Some(next.slug))
    }

    /// Record completion in memory (the marker row is written by the caller)
    pub fn mark_completed(&mut self, module_id: &str) {
        self.completed.insert(module_id.to_string());
        if let Some(entry) = self.progress.get_mut(module_id) {
            entry.completed = true;
        }
    }

    pub async fn set_selected_practice(&mut self, practice: Option<String>) -> Result<()> {
        self.store.set_selected_practice(practice.as_deref()).await?;
        self.selected_practice = practice;
        Ok(())
    }

    pub async fn set_selected_niche(&mut self, niche: Option<String>) -> Result<()> {
        self.store.set_selected_niche(niche.as_deref()).await?;
        self.selected_niche = niche;
        Ok(())
    }

    /// Drop cached answers so the next load re-reads them from storage
    pub fn clear_answer_cache(&mut self) {
        self.answers.clear();
    }

    async fn ensure_questions(&mut self, module_id: &str) -> Result<&[Question]> {
        if !self.questions.contains_key(module_id) {
            let fetched = self.store.questions_for_module(module_id).await?;
            self.questions.insert(module_id.to_string(), fetched);
        }
        Ok(self
            .questions
            .get(module_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    async fn set_bookmark(&mut self, module_id: &str, question_id: &str) {
        if let Some(entry) = self.progress.get_mut(module_id) {
            entry.current_question = Some(question_id.to_string());
        }
        if let Err(e) = self.store.update_bookmark(module_id, question_id).await {
            tracing::warn!(module_id, "Failed to update bookmark: {}", e);
            self.warnings().push(format!("Failed to save your place ({})", e));
        }
    }
}
