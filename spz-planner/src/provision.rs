//! Out-of-band curriculum provisioning
//!
//! Loads a TOML file of modules and their questions:
//!
//! ```toml
//! [[modules]]
//! slug = "introduction-video"
//! title = "Introduction"
//! order = 0
//! questions = []
//!
//! [[modules]]
//! slug = "capabilities-inventory"
//! title = "Capabilities Inventory"
//! order = 1
//! questions = ["What services have you delivered?", "Which did clients value most?"]
//! ```
//!
//! Modules whose slug already exists are skipped, questions included, so
//! running the same file twice changes nothing.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use spz_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::store::reference;

#[derive(Debug, Clone, Deserialize)]
pub struct Curriculum {
    #[serde(default)]
    pub modules: Vec<CurriculumModule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurriculumModule {
    pub slug: String,
    pub title: String,
    pub order: i64,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionReport {
    pub modules_created: usize,
    pub modules_skipped: usize,
    pub questions_created: usize,
}

impl Curriculum {
    pub fn parse(text: &str) -> Result<Self> {
        let curriculum: Curriculum =
            toml::from_str(text).map_err(|e| Error::Config(format!("Parse curriculum failed: {}", e)))?;
        curriculum.validate()?;
        Ok(curriculum)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Orders must be 0..n with no gaps; slugs must be unique and non-empty
    pub fn validate(&self) -> Result<()> {
        let mut orders: Vec<i64> = self.modules.iter().map(|m| m.order).collect();
        orders.sort_unstable();
        for (expected, actual) in orders.iter().enumerate() {
            if *actual != expected as i64 {
                return Err(Error::InvalidInput(format!(
                    "module orders must be dense and start at 0 (expected {}, found {})",
                    expected, actual
                )));
            }
        }

        let mut slugs = HashSet::new();
        for module in &self.modules {
            if module.slug.trim().is_empty() {
                return Err(Error::InvalidInput("module slug is empty".to_string()));
            }
            if !slugs.insert(module.slug.as_str()) {
                return Err(Error::InvalidInput(format!("duplicate module slug {}", module.slug)));
            }
        }
        Ok(())
    }
}

pub async fn provision(pool: &SqlitePool, curriculum: &Curriculum) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    let mut modules = curriculum.modules.clone();
    modules.sort_by_key(|m| m.order);

    for entry in &modules {
        if reference::module_by_slug(pool, &entry.slug).await?.is_some() {
            report.modules_skipped += 1;
            continue;
        }

        let module = reference::insert_module(pool, &entry.title, &entry.slug, entry.order).await?;
        for (index, content) in entry.questions.iter().enumerate() {
            reference::insert_question(pool, &module.id, content, index as i64).await?;
            report.questions_created += 1;
        }
        report.modules_created += 1;
    }

    info!(
        created = report.modules_created,
        skipped = report.modules_skipped,
        questions = report.questions_created,
        "Provisioned curriculum"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_curriculum() {
        let curriculum = Curriculum::parse(
            r#"
            [[modules]]
            slug = "intro"
            title = "Intro"
            order = 0

            [[modules]]
            slug = "capabilities-inventory"
            title = "Capabilities"
            order = 1
            questions = ["Q1", "Q2"]
            "#,
        )
        .unwrap();
        assert_eq!(curriculum.modules.len(), 2);
        assert!(curriculum.modules[0].questions.is_empty());
        assert_eq!(curriculum.modules[1].questions, vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_gap_in_orders_is_rejected() {
        let err = Curriculum::parse(
            r#"
            [[modules]]
            slug = "a"
            title = "A"
            order = 0

            [[modules]]
            slug = "b"
            title = "B"
            order = 2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dense"));
    }

    #[test]
    fn test_duplicate_slug_is_rejected() {
        let err = Curriculum::parse(
            r#"
            [[modules]]
            slug = "a"
            title = "A"
            order = 0

            [[modules]]
            slug = "a"
            title = "Again"
            order = 1
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
