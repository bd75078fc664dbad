//! Reference data queries (modules and questions)
//!
//! Modules and questions are provisioned out-of-band and are readable from
//! both credential tiers.

use chrono::Utc;
use spz_common::db::{Module, Question};
use spz_common::{uuid_utils, Result};
use sqlx::SqlitePool;

/// All modules ordered by `order`
pub async fn list_modules(pool: &SqlitePool) -> Result<Vec<Module>> {
    let modules = sqlx::query_as::<_, Module>(
        r#"SELECT id, title, slug, "order", created_at FROM modules ORDER BY "order" ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(modules)
}

pub async fn module_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Module>> {
    let module = sqlx::query_as::<_, Module>(
        r#"SELECT id, title, slug, "order", created_at FROM modules WHERE slug = ?"#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(module)
}

pub async fn module_by_order(pool: &SqlitePool, order: i64) -> Result<Option<Module>> {
    let module = sqlx::query_as::<_, Module>(
        r#"SELECT id, title, slug, "order", created_at FROM modules WHERE "order" = ?"#,
    )
    .bind(order)
    .fetch_optional(pool)
    .await?;

    Ok(module)
}

/// Questions of one module ordered by `order`
pub async fn questions_for_module(pool: &SqlitePool, module_id: &str) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, module_id, content, "order", created_at
        FROM questions
        WHERE module_id = ?
        ORDER BY "order" ASC
        "#,
    )
    .bind(module_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

/// Every question, grouped by module order then question order
pub async fn all_questions(pool: &SqlitePool) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT q.id, q.module_id, q.content, q."order", q.created_at
        FROM questions q
        JOIN modules m ON m.id = q.module_id
        ORDER BY m."order" ASC, q."order" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

pub async fn insert_module(pool: &SqlitePool, title: &str, slug: &str, order: i64) -> Result<Module> {
    let module = Module {
        id: uuid_utils::generate_id(),
        title: title.to_string(),
        slug: slug.to_string(),
        order,
        created_at: Utc::now(),
    };

    sqlx::query(r#"INSERT INTO modules (id, title, slug, "order", created_at) VALUES (?, ?, ?, ?, ?)"#)
        .bind(&module.id)
        .bind(&module.title)
        .bind(&module.slug)
        .bind(module.order)
        .bind(module.created_at)
        .execute(pool)
        .await?;

    Ok(module)
}

pub async fn insert_question(
    pool: &SqlitePool,
    module_id: &str,
    content: &str,
    order: i64,
) -> Result<Question> {
    let question = Question {
        id: uuid_utils::generate_id(),
        module_id: module_id.to_string(),
        content: content.to_string(),
        order,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"INSERT INTO questions (id, module_id, content, "order", created_at) VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(&question.id)
    .bind(&question.module_id)
    .bind(&question.content)
    .bind(question.order)
    .bind(question.created_at)
    .execute(pool)
    .await?;

    Ok(question)
}
