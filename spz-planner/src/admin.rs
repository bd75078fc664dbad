//! Admin dashboard data: user listing, approval, inspection, growth
//! series and account deletion

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use spz_common::db::{Module, Question, UserResponse, FINAL_REPORT_SLUG};
use spz_common::{time, EventBus, PlannerEvent};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::identity::SessionRegistry;
use crate::store::{reference, AdminStore, DeletionReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub is_admin: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleQuestions {
    pub module: Module,
    pub questions: Vec<Question>,
}

/// Everything an admin sees when opening one user
#[derive(Debug, Clone, Serialize)]
pub struct UserInspection {
    pub user: UserSummary,
    pub modules: Vec<ModuleQuestions>,
    pub responses: Vec<UserResponse>,
    pub final_report: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub user_count: i64,
}

pub async fn list_users(store: &AdminStore) -> ApiResult<Vec<UserSummary>> {
    let users = store.list_users().await?;
    Ok(users
        .into_iter()
        .map(|u| UserSummary {
            id: u.id,
            email: u.email,
            is_admin: u.claims_admin,
            is_approved: u.claims_approved,
            created_at: u.created_at,
            last_sign_in_at: u.last_sign_in_at,
        })
        .collect())
}

/// Approve a user; the approval stream of that user picks it up
pub async fn approve(store: &AdminStore, events: &EventBus, user_id: &str) -> ApiResult<()> {
    if !store.set_approved(user_id, true).await? {
        return Err(ApiError::NotFound(format!("user {}", user_id)));
    }
    events.emit_lossy(PlannerEvent::ApprovalChanged {
        user_id: user_id.to_string(),
    });
    info!(user_id, "Approved user");
    Ok(())
}

pub async fn inspect(store: &AdminStore, user_id: &str) -> ApiResult<UserInspection> {
    let record = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", user_id)))?;

    let modules = reference::list_modules(store.pool()).await?;
    let mut by_module: BTreeMap<String, Vec<Question>> = BTreeMap::new();
    for question in reference::all_questions(store.pool()).await? {
        by_module.entry(question.module_id.clone()).or_default().push(question);
    }
    let modules = modules
        .into_iter()
        .map(|module| {
            let questions = by_module.remove(&module.id).unwrap_or_default();
            ModuleQuestions { module, questions }
        })
        .collect();

    let responses = store.responses_for(user_id).await?;
    let final_report = store.settings_for(user_id).await?.and_then(|s| {
        s.final_report
            .map(|r| r.0)
            .or_else(|| s.analyses.0.get(FINAL_REPORT_SLUG).cloned())
    });

    Ok(UserInspection {
        user: UserSummary {
            id: record.id,
            email: record.email,
            is_admin: record.claims_admin,
            is_approved: record.claims_approved,
            created_at: record.created_at,
            last_sign_in_at: record.last_sign_in_at,
        },
        modules,
        responses,
        final_report,
    })
}

/// Cumulative sign-ups per calendar day (UTC)
///
/// Days without sign-ups are omitted. A single day is padded with the next
/// day at the same count so a chart always has a line to draw.
pub fn growth_series<I>(created: I) -> Vec<GrowthPoint>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for ts in created {
        *per_day.entry(time::day_of(ts)).or_default() += 1;
    }

    let mut total = 0;
    let mut series: Vec<GrowthPoint> = per_day
        .into_iter()
        .map(|(date, count)| {
            total += count;
            GrowthPoint {
                date,
                user_count: total,
            }
        })
        .collect();

    if let [only] = series.as_slice() {
        let next_day = only.date.checked_add_days(Days::new(1)).unwrap_or(only.date);
        series.push(GrowthPoint {
            date: next_day,
            user_count: only.user_count,
        });
    }

    series
}

/// Growth series over non-admin users
pub async fn growth(store: &AdminStore) -> ApiResult<Vec<GrowthPoint>> {
    let users = store.list_users().await?;
    Ok(growth_series(
        users
            .into_iter()
            .filter(|u| !u.claims_admin)
            .map(|u| u.created_at),
    ))
}

/// Delete an account and everything it owns; live sessions are dropped
///
/// Deleting an id that no longer exists succeeds and removes nothing.
pub async fn delete_user(
    store: &AdminStore,
    sessions: &SessionRegistry,
    caller_id: &str,
    user_id: &str,
) -> ApiResult<DeletionReport> {
    if caller_id == user_id {
        return Err(ApiError::BadRequest("cannot delete your own account".to_string()));
    }

    let report = store.delete_user(user_id).await?;
    let dropped = sessions.remove_user(user_id).await;
    if dropped > 0 {
        info!(user_id, dropped, "Dropped live sessions of deleted user");
    }
    Ok(report)
}
