//! Session and identity store
//!
//! A signed-in client holds a bearer token. The [`SessionRegistry`] maps
//! each token to a [`PlannerSession`]: the identity with its derived flags
//! plus that user's progress engine. A token missing from the registry but
//! present in the `sessions` table is resumed by rebuilding the session
//! from storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use spz_common::api::auth::{generate_salt, hash_password, verify_password, MIN_PASSWORD_LEN};
use spz_common::db::UserRecord;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::ProgressEngine;
use crate::error::{ApiError, ApiResult};
use crate::store::{AuthStore, NewUser, UserStore};
use crate::AppState;

/// Current identity with flags recomputed from its claims
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
    pub is_approved: bool,
}

impl Identity {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            user_id: record.id.clone(),
            email: record.email.clone(),
            is_admin: record.claims_admin,
            is_approved: record.claims_approved,
        }
    }
}

pub struct PlannerSession {
    identity: Identity,
    pub engine: ProgressEngine,
}

impl PlannerSession {
    pub fn new(identity: Identity, engine: ProgressEngine) -> Self {
        Self { identity, engine }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Replace the identity; both flags are recomputed from the record
    pub fn refresh_identity(&mut self, record: &UserRecord) {
        self.identity = Identity::from_record(record);
    }

    /// Return to anonymous: progress state is cleared, pending saves cancelled
    pub fn sign_out(&mut self) {
        self.engine.reset();
    }
}

pub type SessionHandle = Arc<Mutex<PlannerSession>>;

struct RegistryEntry {
    user_id: String,
    handle: SessionHandle,
    last_seen: Instant,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, RegistryEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live session and mark it as used
    pub async fn get(&self, token: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(token)?;
        entry.last_seen = Instant::now();
        Some(entry.handle.clone())
    }

    pub async fn insert(&self, token: String, user_id: String, handle: SessionHandle) {
        self.sessions.write().await.insert(
            token,
            RegistryEntry {
                user_id,
                handle,
                last_seen: Instant::now(),
            },
        );
    }

    pub async fn remove(&self, token: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(token).map(|e| e.handle)
    }

    /// Drop every session of `user_id`; returns how many were removed
    pub async fn remove_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.user_id != user_id);
        before - sessions.len()
    }

    /// Drop sessions unused for at least `max_idle`; returns how many
    ///
    /// Sessions held by an in-flight request are kept. An evicted token
    /// still resumes from storage on its next use.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.last_seen.elapsed() < max_idle || Arc::strong_count(&e.handle) > 1);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Bearer token plus its identity, returned by sign-in flows
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub identity: Identity,
}

fn auth_store(state: &AppState) -> AuthStore {
    AuthStore::new(state.db.clone())
}

fn validate_credentials(email: &str, password: &str) -> ApiResult<()> {
    if !email.contains('@') || email.trim() != email || email.len() < 3 {
        return Err(ApiError::BadRequest("a valid email address is required".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Build and register a fresh session for `record`
async fn open_session(state: &AppState, token: String, record: &UserRecord) -> ApiResult<SessionHandle> {
    let store = UserStore::new(state.db.clone(), record.id.clone());
    let mut engine = ProgressEngine::new(store, state.config.autosave_debounce);
    engine.hydrate().await?;

    let handle = Arc::new(Mutex::new(PlannerSession::new(Identity::from_record(record), engine)));
    state
        .sessions
        .insert(token, record.id.clone(), handle.clone())
        .await;
    Ok(handle)
}

async fn issue_session(state: &AppState, record: &UserRecord) -> ApiResult<SignedIn> {
    let auth = auth_store(state);
    auth.record_sign_in(&record.id).await?;
    let token = auth.create_session(&record.id).await?;
    open_session(state, token.clone(), record).await?;

    Ok(SignedIn {
        token,
        identity: Identity::from_record(record),
    })
}

/// Register a new identity and sign it in
///
/// The admin flag is honored only when admin sign-up is enabled; admins are
/// approved on creation, everyone else waits for an admin.
pub async fn sign_up(state: &AppState, email: &str, password: &str, admin: bool) -> ApiResult<SignedIn> {
    let email = email.trim().to_lowercase();
    validate_credentials(&email, password)?;

    let claims_admin = admin && state.config.allow_admin_signup;
    if admin && !claims_admin {
        warn!(email = %email, "Admin sign-up requested but disabled; creating regular account");
    }

    let salt = generate_salt();
    let hash = hash_password(password, &salt);
    let record = auth_store(state)
        .create_user(NewUser {
            email: &email,
            password_hash: &hash,
            password_salt: &salt,
            claims_admin,
            claims_approved: claims_admin,
        })
        .await?;

    info!(user_id = %record.id, admin = claims_admin, "Signed up");
    issue_session(state, &record).await
}

pub async fn sign_in(state: &AppState, email: &str, password: &str) -> ApiResult<SignedIn> {
    let email = email.trim().to_lowercase();
    let record = auth_store(state)
        .find_by_email(&email)
        .await?
        .filter(|r| verify_password(password, &r.password_salt, &r.password_hash))
        .ok_or_else(|| ApiError::Auth("invalid email or password".to_string()))?;

    info!(user_id = %record.id, "Signed in");
    issue_session(state, &record).await
}

/// End the session behind `token`
///
/// The engine is reset before the handle is dropped so any pending autosave
/// is cancelled.
pub async fn sign_out(state: &AppState, token: &str) -> ApiResult<()> {
    if let Some(handle) = state.sessions.remove(token).await {
        handle.lock().await.sign_out();
    }
    auth_store(state).delete_session(token).await?;
    Ok(())
}

/// Look up a session, resuming it from storage if this process has not seen
/// the token yet
pub async fn resume(state: &AppState, token: &str) -> ApiResult<Option<SessionHandle>> {
    if let Some(handle) = state.sessions.get(token).await {
        return Ok(Some(handle));
    }

    let auth = auth_store(state);
    let Some(user_id) = auth.session_user(token, state.config.session_ttl).await? else {
        return Ok(None);
    };
    let Some(record) = auth.find_by_id(&user_id).await? else {
        auth.delete_session(token).await?;
        return Ok(None);
    };

    info!(user_id = %record.id, "Resumed session from storage");
    Ok(Some(open_session(state, token.to_string(), &record).await?))
}

/// Outcome of one [`sweep_sessions`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub expired_sessions: usize,
    pub expired_recovery_tokens: u64,
}

/// Drop idle in-memory sessions and purge expired tokens
pub async fn sweep_sessions(state: &AppState) -> ApiResult<SweepReport> {
    let auth = auth_store(state);
    let expired = auth
        .purge_sessions_before(chrono::Utc::now() - state.config.session_ttl)
        .await?;
    for token in &expired {
        if let Some(handle) = state.sessions.remove(token).await {
            handle.lock().await.sign_out();
        }
    }

    let report = SweepReport {
        evicted: state.sessions.evict_idle(state.config.session_idle).await,
        expired_sessions: expired.len(),
        expired_recovery_tokens: auth.purge_expired_recovery_tokens().await?,
    };
    if report != SweepReport::default() {
        info!(
            evicted = report.evicted,
            expired_sessions = report.expired_sessions,
            expired_recovery_tokens = report.expired_recovery_tokens,
            "Swept sessions"
        );
    }
    Ok(report)
}

/// Run [`sweep_sessions`] every `every` until the task is aborted
pub fn spawn_session_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_sessions(&state).await {
                warn!("Session sweep failed: {}", e);
            } else {
                debug!("Session sweep complete");
            }
        }
    })
}

/// Re-read the identity from storage and recompute the flags
pub async fn refresh(state: &AppState, session: &mut PlannerSession) -> ApiResult<Identity> {
    let record = auth_store(state)
        .find_by_id(&session.identity.user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("account no longer exists".to_string()))?;
    session.refresh_identity(&record);
    Ok(session.identity.clone())
}

/// Issue a password-recovery token for `email`
///
/// Returns `None` for unknown addresses; callers must not reveal which case
/// occurred.
pub async fn request_recovery(state: &AppState, email: &str) -> ApiResult<Option<String>> {
    let auth = auth_store(state);
    let Some(record) = auth.find_by_email(&email.trim().to_lowercase()).await? else {
        return Ok(None);
    };

    let token = auth
        .create_recovery_token(&record.id, state.config.recovery_token_ttl)
        .await?;
    // No mail transport: the operator relays the link
    info!(user_id = %record.id, recovery_token = %token, "Issued password recovery token");
    Ok(Some(token))
}

/// Exchange a recovery token for an active session
pub async fn exchange_recovery(state: &AppState, token: &str) -> ApiResult<SignedIn> {
    let auth = auth_store(state);
    let user_id = auth
        .consume_recovery_token(token)
        .await?
        .ok_or_else(|| ApiError::Auth("recovery link is invalid or has expired".to_string()))?;
    let record = auth
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("account no longer exists".to_string()))?;

    issue_session(state, &record).await
}

pub async fn update_password(state: &AppState, user_id: &str, password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let salt = generate_salt();
    let hash = hash_password(password, &salt);
    auth_store(state).update_password(user_id, &hash, &salt).await?;
    info!(user_id, "Password updated");
    Ok(())
}
