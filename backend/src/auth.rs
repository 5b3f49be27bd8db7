//! Cookie sessions and the demo login.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{error::ApiError, store::TaskStore, AppState};

pub const SESSION_COOKIE: &str = "tempo_session";
pub const DEMO_EMAIL: &str = "demo@tempo.app";
pub const DEMO_NAME: &str = "Demo User";

pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

struct Session {
    user_id: Uuid,
    expires_at: Instant,
}

/// Session token -> user id. Entries expire after a fixed lifetime and are
/// pruned whenever a new session is opened.
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl Sessions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::default(),
            ttl,
        }
    }

    pub async fn open(&self, user_id: Uuid) -> Uuid {
        let now = Instant::now();
        let token = Uuid::new_v4();
        let mut sessions = self.inner.write().await;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token,
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub async fn resolve(&self, token: Uuid) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .get(&token)
            .filter(|session| session.expires_at > Instant::now())
            .map(|session| session.user_id)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn close(&self, token: Uuid) -> bool {
        self.inner.write().await.remove(&token).is_some()
    }
}

/// Reads the session token from the `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn session_cookie(token: Uuid, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

fn expired_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The logged-in user's id. Rejects with 401 when there is no live session.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S: TaskStore> FromRequestParts<AppState<S>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        state
            .sessions
            .resolve(token)
            .await
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Logs in as the shared demo user. Only available in dev mode.
///
/// A request that already carries a live session for the demo user keeps its
/// token instead of opening another one.
pub async fn demo_login<S: TaskStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if !state.config.dev_mode {
        return Err(ApiError::NotFound);
    }
    let user = state.store.find_or_create_user(DEMO_EMAIL, DEMO_NAME).await?;

    let current = match session_token(&headers) {
        Some(token) if state.sessions.resolve(token).await == Some(user.id) => Some(token),
        _ => None,
    };
    let token = match current {
        Some(token) => token,
        None => {
            info!("Demo login for user {}", user.id);
            state.sessions.open(user.id).await
        }
    };

    Ok((
        [(header::SET_COOKIE, session_cookie(token, state.sessions.ttl))],
        Json(user),
    ))
}

pub async fn logout<S: TaskStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.close(token).await;
    }
    (
        [(header::SET_COOKIE, expired_cookie())],
        Json(json!({ "message": "Logged out" })),
    )
}
