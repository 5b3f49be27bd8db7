//! HTTP service for scheduling tasks from natural-language input.
//!
//! Routes:
//! - `GET /health`
//! - `GET /login/demo`, `GET /logout`
//! - `GET /api/categories`
//! - `GET|POST /api/tasks`, `POST /api/tasks/parse`
//! - `PUT|DELETE /api/tasks/:id`, `POST /api/tasks/:id/toggle`

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod store;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::ai::AiParser;
use crate::auth::Sessions;
use crate::config::Config;
use crate::store::TaskStore;

/// State shared across handlers.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub sessions: Sessions,
    pub parser: Arc<AiParser>,
    pub config: Arc<Config>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sessions: self.sessions.clone(),
            parser: Arc::clone(&self.parser),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: TaskStore> AppState<S> {
    pub fn new(store: S, parser: AiParser, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            sessions: Sessions::default(),
            parser: Arc::new(parser),
            config: Arc::new(config),
        }
    }
}

pub fn build_router<S: TaskStore>(state: AppState<S>) -> Router {
    let mut router: Router<AppState<S>> = Router::new()
        .route("/health", get(handlers::health_check::<S>))
        .route("/login/demo", get(auth::demo_login::<S>))
        .route("/logout", get(auth::logout::<S>))
        .route("/api/categories", get(handlers::list_categories))
        .route(
            "/api/tasks",
            get(handlers::list_tasks::<S>).post(handlers::create_task::<S>),
        )
        .route("/api/tasks/parse", post(handlers::parse_task::<S>))
        .route(
            "/api/tasks/:id",
            put(handlers::update_task::<S>).delete(handlers::delete_task::<S>),
        )
        .route("/api/tasks/:id/toggle", post(handlers::toggle_task::<S>));

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server<S: TaskStore>(state: AppState<S>) -> Result<(), std::io::Error> {
    let addr = state.config.bind_addr.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);
    axum::serve(listener, app).await
}
