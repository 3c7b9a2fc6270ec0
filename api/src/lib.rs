use authz::FilterChain;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use user::{Realm, UserManager};

pub mod error;
pub mod handlers;
pub mod middleware_hooks;
pub mod models;
pub mod server;

#[cfg(test)]
mod middleware_hooks_tests;

// Re-export server functions for convenience
pub use server::{start_server, ApiConfig, PageConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<FilterChain>,
    pub realm: Arc<Realm>,
    pub users: Arc<UserManager>,
    pub pages: Arc<PageConfig>,
}

impl AppState {
    pub fn new(chain: FilterChain, users: Arc<UserManager>, pages: PageConfig) -> Self {
        Self {
            chain: Arc::new(chain),
            realm: users.realm(),
            users,
            pages: Arc::new(pages),
        }
    }
}

/// Create the gate router: endpoints, the protected site, and the access
/// control wrapped around all of it
pub fn create_router<S>(
    state: AppState,
    sessions: SessionManagerLayer<S>,
    static_dir: Option<PathBuf>,
) -> Router
where
    S: SessionStore + Clone,
{
    let mut router = Router::new()
        .route("/users/login", post(handlers::auth::login))
        .route(
            "/admin/users/:user/roles/:role",
            post(handlers::admin::grant_role).delete(handlers::admin::revoke_role),
        )
        .route(
            "/admin/roles/:role/permissions/:permission",
            post(handlers::admin::grant_permission),
        )
        .route("/health", get(handlers::health::health_check));

    router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(handlers::not_found),
    };

    router
        // access control sees every request, including the static fallback
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::access_control_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(sessions),
        )
        .with_state(state)
}
