use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use tower_sessions::Session;
use tracing::{error, info, warn};
use user::{AuthenticationOutcome, Credentials, RejectReason, SessionManager};

use crate::{error::ApiResult, middleware_hooks::is_local_target, AppState};

/// Form login
/// POST /users/login
///
/// On success the session id is cycled, the principal bound to the session,
/// and the client sent back to the page it originally asked for.
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(credentials): Form<Credentials>,
) -> ApiResult<Response> {
    let outcome = state
        .realm
        .authenticate(credentials.username.trim(), &credentials.password)
        .await;

    match outcome {
        AuthenticationOutcome::Authenticated(principal) => {
            let target = SessionManager::take_requested_path(&session)
                .await?
                .filter(|saved| is_local_target(saved))
                .unwrap_or_else(|| state.pages.success_url.clone());
            SessionManager::login(&session, &principal).await?;

            info!("Login succeeded for {}, continuing to {}", principal, target);
            Ok(Redirect::to(&target).into_response())
        }
        AuthenticationOutcome::Rejected(RejectReason::StoreUnavailable) => {
            error!("Login unavailable: credential store unreachable");
            Ok(Redirect::to(&state.pages.error_url).into_response())
        }
        AuthenticationOutcome::Rejected(reason) => {
            // both refusals look the same to the client
            warn!("Login rejected: {}", reason);
            Ok(Redirect::to(&format!("{}?error", state.pages.login_url)).into_response())
        }
    }
}
