use authz::types::{AccessDecision, Principal};
use axum::{
    body::Body,
    extract::State,
    http::{Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, error, info, warn};
use user::SessionManager;

use crate::AppState;

/// Access-control middleware driven by the filter chain
///
/// Every request is matched against the chain and the first matching rule
/// decides what happens:
///
/// 1. `anon` passes straight through
/// 2. `logout` flushes the session and redirects to the login page
/// 3. `authc` needs a principal in the session, otherwise the requested path
///    is saved and the client is sent to the login page
/// 4. `roles[..]` / `perms[..]` additionally ask the realm; a missing grant
///    redirects to the unauthorized page
///
/// # Security Notes
///
/// - Deny-by-default: a realm or session failure redirects to the error page
///   and never reaches the handler
/// - Redirects are `303 See Other` so a POST is never replayed
/// - The principal is taken from the server-side session only
pub async fn access_control_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let decision = state.chain.evaluate(&path);
    let session = request.extensions().get::<Session>().cloned();

    debug!("ACCESS CONTROL: {} {} -> {}", method, path, decision);

    if decision == AccessDecision::Allow {
        return next.run(request).await;
    }

    let Some(session) = session else {
        error!("ACCESS CONTROL: no session layer in front of {}", path);
        return redirect(&state.pages.error_url);
    };

    if decision == AccessDecision::TriggerLogout {
        if let Ok(Some(principal)) = SessionManager::principal(&session).await {
            info!("ACCESS CONTROL: logout for {}", principal);
        }
        if let Err(e) = SessionManager::destroy_session(&session).await {
            error!("ACCESS CONTROL: failed to destroy session: {}", e);
            return redirect(&state.pages.error_url);
        }
        return redirect(&state.pages.login_url);
    }

    let principal = match SessionManager::principal(&session).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            let requested = local_target(request.uri());
            if let Err(e) = SessionManager::save_requested_path(&session, &requested).await {
                error!("ACCESS CONTROL: failed to save requested path: {}", e);
                return redirect(&state.pages.error_url);
            }
            debug!("ACCESS CONTROL: unauthenticated request to {}", path);
            return redirect(&state.pages.login_url);
        }
        Err(e) => {
            error!("ACCESS CONTROL: unreadable session: {}", e);
            return redirect(&state.pages.error_url);
        }
    };

    let granted = match &decision {
        AccessDecision::RequireRole(role) => {
            state.realm.has_role(&principal.username, role).await
        }
        AccessDecision::RequirePermission(permission) => {
            state
                .realm
                .is_permitted(&principal.username, permission)
                .await
        }
        _ => Ok(true),
    };

    match granted {
        Ok(true) => {
            request.extensions_mut().insert::<Principal>(principal);
            next.run(request).await
        }
        Ok(false) => {
            warn!(
                "ACCESS CONTROL: {} denied for {} ({})",
                path, principal, decision
            );
            redirect(&state.pages.unauthorized_url)
        }
        Err(e) => {
            error!(
                "ACCESS CONTROL: could not authorize {} for {}: {}",
                principal, path, e
            );
            redirect(&state.pages.error_url)
        }
    }
}

/// The request target as a same-origin path, safe to redirect back to
///
/// Leading runs of `/` and `\` collapse to one `/`, so `//host/x` can never
/// become a scheme-relative redirect to another host.
pub(crate) fn local_target(uri: &Uri) -> String {
    let path = uri
        .path()
        .trim_start_matches(|c| c == '/' || c == '\\');
    match uri.query() {
        Some(query) => format!("/{}?{}", path, query),
        None => format!("/{}", path),
    }
}

/// True when `target` stays on this origin
pub(crate) fn is_local_target(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\")
}

fn redirect(to: &str) -> Response {
    Redirect::to(to).into_response()
}
