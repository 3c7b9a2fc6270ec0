//! Role and permission administration.
//!
//! Reached only through the access-control chain (`/admin/**` requires the
//! `admin` role in the default configuration).

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{error::ApiResult, models::GrantResponse, AppState};

/// POST /admin/users/:user/roles/:role
pub async fn grant_role(
    State(state): State<AppState>,
    Path((username, role)): Path<(String, String)>,
) -> ApiResult<Json<GrantResponse>> {
    let changed = state.users.admin().grant_role(&username, &role).await?;
    info!("Admin granted role {} to {}", role, username);

    Ok(Json(GrantResponse {
        success: true,
        changed,
        role,
        invalidated: vec![username.clone()],
        principal: Some(username),
        permission: None,
    }))
}

/// DELETE /admin/users/:user/roles/:role
pub async fn revoke_role(
    State(state): State<AppState>,
    Path((username, role)): Path<(String, String)>,
) -> ApiResult<Json<GrantResponse>> {
    let changed = state.users.admin().revoke_role(&username, &role).await?;
    info!("Admin revoked role {} from {}", role, username);

    Ok(Json(GrantResponse {
        success: true,
        changed,
        role,
        invalidated: vec![username.clone()],
        principal: Some(username),
        permission: None,
    }))
}

/// POST /admin/roles/:role/permissions/:permission
pub async fn grant_permission(
    State(state): State<AppState>,
    Path((role, permission)): Path<(String, String)>,
) -> ApiResult<Json<GrantResponse>> {
    let invalidated = state
        .users
        .admin()
        .grant_permission(&role, &permission)
        .await?;
    info!("Admin granted permission {} to role {}", permission, role);

    Ok(Json(GrantResponse {
        success: true,
        changed: true,
        role,
        principal: None,
        permission: Some(permission),
        invalidated,
    }))
}
