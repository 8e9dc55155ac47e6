use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{record_audit, required};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::SuperadminUser;
use crate::storage::models::{Admin, AuditAction, AuditEntity, Role};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Admin
}

pub async fn list_admins(
    State(state): State<Arc<AppState>>,
    _superadmin: SuperadminUser,
) -> Result<Json<JSend<Vec<Admin>>>, ApiError> {
    Ok(JSend::success(state.db.list_admins()?))
}

/// Grant or change an admin role. Re-posting an existing email updates its role.
pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    SuperadminUser(actor): SuperadminUser,
    AppJson(req): AppJson<CreateAdminRequest>,
) -> Result<Json<JSend<Admin>>, ApiError> {
    let email = required(&req.email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email must be a valid address"));
    }
    if req.role == Role::Student {
        return Err(ApiError::bad_request("role must be admin or superadmin"));
    }

    let existing = state.db.get_admin(&email)?;
    let admin = Admin {
        email,
        role: req.role,
        created_at: existing.as_ref().map(|a| a.created_at).unwrap_or_else(Utc::now),
    };
    state.db.put_admin(&admin)?;

    let action = if existing.is_some() {
        AuditAction::Update
    } else {
        AuditAction::Create
    };
    record_audit(
        &state,
        &actor,
        action,
        AuditEntity::Admin,
        &admin.email,
        existing.as_ref(),
        Some(&admin),
    );

    tracing::info!(email = %admin.email, role = ?admin.role, "Granted admin role");
    Ok(JSend::success(admin))
}

pub async fn delete_admin(
    State(state): State<Arc<AppState>>,
    SuperadminUser(actor): SuperadminUser,
    Path(email): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let email = email.trim().to_lowercase();
    if email == actor.email {
        return Err(ApiError::bad_request("cannot remove your own admin access"));
    }

    let existing = state
        .db
        .get_admin(&email)?
        .ok_or_else(|| ApiError::not_found("Admin not found"))?;

    state.db.delete_admin(&email)?;
    record_audit(
        &state,
        &actor,
        AuditAction::Delete,
        AuditEntity::Admin,
        &email,
        Some(&existing),
        None,
    );

    tracing::info!(email = %email, "Revoked admin role");
    Ok(JSend::success(()))
}
