use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ensure_scope, record_audit, required, scope_labels, ScopeLabels};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::AuthUser;
use crate::storage::models::{AuditAction, AuditEntity, Profile};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub labels: ScopeLabels,
}

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub name: String,
    pub roll_number: String,
    pub branch_id: String,
    pub year_id: String,
    pub semester_id: String,
    #[serde(default)]
    pub section: Option<String>,
}

async fn profile_to_response(
    state: &AppState,
    profile: Profile,
) -> Result<ProfileResponse, ApiError> {
    let labels = scope_labels(
        state,
        &profile.branch_id,
        &profile.year_id,
        &profile.semester_id,
    )
    .await?;
    Ok(ProfileResponse { profile, labels })
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<JSend<ProfileResponse>>, ApiError> {
    let profile = state
        .db
        .get_profile(&user.email)?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(JSend::success(profile_to_response(&state, profile).await?))
}

/// Create or replace the caller's profile. The email always comes from the token.
pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<UpsertProfileRequest>,
) -> Result<Json<JSend<ProfileResponse>>, ApiError> {
    let name = required(&req.name, "name")?;
    let roll_number = required(&req.roll_number, "roll_number")?.to_uppercase();
    ensure_scope(&state, &req.branch_id, &req.year_id, &req.semester_id)?;

    let section = req
        .section
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());

    let existing = state.db.get_profile(&user.email)?;
    let now = Utc::now();
    let profile = Profile {
        email: user.email.clone(),
        name,
        roll_number,
        branch_id: req.branch_id,
        year_id: req.year_id,
        semester_id: req.semester_id,
        section,
        created_at: existing.as_ref().map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    };

    state.db.put_profile(&profile)?;

    let action = if existing.is_some() {
        AuditAction::Update
    } else {
        AuditAction::Create
    };
    record_audit(
        &state,
        &user,
        action,
        AuditEntity::Profile,
        &profile.email,
        existing.as_ref(),
        Some(&profile),
    );

    tracing::debug!(email = %profile.email, "Saved profile");
    Ok(JSend::success(profile_to_response(&state, profile).await?))
}
