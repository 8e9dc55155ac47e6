use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::{default_limit, ensure_branch, ensure_year, nullable, record_audit, required};
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::auth::{AdminUser, AuthUser};
use crate::storage::models::{
    AudienceFilter, AuditAction, AuditEntity, RecentUpdate, RecentUpdatePatch,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentUpdatesParams {
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecentUpdateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecentUpdateRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub branch_id: Option<Option<String>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub year_id: Option<Option<String>>,
}

pub async fn list_recent_updates(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<RecentUpdatesParams>,
) -> Result<Json<JSend<Vec<RecentUpdate>>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let audience = AudienceFilter {
        branch_id: params.branch_id,
        year_id: params.year_id,
    };
    let mut updates = state.db.list_recent_updates(&audience)?;
    updates.truncate(params.limit as usize);
    Ok(JSend::success(updates))
}

pub async fn admin_list_recent_updates(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<JSend<Vec<RecentUpdate>>>, ApiError> {
    Ok(JSend::success(
        state.db.list_recent_updates(&AudienceFilter::default())?,
    ))
}

pub async fn create_recent_update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateRecentUpdateRequest>,
) -> Result<Json<JSend<RecentUpdate>>, ApiError> {
    let title = required(&req.title, "title")?;
    if let Some(ref branch_id) = req.branch_id {
        ensure_branch(&state, branch_id)?;
    }
    if let Some(ref year_id) = req.year_id {
        ensure_year(&state, year_id)?;
    }

    let now = Utc::now();
    let update = RecentUpdate {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        description: req.description,
        date: req.date.unwrap_or_else(|| now.date_naive()),
        branch_id: req.branch_id,
        year_id: req.year_id,
        created_by: admin.email.clone(),
        created_at: now,
        updated_at: now,
    };

    state.db.put_recent_update(&update)?;
    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::RecentUpdate,
        &update.id,
        None,
        Some(&update),
    );

    tracing::debug!(update_id = %update.id, "Created recent update");
    Ok(JSend::success(update))
}

pub async fn update_recent_update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateRecentUpdateRequest>,
) -> Result<Json<JSend<RecentUpdate>>, ApiError> {
    let existing = state
        .db
        .get_recent_update(&id)?
        .ok_or_else(|| ApiError::not_found("Recent update not found"))?;

    let title = req
        .title
        .as_deref()
        .map(|t| required(t, "title"))
        .transpose()?;
    if let Some(Some(ref branch_id)) = req.branch_id {
        ensure_branch(&state, branch_id)?;
    }
    if let Some(Some(ref year_id)) = req.year_id {
        ensure_year(&state, year_id)?;
    }

    let patch = RecentUpdatePatch {
        title,
        description: req.description.into(),
        date: req.date,
        branch_id: req.branch_id.into(),
        year_id: req.year_id.into(),
    };

    let updated = state
        .db
        .update_recent_update(&id, &patch)?
        .ok_or_else(|| ApiError::not_found("Recent update not found"))?;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::RecentUpdate,
        &id,
        Some(&existing),
        Some(&updated),
    );

    Ok(JSend::success(updated))
}

pub async fn delete_recent_update(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_recent_update(&id)?
        .ok_or_else(|| ApiError::not_found("Recent update not found"))?;

    state.db.delete_recent_update(&id)?;
    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::RecentUpdate,
        &id,
        Some(&existing),
        None,
    );

    Ok(JSend::success(()))
}
