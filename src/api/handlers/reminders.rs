use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::{ensure_branch, ensure_year, nullable, record_audit, required};
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::auth::{AdminUser, AuthUser};
use crate::storage::models::{
    AudienceFilter, AuditAction, AuditEntity, Reminder, ReminderPatch, ReminderStatus,
};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AudienceParams {
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub icon_type: Option<String>,
    #[serde(default)]
    pub status: Option<ReminderStatus>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReminderRequest {
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub branch_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon_type: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ReminderStatus>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub year_id: Option<Option<String>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Reminders for a branch/year audience, soonest first. Unscoped reminders are always included.
pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<AudienceParams>,
) -> Result<Json<JSend<Vec<Reminder>>>, ApiError> {
    let audience = AudienceFilter {
        branch_id: params.branch_id,
        year_id: params.year_id,
    };
    Ok(JSend::success(state.db.list_reminders(&audience, false)?))
}

pub async fn admin_list_reminders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(params): AppQuery<AudienceParams>,
) -> Result<Json<JSend<Vec<Reminder>>>, ApiError> {
    let audience = AudienceFilter {
        branch_id: params.branch_id,
        year_id: params.year_id,
    };
    Ok(JSend::success(state.db.list_reminders(&audience, true)?))
}

pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateReminderRequest>,
) -> Result<Json<JSend<Reminder>>, ApiError> {
    let title = required(&req.title, "title")?;
    if let Some(ref branch_id) = req.branch_id {
        ensure_branch(&state, branch_id)?;
    }
    if let Some(ref year_id) = req.year_id {
        ensure_year(&state, year_id)?;
    }

    let now = Utc::now();
    let reminder = Reminder {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        description: req.description,
        due_date: req.due_date,
        icon_type: req.icon_type,
        status: req.status.unwrap_or(ReminderStatus::Upcoming),
        branch_id: req.branch_id,
        year_id: req.year_id,
        archived: false,
        created_by: admin.email.clone(),
        created_at: now,
        updated_at: now,
    };

    state.db.put_reminder(&reminder)?;
    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::Reminder,
        &reminder.id,
        None,
        Some(&reminder),
    );

    tracing::debug!(reminder_id = %reminder.id, "Created reminder");
    Ok(JSend::success(reminder))
}

pub async fn update_reminder(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateReminderRequest>,
) -> Result<Json<JSend<Reminder>>, ApiError> {
    let existing = state
        .db
        .get_reminder(&id)?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;

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

    let patch = ReminderPatch {
        title,
        description: req.description.into(),
        due_date: req.due_date,
        icon_type: req.icon_type.into(),
        status: req.status,
        branch_id: req.branch_id.into(),
        year_id: req.year_id.into(),
        archived: req.archived,
    };

    let updated = state
        .db
        .update_reminder(&id, &patch)?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::Reminder,
        &id,
        Some(&existing),
        Some(&updated),
    );

    tracing::debug!(reminder_id = %id, "Updated reminder");
    Ok(JSend::success(updated))
}

pub async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_reminder(&id)?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;

    state.db.delete_reminder(&id)?;
    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::Reminder,
        &id,
        Some(&existing),
        None,
    );

    tracing::debug!(reminder_id = %id, "Deleted reminder");
    Ok(JSend::success(()))
}
