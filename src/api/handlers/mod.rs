mod admin;
mod admins;
mod audit_logs;
mod lookups;
mod profile;
mod recent_updates;
mod reminders;
mod resources;

use serde::{Deserialize, Deserializer, Serialize};

use crate::api::response::ApiError;
use crate::auth::AuthUser;
use crate::lookup_cache::{LookupKind, LookupLabel};
use crate::storage::models::{AuditAction, AuditEntity, AuditEntry};
use crate::AppState;

pub use admin::{admin_purge, health};
pub use admins::{create_admin, delete_admin, list_admins};
pub use audit_logs::list_audit_logs;
pub use lookups::{
    create_branch, create_semester, create_year, delete_branch, delete_semester, delete_year,
    get_lookups, update_branch, update_semester, update_year,
};
pub use profile::{get_profile, upsert_profile};
pub use recent_updates::{
    admin_list_recent_updates, create_recent_update, delete_recent_update, list_recent_updates,
    update_recent_update,
};
pub use reminders::{
    admin_list_reminders, create_reminder, delete_reminder, list_reminders, update_reminder,
};
pub use resources::{
    admin_get_resource, admin_list_resources, create_resource, delete_resource,
    download_resource, get_resource, list_resources, list_subjects, update_resource,
};

fn default_limit() -> u32 {
    20
}

/// Distinguishes between a missing field (`None`) and an explicit `null` (`Some(None)`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Append an audit row for an admin mutation.
///
/// The mutation has already committed, so a failed audit write is logged rather than
/// surfaced to the caller.
fn record_audit<T: Serialize>(
    state: &AppState,
    actor: &AuthUser,
    action: AuditAction,
    entity: AuditEntity,
    entity_id: &str,
    before: Option<&T>,
    after: Option<&T>,
) {
    let snapshot = |v: Option<&T>| v.and_then(|v| serde_json::to_value(v).ok());
    let entry = AuditEntry {
        id: uuid::Uuid::new_v4().to_string(),
        actor_email: actor.email.clone(),
        actor_role: actor.role,
        action,
        entity,
        entity_id: entity_id.to_string(),
        before: snapshot(before),
        after: snapshot(after),
        created_at: chrono::Utc::now(),
    };

    if let Err(e) = state.db.append_audit(&entry) {
        tracing::error!(
            error = %e,
            entity = ?entity,
            entity_id = %entity_id,
            actor = %actor.email,
            "Failed to write audit entry"
        );
    }
}

/// Require a non-blank string field, returning it trimmed.
fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Check that a branch/year/semester triple exists and that the semester belongs to the year.
fn ensure_scope(
    state: &AppState,
    branch_id: &str,
    year_id: &str,
    semester_id: &str,
) -> Result<(), ApiError> {
    ensure_branch(state, branch_id)?;
    ensure_year(state, year_id)?;
    let semester = state
        .db
        .get_semester(semester_id)?
        .ok_or_else(|| ApiError::bad_request(format!("unknown semester_id '{semester_id}'")))?;
    if semester.year_id != year_id {
        return Err(ApiError::bad_request(format!(
            "semester '{semester_id}' does not belong to year '{year_id}'"
        )));
    }
    Ok(())
}

fn ensure_branch(state: &AppState, branch_id: &str) -> Result<(), ApiError> {
    state
        .db
        .get_branch(branch_id)?
        .ok_or_else(|| ApiError::bad_request(format!("unknown branch_id '{branch_id}'")))?;
    Ok(())
}

fn ensure_year(state: &AppState, year_id: &str) -> Result<(), ApiError> {
    state
        .db
        .get_year(year_id)?
        .ok_or_else(|| ApiError::bad_request(format!("unknown year_id '{year_id}'")))?;
    Ok(())
}

/// Lookup labels joined into resource and profile responses.
#[derive(Debug, Serialize)]
pub struct ScopeLabels {
    pub branch: Option<LookupLabel>,
    pub year: Option<LookupLabel>,
    pub semester: Option<LookupLabel>,
}

async fn scope_labels(
    state: &AppState,
    branch_id: &str,
    year_id: &str,
    semester_id: &str,
) -> Result<ScopeLabels, ApiError> {
    Ok(ScopeLabels {
        branch: state.lookups.label(LookupKind::Branch, branch_id).await?,
        year: state.lookups.label(LookupKind::Year, year_id).await?,
        semester: state
            .lookups
            .label(LookupKind::Semester, semester_id)
            .await?,
    })
}
