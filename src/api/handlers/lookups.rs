use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ensure_year, record_audit, required};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::{AuthUser, SuperadminUser};
use crate::storage::models::{AuditAction, AuditEntity, Branch, Semester, Year};
use crate::validation::{check_batch_year, check_semester_number, normalize_branch_code};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LookupsResponse {
    pub branches: Vec<Branch>,
    pub semesters: Vec<Semester>,
    pub years: Vec<Year>,
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YearRequest {
    pub batch_year: i32,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateYearRequest {
    #[serde(default)]
    pub batch_year: Option<i32>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SemesterRequest {
    pub year_id: String,
    pub semester_number: u8,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSemesterRequest {
    #[serde(default)]
    pub year_id: Option<String>,
    #[serde(default)]
    pub semester_number: Option<u8>,
}

// ============================================================================
// Read
// ============================================================================

/// All lookup tables, served from the memoization cache.
pub async fn get_lookups(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<JSend<LookupsResponse>>, ApiError> {
    let branches = state.lookups.branches().await?;
    let years = state.lookups.years().await?;
    let semesters = state.lookups.semesters().await?;

    Ok(JSend::success(LookupsResponse {
        branches: branches.as_ref().clone(),
        semesters: semesters.as_ref().clone(),
        years: years.as_ref().clone(),
    }))
}

// ============================================================================
// Branches
// ============================================================================

pub async fn create_branch(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    AppJson(req): AppJson<BranchRequest>,
) -> Result<Json<JSend<Branch>>, ApiError> {
    let code = normalize_branch_code(&req.code)?;
    let name = required(&req.name, "name")?;

    if state.db.branch_code_exists(&code)? {
        return Err(ApiError::conflict(format!(
            "branch code '{code}' is already in use"
        )));
    }

    let branch = Branch {
        id: uuid::Uuid::new_v4().to_string(),
        code,
        name,
        created_at: Utc::now(),
    };
    state.db.put_branch(&branch)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::Branch,
        &branch.id,
        None,
        Some(&branch),
    );
    Ok(JSend::success(branch))
}

pub async fn update_branch(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateBranchRequest>,
) -> Result<Json<JSend<Branch>>, ApiError> {
    if req.code.is_none() && req.name.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (code, name) must be provided",
        ));
    }

    let existing = state
        .db
        .get_branch(&id)?
        .ok_or_else(|| ApiError::not_found("Branch not found"))?;

    let mut branch = existing.clone();
    if let Some(ref raw) = req.code {
        let code = normalize_branch_code(raw)?;
        if code != existing.code && state.db.branch_code_exists(&code)? {
            return Err(ApiError::conflict(format!(
                "branch code '{code}' is already in use"
            )));
        }
        branch.code = code;
    }
    if let Some(ref name) = req.name {
        branch.name = required(name, "name")?;
    }

    state.db.put_branch(&branch)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::Branch,
        &id,
        Some(&existing),
        Some(&branch),
    );
    Ok(JSend::success(branch))
}

pub async fn delete_branch(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_branch(&id)?
        .ok_or_else(|| ApiError::not_found("Branch not found"))?;

    state.db.delete_branch(&id)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::Branch,
        &id,
        Some(&existing),
        None,
    );
    Ok(JSend::success(()))
}

// ============================================================================
// Years
// ============================================================================

pub async fn create_year(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    AppJson(req): AppJson<YearRequest>,
) -> Result<Json<JSend<Year>>, ApiError> {
    check_batch_year(req.batch_year)?;
    if state.db.year_exists(req.batch_year, None)? {
        return Err(ApiError::conflict(format!(
            "batch year {} already exists",
            req.batch_year
        )));
    }

    let display_name = match req.display_name {
        Some(ref name) => required(name, "display_name")?,
        None => format!("{} Batch", req.batch_year),
    };

    let year = Year {
        id: uuid::Uuid::new_v4().to_string(),
        batch_year: req.batch_year,
        display_name,
        created_at: Utc::now(),
    };
    state.db.put_year(&year)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::Year,
        &year.id,
        None,
        Some(&year),
    );
    Ok(JSend::success(year))
}

pub async fn update_year(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateYearRequest>,
) -> Result<Json<JSend<Year>>, ApiError> {
    if req.batch_year.is_none() && req.display_name.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (batch_year, display_name) must be provided",
        ));
    }

    let existing = state
        .db
        .get_year(&id)?
        .ok_or_else(|| ApiError::not_found("Year not found"))?;

    let mut year = existing.clone();
    if let Some(batch_year) = req.batch_year {
        check_batch_year(batch_year)?;
        if state.db.year_exists(batch_year, Some(&id))? {
            return Err(ApiError::conflict(format!(
                "batch year {batch_year} already exists"
            )));
        }
        year.batch_year = batch_year;
    }
    if let Some(ref name) = req.display_name {
        year.display_name = required(name, "display_name")?;
    }

    state.db.put_year(&year)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::Year,
        &id,
        Some(&existing),
        Some(&year),
    );
    Ok(JSend::success(year))
}

pub async fn delete_year(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_year(&id)?
        .ok_or_else(|| ApiError::not_found("Year not found"))?;

    state.db.delete_year(&id)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::Year,
        &id,
        Some(&existing),
        None,
    );
    Ok(JSend::success(()))
}

// ============================================================================
// Semesters
// ============================================================================

pub async fn create_semester(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    AppJson(req): AppJson<SemesterRequest>,
) -> Result<Json<JSend<Semester>>, ApiError> {
    check_semester_number(req.semester_number)?;
    ensure_year(&state, &req.year_id)?;
    if state
        .db
        .semester_exists(&req.year_id, req.semester_number, None)?
    {
        return Err(ApiError::conflict(format!(
            "semester {} already exists for this year",
            req.semester_number
        )));
    }

    let semester = Semester {
        id: uuid::Uuid::new_v4().to_string(),
        year_id: req.year_id,
        semester_number: req.semester_number,
        created_at: Utc::now(),
    };
    state.db.put_semester(&semester)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::Semester,
        &semester.id,
        None,
        Some(&semester),
    );
    Ok(JSend::success(semester))
}

pub async fn update_semester(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateSemesterRequest>,
) -> Result<Json<JSend<Semester>>, ApiError> {
    if req.year_id.is_none() && req.semester_number.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (year_id, semester_number) must be provided",
        ));
    }

    let existing = state
        .db
        .get_semester(&id)?
        .ok_or_else(|| ApiError::not_found("Semester not found"))?;

    let mut semester = existing.clone();
    if let Some(ref year_id) = req.year_id {
        ensure_year(&state, year_id)?;
        semester.year_id = year_id.clone();
    }
    if let Some(n) = req.semester_number {
        check_semester_number(n)?;
        semester.semester_number = n;
    }
    if state
        .db
        .semester_exists(&semester.year_id, semester.semester_number, Some(&id))?
    {
        return Err(ApiError::conflict(format!(
            "semester {} already exists for this year",
            semester.semester_number
        )));
    }

    state.db.put_semester(&semester)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::Semester,
        &id,
        Some(&existing),
        Some(&semester),
    );
    Ok(JSend::success(semester))
}

pub async fn delete_semester(
    State(state): State<Arc<AppState>>,
    SuperadminUser(admin): SuperadminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_semester(&id)?
        .ok_or_else(|| ApiError::not_found("Semester not found"))?;

    state.db.delete_semester(&id)?;
    state.lookups.invalidate().await;

    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::Semester,
        &id,
        Some(&existing),
        None,
    );
    Ok(JSend::success(()))
}
