use std::collections::HashMap;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    default_limit, ensure_scope, nullable, record_audit, required, scope_labels, ScopeLabels,
};
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated, Pagination};
use crate::auth::{AdminUser, AuthUser};
use crate::object_store::ObjectStoreError;
use crate::storage::models::{
    AuditAction, AuditEntity, Category, Resource, ResourceFilter, ResourceKind, ResourcePatch,
};
use crate::validation::validate_upload;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub archived: bool,
    pub branch_id: String,
    pub byte_size: Option<u64>,
    pub category: Category,
    pub created_at: String,
    pub created_by: String,
    pub description: Option<String>,
    pub id: String,
    pub kind: ResourceKind,
    pub labels: ScopeLabels,
    pub mime_type: Option<String>,
    pub name: String,
    pub regulation: Option<String>,
    pub semester_id: String,
    pub subject: String,
    pub unit: u32,
    pub updated_at: String,
    pub url: Option<String>,
    pub year_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListResourcesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
    #[serde(default)]
    pub semester_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectsParams {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
    #[serde(default)]
    pub semester_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub regulation: Option<Option<String>>,
    #[serde(default)]
    pub semester_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub unit: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
}

// ============================================================================
// Student handlers
// ============================================================================

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<ListResourcesParams>,
) -> Result<Json<JSendPaginated<ResourceResponse>>, ApiError> {
    paginate_resources(&state, params, false).await
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<ResourceResponse>>, ApiError> {
    let resource = visible_resource(&state, &user, &id)?;
    Ok(JSend::success(resource_to_response(&state, &resource).await?))
}

/// Serve a file resource's content, or redirect to a link resource's URL.
pub async fn download_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let resource = visible_resource(&state, &user, &id)?;

    let storage_key = match (resource.kind, &resource.storage_key, &resource.url) {
        (ResourceKind::Link, _, Some(url)) => {
            return Ok(Redirect::temporary(url).into_response());
        }
        (ResourceKind::File, Some(key), _) => key,
        _ => return Err(ApiError::internal("Resource has no content location")),
    };

    let data = state
        .object_store
        .get(storage_key)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) => ApiError::not_found("Resource content not found"),
            _ => ApiError::internal(format!("Failed to retrieve resource: {e}")),
        })?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        resource
            .mime_type
            .as_deref()
            .and_then(|m| m.parse().ok())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    let filename = download_filename(&resource);
    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );

    Ok(response)
}

pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<SubjectsParams>,
) -> Result<Json<JSend<Vec<String>>>, ApiError> {
    let filter = ResourceFilter {
        category: params.category,
        branch_id: params.branch_id,
        year_id: params.year_id,
        semester_id: params.semester_id,
        ..Default::default()
    };

    let mut subjects = state.db.list_subjects(&filter)?;
    subjects.sort_by_key(|s| s.to_lowercase());
    Ok(JSend::success(subjects))
}

// ============================================================================
// Admin handlers
// ============================================================================

pub async fn admin_list_resources(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(params): AppQuery<ListResourcesParams>,
) -> Result<Json<JSendPaginated<ResourceResponse>>, ApiError> {
    paginate_resources(&state, params, true).await
}

pub async fn admin_get_resource(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<ResourceResponse>>, ApiError> {
    let resource = state
        .db
        .get_resource(&id)?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;
    Ok(JSend::success(resource_to_response(&state, &resource).await?))
}

/// Body limit hits surface as multipart errors; keep their 413 status.
fn multipart_error(e: MultipartError, context: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("{context}: upload exceeds the size limit"))
    } else {
        ApiError::bad_request(format!("{context}: {e}"))
    }
}

/// Create a resource from multipart form data: either a `file` part or a `url` field.
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> Result<Json<JSend<ResourceResponse>>, ApiError> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut file_content_type: Option<String> = None;
    let mut fields: HashMap<String, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Invalid multipart data"))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read file"))?;
                file_data = Some(data);
            }
            "branch_id" | "category" | "description" | "name" | "regulation" | "semester_id"
            | "subject" | "unit" | "url" | "year_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, &format!("Invalid {field_name}")))?;
                fields.insert(field_name, text);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let field = |name: &str| fields.get(name).map(|s| s.as_str()).unwrap_or("");
    let optional = |name: &str| {
        fields
            .get(name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let category = Category::parse(field("category")).ok_or_else(|| {
        ApiError::bad_request("category must be one of notes, assignments, papers, records")
    })?;
    let subject = required(field("subject"), "subject")?;
    let name = required(field("name"), "name")?;
    let unit = parse_unit(field("unit"))?;
    let branch_id = required(field("branch_id"), "branch_id")?;
    let year_id = required(field("year_id"), "year_id")?;
    let semester_id = required(field("semester_id"), "semester_id")?;
    ensure_scope(&state, &branch_id, &year_id, &semester_id)?;

    let url = optional("url");
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut resource = Resource {
        id: id.clone(),
        category,
        subject,
        unit,
        name,
        description: optional("description"),
        kind: ResourceKind::Link,
        url: None,
        storage_key: None,
        mime_type: None,
        byte_size: None,
        branch_id,
        year_id,
        semester_id,
        regulation: optional("regulation"),
        archived: false,
        created_by: admin.email.clone(),
        created_at: now,
        updated_at: now,
    };

    match (file_data, url) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "provide either a file or a url, not both",
            ));
        }
        (None, None) => {
            return Err(ApiError::bad_request("either file or url is required"));
        }
        (None, Some(url)) => {
            resource.url = Some(check_url(&url)?);
        }
        (Some(data), None) => {
            let validated = validate_upload(
                &data,
                file_name.as_deref(),
                file_content_type.as_deref(),
                state.config.max_upload_size,
            )?;
            let storage_key = format!("{id}.{}", validated.extension);

            state
                .object_store
                .put(&storage_key, data.clone(), &validated.mime_type)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to store file: {e}")))?;

            resource.kind = ResourceKind::File;
            resource.byte_size = Some(data.len() as u64);
            resource.mime_type = Some(validated.mime_type);
            resource.storage_key = Some(storage_key);
        }
    }

    if let Err(e) = state.db.put_resource(&resource) {
        // Best-effort cleanup of the uploaded blob
        if let Some(ref key) = resource.storage_key {
            let _ = state.object_store.delete(key).await;
        }
        return Err(e.into());
    }

    record_audit(
        &state,
        &admin,
        AuditAction::Create,
        AuditEntity::Resource,
        &id,
        None,
        Some(&resource),
    );

    tracing::debug!(resource_id = %id, kind = ?resource.kind, "Created resource");
    Ok(JSend::success(resource_to_response(&state, &resource).await?))
}

pub async fn update_resource(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateResourceRequest>,
) -> Result<Json<JSend<ResourceResponse>>, ApiError> {
    if req.archived.is_none()
        && req.branch_id.is_none()
        && req.category.is_none()
        && req.description.is_none()
        && req.name.is_none()
        && req.regulation.is_none()
        && req.semester_id.is_none()
        && req.subject.is_none()
        && req.unit.is_none()
        && req.url.is_none()
        && req.year_id.is_none()
    {
        return Err(ApiError::bad_request(
            "at least one field (archived, branch_id, category, description, name, regulation, semester_id, subject, unit, url, year_id) must be provided",
        ));
    }

    let existing = state
        .db
        .get_resource(&id)?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;

    let subject = req
        .subject
        .as_deref()
        .map(|s| required(s, "subject"))
        .transpose()?;
    let name = req
        .name
        .as_deref()
        .map(|n| required(n, "name"))
        .transpose()?;
    if req.unit == Some(0) {
        return Err(ApiError::bad_request("unit must be greater than 0"));
    }

    let url = match req.url {
        Some(ref url) if existing.kind == ResourceKind::File => {
            return Err(ApiError::bad_request(format!(
                "cannot set url '{url}' on a file resource"
            )));
        }
        Some(ref url) => Some(check_url(url)?),
        None => None,
    };

    if req.branch_id.is_some() || req.year_id.is_some() || req.semester_id.is_some() {
        ensure_scope(
            &state,
            req.branch_id.as_deref().unwrap_or(&existing.branch_id),
            req.year_id.as_deref().unwrap_or(&existing.year_id),
            req.semester_id.as_deref().unwrap_or(&existing.semester_id),
        )?;
    }

    let patch = ResourcePatch {
        category: req.category,
        subject,
        unit: req.unit,
        name,
        description: req.description.into(),
        url,
        branch_id: req.branch_id,
        year_id: req.year_id,
        semester_id: req.semester_id,
        regulation: req.regulation.into(),
        archived: req.archived,
    };

    let updated = state
        .db
        .update_resource(&id, &patch)?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;

    record_audit(
        &state,
        &admin,
        AuditAction::Update,
        AuditEntity::Resource,
        &id,
        Some(&existing),
        Some(&updated),
    );

    tracing::debug!(resource_id = %id, "Updated resource");
    Ok(JSend::success(resource_to_response(&state, &updated).await?))
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let existing = state
        .db
        .get_resource(&id)?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;

    // Phase 1: Remove the row
    state.db.delete_resource(&id)?;

    // Phase 2: Delete blob from object storage (best-effort)
    if let Some(ref key) = existing.storage_key {
        if let Err(e) = state.object_store.delete(key).await {
            tracing::warn!(resource_id = %id, error = %e, "Failed to delete resource blob");
        }
    }

    record_audit(
        &state,
        &admin,
        AuditAction::Delete,
        AuditEntity::Resource,
        &id,
        Some(&existing),
        None,
    );

    tracing::debug!(resource_id = %id, "Deleted resource");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

async fn paginate_resources(
    state: &AppState,
    params: ListResourcesParams,
    include_archived: bool,
) -> Result<Json<JSendPaginated<ResourceResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let filter = ResourceFilter {
        category: params.category,
        subject: params.subject.filter(|s| !s.trim().is_empty()),
        branch_id: params.branch_id,
        year_id: params.year_id,
        semester_id: params.semester_id,
        include_archived,
    };

    let resources = state.db.list_resources(&filter)?;
    let total = resources.len() as u64;

    let mut items = Vec::new();
    for resource in resources
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
    {
        items.push(resource_to_response(state, resource).await?);
    }

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

/// Fetch a resource the caller may see. Archived resources are hidden from students.
fn visible_resource(state: &AppState, user: &AuthUser, id: &str) -> Result<Resource, ApiError> {
    state
        .db
        .get_resource(id)?
        .filter(|r| !r.archived || user.is_admin())
        .ok_or_else(|| ApiError::not_found("Resource not found"))
}

fn parse_unit(raw: &str) -> Result<u32, ApiError> {
    match raw.trim().parse::<u32>() {
        Ok(unit) if unit > 0 => Ok(unit),
        _ => Err(ApiError::bad_request("unit must be a positive integer")),
    }
}

fn check_url(raw: &str) -> Result<String, ApiError> {
    let url = raw.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) || url.len() <= "https://".len()
    {
        return Err(ApiError::bad_request("url must be an http(s) URL"));
    }
    Ok(url.to_string())
}

/// Build a header-safe download name from the resource name and stored extension.
fn download_filename(resource: &Resource) -> String {
    let base: String = resource
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let extension = resource
        .storage_key
        .as_deref()
        .and_then(|k| k.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or("bin");
    format!("{}.{extension}", base.trim())
}

pub(super) async fn resource_to_response(
    state: &AppState,
    resource: &Resource,
) -> Result<ResourceResponse, ApiError> {
    let labels = scope_labels(
        state,
        &resource.branch_id,
        &resource.year_id,
        &resource.semester_id,
    )
    .await?;

    Ok(ResourceResponse {
        archived: resource.archived,
        branch_id: resource.branch_id.clone(),
        byte_size: resource.byte_size,
        category: resource.category,
        created_at: resource.created_at.to_rfc3339(),
        created_by: resource.created_by.clone(),
        description: resource.description.clone(),
        id: resource.id.clone(),
        kind: resource.kind,
        labels,
        mime_type: resource.mime_type.clone(),
        name: resource.name.clone(),
        regulation: resource.regulation.clone(),
        semester_id: resource.semester_id.clone(),
        subject: resource.subject.clone(),
        unit: resource.unit,
        updated_at: resource.updated_at.to_rfc3339(),
        url: resource.url.clone(),
        year_id: resource.year_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit(" 3 ").unwrap(), 3);
        assert!(parse_unit("0").is_err());
        assert!(parse_unit("-1").is_err());
        assert!(parse_unit("").is_err());
    }

    #[test]
    fn test_check_url() {
        assert_eq!(
            check_url(" https://drive.example.com/x ").unwrap(),
            "https://drive.example.com/x"
        );
        assert!(check_url("ftp://example.com").is_err());
        assert!(check_url("https://").is_err());
        assert!(check_url("javascript:alert(1)").is_err());
    }
}
