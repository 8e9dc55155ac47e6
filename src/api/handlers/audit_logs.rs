use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::default_limit;
use crate::api::response::{ApiError, AppQuery, JSendPaginated, Pagination};
use crate::auth::SuperadminUser;
use crate::storage::models::{AuditAction, AuditEntity, AuditEntry, AuditFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditLogParams {
    #[serde(default)]
    pub action: Option<AuditAction>,
    #[serde(default)]
    pub actor_email: Option<String>,
    #[serde(default)]
    pub entity: Option<AuditEntity>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    _superadmin: SuperadminUser,
    AppQuery(params): AppQuery<AuditLogParams>,
) -> Result<Json<JSendPaginated<AuditEntry>>, ApiError> {
    if params.limit == 0 || params.limit > 100 {
        return Err(ApiError::bad_request("limit must be between 1 and 100"));
    }

    let filter = AuditFilter {
        entity: params.entity,
        actor_email: params.actor_email,
        action: params.action,
    };
    let (items, total) =
        state
            .db
            .list_audit(&filter, params.offset as usize, params.limit as usize)?;

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}
