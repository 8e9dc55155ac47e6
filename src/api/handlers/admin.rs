use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::auth::SuperadminUser;
use crate::lookup_cache::CacheStats;
use crate::storage::TableStats;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub lookup_cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub deleted: TableStats,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        lookup_cache: state.lookups.stats(),
    })
}

/// Wipe every table. Only routed when test mode is enabled. Blobs are left in place.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
    SuperadminUser(actor): SuperadminUser,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let deleted = state.db.purge_all()?;
    state.lookups.invalidate().await;

    tracing::warn!(actor = %actor.email, stats = ?deleted, "Purged all data");

    Ok(JSend::success(PurgeResponse { deleted }))
}
