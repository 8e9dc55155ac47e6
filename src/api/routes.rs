use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Multipart framing adds a little on top of the file itself
    let upload_limit = state.config.max_upload_size as usize + 64 * 1024;

    let mut router = Router::new()
        // Student
        .route("/lookups", get(handlers::get_lookups))
        .route("/profile", get(handlers::get_profile))
        .route("/profile", put(handlers::upsert_profile))
        .route("/resources", get(handlers::list_resources))
        .route("/resources/:id", get(handlers::get_resource))
        .route("/resources/:id/download", get(handlers::download_resource))
        .route("/subjects", get(handlers::list_subjects))
        .route("/reminders", get(handlers::list_reminders))
        .route("/recent-updates", get(handlers::list_recent_updates))
        // Admin content
        .route("/admin/resources", get(handlers::admin_list_resources))
        .route(
            "/admin/resources",
            post(handlers::create_resource).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/admin/resources/:id", get(handlers::admin_get_resource))
        .route("/admin/resources/:id", put(handlers::update_resource))
        .route("/admin/resources/:id", delete(handlers::delete_resource))
        .route("/admin/reminders", get(handlers::admin_list_reminders))
        .route("/admin/reminders", post(handlers::create_reminder))
        .route("/admin/reminders/:id", put(handlers::update_reminder))
        .route("/admin/reminders/:id", delete(handlers::delete_reminder))
        .route(
            "/admin/recent-updates",
            get(handlers::admin_list_recent_updates),
        )
        .route("/admin/recent-updates", post(handlers::create_recent_update))
        .route(
            "/admin/recent-updates/:id",
            put(handlers::update_recent_update),
        )
        .route(
            "/admin/recent-updates/:id",
            delete(handlers::delete_recent_update),
        )
        // Superadmin
        .route("/admin/branches", post(handlers::create_branch))
        .route("/admin/branches/:id", put(handlers::update_branch))
        .route("/admin/branches/:id", delete(handlers::delete_branch))
        .route("/admin/years", post(handlers::create_year))
        .route("/admin/years/:id", put(handlers::update_year))
        .route("/admin/years/:id", delete(handlers::delete_year))
        .route("/admin/semesters", post(handlers::create_semester))
        .route("/admin/semesters/:id", put(handlers::update_semester))
        .route("/admin/semesters/:id", delete(handlers::delete_semester))
        .route("/admin/admins", get(handlers::list_admins))
        .route("/admin/admins", post(handlers::create_admin))
        .route("/admin/admins/:email", delete(handlers::delete_admin))
        .route("/admin/audit-logs", get(handlers::list_audit_logs))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
