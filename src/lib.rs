//! pecup - backend for a student resource-sharing portal
//!
//! This crate provides study material distribution scoped by branch, batch year
//! and semester, with:
//! - Swappable object storage backends (local filesystem, Supabase Storage)
//! - redb embedded database for records (ACID, MVCC, crash-safe)
//! - Upload validation by magic-byte sniffing with an extension allow-list
//! - HS256 bearer token auth with student, admin and superadmin roles
//! - An audit trail of every admin mutation

pub mod api;
pub mod auth;
pub mod config;
pub mod lookup_cache;
pub mod maintenance;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod validation;

use std::sync::Arc;

use auth::TokenVerifier;
use config::Config;
use lookup_cache::LookupCache;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub lookups: LookupCache,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub verifier: TokenVerifier,
}
