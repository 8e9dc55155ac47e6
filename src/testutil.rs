//! Shared test helpers for pecup handler tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::{Claims, TokenVerifier};
use crate::config::{AuthConfig, Config, NodeConfig, StorageConfig};
use crate::lookup_cache::LookupCache;
use crate::object_store::LocalStore;
use crate::storage::models::{Admin, Branch, Role, Semester, Year};
use crate::storage::Database;
use crate::AppState;

pub const TEST_SECRET: &str = "test-secret";
pub const SUPERADMIN_EMAIL: &str = "root@pec.edu";
pub const ADMIN_EMAIL: &str = "admin@pec.edu";
pub const STUDENT_EMAIL: &str = "student@pec.edu";

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            superadmin_emails: vec![SUPERADMIN_EMAIL.to_string()],
        },
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig::default(),
        lookup_cache_ttl_secs: 300,
        test_mode: true,
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    db.put_admin(&Admin {
        email: ADMIN_EMAIL.to_string(),
        role: Role::Admin,
        created_at: Utc::now(),
    })
    .expect("Failed to seed admin");

    Arc::new(AppState {
        lookups: LookupCache::new(db.clone(), Duration::from_secs(config.lookup_cache_ttl_secs)),
        verifier: TokenVerifier::new(TEST_SECRET),
        config,
        db,
        object_store: Arc::new(object_store),
    })
}

/// Mint a valid bearer header value for an email.
pub fn bearer(email: &str) -> String {
    let token = TokenVerifier::new(TEST_SECRET).sign(&Claims {
        sub: Some(format!("user-{email}")),
        email: Some(email.to_string()),
        exp: Utc::now().timestamp() + 3600,
    });
    format!("Bearer {token}")
}

/// Ids of a seeded branch/year/semester scope.
pub struct TestScope {
    pub branch_id: String,
    pub year_id: String,
    pub semester_id: String,
}

/// Insert one branch (CSE), one year (2024) and its first semester.
pub fn seed_scope(state: &AppState) -> TestScope {
    let now = Utc::now();
    let branch = Branch {
        id: uuid::Uuid::new_v4().to_string(),
        code: "CSE".to_string(),
        name: "Computer Science".to_string(),
        created_at: now,
    };
    let year = Year {
        id: uuid::Uuid::new_v4().to_string(),
        batch_year: 2024,
        display_name: "2024 Batch".to_string(),
        created_at: now,
    };
    let semester = Semester {
        id: uuid::Uuid::new_v4().to_string(),
        year_id: year.id.clone(),
        semester_number: 1,
        created_at: now,
    };
    state.db.put_branch(&branch).expect("seed branch");
    state.db.put_year(&year).expect("seed year");
    state.db.put_semester(&semester).expect("seed semester");

    TestScope {
        branch_id: branch.id,
        year_id: year.id,
        semester_id: semester.id,
    }
}
