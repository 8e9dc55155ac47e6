//! Offline operations behind the `pecup-maint` binary.
//!
//! These run directly against the database with the server stopped, so they
//! bypass the HTTP layer and the lookup cache.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::{
    AuditAction, AuditEntity, AuditEntry, Branch, Category, Resource, ResourceKind, Role,
    Semester, Year,
};
use crate::storage::{Database, DatabaseError};
use crate::validation::{check_batch_year, check_semester_number, normalize_branch_code};

/// Actor recorded on audit rows written by offline tooling
pub const MAINTENANCE_ACTOR: &str = "maintenance";

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("Cutoff of {days} days is out of range")]
    CutoffOutOfRange { days: u32 },
}

// ============================================================================
// Audit pruning
// ============================================================================

/// The instant `days` before `now`, or an error when it falls outside the representable range.
pub fn audit_cutoff(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, MaintenanceError> {
    Duration::try_days(i64::from(days))
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or(MaintenanceError::CutoffOutOfRange { days })
}

// ============================================================================
// Lookup seeding
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub branches: Vec<SeedBranch>,
    #[serde(default)]
    pub years: Vec<SeedYear>,
    #[serde(default)]
    pub semesters: Vec<SeedSemester>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBranch {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedYear {
    pub batch_year: i32,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Semesters are addressed by batch year since ids are not known up front.
#[derive(Debug, Deserialize)]
pub struct SeedSemester {
    pub batch_year: i32,
    pub semester_number: u8,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub branches_created: u64,
    pub years_created: u64,
    pub semesters_created: u64,
    pub skipped: u64,
}

/// Insert lookups that are not present yet. Running the same file twice is a no-op.
pub fn seed_lookups(db: &Database, seed: &SeedFile) -> Result<SeedReport, MaintenanceError> {
    let mut report = SeedReport::default();
    let now = Utc::now();

    for (row, b) in seed.branches.iter().enumerate() {
        let invalid = |message: String| MaintenanceError::InvalidRow { row, message };
        let code = normalize_branch_code(&b.code).map_err(|e| invalid(e.to_string()))?;
        if b.name.trim().is_empty() {
            return Err(invalid("branch name must not be empty".to_string()));
        }
        if db.branch_code_exists(&code)? {
            report.skipped += 1;
            continue;
        }
        db.put_branch(&Branch {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            name: b.name.trim().to_string(),
            created_at: now,
        })?;
        report.branches_created += 1;
    }

    for (row, y) in seed.years.iter().enumerate() {
        check_batch_year(y.batch_year).map_err(|e| MaintenanceError::InvalidRow {
            row,
            message: e.to_string(),
        })?;
        if db.year_exists(y.batch_year, None)? {
            report.skipped += 1;
            continue;
        }
        db.put_year(&Year {
            id: uuid::Uuid::new_v4().to_string(),
            batch_year: y.batch_year,
            display_name: y
                .display_name
                .clone()
                .unwrap_or_else(|| format!("{} Batch", y.batch_year)),
            created_at: now,
        })?;
        report.years_created += 1;
    }

    for (row, s) in seed.semesters.iter().enumerate() {
        check_semester_number(s.semester_number).map_err(|e| MaintenanceError::InvalidRow {
            row,
            message: e.to_string(),
        })?;
        let year = find_year(db, s.batch_year)?.ok_or_else(|| MaintenanceError::InvalidRow {
            row,
            message: format!("unknown batch_year {}", s.batch_year),
        })?;
        if db.semester_exists(&year.id, s.semester_number, None)? {
            report.skipped += 1;
            continue;
        }
        db.put_semester(&Semester {
            id: uuid::Uuid::new_v4().to_string(),
            year_id: year.id,
            semester_number: s.semester_number,
            created_at: now,
        })?;
        report.semesters_created += 1;
    }

    tracing::info!(?report, "Seeded lookups");
    Ok(report)
}

fn find_year(db: &Database, batch_year: i32) -> Result<Option<Year>, DatabaseError> {
    Ok(db
        .list_years()?
        .into_iter()
        .find(|y| y.batch_year == batch_year))
}

// ============================================================================
// Resource import
// ============================================================================

/// One link resource, scoped by human-readable codes.
#[derive(Debug, Deserialize)]
pub struct ImportResource {
    pub category: String,
    pub subject: String,
    #[serde(default = "default_unit")]
    pub unit: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub branch_code: String,
    pub batch_year: i32,
    pub semester_number: u8,
    #[serde(default)]
    pub regulation: Option<String>,
}

fn default_unit() -> u32 {
    1
}

/// Validate and insert every row. Rows are resolved before anything is written,
/// so a bad row aborts the whole import.
pub fn import_resources(
    db: &Database,
    rows: &[ImportResource],
) -> Result<Vec<Resource>, MaintenanceError> {
    let semesters = db.list_semesters()?;
    let now = Utc::now();

    let mut resolved = Vec::with_capacity(rows.len());
    for (row, r) in rows.iter().enumerate() {
        let invalid = |message: String| MaintenanceError::InvalidRow { row, message };

        let category = Category::parse(&r.category)
            .ok_or_else(|| invalid(format!("unknown category '{}'", r.category)))?;
        if r.subject.trim().is_empty() || r.name.trim().is_empty() {
            return Err(invalid("subject and name must not be empty".to_string()));
        }
        if r.unit == 0 {
            return Err(invalid("unit must be a positive integer".to_string()));
        }
        if !(r.url.starts_with("https://") || r.url.starts_with("http://")) {
            return Err(invalid(format!("url '{}' must be http(s)", r.url)));
        }

        let branch = db
            .get_branch_by_code(&r.branch_code)?
            .ok_or_else(|| invalid(format!("unknown branch_code '{}'", r.branch_code)))?;
        let year = find_year(db, r.batch_year)?
            .ok_or_else(|| invalid(format!("unknown batch_year {}", r.batch_year)))?;
        let semester = semesters
            .iter()
            .find(|s| s.year_id == year.id && s.semester_number == r.semester_number)
            .ok_or_else(|| {
                invalid(format!(
                    "no semester {} for batch {}",
                    r.semester_number, r.batch_year
                ))
            })?;

        resolved.push(Resource {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            subject: r.subject.trim().to_string(),
            unit: r.unit,
            name: r.name.trim().to_string(),
            description: r.description.clone(),
            kind: ResourceKind::Link,
            url: Some(r.url.clone()),
            storage_key: None,
            mime_type: None,
            byte_size: None,
            branch_id: branch.id,
            year_id: year.id,
            semester_id: semester.id.clone(),
            regulation: r.regulation.clone(),
            archived: false,
            created_by: MAINTENANCE_ACTOR.to_string(),
            created_at: now,
            updated_at: now,
        });
    }

    for resource in &resolved {
        db.put_resource(resource)?;
        db.append_audit(&AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            actor_email: MAINTENANCE_ACTOR.to_string(),
            actor_role: Role::Superadmin,
            action: AuditAction::Create,
            entity: AuditEntity::Resource,
            entity_id: resource.id.clone(),
            before: None,
            after: serde_json::to_value(resource).ok(),
            created_at: Utc::now(),
        })?;
    }

    tracing::info!(count = resolved.len(), "Imported resources");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{AuditFilter, ResourceFilter};

    fn seed() -> SeedFile {
        serde_json::from_value(serde_json::json!({
            "branches": [{"code": "cse", "name": "Computer Science"}],
            "years": [{"batch_year": 2024}],
            "semesters": [
                {"batch_year": 2024, "semester_number": 1},
                {"batch_year": 2024, "semester_number": 2}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_seed_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(temp.path()).unwrap();

        let first = seed_lookups(&db, &seed()).unwrap();
        assert_eq!(first.branches_created, 1);
        assert_eq!(first.years_created, 1);
        assert_eq!(first.semesters_created, 2);

        let second = seed_lookups(&db, &seed()).unwrap();
        assert_eq!(
            second,
            SeedReport {
                skipped: 4,
                ..Default::default()
            }
        );

        let branch = db.get_branch_by_code("CSE").unwrap().unwrap();
        assert_eq!(branch.name, "Computer Science");
        assert_eq!(db.list_years().unwrap()[0].display_name, "2024 Batch");
    }

    #[test]
    fn test_seed_rejects_semester_for_unknown_year() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(temp.path()).unwrap();
        let file: SeedFile = serde_json::from_value(serde_json::json!({
            "semesters": [{"batch_year": 1999, "semester_number": 1}]
        }))
        .unwrap();

        let err = seed_lookups(&db, &file).unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidRow { row: 0, .. }));
    }

    #[test]
    fn test_seed_applies_lookup_rules() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(temp.path()).unwrap();

        let bad_code: SeedFile = serde_json::from_value(serde_json::json!({
            "branches": [{"code": "CSE", "name": "ok"}, {"code": "E&C", "name": "bad"}]
        }))
        .unwrap();
        let err = seed_lookups(&db, &bad_code).unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidRow { row: 1, .. }));

        let bad_year: SeedFile = serde_json::from_value(serde_json::json!({
            "years": [{"batch_year": 1850}]
        }))
        .unwrap();
        let err = seed_lookups(&db, &bad_year).unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidRow { row: 0, .. }));
        assert!(db.list_years().unwrap().is_empty());
    }

    #[test]
    fn test_audit_cutoff_out_of_range() {
        let now = Utc::now();
        assert_eq!(audit_cutoff(now, 30).unwrap(), now - Duration::days(30));
        assert!(matches!(
            audit_cutoff(now, 100_000_000),
            Err(MaintenanceError::CutoffOutOfRange { days: 100_000_000 })
        ));
        assert!(audit_cutoff(now, u32::MAX).is_err());
    }

    #[test]
    fn test_import_resolves_scope_and_audits() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(temp.path()).unwrap();
        seed_lookups(&db, &seed()).unwrap();

        let rows: Vec<ImportResource> = serde_json::from_value(serde_json::json!([{
            "category": "Notes",
            "subject": "Data Structures",
            "unit": 2,
            "name": "Trees",
            "url": "https://drive.example.com/trees",
            "branch_code": "CSE",
            "batch_year": 2024,
            "semester_number": 1
        }]))
        .unwrap();

        let imported = import_resources(&db, &rows).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].kind, ResourceKind::Link);
        assert_eq!(imported[0].category, Category::Notes);

        let listed = db.list_resources(&ResourceFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].created_by, MAINTENANCE_ACTOR);

        let (audit, total) = db
            .list_audit(
                &AuditFilter {
                    actor_email: Some(MAINTENANCE_ACTOR.to_string()),
                    ..Default::default()
                },
                0,
                10,
            )
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(audit[0].entity, AuditEntity::Resource);
    }

    #[test]
    fn test_import_aborts_on_bad_row_without_writing() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(temp.path()).unwrap();
        seed_lookups(&db, &seed()).unwrap();

        let rows: Vec<ImportResource> = serde_json::from_value(serde_json::json!([
            {
                "category": "notes", "subject": "DS", "name": "ok",
                "url": "https://x.example.com", "branch_code": "CSE",
                "batch_year": 2024, "semester_number": 1
            },
            {
                "category": "notes", "subject": "DS", "name": "bad",
                "url": "https://x.example.com", "branch_code": "MECH",
                "batch_year": 2024, "semester_number": 1
            }
        ]))
        .unwrap();

        let err = import_resources(&db, &rows).unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidRow { row: 1, .. }));
        assert!(db
            .list_resources(&ResourceFilter::default())
            .unwrap()
            .is_empty());
    }
}
