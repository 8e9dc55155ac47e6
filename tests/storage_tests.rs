use chrono::{Duration, NaiveDate, Utc};
use pecup::storage::models::{
    Admin, AudienceFilter, AuditAction, AuditEntity, AuditEntry, AuditFilter, Branch, Category,
    Patch, Profile, RecentUpdate, Reminder, ReminderPatch, ReminderStatus, Resource,
    ResourceFilter, ResourceKind, ResourcePatch, Role, Semester, Year,
};
use pecup::storage::{Database, DatabaseError};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_resource(id: &str, subject: &str, unit: u32, scope: (&str, &str, &str)) -> Resource {
    let now = Utc::now();
    Resource {
        id: id.to_string(),
        category: Category::Notes,
        subject: subject.to_string(),
        unit,
        name: format!("{subject} unit {unit}"),
        description: None,
        kind: ResourceKind::Link,
        url: Some("https://drive.example.com/x".to_string()),
        storage_key: None,
        mime_type: None,
        byte_size: None,
        branch_id: scope.0.to_string(),
        year_id: scope.1.to_string(),
        semester_id: scope.2.to_string(),
        regulation: None,
        archived: false,
        created_by: "admin@pec.edu".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn seed_scope(db: &Database) {
    let now = Utc::now();
    db.put_branch(&Branch {
        id: "b1".to_string(),
        code: "CSE".to_string(),
        name: "Computer Science".to_string(),
        created_at: now,
    })
    .unwrap();
    db.put_year(&Year {
        id: "y1".to_string(),
        batch_year: 2024,
        display_name: "2024 Batch".to_string(),
        created_at: now,
    })
    .unwrap();
    db.put_semester(&Semester {
        id: "s1".to_string(),
        year_id: "y1".to_string(),
        semester_number: 1,
        created_at: now,
    })
    .unwrap();
}

fn reminder(id: &str, due: NaiveDate, branch_id: Option<&str>) -> Reminder {
    let now = Utc::now();
    Reminder {
        id: id.to_string(),
        title: format!("Reminder {id}"),
        description: None,
        due_date: due,
        icon_type: None,
        status: ReminderStatus::Upcoming,
        branch_id: branch_id.map(str::to_string),
        year_id: None,
        archived: false,
        created_by: "admin@pec.edu".to_string(),
        created_at: now,
        updated_at: now,
    }
}

const SCOPE: (&str, &str, &str) = ("b1", "y1", "s1");

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_put_and_get_resource() {
    let (_dir, db) = test_db();
    let resource = sample_resource("r1", "Data Structures", 1, SCOPE);

    db.put_resource(&resource).unwrap();

    let retrieved = db.get_resource("r1").unwrap().expect("resource should exist");
    assert_eq!(retrieved, resource);
    assert!(db.get_resource("nope").unwrap().is_none());
}

#[test]
fn test_list_resources_is_sorted_and_filtered() {
    let (_dir, db) = test_db();
    db.put_resource(&sample_resource("r1", "maths", 2, SCOPE)).unwrap();
    db.put_resource(&sample_resource("r2", "Data Structures", 3, SCOPE))
        .unwrap();
    db.put_resource(&sample_resource("r3", "Maths", 1, SCOPE)).unwrap();
    db.put_resource(&sample_resource("r4", "Physics", 1, ("b2", "y1", "s1")))
        .unwrap();

    let all = db.list_resources(&ResourceFilter::default()).unwrap();
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r3", "r1", "r4"]);

    let scoped = db
        .list_resources(&ResourceFilter {
            branch_id: Some("b1".to_string()),
            year_id: Some("y1".to_string()),
            semester_id: Some("s1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(scoped.len(), 3);

    let maths = db
        .list_resources(&ResourceFilter {
            subject: Some("MATHS".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(maths.len(), 2);
}

#[test]
fn test_archived_resources_hidden_unless_requested() {
    let (_dir, db) = test_db();
    let mut resource = sample_resource("r1", "Maths", 1, SCOPE);
    resource.archived = true;
    db.put_resource(&resource).unwrap();

    assert!(db
        .list_resources(&ResourceFilter::default())
        .unwrap()
        .is_empty());
    assert_eq!(
        db.list_resources(&ResourceFilter {
            include_archived: true,
            ..Default::default()
        })
        .unwrap()
        .len(),
        1
    );
}

#[test]
fn test_update_resource_moves_scope_index() {
    let (_dir, db) = test_db();
    db.put_resource(&sample_resource("r1", "Maths", 1, SCOPE)).unwrap();

    let updated = db
        .update_resource(
            "r1",
            &ResourcePatch {
                semester_id: Some("s2".to_string()),
                description: Patch::Value("Updated".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .expect("resource should exist");
    assert_eq!(updated.semester_id, "s2");
    assert_eq!(updated.description.as_deref(), Some("Updated"));

    assert!(db.get_resources_by_scope("b1", "y1", "s1").unwrap().is_empty());
    assert_eq!(db.get_resources_by_scope("b1", "y1", "s2").unwrap().len(), 1);
}

#[test]
fn test_update_resource_clears_nullable_field() {
    let (_dir, db) = test_db();
    let mut resource = sample_resource("r1", "Maths", 1, SCOPE);
    resource.regulation = Some("R20".to_string());
    db.put_resource(&resource).unwrap();

    let updated = db
        .update_resource(
            "r1",
            &ResourcePatch {
                regulation: Patch::Null,
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.regulation, None);
    assert!(db
        .update_resource("missing", &ResourcePatch::default())
        .unwrap()
        .is_none());
}

#[test]
fn test_delete_resource() {
    let (_dir, db) = test_db();
    db.put_resource(&sample_resource("r1", "Maths", 1, SCOPE)).unwrap();

    assert!(db.delete_resource("r1").unwrap());
    assert!(!db.delete_resource("r1").unwrap());
    assert!(db.get_resource("r1").unwrap().is_none());
    assert!(db.get_resources_by_scope("b1", "y1", "s1").unwrap().is_empty());
}

#[test]
fn test_list_subjects_distinct_and_sorted() {
    let (_dir, db) = test_db();
    db.put_resource(&sample_resource("r1", "Physics", 1, SCOPE)).unwrap();
    db.put_resource(&sample_resource("r2", "Maths", 1, SCOPE)).unwrap();
    db.put_resource(&sample_resource("r3", "Maths", 2, SCOPE)).unwrap();

    let subjects = db.list_subjects(&ResourceFilter::default()).unwrap();
    assert_eq!(subjects, vec!["Maths".to_string(), "Physics".to_string()]);
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_branch_code_index() {
    let (_dir, db) = test_db();
    seed_scope(&db);

    assert!(db.branch_code_exists("CSE").unwrap());
    let branch = db.get_branch_by_code("cse").unwrap().expect("lookup is case-insensitive");
    assert_eq!(branch.id, "b1");

    let mut renamed = branch.clone();
    renamed.code = "CS".to_string();
    db.put_branch(&renamed).unwrap();
    assert!(!db.branch_code_exists("CSE").unwrap());
    assert!(db.branch_code_exists("CS").unwrap());
}

#[test]
fn test_delete_lookup_in_use_is_refused() {
    let (_dir, db) = test_db();
    seed_scope(&db);
    db.put_resource(&sample_resource("r1", "Maths", 1, SCOPE)).unwrap();

    assert!(matches!(
        db.delete_branch("b1"),
        Err(DatabaseError::InUse(_))
    ));
    assert!(matches!(db.delete_year("y1"), Err(DatabaseError::InUse(_))));
    assert!(matches!(
        db.delete_semester("s1"),
        Err(DatabaseError::InUse(_))
    ));
    assert!(db.get_branch("b1").unwrap().is_some());

    db.delete_resource("r1").unwrap();
    assert!(db.delete_semester("s1").unwrap());
    assert!(db.delete_branch("b1").unwrap());
    assert!(!db.branch_code_exists("CSE").unwrap());
}

#[test]
fn test_referenced_semester_cannot_change_year() {
    let (_dir, db) = test_db();
    seed_scope(&db);
    db.put_year(&Year {
        id: "y0".to_string(),
        batch_year: 2023,
        display_name: "2023 Batch".to_string(),
        created_at: Utc::now(),
    })
    .unwrap();
    db.put_resource(&sample_resource("r1", "Maths", 1, SCOPE)).unwrap();

    let mut moved = db.get_semester("s1").unwrap().unwrap();
    moved.year_id = "y0".to_string();
    assert!(matches!(db.put_semester(&moved), Err(DatabaseError::InUse(_))));
    assert_eq!(db.get_semester("s1").unwrap().unwrap().year_id, "y1");

    // Renumbering within the same year is still allowed
    let mut renumbered = db.get_semester("s1").unwrap().unwrap();
    renumbered.semester_number = 2;
    db.put_semester(&renumbered).unwrap();

    db.delete_resource("r1").unwrap();
    db.put_semester(&moved).unwrap();
    assert_eq!(db.get_semester("s1").unwrap().unwrap().year_id, "y0");
}

#[test]
fn test_uniqueness_checks() {
    let (_dir, db) = test_db();
    seed_scope(&db);

    assert!(db.year_exists(2024, None).unwrap());
    assert!(!db.year_exists(2024, Some("y1")).unwrap());
    assert!(db.semester_exists("y1", 1, None).unwrap());
    assert!(!db.semester_exists("y1", 2, None).unwrap());
}

// ============================================================================
// Reminders and recent updates
// ============================================================================

#[test]
fn test_reminders_audience_and_order() {
    let (_dir, db) = test_db();
    let today = Utc::now().date_naive();
    db.put_reminder(&reminder("late", today + Duration::days(5), None))
        .unwrap();
    db.put_reminder(&reminder("soon", today + Duration::days(1), Some("b1")))
        .unwrap();
    db.put_reminder(&reminder("other", today, Some("b2"))).unwrap();

    let audience = AudienceFilter {
        branch_id: Some("b1".to_string()),
        year_id: None,
    };
    let listed = db.list_reminders(&audience, false).unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["soon", "late"]);
}

#[test]
fn test_archived_reminder_excluded_for_students() {
    let (_dir, db) = test_db();
    db.put_reminder(&reminder("r1", Utc::now().date_naive(), None))
        .unwrap();
    db.update_reminder(
        "r1",
        &ReminderPatch {
            archived: Some(true),
            status: Some(ReminderStatus::Completed),
            ..Default::default()
        },
    )
    .unwrap()
    .unwrap();

    let audience = AudienceFilter::default();
    assert!(db.list_reminders(&audience, false).unwrap().is_empty());
    let all = db.list_reminders(&audience, true).unwrap();
    assert_eq!(all[0].status, ReminderStatus::Completed);
}

#[test]
fn test_recent_updates_newest_first() {
    let (_dir, db) = test_db();
    let now = Utc::now();
    for (id, days_ago) in [("old", 3), ("new", 0), ("mid", 1)] {
        db.put_recent_update(&RecentUpdate {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            date: now.date_naive() - Duration::days(days_ago),
            branch_id: None,
            year_id: None,
            created_by: "admin@pec.edu".to_string(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    }

    let listed = db.list_recent_updates(&AudienceFilter::default()).unwrap();
    let ids: Vec<&str> = listed.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);

    assert!(db.delete_recent_update("mid").unwrap());
    assert_eq!(
        db.list_recent_updates(&AudienceFilter::default()).unwrap().len(),
        2
    );
}

// ============================================================================
// People
// ============================================================================

#[test]
fn test_profile_keyed_by_lowercase_email() {
    let (_dir, db) = test_db();
    let now = Utc::now();
    db.put_profile(&Profile {
        email: "student@pec.edu".to_string(),
        name: "Student".to_string(),
        roll_number: "22B01A0501".to_string(),
        branch_id: "b1".to_string(),
        year_id: "y1".to_string(),
        semester_id: "s1".to_string(),
        section: Some("A".to_string()),
        created_at: now,
        updated_at: now,
    })
    .unwrap();

    let profile = db.get_profile("Student@PEC.edu").unwrap().expect("profile");
    assert_eq!(profile.roll_number, "22B01A0501");
    assert_eq!(db.list_profiles().unwrap().len(), 1);
}

#[test]
fn test_admins_crud() {
    let (_dir, db) = test_db();
    let now = Utc::now();
    db.put_admin(&Admin {
        email: "b@pec.edu".to_string(),
        role: Role::Admin,
        created_at: now,
    })
    .unwrap();
    db.put_admin(&Admin {
        email: "a@pec.edu".to_string(),
        role: Role::Superadmin,
        created_at: now,
    })
    .unwrap();

    let admins = db.list_admins().unwrap();
    assert_eq!(admins[0].email, "a@pec.edu");
    assert_eq!(admins[1].role, Role::Admin);

    assert!(db.delete_admin("b@pec.edu").unwrap());
    assert!(db.get_admin("b@pec.edu").unwrap().is_none());
}

// ============================================================================
// Audit log
// ============================================================================

fn audit(entity: AuditEntity, action: AuditAction, actor: &str, age_days: i64) -> AuditEntry {
    AuditEntry {
        id: uuid::Uuid::new_v4().to_string(),
        actor_email: actor.to_string(),
        actor_role: Role::Admin,
        action,
        entity,
        entity_id: "x".to_string(),
        before: None,
        after: Some(serde_json::json!({"ok": true})),
        created_at: Utc::now() - Duration::days(age_days),
    }
}

#[test]
fn test_audit_newest_first_with_filter_and_pagination() {
    let (_dir, db) = test_db();
    for age in [5, 4, 3, 2, 1] {
        db.append_audit(&audit(
            AuditEntity::Resource,
            AuditAction::Create,
            "a@pec.edu",
            age,
        ))
        .unwrap();
    }
    db.append_audit(&audit(
        AuditEntity::Branch,
        AuditAction::Delete,
        "root@pec.edu",
        0,
    ))
    .unwrap();

    let (page, total) = db.list_audit(&AuditFilter::default(), 0, 2).unwrap();
    assert_eq!(total, 6);
    assert_eq!(page[0].entity, AuditEntity::Branch);
    assert!(page[0].created_at > page[1].created_at);

    let filter = AuditFilter {
        entity: Some(AuditEntity::Resource),
        ..Default::default()
    };
    let (page, total) = db.list_audit(&filter, 4, 10).unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 1);
}

#[test]
fn test_prune_audit_removes_only_old_entries() {
    let (_dir, db) = test_db();
    db.append_audit(&audit(AuditEntity::Year, AuditAction::Update, "a@pec.edu", 40))
        .unwrap();
    db.append_audit(&audit(AuditEntity::Year, AuditAction::Update, "a@pec.edu", 1))
        .unwrap();

    let removed = db.prune_audit(Utc::now() - Duration::days(30)).unwrap();
    assert_eq!(removed, 1);
    let (_, total) = db.list_audit(&AuditFilter::default(), 0, 10).unwrap();
    assert_eq!(total, 1);
}

// ============================================================================
// Purge and stats
// ============================================================================

#[test]
fn test_purge_all_reports_and_clears() {
    let (_dir, db) = test_db();
    seed_scope(&db);
    db.put_resource(&sample_resource("r1", "Maths", 1, SCOPE)).unwrap();

    let stats = db.stats().unwrap();
    assert_eq!(stats.resources, 1);
    assert_eq!(stats.branches, 1);

    let purged = db.purge_all().unwrap();
    assert_eq!(purged, stats);

    let after = db.stats().unwrap();
    assert_eq!(after.resources, 0);
    assert_eq!(after.semesters, 0);
    assert!(!db.branch_code_exists("CSE").unwrap());
}
