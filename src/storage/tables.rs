use redb::TableDefinition;

/// Resources: uuid -> Resource (msgpack)
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

/// Scope index: "branch:year:semester" -> msgpack Vec of resource UUIDs
pub const RESOURCE_SCOPES: TableDefinition<&str, &[u8]> = TableDefinition::new("resource_scopes");

/// Reminders: uuid -> Reminder (msgpack)
pub const REMINDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("reminders");

/// Recent updates: uuid -> RecentUpdate (msgpack)
pub const RECENT_UPDATES: TableDefinition<&str, &[u8]> = TableDefinition::new("recent_updates");

/// Student profiles: email -> Profile (msgpack)
pub const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

/// Admins: email -> Admin (msgpack)
pub const ADMINS: TableDefinition<&str, &[u8]> = TableDefinition::new("admins");

/// Branches: uuid -> Branch (msgpack)
pub const BRANCHES: TableDefinition<&str, &[u8]> = TableDefinition::new("branches");

/// Branch code index: code -> uuid
pub const BRANCH_CODES: TableDefinition<&str, &str> = TableDefinition::new("branch_codes");

/// Years: uuid -> Year (msgpack)
pub const YEARS: TableDefinition<&str, &[u8]> = TableDefinition::new("years");

/// Semesters: uuid -> Semester (msgpack)
pub const SEMESTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("semesters");

/// Audit log: "{micros:020}-{uuid}" -> AuditEntry (msgpack), append-only
pub const AUDIT_LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_logs");
