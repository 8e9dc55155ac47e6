use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Three-state patch value for partial updates of optional fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    /// Field was not included in the request (no change).
    #[default]
    Absent,
    /// Field was explicitly set to null (clear it).
    Null,
    /// Field was set to a new value.
    Value(T),
}

impl<T> From<Option<Option<T>>> for Patch<T> {
    fn from(v: Option<Option<T>>) -> Self {
        match v {
            None => Patch::Absent,
            Some(None) => Patch::Null,
            Some(Some(v)) => Patch::Value(v),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Apply the patch to an optional field.
    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Null => *target = None,
            Patch::Value(v) => *target = Some(v.clone()),
        }
    }
}

// ============================================================================
// Lookup tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    /// Upper-cased short code, unique (e.g. "CSE")
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Year {
    pub id: String,
    /// Admission batch, unique (e.g. 2024)
    pub batch_year: i32,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: String,
    pub year_id: String,
    /// 1 or 2 within a year
    pub semester_number: u8,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assignments,
    Notes,
    Papers,
    Records,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "assignments" => Some(Category::Assignments),
            "notes" => Some(Category::Notes),
            "papers" => Some(Category::Papers),
            "records" => Some(Category::Records),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Blob held in the object store under `storage_key`
    File,
    /// External URL
    Link,
}

/// A shareable academic file or link, scoped by branch/year/semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub category: Category,
    pub subject: String,
    pub unit: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: ResourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub byte_size: Option<u64>,
    pub branch_id: String,
    pub year_id: String,
    pub semester_id: String,
    #[serde(default)]
    pub regulation: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Key into the scope index.
    pub fn scope_key(&self) -> String {
        scope_key(&self.branch_id, &self.year_id, &self.semester_id)
    }
}

pub fn scope_key(branch_id: &str, year_id: &str, semester_id: &str) -> String {
    format!("{branch_id}:{year_id}:{semester_id}")
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub category: Option<Category>,
    pub subject: Option<String>,
    pub unit: Option<u32>,
    pub name: Option<String>,
    pub description: Patch<String>,
    pub url: Option<String>,
    pub branch_id: Option<String>,
    pub year_id: Option<String>,
    pub semester_id: Option<String>,
    pub regulation: Patch<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub category: Option<Category>,
    pub subject: Option<String>,
    pub branch_id: Option<String>,
    pub year_id: Option<String>,
    pub semester_id: Option<String>,
    pub include_archived: bool,
}

impl ResourceFilter {
    pub fn matches(&self, r: &Resource) -> bool {
        if !self.include_archived && r.archived {
            return false;
        }
        if self.category.is_some_and(|c| c != r.category) {
            return false;
        }
        if let Some(ref s) = self.subject {
            if !r.subject.eq_ignore_ascii_case(s.trim()) {
                return false;
            }
        }
        if self.branch_id.as_ref().is_some_and(|b| *b != r.branch_id) {
            return false;
        }
        if self.year_id.as_ref().is_some_and(|y| *y != r.year_id) {
            return false;
        }
        if self.semester_id.as_ref().is_some_and(|s| *s != r.semester_id) {
            return false;
        }
        true
    }
}

// ============================================================================
// Reminders and recent updates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Cancelled,
    Completed,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub icon_type: Option<String>,
    pub status: ReminderStatus,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub description: Patch<String>,
    pub due_date: Option<NaiveDate>,
    pub icon_type: Patch<String>,
    pub status: Option<ReminderStatus>,
    pub branch_id: Patch<String>,
    pub year_id: Patch<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentUpdate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub year_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RecentUpdatePatch {
    pub title: Option<String>,
    pub description: Patch<String>,
    pub date: Option<NaiveDate>,
    pub branch_id: Patch<String>,
    pub year_id: Patch<String>,
}

/// Scope filter shared by reminders and recent updates. Unscoped rows match every scope.
#[derive(Debug, Clone, Default)]
pub struct AudienceFilter {
    pub branch_id: Option<String>,
    pub year_id: Option<String>,
}

impl AudienceFilter {
    pub fn matches(&self, branch_id: Option<&str>, year_id: Option<&str>) -> bool {
        let branch_ok = match (self.branch_id.as_deref(), branch_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        let year_ok = match (self.year_id.as_deref(), year_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        branch_ok && year_ok
    }
}

// ============================================================================
// People
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Lower-cased email, primary key
    pub email: String,
    pub name: String,
    pub roll_number: String,
    pub branch_id: String,
    pub year_id: String,
    pub semester_id: String,
    #[serde(default)]
    pub section: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
    Superadmin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Audit log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Delete,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    Admin,
    Branch,
    Profile,
    RecentUpdate,
    Reminder,
    Resource,
    Semester,
    Year,
}

/// Append-only record of an administrative mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub actor_email: String,
    pub actor_role: Role,
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Storage key: zero-padded microsecond timestamp then id, so keys sort chronologically.
    pub fn storage_key(&self) -> String {
        format!("{:020}-{}", self.created_at.timestamp_micros(), self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity: Option<AuditEntity>,
    pub actor_email: Option<String>,
    pub action: Option<AuditAction>,
}

impl AuditFilter {
    pub fn matches(&self, e: &AuditEntry) -> bool {
        self.entity.is_none_or(|x| x == e.entity)
            && self.action.is_none_or(|x| x == e.action)
            && self
                .actor_email
                .as_ref()
                .is_none_or(|a| a.eq_ignore_ascii_case(&e.actor_email))
    }
}
