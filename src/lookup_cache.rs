//! Memoization of the small lookup tables (branches, years, semesters).
//!
//! Whole-table lists and per-id labels are cached in an LRU behind a tokio
//! `RwLock`. Entries expire after a TTL, and any admin mutation of a lookup
//! table calls [`LookupCache::invalidate`].

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::storage::models::{Branch, Semester, Year};
use crate::storage::{Database, DatabaseError};

/// Bounds the number of per-id labels kept alongside the three table lists.
const MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Branch,
    Semester,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Table(LookupKind),
    Label(LookupKind, String),
}

#[derive(Debug, Clone)]
enum CachedValue {
    Branches(Arc<Vec<Branch>>),
    Years(Arc<Vec<Year>>),
    Semesters(Arc<Vec<Semester>>),
    Label(Option<LookupLabel>),
}

/// Display form of a lookup row, joined into resource and profile responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LookupLabel {
    Branch { code: String, name: String },
    Semester { semester_number: u8 },
    Year { batch_year: i32, display_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Entry {
    value: CachedValue,
    loaded_at: Instant,
}

pub struct LookupCache {
    db: Database,
    entries: RwLock<LruCache<CacheKey, Entry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LookupCache {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            entries: RwLock::new(LruCache::new(
                NonZeroUsize::new(MAX_ENTRIES).expect("MAX_ENTRIES is non-zero"),
            )),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.entries.write().await;
        let fresh = match entries.get(key) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => None,
            None => None,
        };
        match fresh {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                entries.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn store(&self, key: CacheKey, value: CachedValue) {
        let mut entries = self.entries.write().await;
        entries.put(
            key,
            Entry {
                value,
                loaded_at: Instant::now(),
            },
        );
    }

    pub async fn branches(&self) -> Result<Arc<Vec<Branch>>, DatabaseError> {
        let key = CacheKey::Table(LookupKind::Branch);
        if let Some(CachedValue::Branches(list)) = self.lookup(&key).await {
            return Ok(list);
        }
        let list = Arc::new(self.db.list_branches()?);
        self.store(key, CachedValue::Branches(Arc::clone(&list))).await;
        Ok(list)
    }

    pub async fn years(&self) -> Result<Arc<Vec<Year>>, DatabaseError> {
        let key = CacheKey::Table(LookupKind::Year);
        if let Some(CachedValue::Years(list)) = self.lookup(&key).await {
            return Ok(list);
        }
        let list = Arc::new(self.db.list_years()?);
        self.store(key, CachedValue::Years(Arc::clone(&list))).await;
        Ok(list)
    }

    pub async fn semesters(&self) -> Result<Arc<Vec<Semester>>, DatabaseError> {
        let key = CacheKey::Table(LookupKind::Semester);
        if let Some(CachedValue::Semesters(list)) = self.lookup(&key).await {
            return Ok(list);
        }
        let list = Arc::new(self.db.list_semesters()?);
        self.store(key, CachedValue::Semesters(Arc::clone(&list))).await;
        Ok(list)
    }

    /// Resolve the display label of one lookup row. Unknown ids are cached as misses too.
    pub async fn label(
        &self,
        kind: LookupKind,
        id: &str,
    ) -> Result<Option<LookupLabel>, DatabaseError> {
        let key = CacheKey::Label(kind, id.to_string());
        if let Some(CachedValue::Label(label)) = self.lookup(&key).await {
            return Ok(label);
        }

        let label = match kind {
            LookupKind::Branch => self.db.get_branch(id)?.map(|b| LookupLabel::Branch {
                code: b.code,
                name: b.name,
            }),
            LookupKind::Year => self.db.get_year(id)?.map(|y| LookupLabel::Year {
                batch_year: y.batch_year,
                display_name: y.display_name,
            }),
            LookupKind::Semester => self.db.get_semester(id)?.map(|s| LookupLabel::Semester {
                semester_number: s.semester_number,
            }),
        };

        self.store(key, CachedValue::Label(label.clone())).await;
        Ok(label)
    }

    /// Drop everything. Called after any branch, year or semester mutation.
    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        tracing::debug!("Lookup cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn branch(id: &str, code: &str) -> Branch {
        Branch {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("{code} department"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lists_are_memoized_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let cache = LookupCache::new(db.clone(), Duration::from_secs(60));

        db.put_branch(&branch("b1", "CSE")).unwrap();
        assert_eq!(cache.branches().await.unwrap().len(), 1);

        // Served from cache: the new row is not visible yet
        db.put_branch(&branch("b2", "ECE")).unwrap();
        assert_eq!(cache.branches().await.unwrap().len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });

        cache.invalidate().await;
        assert_eq!(cache.branches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let cache = LookupCache::new(db.clone(), Duration::ZERO);

        db.put_branch(&branch("b1", "CSE")).unwrap();
        assert_eq!(cache.branches().await.unwrap().len(), 1);
        db.put_branch(&branch("b2", "ECE")).unwrap();
        assert_eq!(cache.branches().await.unwrap().len(), 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_label_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let cache = LookupCache::new(db.clone(), Duration::from_secs(60));

        db.put_branch(&branch("b1", "CSE")).unwrap();

        let label = cache.label(LookupKind::Branch, "b1").await.unwrap();
        assert_eq!(
            label,
            Some(LookupLabel::Branch {
                code: "CSE".to_string(),
                name: "CSE department".to_string()
            })
        );
        assert_eq!(cache.label(LookupKind::Year, "nope").await.unwrap(), None);
    }
}
