use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{AuditEntry, AuditFilter};
use super::tables::*;

impl Database {
    // ========================================================================
    // Audit log operations
    // ========================================================================

    /// Append an entry. Audit rows are never rewritten.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        let data = rmp_serde::to_vec_named(entry)?;

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_LOGS)?;
            table.insert(entry.storage_key().as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Page through matching entries, newest first. Returns the page and the total match count.
    pub fn list_audit(
        &self,
        filter: &AuditFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<AuditEntry>, u64), DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOGS)?;

        let mut page = Vec::new();
        let mut total = 0u64;
        for result in table.iter()?.rev() {
            let (_, value) = result?;
            let entry: AuditEntry = rmp_serde::from_slice(value.value())?;
            if !filter.matches(&entry) {
                continue;
            }
            if total as usize >= offset && page.len() < limit {
                page.push(entry);
            }
            total += 1;
        }

        Ok((page, total))
    }

    /// Remove entries created before the cutoff. Returns how many were removed.
    pub fn prune_audit(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let cutoff = format!("{:020}", older_than.timestamp_micros());

        let write_txn = self.begin_write()?;
        let removed = {
            let table = write_txn.open_table(AUDIT_LOGS)?;
            let keys: Vec<String> = table
                .range::<&str>(..cutoff.as_str())?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            drop(table);

            let mut table = write_txn.open_table(AUDIT_LOGS)?;
            for key in &keys {
                table.remove(key.as_str())?;
            }
            keys.len() as u64
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
