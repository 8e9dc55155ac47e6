use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

/// Every primary and index table that stores msgpack values under string keys.
pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("{0} is still referenced")]
    InUse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

/// Row counts, used by purge and by the maintenance `stats` command
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub admins: u64,
    pub audit_logs: u64,
    pub branches: u64,
    pub profiles: u64,
    pub recent_updates: u64,
    pub reminders: u64,
    pub resources: u64,
    pub semesters: u64,
    pub years: u64,
}

const RECORD_TABLES: [RecordTable; 10] = [
    RESOURCES,
    RESOURCE_SCOPES,
    REMINDERS,
    RECENT_UPDATES,
    PROFILES,
    ADMINS,
    BRANCHES,
    YEARS,
    SEMESTERS,
    AUDIT_LOGS,
];

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("pecup.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        // Initialize application tables
        let write_txn = db.begin_write()?;
        {
            for def in RECORD_TABLES {
                let _ = write_txn.open_table(def)?;
            }
            let _ = write_txn.open_table(BRANCH_CODES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Record helpers
    // ========================================================================

    /// Read and decode one record.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        def: RecordTable,
        key: &str,
    ) -> Result<Option<T>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(def)?;

        let value = match table.get(key)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        Ok(value)
    }

    /// Read and decode every record of a table, in key order.
    pub(crate) fn all_records<T: DeserializeOwned>(
        &self,
        def: RecordTable,
    ) -> Result<Vec<T>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(def)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            records.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(records)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Count rows in every primary table
    pub fn stats(&self) -> Result<TableStats, DatabaseError> {
        let read_txn = self.begin_read()?;
        let count = |def: RecordTable| -> Result<u64, DatabaseError> {
            let table = read_txn.open_table(def)?;
            let mut n = 0;
            for result in table.iter()? {
                result?;
                n += 1;
            }
            Ok(n)
        };

        Ok(TableStats {
            admins: count(ADMINS)?,
            audit_logs: count(AUDIT_LOGS)?,
            branches: count(BRANCHES)?,
            profiles: count(PROFILES)?,
            recent_updates: count(RECENT_UPDATES)?,
            reminders: count(REMINDERS)?,
            resources: count(RESOURCES)?,
            semesters: count(SEMESTERS)?,
            years: count(YEARS)?,
        })
    }

    /// Purge all data - for testing and maintenance only
    pub fn purge_all(&self) -> Result<TableStats, DatabaseError> {
        let stats = self.stats()?;

        let write_txn = self.begin_write()?;
        for def in RECORD_TABLES {
            write_txn.delete_table(def)?;
            let _ = write_txn.open_table(def)?;
        }
        write_txn.delete_table(BRANCH_CODES)?;
        let _ = write_txn.open_table(BRANCH_CODES)?;
        write_txn.commit()?;

        Ok(stats)
    }
}

// ============================================================================
// Write-transaction helpers
// ============================================================================

pub(crate) fn txn_get<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: RecordTable,
    key: &str,
) -> Result<Option<T>, DatabaseError> {
    let table = txn.open_table(def)?;
    let value = match table.get(key)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(value)
}

pub(crate) fn txn_put<T: Serialize>(
    txn: &WriteTransaction,
    def: RecordTable,
    key: &str,
    record: &T,
) -> Result<(), DatabaseError> {
    let data = rmp_serde::to_vec_named(record)?;
    let mut table = txn.open_table(def)?;
    table.insert(key, data.as_slice())?;
    Ok(())
}

pub(crate) fn txn_remove(
    txn: &WriteTransaction,
    def: RecordTable,
    key: &str,
) -> Result<bool, DatabaseError> {
    let mut table = txn.open_table(def)?;
    let removed = table.remove(key)?.is_some();
    Ok(removed)
}

/// Decode every record of a table inside a write transaction.
pub(crate) fn txn_all<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: RecordTable,
) -> Result<Vec<T>, DatabaseError> {
    let table = txn.open_table(def)?;
    let mut records = Vec::new();
    for result in table.iter()? {
        let (_, value) = result?;
        records.push(rmp_serde::from_slice(value.value())?);
    }
    Ok(records)
}

/// Add an id to a msgpack id-list index entry.
pub(crate) fn index_add(
    txn: &WriteTransaction,
    def: RecordTable,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut ids: Vec<String> = txn_get(txn, def, key)?.unwrap_or_default();
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
        txn_put(txn, def, key, &ids)?;
    }
    Ok(())
}

/// Remove an id from a msgpack id-list index entry, dropping the entry once empty.
pub(crate) fn index_remove(
    txn: &WriteTransaction,
    def: RecordTable,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    if let Some(mut ids) = txn_get::<Vec<String>>(txn, def, key)? {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            txn_remove(txn, def, key)?;
        } else {
            txn_put(txn, def, key, &ids)?;
        }
    }
    Ok(())
}
