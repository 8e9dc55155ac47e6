use super::db::{txn_put, txn_remove, Database, DatabaseError};
use super::models::{Admin, Profile};
use super::tables::*;

impl Database {
    // ========================================================================
    // Profile operations
    // ========================================================================

    /// Insert or replace a student profile, keyed by lower-cased email
    pub fn put_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        txn_put(&write_txn, PROFILES, &profile.email.to_lowercase(), profile)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_profile(&self, email: &str) -> Result<Option<Profile>, DatabaseError> {
        self.get_record(PROFILES, &email.to_lowercase())
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError> {
        self.all_records(PROFILES)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    pub fn put_admin(&self, admin: &Admin) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        txn_put(&write_txn, ADMINS, &admin.email.to_lowercase(), admin)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_admin(&self, email: &str) -> Result<Option<Admin>, DatabaseError> {
        self.get_record(ADMINS, &email.to_lowercase())
    }

    /// All admins sorted by email
    pub fn list_admins(&self) -> Result<Vec<Admin>, DatabaseError> {
        let mut admins: Vec<Admin> = self.all_records(ADMINS)?;
        admins.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(admins)
    }

    pub fn delete_admin(&self, email: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = txn_remove(&write_txn, ADMINS, &email.to_lowercase())?;
        write_txn.commit()?;
        Ok(deleted)
    }
}
