use redb::{ReadableTable, WriteTransaction};

use super::db::{txn_all, txn_get, txn_put, txn_remove, Database, DatabaseError};
use super::models::{Branch, Profile, RecentUpdate, Reminder, Resource, Semester, Year};
use super::tables::*;

impl Database {
    // ========================================================================
    // Branch operations
    // ========================================================================

    /// Store a branch and its code index entry
    pub fn put_branch(&self, branch: &Branch) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            if let Some(old) = txn_get::<Branch>(&write_txn, BRANCHES, &branch.id)? {
                if old.code != branch.code {
                    let mut codes = write_txn.open_table(BRANCH_CODES)?;
                    codes.remove(old.code.as_str())?;
                }
            }
            txn_put(&write_txn, BRANCHES, &branch.id, branch)?;
            let mut codes = write_txn.open_table(BRANCH_CODES)?;
            codes.insert(branch.code.as_str(), branch.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_branch(&self, id: &str) -> Result<Option<Branch>, DatabaseError> {
        self.get_record(BRANCHES, id)
    }

    /// Resolve a branch by its code (case-insensitive)
    pub fn get_branch_by_code(&self, code: &str) -> Result<Option<Branch>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let codes = read_txn.open_table(BRANCH_CODES)?;

        let id = match codes.get(code.to_uppercase().as_str())? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };
        drop(codes);
        drop(read_txn);

        self.get_branch(&id)
    }

    pub fn branch_code_exists(&self, code: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let codes = read_txn.open_table(BRANCH_CODES)?;
        let exists = codes.get(code.to_uppercase().as_str())?.is_some();
        Ok(exists)
    }

    /// All branches sorted by code
    pub fn list_branches(&self) -> Result<Vec<Branch>, DatabaseError> {
        let mut branches: Vec<Branch> = self.all_records(BRANCHES)?;
        branches.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(branches)
    }

    /// Delete a branch. Fails with `InUse` while any resource, profile or notice references it.
    pub fn delete_branch(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let deleted = match txn_get::<Branch>(&write_txn, BRANCHES, id)? {
            Some(branch) => {
                if branch_referenced(&write_txn, id)? {
                    return Err(DatabaseError::InUse(format!("branch {}", branch.code)));
                }
                txn_remove(&write_txn, BRANCHES, id)?;
                let mut codes = write_txn.open_table(BRANCH_CODES)?;
                codes.remove(branch.code.as_str())?;
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    // ========================================================================
    // Year operations
    // ========================================================================

    pub fn put_year(&self, year: &Year) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        txn_put(&write_txn, YEARS, &year.id, year)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_year(&self, id: &str) -> Result<Option<Year>, DatabaseError> {
        self.get_record(YEARS, id)
    }

    /// Check whether a batch year is already taken, optionally ignoring one year id
    pub fn year_exists(
        &self,
        batch_year: i32,
        except_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        Ok(self
            .list_years()?
            .iter()
            .any(|y| y.batch_year == batch_year && Some(y.id.as_str()) != except_id))
    }

    /// All years, most recent batch first
    pub fn list_years(&self) -> Result<Vec<Year>, DatabaseError> {
        let mut years: Vec<Year> = self.all_records(YEARS)?;
        years.sort_by(|a, b| b.batch_year.cmp(&a.batch_year));
        Ok(years)
    }

    pub fn delete_year(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let deleted = match txn_get::<Year>(&write_txn, YEARS, id)? {
            Some(year) => {
                if year_referenced(&write_txn, id)? {
                    return Err(DatabaseError::InUse(format!("year {}", year.batch_year)));
                }
                txn_remove(&write_txn, YEARS, id)?
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    // ========================================================================
    // Semester operations
    // ========================================================================

    /// Store a semester. Moving it to another year fails with `InUse` while it is referenced.
    pub fn put_semester(&self, semester: &Semester) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        if let Some(old) = txn_get::<Semester>(&write_txn, SEMESTERS, &semester.id)? {
            if old.year_id != semester.year_id && semester_referenced(&write_txn, &semester.id)? {
                return Err(DatabaseError::InUse(format!(
                    "semester {}",
                    old.semester_number
                )));
            }
        }
        txn_put(&write_txn, SEMESTERS, &semester.id, semester)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_semester(&self, id: &str) -> Result<Option<Semester>, DatabaseError> {
        self.get_record(SEMESTERS, id)
    }

    /// Check whether (year, number) is already taken, optionally ignoring one semester id
    pub fn semester_exists(
        &self,
        year_id: &str,
        semester_number: u8,
        except_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        Ok(self.list_semesters()?.iter().any(|s| {
            s.year_id == year_id
                && s.semester_number == semester_number
                && Some(s.id.as_str()) != except_id
        }))
    }

    /// All semesters grouped by year then number
    pub fn list_semesters(&self) -> Result<Vec<Semester>, DatabaseError> {
        let mut semesters: Vec<Semester> = self.all_records(SEMESTERS)?;
        semesters.sort_by(|a, b| {
            a.year_id
                .cmp(&b.year_id)
                .then(a.semester_number.cmp(&b.semester_number))
        });
        Ok(semesters)
    }

    pub fn delete_semester(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let deleted = match txn_get::<Semester>(&write_txn, SEMESTERS, id)? {
            Some(semester) => {
                if semester_referenced(&write_txn, id)? {
                    return Err(DatabaseError::InUse(format!(
                        "semester {}",
                        semester.semester_number
                    )));
                }
                txn_remove(&write_txn, SEMESTERS, id)?
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }
}

// ============================================================================
// Reference checks
// ============================================================================

fn branch_referenced(txn: &WriteTransaction, id: &str) -> Result<bool, DatabaseError> {
    let resources: Vec<Resource> = txn_all(txn, RESOURCES)?;
    if resources.iter().any(|r| r.branch_id == id) {
        return Ok(true);
    }
    let profiles: Vec<Profile> = txn_all(txn, PROFILES)?;
    if profiles.iter().any(|p| p.branch_id == id) {
        return Ok(true);
    }
    let reminders: Vec<Reminder> = txn_all(txn, REMINDERS)?;
    if reminders.iter().any(|r| r.branch_id.as_deref() == Some(id)) {
        return Ok(true);
    }
    let updates: Vec<RecentUpdate> = txn_all(txn, RECENT_UPDATES)?;
    Ok(updates.iter().any(|u| u.branch_id.as_deref() == Some(id)))
}

fn year_referenced(txn: &WriteTransaction, id: &str) -> Result<bool, DatabaseError> {
    let semesters: Vec<Semester> = txn_all(txn, SEMESTERS)?;
    if semesters.iter().any(|s| s.year_id == id) {
        return Ok(true);
    }
    let resources: Vec<Resource> = txn_all(txn, RESOURCES)?;
    if resources.iter().any(|r| r.year_id == id) {
        return Ok(true);
    }
    let profiles: Vec<Profile> = txn_all(txn, PROFILES)?;
    if profiles.iter().any(|p| p.year_id == id) {
        return Ok(true);
    }
    let reminders: Vec<Reminder> = txn_all(txn, REMINDERS)?;
    if reminders.iter().any(|r| r.year_id.as_deref() == Some(id)) {
        return Ok(true);
    }
    let updates: Vec<RecentUpdate> = txn_all(txn, RECENT_UPDATES)?;
    Ok(updates.iter().any(|u| u.year_id.as_deref() == Some(id)))
}

fn semester_referenced(txn: &WriteTransaction, id: &str) -> Result<bool, DatabaseError> {
    let resources: Vec<Resource> = txn_all(txn, RESOURCES)?;
    if resources.iter().any(|r| r.semester_id == id) {
        return Ok(true);
    }
    let profiles: Vec<Profile> = txn_all(txn, PROFILES)?;
    Ok(profiles.iter().any(|p| p.semester_id == id))
}
