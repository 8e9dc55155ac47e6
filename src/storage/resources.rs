use redb::ReadableTable;

use super::db::{index_add, index_remove, txn_get, txn_put, txn_remove, Database, DatabaseError};
use super::models::{scope_key, Resource, ResourceFilter, ResourcePatch};
use super::tables::*;

impl Database {
    // ========================================================================
    // Resource operations
    // ========================================================================

    /// Store a resource and maintain the scope index
    pub fn put_resource(&self, resource: &Resource) -> Result<(), DatabaseError> {
        debug_assert!(!resource.id.is_empty(), "resource id must not be empty");

        let write_txn = self.begin_write()?;
        {
            // Replacing a record whose scope changed must drop the stale index entry
            if let Some(old) = txn_get::<Resource>(&write_txn, RESOURCES, &resource.id)? {
                if old.scope_key() != resource.scope_key() {
                    index_remove(&write_txn, RESOURCE_SCOPES, &old.scope_key(), &old.id)?;
                }
            }
            txn_put(&write_txn, RESOURCES, &resource.id, resource)?;
            index_add(
                &write_txn,
                RESOURCE_SCOPES,
                &resource.scope_key(),
                &resource.id,
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a resource by its UUID
    pub fn get_resource(&self, id: &str) -> Result<Option<Resource>, DatabaseError> {
        self.get_record(RESOURCES, id)
    }

    /// Get all resources in one branch/year/semester scope via the scope index
    pub fn get_resources_by_scope(
        &self,
        branch_id: &str,
        year_id: &str,
        semester_id: &str,
    ) -> Result<Vec<Resource>, DatabaseError> {
        let ids: Vec<String> = self
            .get_record(RESOURCE_SCOPES, &scope_key(branch_id, year_id, semester_id))?
            .unwrap_or_default();

        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RESOURCES)?;

        let mut resources = Vec::new();
        for id in ids {
            if let Some(data) = table.get(id.as_str())? {
                resources.push(rmp_serde::from_slice(data.value())?);
            }
        }
        Ok(resources)
    }

    /// List resources matching a filter, sorted by subject, unit and name
    pub fn list_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, DatabaseError> {
        let candidates = match (&filter.branch_id, &filter.year_id, &filter.semester_id) {
            (Some(b), Some(y), Some(s)) => self.get_resources_by_scope(b, y, s)?,
            _ => self.all_records(RESOURCES)?,
        };

        let mut resources: Vec<Resource> = candidates
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        resources.sort_by(|a, b| {
            a.subject
                .to_lowercase()
                .cmp(&b.subject.to_lowercase())
                .then(a.unit.cmp(&b.unit))
                .then(a.name.cmp(&b.name))
        });
        Ok(resources)
    }

    /// Distinct subject names among resources matching a filter, sorted case-insensitively
    pub fn list_subjects(&self, filter: &ResourceFilter) -> Result<Vec<String>, DatabaseError> {
        let mut subjects: Vec<String> = Vec::new();
        for resource in self.list_resources(filter)? {
            if !subjects
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&resource.subject))
            {
                subjects.push(resource.subject);
            }
        }
        Ok(subjects)
    }

    /// Apply a partial update. Returns the updated resource, or None if it does not exist.
    pub fn update_resource(
        &self,
        id: &str,
        patch: &ResourcePatch,
    ) -> Result<Option<Resource>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = match txn_get::<Resource>(&write_txn, RESOURCES, id)? {
            Some(mut resource) => {
                let old_scope = resource.scope_key();

                if let Some(category) = patch.category {
                    resource.category = category;
                }
                if let Some(ref subject) = patch.subject {
                    resource.subject = subject.clone();
                }
                if let Some(unit) = patch.unit {
                    resource.unit = unit;
                }
                if let Some(ref name) = patch.name {
                    resource.name = name.clone();
                }
                patch.description.apply_to(&mut resource.description);
                if let Some(ref url) = patch.url {
                    resource.url = Some(url.clone());
                }
                if let Some(ref branch_id) = patch.branch_id {
                    resource.branch_id = branch_id.clone();
                }
                if let Some(ref year_id) = patch.year_id {
                    resource.year_id = year_id.clone();
                }
                if let Some(ref semester_id) = patch.semester_id {
                    resource.semester_id = semester_id.clone();
                }
                patch.regulation.apply_to(&mut resource.regulation);
                if let Some(archived) = patch.archived {
                    resource.archived = archived;
                }
                resource.updated_at = chrono::Utc::now();

                let new_scope = resource.scope_key();
                if new_scope != old_scope {
                    index_remove(&write_txn, RESOURCE_SCOPES, &old_scope, id)?;
                    index_add(&write_txn, RESOURCE_SCOPES, &new_scope, id)?;
                }

                txn_put(&write_txn, RESOURCES, id, &resource)?;
                Some(resource)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a resource and clean up the scope index
    pub fn delete_resource(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let deleted = match txn_get::<Resource>(&write_txn, RESOURCES, id)? {
            Some(resource) => {
                txn_remove(&write_txn, RESOURCES, id)?;
                index_remove(&write_txn, RESOURCE_SCOPES, &resource.scope_key(), id)?;
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }
}
