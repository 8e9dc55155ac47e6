use super::db::{txn_get, txn_put, txn_remove, Database, DatabaseError};
use super::models::{AudienceFilter, RecentUpdate, RecentUpdatePatch, Reminder, ReminderPatch};
use super::tables::*;

impl Database {
    // ========================================================================
    // Reminder operations
    // ========================================================================

    pub fn put_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        txn_put(&write_txn, REMINDERS, &reminder.id, reminder)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, DatabaseError> {
        self.get_record(REMINDERS, id)
    }

    /// List reminders visible to an audience, soonest due first.
    /// Archived reminders are only returned when `include_archived` is set.
    pub fn list_reminders(
        &self,
        audience: &AudienceFilter,
        include_archived: bool,
    ) -> Result<Vec<Reminder>, DatabaseError> {
        let mut reminders: Vec<Reminder> = self
            .all_records::<Reminder>(REMINDERS)?
            .into_iter()
            .filter(|r| include_archived || !r.archived)
            .filter(|r| audience.matches(r.branch_id.as_deref(), r.year_id.as_deref()))
            .collect();

        reminders.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.title.cmp(&b.title)));
        Ok(reminders)
    }

    pub fn update_reminder(
        &self,
        id: &str,
        patch: &ReminderPatch,
    ) -> Result<Option<Reminder>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = match txn_get::<Reminder>(&write_txn, REMINDERS, id)? {
            Some(mut reminder) => {
                if let Some(ref title) = patch.title {
                    reminder.title = title.clone();
                }
                patch.description.apply_to(&mut reminder.description);
                if let Some(due_date) = patch.due_date {
                    reminder.due_date = due_date;
                }
                patch.icon_type.apply_to(&mut reminder.icon_type);
                if let Some(status) = patch.status {
                    reminder.status = status;
                }
                patch.branch_id.apply_to(&mut reminder.branch_id);
                patch.year_id.apply_to(&mut reminder.year_id);
                if let Some(archived) = patch.archived {
                    reminder.archived = archived;
                }
                reminder.updated_at = chrono::Utc::now();

                txn_put(&write_txn, REMINDERS, id, &reminder)?;
                Some(reminder)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    pub fn delete_reminder(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = txn_remove(&write_txn, REMINDERS, id)?;
        write_txn.commit()?;
        Ok(deleted)
    }

    // ========================================================================
    // Recent update operations
    // ========================================================================

    pub fn put_recent_update(&self, update: &RecentUpdate) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        txn_put(&write_txn, RECENT_UPDATES, &update.id, update)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_recent_update(&self, id: &str) -> Result<Option<RecentUpdate>, DatabaseError> {
        self.get_record(RECENT_UPDATES, id)
    }

    /// List recent updates visible to an audience, newest first
    pub fn list_recent_updates(
        &self,
        audience: &AudienceFilter,
    ) -> Result<Vec<RecentUpdate>, DatabaseError> {
        let mut updates: Vec<RecentUpdate> = self
            .all_records::<RecentUpdate>(RECENT_UPDATES)?
            .into_iter()
            .filter(|u| audience.matches(u.branch_id.as_deref(), u.year_id.as_deref()))
            .collect();

        updates.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(updates)
    }

    pub fn update_recent_update(
        &self,
        id: &str,
        patch: &RecentUpdatePatch,
    ) -> Result<Option<RecentUpdate>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let updated = match txn_get::<RecentUpdate>(&write_txn, RECENT_UPDATES, id)? {
            Some(mut update) => {
                if let Some(ref title) = patch.title {
                    update.title = title.clone();
                }
                patch.description.apply_to(&mut update.description);
                if let Some(date) = patch.date {
                    update.date = date;
                }
                patch.branch_id.apply_to(&mut update.branch_id);
                patch.year_id.apply_to(&mut update.year_id);
                update.updated_at = chrono::Utc::now();

                txn_put(&write_txn, RECENT_UPDATES, id, &update)?;
                Some(update)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    pub fn delete_recent_update(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = txn_remove(&write_txn, RECENT_UPDATES, id)?;
        write_txn.commit()?;
        Ok(deleted)
    }
}
