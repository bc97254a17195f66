use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calsync_core::{AccessGrants, EventStore, SessionService, SyncRecordStore};
use calsync_domain::{
    AppliedChanges, CalSyncError, EventChange, ProviderEvent, ResourceType,
    Result as DomainResult, SyncRecord,
};
use chrono::{DateTime, Utc};

/// In-memory mock for `SyncRecordStore`.
///
/// Enforces the same validation as the SQLite adapter so invariant tests can
/// rely on it.
#[derive(Default, Clone)]
pub struct InMemorySyncRecordStore {
    records: Arc<Mutex<Vec<SyncRecord>>>,
}

fn same_key(
    record: &SyncRecord,
    user_id: &str,
    resource_type: ResourceType,
    calendar_id: Option<&str>,
) -> bool {
    record.user_id == user_id
        && record.resource_type == resource_type
        && record.calendar_id.as_deref() == calendar_id
}

impl InMemorySyncRecordStore {
    /// Seed a record directly, bypassing the port.
    pub fn seed(&self, record: SyncRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn all(&self) -> Vec<SyncRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn events_record(&self, user_id: &str, calendar_id: &str) -> Option<SyncRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| same_key(r, user_id, ResourceType::Events, Some(calendar_id)))
            .cloned()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<SyncRecord> {
        self.records.lock().unwrap().iter().filter(|r| r.user_id == user_id).cloned().collect()
    }
}

#[async_trait]
impl SyncRecordStore for InMemorySyncRecordStore {
    async fn get(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
    ) -> DomainResult<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| same_key(r, user_id, resource_type, calendar_id))
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        resource_type: ResourceType,
    ) -> DomainResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && r.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn list_all(&self, resource_type: ResourceType) -> DomainResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn find_by_channel_id(&self, channel_id: &str) -> DomainResult<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.channel_id.as_deref() == Some(channel_id))
            .cloned())
    }

    /// Latest updated record wins, later entries on ties, like the SQLite
    /// adapter's `ORDER BY updated_at DESC`.
    async fn find_by_resource_id(&self, resource_id: &str) -> DomainResult<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_id.as_deref() == Some(resource_id))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn save_watch(&self, record: &SyncRecord) -> DomainResult<SyncRecord> {
        record.validate()?;
        let mut stored = record.clone();
        stored.updated_at = Some(Utc::now());

        let mut records = self.records.lock().unwrap();
        let key = (record.user_id.as_str(), record.resource_type, record.calendar_id.as_deref());
        match records.iter_mut().find(|r| same_key(r, key.0, key.1, key.2)) {
            Some(existing) => *existing = stored.clone(),
            None => records.push(stored.clone()),
        }
        Ok(stored)
    }

    async fn update_sync_token(
        &self,
        user_id: &str,
        resource_type: ResourceType,
        calendar_id: Option<&str>,
        sync_token: &str,
    ) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) =
            records.iter_mut().find(|r| same_key(r, user_id, resource_type, calendar_id))
        {
            existing.sync_token = Some(sync_token.to_owned());
            existing.updated_at = Some(Utc::now());
            return Ok(());
        }

        let mut record = match calendar_id {
            Some(calendar_id) => SyncRecord::events(user_id, calendar_id),
            None => SyncRecord::calendar_list(user_id),
        };
        record.resource_type = resource_type;
        record.sync_token = Some(sync_token.to_owned());
        records.push(record);
        Ok(())
    }

    async fn update_refreshed_at(
        &self,
        user_id: &str,
        calendar_id: &str,
        refreshed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records
            .iter_mut()
            .find(|r| same_key(r, user_id, ResourceType::Events, Some(calendar_id)))
        {
            existing.refreshed_at = Some(refreshed_at);
        }
        Ok(())
    }

    async fn clear_watch(&self, user_id: &str, channel_id: &str) -> DomainResult<bool> {
        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.channel_id.as_deref() == Some(channel_id))
        {
            Some(existing) => {
                existing.clear_channel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all_for_user(&self, user_id: &str) -> DomainResult<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.user_id != user_id);
        Ok(before - records.len())
    }
}

/// In-memory mock for `EventStore`, keyed by (user, calendar).
#[derive(Default, Clone)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<HashMap<(String, String), HashMap<String, ProviderEvent>>>>,
    applied: Arc<Mutex<Vec<(String, String, Vec<EventChange>)>>>,
    fail_writes: Arc<AtomicBool>,
}

fn apply_to(
    calendar: &mut HashMap<String, ProviderEvent>,
    changes: &[EventChange],
) -> AppliedChanges {
    let mut applied = AppliedChanges::default();
    for change in changes {
        match change {
            EventChange::Upsert(event) => {
                calendar.insert(event.id.clone(), event.clone());
                applied.upserted += 1;
            }
            EventChange::Delete { event_id } => {
                if calendar.remove(event_id).is_some() {
                    applied.deleted += 1;
                }
            }
        }
    }
    applied
}

impl InMemoryEventStore {
    /// Make every later write fail, leaving stored events untouched.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn record_call(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CalSyncError::Database("database is locked".into()));
        }
        self.applied.lock().unwrap().push((
            user_id.to_owned(),
            calendar_id.to_owned(),
            changes.to_vec(),
        ));
        Ok(())
    }

    pub fn event_ids(&self, user_id: &str, calendar_id: &str) -> Vec<String> {
        let events = self.events.lock().unwrap();
        let mut ids: Vec<String> = events
            .get(&(user_id.to_owned(), calendar_id.to_owned()))
            .map(|calendar| calendar.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Every change set written by `bulk_apply` or `replace_calendar`, in
    /// call order.
    pub fn applied(&self) -> Vec<(String, String, Vec<EventChange>)> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn bulk_apply(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> DomainResult<AppliedChanges> {
        self.record_call(user_id, calendar_id, changes)?;
        let mut events = self.events.lock().unwrap();
        let calendar = events.entry((user_id.to_owned(), calendar_id.to_owned())).or_default();
        Ok(apply_to(calendar, changes))
    }

    async fn replace_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        changes: &[EventChange],
    ) -> DomainResult<AppliedChanges> {
        self.record_call(user_id, calendar_id, changes)?;
        let mut calendar = HashMap::new();
        let applied = apply_to(&mut calendar, changes);
        self.events.lock().unwrap().insert((user_id.to_owned(), calendar_id.to_owned()), calendar);
        Ok(applied)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> DomainResult<usize> {
        let mut events = self.events.lock().unwrap();
        let mut deleted = 0;
        events.retain(|(user, _), calendar| {
            if user == user_id {
                deleted += calendar.len();
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}

/// Records which users had their sessions revoked.
#[derive(Default, Clone)]
pub struct RecordingSessions {
    revoked: Arc<Mutex<Vec<String>>>,
}

impl RecordingSessions {
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionService for RecordingSessions {
    async fn revoke_sessions_by_user(&self, user_id: &str) -> DomainResult<usize> {
        self.revoked.lock().unwrap().push(user_id.to_owned());
        Ok(1)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryGrants {
    revoked: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryGrants {
    pub fn flag(&self, user_id: &str) {
        self.revoked.lock().unwrap().insert(user_id.to_owned());
    }

    pub fn is_revoked(&self, user_id: &str) -> bool {
        self.revoked.lock().unwrap().contains(user_id)
    }
}

#[async_trait]
impl AccessGrants for InMemoryGrants {
    async fn revoked_users(&self) -> DomainResult<Vec<String>> {
        Ok(self.revoked.lock().unwrap().iter().cloned().collect())
    }

    async fn mark_revoked(&self, user_id: &str) -> DomainResult<()> {
        self.flag(user_id);
        Ok(())
    }
}
