//! In-memory store used by unit and router tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use uuid::Uuid;

use super::{
    AttendanceLog, CredentialStore, FacilityDirectory, PrincipalDirectory, Store, StoreError,
    cooldown_window,
};
use crate::models::{
    attendance::{AttendanceRecord, NewAttendanceRecord},
    credential::{FacilityCredential, NewFacilityCredential},
    facility::Facility,
    principal::Identity,
};

#[derive(Debug, Default)]
struct Tables {
    facilities: Vec<Facility>,
    credentials: Vec<FacilityCredential>,
    attendance: Vec<AttendanceRecord>,
    principals: HashMap<String, Identity>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// When set, every access fails as if the database were down.
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_facility(&self, name: &str) -> Facility {
        let facility = Facility {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: "Main campus".to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().facilities.push(facility.clone());
        facility
    }

    pub fn remove_facility(&self, facility_id: Uuid) {
        self.tables
            .lock()
            .unwrap()
            .facilities
            .retain(|f| f.id != facility_id);
    }

    pub fn add_principal(&self, key_hash: &str, identity: Identity) {
        self.tables
            .lock()
            .unwrap()
            .principals
            .insert(key_hash.to_string(), identity);
    }

    pub fn credentials(&self) -> Vec<FacilityCredential> {
        self.tables.lock().unwrap().credentials.clone()
    }

    pub fn attendance(&self) -> Vec<AttendanceRecord> {
        self.tables.lock().unwrap().attendance.clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(self.tables.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(
        &self,
        credential: &NewFacilityCredential,
    ) -> Result<FacilityCredential, StoreError> {
        let row = FacilityCredential {
            id: Uuid::new_v4(),
            facility_id: credential.facility_id,
            token: credential.token.clone(),
            valid_from: credential.valid_from,
            valid_until: credential.valid_until,
            created_at: credential.valid_from,
        };
        self.tables()?.credentials.push(row.clone());
        Ok(row)
    }

    async fn credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<FacilityCredential>, StoreError> {
        Ok(self
            .tables()?
            .credentials
            .iter()
            .find(|c| c.token == token)
            .cloned())
    }
}

#[async_trait::async_trait]
impl AttendanceLog for MemoryStore {
    async fn latest_scan(
        &self,
        student_id: Uuid,
        facility_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .tables()?
            .attendance
            .iter()
            .filter(|r| r.student_id == student_id && r.facility_id == facility_id)
            .max_by_key(|r| r.scanned_at)
            .cloned())
    }

    async fn append_outside_cooldown(
        &self,
        record: &NewAttendanceRecord,
        cooldown: chrono::Duration,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let (window_start, window_end) = cooldown_window(record.scanned_at, cooldown);
        let mut tables = self.tables()?;

        let conflicting = tables.attendance.iter().any(|r| {
            r.student_id == record.student_id
                && r.facility_id == record.facility_id
                && r.scanned_at > window_start
                && r.scanned_at < window_end
        });
        if conflicting {
            return Ok(None);
        }

        let row = AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: record.student_id,
            facility_id: record.facility_id,
            scanned_at: record.scanned_at,
        };
        tables.attendance.push(row.clone());
        Ok(Some(row))
    }
}

#[async_trait::async_trait]
impl FacilityDirectory for MemoryStore {
    async fn facility_exists(&self, facility_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables()?.facilities.iter().any(|f| f.id == facility_id))
    }

    async fn get_facility(&self, facility_id: Uuid) -> Result<Option<Facility>, StoreError> {
        Ok(self
            .tables()?
            .facilities
            .iter()
            .find(|f| f.id == facility_id)
            .cloned())
    }

    async fn list_facilities(&self) -> Result<Vec<Facility>, StoreError> {
        let mut facilities = self.tables()?.facilities.clone();
        facilities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(facilities)
    }

    async fn create_facility(&self, name: &str, location: &str) -> Result<Facility, StoreError> {
        let facility = Facility {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: location.to_string(),
            created_at: Utc::now(),
        };
        self.tables()?.facilities.push(facility.clone());
        Ok(facility)
    }
}

#[async_trait::async_trait]
impl PrincipalDirectory for MemoryStore {
    async fn identity_by_key_hash(&self, key_hash: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables()?.principals.get(key_hash).copied())
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.tables().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outage_switch_fails_and_restores_access() {
        let store = MemoryStore::new();
        let facility = store.add_facility("Library");

        store.set_unavailable(true);
        assert!(matches!(
            store.facility_exists(facility.id).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.facility_exists(facility.id).await.unwrap());
    }
}
