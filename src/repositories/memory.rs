//! In-memory stores mirroring the PostgreSQL semantics, for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{content::Content, license::License, session_key::SessionKeyRecord};
use crate::repositories::{
    content::ContentStore, license::LicenseStore, session_key::SessionKeyStore,
};

#[derive(Clone, Default)]
pub struct MemoryLicenseStore {
    rows: Arc<Mutex<Vec<License>>>,
}

impl MemoryLicenseStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    async fn insert(&self, license: &License) -> Result<()> {
        self.rows.lock().unwrap().push(license.clone());
        Ok(())
    }

    async fn find_latest(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<License>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|l| l.user_id == user_id && l.content_id == content_id)
            .max_by_key(|l| l.expires_at)
            .cloned())
    }

    async fn find_by_id(&self, license_id: Uuid) -> Result<Option<License>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|l| l.id == license_id).cloned())
    }

    async fn delete(&self, license_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|l| l.id != license_id);
        Ok(rows.len() < before)
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionKeyStore {
    rows: Arc<Mutex<HashMap<(Uuid, Uuid), SessionKeyRecord>>>,
    fail_deletes: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySessionKeyStore {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, user_id: Uuid, content_id: Uuid) -> Option<SessionKeyRecord> {
        self.rows.lock().unwrap().get(&(user_id, content_id)).cloned()
    }

    /// Writes a row directly, bypassing the expiry guard.
    pub fn put_raw(&self, record: SessionKeyRecord) {
        self.rows
            .lock()
            .unwrap()
            .insert((record.user_id, record.content_id), record);
    }
}

#[async_trait]
impl SessionKeyStore for MemorySessionKeyStore {
    async fn find(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<SessionKeyRecord>> {
        Ok(self.get(user_id, content_id))
    }

    async fn delete(&self, key_id: Uuid) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected delete failure".to_string()));
        }
        self.rows.lock().unwrap().retain(|_, r| r.id != key_id);
        Ok(())
    }

    async fn upsert(&self, record: &SessionKeyRecord) -> Result<SessionKeyRecord> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected write failure".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let slot = (record.user_id, record.content_id);
        match rows.get(&slot) {
            Some(existing) if existing.expires_at > record.created_at => Ok(existing.clone()),
            _ => {
                rows.insert(slot, record.clone());
                Ok(record.clone())
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryContentStore {
    rows: Arc<Mutex<Vec<Content>>>,
}

impl MemoryContentStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert(&self, content: &Content) -> Result<()> {
        self.rows.lock().unwrap().push(content.clone());
        Ok(())
    }

    async fn find_by_id(&self, content_id: Uuid) -> Result<Option<Content>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|c| c.id == content_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Content>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
