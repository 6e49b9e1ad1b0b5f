//! Durable storage of the current username.
//!
//! One key, one value. Read once at startup, written on join, cleared on
//! leave. Implementations are cheap to clone and share their backing storage.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;

/// Single-key username persistence.
pub trait IdentityStore: Clone + Send + Sync + 'static {
    /// Persisted username, if any.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotAvailable` if the backing storage is inaccessible
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Persist `username` (trimmed), replacing any prior value.
    ///
    /// # Errors
    ///
    /// - `StoreError::EmptyUsername` if `username` is blank
    /// - `StoreError::NotAvailable` if the backing storage is inaccessible
    fn write(&self, username: &str) -> Result<(), StoreError>;

    /// Remove the persisted username. Idempotent.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotAvailable` if the backing storage is inaccessible
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    value: Option<String>,
    available: bool,
    writes: usize,
}

/// In-memory store. Clones share state.
///
/// Availability can be switched off to exercise the degraded paths.
#[derive(Debug, Clone)]
pub struct MemoryIdentityStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityStore {
    /// Empty, available store.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner { available: true, ..MemoryInner::default() })) }
    }

    /// Store that already holds `username`.
    pub fn with_username(username: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.value = Some(username.into());
        }
        store
    }

    /// Make every operation fail with `NotAvailable` (or succeed again).
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.available = available;
        }
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or_default()
    }

    /// Current value without the availability check.
    pub fn peek(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.value.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::NotAvailable("store lock poisoned".to_string()))?;
        if !inner.available {
            return Err(StoreError::NotAvailable("storage disabled".to_string()));
        }
        Ok(inner)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.value.clone())
    }

    fn write(&self, username: &str) -> Result<(), StoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        let mut inner = self.lock()?;
        inner.value = Some(username.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock()?.value = None;
        Ok(())
    }
}
