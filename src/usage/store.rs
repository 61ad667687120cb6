//! Usage Store
//!
//! Persistence seams for generation records and account subscription state,
//! plus in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record::GenerationRecord;

/// Error types for store operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of [`GenerationStore::insert_if_below`]
///
/// `used` is the owner's count in the period before the attempted insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalInsert {
    Inserted { used: u32 },
    Full { used: u32 },
}

impl ConditionalInsert {
    pub fn is_inserted(&self) -> bool {
        matches!(self, ConditionalInsert::Inserted { .. })
    }
}

/// Storage for generation records
#[async_trait]
pub trait GenerationStore: Send + Sync + std::fmt::Debug {
    /// Count the owner's records created at or after `since`
    async fn count_since(&self, owner_id: &str, since: DateTime<Utc>) -> Result<u32, StoreError>;

    /// Persist a record
    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError>;

    /// Persist a record only if the owner has fewer than `limit` records
    /// since `since`, checked and written as one step.
    async fn insert_if_below(
        &self,
        record: GenerationRecord,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<ConditionalInsert, StoreError>;

    /// All of the owner's records, newest first
    async fn list(&self, owner_id: &str) -> Result<Vec<GenerationRecord>, StoreError>;

    /// Delete one of the owner's records; `false` if it does not exist
    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, StoreError>;
}

/// Read access to account subscription state
#[async_trait]
pub trait AccountStore: Send + Sync + std::fmt::Debug {
    /// Whether the owner has an active paid subscription
    async fn subscription_active(&self, owner_id: &str) -> Result<bool, StoreError>;
}

/// Toggle used by the in-memory stores to simulate an outage
#[derive(Debug, Clone, Default)]
struct Availability(Arc<AtomicBool>);

impl Availability {
    fn check(&self) -> Result<(), StoreError> {
        if self.0.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn set_unavailable(&self, unavailable: bool) {
        self.0.store(unavailable, Ordering::SeqCst);
    }
}

/// In-memory generation store keyed by owner
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenerationStore {
    records: Arc<RwLock<HashMap<String, Vec<GenerationRecord>>>>,
    availability: Availability,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until toggled back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }

    fn count_in(records: Option<&Vec<GenerationRecord>>, since: DateTime<Utc>) -> u32 {
        records
            .map(|rs| rs.iter().filter(|r| r.created_at >= since).count())
            .unwrap_or(0) as u32
    }
}

#[async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn count_since(&self, owner_id: &str, since: DateTime<Utc>) -> Result<u32, StoreError> {
        self.availability.check()?;
        let records = self.records.read().await;
        Ok(Self::count_in(records.get(owner_id), since))
    }

    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError> {
        self.availability.check()?;
        let mut records = self.records.write().await;
        records
            .entry(record.owner_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn insert_if_below(
        &self,
        record: GenerationRecord,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<ConditionalInsert, StoreError> {
        self.availability.check()?;
        let mut records = self.records.write().await;
        let owned = records.entry(record.owner_id.clone()).or_default();
        let used = Self::count_in(Some(owned), since);
        if used >= limit {
            return Ok(ConditionalInsert::Full { used });
        }
        owned.push(record);
        Ok(ConditionalInsert::Inserted { used })
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<GenerationRecord>, StoreError> {
        self.availability.check()?;
        let records = self.records.read().await;
        let mut owned = records.get(owner_id).cloned().unwrap_or_default();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool, StoreError> {
        self.availability.check()?;
        let mut records = self.records.write().await;
        let Some(owned) = records.get_mut(owner_id) else {
            return Ok(false);
        };
        let before = owned.len();
        owned.retain(|r| r.id != id);
        Ok(owned.len() != before)
    }
}

/// In-memory account directory
///
/// Owners that were never registered are treated as having no subscription.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    subscriptions: Arc<RwLock<HashMap<String, bool>>>,
    availability: Availability,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a billing change for an owner
    pub async fn set_subscription_active(&self, owner_id: &str, active: bool) {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(owner_id.to_string(), active);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn subscription_active(&self, owner_id: &str) -> Result<bool, StoreError> {
        self.availability.check()?;
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(owner_id).copied().unwrap_or(false))
    }
}
