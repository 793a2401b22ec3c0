// crates/loom-core/src/runtime/store.rs
// ============================================================================
// Module: Loom In-Memory Stores
// Description: In-memory registry, step-event store, and logical clock.
// Purpose: Provide deterministic port implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides simple in-memory implementations of the storage and
//! clock ports for tests and local demos, plus shared `Arc` wrappers used to
//! hand one store to several components. The in-memory stores are not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::core::Candidate;
use crate::core::CandidateId;
use crate::core::CandidateStatus;
use crate::core::Migration;
use crate::core::MigrationId;
use crate::core::StepEventRecord;
use crate::core::Timestamp;
use crate::core::migration::preserve_candidate_statuses;
use crate::interfaces::Clock;
use crate::interfaces::RegistryError;
use crate::interfaces::RegistryStore;
use crate::interfaces::StepEventError;
use crate::interfaces::StepEventStore;

// ============================================================================
// SECTION: In-Memory Registry
// ============================================================================

/// In-memory registry store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistryStore {
    /// Migration map protected by a mutex.
    migrations: Arc<Mutex<BTreeMap<String, Migration>>>,
}

impl InMemoryRegistryStore {
    /// Creates a new in-memory registry store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Runs a closure over the locked migration map.
    fn with_migrations<T>(
        &self,
        operate: impl FnOnce(&mut BTreeMap<String, Migration>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self
            .migrations
            .lock()
            .map_err(|_| RegistryError::Store("registry store mutex poisoned".to_string()))?;
        operate(&mut guard)
    }
}

/// Looks up a migration mutably or fails with `MigrationNotFound`.
fn migration_mut<'a>(
    migrations: &'a mut BTreeMap<String, Migration>,
    migration_id: &MigrationId,
) -> Result<&'a mut Migration, RegistryError> {
    migrations
        .get_mut(migration_id.as_str())
        .ok_or_else(|| RegistryError::MigrationNotFound(migration_id.to_string()))
}

/// Looks up a candidate mutably or fails with `CandidateNotFound`.
fn candidate_mut<'a>(
    migration: &'a mut Migration,
    candidate_id: &CandidateId,
) -> Result<&'a mut Candidate, RegistryError> {
    migration
        .candidates
        .iter_mut()
        .find(|candidate| candidate.id == *candidate_id)
        .ok_or_else(|| RegistryError::CandidateNotFound(candidate_id.to_string()))
}

impl RegistryStore for InMemoryRegistryStore {
    fn save(&self, migration: &Migration) -> Result<(), RegistryError> {
        self.with_migrations(|migrations| {
            migrations.insert(migration.id.as_str().to_string(), migration.clone());
            Ok(())
        })
    }

    fn get(&self, id: &MigrationId) -> Result<Option<Migration>, RegistryError> {
        self.with_migrations(|migrations| Ok(migrations.get(id.as_str()).cloned()))
    }

    fn list(&self) -> Result<Vec<Migration>, RegistryError> {
        self.with_migrations(|migrations| Ok(migrations.values().cloned().collect()))
    }

    fn set_candidate_status(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        status: CandidateStatus,
    ) -> Result<(), RegistryError> {
        self.with_migrations(|migrations| {
            let migration = migration_mut(migrations, migration_id)?;
            candidate_mut(migration, candidate_id)?.status = status;
            Ok(())
        })
    }

    fn save_candidates(
        &self,
        migration_id: &MigrationId,
        mut candidates: Vec<Candidate>,
    ) -> Result<(), RegistryError> {
        self.with_migrations(|migrations| {
            let migration = migration_mut(migrations, migration_id)?;
            preserve_candidate_statuses(&migration.candidates, &mut candidates);
            migration.candidates = candidates;
            Ok(())
        })
    }

    fn get_candidates(&self, migration_id: &MigrationId) -> Result<Vec<Candidate>, RegistryError> {
        self.with_migrations(|migrations| {
            Ok(migration_mut(migrations, migration_id)?.candidates.clone())
        })
    }

    fn update_candidate_metadata(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        self.with_migrations(|migrations| {
            let migration = migration_mut(migrations, migration_id)?;
            let candidate = candidate_mut(migration, candidate_id)?;
            for (key, value) in metadata {
                candidate.metadata.insert(key.clone(), value.clone());
            }
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: In-Memory Step Event Store
// ============================================================================

/// In-memory append-only step event store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStepEventStore {
    /// Append-order record log protected by a mutex.
    records: Arc<Mutex<Vec<StepEventRecord>>>,
}

impl InMemoryStepEventStore {
    /// Creates a new in-memory step event store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl StepEventStore for InMemoryStepEventStore {
    fn append(&self, record: &StepEventRecord) -> Result<(), StepEventError> {
        self.records
            .lock()
            .map_err(|_| StepEventError::Store("step event store mutex poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn list(
        &self,
        migration_id: Option<&MigrationId>,
    ) -> Result<Vec<StepEventRecord>, StepEventError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| StepEventError::Store("step event store mutex poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|record| migration_id.is_none_or(|id| record.migration_id == *id))
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Shared Store Wrappers
// ============================================================================

/// Shared registry store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedRegistryStore {
    /// Inner store implementation.
    inner: Arc<dyn RegistryStore>,
}

impl SharedRegistryStore {
    /// Wraps a registry store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl RegistryStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl RegistryStore for SharedRegistryStore {
    fn save(&self, migration: &Migration) -> Result<(), RegistryError> {
        self.inner.save(migration)
    }

    fn get(&self, id: &MigrationId) -> Result<Option<Migration>, RegistryError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<Migration>, RegistryError> {
        self.inner.list()
    }

    fn set_candidate_status(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        status: CandidateStatus,
    ) -> Result<(), RegistryError> {
        self.inner.set_candidate_status(migration_id, candidate_id, status)
    }

    fn save_candidates(
        &self,
        migration_id: &MigrationId,
        candidates: Vec<Candidate>,
    ) -> Result<(), RegistryError> {
        self.inner.save_candidates(migration_id, candidates)
    }

    fn get_candidates(&self, migration_id: &MigrationId) -> Result<Vec<Candidate>, RegistryError> {
        self.inner.get_candidates(migration_id)
    }

    fn update_candidate_metadata(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        self.inner.update_candidate_metadata(migration_id, candidate_id, metadata)
    }

    fn readiness(&self) -> Result<(), RegistryError> {
        self.inner.readiness()
    }
}

/// Shared step event store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedStepEventStore {
    /// Inner store implementation.
    inner: Arc<dyn StepEventStore>,
}

impl SharedStepEventStore {
    /// Wraps a step event store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl StepEventStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn StepEventStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl StepEventStore for SharedStepEventStore {
    fn append(&self, record: &StepEventRecord) -> Result<(), StepEventError> {
        self.inner.append(record)
    }

    fn list(
        &self,
        migration_id: Option<&MigrationId>,
    ) -> Result<Vec<StepEventRecord>, StepEventError> {
        self.inner.list(migration_id)
    }

    fn readiness(&self) -> Result<(), StepEventError> {
        self.inner.readiness()
    }
}

// ============================================================================
// SECTION: Logical Clock
// ============================================================================

/// Monotonic logical clock for deterministic tests.
#[derive(Debug, Default)]
pub struct LogicalClock {
    /// Next logical tick.
    next: AtomicU64,
}

impl LogicalClock {
    /// Creates a logical clock starting at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> Timestamp {
        Timestamp::Logical(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
