//! In-process identity registry shared by all repositories.
//!
//! # Responsibility
//! - Track at most one instance per `(entity type, identifier)` pair.
//! - Answer existence and lookup queries for repositories.
//!
//! # Invariants
//! - `add` never overwrites; `force_add` always does.
//! - Every operation runs under one lock, so concurrent callers observe
//!   add/force_add/get/delete atomically.
//! - The registry is an explicit value shared through `Arc`, never a global.

use crate::model::entity::{EntityId, Persistable};
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Identity tracking errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    AlreadyTracked { entity: &'static str, id: EntityId },
    NotFound { entity: &'static str, id: EntityId },
    MissingIdentifier { entity: &'static str },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyTracked { entity, id } => {
                write!(f, "{entity} with id {id} is already tracked")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} with id {id} is not tracked"),
            Self::MissingIdentifier { entity } => {
                write!(f, "{entity} has no identifier and cannot be tracked")
            }
        }
    }
}

impl Error for RegistryError {}

type Partition = BTreeMap<EntityId, Box<dyn Any + Send>>;

/// Tracks known entities per concrete type.
#[derive(Default)]
pub struct IdentityRegistry {
    partitions: Mutex<HashMap<TypeId, Partition>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity that is not yet tracked.
    pub fn add<T: Persistable>(&self, entity: &T) -> RegistryResult<()> {
        let id = require_id(entity)?;
        let mut partitions = self.lock();
        let partition = partitions.entry(TypeId::of::<T>()).or_default();
        if partition.contains_key(&id) {
            return Err(RegistryError::AlreadyTracked {
                entity: type_name::<T>(),
                id,
            });
        }
        partition.insert(id, Box::new(entity.clone()));
        Ok(())
    }

    /// Registers or replaces the tracked instance.
    ///
    /// Returns the instance that was tracked before, if any.
    pub fn force_add<T: Persistable>(&self, entity: &T) -> RegistryResult<Option<T>> {
        let id = require_id(entity)?;
        let previous = self
            .lock()
            .entry(TypeId::of::<T>())
            .or_default()
            .insert(id, Box::new(entity.clone()));
        Ok(previous.and_then(downcast::<T>))
    }

    /// Returns a copy of the tracked instance.
    pub fn get<T: Persistable>(&self, id: EntityId) -> RegistryResult<T> {
        self.lock()
            .get(&TypeId::of::<T>())
            .and_then(|partition| partition.get(&id))
            .and_then(|tracked| tracked.downcast_ref::<T>())
            .cloned()
            .ok_or(RegistryError::NotFound {
                entity: type_name::<T>(),
                id,
            })
    }

    pub fn contains<T: Persistable>(&self, id: EntityId) -> bool {
        self.lock()
            .get(&TypeId::of::<T>())
            .is_some_and(|partition| partition.contains_key(&id))
    }

    /// Removes the tracked instance matching the entity's identifier.
    pub fn delete<T: Persistable>(&self, entity: &T) -> RegistryResult<T> {
        let id = require_id(entity)?;
        self.delete_by_id::<T>(id)
    }

    /// Removes the tracked instance and returns it.
    pub fn delete_by_id<T: Persistable>(&self, id: EntityId) -> RegistryResult<T> {
        self.lock()
            .get_mut(&TypeId::of::<T>())
            .and_then(|partition| partition.remove(&id))
            .and_then(downcast::<T>)
            .ok_or(RegistryError::NotFound {
                entity: type_name::<T>(),
                id,
            })
    }

    /// Returns tracked identifiers of one type in ascending order.
    pub fn tracked_ids<T: Persistable>(&self) -> Vec<EntityId> {
        self.lock()
            .get(&TypeId::of::<T>())
            .map(|partition| partition.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Forgets every tracked instance of one type.
    pub fn clear<T: Persistable>(&self) {
        self.lock().remove(&TypeId::of::<T>());
    }

    /// Total number of tracked instances across all types.
    pub fn len(&self) -> usize {
        self.lock().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, Partition>> {
        // Each operation is a single map mutation, so a panicking holder
        // cannot leave a partition half-written.
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_id<T: Persistable>(entity: &T) -> RegistryResult<EntityId> {
    entity.id().ok_or(RegistryError::MissingIdentifier {
        entity: type_name::<T>(),
    })
}

fn downcast<T: 'static>(tracked: Box<dyn Any + Send>) -> Option<T> {
    tracked.downcast::<T>().ok().map(|boxed| *boxed)
}
