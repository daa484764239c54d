//! Per-attempt scratch space shared between the precompute and decide phases
//!
//! A [`CycleState`] lives for exactly one scheduling attempt of one work
//! item. The precompute phase writes into it once; afterwards any number of
//! decision tasks read from it concurrently. Reads hand out deep copies, so
//! no reader can observe another reader's mutations.

use crate::error::CycleStateError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

/// Values storable in a [`CycleState`]
pub trait StateData: Any + Send + Sync {
    /// Independent deep copy of this value
    fn clone_data(&self) -> Box<dyn StateData>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Clone + Send + Sync> StateData for T {
    fn clone_data(&self) -> Box<dyn StateData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Key/value state scoped to one scheduling attempt
pub struct CycleState {
    attempt_id: u64,
    storage: RwLock<HashMap<String, Box<dyn StateData>>>,
    reads: AtomicU64,
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleState {
    /// Create an empty state for a new scheduling attempt
    pub fn new() -> Self {
        Self {
            attempt_id: NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed),
            storage: RwLock::new(HashMap::new()),
            reads: AtomicU64::new(0),
        }
    }

    /// Identifier of the attempt this state belongs to
    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn write<T: StateData>(&self, key: impl Into<String>, value: T) {
        let mut storage = self.storage.write().unwrap_or_else(|e| e.into_inner());
        storage.insert(key.into(), Box::new(value));
    }

    /// Read an independent copy of the value stored under `key`
    pub fn read<T: StateData + Clone>(&self, key: &str) -> Result<T, CycleStateError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
        let data = storage
            .get(key)
            .ok_or_else(|| CycleStateError::NotFound(key.to_string()))?;

        // Dispatch through the vtable; `&Box<dyn StateData>` is itself a `StateData`.
        (**data)
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| CycleStateError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Number of `read` calls made against this state so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl Clone for CycleState {
    /// Deep copy of every entry; the copy keeps the attempt id but starts with zero reads
    fn clone(&self) -> Self {
        let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
        let copied = storage
            .iter()
            .map(|(k, v)| (k.clone(), (**v).clone_data()))
            .collect();
        Self {
            attempt_id: self.attempt_id,
            storage: RwLock::new(copied),
            reads: AtomicU64::new(0),
        }
    }
}

impl fmt::Debug for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = storage.keys().collect();
        keys.sort();
        f.debug_struct("CycleState")
            .field("attempt_id", &self.attempt_id)
            .field("keys", &keys)
            .field("reads", &self.read_count())
            .finish()
    }
}
