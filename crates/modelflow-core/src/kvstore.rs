//! Key-value store binding for phase implementations.
//!
//! The runner opens every store a phase's environment names and populates a
//! [`KeyValueStoreBinding`] exactly once. Phases only ever read from it.
//!
//! Stores are JSON-keyed readers. [`TypedStore`] reinterprets keys and values
//! as the types the caller expects; if the store the runner opened holds
//! something else, the mismatch surfaces as [`StoreError::Decode`] on lookup.
//! That is a caller error and is not detected when binding.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Errors raised by an opened store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("kv store '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("failed to encode lookup key: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode stored value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors raised when a phase reads its bound stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("kv stores read before the runner bound them")]
    Uninitialized,

    #[error("no kv store named '{name}' is bound")]
    StoreNotFound { name: String },

    #[error("kv stores are already bound")]
    AlreadyBound,
}

/// An opened key-value store.
pub trait KeyValueReader: Send + Sync {
    fn get(&self, key: &Value) -> Result<Option<Value>, StoreError>;

    fn contains_key(&self, key: &Value) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Shared handle to an opened store.
pub type StoreHandle = Arc<dyn KeyValueReader>;

/// A store viewed through the key/value types a phase expects.
pub struct TypedStore<K, V> {
    handle: StoreHandle,
    _types: PhantomData<fn(&K) -> V>,
}

impl<K, V> TypedStore<K, V>
where
    K: Serialize,
    V: DeserializeOwned,
{
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            handle,
            _types: PhantomData,
        }
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let key = serde_json::to_value(key).map_err(StoreError::Encode)?;
        match self.handle.get(&key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }
}

/// Per-phase-instance mapping from logical store name to an opened store.
///
/// Starts unbound. [`set_all`](Self::set_all) is reserved for the runner and
/// succeeds once; every later call is rejected. Concurrently running phase
/// instances must each get their own binding.
#[derive(Default)]
pub struct KeyValueStoreBinding {
    stores: OnceLock<HashMap<String, StoreHandle>>,
}

impl KeyValueStoreBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bound store by logical name.
    ///
    /// # Errors
    ///
    /// - `BindingError::Uninitialized`: the runner has not bound stores yet.
    /// - `BindingError::StoreNotFound`: stores are bound but none has this name.
    pub fn get(&self, name: &str) -> Result<StoreHandle, BindingError> {
        let stores = self.stores.get().ok_or(BindingError::Uninitialized)?;
        stores
            .get(name)
            .cloned()
            .ok_or_else(|| BindingError::StoreNotFound {
                name: name.to_string(),
            })
    }

    /// Look up a bound store and view it with the given key/value types.
    pub fn typed<K, V>(&self, name: &str) -> Result<TypedStore<K, V>, BindingError>
    where
        K: Serialize,
        V: DeserializeOwned,
    {
        self.get(name).map(TypedStore::new)
    }

    /// Populate the binding. Runner-only; phases must never call this.
    ///
    /// # Errors
    ///
    /// `BindingError::AlreadyBound` on any call after the first.
    pub fn set_all(&self, stores: HashMap<String, StoreHandle>) -> Result<(), BindingError> {
        self.stores
            .set(stores)
            .map_err(|_| BindingError::AlreadyBound)
    }

    pub fn is_bound(&self) -> bool {
        self.stores.get().is_some()
    }

    /// Bound store names, sorted. Empty while unbound.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .get()
            .map(|stores| stores.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl fmt::Debug for KeyValueStoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueStoreBinding")
            .field("bound", &self.is_bound())
            .field("stores", &self.names())
            .finish()
    }
}
