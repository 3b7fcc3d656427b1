use bytes::Bytes;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The Store holds the keyspace: a mapping from binary keys to typed values.
///
/// Every access goes through [`InnerStore::lock`], which serializes readers and writers. Values
/// are handed out as deep copies and taken in by value, so neither a command that just wrote a
/// value nor one that just read it ever shares memory with what the store holds.
///
/// The store is cheap to clone; clones share the same keyspace.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InnerStore {
    state: Mutex<State>,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> InnerStoreLocked<'a> {
    /// Stores `value` under `key`, returning whatever was stored there before.
    pub fn set(&mut self, key: Bytes, value: Value) -> Option<Value> {
        self.state.keys.insert(key, value)
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.state.keys.get(key).cloned()
    }

    pub fn type_of(&self, key: &[u8]) -> Option<&'static str> {
        self.state.keys.get(key).map(Value::type_name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.state.keys.keys()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // A panic while holding the lock can't leave the map half-written: every mutation is a
        // single `insert`.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked { state }
    }
}

type Key = Bytes;

/// A value as held in the keyspace. `Clone` is a deep copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    String(Vec<u8>),
    // Not reachable through any command yet.
    List(Vec<Vec<u8>>),
}

impl Value {
    /// The name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::String(data.to_vec())
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::String(data.to_vec())
    }
}

pub struct State {
    keys: HashMap<Key, Value>,
}
