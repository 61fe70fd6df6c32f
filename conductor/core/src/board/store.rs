//! Board store interface
//!
//! The persisted board lives outside this crate. The applier only ever issues
//! `create_object`, `update_object` and `delete_object`; conflict resolution
//! (last-write-wins) is the store's business.
//!
//! [`InMemoryBoardStore`] is a reference implementation with an ordered
//! operation log and optional foreign-key checks for connectors. The daemon
//! uses it in demo mode and the tests use it to assert persistence ordering.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use super::object::BoardObject;

/// Error reported by a board store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A connector references an object the store does not have
    #[error("connector {connector} references missing object {missing}")]
    DanglingReference {
        /// Connector id
        connector: String,
        /// Missing endpoint id
        missing: String,
    },
    /// Update of an object the store does not have
    #[error("object {0} not found")]
    NotFound(String),
    /// Backend-specific failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound interface to the persisted board
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Persist a new object
    async fn create_object(&self, object: &BoardObject) -> Result<(), StoreError>;

    /// Persist the new state of an existing object
    async fn update_object(&self, object: &BoardObject) -> Result<(), StoreError>;

    /// Remove an object
    async fn delete_object(&self, id: &str) -> Result<(), StoreError>;
}

/// One call received by [`InMemoryBoardStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// `create_object`
    Create(BoardObject),
    /// `update_object`
    Update(BoardObject),
    /// `delete_object`
    Delete(String),
}

impl StoreOp {
    /// Id of the object the call touched
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Create(object) | Self::Update(object) => &object.id,
            Self::Delete(id) => id,
        }
    }
}

/// Concurrent in-memory board store
#[derive(Debug, Default)]
pub struct InMemoryBoardStore {
    objects: DashMap<String, BoardObject>,
    log: Mutex<Vec<StoreOp>>,
    enforce_references: bool,
}

impl InMemoryBoardStore {
    /// Store without reference checks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects connectors whose endpoints are not yet stored
    #[must_use]
    pub fn with_foreign_keys() -> Self {
        Self {
            enforce_references: true,
            ..Self::default()
        }
    }

    /// Seed objects without logging them
    pub fn seed(&self, objects: impl IntoIterator<Item = BoardObject>) {
        for object in objects {
            self.objects.insert(object.id.clone(), object);
        }
    }

    /// Current contents, sorted by id
    #[must_use]
    pub fn objects(&self) -> Vec<BoardObject> {
        let mut objects: Vec<BoardObject> =
            self.objects.iter().map(|entry| entry.value().clone()).collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }

    /// Look up one object
    #[must_use]
    pub fn get(&self, id: &str) -> Option<BoardObject> {
        self.objects.get(id).map(|entry| entry.value().clone())
    }

    /// Every call received so far, in arrival order
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.log.lock().clone()
    }

    fn check_references(&self, object: &BoardObject) -> Result<(), StoreError> {
        if !self.enforce_references || !object.is_connector() {
            return Ok(());
        }
        for endpoint in [&object.start_id, &object.end_id].into_iter().flatten() {
            if !self.objects.contains_key(endpoint) {
                return Err(StoreError::DanglingReference {
                    connector: object.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn create_object(&self, object: &BoardObject) -> Result<(), StoreError> {
        self.log.lock().push(StoreOp::Create(object.clone()));
        self.check_references(object)?;
        self.objects.insert(object.id.clone(), object.clone());
        Ok(())
    }

    async fn update_object(&self, object: &BoardObject) -> Result<(), StoreError> {
        self.log.lock().push(StoreOp::Update(object.clone()));
        self.check_references(object)?;
        // Last write wins.
        match self.objects.get_mut(&object.id) {
            Some(mut entry) => {
                *entry = object.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(object.id.clone())),
        }
    }

    async fn delete_object(&self, id: &str) -> Result<(), StoreError> {
        self.log.lock().push(StoreOp::Delete(id.to_string()));
        self.objects.remove(id);
        Ok(())
    }
}
