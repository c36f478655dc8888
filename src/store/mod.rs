//! Backing-store contract.
//!
//! A backing store is the durable home of atoms; the space consults it on
//! table misses and forwards explicit store requests to it. Calls are
//! synchronous and may block, so callers never hold a table lock across
//! one.
//!
//! Deletion is not part of the contract.

pub mod memory;

use std::fmt;

use crate::types::{AtomError, Handle, Type};

/// Error type for backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failure inside the backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Stored record could not be decoded.
    #[error("Record decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// Stored record names an invalid atom.
    #[error(transparent)]
    Atom(#[from] AtomError),
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend<E: std::error::Error>(e: E) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Durable atom storage consulted by a space.
///
/// Atoms returned by a store are detached (not members of any table) and
/// carry the stored truth value.
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Stored node with this type and name.
    fn get_node(&self, ty: Type, name: &str) -> Result<Option<Handle>, StoreError>;

    /// Stored link with the same type and outgoing content as `link`.
    fn get_link(&self, link: &Handle) -> Result<Option<Handle>, StoreError>;

    /// Stored links that have `h` as a child.
    fn get_incoming_set(&self, h: &Handle) -> Result<Vec<Handle>, StoreError>;

    /// Durable upsert of `h` and its current truth value.
    fn store_atom(&self, h: &Handle) -> Result<(), StoreError>;

    /// Whether atoms of type `ty` are never round-tripped.
    fn ignore_type(&self, ty: Type) -> bool;

    /// Whether this particular atom is never round-tripped.
    fn ignore_atom(&self, h: &Handle) -> bool;
}

pub use memory::InMemoryBackingStore;
