//! # atomspace-kernel
//!
//! Content-addressed hypergraph store with binder-aware hashing.
//!
//! Atoms are typed nodes (type + name) and links (type + ordered children).
//! Every atom lives at most once per table: inserting structurally equal
//! content returns the existing member. Binder links (lambdas, scopes,
//! patterns) are compared and hashed up to renaming of their bound
//! variables, so `λx. f(x)` and `λy. f(y)` are the same atom.
//!
//! ## Architecture
//!
//! ```text
//! TypeRegistry ─→ Atom / Handle ─→ ScopeLink + Variables (alpha machinery)
//!                      ↓
//!                  AtomTable (dedup, indices, incoming sets)
//!                      ↓
//!                  AtomSpace ←→ BackingStore (InMemory or external)
//! ```
//!
//! ## Hash Guarantees
//!
//! - Alpha-equivalent binders hash equally
//! - Ordered links are order-sensitive, unordered links are not
//! - Link hashes have the most-significant bit set; `u64::MAX` is reserved

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod scope;
pub mod table;
pub mod store;
pub mod space;
pub mod canonical;
pub mod config;
pub mod telemetry;

// Re-exports
pub use types::{Atom, AtomError, ContentHash, Handle, TruthValue, Type, TypeClass, TypeRegistry};
pub use types::{INVALID_HASH, LINK_HASH_BIT};
pub use scope::{alpha_convert, CountingNames, NameSupply, ScopeLink, UuidNames, VarKey, Variables};
pub use table::{AtomId, AtomTable, Membership, TableError, TableId};
pub use store::{BackingStore, InMemoryBackingStore, StoreError};
pub use space::{AtomSpace, SpaceError};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes, AtomRecord};
pub use config::SpaceConfig;
pub use telemetry::{init_tracing, LogFormat};
