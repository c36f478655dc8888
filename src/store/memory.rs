//! In-memory backing store for testing and embedding.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{BackingStore, StoreError};
use crate::canonical::{canonical_hash, to_canonical_bytes, AtomRecord};
use crate::types::{Atom, ContentHash, Handle, Type, TypeRegistry};

#[derive(Debug, Default)]
struct StoreState {
    /// Stored atoms by content hash. Stored atoms are private objects;
    /// callers only ever see copies.
    atoms: HashMap<ContentHash, Vec<Handle>>,
    /// Stored child -> stored links referencing it.
    incoming: HashMap<Handle, Vec<Handle>>,
    ignored_types: HashSet<Type>,
    ignored_atoms: Vec<Handle>,
}

impl StoreState {
    fn find(&self, atom: &Atom) -> Option<Handle> {
        self.atoms
            .get(&atom.get_hash())?
            .iter()
            .find(|h| h.is_equal(atom))
            .cloned()
    }

    /// Stored version of `h`, created or refreshed with `h`'s truth value.
    fn upsert(&mut self, h: &Handle) -> Result<Handle, StoreError> {
        let children = h
            .outgoing()
            .iter()
            .map(|c| self.upsert(c))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(stored) = self.find(h) {
            stored.set_truth_value(h.truth_value());
            return Ok(stored);
        }
        let stored = h.copy_with(children)?;
        self.atoms.entry(stored.get_hash()).or_default().push(stored.clone());
        for child in stored.outgoing() {
            let referrers = self.incoming.entry(child.clone()).or_default();
            if !referrers.iter().any(|r| r.ptr_eq(&stored)) {
                referrers.push(stored.clone());
            }
        }
        Ok(stored)
    }

    fn roots(&self) -> impl Iterator<Item = &Handle> + '_ {
        self.atoms
            .values()
            .flatten()
            .filter(|h| self.incoming.get(*h).map(|r| r.is_empty()).unwrap_or(true))
    }
}

/// Backing store holding detached atoms in memory.
///
/// Every fetch returns a fresh copy, so the store behaves like a remote
/// backend: nothing it hands out is shared with the caller's tables.
#[derive(Debug)]
pub struct InMemoryBackingStore {
    registry: Arc<TypeRegistry>,
    state: RwLock<StoreState>,
}

impl InMemoryBackingStore {
    /// Create an empty store.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Never round-trip atoms of type `ty`.
    pub fn set_ignore_type(&self, ty: Type) {
        self.state.write().ignored_types.insert(ty);
    }

    /// Never round-trip atoms equal to `h`.
    pub fn set_ignore_atom(&self, h: &Handle) {
        self.state.write().ignored_atoms.push(h.clone());
    }

    /// Number of stored atoms.
    pub fn len(&self) -> usize {
        self.state.read().atoms.values().map(Vec::len).sum()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an atom with the same content is stored.
    pub fn contains(&self, atom: &Atom) -> bool {
        self.state.read().find(atom).is_some()
    }

    fn sorted_roots(&self) -> Result<Vec<(Vec<u8>, AtomRecord)>, StoreError> {
        let state = self.state.read();
        let mut records = state
            .roots()
            .map(|h| {
                let record = AtomRecord::from_atom(h);
                Ok((to_canonical_bytes(&record)?, record))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    /// Snapshot of every stored root atom as a JSON array of records,
    /// in canonical order.
    pub fn export_json(&self) -> Result<String, StoreError> {
        let records: Vec<AtomRecord> = self.sorted_roots()?.into_iter().map(|(_, r)| r).collect();
        Ok(serde_json::to_string(&records)?)
    }

    /// Store every atom of a snapshot produced by
    /// [`export_json`](Self::export_json). Returns the number of root
    /// records read.
    pub fn import_json(&self, json: &str) -> Result<usize, StoreError> {
        let records: Vec<AtomRecord> = serde_json::from_str(json)?;
        for record in &records {
            let atom = record.to_atom(&self.registry)?;
            self.store_atom(&atom)?;
        }
        tracing::debug!(records = records.len(), "imported store snapshot");
        Ok(records.len())
    }

    /// Content fingerprint of the whole store, independent of insertion
    /// order.
    pub fn fingerprint(&self) -> Result<u64, StoreError> {
        let records: Vec<AtomRecord> = self.sorted_roots()?.into_iter().map(|(_, r)| r).collect();
        Ok(canonical_hash(&records)?)
    }
}

impl BackingStore for InMemoryBackingStore {
    fn get_node(&self, ty: Type, name: &str) -> Result<Option<Handle>, StoreError> {
        let probe = Atom::node(&self.registry, ty, name)?;
        let found = self.state.read().find(&probe);
        found.map(|h| h.deep_copy()).transpose().map_err(StoreError::from)
    }

    fn get_link(&self, link: &Handle) -> Result<Option<Handle>, StoreError> {
        let found = self.state.read().find(link);
        found.map(|h| h.deep_copy()).transpose().map_err(StoreError::from)
    }

    fn get_incoming_set(&self, h: &Handle) -> Result<Vec<Handle>, StoreError> {
        let state = self.state.read();
        let Some(stored) = state.find(h) else {
            return Ok(Vec::new());
        };
        let referrers = state.incoming.get(&stored).cloned().unwrap_or_default();
        drop(state);
        referrers
            .iter()
            .map(|l| l.deep_copy().map_err(StoreError::from))
            .collect()
    }

    fn store_atom(&self, h: &Handle) -> Result<(), StoreError> {
        self.state.write().upsert(h)?;
        tracing::debug!(atom = %h, "stored atom");
        Ok(())
    }

    fn ignore_type(&self, ty: Type) -> bool {
        self.state.read().ignored_types.contains(&ty)
    }

    fn ignore_atom(&self, h: &Handle) -> bool {
        self.state.read().ignored_atoms.iter().any(|a| a.is_equal(h))
    }
}
