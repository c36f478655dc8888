//! AtomSpace: an atom table with backing-store awareness.
//!
//! Lookups and inserts consult the table first. On a miss the registered
//! backing store (if any, and unless it ignores the type or atom) is asked
//! for a stored version, which is pulled into the table with its stored
//! truth value. Only when both miss is a fresh atom inserted.
//!
//! Backing-store calls are made without holding any table lock; the
//! result is inserted afterwards, and the table's own recheck resolves a
//! concurrent insert of the same content.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SpaceConfig;
use crate::scope::{self, CountingNames, NameSupply, UuidNames};
use crate::store::{BackingStore, StoreError};
use crate::table::{AtomTable, TableError};
use crate::types::{Atom, AtomError, Handle, Type, TypeRegistry, ATOM};

/// Error type for space operations.
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    /// The operation needs a backing store and none is registered.
    #[error("No backing store registered")]
    NoBackingStore,

    /// Known gap: the operation is not implemented for this configuration.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The backing store has no record of an atom that must exist.
    #[error("Atom not found in backing store: {0}")]
    NotFound(String),

    /// Backing-store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Table failure.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Atom construction failure.
    #[error(transparent)]
    Atom(#[from] AtomError),
}

/// A table plus an optional backing store.
#[derive(Debug)]
pub struct AtomSpace {
    table: Arc<AtomTable>,
    backing_store: RwLock<Option<Arc<dyn BackingStore>>>,
    names: Arc<dyn NameSupply>,
    config: SpaceConfig,
}

impl AtomSpace {
    /// Create an empty space with the default configuration.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, SpaceConfig::default())
    }

    /// Create an empty space.
    pub fn with_config(registry: Arc<TypeRegistry>, config: SpaceConfig) -> Self {
        Self {
            table: Arc::new(AtomTable::new(registry)),
            backing_store: RwLock::new(None),
            names: Arc::new(UuidNames),
            config,
        }
    }

    /// A space layered on `parent`: it sees the parent's atoms, and its
    /// own inserts stay local.
    pub fn new_child(parent: &AtomSpace) -> Self {
        Self {
            table: AtomTable::new_child(Arc::clone(&parent.table), false),
            backing_store: RwLock::new(None),
            names: Arc::clone(&parent.names),
            config: parent.config.clone(),
        }
    }

    /// Scratch space over `parent`, discarded by
    /// [`clear_transient`](Self::clear_transient).
    pub fn new_transient(parent: &AtomSpace) -> Self {
        Self {
            table: AtomTable::new_child(Arc::clone(&parent.table), true),
            backing_store: RwLock::new(None),
            names: Arc::new(CountingNames::new()),
            config: SpaceConfig::transient(),
        }
    }

    /// Replace the name supply used for fresh variables.
    pub fn with_name_supply(mut self, names: Arc<dyn NameSupply>) -> Self {
        self.names = names;
        self
    }

    /// Re-arm a cleared transient space over `parent`.
    pub fn ready_transient(&self, parent: &AtomSpace) {
        self.table.ready_transient(Arc::clone(&parent.table));
    }

    /// Drop every local atom. The parent is untouched.
    pub fn clear_transient(&self) {
        self.table.clear_transient();
    }

    /// Underlying table.
    pub fn table(&self) -> &Arc<AtomTable> {
        &self.table
    }

    /// Type registry shared with the table.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.table.registry()
    }

    /// Configuration.
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Number of atoms held locally.
    pub fn size(&self) -> usize {
        self.table.size()
    }

    /// Number of nodes held locally.
    pub fn num_nodes(&self) -> usize {
        self.table.num_nodes()
    }

    /// Number of links held locally.
    pub fn num_links(&self) -> usize {
        self.table.num_links()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Backing store
    // ─────────────────────────────────────────────────────────────────────

    /// Attach `store`, replacing any previous one.
    pub fn register_backing_store(&self, store: Arc<dyn BackingStore>) {
        *self.backing_store.write() = Some(store);
        tracing::debug!(space = %self.config.name, "registered backing store");
    }

    /// Detach `store` if it is the one registered.
    pub fn unregister_backing_store(&self, store: &Arc<dyn BackingStore>) {
        let mut slot = self.backing_store.write();
        if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, store)) {
            *slot = None;
            tracing::debug!(space = %self.config.name, "unregistered backing store");
        }
    }

    /// Registered backing store.
    pub fn backing_store(&self) -> Option<Arc<dyn BackingStore>> {
        self.backing_store.read().clone()
    }

    fn require_store(&self) -> Result<Arc<dyn BackingStore>, SpaceError> {
        self.backing_store().ok_or(SpaceError::NoBackingStore)
    }

    /// Whether `store` may be asked about `atom`.
    fn may_fetch(store: &dyn BackingStore, atom: &Handle) -> bool {
        !store.ignore_type(atom.get_type())
            && !store.ignore_atom(atom)
            && !atom.outgoing().iter().any(|c| store.ignore_atom(c))
    }

    /// Stored version of `atom`, pulled into the table.
    fn fetch_from(&self, store: &dyn BackingStore, atom: &Handle) -> Result<Option<Handle>, SpaceError> {
        let fetched = match atom.name() {
            Some(name) => store.get_node(atom.get_type(), name)?,
            None => store.get_link(atom)?,
        };
        match fetched {
            Some(stored) => {
                tracing::debug!(space = %self.config.name, atom = %stored, "fetched atom from backing store");
                Ok(Some(self.insert_tree(&stored)?))
            }
            None => Ok(None),
        }
    }

    /// Backing-store probe used on table misses.
    fn probe(&self, atom: &Handle) -> Result<Option<Handle>, SpaceError> {
        if !self.config.fetch_on_miss {
            return Ok(None);
        }
        match self.backing_store() {
            Some(store) if Self::may_fetch(store.as_ref(), atom) => self.fetch_from(store.as_ref(), atom),
            _ => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insert
    // ─────────────────────────────────────────────────────────────────────

    fn insert(&self, atom: &Handle) -> Result<Handle, SpaceError> {
        if atom.class().is_delete() && self.backing_store().is_some() {
            tracing::warn!(space = %self.config.name, atom = %atom, "DeleteLink with a backing store");
            return Err(SpaceError::Unsupported(
                "propagating a DeleteLink to the backing store".to_string(),
            ));
        }
        Ok(self.table.add(atom)?)
    }

    /// Insert a detached tree, reusing members wherever they exist.
    fn insert_tree(&self, atom: &Handle) -> Result<Handle, SpaceError> {
        if let Some(found) = self.table.get_handle(atom) {
            return Ok(found);
        }
        let outgoing = atom
            .outgoing()
            .iter()
            .map(|c| self.insert_tree(c))
            .collect::<Result<Vec<_>, _>>()?;
        self.insert(&with_children(atom, outgoing)?)
    }

    fn resolve(&self, candidate: &Handle) -> Result<Handle, SpaceError> {
        if let Some(found) = self.table.get_handle(candidate) {
            return Ok(found);
        }
        if let Some(fetched) = self.probe(candidate)? {
            return Ok(fetched);
        }
        self.insert(candidate)
    }

    /// The node with this type and name, created if nobody knows it.
    pub fn add_node(&self, ty: Type, name: &str) -> Result<Handle, SpaceError> {
        if let Some(found) = self.table.get_node_handle(ty, name) {
            return Ok(found);
        }
        let node = Atom::node(self.registry(), ty, name)?;
        self.resolve(&node)
    }

    /// The link with this type and outgoing set, created if nobody knows
    /// it. Children not yet in the space are added first.
    pub fn add_link(&self, ty: Type, outgoing: Vec<Handle>) -> Result<Handle, SpaceError> {
        let outgoing = outgoing
            .iter()
            .map(|c| self.add_atom(c))
            .collect::<Result<Vec<_>, _>>()?;
        let link = Atom::link(self.registry(), ty, outgoing)?;
        self.resolve(&link)
    }

    /// Add an atom built elsewhere, together with its children. A new
    /// member keeps the atom's truth value.
    pub fn add_atom(&self, atom: &Handle) -> Result<Handle, SpaceError> {
        if self.table.holds(atom) {
            return Ok(atom.clone());
        }
        let outgoing = atom
            .outgoing()
            .iter()
            .map(|c| self.add_atom(c))
            .collect::<Result<Vec<_>, _>>()?;
        self.resolve(&with_children(atom, outgoing)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// The node with this type and name, if the table or the backing store
    /// knows it. Never creates one.
    pub fn get_node(&self, ty: Type, name: &str) -> Result<Option<Handle>, SpaceError> {
        if let Some(found) = self.table.get_node_handle(ty, name) {
            return Ok(Some(found));
        }
        let probe = Atom::node(self.registry(), ty, name)?;
        self.probe(&probe)
    }

    /// The link with this type and outgoing set, if known. Never creates
    /// one.
    pub fn get_link(&self, ty: Type, outgoing: &[Handle]) -> Result<Option<Handle>, SpaceError> {
        if let Some(found) = self.table.get_link_handle(ty, outgoing)? {
            return Ok(Some(found));
        }
        let probe = Atom::link(self.registry(), ty, outgoing.to_vec())?;
        self.probe(&probe)
    }

    /// The member with the same content as `atom`, if known.
    pub fn get_atom(&self, atom: &Handle) -> Result<Option<Handle>, SpaceError> {
        if let Some(found) = self.table.get_handle(atom) {
            return Ok(Some(found));
        }
        self.probe(atom)
    }

    /// Links in the space that have `h` as a child.
    pub fn incoming_set(&self, h: &Handle) -> Vec<Handle> {
        self.table.incoming_set(h)
    }

    /// Atoms of type `ty` (and subtypes, if `subclasses`).
    pub fn get_handles_by_type(&self, ty: Type, subclasses: bool) -> Vec<Handle> {
        self.table.get_handles_by_type(ty, subclasses)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Explicit backing-store traffic
    // ─────────────────────────────────────────────────────────────────────

    /// Bring `atom` into the table.
    ///
    /// A resident atom is returned as it is, without reconciling its truth
    /// value with the stored one. Otherwise the stored version is fetched
    /// and inserted; it is an error if the store does not have it.
    pub fn fetch_atom(&self, atom: &Handle) -> Result<Handle, SpaceError> {
        let store = self.require_store()?;
        if let Some(resident) = self.table.get_handle(atom) {
            return Ok(resident);
        }
        self.fetch_from(store.as_ref(), atom)?
            .ok_or_else(|| SpaceError::NotFound(atom.to_string()))
    }

    /// Pull the stored incoming set of `h` into the table, and with
    /// `recursive` the incoming sets of those links too. Returns the
    /// member for `h`, or `None` if neither table nor store knows it.
    pub fn fetch_incoming_set(&self, h: &Handle, recursive: bool) -> Result<Option<Handle>, SpaceError> {
        let store = self.require_store()?;
        let member = match self.table.get_handle(h) {
            Some(member) => member,
            None => match self.fetch_from(store.as_ref(), h)? {
                Some(member) => member,
                None => return Ok(None),
            },
        };

        let incoming = store.get_incoming_set(&member)?;
        tracing::debug!(
            space = %self.config.name,
            atom = %member,
            links = incoming.len(),
            recursive,
            "fetched incoming set"
        );
        for link in &incoming {
            let link = self.insert_tree(link)?;
            if recursive {
                self.fetch_incoming_set(&link, true)?;
            }
        }
        Ok(Some(member))
    }

    /// Upsert `h` and its current truth value into the backing store.
    pub fn store_atom(&self, h: &Handle) -> Result<(), SpaceError> {
        let store = self.require_store()?;
        store.store_atom(h)?;
        tracing::trace!(space = %self.config.name, atom = %h, "stored atom");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────

    /// Remove `h` from the table, and with `recursive` everything that
    /// references it. Returns whether anything was removed.
    ///
    /// Refused while a backing store is registered: the stored copy would
    /// survive the removal.
    pub fn remove_atom(&self, h: &Handle, recursive: bool) -> Result<bool, SpaceError> {
        if self.backing_store().is_some() {
            tracing::warn!(space = %self.config.name, atom = %h, "removal with a backing store");
            return Err(SpaceError::Unsupported(
                "removing atoms from the backing store".to_string(),
            ));
        }
        Ok(!self.table.extract(h, recursive)?.is_empty())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binders
    // ─────────────────────────────────────────────────────────────────────

    /// Alpha-convert a binder to `vars`, or to fresh names from this
    /// space's name supply.
    ///
    /// The result is detached: inserting it would resolve to `h` again.
    pub fn alpha_convert(&self, h: &Handle, vars: Option<&[Handle]>) -> Result<Handle, SpaceError> {
        Ok(scope::alpha_convert(h, vars, self.names.as_ref())?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Comparison
    // ─────────────────────────────────────────────────────────────────────

    /// Whether two spaces hold the same atoms.
    ///
    /// Counts are compared first. Then every atom of `first` must have an
    /// equal counterpart in `second` (with an equal truth value, if
    /// `check_truth_values`), and every atom of `second` must have been
    /// matched that way.
    pub fn compare(first: &AtomSpace, second: &AtomSpace, check_truth_values: bool, emit_diagnostics: bool) -> bool {
        let counts = [
            ("size", first.size(), second.size()),
            ("node count", first.num_nodes(), second.num_nodes()),
            ("link count", first.num_links(), second.num_links()),
        ];
        for (what, a, b) in counts {
            if a != b {
                if emit_diagnostics {
                    tracing::info!(what, first = a, second = b, "spaces differ");
                }
                return false;
            }
        }

        let mut checked: HashSet<Handle> = HashSet::new();
        for atom in first.table.all_atoms() {
            let Some(counterpart) = second.table.get_handle(&atom) else {
                if emit_diagnostics {
                    tracing::info!(atom = %atom, "atom missing from second space");
                }
                return false;
            };
            if check_truth_values && atom.truth_value() != counterpart.truth_value() {
                if emit_diagnostics {
                    tracing::info!(
                        atom = %atom,
                        first = %atom.truth_value(),
                        second = %counterpart.truth_value(),
                        "truth values differ"
                    );
                }
                return false;
            }
            checked.insert(counterpart);
        }

        let mut all_checked = true;
        for atom in second.table.all_atoms() {
            if !checked.contains(&atom) {
                if emit_diagnostics {
                    tracing::info!(atom = %atom, "unmatched atom in second space");
                }
                all_checked = false;
            }
        }
        all_checked
    }
}

impl PartialEq for AtomSpace {
    fn eq(&self, other: &Self) -> bool {
        AtomSpace::compare(self, other, self.config.check_truth_values, false)
    }
}

impl fmt::Display for AtomSpace {
    /// Every root atom (one with an empty incoming set), one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roots: Vec<String> = self
            .get_handles_by_type(ATOM, true)
            .into_iter()
            .filter(|h| self.incoming_set(h).is_empty())
            .map(|h| h.to_string())
            .collect();
        roots.sort();
        for root in roots {
            writeln!(f, "{root}")?;
        }
        Ok(())
    }
}

/// `atom` over `outgoing`, reusing `atom` when nothing changed.
fn with_children(atom: &Handle, outgoing: Vec<Handle>) -> Result<Handle, AtomError> {
    if outgoing.iter().zip(atom.outgoing()).all(|(a, b)| a.ptr_eq(b)) {
        Ok(atom.clone())
    } else {
        atom.rebuild(outgoing)
    }
}
