//! Atom table.
//!
//! The table owns the canonical instance of every atom it holds and keeps
//! the indices used to find them:
//!
//! - content-hash buckets (deduplication and exact-content lookup)
//! - by type
//! - by (type, name) for nodes
//! - per-member incoming sets
//!
//! ## Invariants
//!
//! - At most one member per content: inserting an atom structurally equal
//!   to a member (binders up to alpha-equivalence) returns the member.
//! - Every child of a member is a member of this table or of an ancestor.
//! - `C`'s incoming set contains `L` exactly while `L` is a member with `C`
//!   among its children. Insert and extract update both directions under
//!   one write lock.
//!
//! ## Layering
//!
//! A child table (transient or not) sees its ancestors' members on lookup
//! and may hold links whose children live in an ancestor. Back-references
//! for such children are kept in the child table's own index, so the
//! parent is never written through a child. A parent tracks its live
//! children weakly so that removal can see links held below it: an atom
//! referenced from a descendant is either refused (non-recursive extract)
//! or has those referrers extracted from the descendant first.

mod arena;

pub use arena::AtomId;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use arena::SlotArena;
use crate::types::{Atom, AtomError, ContentHash, Handle, Type, TypeRegistry};

/// Identity of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(Uuid);

impl TableId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Where an atom is canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// Owning table.
    pub table: TableId,
    /// Slot in that table.
    pub slot: AtomId,
}

/// Error type for table operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Removal requests are never admitted.
    #[error("DeleteLink cannot be added to a table: {0}")]
    DeleteLink(String),

    /// A link references an atom that is not a member.
    #[error("Child {child} of {parent} is not a member of this table")]
    ForeignChild {
        /// The offending child.
        child: String,
        /// The link being inserted.
        parent: String,
    },

    /// Non-recursive removal of an atom that is still referenced.
    #[error("Atom {0} has a non-empty incoming set")]
    HasIncoming(String),

    /// Construction of a probe or copy failed.
    #[error(transparent)]
    Atom(#[from] AtomError),
}

#[derive(Debug)]
struct Member {
    handle: Handle,
    incoming: BTreeSet<AtomId>,
}

#[derive(Debug, Default)]
struct TableIndex {
    parent: Option<Arc<AtomTable>>,
    transient: bool,
    members: SlotArena<Member>,
    by_content: HashMap<ContentHash, Vec<AtomId>>,
    by_type: HashMap<Type, BTreeSet<AtomId>>,
    by_name: HashMap<(Type, Arc<str>), AtomId>,
    /// Incoming sets of ancestor-owned atoms, for links held here.
    foreign_incoming: HashMap<Handle, BTreeSet<AtomId>>,
    num_nodes: usize,
    num_links: usize,
}

impl TableIndex {
    fn find(&self, atom: &Atom, hash: ContentHash) -> Option<Handle> {
        self.by_content.get(&hash)?.iter().find_map(|id| {
            let member = self.members.get(*id)?;
            member.handle.is_equal(atom).then(|| member.handle.clone())
        })
    }

    fn handle(&self, id: AtomId) -> Option<Handle> {
        self.members.get(id).map(|m| m.handle.clone())
    }
}

/// Canonical atom storage with indices.
#[derive(Debug)]
pub struct AtomTable {
    id: TableId,
    registry: Arc<TypeRegistry>,
    index: RwLock<TableIndex>,
    /// Tables layered on this one; dead entries are pruned lazily.
    children: Mutex<Vec<Weak<AtomTable>>>,
}

impl AtomTable {
    /// Create an empty root table.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            id: TableId::new(),
            registry,
            index: RwLock::new(TableIndex::default()),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Create a table layered on `parent` and register it there.
    pub fn new_child(parent: Arc<AtomTable>, transient: bool) -> Arc<Self> {
        let registry = Arc::clone(&parent.registry);
        let index = TableIndex {
            parent: Some(Arc::clone(&parent)),
            transient,
            ..TableIndex::default()
        };
        let child = Arc::new(Self {
            id: TableId::new(),
            registry,
            index: RwLock::new(index),
            children: Mutex::new(Vec::new()),
        });
        parent.adopt(&child);
        child
    }

    fn adopt(&self, child: &Arc<AtomTable>) {
        let mut children = self.children.lock();
        children.retain(|w| w.strong_count() > 0);
        if !children.iter().any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(child))) {
            children.push(Arc::downgrade(child));
        }
    }

    /// Live tables whose parent is currently this one.
    fn live_children(&self) -> Vec<Arc<AtomTable>> {
        let upgraded: Vec<Arc<AtomTable>> = {
            let mut children = self.children.lock();
            children.retain(|w| w.strong_count() > 0);
            children.iter().filter_map(Weak::upgrade).collect()
        };
        upgraded
            .into_iter()
            .filter(|c| c.parent().is_some_and(|p| std::ptr::eq(Arc::as_ptr(&p), self)))
            .collect()
    }

    /// Table identity.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Shared type registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Parent table, if layered.
    pub fn parent(&self) -> Option<Arc<AtomTable>> {
        self.index.read().parent.clone()
    }

    /// Whether this is a transient scratch table.
    pub fn is_transient(&self) -> bool {
        self.index.read().transient
    }

    fn owns(&self, h: &Atom) -> bool {
        h.membership().map(|m| m.table == self.id).unwrap_or(false)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insert
    // ─────────────────────────────────────────────────────────────────────

    /// Insert `atom`, or return the member with the same content.
    ///
    /// Every child of a link must already be a member of this table or an
    /// ancestor. An atom canonical in an unrelated table is copied.
    pub fn add(&self, atom: &Handle) -> Result<Handle, TableError> {
        if atom.class().is_delete() {
            tracing::warn!(table = %self.id, atom = %atom, "rejected DeleteLink insert");
            return Err(TableError::DeleteLink(atom.to_string()));
        }
        if self.holds(atom) {
            return Ok(atom.clone());
        }
        for child in atom.outgoing() {
            if !self.holds(child) {
                return Err(TableError::ForeignChild {
                    child: child.to_string(),
                    parent: atom.to_string(),
                });
            }
        }

        let hash = atom.get_hash();
        if let Some(found) = self.lookup(atom, hash) {
            return Ok(found);
        }

        let mut index = self.index.write();
        if let Some(found) = index.find(atom, hash) {
            return Ok(found);
        }
        if let Some(found) = index.parent.as_ref().and_then(|p| p.lookup(atom, hash)) {
            return Ok(found);
        }

        let id = index.members.allocate(Member {
            handle: atom.clone(),
            incoming: BTreeSet::new(),
        });
        let membership = Membership {
            table: self.id,
            slot: id,
        };
        let handle = if atom.claim_membership(membership) {
            atom.clone()
        } else {
            let copy = atom.copy_with(atom.outgoing().to_vec())?;
            copy.set_membership(Some(membership));
            if let Some(member) = index.members.get_mut(id) {
                member.handle = copy.clone();
            }
            copy
        };

        index.by_content.entry(hash).or_default().push(id);
        index.by_type.entry(handle.get_type()).or_default().insert(id);
        if let Some(name) = handle.name_arc() {
            index.by_name.insert((handle.get_type(), Arc::clone(name)), id);
            index.num_nodes += 1;
        } else {
            index.num_links += 1;
        }
        for child in handle.outgoing() {
            match child.membership() {
                Some(m) if m.table == self.id => {
                    if let Some(member) = index.members.get_mut(m.slot) {
                        member.incoming.insert(id);
                    }
                }
                _ => {
                    index.foreign_incoming.entry(child.clone()).or_default().insert(id);
                }
            }
        }

        tracing::trace!(table = %self.id, atom = %handle, hash, "inserted atom");
        Ok(handle)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    fn lookup(&self, atom: &Atom, hash: ContentHash) -> Option<Handle> {
        let (found, parent) = {
            let index = self.index.read();
            (index.find(atom, hash), index.parent.clone())
        };
        found.or_else(|| parent.and_then(|p| p.lookup(atom, hash)))
    }

    /// Whether `h` is canonical here or in an ancestor.
    pub fn holds(&self, h: &Atom) -> bool {
        if self.owns(h) {
            return true;
        }
        self.parent().map(|p| p.holds(h)).unwrap_or(false)
    }

    /// The member with the same content as `atom`, if any.
    pub fn get_handle(&self, atom: &Handle) -> Option<Handle> {
        if self.holds(atom) {
            return Some(atom.clone());
        }
        self.lookup(atom, atom.get_hash())
    }

    /// The node member with this type and name.
    pub fn get_node_handle(&self, ty: Type, name: &str) -> Option<Handle> {
        let (found, parent) = {
            let index = self.index.read();
            let found = index
                .by_name
                .get(&(ty, Arc::from(name)))
                .and_then(|id| index.handle(*id));
            (found, index.parent.clone())
        };
        found.or_else(|| parent.and_then(|p| p.get_node_handle(ty, name)))
    }

    /// The link member with this type and outgoing set.
    pub fn get_link_handle(&self, ty: Type, outgoing: &[Handle]) -> Result<Option<Handle>, TableError> {
        let probe = Atom::link(&self.registry, ty, outgoing.to_vec())?;
        Ok(self.lookup(&probe, probe.get_hash()))
    }

    /// Members of type `ty` (and of its subtypes, if `subclasses`),
    /// ancestors' members first.
    pub fn get_handles_by_type(&self, ty: Type, subclasses: bool) -> Vec<Handle> {
        let types = if subclasses {
            self.registry.subtypes(ty)
        } else {
            vec![ty]
        };
        let mut out = self
            .parent()
            .map(|p| p.get_handles_by_type(ty, subclasses))
            .unwrap_or_default();
        let index = self.index.read();
        for t in types {
            if let Some(ids) = index.by_type.get(&t) {
                out.extend(ids.iter().filter_map(|id| index.handle(*id)));
            }
        }
        out
    }

    /// Links held here or in an ancestor that have `h` as a child.
    pub fn incoming_set(&self, h: &Handle) -> Vec<Handle> {
        let mut out = self.parent().map(|p| p.incoming_set(h)).unwrap_or_default();
        let index = self.index.read();
        let ids = match h.membership() {
            Some(m) if m.table == self.id => index.members.get(m.slot).map(|member| &member.incoming),
            _ => index.foreign_incoming.get(h),
        };
        if let Some(ids) = ids {
            out.extend(ids.iter().filter_map(|id| index.handle(*id)));
        }
        out
    }

    /// Incoming links of type `ty` (or a subtype, if `subclasses`).
    pub fn incoming_set_by_type(&self, h: &Handle, ty: Type, subclasses: bool) -> Vec<Handle> {
        self.incoming_set(h)
            .into_iter()
            .filter(|l| {
                if subclasses {
                    self.registry.is_a(l.get_type(), ty)
                } else {
                    l.get_type() == ty
                }
            })
            .collect()
    }

    /// Number of atoms held here, excluding ancestors.
    pub fn size(&self) -> usize {
        self.index.read().members.len()
    }

    /// Number of nodes held here.
    pub fn num_nodes(&self) -> usize {
        self.index.read().num_nodes
    }

    /// Number of links held here.
    pub fn num_links(&self) -> usize {
        self.index.read().num_links
    }

    /// Whether nothing is held here.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every atom held here, in slot order.
    pub fn all_atoms(&self) -> Vec<Handle> {
        self.index
            .read()
            .members
            .iter()
            .map(|(_, m)| m.handle.clone())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────

    /// Remove `h` from this table.
    ///
    /// With `recursive`, every link that (transitively) references `h` is
    /// removed first, including links held in descendant tables. Without
    /// it, an atom referenced by any link here or below is rejected and
    /// every table is left untouched. Returns the removed atoms, referrers
    /// before referents; empty if `h` is not held here.
    ///
    /// Child tables are consulted without holding this table's write lock;
    /// an insert into a child racing with the extract is not serialized
    /// against it.
    pub fn extract(&self, h: &Handle, recursive: bool) -> Result<Vec<Handle>, TableError> {
        let id = match h.membership() {
            Some(m) if m.table == self.id => m.slot,
            _ => return Ok(Vec::new()),
        };
        let children = self.live_children();
        let mut removed = Vec::new();

        if recursive {
            let doomed: Vec<Handle> = {
                let index = self.index.read();
                let mut order = Vec::new();
                removal_order(&index, id, &mut HashSet::new(), &mut order);
                order.into_iter().filter_map(|id| index.handle(id)).collect()
            };
            for target in &doomed {
                for child in &children {
                    removed.extend(child.extract_referrers(target)?);
                }
            }
        } else if children.iter().any(|c| c.references(h)) {
            tracing::warn!(table = %self.id, atom = %h, "refused to extract atom referenced from a child table");
            return Err(TableError::HasIncoming(h.to_string()));
        }

        let mut index = self.index.write();
        let Some(member) = index.members.get(id) else {
            return Ok(removed);
        };
        if !recursive && !member.incoming.is_empty() {
            tracing::warn!(table = %self.id, atom = %h, "refused to extract atom with incoming links");
            return Err(TableError::HasIncoming(h.to_string()));
        }

        let mut order = Vec::new();
        let mut seen = HashSet::new();
        removal_order(&index, id, &mut seen, &mut order);

        let from_children = removed.len();
        removed.extend(
            order
                .into_iter()
                .filter_map(|id| self.remove_member(&mut index, id)),
        );
        tracing::debug!(
            table = %self.id,
            atom = %h,
            removed = removed.len(),
            from_children,
            "extracted atom"
        );
        Ok(removed)
    }

    /// Whether a link held here or in a descendant has ancestor-owned `h`
    /// as a child.
    fn references(&self, h: &Handle) -> bool {
        let here = {
            let index = self.index.read();
            index.foreign_incoming.get(h).is_some_and(|ids| !ids.is_empty())
        };
        here || self.live_children().iter().any(|c| c.references(h))
    }

    /// Recursively extract every link here or below that has
    /// ancestor-owned `h` as a child.
    fn extract_referrers(&self, h: &Handle) -> Result<Vec<Handle>, TableError> {
        let referrers: Vec<Handle> = {
            let index = self.index.read();
            index
                .foreign_incoming
                .get(h)
                .map(|ids| ids.iter().filter_map(|id| index.handle(*id)).collect())
                .unwrap_or_default()
        };
        let mut removed = Vec::new();
        for child in self.live_children() {
            removed.extend(child.extract_referrers(h)?);
        }
        for link in referrers {
            removed.extend(self.extract(&link, true)?);
        }
        Ok(removed)
    }

    fn remove_member(&self, index: &mut TableIndex, id: AtomId) -> Option<Handle> {
        let member = index.members.deallocate(id)?;
        let handle = member.handle;
        let hash = handle.get_hash();

        if let Some(bucket) = index.by_content.get_mut(&hash) {
            bucket.retain(|x| *x != id);
            if bucket.is_empty() {
                index.by_content.remove(&hash);
            }
        }
        if let Some(ids) = index.by_type.get_mut(&handle.get_type()) {
            ids.remove(&id);
        }
        if let Some(name) = handle.name_arc() {
            index.by_name.remove(&(handle.get_type(), Arc::clone(name)));
            index.num_nodes -= 1;
        } else {
            index.num_links -= 1;
        }
        for child in handle.outgoing() {
            match child.membership() {
                Some(m) if m.table == self.id => {
                    if let Some(member) = index.members.get_mut(m.slot) {
                        member.incoming.remove(&id);
                    }
                }
                _ => {
                    if let Some(ids) = index.foreign_incoming.get_mut(child) {
                        ids.remove(&id);
                        if ids.is_empty() {
                            index.foreign_incoming.remove(child);
                        }
                    }
                }
            }
        }
        handle.set_membership(None);
        Some(handle)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transient lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Drop every local member and detach from the parent. Ancestors are
    /// not touched.
    pub fn clear_transient(&self) {
        let mut index = self.index.write();
        for (_, member) in index.members.iter() {
            member.handle.set_membership(None);
        }
        let dropped = index.members.len();
        let transient = index.transient;
        *index = TableIndex {
            transient,
            ..TableIndex::default()
        };
        tracing::debug!(table = %self.id, dropped, "cleared transient table");
    }

    /// Re-arm a cleared table as a transient child of `parent`.
    pub fn ready_transient(self: &Arc<Self>, parent: Arc<AtomTable>) {
        {
            let mut index = self.index.write();
            index.parent = Some(Arc::clone(&parent));
            index.transient = true;
        }
        parent.adopt(self);
    }
}

/// Post-order over the upward incoming closure of `id`: every referrer
/// precedes what it references.
fn removal_order(index: &TableIndex, id: AtomId, seen: &mut HashSet<AtomId>, out: &mut Vec<AtomId>) {
    if !seen.insert(id) {
        return;
    }
    if let Some(member) = index.members.get(id) {
        for referrer in &member.incoming {
            removal_order(index, *referrer, seen, out);
        }
    }
    out.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    fn make_table() -> Arc<AtomTable> {
        Arc::new(AtomTable::new(Arc::new(TypeRegistry::with_core_types())))
    }

    fn add_node(table: &AtomTable, ty: Type, name: &str) -> Handle {
        let atom = Atom::node(table.registry(), ty, name).unwrap();
        table.add(&atom).unwrap()
    }

    fn add_link(table: &AtomTable, ty: Type, out: Vec<Handle>) -> Handle {
        let atom = Atom::link(table.registry(), ty, out).unwrap();
        table.add(&atom).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insert
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_dedup() {
        let table = make_table();
        let a1 = add_node(&table, CONCEPT_NODE, "a");
        let a2 = add_node(&table, CONCEPT_NODE, "a");
        assert_eq!(a1, a2);
        assert_eq!(table.size(), 1);

        let l1 = add_link(&table, LIST_LINK, vec![a1.clone()]);
        let l2 = add_link(&table, LIST_LINK, vec![a2]);
        assert_eq!(l1, l2);
        assert_eq!(table.size(), 2);
        assert_eq!(table.num_nodes(), 1);
        assert_eq!(table.num_links(), 1);
    }

    #[test]
    fn test_foreign_child_rejected() {
        let table = make_table();
        let loose = Atom::node(table.registry(), CONCEPT_NODE, "loose").unwrap();
        let link = Atom::link(table.registry(), LIST_LINK, vec![loose]).unwrap();
        assert!(matches!(table.add(&link), Err(TableError::ForeignChild { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_delete_link_rejected() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        let del = Atom::link(table.registry(), DELETE_LINK, vec![a]).unwrap();
        assert!(matches!(table.add(&del), Err(TableError::DeleteLink(_))));
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn test_member_of_other_table_is_copied() {
        let t1 = make_table();
        let t2 = Arc::new(AtomTable::new(Arc::clone(t1.registry())));
        let a1 = add_node(&t1, CONCEPT_NODE, "a");
        let a2 = t2.add(&a1).unwrap();
        assert_ne!(a1, a2);
        assert!(*a1 == *a2);
        assert!(t2.holds(&a2));
        assert!(!t2.holds(&a1));
    }

    #[test]
    fn test_alpha_equivalent_binders_dedup() {
        let table = make_table();
        let x = add_node(&table, VARIABLE_NODE, "$x");
        let y = add_node(&table, VARIABLE_NODE, "$y");
        let bx = add_link(&table, LIST_LINK, vec![x.clone()]);
        let by = add_link(&table, LIST_LINK, vec![y.clone()]);
        let lx = add_link(&table, LAMBDA_LINK, vec![x, bx]);
        let ly = add_link(&table, LAMBDA_LINK, vec![y, by]);
        assert_eq!(lx, ly);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_lookup_by_content() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        let l = add_link(&table, LIST_LINK, vec![a.clone()]);

        assert_eq!(table.get_node_handle(CONCEPT_NODE, "a"), Some(a.clone()));
        assert_eq!(table.get_node_handle(CONCEPT_NODE, "b"), None);
        assert_eq!(table.get_link_handle(LIST_LINK, &[a.clone()]).unwrap(), Some(l.clone()));

        let probe = Atom::node(table.registry(), CONCEPT_NODE, "a").unwrap();
        assert_eq!(table.get_handle(&probe), Some(a));
    }

    #[test]
    fn test_by_type_with_subclasses() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        add_link(&table, LIST_LINK, vec![a.clone()]);
        add_link(&table, SET_LINK, vec![a]);

        assert_eq!(table.get_handles_by_type(LIST_LINK, false).len(), 1);
        assert_eq!(table.get_handles_by_type(LINK, true).len(), 2);
        assert_eq!(table.get_handles_by_type(ATOM, true).len(), 3);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Incoming sets and removal
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_incoming_set_bidirectional() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        let l = add_link(&table, LIST_LINK, vec![a.clone()]);
        let s = add_link(&table, SET_LINK, vec![a.clone()]);

        let incoming = table.incoming_set(&a);
        assert_eq!(incoming.len(), 2);
        assert!(incoming.contains(&l));
        assert_eq!(table.incoming_set_by_type(&a, SET_LINK, false), vec![s.clone()]);

        table.extract(&l, false).unwrap();
        assert_eq!(table.incoming_set(&a), vec![s]);
        assert!(l.membership().is_none());
    }

    #[test]
    fn test_extract_non_recursive_refused() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        add_link(&table, LIST_LINK, vec![a.clone()]);

        assert!(matches!(table.extract(&a, false), Err(TableError::HasIncoming(_))));
        assert_eq!(table.size(), 2);
        assert!(table.holds(&a));
    }

    #[test]
    fn test_extract_recursive() {
        let table = make_table();
        let a = add_node(&table, CONCEPT_NODE, "a");
        let b = add_node(&table, CONCEPT_NODE, "b");
        let l = add_link(&table, LIST_LINK, vec![a.clone(), b.clone()]);
        let outer = add_link(&table, LIST_LINK, vec![l.clone()]);

        let removed = table.extract(&a, true).unwrap();
        assert_eq!(removed, vec![outer, l, a]);
        assert_eq!(table.size(), 1);
        assert!(table.incoming_set(&b).is_empty());
    }

    #[test]
    fn test_extract_unknown_is_noop() {
        let table = make_table();
        let loose = Atom::node(table.registry(), CONCEPT_NODE, "x").unwrap();
        assert!(table.extract(&loose, false).unwrap().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Layering
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_transient_layering() {
        let parent = make_table();
        let a = add_node(&parent, CONCEPT_NODE, "a");

        let scratch = AtomTable::new_child(Arc::clone(&parent), true);
        assert!(scratch.is_transient());
        assert_eq!(add_node(&scratch, CONCEPT_NODE, "a"), a, "parent member visible");

        let l = add_link(&scratch, LIST_LINK, vec![a.clone()]);
        assert_eq!(scratch.incoming_set(&a), vec![l.clone()]);
        assert!(parent.incoming_set(&a).is_empty(), "parent untouched");
        assert_eq!(parent.size(), 1);

        scratch.clear_transient();
        assert!(scratch.is_empty());
        assert!(scratch.parent().is_none());
        assert!(l.membership().is_none());
        assert!(parent.holds(&a));

        scratch.ready_transient(Arc::clone(&parent));
        assert!(scratch.holds(&a));
    }

    #[test]
    fn test_extract_refused_while_child_references() {
        let parent = make_table();
        let a = add_node(&parent, CONCEPT_NODE, "a");
        let child = AtomTable::new_child(Arc::clone(&parent), false);
        let l = add_link(&child, LIST_LINK, vec![a.clone()]);

        assert!(matches!(parent.extract(&a, false), Err(TableError::HasIncoming(_))));
        assert!(parent.holds(&a));
        assert!(child.holds(&l));

        // Once the child drops its referrer the atom can go.
        child.extract(&l, false).unwrap();
        assert_eq!(parent.extract(&a, false).unwrap(), vec![a]);
    }

    #[test]
    fn test_extract_recursive_cascades_into_descendants() {
        let parent = make_table();
        let a = add_node(&parent, CONCEPT_NODE, "a");
        let b = add_node(&parent, CONCEPT_NODE, "b");
        let pl = add_link(&parent, LIST_LINK, vec![a.clone(), b.clone()]);

        let child = AtomTable::new_child(Arc::clone(&parent), false);
        let cl = add_link(&child, LIST_LINK, vec![a.clone()]);
        let grandchild = AtomTable::new_child(Arc::clone(&child), true);
        let gl = add_link(&grandchild, SET_LINK, vec![pl.clone()]);
        let gcl = add_link(&grandchild, SET_LINK, vec![cl.clone()]);

        let removed = parent.extract(&a, true).unwrap();
        for h in [&gl, &gcl, &cl, &pl, &a] {
            assert!(removed.contains(h), "{h} removed");
            assert!(h.membership().is_none());
        }
        let pos = |h: &Handle| removed.iter().position(|r| r == h).unwrap();
        assert!(pos(&gcl) < pos(&cl));
        assert!(pos(&gl) < pos(&pl));
        assert!(pos(&pl) < pos(&a));

        assert!(child.is_empty());
        assert!(grandchild.is_empty());
        assert_eq!(parent.all_atoms(), vec![b.clone()]);
        assert!(grandchild.incoming_set(&b).is_empty());
    }

    #[test]
    fn test_dropped_and_detached_children_ignored() {
        let parent = make_table();
        let a = add_node(&parent, CONCEPT_NODE, "a");

        let dropped = AtomTable::new_child(Arc::clone(&parent), false);
        add_link(&dropped, LIST_LINK, vec![a.clone()]);
        drop(dropped);

        let scratch = AtomTable::new_child(Arc::clone(&parent), true);
        add_link(&scratch, LIST_LINK, vec![a.clone()]);
        scratch.clear_transient();

        assert_eq!(parent.extract(&a, false).unwrap(), vec![a]);
    }
}
