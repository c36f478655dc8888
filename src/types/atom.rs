//! Atoms and handles.
//!
//! An [`Atom`] is an immutable typed graph element: a node (type + name)
//! or a link (type + ordered outgoing set). Atoms are shared through
//! [`Handle`]s; children are owned downward, while back-references
//! (incoming sets) live only in the table that owns the atom.
//!
//! ## Identity
//!
//! - `Handle == Handle` is pointer identity. Inside one table, content
//!   addressing makes this coincide with content identity.
//! - `Atom == Atom` (and [`Atom::is_equal`]) is structural. Binder links
//!   compare up to consistent renaming of their bound variables.
//!
//! ## Content hash
//!
//! Computed on first demand and memoized; never changes afterwards. Link
//! hashes always carry [`LINK_HASH_BIT`]; node hashes never do.
//! [`INVALID_HASH`] is never produced.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use xxhash_rust::xxh64::xxh64;

use super::registry::{DeclKind, Type, TypeClass, TypeRegistry};
use super::truth::TruthValue;
use crate::scope::{self, ScopeLink};
use crate::table::Membership;

/// 64-bit structural content hash.
pub type ContentHash = u64;

/// Reserved sentinel meaning "no hash".
pub const INVALID_HASH: ContentHash = u64::MAX;

/// Marker carried by every link hash.
pub const LINK_HASH_BIT: ContentHash = 1 << 63;

const LINK_TYPE_FACTOR: u64 = (1 << 44) - 377;
const LINK_ARITY_FACTOR: u64 = (1 << 29) - 33;
const LINK_MODULUS: u64 = (1 << 63) - 409;

/// Error raised while constructing or transforming atoms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtomError {
    /// Binder outgoing set has the wrong shape.
    #[error("Malformed binder: {0}")]
    MalformedBinder(String),
    /// Type does not fall under the expected branch of the hierarchy.
    #[error("Type mismatch: expecting {expected}, got {got}")]
    TypeMismatch {
        /// Expected type or branch.
        expected: String,
        /// Type actually supplied.
        got: String,
    },
    /// Type tag or type name is not registered.
    #[error("Unknown type: {0}")]
    UnknownType(String),
    /// Type name registered twice.
    #[error("Type already registered: {0}")]
    DuplicateType(String),
    /// Every type tag is already issued.
    #[error("Type registry full, cannot register {0}")]
    RegistryFull(String),
    /// Outgoing set violates the structural rules of its type.
    #[error("Invalid outgoing set for {type_name}: {reason}")]
    InvalidOutgoing {
        /// Type being constructed.
        type_name: String,
        /// What is wrong.
        reason: String,
    },
    /// The same variable is declared twice.
    #[error("Duplicate variable in declaration: {0}")]
    DuplicateVariable(String),
    /// Unquote encountered outside of any quote.
    #[error("Unbalanced quotation: unquote outside of a quote")]
    Nesting,
    /// Renaming would capture or conflate a free variable.
    #[error("Renaming to {0} would capture a free variable")]
    VariableCapture(String),
}

#[derive(Debug)]
enum AtomBody {
    Node {
        name: Arc<str>,
        /// For `TypeNode`s, the type they name.
        names_type: Option<Type>,
    },
    Link(Vec<Handle>),
}

/// Typed graph element.
pub struct Atom {
    ty: Type,
    class: TypeClass,
    body: AtomBody,
    /// Binder data, present exactly when the type is a binder.
    scope: Option<ScopeLink>,
    tv: RwLock<TruthValue>,
    hash: OnceLock<ContentHash>,
    membership: Mutex<Option<Membership>>,
}

/// Shared reference to an atom.
///
/// "No atom" is expressed as `Option<Handle>::None` wherever a lookup can
/// miss.
#[derive(Clone)]
pub struct Handle(Arc<Atom>);

impl Atom {
    /// Build a transient node.
    ///
    /// `TypeNode` names must name a registered type.
    pub fn node(
        registry: &TypeRegistry,
        ty: Type,
        name: impl Into<Arc<str>>,
    ) -> Result<Handle, AtomError> {
        let class = registry.classify(ty)?;
        if !class.is_node() {
            return Err(AtomError::TypeMismatch {
                expected: "a node type".to_string(),
                got: class.name().to_string(),
            });
        }
        let name = name.into();
        let names_type = if class.is_type_node() {
            Some(
                registry
                    .get_type(&name)
                    .ok_or_else(|| AtomError::UnknownType(name.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self::assemble(
            ty,
            class,
            AtomBody::Node { name, names_type },
            None,
            TruthValue::default(),
        ))
    }

    /// Build a transient link.
    ///
    /// Binder types run variable extraction here; a malformed binder is
    /// rejected before any atom exists.
    pub fn link(
        registry: &TypeRegistry,
        ty: Type,
        outgoing: Vec<Handle>,
    ) -> Result<Handle, AtomError> {
        let class = registry.classify(ty)?;
        if class.is_node() {
            return Err(AtomError::TypeMismatch {
                expected: "a link type".to_string(),
                got: class.name().to_string(),
            });
        }
        Self::link_with_class(ty, class, outgoing, TruthValue::default())
    }

    pub(crate) fn link_with_class(
        ty: Type,
        class: TypeClass,
        outgoing: Vec<Handle>,
        tv: TruthValue,
    ) -> Result<Handle, AtomError> {
        Self::check_declaration_shape(&class, &outgoing)?;
        let scope = match class.scope_kind() {
            Some(kind) => Some(ScopeLink::extract(ty, kind, &outgoing)?),
            None => None,
        };
        Ok(Self::assemble(ty, class, AtomBody::Link(outgoing), scope, tv))
    }

    /// Node of the same type and class under a different name.
    pub(crate) fn renamed(&self, name: impl Into<Arc<str>>) -> Handle {
        let names_type = self.named_type();
        Self::assemble(
            self.ty,
            self.class.clone(),
            AtomBody::Node {
                name: name.into(),
                names_type,
            },
            None,
            TruthValue::default(),
        )
    }

    fn assemble(
        ty: Type,
        class: TypeClass,
        body: AtomBody,
        scope: Option<ScopeLink>,
        tv: TruthValue,
    ) -> Handle {
        Handle(Arc::new(Self {
            ty,
            class,
            body,
            scope,
            tv: RwLock::new(tv),
            hash: OnceLock::new(),
            membership: Mutex::new(None),
        }))
    }

    fn check_declaration_shape(class: &TypeClass, outgoing: &[Handle]) -> Result<(), AtomError> {
        let invalid = |reason: &str| AtomError::InvalidOutgoing {
            type_name: class.name().to_string(),
            reason: reason.to_string(),
        };
        match class.decl_kind() {
            Some(DeclKind::TypedVariable) => {
                if outgoing.len() != 2 {
                    return Err(invalid("expecting (variable, type-spec)"));
                }
                if !outgoing[0].class().is_variable() {
                    return Err(invalid("first element must be a variable"));
                }
            }
            Some(DeclKind::VariableList) => {
                let ok = outgoing.iter().all(|h| {
                    h.class().is_variable()
                        || h.class().decl_kind() == Some(DeclKind::TypedVariable)
                });
                if !ok {
                    return Err(invalid("elements must be variables or typed variables"));
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Same type, class and truth value over a new outgoing set.
    ///
    /// Binder data is re-extracted, so renamings that break a declaration
    /// surface as errors.
    pub(crate) fn rebuild(&self, outgoing: Vec<Handle>) -> Result<Handle, AtomError> {
        Self::link_with_class(self.ty, self.class.clone(), outgoing, self.truth_value())
    }

    /// Fresh, non-member copy of a node; links are copied over `outgoing`.
    pub(crate) fn copy_with(&self, outgoing: Vec<Handle>) -> Result<Handle, AtomError> {
        match &self.body {
            AtomBody::Node { name, names_type } => Ok(Self::assemble(
                self.ty,
                self.class.clone(),
                AtomBody::Node {
                    name: Arc::clone(name),
                    names_type: *names_type,
                },
                None,
                self.truth_value(),
            )),
            AtomBody::Link(_) => self.rebuild(outgoing),
        }
    }

    /// Fully detached copy: every atom in the tree is a fresh object with
    /// no table membership.
    pub fn deep_copy(&self) -> Result<Handle, AtomError> {
        let outgoing = self
            .outgoing()
            .iter()
            .map(|h| h.deep_copy())
            .collect::<Result<Vec<_>, _>>()?;
        self.copy_with(outgoing)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Type tag.
    pub fn get_type(&self) -> Type {
        self.ty
    }

    /// Cached capability summary of the type.
    pub fn class(&self) -> &TypeClass {
        &self.class
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        self.class.name()
    }

    /// Whether this is a node.
    pub fn is_node(&self) -> bool {
        matches!(self.body, AtomBody::Node { .. })
    }

    /// Whether this is a link.
    pub fn is_link(&self) -> bool {
        matches!(self.body, AtomBody::Link(_))
    }

    /// Name, for nodes.
    pub fn name(&self) -> Option<&str> {
        match &self.body {
            AtomBody::Node { name, .. } => Some(name),
            AtomBody::Link(_) => None,
        }
    }

    pub(crate) fn name_arc(&self) -> Option<&Arc<str>> {
        match &self.body {
            AtomBody::Node { name, .. } => Some(name),
            AtomBody::Link(_) => None,
        }
    }

    /// Type named by a `TypeNode`.
    pub fn named_type(&self) -> Option<Type> {
        match &self.body {
            AtomBody::Node { names_type, .. } => *names_type,
            AtomBody::Link(_) => None,
        }
    }

    /// Outgoing set; empty for nodes.
    pub fn outgoing(&self) -> &[Handle] {
        match &self.body {
            AtomBody::Node { .. } => &[],
            AtomBody::Link(out) => out,
        }
    }

    /// Number of children.
    pub fn arity(&self) -> usize {
        self.outgoing().len()
    }

    /// Binder data, for binder links.
    pub fn scope(&self) -> Option<&ScopeLink> {
        self.scope.as_ref()
    }

    /// Current truth value.
    pub fn truth_value(&self) -> TruthValue {
        *self.tv.read()
    }

    /// Replace the truth value.
    pub fn set_truth_value(&self, tv: TruthValue) {
        *self.tv.write() = tv;
    }

    /// Table membership, if the atom is canonical in some table.
    pub fn membership(&self) -> Option<Membership> {
        *self.membership.lock()
    }

    pub(crate) fn set_membership(&self, membership: Option<Membership>) {
        *self.membership.lock() = membership;
    }

    /// Take membership if the atom has none; false if another table got
    /// there first.
    pub(crate) fn claim_membership(&self, membership: Membership) -> bool {
        let mut slot = self.membership.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(membership);
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hashing and equality
    // ─────────────────────────────────────────────────────────────────────

    /// Memoized content hash.
    ///
    /// Concurrent first calls are safe; the value is deterministic so
    /// whichever computation lands first is the one every caller sees.
    pub fn get_hash(&self) -> ContentHash {
        *self.hash.get_or_init(|| self.compute_hash())
    }

    fn compute_hash(&self) -> ContentHash {
        match (&self.body, &self.scope) {
            (AtomBody::Node { name, .. }, _) => {
                xxh64(name.as_bytes(), u64::from(self.ty.raw())) & !LINK_HASH_BIT
            }
            (AtomBody::Link(_), Some(binder)) => scope::hash::compute_hash(self, binder),
            (AtomBody::Link(out), None) => {
                let mut hsh = LINK_TYPE_FACTOR.wrapping_mul(u64::from(self.ty.raw()) + 1);
                hsh = hsh.wrapping_add(LINK_ARITY_FACTOR.wrapping_mul(out.len() as u64));
                if self.class.is_unordered() {
                    let sum = out.iter().fold(0u64, |acc, h| acc.wrapping_add(h.get_hash()));
                    hsh = hsh.wrapping_add(sum);
                } else {
                    for h in out {
                        hsh = hsh.wrapping_mul(33).wrapping_add(h.get_hash());
                    }
                }
                finish_link_hash(hsh, LINK_MODULUS)
            }
        }
    }

    /// Structural equality; binders compare up to alpha-equivalence.
    pub fn is_equal(&self, other: &Atom) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.ty != other.ty {
            return false;
        }
        match (&self.body, &other.body) {
            (AtomBody::Node { name: a, .. }, AtomBody::Node { name: b, .. }) => a == b,
            (AtomBody::Link(a), AtomBody::Link(b)) => {
                if self.scope.is_some() {
                    return scope::alpha_equal(self, other);
                }
                if a.len() != b.len() || self.get_hash() != other.get_hash() {
                    return false;
                }
                if self.class.is_unordered() {
                    unordered_match(a, b)
                } else {
                    a.iter().zip(b).all(|(x, y)| x.is_equal(y))
                }
            }
            _ => false,
        }
    }
}

/// Reduce a link hash into range, set the link marker, and keep clear of
/// the invalid sentinel.
pub(crate) fn finish_link_hash(hsh: u64, modulus: u64) -> ContentHash {
    let mut hsh = (hsh % modulus) | LINK_HASH_BIT;
    if hsh == INVALID_HASH {
        hsh -= 1;
    }
    hsh
}

/// Multiset equality of two child sequences.
fn unordered_match(a: &[Handle], b: &[Handle]) -> bool {
    let mut used = vec![false; b.len()];
    for x in a {
        let found = b
            .iter()
            .enumerate()
            .find(|(j, y)| !used[*j] && x.is_equal(y))
            .map(|(j, _)| j);
        match found {
            Some(j) => used[j] = true,
            None => return false,
        }
    }
    true
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            AtomBody::Node { name, .. } => write!(f, "({} {:?})", self.type_name(), name),
            AtomBody::Link(out) => {
                write!(f, "({}", self.type_name())?;
                for h in out {
                    write!(f, " {}", h)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

impl Handle {
    /// Whether two handles reference the same atom object.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Handle {
    type Target = Atom;

    fn deref(&self) -> &Atom {
        &self.0
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::registry::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_core_types()
    }

    fn concept(reg: &TypeRegistry, name: &str) -> Handle {
        Atom::node(reg, CONCEPT_NODE, name).unwrap()
    }

    #[test]
    fn test_node_identity_and_hash() {
        let reg = registry();
        let a1 = concept(&reg, "a");
        let a2 = concept(&reg, "a");
        let b = concept(&reg, "b");

        assert!(a1 != a2, "distinct objects are distinct handles");
        assert!(*a1 == *a2, "but structurally equal");
        assert_eq!(a1.get_hash(), a2.get_hash());
        assert!(*a1 != *b);
        assert_eq!(a1.get_hash() & LINK_HASH_BIT, 0);
    }

    #[test]
    fn test_link_hash_marker() {
        let reg = registry();
        let l = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "a")]).unwrap();
        assert_ne!(l.get_hash() & LINK_HASH_BIT, 0);
        assert_ne!(l.get_hash(), INVALID_HASH);
    }

    #[test]
    fn test_ordered_vs_unordered() {
        let reg = registry();
        let a = concept(&reg, "a");
        let b = concept(&reg, "b");

        let l1 = Atom::link(&reg, LIST_LINK, vec![a.clone(), b.clone()]).unwrap();
        let l2 = Atom::link(&reg, LIST_LINK, vec![b.clone(), a.clone()]).unwrap();
        assert_ne!(l1.get_hash(), l2.get_hash());
        assert!(*l1 != *l2);

        let s1 = Atom::link(&reg, SET_LINK, vec![a.clone(), b.clone()]).unwrap();
        let s2 = Atom::link(&reg, SET_LINK, vec![b, a]).unwrap();
        assert_eq!(s1.get_hash(), s2.get_hash());
        assert!(*s1 == *s2);
    }

    #[test]
    fn test_unordered_multiplicity() {
        let reg = registry();
        let a = concept(&reg, "a");
        let b = concept(&reg, "b");
        let s1 = Atom::link(&reg, SET_LINK, vec![a.clone(), a.clone(), b.clone()]).unwrap();
        let s2 = Atom::link(&reg, SET_LINK, vec![a.clone(), b.clone(), b]).unwrap();
        assert!(*s1 != *s2);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let reg = registry();
        assert!(matches!(
            Atom::node(&reg, LIST_LINK, "x"),
            Err(AtomError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Atom::link(&reg, CONCEPT_NODE, vec![]),
            Err(AtomError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_type_node_must_name_a_type() {
        let reg = registry();
        let ok = Atom::node(&reg, TYPE_NODE, "ConceptNode").unwrap();
        assert_eq!(ok.named_type(), Some(CONCEPT_NODE));
        assert!(matches!(
            Atom::node(&reg, TYPE_NODE, "NoSuchNode"),
            Err(AtomError::UnknownType(_))
        ));
    }

    #[test]
    fn test_typed_variable_shape() {
        let reg = registry();
        let x = Atom::node(&reg, VARIABLE_NODE, "$x").unwrap();
        let t = Atom::node(&reg, TYPE_NODE, "ConceptNode").unwrap();
        assert!(Atom::link(&reg, TYPED_VARIABLE_LINK, vec![x.clone(), t.clone()]).is_ok());
        assert!(Atom::link(&reg, TYPED_VARIABLE_LINK, vec![t.clone(), x]).is_err());
        assert!(Atom::link(&reg, VARIABLE_LIST, vec![t]).is_err());
    }

    #[test]
    fn test_display() {
        let reg = registry();
        let l = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "a")]).unwrap();
        assert_eq!(l.to_string(), "(ListLink (ConceptNode \"a\"))");
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let reg = registry();
        let a = concept(&reg, "a");
        a.set_truth_value(TruthValue::new(0.5, 0.5));
        let l = Atom::link(&reg, LIST_LINK, vec![a.clone()]).unwrap();
        let copy = l.deep_copy().unwrap();
        assert!(copy != l);
        assert!(*copy == *l);
        assert!(copy.outgoing()[0] != a);
        assert_eq!(copy.outgoing()[0].truth_value(), TruthValue::new(0.5, 0.5));
    }
}
