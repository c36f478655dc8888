//! Type hierarchy for atoms.
//!
//! Every atom carries a [`Type`] tag drawn from a shared [`TypeRegistry`].
//! Types form a directed acyclic "is-a" hierarchy (multiple parents are
//! allowed); behaviour such as ordering, quotation and variable binding is
//! derived from where a type falls in that hierarchy rather than from a
//! fixed enumeration, so new binder or link kinds can be declared at
//! runtime without touching the engine.
//!
//! The registry is an explicit object shared through `Arc`; there is no
//! process-wide class server.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::atom::AtomError;

/// Tag identifying the type of an atom.
///
/// Tags are dense indices into the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Type(u16);

impl Type {
    /// Create a type tag from its raw index.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Core hierarchy
// ─────────────────────────────────────────────────────────────────────────────

/// Root of the hierarchy.
pub const ATOM: Type = Type(0);
/// All named leaves.
pub const NODE: Type = Type(1);
/// All elements with an outgoing set.
pub const LINK: Type = Type(2);
/// A variable that can be bound by a binder.
pub const VARIABLE_NODE: Type = Type(3);
/// A variable matching a sequence of atoms.
pub const GLOB_NODE: Type = Type(4);
/// Names another type; used in typed variable declarations.
pub const TYPE_NODE: Type = Type(5);
/// Plain concept.
pub const CONCEPT_NODE: Type = Type(6);
/// Plain predicate.
pub const PREDICATE_NODE: Type = Type(7);
/// Plain number.
pub const NUMBER_NODE: Type = Type(8);
/// Links whose child order is significant.
pub const ORDERED_LINK: Type = Type(9);
/// Links whose child order is not significant.
pub const UNORDERED_LINK: Type = Type(10);
/// Ordered list.
pub const LIST_LINK: Type = Type(11);
/// Unordered set.
pub const SET_LINK: Type = Type(12);
/// Unordered conjunction.
pub const AND_LINK: Type = Type(13);
/// Unordered disjunction.
pub const OR_LINK: Type = Type(14);
/// Predicate application.
pub const EVALUATION_LINK: Type = Type(15);
/// Inheritance relation.
pub const INHERITANCE_LINK: Type = Type(16);
/// Ordered variable declaration list.
pub const VARIABLE_LIST: Type = Type(17);
/// `(variable, type-spec)` declaration.
pub const TYPED_VARIABLE_LINK: Type = Type(18);
/// Union of type restrictions.
pub const TYPE_CHOICE: Type = Type(19);
/// Structural type pattern.
pub const SIGNATURE_LINK: Type = Type(20);
/// Abstract parent of the quoting constructs.
pub const QUOTATION_LINK: Type = Type(21);
/// Quotes its contents.
pub const QUOTE_LINK: Type = Type(22);
/// Escapes from an enclosing quote.
pub const UNQUOTE_LINK: Type = Type(23);
/// Quotes only the immediately enclosed link.
pub const LOCAL_QUOTE_LINK: Type = Type(24);
/// Generic variable-binding construct.
pub const SCOPE_LINK: Type = Type(25);
/// Lambda abstraction.
pub const LAMBDA_LINK: Type = Type(26);
/// Beta-reduction request: body and values.
pub const PUT_LINK: Type = Type(27);
/// Scoped implication: antecedent and consequent.
pub const IMPLICATION_SCOPE_LINK: Type = Type(28);
/// Abstract parent of pattern-matching binders.
pub const PATTERN_LINK: Type = Type(29);
/// Pattern with rewrite.
pub const BIND_LINK: Type = Type(30);
/// Pattern returning groundings.
pub const GET_LINK: Type = Type(31);
/// Pattern returning satisfiability.
pub const SATISFACTION_LINK: Type = Type(32);
/// Removal request; never admitted into a table.
pub const DELETE_LINK: Type = Type(33);

const CORE_TYPES: &[(Type, &str, &[Type])] = &[
    (ATOM, "Atom", &[]),
    (NODE, "Node", &[ATOM]),
    (LINK, "Link", &[ATOM]),
    (VARIABLE_NODE, "VariableNode", &[NODE]),
    (GLOB_NODE, "GlobNode", &[NODE]),
    (TYPE_NODE, "TypeNode", &[NODE]),
    (CONCEPT_NODE, "ConceptNode", &[NODE]),
    (PREDICATE_NODE, "PredicateNode", &[NODE]),
    (NUMBER_NODE, "NumberNode", &[NODE]),
    (ORDERED_LINK, "OrderedLink", &[LINK]),
    (UNORDERED_LINK, "UnorderedLink", &[LINK]),
    (LIST_LINK, "ListLink", &[ORDERED_LINK]),
    (SET_LINK, "SetLink", &[UNORDERED_LINK]),
    (AND_LINK, "AndLink", &[UNORDERED_LINK]),
    (OR_LINK, "OrLink", &[UNORDERED_LINK]),
    (EVALUATION_LINK, "EvaluationLink", &[ORDERED_LINK]),
    (INHERITANCE_LINK, "InheritanceLink", &[ORDERED_LINK]),
    (VARIABLE_LIST, "VariableList", &[ORDERED_LINK]),
    (TYPED_VARIABLE_LINK, "TypedVariableLink", &[ORDERED_LINK]),
    (TYPE_CHOICE, "TypeChoice", &[UNORDERED_LINK]),
    (SIGNATURE_LINK, "SignatureLink", &[ORDERED_LINK]),
    (QUOTATION_LINK, "QuotationLink", &[ORDERED_LINK]),
    (QUOTE_LINK, "QuoteLink", &[QUOTATION_LINK]),
    (UNQUOTE_LINK, "UnquoteLink", &[QUOTATION_LINK]),
    (LOCAL_QUOTE_LINK, "LocalQuoteLink", &[QUOTATION_LINK]),
    (SCOPE_LINK, "ScopeLink", &[ORDERED_LINK]),
    (LAMBDA_LINK, "LambdaLink", &[SCOPE_LINK]),
    (PUT_LINK, "PutLink", &[SCOPE_LINK]),
    (IMPLICATION_SCOPE_LINK, "ImplicationScopeLink", &[SCOPE_LINK]),
    (PATTERN_LINK, "PatternLink", &[SCOPE_LINK]),
    (BIND_LINK, "BindLink", &[PATTERN_LINK]),
    (GET_LINK, "GetLink", &[PATTERN_LINK]),
    (SATISFACTION_LINK, "SatisfactionLink", &[PATTERN_LINK]),
    (DELETE_LINK, "DeleteLink", &[ORDERED_LINK]),
];

// ─────────────────────────────────────────────────────────────────────────────
// Capability summary
// ─────────────────────────────────────────────────────────────────────────────

/// Quoting construct kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    /// Quotes everything below it.
    Quote,
    /// Escapes one level of quotation.
    Unquote,
    /// Quotes only the next link down.
    LocalQuote,
}

/// Binder variant, resolved from the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Generic scope.
    Scope,
    /// Lambda abstraction.
    Lambda,
    /// Body plus values to substitute.
    Put,
    /// Antecedent plus consequent.
    Implication,
    /// Pattern plus optional rewrite.
    Pattern,
}

/// Variable declaration construct kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// Ordered list of declarations.
    VariableList,
    /// `(variable, type-spec)` pair.
    TypedVariable,
}

/// Capability summary of a type, computed once at registration.
///
/// Atoms cache the class of their type so that hashing, equality and
/// substitution never need the registry.
#[derive(Debug, Clone)]
pub struct TypeClass {
    name: Arc<str>,
    node: bool,
    unordered: bool,
    variable: bool,
    glob: bool,
    type_node: bool,
    list: bool,
    type_choice: bool,
    delete: bool,
    quote: Option<QuoteKind>,
    decl: Option<DeclKind>,
    scope: Option<ScopeKind>,
}

impl TypeClass {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the type is under `Node`.
    pub fn is_node(&self) -> bool {
        self.node
    }

    /// Whether the type is under `Link`.
    pub fn is_link(&self) -> bool {
        !self.node
    }

    /// Whether child order is insignificant.
    pub fn is_unordered(&self) -> bool {
        self.unordered
    }

    /// Whether atoms of this type are bindable variables (including globs).
    pub fn is_variable(&self) -> bool {
        self.variable || self.glob
    }

    /// Whether atoms of this type are glob variables.
    pub fn is_glob(&self) -> bool {
        self.glob
    }

    /// Whether this is a `TypeNode`.
    pub fn is_type_node(&self) -> bool {
        self.type_node
    }

    /// Whether this is a `ListLink`.
    pub fn is_list(&self) -> bool {
        self.list
    }

    /// Whether this is a `TypeChoice`.
    pub fn is_type_choice(&self) -> bool {
        self.type_choice
    }

    /// Whether this is the removal-request link.
    pub fn is_delete(&self) -> bool {
        self.delete
    }

    /// Quotation construct kind, if any.
    pub fn quote_kind(&self) -> Option<QuoteKind> {
        self.quote
    }

    /// Declaration construct kind, if any.
    pub fn decl_kind(&self) -> Option<DeclKind> {
        self.decl
    }

    /// Binder kind, if any.
    pub fn scope_kind(&self) -> Option<ScopeKind> {
        self.scope
    }

    /// Whether an atom of this type can open a binder's outgoing set as an
    /// explicit variable declaration.
    pub fn is_declaration(&self) -> bool {
        self.is_variable() || self.decl.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct TypeEntry {
    name: Arc<str>,
    parents: Vec<Type>,
    /// Transitive closure of parents, including the type itself.
    ancestors: BTreeSet<Type>,
    class: TypeClass,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Vec<TypeEntry>,
    by_name: HashMap<Arc<str>, Type>,
}

/// Shared, queryable type hierarchy.
///
/// Registration only ever appends leaves, so the ancestry of an existing
/// type never changes once issued.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the core hierarchy.
    pub fn with_core_types() -> Self {
        let registry = Self::new();
        for (ty, name, parents) in CORE_TYPES {
            let issued = registry
                .add_type(name, parents)
                .unwrap_or_else(|e| unreachable!("core hierarchy is well-formed: {e}"));
            debug_assert_eq!(issued, *ty);
        }
        registry
    }

    /// Register a new type under the given parents.
    pub fn add_type(&self, name: &str, parents: &[Type]) -> Result<Type, AtomError> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(AtomError::DuplicateType(name.to_string()));
        }
        let raw = u16::try_from(inner.entries.len())
            .map_err(|_| AtomError::RegistryFull(name.to_string()))?;
        let ty = Type(raw);

        let mut ancestors = BTreeSet::new();
        ancestors.insert(ty);
        for parent in parents {
            let entry = inner
                .entries
                .get(parent.0 as usize)
                .ok_or_else(|| AtomError::UnknownType(parent.to_string()))?;
            ancestors.extend(entry.ancestors.iter().copied());
        }

        let name: Arc<str> = Arc::from(name);
        let class = Self::derive_class(&name, &ancestors);
        inner.entries.push(TypeEntry {
            name: Arc::clone(&name),
            parents: parents.to_vec(),
            ancestors,
            class,
        });
        inner.by_name.insert(name, ty);
        tracing::trace!(type_name = %inner.entries[raw as usize].name, raw, "registered type");
        Ok(ty)
    }

    fn derive_class(name: &Arc<str>, ancestors: &BTreeSet<Type>) -> TypeClass {
        let is = |t: Type| ancestors.contains(&t);
        let quote = if is(QUOTE_LINK) {
            Some(QuoteKind::Quote)
        } else if is(UNQUOTE_LINK) {
            Some(QuoteKind::Unquote)
        } else if is(LOCAL_QUOTE_LINK) {
            Some(QuoteKind::LocalQuote)
        } else {
            None
        };
        let decl = if is(VARIABLE_LIST) {
            Some(DeclKind::VariableList)
        } else if is(TYPED_VARIABLE_LINK) {
            Some(DeclKind::TypedVariable)
        } else {
            None
        };
        let scope = if is(PUT_LINK) {
            Some(ScopeKind::Put)
        } else if is(LAMBDA_LINK) {
            Some(ScopeKind::Lambda)
        } else if is(IMPLICATION_SCOPE_LINK) {
            Some(ScopeKind::Implication)
        } else if is(PATTERN_LINK) {
            Some(ScopeKind::Pattern)
        } else if is(SCOPE_LINK) {
            Some(ScopeKind::Scope)
        } else {
            None
        };
        TypeClass {
            name: Arc::clone(name),
            node: is(NODE),
            unordered: is(UNORDERED_LINK),
            variable: is(VARIABLE_NODE),
            glob: is(GLOB_NODE),
            type_node: is(TYPE_NODE),
            list: is(LIST_LINK),
            type_choice: is(TYPE_CHOICE),
            delete: is(DELETE_LINK),
            quote,
            decl,
            scope,
        }
    }

    /// Whether `ty` is `parent` or lies beneath it.
    pub fn is_a(&self, ty: Type, parent: Type) -> bool {
        self.inner
            .read()
            .entries
            .get(ty.0 as usize)
            .map(|e| e.ancestors.contains(&parent))
            .unwrap_or(false)
    }

    /// Look up a type by name.
    pub fn get_type(&self, name: &str) -> Option<Type> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Name of a type.
    pub fn type_name(&self, ty: Type) -> Option<Arc<str>> {
        self.inner
            .read()
            .entries
            .get(ty.0 as usize)
            .map(|e| Arc::clone(&e.name))
    }

    /// Direct parents of a type.
    pub fn parents(&self, ty: Type) -> Vec<Type> {
        self.inner
            .read()
            .entries
            .get(ty.0 as usize)
            .map(|e| e.parents.clone())
            .unwrap_or_default()
    }

    /// The type itself and every type beneath it, in tag order.
    pub fn subtypes(&self, ty: Type) -> Vec<Type> {
        let inner = self.inner.read();
        (0..inner.entries.len())
            .map(|i| Type(i as u16))
            .filter(|t| inner.entries[t.0 as usize].ancestors.contains(&ty))
            .collect()
    }

    /// Capability summary of a type.
    pub fn classify(&self, ty: Type) -> Result<TypeClass, AtomError> {
        self.inner
            .read()
            .entries
            .get(ty.0 as usize)
            .map(|e| e.class.clone())
            .ok_or_else(|| AtomError::UnknownType(ty.to_string()))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
