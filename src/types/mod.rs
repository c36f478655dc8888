//! Core types for the atom store.

pub mod registry;
pub mod atom;
pub mod truth;

pub use registry::{
    DeclKind, QuoteKind, ScopeKind, Type, TypeClass, TypeRegistry,
    ATOM, NODE, LINK, VARIABLE_NODE, GLOB_NODE, TYPE_NODE, CONCEPT_NODE, PREDICATE_NODE,
    NUMBER_NODE, ORDERED_LINK, UNORDERED_LINK, LIST_LINK, SET_LINK, AND_LINK, OR_LINK,
    EVALUATION_LINK, INHERITANCE_LINK, VARIABLE_LIST, TYPED_VARIABLE_LINK, TYPE_CHOICE,
    SIGNATURE_LINK, QUOTATION_LINK, QUOTE_LINK, UNQUOTE_LINK, LOCAL_QUOTE_LINK, SCOPE_LINK,
    LAMBDA_LINK, PUT_LINK, IMPLICATION_SCOPE_LINK, PATTERN_LINK, BIND_LINK, GET_LINK,
    SATISFACTION_LINK, DELETE_LINK,
};
pub use atom::{Atom, AtomError, ContentHash, Handle, INVALID_HASH, LINK_HASH_BIT};
pub use truth::TruthValue;
