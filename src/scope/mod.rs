//! Binder links.
//!
//! A binder (any type under `ScopeLink`) introduces variables that are
//! local to its body. This module extracts those variables when a binder
//! atom is constructed, and provides the alpha-equivalence machinery that
//! lets the table treat binders differing only by a consistent renaming of
//! their bound variables as the same atom.
//!
//! ## Layout of a binder's outgoing set
//!
//! ```text
//! [declaration, body, extra terms...]   explicit declaration
//! [body, extra terms...]                variables implied by the body
//! ```
//!
//! Without a declaration the variables are the free variables of the body
//! (or of every term, for implications and patterns). A body that is itself
//! a lambda lends its declaration instead. A binder whose first element is
//! a quotation construct binds nothing.

pub mod hash;
pub mod names;
pub mod quotation;
pub mod substitute;
pub mod variables;

use std::sync::Arc;

pub use names::{CountingNames, NameSupply, UuidNames};
pub use quotation::Quotation;
pub use substitute::alpha_convert;
pub use variables::{filter_vardecl, VarKey, Variables};

pub(crate) use substitute::alpha_equal;

use crate::types::{Atom, AtomError, Handle, ScopeKind, Type, TypeRegistry, BIND_LINK};

/// Binder data extracted from a binder link's outgoing set.
#[derive(Debug, Clone)]
pub struct ScopeLink {
    kind: ScopeKind,
    vardecl: Option<Handle>,
    body: Handle,
    variables: Arc<Variables>,
    /// Variables were lent by a lambda body.
    inherited: bool,
    /// First element is a quotation construct; nothing is bound.
    inert: bool,
}

impl ScopeLink {
    /// Extract binder data for a link of type `ty` and binder kind `kind`.
    pub(crate) fn extract(ty: Type, kind: ScopeKind, outgoing: &[Handle]) -> Result<Self, AtomError> {
        let first = outgoing.first().ok_or_else(|| {
            AtomError::MalformedBinder("expecting a non-empty outgoing set".to_string())
        })?;

        if first.class().quote_kind().is_some() {
            return Ok(Self {
                kind,
                vardecl: None,
                body: first.clone(),
                variables: Arc::default(),
                inherited: false,
                inert: true,
            });
        }

        if !first.class().is_declaration() {
            check_arity(ty, kind, outgoing.len())?;
            let lent = first
                .scope()
                .filter(|inner| inner.kind == ScopeKind::Lambda && !inner.inert);
            if let Some(inner) = lent {
                return Ok(Self {
                    kind,
                    vardecl: None,
                    body: inner.body.clone(),
                    variables: Arc::clone(&inner.variables),
                    inherited: true,
                    inert: false,
                });
            }
            let bound_terms = match kind {
                ScopeKind::Implication | ScopeKind::Pattern => outgoing,
                ScopeKind::Scope | ScopeKind::Lambda | ScopeKind::Put => &outgoing[..1],
            };
            return Ok(Self {
                kind,
                vardecl: None,
                body: first.clone(),
                variables: Arc::new(Variables::find_free(bound_terms)),
                inherited: false,
                inert: false,
            });
        }

        if outgoing.len() < 2 {
            return Err(AtomError::MalformedBinder(format!(
                "expecting a body after the declaration {first}"
            )));
        }
        check_arity(ty, kind, outgoing.len() - 1)?;
        Ok(Self {
            kind,
            vardecl: Some(first.clone()),
            body: outgoing[1].clone(),
            variables: Arc::new(Variables::from_declaration(first)?),
            inherited: false,
            inert: false,
        })
    }

    /// Build a binder atom, rejecting types outside the binder family.
    pub fn factory(registry: &TypeRegistry, ty: Type, outgoing: Vec<Handle>) -> Result<Handle, AtomError> {
        let class = registry.classify(ty)?;
        if class.scope_kind().is_none() {
            return Err(AtomError::TypeMismatch {
                expected: "ScopeLink".to_string(),
                got: class.name().to_string(),
            });
        }
        Atom::link(registry, ty, outgoing)
    }

    /// Binder data of `handle`, which must be of type `expected` or below.
    pub fn cast<'a>(handle: &'a Handle, registry: &TypeRegistry, expected: Type) -> Result<&'a ScopeLink, AtomError> {
        let mismatch = || AtomError::TypeMismatch {
            expected: registry
                .type_name(expected)
                .map(|n| n.to_string())
                .unwrap_or_else(|| expected.to_string()),
            got: handle.type_name().to_string(),
        };
        if !registry.is_a(handle.get_type(), expected) {
            return Err(mismatch());
        }
        handle.scope().ok_or_else(mismatch)
    }

    /// Binder variant.
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Explicit declaration, if any.
    pub fn vardecl(&self) -> Option<&Handle> {
        self.vardecl.as_ref()
    }

    /// Body: the first term after the declaration, or the lending
    /// lambda's body.
    pub fn body(&self) -> &Handle {
        &self.body
    }

    /// Bound variables.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Whether the variables were lent by a lambda body.
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Whether this binder binds nothing because it starts with a quote.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// Number of leading declaration elements (0 or 1).
    pub fn decl_offset(&self) -> usize {
        usize::from(self.vardecl.is_some())
    }

    /// Scoped terms of `atom`: everything after the declaration.
    pub fn terms<'a>(&self, atom: &'a Atom) -> &'a [Handle] {
        &atom.outgoing()[self.decl_offset().min(atom.arity())..]
    }
}

/// Per-variant term count check; `terms` excludes the declaration.
fn check_arity(ty: Type, kind: ScopeKind, terms: usize) -> Result<(), AtomError> {
    let (ok, expected) = match kind {
        ScopeKind::Scope | ScopeKind::Lambda => (terms >= 1, "at least one term"),
        ScopeKind::Put => (terms == 2, "a body and its values"),
        ScopeKind::Implication => (terms == 2, "an antecedent and a consequent"),
        ScopeKind::Pattern if ty == BIND_LINK => (terms == 2, "a pattern and a rewrite"),
        ScopeKind::Pattern => ((1..=2).contains(&terms), "a pattern and an optional rewrite"),
    };
    if ok {
        Ok(())
    } else {
        Err(AtomError::MalformedBinder(format!(
            "expecting {expected}, got {terms} terms"
        )))
    }
}
