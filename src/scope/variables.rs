//! Declared variables of a binder.
//!
//! A [`Variables`] record is parsed from an explicit declaration
//! (`VariableNode`, `GlobNode`, `TypedVariableLink` or a `VariableList` of
//! those) or collected from the free variables of a body.
//!
//! Variables are keyed by content ([`VarKey`]: type and name), not by
//! handle identity, so that two distinct objects for `$x` are the same
//! variable whether or not either is a table member.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::names::CountingNames;
use super::quotation::Quotation;
use super::substitute::Renamer;
use crate::types::{Atom, AtomError, DeclKind, Handle, Type, TypeRegistry};

/// Content identity of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarKey {
    ty: Type,
    name: Arc<str>,
}

impl VarKey {
    /// Key of a variable atom.
    pub fn of(atom: &Atom) -> Self {
        Self {
            ty: atom.get_type(),
            name: atom.name_arc().cloned().unwrap_or_else(|| Arc::from("")),
        }
    }

    /// Key for a type and name.
    pub fn new(ty: Type, name: &str) -> Self {
        Self {
            ty,
            name: Arc::from(name),
        }
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered, typed variable declarations.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    varseq: Vec<Handle>,
    varset: HashSet<VarKey>,
    index: HashMap<VarKey, usize>,
    simple_typemap: HashMap<VarKey, BTreeSet<Type>>,
    deep_typemap: HashMap<VarKey, Vec<Handle>>,
}

impl Variables {
    /// No variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an explicit declaration atom.
    pub fn from_declaration(decl: &Handle) -> Result<Self, AtomError> {
        let mut vars = Self::default();
        match decl.class().decl_kind() {
            Some(DeclKind::VariableList) => {
                for d in decl.outgoing() {
                    vars.declare(d)?;
                }
            }
            _ => vars.declare(decl)?,
        }
        Ok(vars)
    }

    /// Free variables of `terms`, in order of first occurrence.
    ///
    /// Quoted variables and variables rebound by an inner binder are not
    /// free.
    pub fn find_free(terms: &[Handle]) -> Self {
        let mut vars = Self::default();
        let shadowed = HashSet::new();
        for term in terms {
            vars.collect_free(term, Quotation::new(), &shadowed);
        }
        vars
    }

    fn collect_free(&mut self, term: &Handle, quotation: Quotation, shadowed: &HashSet<VarKey>) {
        if term.is_node() {
            if term.class().is_variable() && quotation.is_unquoted() {
                let key = VarKey::of(term);
                if !shadowed.contains(&key) && !self.varset.contains(&key) {
                    self.insert(key, term.clone());
                }
            }
            return;
        }

        let unquoted = quotation.is_unquoted();
        let mut quotation = quotation;
        quotation.advance(term.class());
        match term.scope() {
            Some(scope) if unquoted && !scope.variables().is_empty() => {
                let mut inner = shadowed.clone();
                inner.extend(scope.variables().keys());
                for child in term.outgoing() {
                    self.collect_free(child, quotation, &inner);
                }
            }
            _ => {
                for child in term.outgoing() {
                    self.collect_free(child, quotation, shadowed);
                }
            }
        }
    }

    fn declare(&mut self, decl: &Handle) -> Result<(), AtomError> {
        if decl.class().is_variable() {
            return self.push(decl, BTreeSet::new(), Vec::new());
        }
        if decl.class().decl_kind() == Some(DeclKind::TypedVariable) {
            if let [var, spec] = decl.outgoing() {
                let (simple, deep) = parse_type_spec(spec);
                return self.push(var, simple, deep);
            }
        }
        Err(AtomError::MalformedBinder(format!(
            "not a variable declaration: {decl}"
        )))
    }

    fn push(&mut self, var: &Handle, simple: BTreeSet<Type>, deep: Vec<Handle>) -> Result<(), AtomError> {
        let key = VarKey::of(var);
        if self.varset.contains(&key) {
            return Err(AtomError::DuplicateVariable(key.name.to_string()));
        }
        if !simple.is_empty() {
            self.simple_typemap.insert(key.clone(), simple);
        }
        if !deep.is_empty() {
            self.deep_typemap.insert(key.clone(), deep);
        }
        self.insert(key, var.clone());
        Ok(())
    }

    fn insert(&mut self, key: VarKey, var: Handle) {
        self.index.insert(key.clone(), self.varseq.len());
        self.varset.insert(key);
        self.varseq.push(var);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Variables in declaration order.
    pub fn varseq(&self) -> &[Handle] {
        &self.varseq
    }

    /// Keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = VarKey> + '_ {
        self.varseq.iter().map(|v| VarKey::of(v))
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.varseq.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.varseq.is_empty()
    }

    /// Whether `var` is declared.
    pub fn contains(&self, var: &Atom) -> bool {
        self.varset.contains(&VarKey::of(var))
    }

    /// Whether the key is declared.
    pub fn contains_key(&self, key: &VarKey) -> bool {
        self.varset.contains(key)
    }

    /// Ordinal of `var` in the declaration.
    pub fn index_of(&self, var: &Atom) -> Option<usize> {
        self.index.get(&VarKey::of(var)).copied()
    }

    /// Simple (type-tag) restriction of `var`.
    pub fn simple_types(&self, var: &Atom) -> Option<&BTreeSet<Type>> {
        self.simple_typemap.get(&VarKey::of(var))
    }

    /// Deep (structural) restriction of `var`.
    pub fn deep_types(&self, var: &Atom) -> Option<&[Handle]> {
        self.deep_typemap.get(&VarKey::of(var)).map(Vec::as_slice)
    }

    pub(crate) fn simple_restrictions(&self) -> impl Iterator<Item = Type> + '_ {
        self.simple_typemap.values().flat_map(|s| s.iter().copied())
    }

    pub(crate) fn deep_restrictions(&self) -> impl Iterator<Item = &Handle> + '_ {
        self.deep_typemap.values().flatten()
    }

    /// Same arity, and the same variable kind and type restriction at every
    /// position. Names may differ.
    pub fn is_equal(&self, other: &Variables) -> bool {
        if self.varseq.len() != other.varseq.len() {
            return false;
        }
        self.varseq.iter().zip(&other.varseq).all(|(a, b)| {
            a.get_type() == b.get_type()
                && self.simple_types(a) == other.simple_types(b)
                && same_patterns(self.deep_types(a), other.deep_types(b))
        })
    }

    /// Equal, and with the same names at every position.
    pub fn is_identical(&self, other: &Variables) -> bool {
        self.is_equal(other)
            && self
                .varseq
                .iter()
                .zip(&other.varseq)
                .all(|(a, b)| VarKey::of(a) == VarKey::of(b))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Substitution and typing
    // ─────────────────────────────────────────────────────────────────────

    /// Replace each declared variable in `term` by the value at the same
    /// position, without checking type restrictions.
    ///
    /// Quoted and shadowed occurrences are left alone; inner binders that
    /// would capture a value are renamed first.
    pub fn substitute_nocheck(&self, term: &Handle, values: &[Handle]) -> Result<Handle, AtomError> {
        if values.len() != self.varseq.len() {
            return Err(AtomError::InvalidOutgoing {
                type_name: "Variables".to_string(),
                reason: format!(
                    "expecting {} values, got {}",
                    self.varseq.len(),
                    values.len()
                ),
            });
        }
        let names = CountingNames::new();
        Renamer::new(self.varseq.iter().cloned().zip(values.iter().cloned()), &names).apply(term)
    }

    /// Like [`substitute_nocheck`](Self::substitute_nocheck), but every
    /// value must satisfy its variable's restriction.
    pub fn substitute(
        &self,
        registry: &TypeRegistry,
        term: &Handle,
        values: &[Handle],
    ) -> Result<Handle, AtomError> {
        for (var, value) in self.varseq.iter().zip(values) {
            if !self.is_admissible(registry, var, value) {
                return Err(AtomError::TypeMismatch {
                    expected: format!("a value admissible for {var}"),
                    got: value.to_string(),
                });
            }
        }
        self.substitute_nocheck(term, values)
    }

    /// Whether `value` satisfies the restriction declared for `var`.
    ///
    /// Undeclared and unrestricted variables admit anything. A glob bound
    /// to a `ListLink` is admissible when every element is.
    pub fn is_admissible(&self, registry: &TypeRegistry, var: &Atom, value: &Atom) -> bool {
        if var.class().is_glob() && value.class().is_list() {
            return value
                .outgoing()
                .iter()
                .all(|v| self.is_admissible_one(registry, var, v));
        }
        self.is_admissible_one(registry, var, value)
    }

    fn is_admissible_one(&self, registry: &TypeRegistry, var: &Atom, value: &Atom) -> bool {
        let simple = self.simple_types(var);
        let deep = self.deep_types(var);
        if simple.is_none() && deep.is_none() {
            return true;
        }
        let simple_ok = simple
            .map(|types| types.iter().any(|t| registry.is_a(value.get_type(), *t)))
            .unwrap_or(false);
        simple_ok
            || deep
                .map(|patterns| patterns.iter().any(|p| deep_match(registry, p, value)))
                .unwrap_or(false)
    }
}

/// Split a type spec into simple type tags and deep patterns.
fn parse_type_spec(spec: &Handle) -> (BTreeSet<Type>, Vec<Handle>) {
    let mut simple = BTreeSet::new();
    let mut deep = Vec::new();
    let mut classify = |h: &Handle| match h.named_type() {
        Some(t) => {
            simple.insert(t);
        }
        None => deep.push(h.clone()),
    };
    if spec.class().is_type_choice() {
        spec.outgoing().iter().for_each(&mut classify);
    } else {
        classify(spec);
    }
    (simple, deep)
}

fn same_patterns(a: Option<&[Handle]>, b: Option<&[Handle]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) if a.len() == b.len() => {
            let mut used = vec![false; b.len()];
            a.iter().all(|p| {
                match (0..b.len()).find(|&j| !used[j] && p.is_equal(&b[j])) {
                    Some(j) => {
                        used[j] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        _ => false,
    }
}

/// Structural match of a value against a deep type pattern. A `TypeNode`
/// in the pattern matches any atom of that type; a `SignatureLink`
/// wrapper is transparent.
fn deep_match(registry: &TypeRegistry, pattern: &Atom, value: &Atom) -> bool {
    if let Some(t) = pattern.named_type() {
        return registry.is_a(value.get_type(), t);
    }
    if pattern.get_type() == crate::types::SIGNATURE_LINK {
        if let [inner] = pattern.outgoing() {
            return deep_match(registry, inner, value);
        }
    }
    if pattern.is_node() {
        return pattern.is_equal(value);
    }
    if pattern.get_type() != value.get_type() || pattern.arity() != value.arity() {
        return false;
    }
    if pattern.class().is_unordered() {
        let mut used = vec![false; value.arity()];
        pattern.outgoing().iter().all(|p| {
            match (0..value.arity()).find(|&j| !used[j] && deep_match(registry, p, &value.outgoing()[j])) {
                Some(j) => {
                    used[j] = true;
                    true
                }
                None => false,
            }
        })
    } else {
        pattern
            .outgoing()
            .iter()
            .zip(value.outgoing())
            .all(|(p, v)| deep_match(registry, p, v))
    }
}

/// Declared variable of a single declaration element.
pub(crate) fn declared_variable(decl: &Handle) -> Option<&Handle> {
    if decl.class().is_variable() {
        return Some(decl);
    }
    match (decl.class().decl_kind(), decl.outgoing()) {
        (Some(DeclKind::TypedVariable), [var, _]) => Some(var),
        _ => None,
    }
}

/// Drop declarations of variables that no longer occur free in `terms`.
///
/// Only `VariableList` declarations are filtered; an emptied list stays in
/// place so that the binder does not fall back to binding whatever is free.
pub fn filter_vardecl(decl: &Handle, terms: &[Handle]) -> Result<Handle, AtomError> {
    if decl.class().decl_kind() != Some(DeclKind::VariableList) {
        return Ok(decl.clone());
    }
    let free = Variables::find_free(terms);
    let kept: Vec<Handle> = decl
        .outgoing()
        .iter()
        .filter(|d| declared_variable(d).map(|v| free.contains(v)).unwrap_or(false))
        .cloned()
        .collect();
    if kept.len() == decl.arity() {
        return Ok(decl.clone());
    }
    decl.rebuild(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn reg() -> TypeRegistry {
        TypeRegistry::with_core_types()
    }

    fn var(reg: &TypeRegistry, name: &str) -> Handle {
        Atom::node(reg, VARIABLE_NODE, name).unwrap()
    }

    fn concept(reg: &TypeRegistry, name: &str) -> Handle {
        Atom::node(reg, CONCEPT_NODE, name).unwrap()
    }

    fn type_node(reg: &TypeRegistry, name: &str) -> Handle {
        Atom::node(reg, TYPE_NODE, name).unwrap()
    }

    fn typed(reg: &TypeRegistry, v: &Handle, spec: &Handle) -> Handle {
        Atom::link(reg, TYPED_VARIABLE_LINK, vec![v.clone(), spec.clone()]).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Parsing
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_variable_list() {
        let reg = reg();
        let x = var(&reg, "$x");
        let y = var(&reg, "$y");
        let t = type_node(&reg, "ConceptNode");
        let decl = Atom::link(&reg, VARIABLE_LIST, vec![x.clone(), typed(&reg, &y, &t)]).unwrap();

        let vars = Variables::from_declaration(&decl).unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.index_of(&x), Some(0));
        assert_eq!(vars.index_of(&y), Some(1));
        assert!(vars.simple_types(&x).is_none());
        assert!(vars.simple_types(&y).unwrap().contains(&CONCEPT_NODE));
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let reg = reg();
        let decl = Atom::link(&reg, VARIABLE_LIST, vec![var(&reg, "$x"), var(&reg, "$x")]).unwrap();
        assert!(matches!(
            Variables::from_declaration(&decl),
            Err(AtomError::DuplicateVariable(_))
        ));
    }

    #[test]
    fn test_type_choice_splits_simple_and_deep() {
        let reg = reg();
        let x = var(&reg, "$x");
        let sig = Atom::link(
            &reg,
            SIGNATURE_LINK,
            vec![Atom::link(&reg, LIST_LINK, vec![type_node(&reg, "ConceptNode")]).unwrap()],
        )
        .unwrap();
        let choice = Atom::link(&reg, TYPE_CHOICE, vec![type_node(&reg, "NumberNode"), sig]).unwrap();
        let vars = Variables::from_declaration(&typed(&reg, &x, &choice)).unwrap();

        assert_eq!(vars.simple_types(&x).unwrap().len(), 1);
        assert_eq!(vars.deep_types(&x).unwrap().len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Free variables
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_find_free_order_and_quotes() {
        let reg = reg();
        let x = var(&reg, "$x");
        let y = var(&reg, "$y");
        let z = var(&reg, "$z");
        let quoted = Atom::link(&reg, QUOTE_LINK, vec![z.clone()]).unwrap();
        let body = Atom::link(&reg, LIST_LINK, vec![y.clone(), x.clone(), y.clone(), quoted]).unwrap();

        let free = Variables::find_free(&[body]);
        let names: Vec<_> = free.varseq().iter().map(|v| v.name().unwrap().to_string()).collect();
        assert_eq!(names, vec!["$y", "$x"]);
        assert!(!free.contains(&z));
    }

    #[test]
    fn test_find_free_respects_inner_binder() {
        let reg = reg();
        let x = var(&reg, "$x");
        let y = var(&reg, "$y");
        let inner_body = Atom::link(&reg, LIST_LINK, vec![x.clone(), y.clone()]).unwrap();
        let inner = Atom::link(&reg, LAMBDA_LINK, vec![x.clone(), inner_body]).unwrap();

        let free = Variables::find_free(&[inner]);
        assert!(free.contains(&y));
        assert!(!free.contains(&x));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Comparison
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_equal_vs_identical() {
        let reg = reg();
        let t = type_node(&reg, "ConceptNode");
        let a = Variables::from_declaration(&typed(&reg, &var(&reg, "$x"), &t)).unwrap();
        let b = Variables::from_declaration(&typed(&reg, &var(&reg, "$z"), &t)).unwrap();
        let c = Variables::from_declaration(&var(&reg, "$x")).unwrap();

        assert!(a.is_equal(&b));
        assert!(!a.is_identical(&b));
        assert!(!a.is_equal(&c), "restriction differs");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Substitution and admissibility
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_substitute_nocheck() {
        let reg = reg();
        let x = var(&reg, "$x");
        let a = concept(&reg, "a");
        let body = Atom::link(&reg, LIST_LINK, vec![x.clone(), concept(&reg, "b")]).unwrap();
        let vars = Variables::from_declaration(&x).unwrap();

        let out = vars.substitute_nocheck(&body, &[a.clone()]).unwrap();
        assert_eq!(out.outgoing()[0], a);
        assert!(vars.substitute_nocheck(&body, &[]).is_err());
    }

    #[test]
    fn test_glob_splices_list() {
        let reg = reg();
        let g = Atom::node(&reg, GLOB_NODE, "$g").unwrap();
        let body = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "head"), g.clone()]).unwrap();
        let values = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "a"), concept(&reg, "b")]).unwrap();
        let vars = Variables::from_declaration(&g).unwrap();

        let out = vars.substitute_nocheck(&body, &[values]).unwrap();
        assert_eq!(out.arity(), 3);
        assert_eq!(out.outgoing()[2].name(), Some("b"));
    }

    #[test]
    fn test_admissibility() {
        let reg = reg();
        let x = var(&reg, "$x");
        let vars = Variables::from_declaration(&typed(&reg, &x, &type_node(&reg, "ConceptNode"))).unwrap();
        let num = Atom::node(&reg, NUMBER_NODE, "3").unwrap();

        assert!(vars.is_admissible(&reg, &x, &concept(&reg, "a")));
        assert!(!vars.is_admissible(&reg, &x, &num));
        assert!(vars.substitute(&reg, &x, &[num]).is_err());
        assert!(vars.is_admissible(&reg, &var(&reg, "$other"), &concept(&reg, "a")));
    }

    #[test]
    fn test_deep_admissibility() {
        let reg = reg();
        let x = var(&reg, "$x");
        let pattern = Atom::link(
            &reg,
            SIGNATURE_LINK,
            vec![Atom::link(&reg, LIST_LINK, vec![type_node(&reg, "ConceptNode")]).unwrap()],
        )
        .unwrap();
        let vars = Variables::from_declaration(&typed(&reg, &x, &pattern)).unwrap();

        let ok = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "a")]).unwrap();
        let bad = Atom::link(&reg, LIST_LINK, vec![concept(&reg, "a"), concept(&reg, "b")]).unwrap();
        assert!(vars.is_admissible(&reg, &x, &ok));
        assert!(!vars.is_admissible(&reg, &x, &bad));
    }

    #[test]
    fn test_filter_vardecl_keeps_list_shape() {
        let reg = reg();
        let x = var(&reg, "$x");
        let y = var(&reg, "$y");
        let decl = Atom::link(&reg, VARIABLE_LIST, vec![x.clone(), y]).unwrap();
        let body = Atom::link(&reg, LIST_LINK, vec![x]).unwrap();

        let filtered = filter_vardecl(&decl, &[body.clone()]).unwrap();
        assert_eq!(filtered.arity(), 1);

        let empty = filter_vardecl(&decl, &[concept(&reg, "c")]).unwrap();
        assert_eq!(empty.get_type(), VARIABLE_LIST);
        assert_eq!(empty.arity(), 0);
    }
}
