//! Renaming substitution, alpha-equality and alpha-conversion.

use std::collections::{HashMap, HashSet};

use super::names::{CountingNames, NameSupply};
use super::quotation::Quotation;
use super::variables::{VarKey, Variables};
use crate::types::{Atom, AtomError, Handle};

/// Simultaneous substitution of variables by values.
///
/// Honours quotation (quoted variables are literal, an unquote outside any
/// quote is an error) and shadowing (variables rebound by an inner binder
/// are left alone). An inner binder that would capture a free variable of
/// some value is renamed to fresh names before descending into it.
pub(crate) struct Renamer<'a> {
    map: HashMap<VarKey, Handle>,
    /// Every variable occurring in some value.
    value_vars: HashSet<VarKey>,
    names: &'a dyn NameSupply,
}

impl<'a> Renamer<'a> {
    pub(crate) fn new(pairs: impl IntoIterator<Item = (Handle, Handle)>, names: &'a dyn NameSupply) -> Self {
        let mut map = HashMap::new();
        let mut value_vars = HashSet::new();
        for (var, value) in pairs {
            let key = VarKey::of(&var);
            if value.class().is_variable() && VarKey::of(&value) == key {
                continue;
            }
            collect_variable_keys(&value, &mut value_vars);
            map.insert(key, value);
        }
        Self {
            map,
            value_vars,
            names,
        }
    }

    pub(crate) fn apply(&self, term: &Handle) -> Result<Handle, AtomError> {
        if self.map.is_empty() {
            return Ok(term.clone());
        }
        self.rewrite(term, Quotation::new(), &HashSet::new())
    }

    fn rewrite(
        &self,
        term: &Handle,
        quotation: Quotation,
        shadowed: &HashSet<VarKey>,
    ) -> Result<Handle, AtomError> {
        if term.is_node() {
            if term.class().is_variable() && quotation.is_unquoted() {
                let key = VarKey::of(term);
                if !shadowed.contains(&key) {
                    if let Some(value) = self.map.get(&key) {
                        return Ok(value.clone());
                    }
                }
            }
            return Ok(term.clone());
        }

        let unquoted = quotation.is_unquoted();
        let mut inner_quotation = quotation;
        inner_quotation.try_advance(term.class())?;

        let term = if unquoted && self.would_capture(term, shadowed) {
            self.freshen(term)?
        } else {
            term.clone()
        };

        let inner_shadow;
        let shadowed = match term.scope() {
            Some(scope) if unquoted && !scope.variables().is_empty() => {
                let mut s = shadowed.clone();
                s.extend(scope.variables().keys());
                inner_shadow = s;
                &inner_shadow
            }
            _ => shadowed,
        };

        let mut changed = false;
        let mut outgoing = Vec::with_capacity(term.arity());
        for child in term.outgoing() {
            let new = self.rewrite(child, inner_quotation, shadowed)?;
            if new.ptr_eq(child) {
                outgoing.push(new);
                continue;
            }
            changed = true;
            if child.class().is_glob() && new.class().is_list() {
                outgoing.extend(new.outgoing().iter().cloned());
            } else {
                outgoing.push(new);
            }
        }
        if !changed {
            return Ok(term);
        }
        term.rebuild(outgoing)
    }

    /// Whether descending into the binder `term` would substitute a value
    /// whose variables the binder rebinds.
    fn would_capture(&self, term: &Handle, shadowed: &HashSet<VarKey>) -> bool {
        let Some(scope) = term.scope() else {
            return false;
        };
        if !scope.variables().keys().any(|k| self.value_vars.contains(&k)) {
            return false;
        }
        Variables::find_free(std::slice::from_ref(term))
            .keys()
            .any(|k| self.map.contains_key(&k) && !shadowed.contains(&k))
    }

    /// Rename the colliding variables of the binder `term` to fresh names.
    fn freshen(&self, term: &Handle) -> Result<Handle, AtomError> {
        let Some(scope) = term.scope() else {
            return Ok(term.clone());
        };
        if scope.is_inherited() {
            let mut outgoing = term.outgoing().to_vec();
            outgoing[0] = self.freshen(&outgoing[0])?;
            return term.rebuild(outgoing);
        }

        let mut avoid = self.value_vars.clone();
        avoid.extend(self.map.keys().cloned());
        collect_variable_keys(term, &mut avoid);

        let pairs: Vec<(Handle, Handle)> = scope
            .variables()
            .varseq()
            .iter()
            .filter(|v| self.value_vars.contains(&VarKey::of(v)))
            .map(|v| (v.clone(), fresh_variable(v, &mut avoid, self.names)))
            .collect();
        tracing::trace!(binder = %term, renamed = pairs.len(), "freshening inner binder");

        let inner = Renamer::new(pairs, self.names);
        let outgoing = term
            .outgoing()
            .iter()
            .map(|child| inner.rewrite(child, Quotation::new(), &HashSet::new()))
            .collect::<Result<Vec<_>, _>>()?;
        term.rebuild(outgoing)
    }
}

/// Add the key of every variable node anywhere in `term`.
pub(crate) fn collect_variable_keys(term: &Handle, out: &mut HashSet<VarKey>) {
    if term.class().is_variable() {
        out.insert(VarKey::of(term));
    }
    for child in term.outgoing() {
        collect_variable_keys(child, out);
    }
}

/// A variable like `var`, under a name absent from `avoid`.
fn fresh_variable(var: &Handle, avoid: &mut HashSet<VarKey>, names: &dyn NameSupply) -> Handle {
    let base = var.name().unwrap_or("$var");
    loop {
        let name = names.fresh(base);
        if avoid.insert(VarKey::new(var.get_type(), &name)) {
            return var.renamed(name);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Alpha-equality
// ─────────────────────────────────────────────────────────────────────────────

/// Equality of two binder atoms up to renaming of their bound variables.
pub(crate) fn alpha_equal(this: &Atom, other: &Atom) -> bool {
    if std::ptr::eq(this, other) {
        return true;
    }
    if this.get_type() != other.get_type() {
        return false;
    }
    let (Some(ours), Some(theirs)) = (this.scope(), other.scope()) else {
        return false;
    };
    if this.get_hash() != other.get_hash() {
        return false;
    }

    let our_terms = ours.terms(this);
    let their_terms = theirs.terms(other);
    if our_terms.len() != their_terms.len() {
        return false;
    }

    let our_vars = ours.variables();
    let their_vars = theirs.variables();
    if !our_vars.is_equal(their_vars) {
        return false;
    }

    if our_vars.is_identical(their_vars) {
        return our_terms
            .iter()
            .zip(their_terms)
            .all(|(a, b)| a.is_equal(b));
    }

    // One of our variables occurring free in the other binder would be
    // conflated with a bound one by the renaming.
    let conflated = Variables::find_free(their_terms)
        .varseq()
        .iter()
        .any(|v| !their_vars.contains(v) && our_vars.contains(v));
    if conflated {
        return false;
    }

    let names = CountingNames::new();
    let renamer = Renamer::new(
        their_vars
            .varseq()
            .iter()
            .cloned()
            .zip(our_vars.varseq().iter().cloned()),
        &names,
    );
    our_terms.iter().zip(their_terms).all(|(a, b)| match renamer.apply(b) {
        Ok(renamed) => a.is_equal(&renamed),
        Err(_) => false,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Alpha-conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Rename the bound variables of `atom` to `vars`, or to fresh names from
/// `names` when `vars` is `None`.
///
/// The result is a new transient atom carrying the same truth value. A
/// target that already occurs free in the body is rejected with
/// [`AtomError::VariableCapture`].
pub fn alpha_convert(
    atom: &Handle,
    vars: Option<&[Handle]>,
    names: &dyn NameSupply,
) -> Result<Handle, AtomError> {
    let scope = atom.scope().ok_or_else(|| AtomError::TypeMismatch {
        expected: "ScopeLink".to_string(),
        got: atom.type_name().to_string(),
    })?;
    if scope.is_inert() {
        return Ok(atom.clone());
    }
    if scope.is_inherited() {
        let mut outgoing = atom.outgoing().to_vec();
        outgoing[0] = alpha_convert(&outgoing[0], vars, names)?;
        return atom.rebuild(outgoing);
    }

    let old = scope.variables();
    let terms = scope.terms(atom);
    let free = Variables::find_free(terms);

    let targets: Vec<Handle> = match vars {
        Some(targets) => {
            if targets.len() != old.len() {
                return Err(AtomError::InvalidOutgoing {
                    type_name: atom.type_name().to_string(),
                    reason: format!(
                        "expecting {} replacement variables, got {}",
                        old.len(),
                        targets.len()
                    ),
                });
            }
            let mut seen = HashSet::new();
            for t in targets {
                if !t.class().is_variable() {
                    return Err(AtomError::TypeMismatch {
                        expected: "a variable".to_string(),
                        got: t.to_string(),
                    });
                }
                let key = VarKey::of(t);
                if !seen.insert(key.clone()) {
                    return Err(AtomError::DuplicateVariable(key.name().to_string()));
                }
                if free.contains_key(&key) && !old.contains_key(&key) {
                    return Err(AtomError::VariableCapture(key.name().to_string()));
                }
            }
            targets.to_vec()
        }
        None => {
            let mut avoid = HashSet::new();
            collect_variable_keys(atom, &mut avoid);
            old.varseq()
                .iter()
                .map(|v| fresh_variable(v, &mut avoid, names))
                .collect()
        }
    };

    let renamer = Renamer::new(old.varseq().iter().cloned().zip(targets), names);
    let new_terms = terms
        .iter()
        .map(|t| renamer.apply(t))
        .collect::<Result<Vec<_>, _>>()?;

    let mut outgoing = Vec::with_capacity(atom.arity());
    if let Some(decl) = scope.vardecl() {
        // Every declared slot survives, vacuous ones included; dropping one
        // would change the binder's arity.
        outgoing.push(renamer.apply(decl)?);
    }
    outgoing.extend(new_terms);
    let converted = atom.rebuild(outgoing)?;
    tracing::debug!(from = %atom, to = %converted, "alpha-converted binder");
    Ok(converted)
}
