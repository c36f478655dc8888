//! Alpha-invariant content hashing for binders.
//!
//! Bound variables never contribute their names: an occurrence bound by
//! the binder being hashed contributes its ordinal in the declaration, and
//! an occurrence bound by a nested binder contributes that binder's depth
//! together with its ordinal there. Two binders differing only by a
//! consistent renaming therefore hash equally, including when nested.
//!
//! Type restrictions are accumulated by plain addition so the result does
//! not depend on declaration order of identically typed variables.
//! Unordered links accumulate children the same way; ordered links mix
//! positionally.

use super::quotation::Quotation;
use super::variables::Variables;
use super::ScopeLink;
use crate::types::atom::finish_link_hash;
use crate::types::{Atom, ContentHash, Handle};

const TYPE_FACTOR: u64 = (1 << 35) - 325;
const ARITY_FACTOR: u64 = (1 << 47) - 649;
const SIMPLE_RESTRICTION_FACTOR: u64 = (1 << 19) - 87;
const RESTRICTION_MODULUS: u64 = (1 << 27) - 235;
const ORDINAL_FACTOR: u64 = (1 << 24) - 77;
const DEPTH_FACTOR: u64 = (1 << 40) - 87;
const TERM_TYPE_FACTOR: u64 = (1 << 8) - 59;
const TERM_MODULUS: u64 = (1 << 63) - 471;
const SCOPE_MODULUS: u64 = (1 << 63) - 409;

#[inline]
fn mix(hsh: u64, value: u64) -> u64 {
    hsh.wrapping_mul(33).wrapping_add(value)
}

/// Content hash of the binder `atom`.
pub(crate) fn compute_hash(atom: &Atom, scope: &ScopeLink) -> ContentHash {
    let vars = scope.variables();

    let mut hsh = TYPE_FACTOR.wrapping_mul(u64::from(atom.get_type().raw()));
    hsh = mix(hsh, ARITY_FACTOR.wrapping_mul(vars.len() as u64));
    hsh = mix(hsh, restriction_hash(vars) % RESTRICTION_MODULUS);

    let mut frames = vec![vars];
    for term in scope.terms(atom) {
        hsh = mix(hsh, term_hash(term, &mut frames, Quotation::new()));
    }
    finish_link_hash(hsh, SCOPE_MODULUS)
}

/// Order-independent accumulation of every declared restriction.
fn restriction_hash(vars: &Variables) -> u64 {
    let simple = vars
        .simple_restrictions()
        .fold(0u64, |acc, t| acc.wrapping_add(SIMPLE_RESTRICTION_FACTOR.wrapping_mul(u64::from(t.raw()))));
    vars.deep_restrictions()
        .fold(simple, |acc, h| acc.wrapping_add(h.get_hash()))
}

/// Hash of one body term. `frames[0]` is the binder being hashed; later
/// frames are the nested binders enclosing the current position.
fn term_hash<'a>(h: &'a Handle, frames: &mut Vec<&'a Variables>, quotation: Quotation) -> u64 {
    if h.class().is_variable() && quotation.is_unquoted() {
        let bound = frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, vars)| vars.index_of(h).map(|ordinal| (depth, ordinal)));
        if let Some((depth, ordinal)) = bound {
            let slot = ORDINAL_FACTOR.wrapping_mul(1 + ordinal as u64);
            return slot.wrapping_add(DEPTH_FACTOR.wrapping_mul(depth as u64));
        }
    }

    if h.is_node() {
        return h.get_hash();
    }

    let unquoted = quotation.is_unquoted();
    let mut quotation = quotation;
    quotation.advance(h.class());

    let pushed = match h.scope() {
        Some(inner) if unquoted => {
            frames.push(inner.variables());
            true
        }
        _ => false,
    };

    let ordered = !h.class().is_unordered();
    let mut hsh = TERM_TYPE_FACTOR.wrapping_mul(u64::from(h.get_type().raw()));
    for child in h.outgoing() {
        let child_hash = term_hash(child, frames, quotation);
        hsh = if ordered {
            mix(hsh, child_hash)
        } else {
            hsh.wrapping_add(child_hash)
        };
    }

    if pushed {
        frames.pop();
    }
    hsh % TERM_MODULUS
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    fn reg() -> TypeRegistry {
        TypeRegistry::with_core_types()
    }

    fn var(reg: &TypeRegistry, name: &str) -> Handle {
        Atom::node(reg, VARIABLE_NODE, name).unwrap()
    }

    fn scope_over(reg: &TypeRegistry, ty: Type, vars: &[&str], body: Handle) -> Handle {
        let decl = Atom::link(reg, VARIABLE_LIST, vars.iter().map(|v| var(reg, v)).collect()).unwrap();
        Atom::link(reg, ty, vec![decl, body]).unwrap()
    }

    #[test]
    fn test_hash_ignores_bound_names() {
        let reg = reg();
        let body = |x: &str| {
            Atom::link(&reg, EVALUATION_LINK, vec![
                Atom::node(&reg, PREDICATE_NODE, "p").unwrap(),
                var(&reg, x),
            ])
            .unwrap()
        };
        let a = scope_over(&reg, SCOPE_LINK, &["$x"], body("$x"));
        let b = scope_over(&reg, SCOPE_LINK, &["$renamed"], body("$renamed"));
        assert_eq!(a.get_hash(), b.get_hash());
        assert_ne!(a.get_hash() & LINK_HASH_BIT, 0);
    }

    #[test]
    fn test_hash_sees_free_names() {
        let reg = reg();
        let body = |free: &str| {
            Atom::link(&reg, LIST_LINK, vec![var(&reg, "$x"), var(&reg, free)]).unwrap()
        };
        let decl = var(&reg, "$x");
        let a = Atom::link(&reg, SCOPE_LINK, vec![decl.clone(), body("$a")]).unwrap();
        let b = Atom::link(&reg, SCOPE_LINK, vec![decl, body("$b")]).unwrap();
        assert_ne!(a.get_hash(), b.get_hash());
    }

    #[test]
    fn test_hash_depends_on_binder_type() {
        let reg = reg();
        let body = Atom::link(&reg, LIST_LINK, vec![var(&reg, "$x")]).unwrap();
        let a = scope_over(&reg, SCOPE_LINK, &["$x"], body.clone());
        let b = scope_over(&reg, LAMBDA_LINK, &["$x"], body);
        assert_ne!(a.get_hash(), b.get_hash());
    }

    #[test]
    fn test_hash_unordered_body() {
        let reg = reg();
        let set = |a: &str, b: &str| {
            Atom::link(&reg, SET_LINK, vec![var(&reg, a), var(&reg, b)]).unwrap()
        };
        let a = scope_over(&reg, SCOPE_LINK, &["$x", "$y"], set("$x", "$y"));
        let b = scope_over(&reg, SCOPE_LINK, &["$x", "$y"], set("$y", "$x"));
        assert_eq!(a.get_hash(), b.get_hash());
    }

    #[test]
    fn test_hash_quoted_variable_keeps_name() {
        let reg = reg();
        let quoted = |x: &str| {
            Atom::link(&reg, LIST_LINK, vec![
                var(&reg, x),
                Atom::link(&reg, QUOTE_LINK, vec![var(&reg, x)]).unwrap(),
            ])
            .unwrap()
        };
        let a = scope_over(&reg, SCOPE_LINK, &["$x"], quoted("$x"));
        let b = scope_over(&reg, SCOPE_LINK, &["$y"], quoted("$y"));
        assert_ne!(a.get_hash(), b.get_hash());
    }
}
