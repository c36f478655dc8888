//! Property tests for the hashing and table invariants.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use atomspace_kernel::types::*;
use atomspace_kernel::AtomTable;

fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::with_core_types())
}

fn concept(reg: &TypeRegistry, name: &str) -> Handle {
    Atom::node(reg, CONCEPT_NODE, name).unwrap()
}

fn arb_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e]{1,2}", 1..20)
}

/// Binder over `n` variables whose body lists variables (by index) and a
/// constant, with variables named `{prefix}{i}`.
fn make_binder(reg: &TypeRegistry, ty: Type, prefix: &str, n: usize, body: &[usize]) -> Handle {
    let var = |i: usize| Atom::node(reg, VARIABLE_NODE, format!("${prefix}{i}").as_str()).unwrap();
    let decl = Atom::link(reg, VARIABLE_LIST, (0..n).map(var).collect()).unwrap();
    let mut terms: Vec<Handle> = body.iter().map(|i| var(i % n)).collect();
    terms.push(concept(reg, "k"));
    let body = Atom::link(reg, LIST_LINK, terms).unwrap();
    Atom::link(reg, ty, vec![decl, body]).unwrap()
}

proptest! {
    /// Adding the same content any number of times yields one member.
    #[test]
    fn prop_dedup_idempotence(names in arb_names()) {
        let reg = registry();
        let table = AtomTable::new(Arc::clone(&reg));
        let mut members = Vec::new();
        for name in &names {
            let first = table.add(&concept(&reg, name)).unwrap();
            let second = table.add(&concept(&reg, name)).unwrap();
            prop_assert!(first.ptr_eq(&second));
            members.push(first);
        }
        let distinct: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(table.size(), distinct.len());

        let l1 = table.add(&Atom::link(&reg, LIST_LINK, members.clone()).unwrap()).unwrap();
        let l2 = table.add(&Atom::link(&reg, LIST_LINK, members).unwrap()).unwrap();
        prop_assert!(l1.ptr_eq(&l2));
        prop_assert_eq!(table.size(), distinct.len() + 1);
    }

    /// Consistently renaming the bound variables keeps hash and equality.
    #[test]
    fn prop_alpha_invariance(n in 1usize..4, body in prop::collection::vec(0usize..4, 0..6)) {
        let reg = registry();
        for ty in [SCOPE_LINK, LAMBDA_LINK] {
            let a = make_binder(&reg, ty, "x", n, &body);
            let b = make_binder(&reg, ty, "renamed", n, &body);
            prop_assert_eq!(a.get_hash(), b.get_hash());
            prop_assert!(*a == *b);
            prop_assert_ne!(a.get_hash() & LINK_HASH_BIT, 0);
        }
    }

    /// Permuting children never matters for unordered links.
    #[test]
    fn prop_unordered_permutation(names in arb_names(), rotation in 0usize..20) {
        let reg = registry();
        let children: Vec<Handle> = names.iter().map(|n| concept(&reg, n)).collect();
        let mut permuted = children.clone();
        permuted.rotate_left(rotation % children.len());
        permuted.reverse();

        let a = Atom::link(&reg, SET_LINK, children).unwrap();
        let b = Atom::link(&reg, SET_LINK, permuted).unwrap();
        prop_assert_eq!(a.get_hash(), b.get_hash());
        prop_assert!(*a == *b);
    }

    /// Swapping two distinct children of an ordered link changes it.
    #[test]
    fn prop_ordered_swap(a in "[a-z]{1,4}", b in "[a-z]{1,4}") {
        prop_assume!(a != b);
        let reg = registry();
        let (x, y) = (concept(&reg, &a), concept(&reg, &b));
        let ab = Atom::link(&reg, LIST_LINK, vec![x.clone(), y.clone()]).unwrap();
        let ba = Atom::link(&reg, LIST_LINK, vec![y, x]).unwrap();
        prop_assert_ne!(ab.get_hash(), ba.get_hash());
        prop_assert!(*ab != *ba);
    }

    /// `L` is in `C`'s incoming set exactly while `L` is a member with `C`
    /// among its children.
    #[test]
    fn prop_incoming_bidirectional(
        links in prop::collection::vec(prop::collection::vec(0usize..5, 1..4), 1..8),
        removals in prop::collection::vec(0usize..8, 0..4),
    ) {
        let reg = registry();
        let table = AtomTable::new(Arc::clone(&reg));
        let nodes: Vec<Handle> = (0..5)
            .map(|i| table.add(&concept(&reg, &format!("n{i}"))).unwrap())
            .collect();
        let mut members: Vec<Handle> = links
            .iter()
            .map(|idx| {
                let outgoing = idx.iter().map(|i| nodes[*i].clone()).collect();
                table.add(&Atom::link(&reg, LIST_LINK, outgoing).unwrap()).unwrap()
            })
            .collect();
        for r in removals {
            if let Some(l) = members.get(r % members.len()).cloned() {
                table.extract(&l, false).unwrap();
            }
        }
        members.retain(|l| table.holds(l));

        for node in &nodes {
            let incoming = table.incoming_set(node);
            for l in &members {
                let references = l.outgoing().iter().any(|c| c.ptr_eq(node));
                prop_assert_eq!(incoming.iter().any(|i| i.ptr_eq(l)), references);
            }
            for i in &incoming {
                prop_assert!(table.holds(i));
            }
        }
    }
}
