//! Canonical serialization of atoms.
//!
//! Atoms are written as nested [`AtomRecord`]s keyed by type *names*, so a
//! snapshot stays readable by a registry that issued different tags.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: record fields serialize in declaration order
//! - Stable child order: outgoing sets serialize in index order
//! - No hash maps in serialized data

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::types::{Atom, AtomError, Handle, TruthValue, TypeRegistry};

/// Serialized form of an atom tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomRecord {
    /// A node.
    Node {
        /// Type name.
        #[serde(rename = "type")]
        type_name: String,
        /// Node name.
        name: String,
        /// Truth value, when not the default.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tv: Option<TruthValue>,
    },
    /// A link.
    Link {
        /// Type name.
        #[serde(rename = "type")]
        type_name: String,
        /// Children, in order.
        outgoing: Vec<AtomRecord>,
        /// Truth value, when not the default.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tv: Option<TruthValue>,
    },
}

impl AtomRecord {
    /// Record of `atom` and everything below it.
    pub fn from_atom(atom: &Atom) -> Self {
        let tv = Some(atom.truth_value()).filter(|tv| !tv.is_default());
        match atom.name() {
            Some(name) => Self::Node {
                type_name: atom.type_name().to_string(),
                name: name.to_string(),
                tv,
            },
            None => Self::Link {
                type_name: atom.type_name().to_string(),
                outgoing: atom.outgoing().iter().map(|h| Self::from_atom(h)).collect(),
                tv,
            },
        }
    }

    /// Rebuild a transient atom tree.
    pub fn to_atom(&self, registry: &TypeRegistry) -> Result<Handle, AtomError> {
        let resolve = |name: &str| {
            registry
                .get_type(name)
                .ok_or_else(|| AtomError::UnknownType(name.to_string()))
        };
        let (atom, tv) = match self {
            Self::Node { type_name, name, tv } => {
                (Atom::node(registry, resolve(type_name)?, name.as_str())?, tv)
            }
            Self::Link {
                type_name,
                outgoing,
                tv,
            } => {
                let children = outgoing
                    .iter()
                    .map(|r| r.to_atom(registry))
                    .collect::<Result<Vec<_>, _>>()?;
                (Atom::link(registry, resolve(type_name)?, children)?, tv)
            }
        };
        if let Some(tv) = tv {
            atom.set_truth_value(*tv);
        }
        Ok(atom)
    }
}

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    Ok(xxh64(&to_canonical_bytes(value)?, 0))
}

/// Canonical hash as a hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn test_record_shape() {
        let reg = TypeRegistry::with_core_types();
        let a = Atom::node(&reg, CONCEPT_NODE, "a").unwrap();
        a.set_truth_value(TruthValue::new(0.5, 0.25));
        let l = Atom::link(&reg, LIST_LINK, vec![a]).unwrap();

        let json = String::from_utf8(to_canonical_bytes(&AtomRecord::from_atom(&l)).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"link","type":"ListLink","outgoing":[{"kind":"node","type":"ConceptNode","name":"a","tv":{"strength":0.5,"confidence":0.25}}]}"#
        );
    }

    #[test]
    fn test_record_rebuild() {
        let reg = TypeRegistry::with_core_types();
        let x = Atom::node(&reg, VARIABLE_NODE, "$x").unwrap();
        let body = Atom::link(&reg, LIST_LINK, vec![x.clone()]).unwrap();
        let lam = Atom::link(&reg, LAMBDA_LINK, vec![x, body]).unwrap();

        let rebuilt = AtomRecord::from_atom(&lam).to_atom(&reg).unwrap();
        assert!(*rebuilt == *lam);
        assert_eq!(rebuilt.get_hash(), lam.get_hash());
    }

    #[test]
    fn test_unknown_type_name() {
        let reg = TypeRegistry::with_core_types();
        let record = AtomRecord::Node {
            type_name: "MysteryNode".to_string(),
            name: "m".to_string(),
            tv: None,
        };
        assert!(matches!(record.to_atom(&reg), Err(AtomError::UnknownType(_))));
    }

    #[test]
    fn test_hash_determinism() {
        let record = AtomRecord::Node {
            type_name: "ConceptNode".to_string(),
            name: "a".to_string(),
            tv: None,
        };
        assert_eq!(canonical_hash(&record).unwrap(), canonical_hash(&record.clone()).unwrap());
        assert_eq!(canonical_hash_hex(&record).unwrap().len(), 16);
    }
}
