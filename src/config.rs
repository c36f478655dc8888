//! Space configuration.

use serde::{Deserialize, Serialize};

/// Behavior switches for an [`AtomSpace`](crate::AtomSpace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Name attached to tracing events.
    pub name: String,
    /// Whether the space is scratch space over a parent.
    pub transient: bool,
    /// Consult the backing store when the table misses.
    pub fetch_on_miss: bool,
    /// Whether `==` between spaces compares truth values.
    pub check_truth_values: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            name: "atomspace".to_string(),
            transient: false,
            fetch_on_miss: true,
            check_truth_values: true,
        }
    }
}

impl SpaceConfig {
    /// Scratch-space preset: transient and never consults a backing store.
    pub fn transient() -> Self {
        Self {
            name: "transient".to_string(),
            transient: true,
            fetch_on_miss: false,
            ..Self::default()
        }
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpaceConfig::default();
        assert!(!config.transient);
        assert!(config.fetch_on_miss);
        assert!(config.check_truth_values);
    }

    #[test]
    fn test_partial_json() {
        let config = SpaceConfig::from_json(r#"{"name":"kb","fetch_on_miss":false}"#).unwrap();
        assert_eq!(config.name, "kb");
        assert!(!config.fetch_on_miss);
        assert!(config.check_truth_values);
    }

    #[test]
    fn test_transient_preset() {
        let config = SpaceConfig::transient();
        assert!(config.transient);
        assert!(!config.fetch_on_miss);
        assert!(SpaceConfig::from_json("[1]").is_err());
    }
}
