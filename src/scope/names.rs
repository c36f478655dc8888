//! Fresh variable names.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of fresh variable names for alpha-conversion.
///
/// Callers check the result against the names already in use and ask
/// again on a clash, so a supply only needs to be unlikely to repeat.
pub trait NameSupply: Send + Sync + fmt::Debug {
    /// A new name derived from `base`.
    fn fresh(&self, base: &str) -> String;
}

/// Random suffixes; the default for spaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNames;

impl NameSupply for UuidNames {
    fn fresh(&self, base: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{base}-{}", &id[..12])
    }
}

/// Deterministic numbered suffixes.
#[derive(Debug, Default)]
pub struct CountingNames {
    next: AtomicU64,
}

impl CountingNames {
    /// Start counting at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameSupply for CountingNames {
    fn fresh(&self, base: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{base}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_names_are_sequential() {
        let names = CountingNames::new();
        assert_eq!(names.fresh("$x"), "$x-0");
        assert_eq!(names.fresh("$x"), "$x-1");
        assert_eq!(names.fresh("$y"), "$y-2");
    }

    #[test]
    fn test_uuid_names_differ() {
        let a = UuidNames.fresh("$x");
        let b = UuidNames.fresh("$x");
        assert!(a.starts_with("$x-"));
        assert_ne!(a, b);
    }
}
