//! Quotation state.
//!
//! Inside a quote, variables are literal atoms: they are neither renamed
//! by hashing nor touched by substitution, and inner binders do not bind.

use crate::types::{AtomError, QuoteKind, TypeClass};

/// Quotation context at one position of a term walk.
///
/// `Copy`, so each recursion level carries its own state; advancing a
/// child's copy never affects its siblings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quotation {
    level: u32,
    /// Set by a local quote, consumed by the next link below it.
    local: bool,
}

impl Quotation {
    /// Unquoted context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current position is quoted.
    pub fn is_quoted(&self) -> bool {
        self.level > 0 || self.local
    }

    /// Whether the current position is unquoted.
    pub fn is_unquoted(&self) -> bool {
        !self.is_quoted()
    }

    /// Quote nesting depth.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Step into a link of class `class`. Unbalanced unquotes saturate at
    /// level zero.
    pub fn advance(&mut self, class: &TypeClass) {
        let local = std::mem::take(&mut self.local);
        match class.quote_kind() {
            Some(QuoteKind::Quote) => self.level += 1,
            Some(QuoteKind::Unquote) => self.level = self.level.saturating_sub(1),
            Some(QuoteKind::LocalQuote) if self.level == 0 && !local => self.local = true,
            _ => {}
        }
    }

    /// Like [`advance`](Self::advance), but an unquote at level zero is an
    /// error.
    pub fn try_advance(&mut self, class: &TypeClass) -> Result<(), AtomError> {
        if class.quote_kind() == Some(QuoteKind::Unquote) && self.level == 0 {
            return Err(AtomError::Nesting);
        }
        self.advance(class);
        Ok(())
    }
}
