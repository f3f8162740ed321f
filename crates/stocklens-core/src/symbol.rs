//! Ticker symbol validation and request symbol sets

use crate::error::{LensError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of symbols a single comparison request may carry.
pub const MAX_COMPARE_SYMBOLS: usize = 10;

/// Maximum accepted symbol length (covers suffixed tickers like `BRK.B`, `0700.HK`).
const MAX_SYMBOL_LEN: usize = 12;

/// A validated ticker symbol.
///
/// Accepted characters are uppercase ASCII alphanumerics plus `.`, `-`, `^`
/// and `=` (index and FX tickers). Input is trimmed and upcased before
/// validation; a symbol is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and validate a raw ticker token.
    pub fn parse(raw: &str) -> Result<Self> {
        let token = raw.trim().to_ascii_uppercase();
        if token.is_empty() || token.len() > MAX_SYMBOL_LEN {
            return Err(LensError::InvalidSymbol(raw.trim().to_string()));
        }
        let valid = token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '^' | '='));
        if !valid {
            return Err(LensError::InvalidSymbol(token));
        }
        Ok(Self(token))
    }

    /// The validated ticker text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exchange suffix after the last dot, if any (e.g. `HK` for `0700.HK`).
    pub fn suffix(&self) -> Option<&str> {
        let (base, suffix) = self.0.rsplit_once('.')?;
        if base.is_empty() || suffix.is_empty() {
            return None;
        }
        Some(suffix)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = LensError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// A deduplicated, order-preserving request symbol set, capped at
/// [`MAX_COMPARE_SYMBOLS`] entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSet(Vec<Symbol>);

impl SymbolSet {
    /// Parse a comma-separated symbol list.
    ///
    /// Invalid tokens are skipped; duplicates keep their first position;
    /// anything past the cap is dropped. An input with zero valid symbols
    /// is the only whole-request failure.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_iter(raw.split(','))
    }

    /// Build a set from raw tokens with the same dedup/cap rules as [`parse`](Self::parse).
    pub fn from_iter<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<Symbol> = Vec::new();
        for token in tokens {
            let Ok(symbol) = Symbol::parse(token.as_ref()) else {
                continue;
            };
            if symbols.contains(&symbol) {
                continue;
            }
            symbols.push(symbol);
            if symbols.len() == MAX_COMPARE_SYMBOLS {
                break;
            }
        }
        if symbols.is_empty() {
            return Err(LensError::NoValidSymbols);
        }
        Ok(Self(symbols))
    }

    /// Symbols in request order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a SymbolSet {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
