use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Separator between the fields of a symbol, e.g. `"OpnRepOK,"`.
pub const FIELD_SEPARATOR: char = ',';

// ---------------------------------------------------------------------------
// Letter
// ---------------------------------------------------------------------------

/// One symbolic protocol action or observed response.
///
/// A letter may carry several equally specific symbols; the smallest one is
/// the canonical representative and is the only one used for comparisons
/// against markers or for field counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Letter {
    symbols: BTreeSet<String>,
}

impl Letter {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbols: BTreeSet::from([symbol.into()]),
        }
    }

    /// Build a letter from several symbols. Returns `None` for an empty set.
    pub fn from_symbols<I, S>(symbols: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: BTreeSet<String> = symbols.into_iter().map(Into::into).collect();
        if symbols.is_empty() {
            None
        } else {
            Some(Self { symbols })
        }
    }

    pub fn canonical(&self) -> &str {
        self.symbols.iter().next().map(String::as_str).unwrap_or("")
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Number of reply messages carried by the canonical symbol: each message
    /// contributes one `"X,"` field, so the trailing separator terminates the
    /// last field instead of opening an empty one.
    pub fn field_count(&self) -> usize {
        self.canonical()
            .split(FIELD_SEPARATOR)
            .filter(|field| !field.trim().is_empty())
            .count()
    }

    /// Last non-terminator field of the canonical symbol: `"Eof,"` yields
    /// `"Eof"`, `"Err,BadSession"` yields `"BadSession"`.
    pub fn last_field(&self) -> &str {
        let symbol = self.canonical().trim();
        let symbol = symbol.strip_suffix(FIELD_SEPARATOR).unwrap_or(symbol);
        symbol.rsplit(FIELD_SEPARATOR).next().unwrap_or("").trim()
    }

    /// Whether the canonical symbol is exactly `marker`, ignoring surrounding
    /// whitespace.
    pub fn is(&self, marker: &str) -> bool {
        self.canonical().trim() == marker
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<&str> for Letter {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Letter {
    fn from(symbol: String) -> Self {
        Self::new(symbol)
    }
}

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

/// An ordered, finite sequence of letters. Query words and the response words
/// they produce are aligned position by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    letters: Vec<Letter>,
}

impl Word {
    pub fn new(letters: Vec<Letter>) -> Self {
        Self { letters }
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        symbols.into_iter().map(|s| Letter::new(s)).collect()
    }

    pub fn letters(&self) -> &[Letter] {
        &self.letters
    }

    pub fn into_letters(self) -> Vec<Letter> {
        self.letters
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    pub fn last(&self) -> Option<&Letter> {
        self.letters.last()
    }

    pub fn push(&mut self, letter: Letter) {
        self.letters.push(letter);
    }

    /// The first `len` letters as a new word. `len` is clamped to the word's
    /// length.
    pub fn prefix(&self, len: usize) -> Word {
        Word::new(self.letters[..len.min(self.letters.len())].to_vec())
    }

    pub fn is_prefix_of(&self, other: &Word) -> bool {
        other.letters.starts_with(&self.letters)
    }

    /// Append copies of `filler` until the word is `len` letters long.
    pub fn pad_to(&mut self, len: usize, filler: &Letter) {
        while self.letters.len() < len {
            self.letters.push(filler.clone());
        }
    }

    /// Canonical symbols in order, as handed to the protocol mapper.
    pub fn symbols(&self) -> Vec<String> {
        self.letters
            .iter()
            .map(|l| l.canonical().to_string())
            .collect()
    }
}

impl FromIterator<Letter> for Word {
    fn from_iter<T: IntoIterator<Item = Letter>>(iter: T) -> Self {
        Self {
            letters: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, letter) in self.letters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{letter}")?;
        }
        write!(f, "]")
    }
}
