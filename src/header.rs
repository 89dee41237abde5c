use regex::Regex;
use std::collections::HashMap;
use std::fmt;

use crate::schema::SchemaError;

/// How a line (or a collection cell) is cut into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Delimiter {
    /// Split on every occurrence of the exact substring.
    Literal(String),
    /// Split on every match of a regular expression.
    Regex(String),
}

impl Delimiter {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Regex(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<&str> for Delimiter {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<String> for Delimiter {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<char> for Delimiter {
    fn from(value: char) -> Self {
        Self::Literal(value.to_string())
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s:?}"),
            Self::Regex(s) => write!(f, "/{s}/"),
        }
    }
}

/// A compiled [`Delimiter`].
#[derive(Debug, Clone)]
pub(crate) enum Splitter {
    Literal(String),
    Regex(Regex),
}

impl Splitter {
    pub(crate) fn compile(delimiter: &Delimiter) -> Result<Self, SchemaError> {
        match delimiter {
            Delimiter::Literal(s) => Ok(Self::Literal(s.clone())),
            Delimiter::Regex(p) => Regex::new(p)
                .map(Self::Regex)
                .map_err(|source| SchemaError::InvalidDelimiter {
                    delimiter: p.clone(),
                    source,
                }),
        }
    }

    /// Splits `line` into cells. Trailing empty cells are dropped, except that
    /// an input with no delimiter at all always yields itself as one cell.
    pub(crate) fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let mut cells: Vec<&str> = match self {
            Self::Literal(d) => line.split(d.as_str()).collect(),
            Self::Regex(re) => re.split(line).collect(),
        };
        if cells.len() > 1 {
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
        }
        cells
    }
}

/// Header name to zero-based column position, built from the first line of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    /// Names are trimmed. A repeated name keeps the position of its last occurrence.
    pub(crate) fn parse(line: &str, splitter: &Splitter) -> Self {
        let line = line.strip_prefix('\u{feff}').unwrap_or(line);
        let tokens = splitter.split(line);
        let width = tokens.len();
        let positions = tokens
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { positions, width }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Number of tokens on the header line, duplicates included.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
