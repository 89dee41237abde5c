//! Conversions from one raw text cell into a typed value.

use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::ScalarType;

/// A single cell that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("invalid integer '{value}': {source}")]
    Integer {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid boolean literal '{value}' (expected 'true' or 'false')")]
    Boolean { value: String },
    #[error("'{value}' does not match date pattern '{pattern}': {source}")]
    Temporal {
        value: String,
        pattern: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Base-10 signed or unsigned integer of any width.
pub fn parse_integer<N>(cell: &str) -> Result<N, CoercionError>
where
    N: FromStr<Err = ParseIntError>,
{
    cell.parse().map_err(|source| CoercionError::Integer {
        value: cell.to_string(),
        source,
    })
}

/// `true` / `false`, any letter case. Anything else is an error.
pub fn parse_bool_literal(cell: &str) -> Result<bool, CoercionError> {
    if cell.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(CoercionError::Boolean {
            value: cell.to_string(),
        })
    }
}

/// Membership in the configured true-set. Never fails: a miss is `false`.
pub fn is_truthy(cell: &str, true_values: &[String], case_sensitive: bool) -> bool {
    if case_sensitive {
        true_values.iter().any(|v| v == cell)
    } else {
        let cell = cell.to_lowercase();
        true_values
            .iter()
            .any(|v| v.chars().flat_map(char::to_lowercase).eq(cell.chars()))
    }
}

/// A value one cell (or one collection token) can be coerced into.
pub trait Element: Sized + Send + Sync + 'static {
    const KIND: ScalarType;

    fn coerce(cell: &str) -> Result<Self, CoercionError>;
}

impl Element for String {
    const KIND: ScalarType = ScalarType::String;

    fn coerce(cell: &str) -> Result<Self, CoercionError> {
        Ok(cell.to_string())
    }
}

impl Element for bool {
    const KIND: ScalarType = ScalarType::Boolean;

    fn coerce(cell: &str) -> Result<Self, CoercionError> {
        parse_bool_literal(cell)
    }
}

macro_rules! integer_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                const KIND: ScalarType = ScalarType::Integer;

                fn coerce(cell: &str) -> Result<Self, CoercionError> {
                    parse_integer(cell)
                }
            }
        )*
    };
}

integer_element!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
