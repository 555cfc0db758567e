//! Semantic actions: turning token text into query nodes.
//!
//! Every function here is pure and field-aware. An empty field means the default field.

use std::num::ParseFloatError;

use chrono::ParseError as DateParseError;
use thiserror::Error;

use crate::{
    options::DateFormat,
    query::{
        DateRangeQuery, DisjunctionQuery, MAX_NUMERIC, MIN_NUMERIC, MatchPhraseQuery, MatchQuery,
        NumericRangeQuery, Query, RegexpQuery, UNBOUNDED_DATE, UnsupportedBoost, WildcardQuery,
    },
};

/// Boost used when `^` has no value.
pub const DEFAULT_BOOST: f64 = 1.0;

/// Fuzziness used when `~` has no value.
pub const DEFAULT_FUZZINESS: u32 = 1;

/// A clause value that could not be turned into a query node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Fuzziness text is not a number.
    #[error("invalid fuzziness value '{text}': {source}")]
    Fuzziness {
        /// The offending text.
        text: String,
        /// Underlying parse error.
        source: ParseFloatError,
    },

    /// Fuzziness is negative, not finite, or too large for an edit distance.
    #[error("invalid fuzziness value '{text}': must be a non-negative edit distance")]
    FuzzinessOutOfRange {
        /// The offending text.
        text: String,
    },

    /// Numeral text is not a number.
    #[error("error parsing number '{text}': {source}")]
    Number {
        /// The offending text.
        text: String,
        /// Underlying parse error.
        source: ParseFloatError,
    },

    /// Numeral overflows a 64-bit float.
    #[error("error parsing number '{text}': value out of range")]
    NumberOutOfRange {
        /// The offending text.
        text: String,
    },

    /// Boost text is not a number.
    #[error("invalid boost value '{text}': {source}")]
    Boost {
        /// The offending text.
        text: String,
        /// Underlying parse error.
        source: ParseFloatError,
    },

    /// Boost is negative or not finite.
    #[error("invalid boost value '{text}': must be a non-negative number")]
    BoostOutOfRange {
        /// The offending text.
        text: String,
    },

    /// Quoted date does not match the configured format.
    #[error("invalid time '{text}': {source}")]
    Date {
        /// The offending text.
        text: String,
        /// Underlying parse error.
        source: DateParseError,
    },

    /// The node cannot carry a boost.
    #[error(transparent)]
    UnsupportedBoost(#[from] UnsupportedBoost),
}

/// Comparison operator of a field range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl RangeOp {
    /// Combines a direction with an optional trailing `=`.
    pub fn new(greater: bool, or_equal: bool) -> Self {
        match (greater, or_equal) {
            (true, false) => Self::Greater,
            (true, true) => Self::GreaterOrEqual,
            (false, false) => Self::Less,
            (false, true) => Self::LessOrEqual,
        }
    }

    /// Whether the parsed value is the lower bound.
    fn is_lower(self) -> bool {
        matches!(self, Self::Greater | Self::GreaterOrEqual)
    }

    /// Whether the parsed value itself matches.
    fn is_inclusive(self) -> bool {
        matches!(self, Self::GreaterOrEqual | Self::LessOrEqual)
    }
}

/// Bare or field-qualified literal: regexp, wildcard or term match.
pub fn string_query(field: &str, text: String) -> Query {
    if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
        RegexpQuery::new(&text[1..text.len() - 1])
            .with_field(field)
            .into()
    } else if text.contains(['*', '?']) {
        WildcardQuery::new(text).with_field(field).into()
    } else {
        MatchQuery::new(text).with_field(field).into()
    }
}

/// Literal followed by `~`: a fuzzy term match.
pub fn fuzzy_query(field: &str, text: String, fuzziness: &str) -> Result<Query, BuildError> {
    let distance = parse_fuzziness(fuzziness)?;
    Ok(MatchQuery::new(text)
        .with_fuzziness(distance)
        .with_field(field)
        .into())
}

/// Bare numeral: matches either the literal text or the numeric value.
pub fn number_query(field: &str, text: String) -> Result<Query, BuildError> {
    let value = parse_number(&text)?;
    Ok(DisjunctionQuery::new()
        .add(MatchQuery::new(text).with_field(field))
        .add(NumericRangeQuery::new(value, value, true, true).with_field(field))
        .with_query_string_mode(true)
        .into())
}

/// Quoted phrase.
pub fn phrase_query(field: &str, text: String) -> Query {
    MatchPhraseQuery::new(text).with_field(field).into()
}

/// Half-open numeric range from a comparison operator.
pub fn numeric_range_query(field: &str, op: RangeOp, text: &str) -> Result<Query, BuildError> {
    let value = parse_number(text)?;
    let query = if op.is_lower() {
        NumericRangeQuery::new(value, MAX_NUMERIC, op.is_inclusive(), true)
    } else {
        NumericRangeQuery::new(MIN_NUMERIC, value, true, op.is_inclusive())
    };
    Ok(query.with_field(field).into())
}

/// Half-open date range from a comparison operator and a quoted date.
pub fn date_range_query(
    field: &str,
    op: RangeOp,
    text: &str,
    format: &DateFormat,
) -> Result<Query, BuildError> {
    let value = format.parse(text).map_err(|source| BuildError::Date {
        text: text.to_string(),
        source,
    })?;
    let query = if op.is_lower() {
        DateRangeQuery::new(value, UNBOUNDED_DATE, op.is_inclusive(), true)
    } else {
        DateRangeQuery::new(UNBOUNDED_DATE, value, true, op.is_inclusive())
    };
    Ok(query.with_field(field).into())
}

/// Parses the text after `^`. Empty text is the default boost.
pub fn parse_boost(text: &str) -> Result<f64, BuildError> {
    if text.is_empty() {
        return Ok(DEFAULT_BOOST);
    }
    let boost: f64 = text.parse().map_err(|source| BuildError::Boost {
        text: text.to_string(),
        source,
    })?;
    if !boost.is_finite() || boost < 0.0 {
        return Err(BuildError::BoostOutOfRange {
            text: text.to_string(),
        });
    }
    Ok(boost)
}

/// Applies a parsed boost to the node a clause resolved to.
pub fn apply_boost(query: Query, boost: f64) -> Result<Query, BuildError> {
    Ok(query.with_boost(boost)?)
}

/// Parses the text after `~` into an edit distance. Empty text is the default fuzziness.
fn parse_fuzziness(text: &str) -> Result<u32, BuildError> {
    if text.is_empty() {
        return Ok(DEFAULT_FUZZINESS);
    }
    let value: f64 = text.parse().map_err(|source| BuildError::Fuzziness {
        text: text.to_string(),
        source,
    })?;
    if !value.is_finite() || value < 0.0 || value.trunc() > f64::from(u32::MAX) {
        return Err(BuildError::FuzzinessOutOfRange {
            text: text.to_string(),
        });
    }
    Ok(value.trunc() as u32)
}

/// Parses a numeral, rejecting values that overflow to infinity.
fn parse_number(text: &str) -> Result<f64, BuildError> {
    let value: f64 = text.parse().map_err(|source| BuildError::Number {
        text: text.to_string(),
        source,
    })?;
    if !value.is_finite() {
        return Err(BuildError::NumberOutOfRange {
            text: text.to_string(),
        });
    }
    Ok(value)
}
