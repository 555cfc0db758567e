//! Error types for query string parsing.
//!
//! Lexing and grammar failures are reported as [`QueryError`] diagnostics. A parse collects every
//! diagnostic it produces into one [`QueryErrors`] value, so callers see either a complete query
//! tree or the full list of problems.

use std::{error::Error, fmt, vec};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Error message.
    pub message: String,
    /// Byte position in input where error occurred.
    pub position: usize,
    /// The original input string.
    pub input: String,
}

impl LexError {
    /// Creates a new lexer error.
    pub fn new(message: impl Into<String>, position: usize, input: &str) -> Self {
        Self {
            message: message.into(),
            position,
            input: input.to_string(),
        }
    }

    /// Formats the error with a position indicator showing where the error occurred.
    pub fn format_with_context(&self) -> String {
        let mut result = String::new();
        result.push_str(&format!("query syntax error: {}\n", self.message));
        result.push_str(&format!("  {}\n", self.input));
        result.push_str(&format!("  {}^", " ".repeat(self.position)));
        result
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.position)
    }
}

impl Error for LexError {}

/// A single diagnostic produced while parsing a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// The kind of error that occurred.
    pub kind: QueryErrorKind,
    /// The original query string (if available).
    pub query: Option<String>,
}

/// The specific kind of query error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Lexer error (tokenization failed).
    Lex {
        /// Error message.
        message: String,
        /// Byte position in input.
        position: usize,
    },
    /// Token sequence does not match the grammar.
    Syntax {
        /// Error message.
        message: String,
        /// Byte position of the offending token, `None` at end of input.
        position: Option<usize>,
    },
    /// A well-formed clause carried a value that could not be interpreted.
    Value {
        /// Error message.
        message: String,
        /// Byte position of the clause that carried the value.
        position: usize,
    },
    /// The parser itself failed unexpectedly.
    Internal {
        /// Error message.
        message: String,
    },
}

impl QueryError {
    /// Creates a lex error.
    pub fn lex(message: impl Into<String>, position: usize, query: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Lex {
                message: message.into(),
                position,
            },
            query: Some(query.into()),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>, position: Option<usize>) -> Self {
        Self {
            kind: QueryErrorKind::Syntax {
                message: message.into(),
                position,
            },
            query: None,
        }
    }

    /// Creates a value error.
    pub fn value(message: impl Into<String>, position: usize) -> Self {
        Self {
            kind: QueryErrorKind::Value {
                message: message.into(),
                position,
            },
            query: None,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Internal {
                message: message.into(),
            },
            query: None,
        }
    }

    /// Sets the query string for this error.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Returns the error message without context.
    pub fn message(&self) -> &str {
        match &self.kind {
            QueryErrorKind::Lex { message, .. }
            | QueryErrorKind::Syntax { message, .. }
            | QueryErrorKind::Value { message, .. }
            | QueryErrorKind::Internal { message } => message,
        }
    }

    /// Returns the byte position the error refers to, if known.
    pub fn position(&self) -> Option<usize> {
        match &self.kind {
            QueryErrorKind::Lex { position, .. } | QueryErrorKind::Value { position, .. } => {
                Some(*position)
            }
            QueryErrorKind::Syntax { position, .. } => *position,
            QueryErrorKind::Internal { .. } => None,
        }
    }

    /// Returns a suggestion for common errors.
    pub fn suggestion(&self) -> Option<&'static str> {
        match &self.kind {
            QueryErrorKind::Lex { message, .. } if message.contains("unterminated phrase") => {
                Some("Add a closing quote (\") to complete the phrase")
            }
            QueryErrorKind::Lex { message, .. } if message.contains("escape") => {
                Some("A backslash must be followed by the character it escapes")
            }
            QueryErrorKind::Syntax { message, .. } if message.contains("quoted date after") => {
                Some("Range operators take a number or a quoted date, e.g. 'year:>=2020'")
            }
            QueryErrorKind::Syntax { message, .. } if message.contains("'^'") => {
                Some("A boost follows the term it applies to, e.g. 'rust^2'")
            }
            QueryErrorKind::Value { message, .. } if message.contains("invalid time") => {
                Some("Dates must match the configured date format (RFC 3339 by default)")
            }
            _ => None,
        }
    }

    /// Formats the error with the query and a position indicator, plus a hint when one applies.
    pub fn format_with_context(&self) -> String {
        let mut result = format!("{}: {}\n", self.prefix(), self.message());

        if let Some(query) = &self.query {
            result.push_str(&format!("  {query}\n"));
            if let Some(pos) = self.position() {
                let clamped = pos.min(query.len());
                result.push_str(&format!("  {}^\n", " ".repeat(clamped)));
            }
        }

        if let Some(suggestion) = self.suggestion() {
            result.push_str(&format!("hint: {suggestion}\n"));
        }

        result
    }

    /// Short label for the error kind.
    fn prefix(&self) -> &'static str {
        match &self.kind {
            QueryErrorKind::Lex { .. } | QueryErrorKind::Syntax { .. } => "query syntax error",
            QueryErrorKind::Value { .. } => "query value error",
            QueryErrorKind::Internal { .. } => "parse error",
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.prefix(), self.message())?;
        if let Some(pos) = self.position() {
            write!(f, " (at byte {pos})")?;
        }
        Ok(())
    }
}

impl Error for QueryError {}

impl From<LexError> for QueryError {
    fn from(err: LexError) -> Self {
        Self {
            kind: QueryErrorKind::Lex {
                message: err.message,
                position: err.position,
            },
            query: Some(err.input),
        }
    }
}

/// Every error collected during one parse, in the order they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryErrors {
    /// The collected diagnostics. Never empty.
    errors: Vec<QueryError>,
}

impl QueryErrors {
    /// Wraps a list of diagnostics, returning `None` if the list is empty.
    pub fn new(errors: Vec<QueryError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Returns the diagnostics.
    pub fn errors(&self) -> &[QueryError] {
        &self.errors
    }

    /// Returns the first diagnostic.
    pub fn first(&self) -> &QueryError {
        &self.errors[0]
    }

    /// Returns the number of diagnostics.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &QueryError> {
        self.errors.iter()
    }

    /// Renders every diagnostic with context, one block per error.
    pub fn format_with_context(&self) -> String {
        self.errors
            .iter()
            .map(QueryError::format_with_context)
            .collect::<Vec<_>>()
            .join("")
    }
}

impl fmt::Display for QueryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl Error for QueryErrors {}

impl IntoIterator for QueryErrors {
    type Item = QueryError;
    type IntoIter = vec::IntoIter<QueryError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_context() {
        let err = QueryError::lex("unterminated phrase", 0, "\"hello world");
        let display = err.format_with_context();
        assert!(display.contains("unterminated phrase"));
        assert!(display.contains("\"hello world"));
        assert!(display.contains("^"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn display_is_single_line() {
        let err = QueryError::syntax("unexpected ':'", Some(6)).with_query("field::text");
        let display = err.to_string();
        assert_eq!(display, "query syntax error: unexpected ':' (at byte 6)");
        assert!(!display.contains('\n'));
    }

    #[test]
    fn syntax_error_at_end_has_no_position() {
        let err = QueryError::syntax("unexpected end of query", None);
        assert_eq!(err.position(), None);
        assert_eq!(err.to_string(), "query syntax error: unexpected end of query");
    }

    #[test]
    fn error_with_query() {
        let err = QueryError::value("invalid boost value", 3).with_query("cat^x");
        assert_eq!(err.query.as_deref(), Some("cat^x"));
        assert!(err.format_with_context().contains("     ^"));
    }

    #[test]
    fn message_extraction() {
        let err = QueryError::lex("test message", 0, "query");
        assert_eq!(err.message(), "test message");
        assert_eq!(QueryError::internal("boom").message(), "boom");
    }

    #[test]
    fn date_error_suggestion() {
        let err = QueryError::value("invalid time 'yesterday': input contains invalid characters", 6);
        assert!(err.suggestion().unwrap().contains("date format"));
    }

    #[test]
    fn lex_error_converts_with_query() {
        let lex = LexError::new("invalid escape at end of input", 4, "cat\\");
        let err = QueryError::from(lex);
        assert_eq!(err.position(), Some(4));
        assert_eq!(err.query.as_deref(), Some("cat\\"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn errors_join_with_newlines() {
        let errors = QueryErrors::new(vec![
            QueryError::value("invalid boost value 'x'", 3),
            QueryError::value("invalid boost value 'y'", 9),
        ])
        .unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "query value error: invalid boost value 'x' (at byte 3)\n\
             query value error: invalid boost value 'y' (at byte 9)"
        );
    }

    #[test]
    fn errors_iterate_in_order() {
        let errors = QueryErrors::new(vec![
            QueryError::value("first", 1),
            QueryError::syntax("second", None),
        ])
        .unwrap();
        let messages: Vec<String> = errors
            .into_iter()
            .map(|err| err.message().to_string())
            .collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn empty_error_list_is_not_a_failure() {
        assert!(QueryErrors::new(Vec::new()).is_none());
    }
}
