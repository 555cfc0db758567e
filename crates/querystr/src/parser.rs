//! Query string parser.
//!
//! Pulls tokens from the lexer one at a time and parses them by recursive descent with a single
//! token of lookahead and no backtracking.
//!
//! # Grammar
//!
//! ```text
//! input        → part+
//! part         → prefix base suffix
//! prefix       → ε | "+" | "-"
//! base         → TERM ("~" | ":" value)?
//!              | NUMBER
//!              | PHRASE
//! value        → TERM "~"?
//!              | PHRASE
//!              | signed
//!              | (">" | "<") "="? (signed | PHRASE)
//! signed       → NUMBER | "-" NUMBER
//! suffix       → ε | "^"
//! ```
//!
//! A `+` or `-` is a clause prefix only as the first token of a part. After a field colon or a
//! range operator, `-` can only be the sign of a number.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use tracing::{debug, dispatcher};

use crate::{
    build::{self, BuildError, RangeOp},
    error::{QueryError, QueryErrors},
    lexer::{Lexer, Spanned, Token},
    options::QueryStringOptions,
    query::{BooleanQuery, Occur, Query},
};

/// One top-level clause, alive only until it is folded into the result.
struct Clause {
    /// Which list of the result it joins.
    occur: Occur,
    /// The match condition.
    base: Query,
    /// Boost from a `^` suffix.
    boost: Option<f64>,
    /// Byte position of the clause's base.
    position: usize,
}

/// Recursive descent parser over a lazily lexed token stream.
struct Parser<'a> {
    /// Token source.
    lexer: Lexer<'a>,
    /// The lookahead token, if it has been lexed.
    lookahead: Option<Spanned>,
    /// Set once the lexer has reported end of input.
    at_end: bool,
    /// Input length, used as the position of end of input.
    input_len: usize,
    /// Parse options.
    options: &'a QueryStringOptions,
    /// The result under construction.
    query: BooleanQuery,
    /// Errors recorded so far.
    errors: Vec<QueryError>,
}

impl<'a> Parser<'a> {
    /// Creates a parser for the given input.
    fn new(input: &'a str, options: &'a QueryStringOptions) -> Self {
        Self {
            lexer: Lexer::new(input).with_debug(options.debug_lexer()),
            lookahead: None,
            at_end: false,
            input_len: input.len(),
            options,
            query: BooleanQuery::new().with_query_string_mode(true),
            errors: Vec::new(),
        }
    }

    /// Parses all input, returning the result and every error found.
    fn run(mut self) -> (BooleanQuery, Vec<QueryError>) {
        if let Err(err) = self.parse_input() {
            self.record(err);
        }
        (self.query, self.errors)
    }

    /// Parses: input → part+
    fn parse_input(&mut self) -> Result<(), QueryError> {
        let mut parts = 0;
        while self.peek()?.is_some() {
            parts += 1;
            if let Some(clause) = self.parse_part()? {
                self.reduce(clause);
            }
        }
        if parts == 0 {
            return Err(QueryError::syntax(
                "unexpected end of query, expected a term, number or phrase",
                None,
            ));
        }
        Ok(())
    }

    /// Parses: part → prefix base suffix
    ///
    /// Returns `None` when the part was well formed but a value in it was rejected; the error
    /// has already been recorded.
    fn parse_part(&mut self) -> Result<Option<Clause>, QueryError> {
        let occur = match self.peek()? {
            Some(Token::Plus) => Occur::Must,
            Some(Token::Minus) => Occur::MustNot,
            _ => Occur::Should,
        };
        if occur != Occur::Should {
            self.advance();
        }

        self.peek()?;
        let position = self.position();
        let base = self.parse_base()?;
        let boost = self.parse_suffix()?;

        let base = match base {
            Ok(base) => Some(base),
            Err(err) => {
                self.record(QueryError::value(err.to_string(), position));
                None
            }
        };
        let boost = match boost {
            Some((_, Ok(boost))) => Some(boost),
            Some((boost_pos, Err(err))) => {
                self.record(QueryError::value(err.to_string(), boost_pos));
                return Ok(None);
            }
            None => None,
        };

        Ok(base.map(|base| Clause {
            occur,
            base,
            boost,
            position,
        }))
    }

    /// Parses: suffix → ε | "^"
    ///
    /// Returns the position of the `^` and its parsed value.
    fn parse_suffix(&mut self) -> Result<Option<(usize, Result<f64, BuildError>)>, QueryError> {
        if !matches!(self.peek()?, Some(Token::Boost(_))) {
            return Ok(None);
        }
        match self.bump()? {
            Some(Spanned {
                token: Token::Boost(raw),
                position,
            }) => Ok(Some((position, build::parse_boost(&raw)))),
            _ => Err(QueryError::internal("expected '^' lookahead")),
        }
    }

    /// Parses: base → TERM ("~" | ":" value)? | NUMBER | PHRASE
    ///
    /// The outer result carries syntax errors; the inner one carries rejected values.
    fn parse_base(&mut self) -> Result<Result<Query, BuildError>, QueryError> {
        let Some(spanned) = self.bump()? else {
            return Err(QueryError::syntax(
                "unexpected end of query, expected a term, number or phrase",
                None,
            ));
        };

        match spanned.token {
            Token::Term(text) => match self.peek()? {
                Some(Token::Tilde(_)) => {
                    let raw = self.take_tilde()?;
                    Ok(build::fuzzy_query("", text, &raw))
                }
                Some(Token::Colon) => {
                    self.advance();
                    self.parse_value(&text)
                }
                _ => Ok(Ok(build::string_query("", text))),
            },
            Token::Number(text) => Ok(build::number_query("", text)),
            Token::Phrase(text) => Ok(Ok(build::phrase_query("", text))),
            other => Err(unexpected(&other, spanned.position, "a term, number or phrase")),
        }
    }

    /// Parses the value after `field:`.
    fn parse_value(&mut self, field: &str) -> Result<Result<Query, BuildError>, QueryError> {
        let Some(spanned) = self.bump()? else {
            return Err(QueryError::syntax(
                format!("unexpected end of query, expected a value after '{field}:'"),
                None,
            ));
        };

        match spanned.token {
            Token::Term(text) => match self.peek()? {
                Some(Token::Tilde(_)) => {
                    let raw = self.take_tilde()?;
                    Ok(build::fuzzy_query(field, text, &raw))
                }
                _ => Ok(Ok(build::string_query(field, text))),
            },
            Token::Phrase(text) => Ok(Ok(build::phrase_query(field, text))),
            Token::Number(text) => Ok(build::number_query(field, text)),
            Token::Minus => {
                let number = self.parse_negative("'-'")?;
                Ok(build::number_query(field, number))
            }
            Token::Greater => self.parse_comparison(field, true),
            Token::Less => self.parse_comparison(field, false),
            other => Err(unexpected(
                &other,
                spanned.position,
                &format!("a value after '{field}:'"),
            )),
        }
    }

    /// Parses an optional `=` after `>` or `<`, then the operand.
    fn parse_comparison(
        &mut self,
        field: &str,
        greater: bool,
    ) -> Result<Result<Query, BuildError>, QueryError> {
        let or_equal = matches!(self.peek()?, Some(Token::Equal));
        if or_equal {
            self.advance();
        }
        self.parse_range(field, RangeOp::new(greater, or_equal))
    }

    /// Parses the operand of a range operator: a signed number or a quoted date.
    fn parse_range(
        &mut self,
        field: &str,
        op: RangeOp,
    ) -> Result<Result<Query, BuildError>, QueryError> {
        let operator = match op {
            RangeOp::Greater => "'>'",
            RangeOp::GreaterOrEqual => "'>='",
            RangeOp::Less => "'<'",
            RangeOp::LessOrEqual => "'<='",
        };
        let expected = format!("a number or quoted date after {operator}");

        let Some(spanned) = self.bump()? else {
            return Err(QueryError::syntax(
                format!("unexpected end of query, expected {expected}"),
                None,
            ));
        };

        match spanned.token {
            Token::Number(text) => Ok(build::numeric_range_query(field, op, &text)),
            Token::Minus => {
                let number = self.parse_negative(operator)?;
                Ok(build::numeric_range_query(field, op, &number))
            }
            Token::Phrase(text) => Ok(build::date_range_query(
                field,
                op,
                &text,
                self.options.date_format(),
            )),
            other => Err(unexpected(&other, spanned.position, &expected)),
        }
    }

    /// Parses the NUMBER after a sign, returning the signed numeral text.
    fn parse_negative(&mut self, after: &str) -> Result<String, QueryError> {
        match self.bump()? {
            Some(Spanned {
                token: Token::Number(text),
                ..
            }) => Ok(format!("-{text}")),
            Some(Spanned { token, position }) => Err(unexpected(
                &token,
                position,
                &format!("a number after {after}"),
            )),
            None => Err(QueryError::syntax(
                format!("unexpected end of query, expected a number after {after}"),
                None,
            )),
        }
    }

    /// Consumes a `~` lookahead and returns its raw fuzziness text.
    fn take_tilde(&mut self) -> Result<String, QueryError> {
        match self.bump()? {
            Some(Spanned {
                token: Token::Tilde(raw),
                ..
            }) => Ok(raw),
            _ => Err(QueryError::internal("expected '~' lookahead")),
        }
    }

    /// Folds a clause into the result, applying its boost.
    fn reduce(&mut self, clause: Clause) {
        let Clause {
            occur,
            base,
            boost,
            position,
        } = clause;
        let base = match boost {
            Some(boost) => match build::apply_boost(base, boost) {
                Ok(base) => base,
                Err(err) => {
                    self.record(QueryError::value(err.to_string(), position));
                    return;
                }
            },
            None => base,
        };

        if self.options.debug_parser() {
            debug!(
                target: "querystr::parser",
                ?occur,
                kind = base.kind(),
                field = base.field(),
                boost = base.boost(),
                "reduced clause"
            );
        }
        self.query.push(occur, base);
    }

    /// Records an error.
    fn record(&mut self, err: QueryError) {
        if self.options.debug_parser() {
            debug!(target: "querystr::parser", error = %err, "recorded error");
        }
        self.errors.push(err);
    }

    /// Returns the lookahead token, lexing it if needed.
    fn peek(&mut self) -> Result<Option<&Token>, QueryError> {
        if self.lookahead.is_none() && !self.at_end {
            match self.lexer.next_token()? {
                Some(spanned) => self.lookahead = Some(spanned),
                None => self.at_end = true,
            }
        }
        Ok(self.lookahead.as_ref().map(|spanned| &spanned.token))
    }

    /// Consumes and returns the lookahead token.
    fn bump(&mut self) -> Result<Option<Spanned>, QueryError> {
        self.peek()?;
        Ok(self.lookahead.take())
    }

    /// Drops a lookahead token that has already been inspected.
    fn advance(&mut self) {
        self.lookahead = None;
    }

    /// Byte position of the lookahead token, or the input length at end of input.
    fn position(&self) -> usize {
        self.lookahead
            .as_ref()
            .map_or(self.input_len, |spanned| spanned.position)
    }
}

/// Builds the syntax error for a token that does not fit the grammar here.
fn unexpected(token: &Token, position: usize, expected: &str) -> QueryError {
    QueryError::syntax(
        format!("unexpected {}, expected {expected}", token.describe()),
        Some(position),
    )
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown failure".to_string()
    }
}

/// Runs `f`, turning a panic into an internal error.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, QueryError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        QueryError::internal(format!("parse error: {}", panic_message(&*payload)))
    })
}

/// Parses a query string with default options.
///
/// See [`parse_with_options`].
pub fn parse(input: &str) -> Result<Query, QueryErrors> {
    parse_with_options(input, &QueryStringOptions::default())
}

/// Parses a query string into a query tree.
///
/// Returns [`Query::MatchNone`] for an empty string and a [`Query::Boolean`] otherwise. If any
/// error is found, no tree is returned and every error is reported, in order.
pub fn parse_with_options(
    input: &str,
    options: &QueryStringOptions,
) -> Result<Query, QueryErrors> {
    if input.is_empty() {
        return Ok(Query::MatchNone);
    }

    let run = || guarded(|| Parser::new(input, options).run());
    let outcome = match options.dispatch() {
        Some(dispatch) => dispatcher::with_default(dispatch, run),
        None => run(),
    };

    let (query, errors) = match outcome {
        Ok(result) => result,
        Err(err) => (BooleanQuery::new(), vec![err]),
    };
    let errors = errors
        .into_iter()
        .map(|err| err.with_query(input))
        .collect();

    match QueryErrors::new(errors) {
        Some(errors) => Err(errors),
        None => Ok(Query::Boolean(query)),
    }
}
