//! Parse options.

use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, ParseError, ParseResult, Utc,
    format::ParseErrorKind,
};
use tracing::Dispatch;

/// How quoted dates in range clauses are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// RFC 3339, e.g. `2006-01-02T15:04:05Z`.
    #[default]
    Rfc3339,
    /// A `chrono` strftime pattern, e.g. `%Y-%m-%d`.
    ///
    /// Patterns without a time zone are read as UTC; patterns without a time of day are read
    /// as midnight.
    Custom(String),
}

impl DateFormat {
    /// Builds a format from its configuration spelling: `rfc3339` or a strftime pattern.
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("rfc3339") {
            Self::Rfc3339
        } else {
            Self::Custom(value.to_string())
        }
    }

    /// Parses `text` into a UTC instant.
    pub fn parse(&self, text: &str) -> ParseResult<DateTime<Utc>> {
        match self {
            Self::Rfc3339 => DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc)),
            Self::Custom(pattern) => parse_custom(text, pattern),
        }
    }
}

/// Tries a pattern as zoned, then naive, then date-only.
///
/// Falls through to the next shape only when the previous one matched but lacked fields.
fn parse_custom(text: &str, pattern: &str) -> ParseResult<DateTime<Utc>> {
    let not_enough = |err: &ParseError| err.kind() == ParseErrorKind::NotEnough;

    match DateTime::parse_from_str(text, pattern) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(err) if !not_enough(&err) => return Err(err),
        Err(_) => {}
    }
    match NaiveDateTime::parse_from_str(text, pattern) {
        Ok(dt) => return Ok(dt.and_utc()),
        Err(err) if !not_enough(&err) => return Err(err),
        Err(_) => {}
    }
    NaiveDate::parse_from_str(text, pattern)
        .map(|date| date.and_time(NaiveTime::default()).and_utc())
}

/// Options consumed read-only by a parse.
///
/// None of these change the resulting query tree except the date format.
#[derive(Debug, Clone, Default)]
pub struct QueryStringOptions {
    /// Emit a trace event for every reduced clause.
    debug_parser: bool,
    /// Emit a trace event for every token.
    debug_lexer: bool,
    /// Format of quoted dates in range clauses.
    date_format: DateFormat,
    /// Trace sink; the global subscriber is used when absent.
    dispatch: Option<Dispatch>,
}

impl QueryStringOptions {
    /// Enables or disables parser trace events.
    pub fn with_debug_parser(mut self, debug: bool) -> Self {
        self.debug_parser = debug;
        self
    }

    /// Enables or disables lexer trace events.
    pub fn with_debug_lexer(mut self, debug: bool) -> Self {
        self.debug_lexer = debug;
        self
    }

    /// Sets the date format for range clauses.
    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }

    /// Routes trace events to `dispatch` for the duration of each parse.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Whether parser trace events are emitted.
    pub fn debug_parser(&self) -> bool {
        self.debug_parser
    }

    /// Whether lexer trace events are emitted.
    pub fn debug_lexer(&self) -> bool {
        self.debug_lexer
    }

    /// Date format for range clauses.
    pub fn date_format(&self) -> &DateFormat {
        &self.date_format
    }

    /// Trace sink, if one was set.
    pub fn dispatch(&self) -> Option<&Dispatch> {
        self.dispatch.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn defaults() {
        let options = QueryStringOptions::default();
        assert!(!options.debug_parser());
        assert!(!options.debug_lexer());
        assert_eq!(options.date_format(), &DateFormat::Rfc3339);
        assert!(options.dispatch().is_none());
    }

    #[test]
    fn rfc3339() {
        let parsed = DateFormat::Rfc3339.parse("2006-01-02T15:04:05Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn rfc3339_offset_normalized_to_utc() {
        let parsed = DateFormat::Rfc3339.parse("2006-01-02T15:04:05-07:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap());
    }

    #[test]
    fn custom_zoned() {
        let format = DateFormat::Custom("%Y-%m-%d %H:%M %z".into());
        let parsed = format.parse("2020-05-01 10:30 +0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 5, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn custom_naive_is_utc() {
        let format = DateFormat::Custom("%Y-%m-%d %H:%M:%S".into());
        let parsed = format.parse("2020-05-01 10:30:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 5, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn custom_date_only_is_midnight() {
        let format = DateFormat::Custom("%Y-%m-%d".into());
        let parsed = format.parse("2020-05-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn custom_mismatch_fails() {
        let format = DateFormat::Custom("%Y-%m-%d".into());
        assert!(format.parse("May 1st").is_err());
    }

    #[test]
    fn config_spelling() {
        assert_eq!(DateFormat::from_config("RFC3339"), DateFormat::Rfc3339);
        assert_eq!(
            DateFormat::from_config("%d/%m/%Y"),
            DateFormat::Custom("%d/%m/%Y".into())
        );
    }

    #[test]
    fn builders() {
        let options = QueryStringOptions::default()
            .with_debug_parser(true)
            .with_debug_lexer(true)
            .with_date_format(DateFormat::Custom("%Y".into()));
        assert!(options.debug_parser());
        assert!(options.debug_lexer());
        assert_eq!(options.date_format(), &DateFormat::Custom("%Y".into()));
    }
}
