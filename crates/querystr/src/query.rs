//! Query tree produced by the parser.
//!
//! These are the node types handed to the search engine. Leaf nodes are optionally scoped to a
//! field (an empty field means the default field) and optionally carry a boost. The parser's
//! output is always a single [`BooleanQuery`], or [`Query::MatchNone`] for an empty query string.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Lower sentinel for an unbounded numeric range.
pub const MIN_NUMERIC: f64 = f64::NEG_INFINITY;

/// Upper sentinel for an unbounded numeric range.
pub const MAX_NUMERIC: f64 = f64::INFINITY;

/// The zero timestamp, `0001-01-01T00:00:00Z`, used for either side of an unbounded date range.
pub const UNBOUNDED_DATE: DateTime<Utc> = match NaiveDate::from_ymd_opt(1, 1, 1) {
    Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
    None => DateTime::<Utc>::MIN_UTC,
};

/// How a clause participates in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occur {
    /// Optional; contributes to relevance.
    #[default]
    Should,
    /// Required.
    Must,
    /// Excluded.
    MustNot,
}

/// Returned when a boost is applied to a node that does not accept one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot boost {kind} query")]
pub struct UnsupportedBoost {
    /// The kind of node that refused the boost.
    pub kind: &'static str,
}

/// Term match, optionally fuzzy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchQuery {
    /// Text to match.
    text: String,
    /// Field scope.
    field: String,
    /// Maximum edit distance; 0 is an exact match.
    fuzziness: u32,
    /// Boost override.
    boost: Option<f64>,
}

impl MatchQuery {
    /// Creates a match on the default field.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Scopes the match to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the maximum edit distance.
    pub fn with_fuzziness(mut self, fuzziness: u32) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Text to match.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Maximum edit distance.
    pub fn fuzziness(&self) -> u32 {
        self.fuzziness
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Ordered phrase match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchPhraseQuery {
    /// Phrase text.
    phrase: String,
    /// Field scope.
    field: String,
    /// Boost override.
    boost: Option<f64>,
}

impl MatchPhraseQuery {
    /// Creates a phrase match on the default field.
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            ..Self::default()
        }
    }

    /// Scopes the match to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Phrase text.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Glob match using `*` and `?`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WildcardQuery {
    /// Glob pattern.
    pattern: String,
    /// Field scope.
    field: String,
    /// Boost override.
    boost: Option<f64>,
}

impl WildcardQuery {
    /// Creates a wildcard match on the default field.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Scopes the match to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Glob pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Regular expression match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegexpQuery {
    /// Pattern without the surrounding slashes.
    pattern: String,
    /// Field scope.
    field: String,
    /// Boost override.
    boost: Option<f64>,
}

impl RegexpQuery {
    /// Creates a regexp match on the default field.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Scopes the match to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Pattern without the surrounding slashes.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Numeric range with per-bound inclusivity.
///
/// An unbounded side holds [`MIN_NUMERIC`] or [`MAX_NUMERIC`].
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRangeQuery {
    /// Lower bound.
    min: f64,
    /// Upper bound.
    max: f64,
    /// Whether `min` itself matches.
    inclusive_min: bool,
    /// Whether `max` itself matches.
    inclusive_max: bool,
    /// Field scope.
    field: String,
    /// Boost override.
    boost: Option<f64>,
}

impl NumericRangeQuery {
    /// Creates a range on the default field.
    pub fn new(min: f64, max: f64, inclusive_min: bool, inclusive_max: bool) -> Self {
        Self {
            min,
            max,
            inclusive_min,
            inclusive_max,
            field: String::new(),
            boost: None,
        }
    }

    /// Scopes the range to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Lower bound and whether it is inclusive.
    pub fn min(&self) -> (f64, bool) {
        (self.min, self.inclusive_min)
    }

    /// Upper bound and whether it is inclusive.
    pub fn max(&self) -> (f64, bool) {
        (self.max, self.inclusive_max)
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Date range with per-bound inclusivity.
///
/// An unbounded side holds [`UNBOUNDED_DATE`].
#[derive(Debug, Clone, PartialEq)]
pub struct DateRangeQuery {
    /// Lower bound.
    start: DateTime<Utc>,
    /// Upper bound.
    end: DateTime<Utc>,
    /// Whether `start` itself matches.
    inclusive_start: bool,
    /// Whether `end` itself matches.
    inclusive_end: bool,
    /// Field scope.
    field: String,
    /// Boost override.
    boost: Option<f64>,
}

impl DateRangeQuery {
    /// Creates a range on the default field.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        inclusive_start: bool,
        inclusive_end: bool,
    ) -> Self {
        Self {
            start,
            end,
            inclusive_start,
            inclusive_end,
            field: String::new(),
            boost: None,
        }
    }

    /// Scopes the range to a field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Lower bound and whether it is inclusive.
    pub fn start(&self) -> (DateTime<Utc>, bool) {
        (self.start, self.inclusive_start)
    }

    /// Upper bound and whether it is inclusive.
    pub fn end(&self) -> (DateTime<Utc>, bool) {
        (self.end, self.inclusive_end)
    }

    /// Field scope, empty for the default field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }
}

/// Matches when any child matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisjunctionQuery {
    /// Alternatives.
    disjuncts: Vec<Query>,
    /// Boost override.
    boost: Option<f64>,
    /// Query string semantics, see [`BooleanQuery::query_string_mode`].
    query_string_mode: bool,
}

impl DisjunctionQuery {
    /// Creates an empty disjunction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an alternative.
    pub fn add(mut self, query: impl Into<Query>) -> Self {
        self.disjuncts.push(query.into());
        self
    }

    /// Enables query string semantics.
    pub fn with_query_string_mode(mut self, enabled: bool) -> Self {
        self.query_string_mode = enabled;
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Alternatives, in insertion order.
    pub fn disjuncts(&self) -> &[Query] {
        &self.disjuncts
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }

    /// Whether query string semantics apply.
    pub fn query_string_mode(&self) -> bool {
        self.query_string_mode
    }
}

/// Boolean combination of clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BooleanQuery {
    /// Optional clauses.
    should: Vec<Query>,
    /// Required clauses.
    must: Vec<Query>,
    /// Excluded clauses.
    must_not: Vec<Query>,
    /// Boost override.
    boost: Option<f64>,
    /// Query string semantics.
    query_string_mode: bool,
}

impl BooleanQuery {
    /// Creates an empty boolean query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables query string semantics.
    pub fn with_query_string_mode(mut self, enabled: bool) -> Self {
        self.query_string_mode = enabled;
        self
    }

    /// Appends a clause to the list selected by `occur`.
    pub fn push(&mut self, occur: Occur, query: impl Into<Query>) {
        let list = match occur {
            Occur::Should => &mut self.should,
            Occur::Must => &mut self.must,
            Occur::MustNot => &mut self.must_not,
        };
        list.push(query.into());
    }

    /// Builder form of [`push`](Self::push) with [`Occur::Should`].
    pub fn should(mut self, query: impl Into<Query>) -> Self {
        self.push(Occur::Should, query);
        self
    }

    /// Builder form of [`push`](Self::push) with [`Occur::Must`].
    pub fn must(mut self, query: impl Into<Query>) -> Self {
        self.push(Occur::Must, query);
        self
    }

    /// Builder form of [`push`](Self::push) with [`Occur::MustNot`].
    pub fn must_not(mut self, query: impl Into<Query>) -> Self {
        self.push(Occur::MustNot, query);
        self
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Clauses for an occurrence.
    pub fn clauses(&self, occur: Occur) -> &[Query] {
        match occur {
            Occur::Should => &self.should,
            Occur::Must => &self.must,
            Occur::MustNot => &self.must_not,
        }
    }

    /// Returns true if no clause has been added.
    pub fn is_empty(&self) -> bool {
        self.should.is_empty() && self.must.is_empty() && self.must_not.is_empty()
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        self.boost
    }

    /// Whether query string semantics apply.
    ///
    /// When set, a query holding only `must_not` clauses matches every document not excluded,
    /// rather than nothing.
    pub fn query_string_mode(&self) -> bool {
        self.query_string_mode
    }
}

/// A node in the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches no document. Produced for an empty query string.
    MatchNone,
    /// Term match, optionally fuzzy.
    Match(MatchQuery),
    /// Phrase match.
    MatchPhrase(MatchPhraseQuery),
    /// Glob match.
    Wildcard(WildcardQuery),
    /// Regular expression match.
    Regexp(RegexpQuery),
    /// Numeric range.
    NumericRange(NumericRangeQuery),
    /// Date range.
    DateRange(DateRangeQuery),
    /// Any-of composite.
    Disjunction(DisjunctionQuery),
    /// Should/must/must-not composite.
    Boolean(BooleanQuery),
}

impl Query {
    /// Name of the node variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchNone => "MatchNone",
            Self::Match(_) => "Match",
            Self::MatchPhrase(_) => "MatchPhrase",
            Self::Wildcard(_) => "Wildcard",
            Self::Regexp(_) => "Regexp",
            Self::NumericRange(_) => "NumericRange",
            Self::DateRange(_) => "DateRange",
            Self::Disjunction(_) => "Disjunction",
            Self::Boolean(_) => "Boolean",
        }
    }

    /// Field scope of a leaf node; `None` for composites and `MatchNone`.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Match(q) => Some(q.field()),
            Self::MatchPhrase(q) => Some(q.field()),
            Self::Wildcard(q) => Some(q.field()),
            Self::Regexp(q) => Some(q.field()),
            Self::NumericRange(q) => Some(q.field()),
            Self::DateRange(q) => Some(q.field()),
            Self::MatchNone | Self::Disjunction(_) | Self::Boolean(_) => None,
        }
    }

    /// Boost override, if any.
    pub fn boost(&self) -> Option<f64> {
        match self {
            Self::MatchNone => None,
            Self::Match(q) => q.boost(),
            Self::MatchPhrase(q) => q.boost(),
            Self::Wildcard(q) => q.boost(),
            Self::Regexp(q) => q.boost(),
            Self::NumericRange(q) => q.boost(),
            Self::DateRange(q) => q.boost(),
            Self::Disjunction(q) => q.boost(),
            Self::Boolean(q) => q.boost(),
        }
    }

    /// Sets the boost on nodes that accept one. The field is left untouched.
    pub fn with_boost(self, boost: f64) -> Result<Self, UnsupportedBoost> {
        Ok(match self {
            Self::MatchNone => return Err(UnsupportedBoost { kind: "MatchNone" }),
            Self::Match(q) => Self::Match(q.with_boost(boost)),
            Self::MatchPhrase(q) => Self::MatchPhrase(q.with_boost(boost)),
            Self::Wildcard(q) => Self::Wildcard(q.with_boost(boost)),
            Self::Regexp(q) => Self::Regexp(q.with_boost(boost)),
            Self::NumericRange(q) => Self::NumericRange(q.with_boost(boost)),
            Self::DateRange(q) => Self::DateRange(q.with_boost(boost)),
            Self::Disjunction(q) => Self::Disjunction(q.with_boost(boost)),
            Self::Boolean(q) => Self::Boolean(q.with_boost(boost)),
        })
    }

    /// Returns the boolean query if this is one.
    pub fn as_boolean(&self) -> Option<&BooleanQuery> {
        match self {
            Self::Boolean(q) => Some(q),
            _ => None,
        }
    }

    /// Formats the query as a tree structure with the given indentation level.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        write!(f, "{prefix}")?;
        match self {
            Self::MatchNone => write!(f, "MatchNone")?,
            Self::Match(q) => {
                write!(f, "Match({:?}", q.text)?;
                if q.fuzziness > 0 {
                    write!(f, ", fuzziness={}", q.fuzziness)?;
                }
                write!(f, ")")?;
            }
            Self::MatchPhrase(q) => write!(f, "MatchPhrase({:?})", q.phrase)?,
            Self::Wildcard(q) => write!(f, "Wildcard({:?})", q.pattern)?,
            Self::Regexp(q) => write!(f, "Regexp({:?})", q.pattern)?,
            Self::NumericRange(q) => write!(
                f,
                "NumericRange({}{}, {}{})",
                if q.inclusive_min { '[' } else { '(' },
                q.min,
                q.max,
                if q.inclusive_max { ']' } else { ')' },
            )?,
            Self::DateRange(q) => write!(
                f,
                "DateRange({}{}, {}{})",
                if q.inclusive_start { '[' } else { '(' },
                fmt_date(q.start),
                fmt_date(q.end),
                if q.inclusive_end { ']' } else { ')' },
            )?,
            Self::Disjunction(_) => write!(f, "Disjunction")?,
            Self::Boolean(_) => write!(f, "Boolean")?,
        }
        if let Some(field) = self.field().filter(|field| !field.is_empty()) {
            write!(f, " field={field:?}")?;
        }
        if let Some(boost) = self.boost() {
            write!(f, " boost={boost}")?;
        }
        writeln!(f)?;

        match self {
            Self::Disjunction(q) => {
                for child in &q.disjuncts {
                    child.fmt_tree(f, indent + 1)?;
                }
            }
            Self::Boolean(q) => {
                for (label, children) in [
                    ("should", &q.should),
                    ("must", &q.must),
                    ("must_not", &q.must_not),
                ] {
                    if children.is_empty() {
                        continue;
                    }
                    writeln!(f, "{prefix}  {label}:")?;
                    for child in children {
                        child.fmt_tree(f, indent + 2)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Renders a range endpoint, showing the sentinel as `*`.
fn fmt_date(date: DateTime<Utc>) -> String {
    if date == UNBOUNDED_DATE {
        "*".into()
    } else {
        date.to_rfc3339()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl From<MatchQuery> for Query {
    fn from(q: MatchQuery) -> Self {
        Self::Match(q)
    }
}

impl From<MatchPhraseQuery> for Query {
    fn from(q: MatchPhraseQuery) -> Self {
        Self::MatchPhrase(q)
    }
}

impl From<WildcardQuery> for Query {
    fn from(q: WildcardQuery) -> Self {
        Self::Wildcard(q)
    }
}

impl From<RegexpQuery> for Query {
    fn from(q: RegexpQuery) -> Self {
        Self::Regexp(q)
    }
}

impl From<NumericRangeQuery> for Query {
    fn from(q: NumericRangeQuery) -> Self {
        Self::NumericRange(q)
    }
}

impl From<DateRangeQuery> for Query {
    fn from(q: DateRangeQuery) -> Self {
        Self::DateRange(q)
    }
}

impl From<DisjunctionQuery> for Query {
    fn from(q: DisjunctionQuery) -> Self {
        Self::Disjunction(q)
    }
}

impl From<BooleanQuery> for Query {
    fn from(q: BooleanQuery) -> Self {
        Self::Boolean(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_routes_by_occur() {
        let mut q = BooleanQuery::new();
        q.push(Occur::Must, MatchQuery::new("a"));
        q.push(Occur::Should, MatchQuery::new("b"));
        q.push(Occur::MustNot, MatchQuery::new("c"));
        q.push(Occur::Should, MatchQuery::new("d"));

        assert_eq!(
            q.clauses(Occur::Should),
            &[Query::from(MatchQuery::new("b")), Query::from(MatchQuery::new("d"))]
        );
        assert_eq!(q.clauses(Occur::Must), &[Query::from(MatchQuery::new("a"))]);
        assert_eq!(q.clauses(Occur::MustNot), &[Query::from(MatchQuery::new("c"))]);
        assert!(!q.is_empty());
    }

    #[test]
    fn boost_keeps_field() {
        let q = Query::from(WildcardQuery::new("mart*").with_field("name"))
            .with_boost(2.0)
            .unwrap();
        assert_eq!(q.field(), Some("name"));
        assert_eq!(q.boost(), Some(2.0));
    }

    #[test]
    fn composites_accept_boost() {
        let q = Query::from(DisjunctionQuery::new().add(MatchQuery::new("33")))
            .with_boost(3.0)
            .unwrap();
        assert_eq!(q.boost(), Some(3.0));
        assert_eq!(q.field(), None);
    }

    #[test]
    fn match_none_refuses_boost() {
        let err = Query::MatchNone.with_boost(2.0).unwrap_err();
        assert_eq!(err.kind, "MatchNone");
        assert_eq!(err.to_string(), "cannot boost MatchNone query");
    }

    #[test]
    fn tree_display() {
        let q: Query = BooleanQuery::new()
            .with_query_string_mode(true)
            .must(MatchQuery::new("watex").with_fuzziness(2).with_field("f"))
            .should(NumericRangeQuery::new(5.0, MAX_NUMERIC, false, true).with_boost(1.5))
            .into();
        assert_eq!(
            q.to_string(),
            "Boolean\n  should:\n    NumericRange((5, inf]) boost=1.5\n  must:\n    \
             Match(\"watex\", fuzziness=2) field=\"f\"\n"
        );
    }

    #[test]
    fn unbounded_date_is_year_one() {
        assert_eq!(UNBOUNDED_DATE.to_rfc3339(), "0001-01-01T00:00:00+00:00");
    }

    #[test]
    fn unbounded_date_renders_as_star() {
        let q = Query::from(DateRangeQuery::new(UNBOUNDED_DATE, UNBOUNDED_DATE, true, true));
        assert_eq!(q.to_string(), "DateRange([*, *])\n");
    }
}
