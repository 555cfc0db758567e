//! Lucene-style query string parsing.
//!
//! This crate turns a human-typed query string into a boolean query tree for a search engine:
//!
//! - **Terms**: `rust` - match a term in the default field
//! - **Fields**: `title:guide` - scope a clause to a field
//! - **Phrases**: `"error handling"` - ordered phrase match
//! - **Prefixes**: `+must -must_not should` - how a clause participates
//! - **Numbers**: `33`, `year:-5` - match the text or the numeric value
//! - **Ranges**: `year:>=2020`, `created:<"2006-01-02T15:04:05Z"`
//! - **Wildcards and regexps**: `mart*`, `name:/mar.*ty/`
//! - **Fuzziness**: `watex~`, `watex~2` - tolerate edits
//! - **Boosting**: `rust^2.5` - adjust clause importance
//! - **Escaping**: `name\:marty`, `marty\ couchbase`
//!
//! # Example
//!
//! ```
//! use querystr::{Occur, parse};
//!
//! let query = parse("+title:guide -deprecated rust^2").unwrap();
//! let boolean = query.as_boolean().unwrap();
//! assert_eq!(boolean.clauses(Occur::Must).len(), 1);
//! assert_eq!(boolean.clauses(Occur::MustNot).len(), 1);
//! assert_eq!(boolean.clauses(Occur::Should)[0].boost(), Some(2.0));
//! ```

#![warn(missing_docs)]

mod build;
mod config;
mod error;
mod lexer;
mod options;
mod parser;
mod query;

pub use build::{BuildError, DEFAULT_BOOST, DEFAULT_FUZZINESS};
pub use config::{ConfigError, parse_options_file, parse_options_str};
pub use error::{LexError, QueryError, QueryErrorKind, QueryErrors};
pub use lexer::{Lexer, MAX_NUMERAL_LEN, Spanned, Token, tokenize};
pub use options::{DateFormat, QueryStringOptions};
pub use parser::{parse, parse_with_options};
pub use query::{
    BooleanQuery, DateRangeQuery, DisjunctionQuery, MAX_NUMERIC, MIN_NUMERIC, MatchPhraseQuery,
    MatchQuery, NumericRangeQuery, Occur, Query, RegexpQuery, UNBOUNDED_DATE, UnsupportedBoost,
    WildcardQuery,
};
