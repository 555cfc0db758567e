//! Loading parse options from TOML.
//!
//! Options live under a `[query]` table:
//!
//! ```toml
//! [query]
//! date_format = "%Y-%m-%d"   # or "rfc3339" (the default)
//! debug_lexer = false
//! debug_parser = true
//! ```
//!
//! A missing table or key keeps the default. Other tables are ignored so the section can share
//! a file with unrelated settings.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use toml::de;

use crate::options::{DateFormat, QueryStringOptions};

/// Errors that can occur when loading options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// `date_format` was set to an empty string.
    #[error("empty date_format in config file {path}")]
    EmptyDateFormat {
        /// Path to the offending file.
        path: PathBuf,
    },
}

/// Configuration file as parsed directly from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    /// The `[query]` table.
    query: Option<RawQueryOptions>,
}

/// Raw `[query]` table; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawQueryOptions {
    /// `rfc3339` or a strftime pattern.
    date_format: Option<String>,
    /// Per-token trace events.
    debug_lexer: Option<bool>,
    /// Per-clause trace events.
    debug_parser: Option<bool>,
}

/// Loads options from a TOML file on disk.
pub fn parse_options_file(path: &Path) -> Result<QueryStringOptions, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_options_str(&contents, path)
}

/// Loads options from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_options_str(contents: &str, path: &Path) -> Result<QueryStringOptions, ConfigError> {
    let raw: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;

    let mut options = QueryStringOptions::default();
    let Some(query) = raw.query else {
        return Ok(options);
    };

    if let Some(format) = query.date_format {
        if format.trim().is_empty() {
            return Err(ConfigError::EmptyDateFormat {
                path: path.to_path_buf(),
            });
        }
        options = options.with_date_format(DateFormat::from_config(&format));
    }
    if let Some(debug) = query.debug_lexer {
        options = options.with_debug_lexer(debug);
    }
    if let Some(debug) = query.debug_parser {
        options = options.with_debug_parser(debug);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str) -> Result<QueryStringOptions, ConfigError> {
        parse_options_str(contents, Path::new("test.toml"))
    }

    #[test]
    fn empty_config_is_default() {
        let options = parse("").unwrap();
        assert_eq!(options.date_format(), &DateFormat::Rfc3339);
        assert!(!options.debug_lexer());
        assert!(!options.debug_parser());
    }

    #[test]
    fn full_section() {
        let options = parse(
            r#"
[query]
date_format = "%Y-%m-%d"
debug_lexer = true
debug_parser = true
"#,
        )
        .unwrap();
        assert_eq!(
            options.date_format(),
            &DateFormat::Custom("%Y-%m-%d".into())
        );
        assert!(options.debug_lexer());
        assert!(options.debug_parser());
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let options = parse("[query]\ndebug_parser = true\n").unwrap();
        assert_eq!(options.date_format(), &DateFormat::Rfc3339);
        assert!(options.debug_parser());
        assert!(!options.debug_lexer());
    }

    #[test]
    fn rfc3339_spelling() {
        let options = parse("[query]\ndate_format = \"rfc3339\"\n").unwrap();
        assert_eq!(options.date_format(), &DateFormat::Rfc3339);
    }

    #[test]
    fn other_tables_ignored() {
        let options = parse("[server]\nport = 8080\n").unwrap();
        assert!(!options.debug_parser());
    }

    #[test]
    fn empty_date_format_rejected() {
        let err = parse("[query]\ndate_format = \" \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDateFormat { .. }));
    }

    #[test]
    fn wrong_type_rejected() {
        let err = parse("[query]\ndebug_lexer = \"yes\"\n").unwrap_err();
        assert!(err.to_string().contains("test.toml"));
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn missing_file() {
        let err = parse_options_file(Path::new("/nonexistent/querystr.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
