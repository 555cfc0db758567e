//! Query string lexer.
//!
//! Converts a query string into tokens one at a time. Operators are only recognized at the start
//! of a token: once a literal has begun, characters such as `-`, `+` or `>` are part of it.

use std::{iter::Peekable, str::Chars};

use tracing::debug;

use crate::error::LexError;

/// Longest numeral the lexer accepts, in characters.
pub const MAX_NUMERAL_LEN: usize = 320;

/// A token in the query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An unquoted literal with escapes resolved.
    Term(String),

    /// A quoted phrase (the quotes are stripped, escapes resolved).
    Phrase(String),

    /// An unescaped literal that reads as a decimal numeral.
    Number(String),

    /// `+` at the start of a token.
    Plus,

    /// `-` at the start of a token.
    Minus,

    /// `:` separating a field name from its value.
    Colon,

    /// `^` followed by its raw boost text, empty when no value was given.
    Boost(String),

    /// `~` followed by its raw fuzziness text, empty when no value was given.
    Tilde(String),

    /// `>` at the start of a token.
    Greater,

    /// `<` at the start of a token.
    Less,

    /// `=` at the start of a token.
    Equal,
}

impl Token {
    /// Describes the token for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Term(text) => format!("term '{text}'"),
            Self::Phrase(text) => format!("phrase \"{text}\""),
            Self::Number(text) => format!("number {text}"),
            Self::Plus => "'+'".into(),
            Self::Minus => "'-'".into(),
            Self::Colon => "':'".into(),
            Self::Boost(_) => "'^'".into(),
            Self::Tilde(_) => "'~'".into(),
            Self::Greater => "'>'".into(),
            Self::Less => "'<'".into(),
            Self::Equal => "'='".into(),
        }
    }
}

/// A token together with the byte position where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte offset of the token's first character.
    pub position: usize,
}

/// Tokenizes a query string on demand.
pub struct Lexer<'a> {
    /// The original input string.
    input: &'a str,
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input.
    position: usize,
    /// Emit a trace event for every token.
    debug: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
            debug: false,
        }
    }

    /// Enables or disables per-token trace events.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Creates an error at a specific position.
    fn error_at(&self, message: impl Into<String>, position: usize) -> LexError {
        LexError::new(message, position, self.input)
    }

    /// Tokenizes the remaining input, returning all tokens or an error.
    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned.token);
        }

        Ok(tokens)
    }

    /// Returns the next token, or None if at end of input.
    pub fn next_token(&mut self) -> Result<Option<Spanned>, LexError> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(None);
        };

        let position = self.position;
        let token = match ch {
            '"' => self.read_phrase()?,
            '+' | '-' | ':' | '>' | '<' | '=' => {
                self.advance();
                match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    ':' => Token::Colon,
                    '>' => Token::Greater,
                    '<' => Token::Less,
                    _ => Token::Equal,
                }
            }
            '^' => {
                self.advance();
                Token::Boost(self.read_suffix()?)
            }
            '~' => {
                self.advance();
                Token::Tilde(self.read_suffix()?)
            }
            _ => self.read_literal()?,
        };

        if self.debug {
            debug!(target: "querystr::lexer", position, token = ?token, "lexed token");
        }

        Ok(Some(Spanned { token, position }))
    }

    /// Reads a quoted phrase.
    fn read_phrase(&mut self) -> Result<Token, LexError> {
        let start_pos = self.position;
        self.advance(); // consume opening quote

        let mut content = String::new();

        loop {
            match self.chars.peek() {
                Some(&'"') => {
                    self.advance(); // consume closing quote
                    return Ok(Token::Phrase(content));
                }
                Some(&'\\') => {
                    self.advance();
                    match self.chars.peek() {
                        Some(&next) if is_escapable(next) => {
                            content.push(next);
                            self.advance();
                        }
                        Some(_) => content.push('\\'),
                        None => return Err(self.error_at("unterminated phrase", start_pos)),
                    }
                }
                Some(&ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => return Err(self.error_at("unterminated phrase", start_pos)),
            }
        }
    }

    /// Reads an unquoted literal, classifying it as a number or a term.
    fn read_literal(&mut self) -> Result<Token, LexError> {
        let start_pos = self.position;
        let mut text = String::new();
        let mut escaped = false;

        if let Some(len) = regex_span(&self.input[start_pos..]) {
            text.push_str(&self.input[start_pos..start_pos + len]);
            while self.position < start_pos + len {
                self.advance();
            }
        }

        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == ':' || ch == '^' || ch == '~' {
                break;
            }

            if ch == '\\' {
                let escape_pos = self.position;
                self.advance();
                escaped = true;
                match self.chars.peek() {
                    Some(&next) => {
                        // Unsupported escapes keep the backslash alongside the escaped character.
                        if !is_escapable(next) {
                            text.push('\\');
                        }
                        text.push(next);
                        self.advance();
                    }
                    None => {
                        return Err(self.error_at("invalid escape at end of input", escape_pos));
                    }
                }
                continue;
            }

            text.push(ch);
            self.advance();
        }

        if !escaped && is_numeral(&text) {
            if text.len() > MAX_NUMERAL_LEN {
                return Err(self.error_at(
                    format!(
                        "numeral too long ({} characters, at most {MAX_NUMERAL_LEN} allowed)",
                        text.len()
                    ),
                    start_pos,
                ));
            }
            return Ok(Token::Number(text));
        }

        Ok(Token::Term(text))
    }

    /// Reads the raw text after `^` or `~`, up to whitespace or the next suffix marker.
    fn read_suffix(&mut self) -> Result<String, LexError> {
        let mut raw = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '^' || ch == '~' {
                break;
            }
            if ch == '\\' {
                let escape_pos = self.position;
                self.advance();
                let Some(&next) = self.chars.peek() else {
                    return Err(self.error_at("invalid escape at end of input", escape_pos));
                };
                raw.push('\\');
                raw.push(next);
                self.advance();
                continue;
            }
            raw.push(ch);
            self.advance();
        }

        Ok(raw)
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Advances to the next character.
    fn advance(&mut self) {
        if let Some(ch) = self.chars.next() {
            self.position += ch.len_utf8();
        }
    }
}

/// Characters a backslash escapes; any other character keeps its backslash.
fn is_escapable(ch: char) -> bool {
    matches!(ch, '"' | ':' | ' ' | '+' | '-' | '~' | '^' | '\\' | '/')
}

/// Returns true for `-`? digits (`.` digits)?.
fn is_numeral(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.is_none_or(all_digits)
}

/// Length in bytes of a `/.../` run at the start of `rest`, including both slashes.
///
/// Backslash pairs inside the run are skipped so an escaped slash does not close it.
fn regex_span(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    if chars.next()?.1 != '/' {
        return None;
    }
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '/' => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

/// Convenience function to tokenize a query string.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(s: &str) -> Token {
        Token::Term(s.into())
    }

    fn number(s: &str) -> Token {
        Token::Number(s.into())
    }

    #[test]
    fn empty_input() {
        assert_eq!(tokenize("").unwrap(), vec![]);
    }

    #[test]
    fn whitespace_only() {
        assert_eq!(tokenize(" \t  ").unwrap(), vec![]);
    }

    #[test]
    fn single_term() {
        assert_eq!(tokenize("test").unwrap(), vec![term("test")]);
    }

    #[test]
    fn leading_spaces() {
        assert_eq!(tokenize("   what").unwrap(), vec![term("what")]);
    }

    #[test]
    fn field_and_value() {
        assert_eq!(
            tokenize("field:test").unwrap(),
            vec![term("field"), Token::Colon, term("test")]
        );
    }

    #[test]
    fn prefixes_only_at_token_start() {
        assert_eq!(
            tokenize("+field1:test1 -t-est").unwrap(),
            vec![
                Token::Plus,
                term("field1"),
                Token::Colon,
                term("test1"),
                Token::Minus,
                term("t-est")
            ]
        );
    }

    #[test]
    fn operators_inside_literal_are_content() {
        assert_eq!(
            tokenize("t+est t>est t<est t=est").unwrap(),
            vec![term("t+est"), term("t>est"), term("t<est"), term("t=est")]
        );
    }

    #[test]
    fn range_operators() {
        assert_eq!(
            tokenize("field:>=-5").unwrap(),
            vec![
                term("field"),
                Token::Colon,
                Token::Greater,
                Token::Equal,
                Token::Minus,
                number("5")
            ]
        );
    }

    #[test]
    fn numbers_and_near_numbers() {
        assert_eq!(
            tokenize("33 3.25 127.0.0.1 555c3bb 3.").unwrap(),
            vec![
                number("33"),
                number("3.25"),
                term("127.0.0.1"),
                term("555c3bb"),
                term("3.")
            ]
        );
    }

    #[test]
    fn escape_defeats_numeral() {
        assert_eq!(tokenize(r"3.0\:").unwrap(), vec![term("3.0:")]);
        assert_eq!(tokenize(r"3.0\a").unwrap(), vec![term(r"3.0\a")]);
        assert_eq!(tokenize(r"\-5").unwrap(), vec![term("-5")]);
    }

    #[test]
    fn escaped_delimiters() {
        assert_eq!(tokenize(r"name\:marty").unwrap(), vec![term("name:marty")]);
        assert_eq!(
            tokenize(r"marty\ couchbase").unwrap(),
            vec![term("marty couchbase")]
        );
        assert_eq!(tokenize(r"\+marty").unwrap(), vec![term("+marty")]);
        assert_eq!(tokenize(r"a\~b\^c").unwrap(), vec![term("a~b^c")]);
        assert_eq!(tokenize(r#"say\"hi"#).unwrap(), vec![term(r#"say"hi"#)]);
        assert_eq!(tokenize(r#"\"hi"#).unwrap(), vec![term(r#""hi"#)]);
    }

    #[test]
    fn unsupported_escape_keeps_backslash() {
        assert_eq!(
            tokenize(r"can\ i\ escap\e").unwrap(),
            vec![term(r"can i escap\e")]
        );
    }

    #[test]
    fn unsupported_escape_keeps_escaped_character() {
        assert_eq!(tokenize("a\\\tb c").unwrap(), vec![term("a\\\tb"), term("c")]);
    }

    #[test]
    fn trailing_backslash_is_error() {
        let err = tokenize(r"cat\").unwrap_err();
        assert_eq!(err.position, 3);
        assert!(err.message.contains("escape"));
    }

    #[test]
    fn quoted_phrase() {
        assert_eq!(
            tokenize(r#""test phrase 1""#).unwrap(),
            vec![Token::Phrase("test phrase 1".into())]
        );
    }

    #[test]
    fn phrase_with_escaped_quote() {
        assert_eq!(
            tokenize(r#""what does \"quote\" mean""#).unwrap(),
            vec![Token::Phrase(r#"what does "quote" mean"#.into())]
        );
    }

    #[test]
    fn unterminated_phrase_error() {
        let err = tokenize(r#"field:"this is the time"#).unwrap_err();
        assert_eq!(err.position, 6);
        assert!(err.message.contains("unterminated phrase"));
    }

    #[test]
    fn escaped_closing_quote_leaves_phrase_open() {
        let err = tokenize(r#""open\""#).unwrap_err();
        assert!(err.message.contains("unterminated phrase"));
    }

    #[test]
    fn boost_and_tilde_suffixes() {
        assert_eq!(
            tokenize("test^3 watex~ 2 other^").unwrap(),
            vec![
                term("test"),
                Token::Boost("3".into()),
                term("watex"),
                Token::Tilde(String::new()),
                number("2"),
                term("other"),
                Token::Boost(String::new())
            ]
        );
    }

    #[test]
    fn fuzziness_then_boost() {
        assert_eq!(
            tokenize("watex~2^1.5").unwrap(),
            vec![
                term("watex"),
                Token::Tilde("2".into()),
                Token::Boost("1.5".into())
            ]
        );
    }

    #[test]
    fn suffix_keeps_escapes_raw() {
        assert_eq!(
            tokenize(r"cat^3\:").unwrap(),
            vec![term("cat"), Token::Boost(r"3\:".into())]
        );
    }

    #[test]
    fn regex_span_keeps_whitespace() {
        assert_eq!(
            tokenize("name:/mar ty.*/ next").unwrap(),
            vec![
                term("name"),
                Token::Colon,
                term("/mar ty.*/"),
                term("next")
            ]
        );
    }

    #[test]
    fn regex_span_keeps_escapes_verbatim() {
        assert_eq!(tokenize(r"/a\/b\d/").unwrap(), vec![term(r"/a\/b\d/")]);
    }

    #[test]
    fn unclosed_slash_is_plain_literal() {
        assert_eq!(
            tokenize("/usr local").unwrap(),
            vec![term("/usr"), term("local")]
        );
    }

    #[test]
    fn numeral_length_bound() {
        let ok = "9".repeat(MAX_NUMERAL_LEN);
        assert_eq!(tokenize(&ok).unwrap(), vec![number(&ok)]);

        let err = tokenize(&"9".repeat(369)).unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("numeral too long"));
    }

    #[test]
    fn token_positions() {
        let mut lexer = Lexer::new("a  +b");
        assert_eq!(
            lexer.next_token().unwrap(),
            Some(Spanned {
                token: term("a"),
                position: 0
            })
        );
        assert_eq!(lexer.next_token().unwrap().unwrap().position, 3);
        assert_eq!(lexer.next_token().unwrap().unwrap().position, 4);
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn multibyte_positions() {
        let mut lexer = Lexer::new("é ü");
        assert_eq!(lexer.next_token().unwrap().unwrap().position, 0);
        assert_eq!(lexer.next_token().unwrap().unwrap().position, 3);
    }

    #[test]
    fn numeral_shape() {
        assert!(is_numeral("0"));
        assert!(is_numeral("-12.5"));
        assert!(!is_numeral("-"));
        assert!(!is_numeral("1.2.3"));
        assert!(!is_numeral(".5"));
        assert!(!is_numeral("1e5"));
    }
}
