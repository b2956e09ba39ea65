//! Hand-written SQL tokenizer for GraniteDB.
//!
//! The [`Lexer`] takes a raw SQL string and produces a `Vec<Token>`,
//! case-folding keywords and quoted identifiers handled the way the
//! grammar in the component design calls for: single or double quote,
//! doubled quote as escape.

use crate::error::{GraniteError, Result};

/// A single SQL token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // -----------------------------------------------------------------------
    // Keywords
    // -----------------------------------------------------------------------
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Create,
    Drop,
    Table,
    Index,
    Not,
    And,
    Or,
    Is,
    Null,
    As,
    On,
    Join,
    Inner,
    Left,
    Outer,
    Order,
    By,
    Asc,
    Desc,
    Group,
    Having,
    Limit,
    Offset,
    Distinct,
    Primary,
    Key,
    Unique,
    Foreign,
    References,
    Delete,
    Update,
    Cascade,
    Restrict,
    Set,
    Coalesce,
    True,
    False,

    // -----------------------------------------------------------------------
    // Literals
    // -----------------------------------------------------------------------
    IntegerLiteral(i64),
    DecimalLiteral(String),
    StringLiteral(String),

    // -----------------------------------------------------------------------
    // Identifiers
    // -----------------------------------------------------------------------
    Identifier(String),

    // -----------------------------------------------------------------------
    // Operators & punctuation
    // -----------------------------------------------------------------------
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LeftParen,
    RightParen,
    Comma,
    Semicolon,
    Dot,

    /// End-of-file sentinel.
    Eof,
}

// ---------------------------------------------------------------------------
// Keyword lookup
// ---------------------------------------------------------------------------

fn keyword_token(word: &str) -> Option<Token> {
    // The input `word` is already uppercased by the caller.
    match word {
        "SELECT" => Some(Token::Select),
        "FROM" => Some(Token::From),
        "WHERE" => Some(Token::Where),
        "INSERT" => Some(Token::Insert),
        "INTO" => Some(Token::Into),
        "VALUES" => Some(Token::Values),
        "CREATE" => Some(Token::Create),
        "DROP" => Some(Token::Drop),
        "TABLE" => Some(Token::Table),
        "INDEX" => Some(Token::Index),
        "NOT" => Some(Token::Not),
        "AND" => Some(Token::And),
        "OR" => Some(Token::Or),
        "IS" => Some(Token::Is),
        "NULL" => Some(Token::Null),
        "AS" => Some(Token::As),
        "ON" => Some(Token::On),
        "JOIN" => Some(Token::Join),
        "INNER" => Some(Token::Inner),
        "LEFT" => Some(Token::Left),
        "OUTER" => Some(Token::Outer),
        "ORDER" => Some(Token::Order),
        "BY" => Some(Token::By),
        "ASC" => Some(Token::Asc),
        "DESC" => Some(Token::Desc),
        "GROUP" => Some(Token::Group),
        "HAVING" => Some(Token::Having),
        "LIMIT" => Some(Token::Limit),
        "OFFSET" => Some(Token::Offset),
        "DISTINCT" => Some(Token::Distinct),
        "PRIMARY" => Some(Token::Primary),
        "KEY" => Some(Token::Key),
        "UNIQUE" => Some(Token::Unique),
        "FOREIGN" => Some(Token::Foreign),
        "REFERENCES" => Some(Token::References),
        "DELETE" => Some(Token::Delete),
        "UPDATE" => Some(Token::Update),
        "CASCADE" => Some(Token::Cascade),
        "RESTRICT" => Some(Token::Restrict),
        "SET" => Some(Token::Set),
        "COALESCE" => Some(Token::Coalesce),
        "TRUE" => Some(Token::True),
        "FALSE" => Some(Token::False),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// A hand-written SQL tokenizer.
///
/// Create one with [`Lexer::new`], then call [`Lexer::tokenize`] to
/// obtain the full token stream (terminated by [`Token::Eof`]).
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input: input.as_bytes(), pos: 0 }
    }

    /// Tokenize the entire input. The returned vector always ends with
    /// [`Token::Eof`].
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Skip a `-- line comment`, returning `true` if one was consumed.
    fn skip_comment(&mut self) -> bool {
        if self.peek() == Some(b'-') && self.peek_at(1) == Some(b'-') {
            self.pos += 2;
            while let Some(ch) = self.peek() {
                self.pos += 1;
                if ch == b'\n' {
                    break;
                }
            }
            return true;
        }
        false
    }

    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if !self.skip_comment() {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();

        let ch = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        if ch == b'\'' || ch == b'"' {
            return self.read_string_or_quoted_identifier(ch);
        }
        if ch.is_ascii_digit() {
            return self.read_number();
        }
        if ch == b'.' && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            return self.read_number();
        }
        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.read_identifier_or_keyword();
        }

        self.read_operator()
    }

    /// Both string literals (`'...'`) and double-quoted identifiers
    /// (`"..."`) use the same doubled-delimiter escape rule, so they
    /// share a reader distinguished only by which token they produce.
    fn read_string_or_quoted_identifier(&mut self, quote: u8) -> Result<Token> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(GraniteError::Planning(
                        "unterminated string literal".into(),
                    ));
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.advance();
                        s.push(quote as char);
                    } else {
                        break;
                    }
                }
                Some(c) => s.push(c as char),
            }
        }
        if quote == b'\'' {
            Ok(Token::StringLiteral(s))
        } else {
            Ok(Token::Identifier(s))
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut is_decimal = false;

        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some(b'.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_decimal = true;
            self.advance();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.pos]).unwrap();

        if is_decimal {
            Ok(Token::DecimalLiteral(text.to_string()))
        } else {
            let val: i64 = text
                .parse()
                .map_err(|_| GraniteError::Planning(format!("invalid integer literal: {text}")))?;
            Ok(Token::IntegerLiteral(val))
        }
    }

    fn read_identifier_or_keyword(&mut self) -> Result<Token> {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.advance();
        }
        let word = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
        let upper = word.to_ascii_uppercase();

        if let Some(kw) = keyword_token(&upper) {
            Ok(kw)
        } else {
            Ok(Token::Identifier(word.to_string()))
        }
    }

    fn read_operator(&mut self) -> Result<Token> {
        let ch = self.advance().unwrap();
        match ch {
            b'+' => Ok(Token::Plus),
            b'*' => Ok(Token::Star),
            b'/' => Ok(Token::Slash),
            b'%' => Ok(Token::Percent),
            b'(' => Ok(Token::LeftParen),
            b')' => Ok(Token::RightParen),
            b',' => Ok(Token::Comma),
            b';' => Ok(Token::Semicolon),
            b'.' => Ok(Token::Dot),
            b'-' => Ok(Token::Minus),
            b'=' => Ok(Token::Eq),
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ok(Token::LtEq)
                } else if self.peek() == Some(b'>') {
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    Ok(Token::Lt)
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Ok(Token::GtEq)
                } else {
                    Ok(Token::Gt)
                }
            }
            _ => Err(GraniteError::Planning(format!(
                "unexpected character: '{}'",
                ch as char
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = lex("select FROM Where");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::From);
        assert_eq!(tokens[2], Token::Where);
    }

    #[test]
    fn identifiers_and_quoted_identifiers() {
        let tokens = lex("my_table \"My Column\"");
        assert_eq!(tokens[0], Token::Identifier("my_table".into()));
        assert_eq!(tokens[1], Token::Identifier("My Column".into()));
    }

    #[test]
    fn integer_and_decimal_literals() {
        let tokens = lex("42 3.14 .5");
        assert_eq!(tokens[0], Token::IntegerLiteral(42));
        assert_eq!(tokens[1], Token::DecimalLiteral("3.14".into()));
        assert_eq!(tokens[2], Token::DecimalLiteral(".5".into()));
    }

    #[test]
    fn string_literal_with_doubled_quote_escape() {
        let tokens = lex("'hello' 'it''s'");
        assert_eq!(tokens[0], Token::StringLiteral("hello".into()));
        assert_eq!(tokens[1], Token::StringLiteral("it's".into()));
    }

    #[test]
    fn comparison_and_arithmetic_operators() {
        let tokens = lex("+ - * / % = <> < > <= >=");
        assert_eq!(
            tokens,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Eq,
                Token::NotEq,
                Token::Lt,
                Token::Gt,
                Token::LtEq,
                Token::GtEq,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn punctuation() {
        let tokens = lex("( ) , ; .");
        assert_eq!(tokens[0], Token::LeftParen);
        assert_eq!(tokens[1], Token::RightParen);
        assert_eq!(tokens[2], Token::Comma);
        assert_eq!(tokens[3], Token::Semicolon);
        assert_eq!(tokens[4], Token::Dot);
    }

    #[test]
    fn line_comments_are_skipped() {
        let tokens = lex("SELECT -- this is a comment\n42");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::IntegerLiteral(42));
    }

    #[test]
    fn unterminated_string_is_illegal_token() {
        let result = Lexer::new("'hello").tokenize();
        assert!(matches!(result, Err(GraniteError::Planning(_))));
    }

    #[test]
    fn full_select_statement() {
        let tokens = lex("SELECT id, name FROM users WHERE age > 18;");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::Identifier("id".into()));
        assert_eq!(tokens[2], Token::Comma);
        assert_eq!(tokens[3], Token::Identifier("name".into()));
        assert_eq!(tokens[4], Token::From);
        assert_eq!(tokens[5], Token::Identifier("users".into()));
        assert_eq!(tokens[6], Token::Where);
        assert_eq!(tokens[7], Token::Identifier("age".into()));
        assert_eq!(tokens[8], Token::Gt);
        assert_eq!(tokens[9], Token::IntegerLiteral(18));
        assert_eq!(tokens[10], Token::Semicolon);
        assert_eq!(tokens[11], Token::Eof);
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(lex(""), vec![Token::Eof]);
    }
}
