//! Tokenizer for the action-delimited template grammar.
//!
//! Splits source text into literal runs and the tokens inside `{{ ... }}`
//! actions, handling trim markers (`{{- `, ` -}}`), comments, quoted and raw
//! strings, numbers, dot paths, and `$` variables. Line numbers are tracked
//! for error reporting only.

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Literal text between actions.
    Text(String),
    /// A `{{/* ... */}}` comment, delimiters stripped.
    Comment(String),
    Ident(String),
    /// A dot path: `.A.B` → `["A", "B"]`.
    Field(Vec<String>),
    /// The bare context dot.
    Dot,
    /// `$name`; the root variable `$` has an empty name.
    Variable(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// `:=`
    Assign,
    Comma,
    /// `|`
    Pipe,
    LParen,
    RParen,
    /// `}}`
    RightDelim,
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub tok: Token,
    pub line: usize,
}

pub(crate) fn lex(name: &str, source: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer {
        name,
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        out: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    name: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    out: Vec<Spanned>,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut trim_leading = false;
        loop {
            let mut text = String::new();
            let mut saw_action = false;
            while self.pos < self.chars.len() {
                if self.starts_with("{{") {
                    saw_action = true;
                    break;
                }
                text.push(self.advance());
            }
            if trim_leading {
                let trimmed = text.trim_start().to_string();
                text = trimmed;
            }
            let left_trim = saw_action
                && self.peek_at(2) == Some('-')
                && self.peek_at(3).is_some_and(|c| c.is_whitespace());
            if left_trim {
                let trimmed = text.trim_end().to_string();
                text = trimmed;
            }
            if !text.is_empty() {
                self.emit(Token::Text(text));
            }
            if !saw_action {
                return Ok(self.out);
            }
            self.advance(); // '{'
            self.advance(); // '{'
            if left_trim {
                self.advance(); // '-'
            }
            trim_leading = self.lex_action()?;
        }
    }

    /// Tokenizes one action, returning whether it ended with a trim marker.
    fn lex_action(&mut self) -> Result<bool, ParseError> {
        loop {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.advance();
            }
            if self.starts_with("-}}") {
                self.advance();
                self.advance();
                self.advance();
                self.emit(Token::RightDelim);
                return Ok(true);
            }
            if self.starts_with("}}") {
                self.advance();
                self.advance();
                self.emit(Token::RightDelim);
                return Ok(false);
            }
            if self.starts_with("/*") {
                return self.lex_comment();
            }
            let Some(c) = self.peek() else {
                return Err(ParseError::UnclosedAction {
                    name: self.name.to_string(),
                    line: self.line,
                });
            };
            match c {
                '|' => {
                    self.advance();
                    self.emit(Token::Pipe);
                }
                '(' => {
                    self.advance();
                    self.emit(Token::LParen);
                }
                ')' => {
                    self.advance();
                    self.emit(Token::RParen);
                }
                ',' => {
                    self.advance();
                    self.emit(Token::Comma);
                }
                ':' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.emit(Token::Assign);
                    } else {
                        return Err(self.error("expected := in declaration"));
                    }
                }
                '"' => self.lex_quoted()?,
                '`' => self.lex_raw()?,
                '$' => {
                    self.advance();
                    let name = self.read_ident();
                    self.emit(Token::Variable(name));
                }
                '.' => {
                    if self.peek_at(1).is_some_and(is_ident_start) {
                        let mut path = Vec::new();
                        while self.peek() == Some('.')
                            && self.peek_at(1).is_some_and(is_ident_start)
                        {
                            self.advance();
                            path.push(self.read_ident());
                        }
                        self.emit(Token::Field(path));
                    } else if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.lex_number()?;
                    } else {
                        self.advance();
                        self.emit(Token::Dot);
                    }
                }
                '+' | '-' => self.lex_number()?,
                _ if c.is_ascii_digit() => self.lex_number()?,
                _ if is_ident_start(c) => {
                    let ident = self.read_ident();
                    self.emit(Token::Ident(ident));
                }
                other => {
                    return Err(
                        self.error(format!("unrecognized character in action: {other:?}"))
                    );
                }
            }
        }
    }

    fn lex_comment(&mut self) -> Result<bool, ParseError> {
        self.advance(); // '/'
        self.advance(); // '*'
        let mut body = String::new();
        loop {
            if self.starts_with("*/") {
                self.advance();
                self.advance();
                break;
            }
            match self.peek() {
                Some(_) => body.push(self.advance()),
                None => return Err(self.error("unclosed comment")),
            }
        }
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
        let trim = if self.starts_with("-}}") {
            self.advance();
            self.advance();
            self.advance();
            true
        } else if self.starts_with("}}") {
            self.advance();
            self.advance();
            false
        } else {
            return Err(self.error("comment ends before closing delimiter"));
        };
        self.emit(Token::Comment(body));
        Ok(trim)
    }

    fn lex_quoted(&mut self) -> Result<(), ParseError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated quoted string")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let esc = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        other => {
                            return Err(self.error(format!("unknown escape {other:?}")));
                        }
                    };
                    self.advance();
                    s.push(esc);
                }
                Some(_) => s.push(self.advance()),
            }
        }
        self.emit(Token::Str(s));
        Ok(())
    }

    fn lex_raw(&mut self) -> Result<(), ParseError> {
        self.advance(); // opening backquote
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated raw string")),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some(_) => s.push(self.advance()),
            }
        }
        self.emit(Token::Str(s));
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), ParseError> {
        let mut s = String::new();
        let mut prev_exp = false;
        while let Some(c) = self.peek() {
            let take = c.is_ascii_digit()
                || c == '.'
                || c == 'e'
                || c == 'E'
                || ((c == '+' || c == '-') && (s.is_empty() || prev_exp));
            if !take {
                break;
            }
            prev_exp = c == 'e' || c == 'E';
            s.push(self.advance());
        }
        if let Ok(n) = s.parse::<i64>() {
            self.emit(Token::Int(n));
            return Ok(());
        }
        if let Ok(f) = s.parse::<f64>() {
            self.emit(Token::Float(f));
            return Ok(());
        }
        Err(self.error(format!("bad number syntax: {s:?}")))
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while self.peek().is_some_and(is_ident_char) {
            s.push(self.advance());
        }
        s
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn starts_with(&self, pat: &str) -> bool {
        pat.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    fn emit(&mut self, tok: Token) {
        self.out.push(Spanned {
            tok,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            name: self.name.to_string(),
            line: self.line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex("t", src).unwrap().into_iter().map(|s| s.tok).collect()
    }

    #[test]
    fn test_text_and_field_action() {
        assert_eq!(
            tokens("a{{.B.C}}d"),
            vec![
                Token::Text("a".to_string()),
                Token::Field(vec!["B".to_string(), "C".to_string()]),
                Token::RightDelim,
                Token::Text("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_trim_markers_strip_surrounding_whitespace() {
        assert_eq!(
            tokens("a \n{{- .X -}}\n b"),
            vec![
                Token::Text("a".to_string()),
                Token::Field(vec!["X".to_string()]),
                Token::RightDelim,
                Token::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_pipeline_tokens() {
        assert_eq!(
            tokens(r#"{{join ", " .Cols | upper}}"#),
            vec![
                Token::Ident("join".to_string()),
                Token::Str(", ".to_string()),
                Token::Field(vec!["Cols".to_string()]),
                Token::Pipe,
                Token::Ident("upper".to_string()),
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_declaration_and_numbers() {
        assert_eq!(
            tokens("{{$n := -3}}{{$f := 1.5}}"),
            vec![
                Token::Variable("n".to_string()),
                Token::Assign,
                Token::Int(-3),
                Token::RightDelim,
                Token::Variable("f".to_string()),
                Token::Assign,
                Token::Float(1.5),
                Token::RightDelim,
            ]
        );
    }

    #[test]
    fn test_comment_consumes_its_delimiters() {
        assert_eq!(
            tokens("x{{/* note */}}y"),
            vec![
                Token::Text("x".to_string()),
                Token::Comment(" note ".to_string()),
                Token::Text("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#"{{"a\"b\n"}}"#),
            vec![Token::Str("a\"b\n".to_string()), Token::RightDelim]
        );
    }

    #[test]
    fn test_unclosed_action_reports_line() {
        let err = lex("t", "line one\nline two {{.X").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(matches!(err, ParseError::UnclosedAction { .. }));
    }

    #[test]
    fn test_dollar_alone_is_root_variable() {
        assert_eq!(
            tokens("{{$}}"),
            vec![Token::Variable(String::new()), Token::RightDelim]
        );
    }
}
