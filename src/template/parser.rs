//! Recursive-descent parser from the token stream to the compiled tree.

use std::collections::BTreeMap;

use super::error::ParseError;
use super::funcs::FuncRegistry;
use super::lexer::{Spanned, Token, lex};
use super::node::{Arg, Branch, Command, Inclusion, Node, Pipe};

const KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block",
];

/// Parse output: the primary body plus every `define`d sub-template.
#[derive(Debug)]
pub(crate) struct Parsed {
    pub root: Vec<Node>,
    pub subs: BTreeMap<String, Vec<Node>>,
}

pub(crate) fn parse(name: &str, source: &str, funcs: &FuncRegistry) -> Result<Parsed, ParseError> {
    let tokens = lex(name, source)?;
    Parser {
        name,
        tokens,
        pos: 0,
        funcs,
        subs: BTreeMap::new(),
    }
    .run()
}

enum Terminator {
    Eof,
    End,
    Else,
    /// `{{else if ...}}`; the parser is left positioned at the nested guard.
    ElseIf,
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    funcs: &'a FuncRegistry,
    subs: BTreeMap<String, Vec<Node>>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Parsed, ParseError> {
        let (root, term) = self.parse_list(true)?;
        debug_assert!(matches!(term, Terminator::Eof));
        Ok(Parsed {
            root,
            subs: self.subs,
        })
    }

    fn parse_list(&mut self, top: bool) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        loop {
            let Some(spanned) = self.peek() else {
                if top {
                    return Ok((nodes, Terminator::Eof));
                }
                return Err(self.error("unexpected EOF: unclosed control construct"));
            };
            match spanned.tok.clone() {
                Token::Text(s) => {
                    self.advance();
                    nodes.push(Node::Text(s));
                }
                Token::Comment(s) => {
                    self.advance();
                    nodes.push(Node::Comment(s));
                }
                Token::Ident(id) if id == "end" => {
                    let line = spanned.line;
                    self.advance();
                    self.expect_right_delim()?;
                    if top {
                        return Err(ParseError::UnexpectedEnd {
                            name: self.name.to_string(),
                            line,
                        });
                    }
                    return Ok((nodes, Terminator::End));
                }
                Token::Ident(id) if id == "else" => {
                    if top {
                        return Err(self.error("unexpected {{else}}"));
                    }
                    self.advance();
                    match self.peek().map(|s| s.tok.clone()) {
                        Some(Token::RightDelim) => {
                            self.advance();
                            return Ok((nodes, Terminator::Else));
                        }
                        Some(Token::Ident(next)) if next == "if" => {
                            self.advance();
                            return Ok((nodes, Terminator::ElseIf));
                        }
                        _ => return Err(self.error("unexpected token after else")),
                    }
                }
                Token::Ident(id) if id == "if" || id == "with" || id == "range" => {
                    self.advance();
                    let node = self.parse_branch(&id)?;
                    nodes.push(node);
                }
                Token::Ident(id) if id == "define" => {
                    if !top {
                        return Err(self.error("unexpected {{define}} inside another construct"));
                    }
                    self.advance();
                    self.parse_define()?;
                }
                Token::Ident(id) if id == "block" => {
                    self.advance();
                    let node = self.parse_block()?;
                    nodes.push(node);
                }
                Token::Ident(id) if id == "template" => {
                    self.advance();
                    let node = self.parse_include()?;
                    nodes.push(node);
                }
                _ => {
                    let pipe = self.parse_pipe(true, false)?;
                    self.expect_right_delim()?;
                    nodes.push(Node::Action(pipe));
                }
            }
        }
    }

    fn parse_branch(&mut self, kind: &str) -> Result<Node, ParseError> {
        let pipe = self.parse_pipe(true, kind == "range")?;
        self.expect_right_delim()?;
        let (body, term) = self.parse_list(false)?;
        let else_body = match term {
            Terminator::End => None,
            Terminator::Else => {
                let (eb, t) = self.parse_list(false)?;
                if !matches!(t, Terminator::End) {
                    return Err(self.error("expected {{end}}"));
                }
                Some(eb)
            }
            // An else-if chain shares the outer {{end}}: the nested if is the
            // whole else body and its parse consumes the terminator.
            Terminator::ElseIf => Some(vec![self.parse_branch("if")?]),
            Terminator::Eof => unreachable!("parse_list errors on EOF below top level"),
        };
        let branch = Branch {
            pipe,
            body,
            else_body,
        };
        Ok(match kind {
            "if" => Node::If(branch),
            "with" => Node::With(branch),
            _ => Node::Range(branch),
        })
    }

    fn parse_define(&mut self) -> Result<(), ParseError> {
        let name = self.expect_string("define")?;
        self.expect_right_delim()?;
        let (body, term) = self.parse_list(false)?;
        if !matches!(term, Terminator::End) {
            return Err(self.error("unexpected {{else}} in define"));
        }
        self.register_sub(name, body)
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_string("block")?;
        let pipe = self.optional_pipe()?;
        self.expect_right_delim()?;
        let (body, term) = self.parse_list(false)?;
        if !matches!(term, Terminator::End) {
            return Err(self.error("unexpected {{else}} in block"));
        }
        self.register_sub(name.clone(), body)?;
        Ok(Node::Include(Inclusion { name, pipe }))
    }

    fn parse_include(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_string("template")?;
        let pipe = self.optional_pipe()?;
        self.expect_right_delim()?;
        Ok(Node::Include(Inclusion { name, pipe }))
    }

    fn register_sub(&mut self, name: String, body: Vec<Node>) -> Result<(), ParseError> {
        if self.subs.contains_key(&name) {
            return Err(self.error(format!("multiple definition of template {name:?}")));
        }
        self.subs.insert(name, body);
        Ok(())
    }

    fn optional_pipe(&mut self) -> Result<Option<Pipe>, ParseError> {
        if matches!(self.peek().map(|s| &s.tok), Some(Token::RightDelim)) {
            Ok(None)
        } else {
            Ok(Some(self.parse_pipe(false, false)?))
        }
    }

    fn parse_pipe(&mut self, allow_decls: bool, allow_multi: bool) -> Result<Pipe, ParseError> {
        let mut decls = Vec::new();
        if allow_decls {
            let save = self.pos;
            let mut names = Vec::new();
            loop {
                let Some(Token::Variable(n)) = self.peek().map(|s| s.tok.clone()) else {
                    self.pos = save;
                    names.clear();
                    break;
                };
                self.advance();
                names.push(n);
                match self.peek().map(|s| s.tok.clone()) {
                    Some(Token::Comma) => {
                        self.advance();
                    }
                    Some(Token::Assign) => {
                        self.advance();
                        decls = std::mem::take(&mut names);
                        break;
                    }
                    _ => {
                        self.pos = save;
                        names.clear();
                        break;
                    }
                }
            }
            let max = if allow_multi { 2 } else { 1 };
            if decls.len() > max {
                return Err(self.error("too many declarations in pipeline"));
            }
        }
        let mut cmds = vec![self.parse_command()?];
        while matches!(self.peek().map(|s| &s.tok), Some(Token::Pipe)) {
            self.advance();
            cmds.push(self.parse_command()?);
        }
        Ok(Pipe { decls, cmds })
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        loop {
            match self.peek().map(|s| &s.tok) {
                None => return Err(self.error("unexpected EOF in command")),
                Some(Token::RightDelim | Token::RParen | Token::Pipe) => break,
                Some(_) => args.push(self.parse_operand()?),
            }
        }
        if args.is_empty() {
            return Err(self.error("missing value in command"));
        }
        Ok(Command { args })
    }

    fn parse_operand(&mut self) -> Result<Arg, ParseError> {
        let Some(spanned) = self.peek().cloned() else {
            return Err(self.error("unexpected EOF in operand"));
        };
        match spanned.tok {
            Token::Field(path) => {
                self.advance();
                Ok(Arg::Field(path))
            }
            Token::Dot => {
                self.advance();
                Ok(Arg::Dot)
            }
            Token::Variable(name) => {
                self.advance();
                let path = match self.peek().map(|s| s.tok.clone()) {
                    Some(Token::Field(p)) => {
                        self.advance();
                        p
                    }
                    _ => Vec::new(),
                };
                Ok(Arg::Var { name, path })
            }
            Token::Str(s) => {
                self.advance();
                Ok(Arg::Str(s))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Arg::Int(n))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Arg::Float(f))
            }
            Token::Ident(id) => match id.as_str() {
                "nil" => {
                    self.advance();
                    Ok(Arg::Nil)
                }
                "true" => {
                    self.advance();
                    Ok(Arg::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Arg::Bool(false))
                }
                kw if KEYWORDS.contains(&kw) => {
                    Err(self.error(format!("unexpected keyword {kw:?} in operand")))
                }
                name => {
                    if !self.funcs.contains(name) {
                        return Err(ParseError::UnknownFunction {
                            name: self.name.to_string(),
                            line: spanned.line,
                            function: name.to_string(),
                        });
                    }
                    self.advance();
                    Ok(Arg::Func(name.to_string()))
                }
            },
            Token::LParen => {
                self.advance();
                let pipe = self.parse_pipe(false, false)?;
                match self.peek().map(|s| &s.tok) {
                    Some(Token::RParen) => {
                        self.advance();
                        Ok(Arg::Pipe(pipe))
                    }
                    _ => Err(self.error("unclosed parenthesized pipeline")),
                }
            }
            other => Err(self.error(format!("unexpected {other:?} in operand"))),
        }
    }

    fn expect_string(&mut self, after: &str) -> Result<String, ParseError> {
        match self.peek().map(|s| s.tok.clone()) {
            Some(Token::Str(s)) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(format!("expected template name string after {after}"))),
        }
    }

    fn expect_right_delim(&mut self) -> Result<(), ParseError> {
        match self.peek().map(|s| &s.tok) {
            Some(Token::RightDelim) => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error("expected }}")),
        }
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> &Spanned {
        let s = &self.tokens[self.pos];
        self.pos += 1;
        s
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            name: self.name.to_string(),
            line: self.line(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::funcs::sql_funcs;

    fn parse_ok(src: &str) -> Parsed {
        parse("t", src, &sql_funcs()).unwrap()
    }

    #[test]
    fn test_action_nodes() {
        let parsed = parse_ok("{{.A}}{{.B}}");
        assert_eq!(parsed.root.len(), 2);
        let Node::Action(pipe) = &parsed.root[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.cmds[0].args, vec![Arg::Field(vec!["A".to_string()])]);
    }

    #[test]
    fn test_else_if_chain_nests_in_else_body() {
        let parsed = parse_ok("{{if .A}}a{{else if .B}}b{{else}}c{{end}}");
        let Node::If(outer) = &parsed.root[0] else {
            panic!("expected if");
        };
        let nested = outer.else_body.as_ref().unwrap();
        assert_eq!(nested.len(), 1);
        let Node::If(inner) = &nested[0] else {
            panic!("expected nested if");
        };
        assert_eq!(inner.body, vec![Node::Text("b".to_string())]);
        assert_eq!(
            inner.else_body.as_ref().unwrap(),
            &vec![Node::Text("c".to_string())]
        );
    }

    #[test]
    fn test_define_registers_sub_template_only() {
        let parsed = parse_ok(r#"{{define "sub"}}{{.X}}{{end}}body"#);
        assert_eq!(parsed.root, vec![Node::Text("body".to_string())]);
        assert!(parsed.subs.contains_key("sub"));
    }

    #[test]
    fn test_duplicate_define_rejected() {
        let err = parse(
            "t",
            r#"{{define "s"}}a{{end}}{{define "s"}}b{{end}}"#,
            &sql_funcs(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("multiple definition"));
    }

    #[test]
    fn test_block_defines_and_includes() {
        let parsed = parse_ok(r#"{{block "b" .}}x{{end}}"#);
        assert!(parsed.subs.contains_key("b"));
        assert!(matches!(&parsed.root[0], Node::Include(inc) if inc.name == "b"));
    }

    #[test]
    fn test_unknown_function_is_a_parse_error() {
        let err = parse("t", "{{frobnicate .X}}", &sql_funcs()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownFunction { ref function, .. } if function == "frobnicate"
        ));
    }

    #[test]
    fn test_unexpected_end_at_top_level() {
        let err = parse("t", "a{{end}}", &sql_funcs()).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_missing_end_is_an_error() {
        let err = parse("t", "{{if .A}}x", &sql_funcs()).unwrap_err();
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn test_range_allows_two_declarations() {
        let parsed = parse_ok("{{range $i, $v := .Rows}}{{$v}}{{end}}");
        let Node::Range(b) = &parsed.root[0] else {
            panic!("expected range");
        };
        assert_eq!(b.pipe.decls, vec!["i".to_string(), "v".to_string()]);
    }

    #[test]
    fn test_if_rejects_two_declarations() {
        let err = parse("t", "{{if $a, $b := .X}}y{{end}}", &sql_funcs()).unwrap_err();
        assert!(err.to_string().contains("too many declarations"));
    }

    #[test]
    fn test_nested_pipeline_operand() {
        let parsed = parse_ok("{{print (len .Rows)}}");
        let Node::Action(pipe) = &parsed.root[0] else {
            panic!("expected action");
        };
        assert!(matches!(pipe.cmds[0].args[1], Arg::Pipe(_)));
    }
}
