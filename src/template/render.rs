//! Executes a compiled template against a `serde_json::Value` context.
//!
//! Variables are kept on a single stack with block scoping: a list marks the
//! stack on entry and truncates back on exit. Included templates start a
//! fresh scope whose `$` is bound to their own context value.

use serde_json::Value;

use super::Template;
use super::error::RenderError;
use super::funcs::{display, truthy};
use super::node::{Arg, Branch, Command, Node, Pipe};

/// Included templates that include each other would otherwise recurse
/// without bound.
const MAX_INCLUDE_DEPTH: usize = 100;

pub(crate) fn render(tmpl: &Template, context: &Value) -> Result<String, RenderError> {
    let mut r = Renderer {
        tmpl,
        vars: vec![(String::new(), context.clone())],
        out: String::new(),
        depth: 0,
    };
    r.walk_list(tmpl.root(), context)?;
    Ok(r.out)
}

struct Renderer<'t> {
    tmpl: &'t Template,
    /// Declared variables, innermost last. The root `$` has an empty name.
    vars: Vec<(String, Value)>,
    out: String,
    depth: usize,
}

impl<'t> Renderer<'t> {
    fn walk_list(&mut self, nodes: &[Node], dot: &Value) -> Result<(), RenderError> {
        let mark = self.vars.len();
        for node in nodes {
            self.walk(node, dot)?;
        }
        self.vars.truncate(mark);
        Ok(())
    }

    fn walk(&mut self, node: &Node, dot: &Value) -> Result<(), RenderError> {
        match node {
            Node::Text(s) => self.out.push_str(s),
            Node::Comment(_) => {}
            Node::Action(pipe) => {
                let v = self.eval_pipe(pipe, dot)?;
                // A declaring action contributes no output.
                if pipe.decls.is_empty() {
                    self.out.push_str(&display(&v));
                }
            }
            Node::If(b) => {
                let mark = self.vars.len();
                let guard = self.eval_pipe(&b.pipe, dot)?;
                if truthy(&guard) {
                    self.walk_list(&b.body, dot)?;
                } else if let Some(else_body) = &b.else_body {
                    self.walk_list(else_body, dot)?;
                }
                self.vars.truncate(mark);
            }
            Node::With(b) => {
                let mark = self.vars.len();
                let val = self.eval_pipe(&b.pipe, dot)?;
                if truthy(&val) {
                    self.walk_list(&b.body, &val)?;
                } else if let Some(else_body) = &b.else_body {
                    self.walk_list(else_body, dot)?;
                }
                self.vars.truncate(mark);
            }
            Node::Range(b) => self.walk_range(b, dot)?,
            Node::Include(inc) => {
                let tmpl = self.tmpl;
                let body = if inc.name == tmpl.name() {
                    tmpl.root()
                } else {
                    tmpl.sub_body(&inc.name)
                        .ok_or_else(|| RenderError::UndefinedTemplate {
                            name: inc.name.clone(),
                        })?
                };
                let new_dot = match &inc.pipe {
                    Some(pipe) => self.eval_pipe_value(pipe, dot)?,
                    None => Value::Null,
                };
                if self.depth >= MAX_INCLUDE_DEPTH {
                    return Err(RenderError::BadCall {
                        message: format!("exceeded maximum template depth ({MAX_INCLUDE_DEPTH})"),
                    });
                }
                self.depth += 1;
                let saved = std::mem::replace(
                    &mut self.vars,
                    vec![(String::new(), new_dot.clone())],
                );
                let result = self.walk_list(body, &new_dot);
                self.vars = saved;
                self.depth -= 1;
                result?;
            }
        }
        Ok(())
    }

    fn walk_range(&mut self, b: &Branch, dot: &Value) -> Result<(), RenderError> {
        let mark = self.vars.len();
        let val = self.eval_pipe_value(&b.pipe, dot)?;
        let pairs: Vec<(Value, Value)> = match &val {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|k| (Value::String(k.clone()), map[k].clone()))
                    .collect()
            }
            Value::Null => Vec::new(),
            Value::Bool(_) => return Err(RenderError::NotIterable { kind: "bool" }),
            Value::Number(_) => return Err(RenderError::NotIterable { kind: "number" }),
            Value::String(_) => return Err(RenderError::NotIterable { kind: "string" }),
        };
        if pairs.is_empty() {
            if let Some(else_body) = &b.else_body {
                self.walk_list(else_body, dot)?;
            }
            self.vars.truncate(mark);
            return Ok(());
        }
        for name in &b.pipe.decls {
            self.vars.push((name.clone(), Value::Null));
        }
        for (key, element) in pairs {
            match b.pipe.decls.len() {
                1 => self.vars[mark] = (b.pipe.decls[0].clone(), element.clone()),
                2 => {
                    self.vars[mark] = (b.pipe.decls[0].clone(), key);
                    self.vars[mark + 1] = (b.pipe.decls[1].clone(), element.clone());
                }
                _ => {}
            }
            self.walk_list(&b.body, &element)?;
        }
        self.vars.truncate(mark);
        Ok(())
    }

    /// Evaluates a pipeline and binds its declared variables in the current
    /// scope.
    fn eval_pipe(&mut self, pipe: &Pipe, dot: &Value) -> Result<Value, RenderError> {
        let v = self.eval_pipe_value(pipe, dot)?;
        for name in &pipe.decls {
            self.vars.push((name.clone(), v.clone()));
        }
        Ok(v)
    }

    fn eval_pipe_value(&mut self, pipe: &Pipe, dot: &Value) -> Result<Value, RenderError> {
        let mut prev: Option<Value> = None;
        for cmd in &pipe.cmds {
            prev = Some(self.eval_cmd(cmd, dot, prev)?);
        }
        // Parser guarantees at least one command.
        Ok(prev.unwrap_or(Value::Null))
    }

    fn eval_cmd(
        &mut self,
        cmd: &Command,
        dot: &Value,
        prev: Option<Value>,
    ) -> Result<Value, RenderError> {
        match &cmd.args[0] {
            Arg::Func(name) => {
                let mut args = Vec::with_capacity(cmd.args.len());
                for a in &cmd.args[1..] {
                    args.push(self.eval_arg(a, dot)?);
                }
                if let Some(p) = prev {
                    args.push(p);
                }
                self.call(name, &args)
            }
            operand => {
                if cmd.args.len() > 1 || prev.is_some() {
                    return Err(RenderError::BadCall {
                        message: "can't give argument to non-function".to_string(),
                    });
                }
                self.eval_arg(operand, dot)
            }
        }
    }

    fn eval_arg(&mut self, arg: &Arg, dot: &Value) -> Result<Value, RenderError> {
        match arg {
            Arg::Field(path) => resolve(dot, path),
            Arg::Var { name, path } => {
                let base = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| RenderError::UndefinedVariable { name: name.clone() })?;
                resolve(&base, path)
            }
            Arg::Dot => Ok(dot.clone()),
            Arg::Nil => Ok(Value::Null),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Int(n) => Ok(Value::from(*n)),
            Arg::Float(f) => Ok(Value::from(*f)),
            Arg::Str(s) => Ok(Value::String(s.clone())),
            // A bare function name in argument position is a niladic call.
            Arg::Func(name) => self.call(name, &[]),
            Arg::Pipe(pipe) => self.eval_pipe_value(pipe, dot),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, RenderError> {
        let f = self
            .tmpl
            .funcs()
            .get(name)
            .ok_or_else(|| RenderError::BadCall {
                message: format!("function {name} not registered"),
            })?;
        f(args).map_err(|source| RenderError::Function {
            function: name.to_string(),
            source,
        })
    }
}

/// Walks a dot path from a base value. Missing object keys resolve to null
/// (map semantics); a path step against null or a scalar is an error.
fn resolve(base: &Value, path: &[String]) -> Result<Value, RenderError> {
    let mut cur = base.clone();
    for key in path {
        cur = match cur {
            Value::Null => return Err(RenderError::NilData { key: key.clone() }),
            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
            _ => return Err(RenderError::NoSuchField { key: key.clone() }),
        };
    }
    Ok(cur)
}
