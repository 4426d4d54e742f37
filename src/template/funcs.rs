//! The injectable function registry available to template pipelines.
//!
//! Functions operate on [`serde_json::Value`] and report failures through
//! `anyhow::Error`, which the renderer surfaces as a
//! [`RenderError::Function`](super::error::RenderError::Function).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use regex::Regex;
use serde_json::Value;

/// A function callable from a template pipeline.
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// A name → function mapping handed to [`Template::parse`](super::Template::parse).
///
/// Function names are validated at parse time: referencing a name that is not
/// registered is a syntax error, so a registry must be fully populated before
/// parsing.
#[derive(Clone, Default)]
pub struct FuncRegistry {
    funcs: HashMap<String, TemplateFn>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, replacing any previous one of the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&TemplateFn> {
        self.funcs.get(name)
    }
}

impl fmt::Debug for FuncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FuncRegistry").field("names", &names).finish()
    }
}

/// Whether a value counts as "set" for conditionals, matching the renderer's
/// if/with semantics.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Textual form of a value when written into rendered output.
pub(crate) fn display(v: &Value) -> String {
    match v {
        Value::Null => "<no value>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> anyhow::Result<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x
            .partial_cmp(&y)
            .ok_or_else(|| anyhow!("incomparable numbers {x} and {y}"));
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Ok(x.cmp(y));
    }
    bail!("incompatible types for comparison")
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn need(args: &[Value], n: usize, name: &str) -> anyhow::Result<()> {
    if args.len() < n {
        bail!("wrong number of args for {name}: want at least {n} got {}", args.len());
    }
    Ok(())
}

fn sql_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

fn format_verbs(format: &str, args: &[Value]) -> anyhow::Result<String> {
    let mut out = String::new();
    let mut next = 0usize;
    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('v' | 's' | 'd' | 'f' | 'q')) => {
                let arg = args
                    .get(next)
                    .ok_or_else(|| anyhow!("printf: missing argument for %{verb}"))?;
                next += 1;
                match verb {
                    'd' => {
                        let n = arg
                            .as_f64()
                            .ok_or_else(|| anyhow!("printf: %d applied to non-number"))?;
                        out.push_str(&format!("{}", n as i64));
                    }
                    'f' => {
                        let n = arg
                            .as_f64()
                            .ok_or_else(|| anyhow!("printf: %f applied to non-number"))?;
                        out.push_str(&format!("{n}"));
                    }
                    'q' => out.push_str(&format!("{:?}", display(arg))),
                    _ => out.push_str(&display(arg)),
                }
            }
            Some(other) => bail!("printf: unsupported verb %{other}"),
            None => bail!("printf: trailing %"),
        }
    }
    Ok(out)
}

/// The default registry injected by the extraction and rendering entry
/// points: general pipeline functions plus SQL literal helpers.
///
/// Callers embedding the engine can start from this registry and
/// [`insert`](FuncRegistry::insert) their own functions on top.
pub fn sql_funcs() -> FuncRegistry {
    let mut reg = FuncRegistry::new();

    reg.insert("and", |args: &[Value]| {
        let mut last = Value::Bool(false);
        for a in args {
            if !truthy(a) {
                return Ok(a.clone());
            }
            last = a.clone();
        }
        Ok(last)
    });
    reg.insert("or", |args: &[Value]| {
        for a in args {
            if truthy(a) {
                return Ok(a.clone());
            }
        }
        Ok(args.last().cloned().unwrap_or(Value::Null))
    });
    reg.insert("not", |args: &[Value]| {
        need(args, 1, "not")?;
        Ok(Value::Bool(!truthy(&args[0])))
    });

    reg.insert("eq", |args: &[Value]| {
        need(args, 2, "eq")?;
        Ok(Value::Bool(args[1..].iter().any(|b| values_equal(&args[0], b))))
    });
    reg.insert("ne", |args: &[Value]| {
        need(args, 2, "ne")?;
        Ok(Value::Bool(!values_equal(&args[0], &args[1])))
    });
    reg.insert("lt", |args: &[Value]| {
        need(args, 2, "lt")?;
        Ok(Value::Bool(compare(&args[0], &args[1])?.is_lt()))
    });
    reg.insert("le", |args: &[Value]| {
        need(args, 2, "le")?;
        Ok(Value::Bool(compare(&args[0], &args[1])?.is_le()))
    });
    reg.insert("gt", |args: &[Value]| {
        need(args, 2, "gt")?;
        Ok(Value::Bool(compare(&args[0], &args[1])?.is_gt()))
    });
    reg.insert("ge", |args: &[Value]| {
        need(args, 2, "ge")?;
        Ok(Value::Bool(compare(&args[0], &args[1])?.is_ge()))
    });

    reg.insert("len", |args: &[Value]| {
        need(args, 1, "len")?;
        let n = match &args[0] {
            Value::String(s) => s.chars().count(),
            Value::Array(a) => a.len(),
            Value::Object(o) => o.len(),
            other => bail!("len of unsupported value {other}"),
        };
        Ok(Value::from(n))
    });
    reg.insert("index", |args: &[Value]| {
        need(args, 2, "index")?;
        let mut cur = args[0].clone();
        for key in &args[1..] {
            cur = match (&cur, key) {
                (Value::Array(a), Value::Number(n)) => {
                    let i = n
                        .as_u64()
                        .ok_or_else(|| anyhow!("index: invalid array index {n}"))?;
                    a.get(i as usize)
                        .cloned()
                        .ok_or_else(|| anyhow!("index: out of range: {i}"))?
                }
                (Value::Object(o), Value::String(k)) => o.get(k).cloned().unwrap_or(Value::Null),
                (other, _) => bail!("index of unsupported value {other}"),
            };
        }
        Ok(cur)
    });

    reg.insert("print", |args: &[Value]| {
        Ok(Value::String(args.iter().map(display).collect::<String>()))
    });
    reg.insert("printf", |args: &[Value]| {
        need(args, 1, "printf")?;
        let format = args[0]
            .as_str()
            .ok_or_else(|| anyhow!("printf: format must be a string"))?;
        Ok(Value::String(format_verbs(format, &args[1..])?))
    });

    // `{{.Limit | default 100}}`: the piped value arrives last.
    reg.insert("default", |args: &[Value]| {
        let Some((value, rest)) = args.split_last() else {
            bail!("wrong number of args for default: want at least 1 got 0");
        };
        if truthy(value) {
            Ok(value.clone())
        } else {
            Ok(rest.first().cloned().unwrap_or(Value::Null))
        }
    });
    reg.insert("coalesce", |args: &[Value]| {
        Ok(args.iter().find(|v| truthy(v)).cloned().unwrap_or(Value::Null))
    });

    reg.insert("join", |args: &[Value]| {
        need(args, 2, "join")?;
        let sep = args[0]
            .as_str()
            .ok_or_else(|| anyhow!("join: separator must be a string"))?;
        let items = args[1]
            .as_array()
            .ok_or_else(|| anyhow!("join: value must be an array"))?;
        let parts: Vec<String> = items.iter().map(display).collect();
        Ok(Value::String(parts.join(sep)))
    });
    reg.insert("upper", |args: &[Value]| {
        need(args, 1, "upper")?;
        Ok(Value::String(display(&args[0]).to_uppercase()))
    });
    reg.insert("lower", |args: &[Value]| {
        need(args, 1, "lower")?;
        Ok(Value::String(display(&args[0]).to_lowercase()))
    });

    // SQL literal helpers.
    reg.insert("quote", |args: &[Value]| {
        need(args, 1, "quote")?;
        Ok(Value::String(sql_quote(&display(&args[0]))))
    });
    reg.insert("ident", |args: &[Value]| {
        need(args, 1, "ident")?;
        let name = display(&args[0]);
        if let Ok(re) = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$") {
            if !re.is_match(&name) {
                bail!("ident: unsafe identifier {name:?}");
            }
        }
        Ok(Value::String(name))
    });
    reg.insert("list", |args: &[Value]| {
        need(args, 1, "list")?;
        let items = args[0]
            .as_array()
            .ok_or_else(|| anyhow!("list: value must be an array"))?;
        let parts: Vec<String> = items.iter().map(|v| sql_quote(&display(v))).collect();
        Ok(Value::String(parts.join(", ")))
    });

    reg
}
