//! 'sqltmpl' - a small toolkit for parameterized SQL templates.
//!
//! This library provides the pieces a SQL-generation pipeline needs before
//! and around statement construction: discovering which named inputs a
//! query template requires, rendering variable-free companion templates
//! into structured headers, and the small glue that maps drivers to builder
//! dialects and reads aliases out of projection entries. It focuses on the
//! boundary between free-form template text and the strongly-typed builder
//! that consumes it.

pub mod dialect;
pub mod header;
pub mod projection;
pub mod template;
pub mod vars;

pub use dialect::{Dialect, Driver, dialect};
pub use header::{HeaderError, NativeSqlHeader, Specification};
pub use projection::{MixField, OrderBy, order_aliases, select_aliases};
pub use template::{FuncRegistry, ParseError, RenderError, Template, sql_funcs};
pub use vars::{Traversal, extract_template_vars, extract_template_vars_with};
