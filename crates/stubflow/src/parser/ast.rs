//! Public AST types for embedded `(( ... ))` expressions.
//!
//! These types are public to enable external tooling (linters, formatters, etc.).
//! `Display` renders an expression back into source form; parsing the rendered
//! text yields the same tree.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;

use stubflow_semantics::{IntrinsicId, MarkerId, intrinsic_name, marker_name};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `nil` or `~`
    Nil,
    /// `~~`: the explicit "no value" sentinel.
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Reference(Reference),
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Juxtaposition: `a b`.
    Concatenation(Box<Expr>, Box<Expr>),
    Comparison {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a || b`: falls back to `b` when `a` fails or is undefined.
    Or(Box<Expr>, Box<Expr>),
    /// `a -or b`, `a -and b`
    Logical {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    List(Vec<Expr>),
    /// `[a..b]`, inclusive on both ends.
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Map(Vec<MapEntry>),
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    /// A call whose arguments are handed over unevaluated (`catch(x)`, `sync(...)`).
    Intrinsic {
        id: IntrinsicId,
        args: Vec<Argument>,
    },
    /// `f*(args)`: binds a subset of the parameters.
    Curry {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Lambda(Rc<LambdaExpr>),
    Merge(MergeExpr),
    Auto,
    Marker {
        markers: Vec<Marker>,
        expr: Option<Box<Expr>>,
    },
    /// `prefer expr`: the value is never overridden by a stub.
    Prefer(Box<Expr>),
    /// `*template`
    Substitution(Box<Expr>),
    /// `base.[index]`
    Dynamic {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `base.[start..end]`
    Slice {
        base: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    /// `base.[*].path`
    Projection {
        base: Box<Expr>,
        path: Vec<String>,
    },
    /// `base.path` on a non-reference base, e.g. `f(x).name`.
    Qualified {
        base: Box<Expr>,
        path: Vec<String>,
    },
    /// `( expr )`
    Grouped(Box<Expr>),
}

/// A reference to a node: `name.path`, `.absolute.path`, `tag::path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub tag: Option<String>,
    pub absolute: bool,
    pub path: Vec<String>,
}

impl Reference {
    /// Create a relative reference from path segments.
    pub fn relative(path: Vec<String>) -> Self {
        Self {
            tag: None,
            absolute: false,
            path,
        }
    }

    /// The single name of an untagged, relative, one-segment reference.
    pub fn simple_name(&self) -> Option<&str> {
        match (&self.tag, self.absolute, self.path.as_slice()) {
            (None, false, [name]) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "-and",
            LogicOp::Or => "-or",
        }
    }
}

/// A map literal entry: `key = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub value: Expr,
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expr),
    /// `name=expr`
    Named(String, Expr),
    /// `2=expr`, 1-based parameter position.
    Indexed(usize, Expr),
    /// `list...`
    Spread(Expr),
}

/// `|x, y=2, rest...|-> body`
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpr {
    pub params: Vec<Parameter>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expr>,
    pub variadic: bool,
}

/// `merge [replace|required] [on key] [path]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeExpr {
    pub path: Option<Vec<String>>,
    pub required: bool,
    pub replace: bool,
    pub key: Option<String>,
}

/// An annotation marker token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Flag(MarkerId),
    /// `&tag:name`
    Tag(String),
}

impl Expr {
    /// Strips any number of grouping parentheses.
    pub fn ungrouped(&self) -> &Expr {
        match self {
            Expr::Grouped(inner) => inner.ungrouped(),
            other => other,
        }
    }

    /// Markers statically attached at the top of this expression.
    pub fn markers(&self) -> Vec<&Marker> {
        match self.ungrouped() {
            Expr::Marker { markers, expr } => {
                let mut all: Vec<&Marker> = markers.iter().collect();
                if let Some(inner) = expr {
                    all.extend(inner.markers());
                }
                all
            }
            _ => Vec::new(),
        }
    }

    /// True if a marker with the given id is statically attached.
    pub fn has_marker(&self, id: MarkerId) -> bool {
        self.markers()
            .iter()
            .any(|m| matches!(m, Marker::Flag(flag) if *flag == id))
    }

    /// True if the expression is (possibly under markers) a `prefer` form.
    pub fn is_preferred(&self) -> bool {
        match self.ungrouped() {
            Expr::Prefer(_) => true,
            Expr::Marker {
                expr: Some(inner), ..
            } => inner.is_preferred(),
            _ => false,
        }
    }

    /// True if a `merge` appears anywhere outside of lambda bodies.
    pub fn contains_merge(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(
                e,
                Expr::Merge(_)
                    | Expr::Intrinsic {
                        id: IntrinsicId::Merge | IntrinsicId::Stub,
                        ..
                    }
            ) {
                found = true;
            }
        });
        found
    }

    /// Pre-order walk over this expression and its operands.
    ///
    /// Lambda bodies are not entered.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Nil
            | Expr::Undefined
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::Reference(_)
            | Expr::Lambda(_)
            | Expr::Merge(_)
            | Expr::Auto => {}
            Expr::Arithmetic { lhs, rhs, .. }
            | Expr::Comparison { lhs, rhs, .. }
            | Expr::Logical { lhs, rhs, .. }
            | Expr::Concatenation(lhs, rhs)
            | Expr::Or(lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Not(inner)
            | Expr::Prefer(inner)
            | Expr::Substitution(inner)
            | Expr::Grouped(inner) => inner.visit(f),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::List(items) => items.iter().for_each(|item| item.visit(f)),
            Expr::Range { start, end } => {
                start.visit(f);
                end.visit(f);
            }
            Expr::Map(entries) => entries.iter().for_each(|entry| entry.value.visit(f)),
            Expr::Call { callee, args } | Expr::Curry { callee, args } => {
                callee.visit(f);
                args.iter().for_each(|arg| arg.expr().visit(f));
            }
            Expr::Intrinsic { args, .. } => args.iter().for_each(|arg| arg.expr().visit(f)),
            Expr::Marker { expr, .. } => {
                if let Some(inner) = expr {
                    inner.visit(f);
                }
            }
            Expr::Dynamic { base, index } => {
                base.visit(f);
                index.visit(f);
            }
            Expr::Slice { base, start, end } => {
                base.visit(f);
                if let Some(start) = start {
                    start.visit(f);
                }
                if let Some(end) = end {
                    end.visit(f);
                }
            }
            Expr::Projection { base, .. } | Expr::Qualified { base, .. } => base.visit(f),
        }
    }
}

impl Argument {
    /// The argument expression regardless of how it is passed.
    pub fn expr(&self) -> &Expr {
        match self {
            Argument::Positional(e)
            | Argument::Named(_, e)
            | Argument::Indexed(_, e)
            | Argument::Spread(e) => e,
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn write_string_literal(f: &mut Formatter<'_>, s: &str) -> FmtResult {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

fn write_args(f: &mut Formatter<'_>, args: &[Argument]) -> FmtResult {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Expr::Nil => f.write_str("nil"),
            Expr::Undefined => f.write_str("~~"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Float(n) => write!(f, "{n:?}"),
            Expr::String(s) => write_string_literal(f, s),
            Expr::Reference(reference) => write!(f, "{reference}"),
            Expr::Arithmetic { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Concatenation(lhs, rhs) => write!(f, "{lhs} {rhs}"),
            Expr::Comparison { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Or(lhs, rhs) => write!(f, "{lhs} || {rhs}"),
            Expr::Logical { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "{condition} ? {then} : {otherwise}"),
            Expr::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Expr::Range { start, end } => write!(f, "[{start}..{end}]"),
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return f.write_str("{}");
                }
                f.write_str("{ ")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_plain_key(&entry.key) {
                        f.write_str(&entry.key)?;
                    } else {
                        write_string_literal(f, &entry.key)?;
                    }
                    write!(f, " = {}", entry.value)?;
                }
                f.write_str(" }")
            }
            Expr::Call { callee, args } => {
                write!(f, "{callee}")?;
                write_args(f, args)
            }
            Expr::Intrinsic { id, args } => {
                f.write_str(intrinsic_name(*id))?;
                write_args(f, args)
            }
            Expr::Curry { callee, args } => {
                write!(f, "{callee}*")?;
                write_args(f, args)
            }
            Expr::Lambda(lambda) => write!(f, "{lambda}"),
            Expr::Merge(merge) => write!(f, "{merge}"),
            Expr::Auto => f.write_str("auto"),
            Expr::Marker { markers, expr } => {
                for (i, marker) in markers.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{marker}")?;
                }
                match expr {
                    Some(inner) => write!(f, " {inner}"),
                    None => Ok(()),
                }
            }
            Expr::Prefer(inner) => write!(f, "prefer {inner}"),
            Expr::Substitution(inner) => write!(f, "*{inner}"),
            Expr::Dynamic { base, index } => write!(f, "{base}.[{index}]"),
            Expr::Slice { base, start, end } => {
                write!(f, "{base}.[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                f.write_str("..")?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                f.write_str("]")
            }
            Expr::Projection { base, path } => {
                write!(f, "{base}.[*]")?;
                for segment in path {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
            Expr::Qualified { base, path } => {
                write!(f, "{base}")?;
                for segment in path {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
            Expr::Grouped(inner) => write!(f, "({inner})"),
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(tag) = &self.tag {
            write!(f, "{tag}::")?;
        }
        if self.absolute {
            f.write_str(".")?;
        }
        f.write_str(&self.path.join("."))
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Argument::Positional(e) => write!(f, "{e}"),
            Argument::Named(name, e) => write!(f, "{name}={e}"),
            Argument::Indexed(index, e) => write!(f, "{index}={e}"),
            Argument::Spread(e) => write!(f, "{e}..."),
        }
    }
}

impl Display for LambdaExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("|")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&param.name)?;
            if let Some(default) = &param.default {
                write!(f, "={default}")?;
            }
            if param.variadic {
                f.write_str("...")?;
            }
        }
        write!(f, "|->{}", self.body)
    }
}

impl Display for MergeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("merge")?;
        if self.replace {
            f.write_str(" replace")?;
        }
        if self.required {
            f.write_str(" required")?;
        }
        if let Some(key) = &self.key {
            write!(f, " on {key}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " {}", path.join("."))?;
        }
        Ok(())
    }
}

impl Display for Marker {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Marker::Flag(id) => write!(f, "&{}", marker_name(*id)),
            Marker::Tag(name) => write!(f, "&tag:{name}"),
        }
    }
}
