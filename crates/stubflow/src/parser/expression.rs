//! Expression parser using winnow.
//!
//! Precedence, lowest first:
//! - `||` fallback
//! - `?:` conditional
//! - juxtaposition (concatenation, requires whitespace)
//! - `-or`, `-and` (require whitespace)
//! - comparison (non-associative)
//! - `+ -`
//! - `* / %`
//! - prefix forms, markers, `merge`, `auto`, `prefer`, lambdas
//! - postfix chains: calls, currying, field access, indexing, slices, projections

use std::rc::Rc;

use stubflow_semantics::{IntrinsicId, MarkerId, is_keyword, resolve_intrinsic, resolve_marker};
use winnow::ascii::{digit1, multispace0, multispace1};
use winnow::combinator::{alt, delimited, not, opt, peek, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{none_of, one_of};

use super::ast::*;
use super::error::ParseError;

/// Parse a complete expression (the text between `((` and `))`).
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut remaining = input;
    match delimited(multispace0, expression, multispace0).parse_next(&mut remaining) {
        Ok(expr) if remaining.is_empty() => Ok(expr),
        Ok(_) => {
            let (line, column) = calculate_position(input, remaining);
            Err(ParseError::Syntax {
                line,
                column,
                message: format!(
                    "unexpected character: '{}'",
                    remaining.chars().next().unwrap_or('?')
                ),
            })
        }
        Err(_) => {
            let rest = remaining.trim_start();
            let (line, column) = calculate_position(input, rest);
            if rest.is_empty() {
                Err(ParseError::UnexpectedEof { line, column })
            } else {
                Err(ParseError::Syntax {
                    line,
                    column,
                    message: "expected an expression".to_string(),
                })
            }
        }
    }
}

/// Calculate line and column from original input and remaining input.
fn calculate_position(original: &str, remaining: &str) -> (usize, usize) {
    let consumed = original.len() - remaining.len();
    let consumed_str = &original[..consumed];
    let line = consumed_str.chars().filter(|&c| c == '\n').count() + 1;
    let column = match consumed_str.rfind('\n') {
        Some(pos) => consumed - pos,
        None => consumed + 1,
    };
    (line, column)
}

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn expression(input: &mut &str) -> ModalResult<Expr> {
    or_expr(input)
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut lhs = conditional(input)?;
    while let Some(rhs) =
        opt(preceded((multispace0, "||", multispace0), conditional)).parse_next(input)?
    {
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn conditional(input: &mut &str) -> ModalResult<Expr> {
    let condition = concatenation(input)?;
    let branches = opt((
        preceded((multispace0, '?', multispace0), expression),
        preceded((multispace0, ':', multispace0), conditional),
    ))
    .parse_next(input)?;
    Ok(match branches {
        Some((then, otherwise)) => Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
        None => condition,
    })
}

fn concatenation(input: &mut &str) -> ModalResult<Expr> {
    let mut lhs = logical(input)?;
    while let Some(rhs) = opt(preceded(multispace1, logical)).parse_next(input)? {
        lhs = Expr::Concatenation(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn logical(input: &mut &str) -> ModalResult<Expr> {
    let mut lhs = comparison(input)?;
    while let Some((op, rhs)) =
        opt((delimited(multispace1, logic_op, multispace1), comparison)).parse_next(input)?
    {
        lhs = Expr::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn logic_op(input: &mut &str) -> ModalResult<LogicOp> {
    preceded('-', logic_word).parse_next(input)
}

fn logic_word(input: &mut &str) -> ModalResult<LogicOp> {
    alt((
        keyword("or").value(LogicOp::Or),
        keyword("and").value(LogicOp::And),
    ))
    .parse_next(input)
}

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let lhs = additive(input)?;
    let rhs = opt((delimited(multispace0, compare_op, multispace0), additive)).parse_next(input)?;
    Ok(match rhs {
        Some((op, rhs)) => Expr::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        None => lhs,
    })
}

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Ne),
        "<=".value(CompareOp::Le),
        ">=".value(CompareOp::Ge),
        '<'.value(CompareOp::Lt),
        '>'.value(CompareOp::Gt),
    ))
    .parse_next(input)
}

fn additive(input: &mut &str) -> ModalResult<Expr> {
    let mut lhs = multiplicative(input)?;
    while let Some((op, rhs)) =
        opt((delimited(multispace0, additive_op, multispace0), multiplicative)).parse_next(input)?
    {
        lhs = Expr::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

/// `+` or a `-` that does not start `-or` / `-and`.
fn additive_op(input: &mut &str) -> ModalResult<ArithOp> {
    alt((
        '+'.value(ArithOp::Add),
        terminated('-', not(logic_word)).value(ArithOp::Sub),
    ))
    .parse_next(input)
}

fn multiplicative(input: &mut &str) -> ModalResult<Expr> {
    let mut lhs = level0(input)?;
    while let Some((op, rhs)) =
        opt((delimited(multispace0, multiplicative_op, multispace0), level0)).parse_next(input)?
    {
        lhs = Expr::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn multiplicative_op(input: &mut &str) -> ModalResult<ArithOp> {
    alt((
        '*'.value(ArithOp::Mul),
        '/'.value(ArithOp::Div),
        '%'.value(ArithOp::Mod),
    ))
    .parse_next(input)
}

fn level0(input: &mut &str) -> ModalResult<Expr> {
    alt((
        not_expr,
        substitution,
        marker_expr,
        merge_expr,
        keyword("auto").value(Expr::Auto),
        prefer_expr,
        lambda_expr,
        negative_number,
        chained,
    ))
    .parse_next(input)
}

fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    preceded(('!', multispace0), level0)
        .map(|e| Expr::Not(Box::new(e)))
        .parse_next(input)
}

fn substitution(input: &mut &str) -> ModalResult<Expr> {
    preceded('*', level0)
        .map(|e| Expr::Substitution(Box::new(e)))
        .parse_next(input)
}

fn prefer_expr(input: &mut &str) -> ModalResult<Expr> {
    preceded((keyword("prefer"), multispace1), level0)
        .map(|e| Expr::Prefer(Box::new(e)))
        .parse_next(input)
}

/// `&temporary &tag:name expr`
///
/// Markers apply to the whole expression following them.
fn marker_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut markers = vec![marker(input)?];
    while let Some(next) = opt(preceded(multispace0, marker)).parse_next(input)? {
        markers.push(next);
    }
    let expr = opt(preceded(multispace0, expression)).parse_next(input)?;
    Ok(Expr::Marker {
        markers,
        expr: expr.map(Box::new),
    })
}

fn marker(input: &mut &str) -> ModalResult<Marker> {
    let name = preceded('&', identifier).parse_next(input)?;
    match resolve_marker(name) {
        Some(MarkerId::Tag) => {
            let tag = preceded(':', tag_name).parse_next(input)?;
            Ok(Marker::Tag(tag))
        }
        Some(id) => Ok(Marker::Flag(id)),
        None => backtrack(),
    }
}

/// `merge [replace|required] [on key] [path]`
fn merge_expr(input: &mut &str) -> ModalResult<Expr> {
    keyword("merge").parse_next(input)?;
    not('(').parse_next(input)?;
    let mut merge = MergeExpr::default();
    loop {
        if opt(preceded(multispace1, keyword("replace")))
            .parse_next(input)?
            .is_some()
        {
            merge.replace = true;
        } else if opt(preceded(multispace1, keyword("required")))
            .parse_next(input)?
            .is_some()
        {
            merge.required = true;
        } else {
            break;
        }
    }
    merge.key = opt(preceded((multispace1, keyword("on"), multispace1), identifier))
        .parse_next(input)?
        .map(str::to_string);
    merge.path = opt(preceded(multispace1, merge_path)).parse_next(input)?;
    Ok(Expr::Merge(merge))
}

fn merge_path(input: &mut &str) -> ModalResult<Vec<String>> {
    let first = identifier(input)?;
    if is_keyword(first) {
        return backtrack();
    }
    let rest: Vec<String> = repeat(0.., preceded('.', path_segment)).parse_next(input)?;
    let mut path = vec![first.to_string()];
    path.extend(rest);
    Ok(path)
}

/// `[lambda] |x, y=1, rest...|-> body`
fn lambda_expr(input: &mut &str) -> ModalResult<Expr> {
    opt(terminated(keyword("lambda"), multispace0)).parse_next(input)?;
    ('|', multispace0).parse_next(input)?;
    let params: Vec<Parameter> =
        separated(0.., parameter, (multispace0, ',', multispace0)).parse_next(input)?;
    (multispace0, '|', multispace0, "->", multispace0).parse_next(input)?;
    let body = expression(input)?;
    Ok(Expr::Lambda(Rc::new(LambdaExpr { params, body })))
}

fn parameter(input: &mut &str) -> ModalResult<Parameter> {
    let name = identifier(input)?.to_string();
    let variadic = opt("...").parse_next(input)?.is_some();
    let default = if variadic {
        None
    } else {
        opt(preceded((multispace0, '=', multispace0), expression)).parse_next(input)?
    };
    Ok(Parameter {
        name,
        default,
        variadic,
    })
}

fn negative_number(input: &mut &str) -> ModalResult<Expr> {
    '-'.parse_next(input)?;
    number_literal(input, true)
}

fn number(input: &mut &str) -> ModalResult<Expr> {
    number_literal(input, false)
}

fn number_literal(input: &mut &str, negative: bool) -> ModalResult<Expr> {
    let text = (
        digit1,
        opt(('.', digit1)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)?;
    let literal = if negative {
        format!("-{text}")
    } else {
        text.to_string()
    };
    if text.contains(['.', 'e', 'E']) {
        literal.parse::<f64>().map(Expr::Float).or_else(|_| backtrack())
    } else {
        literal.parse::<i64>().map(Expr::Int).or_else(|_| backtrack())
    }
}

/// Postfix operators applied to a primary without intervening whitespace.
enum Postfix {
    Call(Vec<Argument>),
    Curry(Vec<Argument>),
    Field(String),
    Index(IndexSuffix),
}

enum IndexSuffix {
    Project,
    Slice(Option<Expr>, Option<Expr>),
    Index(Expr),
}

fn chained(input: &mut &str) -> ModalResult<Expr> {
    let mut expr = primary(input)?;
    if is_literal(&expr) {
        return Ok(expr);
    }
    while let Some(postfix) = opt(postfix).parse_next(input)? {
        expr = apply_postfix(expr, postfix);
    }
    Ok(expr)
}

fn postfix(input: &mut &str) -> ModalResult<Postfix> {
    alt((
        call_args.map(Postfix::Call),
        preceded('*', call_args).map(Postfix::Curry),
        preceded(opt('.'), index_suffix).map(Postfix::Index),
        preceded('.', path_segment).map(Postfix::Field),
    ))
    .parse_next(input)
}

fn apply_postfix(expr: Expr, postfix: Postfix) -> Expr {
    match postfix {
        Postfix::Call(args) => match &expr {
            Expr::Reference(reference) => match reference.simple_name().and_then(resolve_intrinsic)
            {
                Some(id) => Expr::Intrinsic { id, args },
                None => Expr::Call {
                    callee: Box::new(expr),
                    args,
                },
            },
            _ => Expr::Call {
                callee: Box::new(expr),
                args,
            },
        },
        Postfix::Curry(args) => Expr::Curry {
            callee: Box::new(expr),
            args,
        },
        Postfix::Field(name) => match expr {
            Expr::Reference(mut reference) => {
                reference.path.push(name);
                Expr::Reference(reference)
            }
            Expr::Projection { base, mut path } => {
                path.push(name);
                Expr::Projection { base, path }
            }
            Expr::Qualified { base, mut path } => {
                path.push(name);
                Expr::Qualified { base, path }
            }
            other => Expr::Qualified {
                base: Box::new(other),
                path: vec![name],
            },
        },
        Postfix::Index(IndexSuffix::Project) => Expr::Projection {
            base: Box::new(expr),
            path: Vec::new(),
        },
        Postfix::Index(IndexSuffix::Slice(start, end)) => Expr::Slice {
            base: Box::new(expr),
            start: start.map(Box::new),
            end: end.map(Box::new),
        },
        Postfix::Index(IndexSuffix::Index(index)) => match (expr, index) {
            // A literal index is a path step, resolved without the rest of the list.
            (Expr::Reference(mut reference), Expr::Int(position)) => {
                reference.path.push(format!("[{position}]"));
                Expr::Reference(reference)
            }
            (expr, index) => Expr::Dynamic {
                base: Box::new(expr),
                index: Box::new(index),
            },
        },
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Nil | Expr::Undefined | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::String(_)
    )
}

fn index_suffix(input: &mut &str) -> ModalResult<IndexSuffix> {
    delimited(('[', multispace0), index_body, (multispace0, ']')).parse_next(input)
}

fn index_body(input: &mut &str) -> ModalResult<IndexSuffix> {
    if opt(terminated('*', (multispace0, peek(']'))))
        .parse_next(input)?
        .is_some()
    {
        return Ok(IndexSuffix::Project);
    }
    let start = opt(expression).parse_next(input)?;
    if opt((multispace0, "..", multispace0)).parse_next(input)?.is_some() {
        let end = opt(expression).parse_next(input)?;
        return Ok(IndexSuffix::Slice(start, end));
    }
    match start {
        Some(index) => Ok(IndexSuffix::Index(index)),
        None => backtrack(),
    }
}

fn call_args(input: &mut &str) -> ModalResult<Vec<Argument>> {
    delimited(
        ('(', multispace0),
        separated(0.., argument, (multispace0, ',', multispace0)),
        (multispace0, opt((',', multispace0)), ')'),
    )
    .parse_next(input)
}

fn argument(input: &mut &str) -> ModalResult<Argument> {
    alt((
        (identifier, assignment, expression).map(|(name, _, e)| Argument::Named(name.to_string(), e)),
        (digit1.parse_to::<usize>(), assignment, expression)
            .map(|(index, _, e)| Argument::Indexed(index, e)),
        terminated(expression, "...").map(Argument::Spread),
        expression.map(Argument::Positional),
    ))
    .parse_next(input)
}

/// A single `=` (not `==`) with optional surrounding whitespace.
fn assignment(input: &mut &str) -> ModalResult<()> {
    (multispace0, '=', not('='), multispace0)
        .void()
        .parse_next(input)
}

fn primary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        number,
        string_literal.map(Expr::String),
        keyword("true").value(Expr::Bool(true)),
        keyword("false").value(Expr::Bool(false)),
        keyword("nil").value(Expr::Nil),
        "~~".value(Expr::Undefined),
        '~'.value(Expr::Nil),
        list_literal,
        map_literal,
        delimited(('(', multispace0), expression, (multispace0, ')'))
            .map(|e| Expr::Grouped(Box::new(e))),
        merge_call,
        reference.map(Expr::Reference),
    ))
    .parse_next(input)
}

/// `merge(...)`: the function form of the merge keyword.
fn merge_call(input: &mut &str) -> ModalResult<Expr> {
    preceded(terminated("merge", peek('(')), call_args)
        .map(|args| Expr::Intrinsic {
            id: IntrinsicId::Merge,
            args,
        })
        .parse_next(input)
}

/// `[a, b, c]` or the inclusive range `[a..b]`.
fn list_literal(input: &mut &str) -> ModalResult<Expr> {
    ('[', multispace0).parse_next(input)?;
    let range = opt(terminated(
        (
            terminated(expression, (multispace0, "..", multispace0)),
            expression,
        ),
        (multispace0, ']'),
    ))
    .parse_next(input)?;
    if let Some((start, end)) = range {
        return Ok(Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
        });
    }
    let items: Vec<Expr> =
        separated(0.., expression, (multispace0, ',', multispace0)).parse_next(input)?;
    (multispace0, opt((',', multispace0)), ']').parse_next(input)?;
    Ok(Expr::List(items))
}

/// `{ key = value, "quoted key": value }`
fn map_literal(input: &mut &str) -> ModalResult<Expr> {
    delimited(
        ('{', multispace0),
        separated(0.., map_entry, (multispace0, ',', multispace0)),
        (multispace0, opt((',', multispace0)), '}'),
    )
    .map(Expr::Map)
    .parse_next(input)
}

fn map_entry(input: &mut &str) -> ModalResult<MapEntry> {
    let key = alt((string_literal, identifier.map(str::to_string))).parse_next(input)?;
    (multispace0, one_of(['=', ':']), multispace0).parse_next(input)?;
    let value = expression(input)?;
    Ok(MapEntry { key, value })
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    delimited('"', repeat(0.., string_char), '"').parse_next(input)
}

fn string_char(input: &mut &str) -> ModalResult<char> {
    alt((
        preceded(
            '\\',
            alt((
                '"'.value('"'),
                '\\'.value('\\'),
                'n'.value('\n'),
                't'.value('\t'),
                'r'.value('\r'),
            )),
        ),
        none_of(['"', '\\']),
    ))
    .parse_next(input)
}

/// `[tag::][.]name(.name)*`
fn reference(input: &mut &str) -> ModalResult<Reference> {
    let tag = opt(terminated(tag_name, "::")).parse_next(input)?;
    let absolute = opt('.').parse_next(input)?.is_some();
    let first = identifier(input)?;
    if tag.is_none() && !absolute && is_keyword(first) {
        return backtrack();
    }
    let rest: Vec<String> = repeat(0.., preceded('.', path_segment)).parse_next(input)?;
    let mut path = vec![first.to_string()];
    path.extend(rest);
    Ok(Reference {
        tag,
        absolute,
        path,
    })
}

/// A tag name, optionally with a numeric stub qualifier (`doc.1`).
fn tag_name(input: &mut &str) -> ModalResult<String> {
    (identifier, opt(preceded('.', digit1)))
        .take()
        .map(str::to_string)
        .parse_next(input)
}

fn path_segment(input: &mut &str) -> ModalResult<String> {
    alt((identifier, digit1)).map(str::to_string).parse_next(input)
}

/// A keyword that is not the prefix of a longer identifier.
fn keyword<'i>(mut word: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    move |input: &mut &'i str| {
        let matched = word.parse_next(input)?;
        if continues_identifier(*input) {
            return backtrack();
        }
        Ok(matched)
    }
}

/// Identifiers may contain `-` when it is followed by a letter or `_`.
fn identifier<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    let start = *input;
    one_of(is_ident_start).parse_next(input)?;
    while continues_identifier(*input) {
        let skip = input.chars().next().map_or(0, char::len_utf8);
        *input = &input[skip..];
    }
    Ok(&start[..start.len() - input.len()])
}

fn continues_identifier(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if is_ident_cont(c) => true,
        Some('-') => chars.next().is_some_and(is_ident_start),
        _ => false,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_cont(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
