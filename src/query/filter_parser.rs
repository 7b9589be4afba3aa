//! Filter parsers.
//!
//! String grammar (nom combinators):
//! - Comparisons: `genre = horror`, `price >= 10`, `title != 'The Thing'`
//! - Sets: `tags IN [a, b]`, `tags NOT IN [a, b]`
//! - Ranges: `price 10 TO 50`
//! - Presence: `discount EXISTS`, `discount NOT EXISTS`
//! - Substrings: `title CONTAINS dune`
//! - Logical: `AND`, `OR`, `NOT`, parentheses
//!
//! Keywords are case-insensitive and require word boundaries, so `NOTES = x`
//! parses as a comparison on the `NOTES` attribute.
//!
//! Object grammar: `{"genre": "horror"}`, `{"price": {"$gte": 10}}`,
//! `{"$or": [{...}, {...}]}`. Several keys in one object are AND-ed.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{cut, map},
    error::ErrorKind,
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use serde_json::{Map, Value};

use crate::error::{GriddleError, Result};
use crate::query::filter::{Filter, Literal, MAX_FILTER_DEPTH};

/// Parse a string filter expression. Blank input yields `None`.
pub fn parse_filter(input: &str) -> Result<Option<Filter>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match expression(trimmed, 0) {
        Ok((rest, f)) if rest.trim().is_empty() => Ok(Some(f)),
        Ok((rest, _)) => Err(GriddleError::InvalidFilter(format!(
            "unexpected input after filter: `{}`",
            rest.trim()
        ))),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => Err(too_deep()),
        Err(e) => Err(GriddleError::InvalidFilter(format!(
            "could not parse `{}`: {}",
            trimmed, e
        ))),
    }
}

fn too_deep() -> GriddleError {
    GriddleError::InvalidFilter(format!(
        "filter is nested more than {} levels deep",
        MAX_FILTER_DEPTH
    ))
}

/// `depth` counts enclosing parentheses and `NOT`s; past the limit parsing stops.
fn expression(input: &str, depth: usize) -> IResult<&str, Filter> {
    if depth > MAX_FILTER_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge)));
    }
    or_expr(input, depth)
}

fn or_expr(input: &str, depth: usize) -> IResult<&str, Filter> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(preceded(
        delimited(multispace0, keyword("OR"), multispace0),
        cut(|i| and_expr(i, depth)),
    ))(input)?;
    Ok((input, combine(first, rest, Filter::Or)))
}

fn and_expr(input: &str, depth: usize) -> IResult<&str, Filter> {
    let (input, first) = not_expr(input, depth)?;
    let (input, rest) = many0(preceded(
        delimited(multispace0, keyword("AND"), multispace0),
        cut(|i| not_expr(i, depth)),
    ))(input)?;
    Ok((input, combine(first, rest, Filter::And)))
}

fn combine(first: Filter, rest: Vec<Filter>, wrap: fn(Vec<Filter>) -> Filter) -> Filter {
    if rest.is_empty() {
        first
    } else {
        let mut filters = vec![first];
        filters.extend(rest);
        wrap(filters)
    }
}

fn not_expr(input: &str, depth: usize) -> IResult<&str, Filter> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = terminated(keyword("NOT"), multispace0)(input) {
        if depth >= MAX_FILTER_DEPTH {
            return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge)));
        }
        let (rest, inner) = cut(|i| not_expr(i, depth + 1))(rest)?;
        return Ok((rest, Filter::Not(Box::new(inner))));
    }
    primary(input, depth)
}

fn primary(input: &str, depth: usize) -> IResult<&str, Filter> {
    alt((
        delimited(
            char('('),
            cut(delimited(multispace0, |i| expression(i, depth + 1), multispace0)),
            cut(char(')')),
        ),
        condition,
    ))(input)
}

fn keyword<'a>(kw: &'static str) -> impl Fn(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (remaining, matched) = tag_no_case(kw)(input)?;

        if remaining
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }

        Ok((remaining, matched))
    }
}

fn condition(input: &str) -> IResult<&str, Filter> {
    let (input, field) = attribute(input)?;
    let field = field.to_string();
    let (input, _) = multispace0(input)?;

    if let Ok((rest, op)) = operator(input) {
        let (rest, value) = cut(preceded(multispace0, literal))(rest)?;
        return Ok((rest, comparison(field, op, value)));
    }

    if let Ok((rest, _)) = terminated(keyword("IN"), multispace0)(input) {
        let (rest, values) = cut(literal_list)(rest)?;
        return Ok((rest, Filter::In { field, values }));
    }

    if let Ok((rest, _)) = terminated(keyword("NOT"), multispace0)(input) {
        if let Ok((rest, _)) = terminated(keyword("IN"), multispace0)(rest) {
            let (rest, values) = cut(literal_list)(rest)?;
            return Ok((rest, Filter::Not(Box::new(Filter::In { field, values }))));
        }
        let (rest, _) = cut(keyword("EXISTS"))(rest)?;
        return Ok((rest, Filter::Not(Box::new(Filter::Exists { field }))));
    }

    if let Ok((rest, _)) = keyword("EXISTS")(input) {
        return Ok((rest, Filter::Exists { field }));
    }

    if let Ok((rest, _)) = terminated(keyword("CONTAINS"), multispace0)(input) {
        let (rest, value) = cut(literal)(rest)?;
        return Ok((rest, Filter::Contains { field, value }));
    }

    let (rest, (min, _, max)) = tuple((
        literal,
        delimited(multispace1, keyword("TO"), multispace1),
        cut(literal),
    ))(input)?;
    Ok((rest, Filter::Range { field, min, max }))
}

fn comparison(field: String, op: &str, value: Literal) -> Filter {
    match op {
        "=" => Filter::Equals { field, value },
        "!=" => Filter::NotEquals { field, value },
        ">" => Filter::GreaterThan { field, value },
        ">=" => Filter::GreaterThanOrEqual { field, value },
        "<" => Filter::LessThan { field, value },
        _ => Filter::LessThanOrEqual { field, value },
    }
}

fn attribute(input: &str) -> IResult<&str, &str> {
    alt((
        quoted('"'),
        quoted('\''),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))(input)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag(">="),
        tag("<="),
        tag("!="),
        tag("="),
        tag(">"),
        tag("<"),
    ))(input)
}

fn quoted<'a>(quote: char) -> impl Fn(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| delimited(char(quote), take_while(move |c| c != quote), char(quote))(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(quoted('"'), Literal::new),
        map(quoted('\''), Literal::new),
        map(
            take_while1(|c: char| !c.is_whitespace() && !"()[],=!<>'\"".contains(c)),
            Literal::new,
        ),
    ))(input)
}

fn literal_list(input: &str) -> IResult<&str, Vec<Literal>> {
    delimited(
        terminated(char('['), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), literal),
        preceded(multispace0, char(']')),
    )(input)
}

/// Parse an object-shaped filter. An empty object yields `None`.
pub fn parse_object_filter(map: &Map<String, Value>) -> Result<Option<Filter>> {
    object_filter(map, 0)
}

fn object_filter(map: &Map<String, Value>, depth: usize) -> Result<Option<Filter>> {
    if depth > MAX_FILTER_DEPTH {
        return Err(too_deep());
    }
    let mut clauses = Vec::new();
    for (key, value) in map {
        clauses.push(object_clause(key, value, depth)?);
    }
    Ok(match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Filter::And(clauses)),
    })
}

fn object_clause(key: &str, value: &Value, depth: usize) -> Result<Filter> {
    match key {
        "$and" | "$or" => {
            let items = value.as_array().ok_or_else(|| {
                GriddleError::InvalidFilter(format!("`{}` expects an array of filters", key))
            })?;
            let mut parts = Vec::new();
            for item in items {
                let obj = item.as_object().ok_or_else(|| {
                    GriddleError::InvalidFilter(format!("`{}` entries must be objects", key))
                })?;
                if let Some(f) = object_filter(obj, depth + 1)? {
                    parts.push(f);
                }
            }
            Ok(if key == "$and" {
                Filter::And(parts)
            } else {
                Filter::Or(parts)
            })
        }
        "$not" => {
            let obj = value.as_object().ok_or_else(|| {
                GriddleError::InvalidFilter("`$not` expects a filter object".to_string())
            })?;
            let inner = object_filter(obj, depth + 1)?.ok_or_else(|| {
                GriddleError::InvalidFilter("`$not` expects a non-empty filter".to_string())
            })?;
            Ok(Filter::Not(Box::new(inner)))
        }
        op if op.starts_with('$') => Err(GriddleError::InvalidFilter(format!(
            "unknown top-level operator `{}`",
            op
        ))),
        field => attribute_clause(field, value),
    }
}

fn attribute_clause(field: &str, value: &Value) -> Result<Filter> {
    match value {
        Value::Array(items) => Ok(Filter::In {
            field: field.to_string(),
            values: literals(field, items)?,
        }),
        Value::Object(ops) => {
            let mut parts = Vec::new();
            for (op, operand) in ops {
                parts.push(operator_clause(field, op, operand)?);
            }
            match parts.len() {
                0 => Err(GriddleError::InvalidFilter(format!(
                    "no operator given for `{}`",
                    field
                ))),
                1 => Ok(parts.remove(0)),
                _ => Ok(Filter::And(parts)),
            }
        }
        scalar => Ok(Filter::Equals {
            field: field.to_string(),
            value: scalar_literal(field, scalar)?,
        }),
    }
}

fn operator_clause(field: &str, op: &str, operand: &Value) -> Result<Filter> {
    let field_name = field.to_string();
    let filter = match op {
        "$eq" => Filter::Equals { field: field_name, value: scalar_literal(field, operand)? },
        "$ne" => Filter::NotEquals { field: field_name, value: scalar_literal(field, operand)? },
        "$gt" => Filter::GreaterThan { field: field_name, value: scalar_literal(field, operand)? },
        "$gte" => Filter::GreaterThanOrEqual { field: field_name, value: scalar_literal(field, operand)? },
        "$lt" => Filter::LessThan { field: field_name, value: scalar_literal(field, operand)? },
        "$lte" => Filter::LessThanOrEqual { field: field_name, value: scalar_literal(field, operand)? },
        "$contains" => Filter::Contains { field: field_name, value: scalar_literal(field, operand)? },
        "$in" | "$nin" => {
            let items = operand.as_array().ok_or_else(|| {
                GriddleError::InvalidFilter(format!("`{}` on `{}` expects an array", op, field))
            })?;
            let in_filter = Filter::In { field: field_name, values: literals(field, items)? };
            if op == "$in" {
                in_filter
            } else {
                Filter::Not(Box::new(in_filter))
            }
        }
        "$exists" => {
            let exists = Filter::Exists { field: field_name };
            match operand {
                Value::Bool(true) => exists,
                Value::Bool(false) => Filter::Not(Box::new(exists)),
                _ => {
                    return Err(GriddleError::InvalidFilter(format!(
                        "`$exists` on `{}` expects a boolean",
                        field
                    )))
                }
            }
        }
        other => {
            return Err(GriddleError::InvalidFilter(format!(
                "unknown operator `{}` on `{}`",
                other, field
            )))
        }
    };
    Ok(filter)
}

fn scalar_literal(field: &str, value: &Value) -> Result<Literal> {
    Literal::from_json(value).ok_or_else(|| {
        GriddleError::InvalidFilter(format!(
            "`{}` must be compared with a string, number or boolean, got {}",
            field, value
        ))
    })
}

fn literals(field: &str, items: &[Value]) -> Result<Vec<Literal>> {
    items.iter().map(|v| scalar_literal(field, v)).collect()
}
