//! Query Parser
//!
//! Parses CosmoSQL query text into a raw parse tree. The tree keeps tokens as
//! written (keyword spelling, comparator symbols, limit arguments in source
//! order); [`normalize`](super::normalize) turns it into a canonical `Query`.
//!
//! # Supported Syntax
//!
//! ```text
//! query      := CRUD document ('{' criteria_list '}')? ('[' aggregate_list ']')?
//! document   := Identifier ('(' (Identifier (',' Identifier)*)? ')')?
//! criteria   := sort | limit | where | set         -- each at most once
//! sort       := 'sort' '(' ('-'|'+') Identifier (',' ...)* ')'
//! limit      := 'limit' '(' Integer (',' Integer)? ')'
//! where      := 'where' '(' predicate ((',' predicate)* | ('|' predicate)*) ')'
//! predicate  := Identifier '~=' ('?' | String) | Identifier comparator value
//! set        := 'set' '(' Identifier '=' value (',' Identifier '=' value)* ')'
//! aggregate  := 'count' '(' ('*'|Identifier) ')' | ('AVG'|'MAX'|'MIN') '(' Identifier ')'
//! ```
//!
//! # Examples
//!
//! ```text
//! create artists{set(name = "john", songs = 24-12-2020, balance = 3.001)}
//! select artists(name, songs){limit(1, 5), where(name == "john")}[count(*), AVG(songs)]
//! update artists{set(name = "john", songs = 3f), where(id == ?)}
//! delete artists{where(songs < 5 | name ~= "j%")}
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, multispace0, one_of},
    combinator::{cut, map, not, opt, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::query::error::{QueryError, QueryResult};
use crate::query::lexer::{
    identifier, integer, is_identifier_char, keyword, literal, string_literal, ws, PResult,
};
use crate::value::Value;

/// Raw parse tree of a full query
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery<'a> {
    /// CRUD keyword as written (`INSERT`, `get`, ...)
    pub crud: &'a str,
    pub document: &'a str,
    pub properties: Vec<&'a str>,
    /// Criteria in source order
    pub criteria: Vec<RawCriterion<'a>>,
    pub aggregates: Vec<RawAggregate<'a>>,
}

/// One entry of the `{...}` criteria block
#[derive(Debug, Clone, PartialEq)]
pub enum RawCriterion<'a> {
    /// `(sign, property)` pairs
    Sort(Vec<(char, &'a str)>),
    /// Integer arguments in source order
    Limit(Vec<i64>),
    Where(RawBooleanGroup<'a>),
    /// `(property, value)` pairs
    Set(Vec<(&'a str, Value)>),
}

impl RawCriterion<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sort(_) => "sort",
            Self::Limit(_) => "limit",
            Self::Where(_) => "where",
            Self::Set(_) => "set",
        }
    }
}

/// Parenthesised predicate list of a `where` clause
#[derive(Debug, Clone, PartialEq)]
pub struct RawBooleanGroup<'a> {
    /// `None` for a single predicate, else `"and"` (`,`) or `"or"` (`|`)
    pub combinator: Option<&'static str>,
    pub predicates: Vec<RawPredicate<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPredicate<'a> {
    pub property: &'a str,
    /// Comparator symbol as written
    pub comparator: &'a str,
    pub value: Value,
}

/// One entry of the `[...]` aggregate block
#[derive(Debug, Clone, PartialEq)]
pub struct RawAggregate<'a> {
    /// Function name as written (`count`, `AVG`, ...)
    pub function: &'a str,
    /// Property name, or `*` for `count(*)`
    pub argument: &'a str,
}

/// Parse query text into a raw parse tree
pub fn parse_query(input: &str) -> QueryResult<RawQuery<'_>> {
    finish(input, query(input), "query")
}

/// Parse a single value literal
pub fn parse_value(input: &str) -> QueryResult<Value> {
    finish(input, ws(literal)(input), "value")
}

/// Require that the whole input was consumed and convert nom errors
fn finish<'a, O>(input: &'a str, result: PResult<'a, O>, what: &str) -> QueryResult<O> {
    match result {
        Ok((remaining, parsed)) => {
            let remaining = remaining.trim_start();
            if remaining.is_empty() {
                Ok(parsed)
            } else {
                Err(QueryError::syntax(
                    input,
                    remaining,
                    format!("unexpected input after {}", what),
                ))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let (at, message) = describe(&e, input);
            Err(QueryError::syntax(input, at, message))
        }
        Err(nom::Err::Incomplete(_)) => Err(QueryError::syntax(input, "", "incomplete input")),
    }
}

/// Pick the innermost failure location and the closest enclosing context
fn describe<'a>(error: &VerboseError<&'a str>, input: &'a str) -> (&'a str, String) {
    let Some((at, kind)) = error.errors.first() else {
        return (input, "invalid query".to_string());
    };

    let mut message = match kind {
        VerboseErrorKind::Char(c) => format!("expected '{}'", c),
        VerboseErrorKind::Context(ctx) => format!("expected {}", ctx),
        VerboseErrorKind::Nom(kind) => format!("unexpected token ({})", kind.description()),
    };

    let enclosing = error.errors.iter().skip(1).find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some(*ctx),
        _ => None,
    });
    if let Some(ctx) = enclosing {
        message = format!("{} in {}", message, ctx);
    }

    (*at, message)
}

fn query(input: &str) -> PResult<'_, RawQuery<'_>> {
    let (input, crud) = context("a CRUD keyword", ws(crud_keyword))(input)?;
    let (input, document) = context("a document name", cut(ws(identifier)))(input)?;
    let (input, properties) = opt(property_list)(input)?;
    let (input, criteria) = opt(preceded(
        ws(char('{')),
        cut(terminated(criteria_list, ws(char('}')))),
    ))(input)?;
    let (input, aggregates) = opt(preceded(
        ws(char('[')),
        cut(terminated(aggregate_list, ws(char(']')))),
    ))(input)?;
    let (input, _) = multispace0(input)?;

    Ok((
        input,
        RawQuery {
            crud,
            document,
            properties: properties.unwrap_or_default(),
            criteria: criteria.unwrap_or_default(),
            aggregates: aggregates.unwrap_or_default(),
        },
    ))
}

fn crud_keyword(input: &str) -> PResult<'_, &str> {
    alt((
        keyword("create"),
        keyword("insert"),
        keyword("select"),
        keyword("read"),
        keyword("get"),
        keyword("update"),
        keyword("save"),
        keyword("delete"),
        keyword("remove"),
        keyword("drop"),
    ))(input)
}

fn property_list(input: &str) -> PResult<'_, Vec<&str>> {
    preceded(
        ws(char('(')),
        cut(terminated(
            separated_list0(ws(char(',')), ws(identifier)),
            ws(char(')')),
        )),
    )(input)
}

/// Comma-separated criteria, rejecting a second occurrence of any kind
fn criteria_list(input: &str) -> PResult<'_, Vec<RawCriterion<'_>>> {
    let (mut input, first) = context("a criterion", criterion)(input)?;
    let mut criteria = vec![first];

    while let Ok((rest, _)) = ws(char::<&str, VerboseError<&str>>(','))(input) {
        let start = rest.trim_start();
        let (rest, next) = context("a criterion", cut(criterion))(rest)?;
        if criteria.iter().any(|c| c.name() == next.name()) {
            return Err(nom::Err::Failure(VerboseError {
                errors: vec![(
                    start,
                    VerboseErrorKind::Context("each criterion at most once"),
                )],
            }));
        }
        criteria.push(next);
        input = rest;
    }

    Ok((input, criteria))
}

fn criterion(input: &str) -> PResult<'_, RawCriterion<'_>> {
    ws(alt((sort, limit, where_clause, set)))(input)
}

fn sort(input: &str) -> PResult<'_, RawCriterion<'_>> {
    let (input, _) = keyword("sort")(input)?;
    context(
        "sort(...)",
        cut(map(
            delimited(
                ws(char('(')),
                separated_list1(ws(char(',')), ordered_property),
                ws(char(')')),
            ),
            RawCriterion::Sort,
        )),
    )(input)
}

fn ordered_property(input: &str) -> PResult<'_, (char, &str)> {
    pair(ws(one_of("-+")), ws(identifier))(input)
}

fn limit(input: &str) -> PResult<'_, RawCriterion<'_>> {
    let (input, _) = keyword("limit")(input)?;
    context(
        "limit(...)",
        cut(map(
            delimited(
                ws(char('(')),
                pair(ws(integer), opt(preceded(ws(char(',')), ws(integer)))),
                ws(char(')')),
            ),
            |(count, offset)| {
                let mut args = vec![count];
                args.extend(offset);
                RawCriterion::Limit(args)
            },
        )),
    )(input)
}

fn where_clause(input: &str) -> PResult<'_, RawCriterion<'_>> {
    let (input, _) = keyword("where")(input)?;
    context("where(...)", cut(map(boolean_group, RawCriterion::Where)))(input)
}

/// `(p)`, `(p, p, ...)` or `(p | p | ...)`; separators never mix
fn boolean_group(input: &str) -> PResult<'_, RawBooleanGroup<'_>> {
    let (input, _) = ws(char('('))(input)?;
    let (input, first) = predicate(input)?;
    let (input, separator) = opt(ws(one_of(",|")))(input)?;

    let (input, group) = match separator {
        None => (
            input,
            RawBooleanGroup {
                combinator: None,
                predicates: vec![first],
            },
        ),
        Some(sep) => {
            let (input, rest) = separated_list1(ws(char(sep)), predicate)(input)?;
            let mut predicates = vec![first];
            predicates.extend(rest);
            let combinator = if sep == ',' { "and" } else { "or" };
            (
                input,
                RawBooleanGroup {
                    combinator: Some(combinator),
                    predicates,
                },
            )
        }
    };

    let (input, _) = ws(char(')'))(input)?;
    Ok((input, group))
}

fn predicate(input: &str) -> PResult<'_, RawPredicate<'_>> {
    context("a predicate", alt((like_predicate, comparison)))(input)
}

fn like_predicate(input: &str) -> PResult<'_, RawPredicate<'_>> {
    let (input, property) = ws(identifier)(input)?;
    let (input, comparator) = ws(tag("~="))(input)?;
    let (input, value) = context(
        "'?' or a string pattern",
        cut(ws(alt((
            value(Value::Placeholder, char('?')),
            map(string_literal, Value::Text),
        )))),
    )(input)?;

    Ok((
        input,
        RawPredicate {
            property,
            comparator,
            value,
        },
    ))
}

fn comparison(input: &str) -> PResult<'_, RawPredicate<'_>> {
    let (input, property) = ws(identifier)(input)?;
    let (input, comparator) = ws(comparator_symbol)(input)?;
    let (input, value) = context("a value", ws(literal))(input)?;

    Ok((
        input,
        RawPredicate {
            property,
            comparator,
            value,
        },
    ))
}

fn comparator_symbol(input: &str) -> PResult<'_, &str> {
    alt((
        tag("=="),
        tag("<="),
        tag(">="),
        tag(">"),
        tag("<"),
        tag("!="),
        terminated(tag("is"), not(take_while_m_n(1, 1, is_identifier_char))),
    ))(input)
}

fn set(input: &str) -> PResult<'_, RawCriterion<'_>> {
    let (input, _) = keyword("set")(input)?;
    context(
        "set(...)",
        cut(map(
            delimited(
                ws(char('(')),
                separated_list1(ws(char(',')), assignment),
                ws(char(')')),
            ),
            RawCriterion::Set,
        )),
    )(input)
}

fn assignment(input: &str) -> PResult<'_, (&str, Value)> {
    map(
        tuple((ws(identifier), ws(char('=')), ws(literal))),
        |(property, _, value)| (property, value),
    )(input)
}

fn aggregate_list(input: &str) -> PResult<'_, Vec<RawAggregate<'_>>> {
    context(
        "an aggregate",
        separated_list1(ws(char(',')), aggregate),
    )(input)
}

fn aggregate(input: &str) -> PResult<'_, RawAggregate<'_>> {
    alt((
        map(
            pair(
                ws(keyword("count")),
                cut(delimited(
                    ws(char('(')),
                    ws(alt((tag("*"), identifier))),
                    ws(char(')')),
                )),
            ),
            |(function, argument)| RawAggregate { function, argument },
        ),
        map(
            pair(
                ws(alt((keyword("AVG"), keyword("MAX"), keyword("MIN")))),
                cut(delimited(ws(char('(')), ws(identifier), ws(char(')')))),
            ),
            |(function, argument)| RawAggregate { function, argument },
        ),
    ))(input)
}
