//! Lexical primitives
//!
//! Literal recognizers shared by the grammar. None of them skip whitespace
//! internally; whitespace between tokens is handled by [`ws`].
//!
//! ```text
//! String    "john"  `john`  'john'
//! Integer   42  -7
//! Float     3.5  3.5f  -0.25  24f
//! Date      24-12-2020  2020-12-24
//! DateTime  24-12-2020T10:30:00.250  2020-12-24T10:30:00.250
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1, take_while_m_n},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, not, opt, recognize, value},
    error::{ErrorKind, ParseError, VerboseError},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::value::Value;

/// Parser result carrying nom's verbose error trail
pub type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Characters allowed in identifiers: ASCII alphanumerics, `_` and `$`
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Skip leading whitespace, then run `inner`
pub fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(multispace0, inner)
}

/// Case-insensitive keyword that is not the prefix of a longer identifier
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(
        tag_no_case(word),
        not(take_while_m_n(1, 1, is_identifier_char)),
    )
}

/// Document, property and column names
pub fn identifier(input: &str) -> PResult<'_, &str> {
    take_while1(is_identifier_char)(input)
}

fn quoted<'a>(delim: char) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    delimited(char(delim), take_while(move |c: char| c != delim), char(delim))
}

/// String literal in any of the three delimiter styles, delimiters stripped
pub fn string_literal(input: &str) -> PResult<'_, String> {
    map(
        alt((quoted('"'), quoted('`'), quoted('\''))),
        |s: &str| s.to_string(),
    )(input)
}

/// Optional `-` followed by digits
pub fn integer(input: &str) -> PResult<'_, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

/// `-1.5`, `1.5f`
fn decimal_float(input: &str) -> PResult<'_, f64> {
    terminated(
        map_res(
            recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
            |s: &str| s.parse::<f64>(),
        ),
        opt(char('f')),
    )(input)
}

/// `24f`: integral shorthand, the `f` is mandatory
fn integral_float(input: &str) -> PResult<'_, f64> {
    terminated(
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<f64>()
        }),
        char('f'),
    )(input)
}

/// Any numeric literal
pub fn number(input: &str) -> PResult<'_, Value> {
    alt((
        map(integral_float, Value::Float),
        map(decimal_float, Value::Float),
        map(integer, Value::Integer),
    ))(input)
}

fn fixed_digits<'a>(count: usize) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    take_while_m_n(count, count, |c: char| c.is_ascii_digit())
}

fn day_first_date(input: &str) -> PResult<'_, NaiveDate> {
    map_res(
        recognize(tuple((
            fixed_digits(2),
            char('-'),
            fixed_digits(2),
            char('-'),
            fixed_digits(4),
        ))),
        |s: &str| NaiveDate::parse_from_str(s, "%d-%m-%Y"),
    )(input)
}

fn year_first_date(input: &str) -> PResult<'_, NaiveDate> {
    map_res(
        recognize(tuple((
            fixed_digits(4),
            char('-'),
            fixed_digits(2),
            char('-'),
            fixed_digits(2),
        ))),
        |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d"),
    )(input)
}

/// `DD-MM-YYYY` or `YYYY-MM-DD`, day-first tried first
pub fn date(input: &str) -> PResult<'_, NaiveDate> {
    alt((day_first_date, year_first_date))(input)
}

fn time_component<'a>(count: usize) -> impl FnMut(&'a str) -> PResult<'a, u32> {
    map_res(fixed_digits(count), |s: &str| s.parse::<u32>())
}

/// A date followed by `THH:MM:SS.mmm`
pub fn datetime(input: &str) -> PResult<'_, NaiveDateTime> {
    let start = input;
    let (input, day) = date(input)?;
    let (input, _) = char('T')(input)?;
    let (input, (hour, _, minute, _, second, _, milli)) = tuple((
        time_component(2),
        char(':'),
        time_component(2),
        char(':'),
        time_component(2),
        char('.'),
        time_component(3),
    ))(input)?;

    match day.and_hms_milli_opt(hour, minute, second, milli) {
        Some(dt) => Ok((input, dt)),
        None => Err(nom::Err::Error(VerboseError::from_error_kind(
            start,
            ErrorKind::Verify,
        ))),
    }
}

/// Any value literal: `?`, `NULL`, datetime, date, number or string
pub fn literal(input: &str) -> PResult<'_, Value> {
    alt((
        value(Value::Placeholder, char('?')),
        value(Value::Null, keyword("NULL")),
        map(datetime, Value::DateTime),
        map(date, Value::Date),
        number,
        map(string_literal, Value::Text),
    ))(input)
}
