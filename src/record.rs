use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, anychar, char, digit1, multispace0, none_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, preceded, terminated},
    IResult,
};
use nom::Parser;
use std::fmt;

/// Scalar value of a record entry
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Integer(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Bool(bool),
    Nil,
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Integer(i) => write!(f, "{}", i),
            RecordValue::Float(x) => write!(f, "{}", x),
            RecordValue::Str(s) | RecordValue::Symbol(s) => write!(f, "{}", s),
            RecordValue::Bool(b) => write!(f, "{}", b),
            RecordValue::Nil => Ok(()),
        }
    }
}

/// Key/value payload embedded in a log line, e.g. `{:PSS=>1024, :RSS=>2048}`
///
/// Accepted keys are `:symbol =>`, `"string" =>`, `"string":` and `name:`.
/// Values are integers, floats, double-quoted strings, `:symbols`, `true`,
/// `false` and `nil`. Nested structures are rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: IndexMap<String, RecordValue>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.entries.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&RecordValue> {
        self.get(key)
            .ok_or_else(|| anyhow!("record has no '{}' entry", key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

pub fn parse_record(input: &str) -> Result<Record> {
    match all_consuming(record).parse(input.trim()) {
        Ok((_, entries)) => Ok(Record {
            entries: entries.into_iter().collect(),
        }),
        Err(e) => Err(anyhow!("invalid record '{}': {}", input, e)),
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Double-quoted string, backslash escapes the next character
fn quoted(input: &str) -> IResult<&str, String> {
    let (input, chars) = delimited(
        char('"'),
        many0(alt((preceded(char('\\'), anychar), none_of("\\\"")))),
        char('"'),
    )
    .parse(input)?;
    Ok((input, chars.into_iter().collect()))
}

fn number(input: &str) -> IResult<&str, RecordValue> {
    map_res(
        recognize((opt(char('-')), digit1, opt((char('.'), digit1)))),
        |text: &str| -> Result<RecordValue, std::num::ParseFloatError> {
            if !text.contains('.') {
                if let Ok(i) = text.parse::<i64>() {
                    return Ok(RecordValue::Integer(i));
                }
            }
            text.parse::<f64>().map(RecordValue::Float)
        },
    )
    .parse(input)
}

fn scalar(input: &str) -> IResult<&str, RecordValue> {
    alt((
        map(quoted, RecordValue::Str),
        map(preceded(char(':'), identifier), |s: &str| {
            RecordValue::Symbol(s.to_string())
        }),
        number,
        value(RecordValue::Bool(true), tag("true")),
        value(RecordValue::Bool(false), tag("false")),
        value(RecordValue::Nil, tag("nil")),
    ))
    .parse(input)
}

fn key(input: &str) -> IResult<&str, String> {
    alt((
        map(
            terminated(preceded(char(':'), identifier), (multispace0, tag("=>"))),
            |s: &str| s.to_string(),
        ),
        terminated(quoted, (multispace0, alt((tag("=>"), tag(":"))))),
        map(terminated(identifier, (multispace0, char(':'))), |s: &str| {
            s.to_string()
        }),
    ))
    .parse(input)
}

fn entry(input: &str) -> IResult<&str, (String, RecordValue)> {
    map((key, multispace0, scalar), |(k, _, v)| (k, v)).parse(input)
}

fn record(input: &str) -> IResult<&str, Vec<(String, RecordValue)>> {
    delimited(
        (char('{'), multispace0),
        separated_list0((multispace0, char(','), multispace0), entry),
        (multispace0, opt(char(',')), multispace0, char('}')),
    )
    .parse(input)
}
