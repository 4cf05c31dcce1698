//! Route and query-string parameter binding.
//!
//! Every placeholder in an action's route and query templates is bound, in
//! [`ActionUrl`](crate::ActionUrl) order, to the matching raw value of the
//! request and converted to the declared [`ParamType`]. Conversion never
//! validates: an unparsable number becomes `NaN`, an unparsable date
//! becomes `None`, and a value the request did not supply converts as the
//! empty string.
//!
//! Numbers are read from the longest leading decimal literal, so `"12px"`
//! is `12` and `"1e3kg"` is `1000`. Only the spelling `Infinity` is infinite;
//! `inf`, `nan` and hex literals are `NaN`.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::metadata::{ActionType, ParameterSource};
use crate::request::Request;

/// The declared type of an action parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamType {
    Number,
    Boolean,
    Date,
    Text,
    /// Any other type, named for diagnostics. Cannot be bound from a route
    /// or query string.
    Other(&'static str),
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Text => "String",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bound argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Boolean(bool),
    /// `None` when the raw value was not a recognisable date.
    Date(Option<DateTime<Utc>>),
    Text(String),
    /// The parsed request body of a `from_body` action.
    Body(serde_json::Value),
}

/// The positional arguments an action is invoked with.
///
/// For a `from_body` action, index 0 is the body and route/query values
/// follow; otherwise route/query values start at 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionArgs {
    values: Vec<ParamValue>,
}

impl ActionArgs {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn get(&self, index: usize) -> Option<&ParamValue> { self.values.get(index) }
    pub fn values(&self) -> &[ParamValue] { &self.values }

    pub fn number(&self, index: usize) -> Result<f64, Error> {
        match self.values.get(index) {
            Some(ParamValue::Number(n)) => Ok(*n),
            _ => Err(Error::ArgumentMismatch { index, expected: "Number" }),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, Error> {
        match self.values.get(index) {
            Some(ParamValue::Boolean(b)) => Ok(*b),
            _ => Err(Error::ArgumentMismatch { index, expected: "Boolean" }),
        }
    }

    pub fn date(&self, index: usize) -> Result<Option<DateTime<Utc>>, Error> {
        match self.values.get(index) {
            Some(ParamValue::Date(d)) => Ok(*d),
            _ => Err(Error::ArgumentMismatch { index, expected: "Date" }),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str, Error> {
        match self.values.get(index) {
            Some(ParamValue::Text(s)) => Ok(s),
            _ => Err(Error::ArgumentMismatch { index, expected: "String" }),
        }
    }

    /// Deserialises the body argument into `T`.
    pub fn body<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        match self.values.get(index) {
            Some(ParamValue::Body(value)) => serde_json::from_value(value.clone()).map_err(Error::InvalidBody),
            _ => Err(Error::ArgumentMismatch { index, expected: "body" }),
        }
    }
}

/// Produces the arguments for `action` from `request`.
pub(crate) fn bind_arguments(action: &ActionType, request: &Request) -> Result<ActionArgs, Error> {
    let mut values = Vec::with_capacity(action.url().parameters().len() + 1);

    if action.descriptor().is_from_body() {
        values.push(ParamValue::Body(parse_body(request.body())?));
    }

    for parameter in action.url().parameters() {
        let raw = match parameter.source() {
            ParameterSource::Segment => request.param(parameter.name()),
            ParameterSource::QueryStringVariable => request.query(parameter.name()),
        };
        values.push(convert(parameter.name(), parameter.data_type(), raw.unwrap_or(""))?);
    }

    Ok(ActionArgs::new(values))
}

fn parse_body(body: &[u8]) -> Result<serde_json::Value, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(Error::InvalidBody)
}

/// Converts one raw value according to its declared type.
pub fn convert(name: &str, data_type: ParamType, raw: &str) -> Result<ParamValue, Error> {
    match data_type {
        ParamType::Number => Ok(ParamValue::Number(parse_number(raw))),
        ParamType::Boolean => Ok(ParamValue::Boolean(parse_bool(raw))),
        ParamType::Date => Ok(ParamValue::Date(parse_date(raw))),
        ParamType::Text => Ok(ParamValue::Text(raw.to_owned())),
        ParamType::Other(type_name) => Err(Error::UnsupportedParameterType {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
        }),
    }
}

fn parse_bool(raw: &str) -> bool {
    ["true", "yes", "1"].iter().any(|t| raw.eq_ignore_ascii_case(t))
}

/// `[+-]` then `Infinity`, or digits with an optional fraction and exponent.
/// Trailing garbage is ignored; no literal at all is `NaN`.
fn parse_number(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int = digits(end);
    end += int;
    let mut frac = 0;
    if bytes.get(end) == Some(&b'.') {
        frac = digits(end + 1);
        if int > 0 || frac > 0 {
            end += 1 + frac;
        }
    }
    if int == 0 && frac == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let n = digits(exp);
        if n > 0 {
            end = exp + n;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// RFC 3339, RFC 2822, `YYYY-MM-DD[( |T)HH:MM:SS]` (UTC), or `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn boolean_accepts_true_yes_one_in_any_case() {
        for raw in ["true", "TRUE", "yes", "YES", "1", "True"] {
            assert_eq!(convert("b", ParamType::Boolean, raw).unwrap(), ParamValue::Boolean(true), "{raw}");
        }
        for raw in ["false", "no", "0", "", "on", "2"] {
            assert_eq!(convert("b", ParamType::Boolean, raw).unwrap(), ParamValue::Boolean(false), "{raw}");
        }
    }

    #[test]
    fn number_parses_float_or_nan() {
        assert_eq!(convert("n", ParamType::Number, "42.5").unwrap(), ParamValue::Number(42.5));
        assert_eq!(convert("n", ParamType::Number, "-3").unwrap(), ParamValue::Number(-3.0));
        match convert("n", ParamType::Number, "abc").unwrap() {
            ParamValue::Number(n) => assert!(n.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn number_reads_the_leading_literal() {
        assert_eq!(parse_number("12px"), 12.0);
        assert_eq!(parse_number("  -.5rem"), -0.5);
        assert_eq!(parse_number("1e3kg"), 1000.0);
        assert_eq!(parse_number("2e"), 2.0);
        assert_eq!(parse_number("7."), 7.0);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        for raw in ["inf", "nan", "NaN", ".", "-", "", "e5", "px12"] {
            assert!(parse_number(raw).is_nan(), "{raw}");
        }
    }

    #[test]
    fn date_formats() {
        let Ok(ParamValue::Date(Some(dt))) = convert("d", ParamType::Date, "2020-02-29T10:30:00Z") else {
            panic!("rfc3339 not parsed");
        };
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2020, 2, 29, 10));

        let Ok(ParamValue::Date(Some(dt))) = convert("d", ParamType::Date, "2021-07-04") else {
            panic!("date-only not parsed");
        };
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 7, 4));

        assert_eq!(convert("d", ParamType::Date, "not a date").unwrap(), ParamValue::Date(None));
    }

    #[test]
    fn text_passes_through() {
        assert_eq!(convert("s", ParamType::Text, "a b").unwrap(), ParamValue::Text("a b".into()));
    }

    #[test]
    fn other_types_are_rejected_with_name_and_type() {
        let err = convert("param", ParamType::Other("Object"), "x").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedParameterType { ref name, ref type_name } if name == "param" && type_name == "Object"
        ));
    }

    #[test]
    fn typed_accessors_check_the_variant() {
        let args = ActionArgs::new(vec![ParamValue::Number(1.0), ParamValue::Text("x".into())]);
        assert_eq!(args.number(0).unwrap(), 1.0);
        assert_eq!(args.text(1).unwrap(), "x");
        assert!(matches!(args.boolean(0), Err(Error::ArgumentMismatch { index: 0, .. })));
        assert!(args.text(5).is_err());
    }

    #[test]
    fn empty_body_parses_as_null() {
        assert_eq!(parse_body(b"  ").unwrap(), serde_json::Value::Null);
        assert!(matches!(parse_body(b"{oops"), Err(Error::InvalidBody(_))));
    }
}
