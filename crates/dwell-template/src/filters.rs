//! Lenient filters and tests used by predicate and duration templates

use minijinja::value::{Kwargs, Value};
use minijinja::{Error, ErrorKind};
use regex::Regex;

fn value_to_f64(value: &Value) -> Option<f64> {
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

fn parse_number(value: &Value) -> Option<f64> {
    value_to_f64(value).or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
}

fn is_missing(value: &Value) -> bool {
    value.is_undefined() || value.is_none() || value.as_str() == Some("")
}

/// `| float(default)`
///
/// Missing values fall back to the default (or 0.0). Unparseable values
/// without a default are a render error.
pub fn to_float(value: Value, default: Option<Value>) -> Result<Value, Error> {
    let fallback = || default.as_ref().and_then(value_to_f64);

    if is_missing(&value) {
        return Ok(Value::from(fallback().unwrap_or(0.0)));
    }

    match parse_number(&value).or_else(fallback) {
        Some(f) => Ok(Value::from(f)),
        None => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot convert {value} to float"),
        )),
    }
}

/// `| int(default)`
pub fn to_int(value: Value, default: Option<Value>) -> Result<Value, Error> {
    let fallback = || {
        default
            .as_ref()
            .and_then(|d| d.as_i64().or_else(|| value_to_f64(d).map(|f| f as i64)))
    };

    if is_missing(&value) {
        return Ok(Value::from(fallback().unwrap_or(0)));
    }

    let parsed = value.as_i64().or_else(|| match value.as_str() {
        Some(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        None => value_to_f64(&value).map(|f| f as i64),
    });

    match parsed.or_else(fallback) {
        Some(i) => Ok(Value::from(i)),
        None => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot convert {value} to int"),
        )),
    }
}

/// `| bool(default)`
pub fn to_bool(value: Value, default: Option<bool>) -> bool {
    if value.is_undefined() || value.is_none() {
        return default.unwrap_or(false);
    }

    if let Ok(b) = bool::try_from(value.clone()) {
        return b;
    }

    if let Some(s) = value.as_str() {
        return matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "on" | "1" | "enable" | "enabled"
        );
    }

    match value_to_f64(&value) {
        Some(f) => f != 0.0,
        None => value.is_true(),
    }
}

/// `| round(precision, method='common')`
pub fn round_filter(value: f64, precision: Option<i32>, kwargs: Kwargs) -> Result<f64, Error> {
    let method: Option<String> = kwargs.get("method")?;
    kwargs.assert_all_used()?;

    let multiplier = 10_f64.powi(precision.unwrap_or(0));
    let scaled = value * multiplier;

    let rounded = match method.as_deref().unwrap_or("common") {
        "ceil" => scaled.ceil(),
        "floor" => scaled.floor(),
        "half" => (scaled * 2.0).round() / 2.0,
        "common" => scaled.round(),
        other => {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("unknown rounding method: {other}"),
            ))
        }
    };

    Ok(rounded / multiplier)
}

/// `| regex_match(pattern)`, anchored at the start like Python's re.match
pub fn regex_match(value: &str, pattern: &str) -> Result<bool, Error> {
    let re = Regex::new(&format!("^(?:{pattern})"))
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid regex: {e}")))?;
    Ok(re.is_match(value))
}

/// `| regex_search(pattern)`
pub fn regex_search(value: &str, pattern: &str) -> Result<bool, Error> {
    let re = Regex::new(pattern)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid regex: {e}")))?;
    Ok(re.is_match(value))
}

/// `is number` test, true for numeric strings as well
pub fn is_number(value: Value) -> bool {
    parse_number(&value).is_some()
}
