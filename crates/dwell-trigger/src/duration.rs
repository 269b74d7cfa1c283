//! Dwell duration resolution
//!
//! A `for` value is resolved when the predicate turns true, so templates in
//! it see the state of the world at that moment.

use crate::config::{DurationField, ForSpec, Variables};
use crate::error::DurationError;
use crate::render::{has_template_syntax, value_to_text, Renderer};
use std::time::Duration;

/// Resolve a dwell specification; `None` means fire without waiting
pub fn resolve(
    spec: Option<&ForSpec>,
    renderer: &dyn Renderer,
    variables: &Variables,
) -> Result<Option<Duration>, DurationError> {
    let Some(spec) = spec else {
        return Ok(None);
    };

    let duration = match spec {
        ForSpec::Seconds(secs) => from_seconds(*secs, &secs.to_string())?,
        ForSpec::Text(text) => {
            let text = render_text(renderer, "for", text, variables)?;
            parse_duration(&text)?
        }
        ForSpec::Components(components) => {
            let mut total = 0.0;
            for (unit, field) in components.fields() {
                let value = match field {
                    DurationField::Number(n) => *n,
                    DurationField::Template(t) => {
                        let text = render_text(renderer, unit, t, variables)?;
                        parse_decimal(&text).ok_or(DurationError::Invalid(text))?
                    }
                };
                total += to_seconds(unit, value);
            }
            from_seconds(total, &total.to_string())?
        }
    };

    Ok(Some(duration))
}

/// Check every part of a dwell that needs no rendering
///
/// Literal text must parse and a mapping made only of fixed units must not
/// add up to a negative duration. Templated parts are left for [`resolve`].
pub(crate) fn check_fixed(spec: &ForSpec) -> Result<(), DurationError> {
    match spec {
        ForSpec::Seconds(secs) => from_seconds(*secs, &secs.to_string()).map(drop),
        ForSpec::Text(text) if has_template_syntax(text) => Ok(()),
        ForSpec::Text(text) => parse_duration(text).map(drop),
        ForSpec::Components(components) => {
            let mut total = Some(0.0);
            for (unit, field) in components.fields() {
                let value = match field {
                    DurationField::Number(n) => Some(*n),
                    DurationField::Template(t) if has_template_syntax(t) => None,
                    DurationField::Template(t) => {
                        Some(parse_decimal(t).ok_or_else(|| DurationError::Invalid(t.clone()))?)
                    }
                };
                total = total.zip(value).map(|(sum, v)| sum + to_seconds(unit, v));
            }
            match total {
                Some(total) => from_seconds(total, &total.to_string()).map(drop),
                None => Ok(()),
            }
        }
    }
}

fn render_text(
    renderer: &dyn Renderer,
    field: &'static str,
    text: &str,
    variables: &Variables,
) -> Result<String, DurationError> {
    if !renderer.is_template(text) {
        return Ok(text.to_string());
    }
    renderer
        .render(text, variables)
        .map(|value| value_to_text(&value))
        .map_err(|source| DurationError::Render { field, source })
}

fn to_seconds(unit: &str, value: f64) -> f64 {
    match unit {
        "days" => value * 86_400.0,
        "hours" => value * 3_600.0,
        "minutes" => value * 60.0,
        "milliseconds" => value / 1_000.0,
        _ => value,
    }
}

/// Parse rendered text as a duration
///
/// Accepts seconds (`5`, `2.5`), `H:MM` and `H:MM:SS` with optional
/// fractional seconds. Anything else is an error rather than a guess.
pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(text.to_string());

    let parts: Vec<&str> = text.trim().split(':').collect();
    let seconds = match parts.as_slice() {
        [secs] => parse_decimal(secs).ok_or_else(invalid)?,
        [hours, minutes] => {
            let hours = parse_whole(hours).ok_or_else(invalid)?;
            let minutes = parse_whole(minutes).ok_or_else(invalid)?;
            hours * 3_600.0 + minutes * 60.0
        }
        [hours, minutes, secs] => {
            let hours = parse_whole(hours).ok_or_else(invalid)?;
            let minutes = parse_whole(minutes).ok_or_else(invalid)?;
            let secs = parse_decimal(secs).filter(|s| *s >= 0.0).ok_or_else(invalid)?;
            hours * 3_600.0 + minutes * 60.0 + secs
        }
        _ => return Err(invalid()),
    };

    from_seconds(seconds, text)
}

fn parse_whole(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u64>().ok().map(|v| v as f64)
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn from_seconds(seconds: f64, original: &str) -> Result<Duration, DurationError> {
    if !seconds.is_finite() {
        return Err(DurationError::Invalid(original.to_string()));
    }
    if seconds < 0.0 {
        return Err(DurationError::Negative(original.to_string()));
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| DurationError::OutOfRange(original.to_string()))?;
    chrono::Duration::from_std(duration)
        .map_err(|_| DurationError::OutOfRange(original.to_string()))?;
    Ok(duration)
}
