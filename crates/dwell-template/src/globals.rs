//! Time and utility globals

use chrono::{DateTime, Datelike, Timelike, Utc};
use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind};
use std::sync::Arc;

/// A point in time as seen from a template
#[derive(Debug, Clone, Copy)]
pub struct DateTimeWrapper(pub DateTime<Utc>);

impl DateTimeWrapper {
    pub fn value(time: DateTime<Utc>) -> Value {
        Value::from_object(Self(time))
    }
}

impl Object for DateTimeWrapper {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "year" => Some(Value::from(self.0.year())),
            "month" => Some(Value::from(self.0.month())),
            "day" => Some(Value::from(self.0.day())),
            "hour" => Some(Value::from(self.0.hour())),
            "minute" => Some(Value::from(self.0.minute())),
            "second" => Some(Value::from(self.0.second())),
            "microsecond" => Some(Value::from(self.0.timestamp_subsec_micros())),
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &minijinja::State,
        name: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match name {
            "timestamp" => Ok(Value::from(timestamp(self.0))),
            "isoformat" => Ok(Value::from(self.0.to_rfc3339())),
            "weekday" => Ok(Value::from(self.0.weekday().num_days_from_monday())),
            "isoweekday" => Ok(Value::from(self.0.weekday().number_from_monday())),
            "strftime" => {
                let format = args.first().and_then(|v| v.as_str()).ok_or_else(|| {
                    Error::new(ErrorKind::InvalidOperation, "strftime requires a format string")
                })?;
                Ok(Value::from(self.0.format(format).to_string()))
            }
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("datetime has no method named {name}"),
            )),
        }
    }

    fn render(self: &Arc<Self>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.f%:z"))
    }
}

fn timestamp(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0
}

/// `as_timestamp(value, default)`
pub fn as_timestamp(value: Value, default: Option<Value>) -> Result<Value, Error> {
    let parsed = if let Some(dt) = value.downcast_object_ref::<DateTimeWrapper>() {
        Some(timestamp(dt.0))
    } else if let Some(s) = value.as_str() {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| timestamp(dt.with_timezone(&Utc)))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map(|dt| timestamp(dt.and_utc()))
                    .ok()
            })
            .or_else(|| s.trim().parse::<f64>().ok())
    } else {
        f64::try_from(value.clone()).ok()
    };

    match (parsed, default) {
        (Some(ts), _) => Ok(Value::from(ts)),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot convert {value} to a timestamp"),
        )),
    }
}

/// `iif(condition, if_true, if_false, if_none)`
pub fn iif(
    condition: Value,
    if_true: Option<Value>,
    if_false: Option<Value>,
    if_none: Option<Value>,
) -> Value {
    if condition.is_none() || condition.is_undefined() {
        if_none.unwrap_or_else(|| if_false.unwrap_or(Value::from(false)))
    } else if condition.is_true() {
        if_true.unwrap_or(Value::from(true))
    } else {
        if_false.unwrap_or(Value::from(false))
    }
}
