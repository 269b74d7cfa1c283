//! `entity_id state` lines read from stdin

use dwell_core::{EntityId, EntityIdError};

#[derive(Debug, Clone, PartialEq)]
pub struct StateLine {
    pub entity_id: EntityId,
    pub state: String,
}

/// Parse one input line
///
/// Blank lines and `#` comments yield `None`. Everything after the first
/// run of whitespace is the state, so states may contain spaces.
pub fn parse_line(line: &str) -> Option<Result<StateLine, EntityIdError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (entity_id, state) = match line.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim()),
        None => (line, ""),
    };

    Some(entity_id.parse().map(|entity_id| StateLine {
        entity_id,
        state: state.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let line = parse_line("binary_sensor.door on").unwrap().unwrap();
        assert_eq!(line.entity_id.to_string(), "binary_sensor.door");
        assert_eq!(line.state, "on");
    }

    #[test]
    fn test_state_with_spaces() {
        let line = parse_line("  sensor.weather   partly cloudy ").unwrap().unwrap();
        assert_eq!(line.state, "partly cloudy");
    }

    #[test]
    fn test_missing_state_is_empty() {
        let line = parse_line("sensor.weather").unwrap().unwrap();
        assert_eq!(line.state, "");
    }

    #[test]
    fn test_skipped_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# comment").is_none());
    }

    #[test]
    fn test_invalid_entity_id() {
        assert!(parse_line("not_an_entity on").unwrap().is_err());
    }
}
