use crate::error::{ChargeCtlError, Result};
use tracing::Level;

const LEVELS: [(Level, &str); 5] = [
    (Level::TRACE, "TRACE"),
    (Level::DEBUG, "DEBUG"),
    (Level::INFO, "INFO"),
    (Level::WARN, "WARN"),
    (Level::ERROR, "ERROR"),
];

/// Parse a configured level name (case-insensitive, `WARNING` accepted)
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.trim().to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(ChargeCtlError::config(format!(
            "Invalid log level: {}",
            level_str
        ))),
    }
}

/// Severity rank, TRACE lowest
pub(crate) fn level_rank(level: Level) -> u8 {
    LEVELS
        .iter()
        .position(|(l, _)| *l == level)
        .map_or(0, |i| i as u8)
}

/// The more verbose of two levels
pub(crate) fn min_level(a: Level, b: Level) -> Level {
    if level_rank(a) <= level_rank(b) { a } else { b }
}

/// Recover the level of a formatted line, JSON or plain
pub fn parse_line_level(line: &str) -> Option<Level> {
    let line = strip_ansi_codes(line);
    LEVELS
        .iter()
        .find(|(_, name)| line.contains(&format!("\"level\":\"{}\"", name)))
        .or_else(|| {
            LEVELS
                .iter()
                .find(|(_, name)| line.contains(&format!(" {} ", name)))
        })
        .map(|(level, _)| *level)
}

fn strip_ansi_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        // CSI sequence: ESC '[' params final-byte
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

/// Parse and apply a runtime web stream level
pub fn set_web_log_level_str(level_str: &str) -> Result<()> {
    let lvl = parse_log_level(level_str)?;
    super::state::set_web_log_level(lvl);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("Warning").unwrap(), Level::WARN);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_parse_line_level() {
        assert_eq!(
            parse_line_level("{\"level\":\"WARN\",\"fields\":{}}"),
            Some(Level::WARN)
        );
        assert_eq!(
            parse_line_level("2026-01-01T00:00:00Z \u{1b}[32m INFO \u{1b}[0m started"),
            Some(Level::INFO)
        );
        assert_eq!(parse_line_level("nothing"), None);
    }

    #[test]
    fn test_min_level_prefers_verbose() {
        assert_eq!(min_level(Level::INFO, Level::DEBUG), Level::DEBUG);
        assert_eq!(min_level(Level::ERROR, Level::WARN), Level::WARN);
    }
}
