//! Input validation shared by every write path.
//!
//! Checks here mirror constraints the schema cannot express (length limits,
//! formats) so that handlers can answer 400 before touching the database.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_DESCRIPTION_BYTES: usize = 50 * 1024;
pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref HEX_COLOR: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("invalid slug '{0}'")]
    InvalidSlug(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),
    #[error("{start} must not be after {end}")]
    InvertedRange {
        start: &'static str,
        end: &'static str,
    },
}

/// Trims `value` and checks it is non-empty and within `max` characters.
pub fn required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

pub fn name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    required_text(field, value, MAX_NAME_LEN)
}

pub fn description(value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        Some(text) if text.len() > MAX_DESCRIPTION_BYTES => Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_BYTES,
        }),
        Some(text) if text.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Lowercased, trimmed email.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let normalized = value.trim().to_lowercase();
    if EMAIL.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub fn color(value: &str) -> Result<String, ValidationError> {
    if HEX_COLOR.is_match(value) {
        Ok(value.to_lowercase())
    } else {
        Err(ValidationError::InvalidColor(value.to_string()))
    }
}

pub fn optional_color(value: Option<String>) -> Result<Option<String>, ValidationError> {
    value.map(|c| color(&c)).transpose()
}

pub fn slug(value: &str) -> Result<String, ValidationError> {
    if utils::slug::is_valid_slug(value) {
        Ok(value.to_string())
    } else {
        Err(ValidationError::InvalidSlug(value.to_string()))
    }
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        Err(ValidationError::WeakPassword)
    } else {
        Ok(())
    }
}

/// `null` becomes `{}`; anything else but an object is rejected.
pub fn json_object(
    field: &'static str,
    value: serde_json::Value,
) -> Result<serde_json::Value, ValidationError> {
    match value {
        serde_json::Value::Null => Ok(serde_json::Value::Object(serde_json::Map::new())),
        serde_json::Value::Object(_) => Ok(value),
        _ => Err(ValidationError::NotAnObject(field)),
    }
}

pub fn date_range<T: PartialOrd>(
    start_field: &'static str,
    start: Option<&T>,
    end_field: &'static str,
    end: Option<&T>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(ValidationError::InvertedRange {
            start: start_field,
            end: end_field,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_text_trims_and_limits() {
        assert_eq!(name("name", "  Acme  ").unwrap(), "Acme");
        assert_eq!(name("name", "   "), Err(ValidationError::Empty("name")));
        assert!(matches!(
            required_text("title", &"x".repeat(11), 10),
            Err(ValidationError::TooLong { max: 10, .. })
        ));
    }

    #[test]
    fn test_email_normalizes() {
        assert_eq!(email(" Jane@Example.COM ").unwrap(), "jane@example.com");
        assert!(email("not-an-email").is_err());
        assert!(email("a@b").is_err());
    }

    #[test]
    fn test_color() {
        assert_eq!(color("#FFAA00").unwrap(), "#ffaa00");
        assert!(color("red").is_err());
        assert_eq!(optional_color(None).unwrap(), None);
    }

    #[test]
    fn test_json_object() {
        assert_eq!(json_object("settings", json!(null)).unwrap(), json!({}));
        assert_eq!(json_object("settings", json!({"a": 1})).unwrap(), json!({"a": 1}));
        assert_eq!(
            json_object("settings", json!([1])),
            Err(ValidationError::NotAnObject("settings"))
        );
    }

    #[test]
    fn test_date_range() {
        assert!(date_range("start", Some(&1), "end", Some(&2)).is_ok());
        assert!(date_range("start", Some(&3), "end", Some(&2)).is_err());
        assert!(date_range::<i32>("start", None, "end", Some(&2)).is_ok());
    }

    #[test]
    fn test_blank_description_becomes_none() {
        assert_eq!(description(Some("  ".into())).unwrap(), None);
        assert_eq!(description(Some("hi".into())).unwrap(), Some("hi".into()));
    }
}
