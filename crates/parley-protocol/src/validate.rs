//! Field rules for outbound messages.
//!
//! | Field | Allowed bytes | Length |
//! |---|---|---|
//! | username | `A-Z a-z 0-9 -` | 1–20 |
//! | secret | `A-Z a-z 0-9 -` | 1–128 |
//! | display name | printable ASCII `0x21–0x7E` | 1–20 |
//! | channel id | printable ASCII `0x21–0x7E` | 1+ |
//! | content | printable ASCII `0x20–0x7E`, no leading space | 1+ |
//!
//! None of the allowed sets contain CR, LF or NUL, so a validated field
//! can never break the framing of either wire format.

pub const USERNAME_MAX: usize = 20;
pub const SECRET_MAX: usize = 128;
pub const DISPLAY_NAME_MAX: usize = 20;

/// A field failed its rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

fn is_id_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

fn is_visible(b: u8) -> bool {
    (0x21..=0x7E).contains(&b)
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

fn check(
    field: &'static str,
    value: &str,
    max: Option<usize>,
    allowed: fn(u8) -> bool,
    reason: &'static str,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if let Some(max) = max {
        if value.len() > max {
            return Err(ValidationError::new(field, "too long"));
        }
    }
    if !value.bytes().all(allowed) {
        return Err(ValidationError::new(field, reason));
    }
    Ok(())
}

pub fn username(value: &str) -> Result<(), ValidationError> {
    check(
        "username",
        value,
        Some(USERNAME_MAX),
        is_id_char,
        "only letters, digits and '-' are allowed",
    )
}

pub fn secret(value: &str) -> Result<(), ValidationError> {
    check(
        "secret",
        value,
        Some(SECRET_MAX),
        is_id_char,
        "only letters, digits and '-' are allowed",
    )
}

pub fn display_name(value: &str) -> Result<(), ValidationError> {
    check(
        "display name",
        value,
        Some(DISPLAY_NAME_MAX),
        is_visible,
        "only visible ASCII characters are allowed",
    )
}

pub fn channel_id(value: &str) -> Result<(), ValidationError> {
    check(
        "channel id",
        value,
        None,
        is_visible,
        "only visible ASCII characters are allowed",
    )
}

/// Text decoders drop the whitespace between `IS` and the content, so
/// content may not begin with a space. This also rules out blank content.
pub fn content(value: &str) -> Result<(), ValidationError> {
    check(
        "message",
        value,
        None,
        is_printable,
        "only printable ASCII characters are allowed",
    )?;
    if value.starts_with(' ') {
        return Err(ValidationError::new("message", "must not start with a space"));
    }
    Ok(())
}
