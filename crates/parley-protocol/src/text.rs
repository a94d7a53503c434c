//! Line-oriented text codec used over the reliable stream transport.
//!
//! ```text
//! AUTH <username> AS <displayName> USING <secret>\r\n
//! JOIN <channelId> AS <displayName>\r\n
//! ERR FROM <displayName> IS <content>\r\n
//! MSG FROM <displayName> IS <content>\r\n
//! REPLY OK|NOK IS <content>\r\n
//! BYE\r\n
//! ```
//!
//! Keywords are matched exactly. Everything after the keyword prefix of
//! `ERR`, `MSG` and `REPLY` is the content, taken verbatim.

use crate::{Codec, DecodeError, Envelope, ProtocolError, ProtocolMessage};

/// Line terminator appended to every encoded message.
pub const CRLF: &str = "\r\n";

/// A [`Codec`] for the CRLF-terminated text grammar.
///
/// The text wire carries no message ids: encoding ignores
/// [`Envelope::id`] and decoding always yields `id: None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let line = match &envelope.message {
            ProtocolMessage::Auth {
                username,
                secret,
                display_name,
            } => {
                token("username", username)?;
                token("display name", display_name)?;
                token("secret", secret)?;
                format!("AUTH {username} AS {display_name} USING {secret}")
            }
            ProtocolMessage::Join {
                channel_id,
                display_name,
            } => {
                token("channel id", channel_id)?;
                token("display name", display_name)?;
                format!("JOIN {channel_id} AS {display_name}")
            }
            ProtocolMessage::Msg {
                display_name,
                content,
            } => {
                token("display name", display_name)?;
                line_text("content", content)?;
                format!("MSG FROM {display_name} IS {content}")
            }
            ProtocolMessage::Err {
                display_name,
                content,
            } => {
                token("display name", display_name)?;
                line_text("content", content)?;
                format!("ERR FROM {display_name} IS {content}")
            }
            ProtocolMessage::Reply { ok, content, .. } => {
                line_text("content", content)?;
                let result = if *ok { "OK" } else { "NOK" };
                format!("REPLY {result} IS {content}")
            }
            ProtocolMessage::Bye => "BYE".to_string(),
            ProtocolMessage::Confirm { .. } => {
                return Err(ProtocolError::Unsupported("CONFIRM"));
            }
        };

        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(CRLF.as_bytes());
        Ok(bytes)
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, DecodeError> {
        let data = data.strip_suffix(b"\n").unwrap_or(data);
        let data = data.strip_suffix(b"\r").unwrap_or(data);
        let line = std::str::from_utf8(data).map_err(|_| DecodeError::InvalidText)?;

        parse_line(line)
            .map(Envelope::bare)
            .ok_or_else(|| DecodeError::Unrecognized(line.to_string()))
    }
}

/// Single-word fields must not contain whitespace, or the grammar's word
/// splitting would misplace them on decode.
fn token(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(ProtocolError::Delimiter { field });
    }
    Ok(())
}

/// Content runs to the end of the line. The decoder swallows the whitespace
/// run after `IS`, so leading whitespace (and blank content) would not
/// survive a round trip.
fn line_text(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(ProtocolError::Delimiter { field });
    }
    if value.bytes().next().is_none_or(|b| b.is_ascii_whitespace()) {
        return Err(ProtocolError::LeadingWhitespace { field });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Splits off the next whitespace-delimited word.
///
/// Returns the word and the remainder, which still starts with the
/// whitespace run that ended the word (if any).
fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return None;
    }
    let end = s
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(s.len());
    Some(s.split_at(end))
}

fn expect_word<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let (word, rest) = next_word(s)?;
    (word == keyword).then_some(rest)
}

fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_whitespace())
}

/// The content after the keyword prefix: the separating whitespace run is
/// dropped, the rest is kept as-is.
fn content(rest: &str) -> Option<String> {
    let content = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    (!content.is_empty()).then(|| content.to_string())
}

fn parse_line(line: &str) -> Option<ProtocolMessage> {
    let (keyword, rest) = next_word(line)?;
    match keyword {
        "AUTH" => {
            let (username, rest) = next_word(rest)?;
            let rest = expect_word(rest, "AS")?;
            let (display_name, rest) = next_word(rest)?;
            let rest = expect_word(rest, "USING")?;
            let (secret, rest) = next_word(rest)?;
            is_blank(rest).then(|| ProtocolMessage::Auth {
                username: username.to_string(),
                secret: secret.to_string(),
                display_name: display_name.to_string(),
            })
        }
        "JOIN" => {
            let (channel_id, rest) = next_word(rest)?;
            let rest = expect_word(rest, "AS")?;
            let (display_name, rest) = next_word(rest)?;
            is_blank(rest).then(|| ProtocolMessage::Join {
                channel_id: channel_id.to_string(),
                display_name: display_name.to_string(),
            })
        }
        "MSG" | "ERR" => {
            let rest = expect_word(rest, "FROM")?;
            let (display_name, rest) = next_word(rest)?;
            let rest = expect_word(rest, "IS")?;
            let content = content(rest)?;
            let display_name = display_name.to_string();
            Some(if keyword == "MSG" {
                ProtocolMessage::Msg {
                    display_name,
                    content,
                }
            } else {
                ProtocolMessage::Err {
                    display_name,
                    content,
                }
            })
        }
        "REPLY" => {
            let (result, rest) = next_word(rest)?;
            let ok = match result {
                "OK" => true,
                "NOK" => false,
                _ => return None,
            };
            let rest = expect_word(rest, "IS")?;
            Some(ProtocolMessage::Reply {
                ok,
                ref_id: None,
                content: content(rest)?,
            })
        }
        "BYE" => is_blank(rest).then_some(ProtocolMessage::Bye),
        _ => None,
    }
}
