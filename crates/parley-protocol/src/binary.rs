//! Binary tagged-message codec used over the datagram transport.
//!
//! All multi-byte integers are **big-endian**. Text fields are
//! NUL-terminated.
//!
//! ```text
//!  0x00 CONFIRM  | op | ref_id (2) |
//!  0x01 REPLY    | op | id (2) | result (1) | ref_id (2) | content \0 |
//!  0x02 AUTH     | op | id (2) | username \0 | display_name \0 | secret \0 |
//!  0x03 JOIN     | op | id (2) | channel_id \0 | display_name \0 |
//!  0x04 MSG      | op | id (2) | display_name \0 | content \0 |
//!  0xFE ERR      | op | id (2) | display_name \0 | content \0 |
//!  0xFF BYE      | op | id (2) |
//! ```

use crate::{Codec, DecodeError, Envelope, MessageId, ProtocolError, ProtocolMessage};

/// Opcode constants for the first byte of every datagram.
pub mod opcode {
    pub const CONFIRM: u8 = 0x00;
    pub const REPLY: u8 = 0x01;
    pub const AUTH: u8 = 0x02;
    pub const JOIN: u8 = 0x03;
    pub const MSG: u8 = 0x04;
    pub const ERR: u8 = 0xFE;
    pub const BYE: u8 = 0xFF;
}

/// Opcode plus message id.
pub const HEADER_LEN: usize = 3;

/// A [`Codec`] for the binary datagram format.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let message = &envelope.message;
        // Everything but CONFIRM carries its own id in the header.
        let own_id = || envelope.id.ok_or(ProtocolError::MissingId(message.kind()));
        let mut writer = Writer::default();

        match message {
            ProtocolMessage::Confirm { ref_id } => writer.header(opcode::CONFIRM, *ref_id),
            ProtocolMessage::Reply {
                ok,
                ref_id,
                content,
            } => {
                let id = own_id()?;
                let ref_id = ref_id.ok_or(ProtocolError::MissingId("REPLY reference"))?;
                writer.header(opcode::REPLY, id);
                writer.byte(u8::from(*ok));
                writer.id(ref_id);
                writer.text("content", content)?;
            }
            ProtocolMessage::Auth {
                username,
                secret,
                display_name,
            } => {
                writer.header(opcode::AUTH, own_id()?);
                writer.text("username", username)?;
                writer.text("display name", display_name)?;
                writer.text("secret", secret)?;
            }
            ProtocolMessage::Join {
                channel_id,
                display_name,
            } => {
                writer.header(opcode::JOIN, own_id()?);
                writer.text("channel id", channel_id)?;
                writer.text("display name", display_name)?;
            }
            ProtocolMessage::Msg {
                display_name,
                content,
            } => {
                writer.header(opcode::MSG, own_id()?);
                writer.text("display name", display_name)?;
                writer.text("content", content)?;
            }
            ProtocolMessage::Err {
                display_name,
                content,
            } => {
                writer.header(opcode::ERR, own_id()?);
                writer.text("display name", display_name)?;
                writer.text("content", content)?;
            }
            ProtocolMessage::Bye => writer.header(opcode::BYE, own_id()?),
        }

        Ok(writer.finish())
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, DecodeError> {
        let mut cursor = Cursor::new(data);
        let op = cursor.byte()?;

        if op == opcode::CONFIRM {
            let ref_id = cursor.id()?;
            return Ok(Envelope::bare(ProtocolMessage::Confirm { ref_id }));
        }

        if !matches!(
            op,
            opcode::REPLY | opcode::AUTH | opcode::JOIN | opcode::MSG | opcode::ERR | opcode::BYE
        ) {
            return Err(DecodeError::UnknownOpcode(op));
        }

        let id = cursor.id()?;
        let message = match op {
            opcode::REPLY => {
                let ok = match cursor.byte()? {
                    0 => false,
                    1 => true,
                    other => return Err(DecodeError::InvalidResult(other)),
                };
                let ref_id = cursor.id()?;
                ProtocolMessage::Reply {
                    ok,
                    ref_id: Some(ref_id),
                    content: cursor.text()?,
                }
            }
            opcode::AUTH => ProtocolMessage::Auth {
                username: cursor.text()?,
                display_name: cursor.text()?,
                secret: cursor.text()?,
            },
            opcode::JOIN => ProtocolMessage::Join {
                channel_id: cursor.text()?,
                display_name: cursor.text()?,
            },
            opcode::MSG => ProtocolMessage::Msg {
                display_name: cursor.text()?,
                content: cursor.text()?,
            },
            opcode::ERR => ProtocolMessage::Err {
                display_name: cursor.text()?,
                content: cursor.text()?,
            },
            _ => ProtocolMessage::Bye,
        };

        Ok(Envelope::new(id, message))
    }
}

// ---------------------------------------------------------------------------
// Writer / Cursor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn header(&mut self, op: u8, id: MessageId) {
        self.buf.push(op);
        self.id(id);
    }

    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn id(&mut self, id: MessageId) {
        self.buf.extend_from_slice(&id.to_be_bytes());
    }

    fn text(&mut self, field: &'static str, value: &str) -> Result<(), ProtocolError> {
        if value.as_bytes().contains(&0) {
            return Err(ProtocolError::Delimiter { field });
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads fields front to back, failing with [`DecodeError::Truncated`] as
/// soon as the input runs out.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn id(&mut self) -> Result<MessageId, DecodeError> {
        let bytes = self.take(2)?;
        Ok(MessageId::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads up to the next NUL and steps past it.
    fn text(&mut self) -> Result<String, DecodeError> {
        let rest = &self.buf[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::Truncated)?;
        let field = &rest[..len];
        self.pos += len + 1;
        String::from_utf8(field.to_vec()).map_err(|_| DecodeError::InvalidText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(id: u16, message: ProtocolMessage) -> Vec<u8> {
        BinaryCodec
            .encode(&Envelope::new(MessageId(id), message))
            .unwrap()
    }

    #[test]
    fn test_auth_layout() {
        let bytes = encode(
            0x0102,
            ProtocolMessage::Auth {
                username: "bob".into(),
                secret: "pw".into(),
                display_name: "Bob".into(),
            },
        );
        assert_eq!(bytes, b"\x02\x01\x02bob\0Bob\0pw\0");
    }

    #[test]
    fn test_confirm_layout_is_opcode_and_ref() {
        let bytes = BinaryCodec
            .encode(&Envelope::bare(ProtocolMessage::Confirm {
                ref_id: MessageId(0xBEEF),
            }))
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0xBE, 0xEF]);
    }

    #[test]
    fn test_confirm_header_carries_ref_not_envelope_id() {
        let confirm = ProtocolMessage::Confirm {
            ref_id: MessageId(7),
        };
        assert_eq!(encode(9, confirm), vec![0x00, 0x00, 0x07]);
    }

    #[test]
    fn test_bye_and_msg_layout() {
        assert_eq!(encode(5, ProtocolMessage::Bye), vec![0xFF, 0x00, 0x05]);
        assert_eq!(
            encode(
                1,
                ProtocolMessage::Msg {
                    display_name: "A".into(),
                    content: "hi".into(),
                }
            ),
            b"\x04\x00\x01A\0hi\0"
        );
    }

    #[test]
    fn test_decode_reply() {
        let env = BinaryCodec
            .decode(b"\x01\x00\x07\x01\x00\x02welcome\0")
            .unwrap();
        assert_eq!(env.id, Some(MessageId(7)));
        assert_eq!(
            env.message,
            ProtocolMessage::Reply {
                ok: true,
                ref_id: Some(MessageId(2)),
                content: "welcome".into(),
            }
        );
    }

    #[test]
    fn test_decode_confirm() {
        let env = BinaryCodec.decode(&[0x00, 0x00, 0x05]).unwrap();
        assert_eq!(env.id, None);
        assert_eq!(
            env.message,
            ProtocolMessage::Confirm {
                ref_id: MessageId(5)
            }
        );
    }

    #[test]
    fn test_decode_missing_nul_is_truncated() {
        assert_eq!(
            BinaryCodec.decode(b"\x04\x00\x01Carol\0hi"),
            Err(DecodeError::Truncated)
        );
        assert_eq!(
            BinaryCodec.decode(b"\x04\x00\x01Carol"),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_decode_short_header_is_truncated() {
        assert_eq!(BinaryCodec.decode(&[]), Err(DecodeError::Truncated));
        assert_eq!(BinaryCodec.decode(&[0xFF, 0x00]), Err(DecodeError::Truncated));
        assert_eq!(BinaryCodec.decode(&[0x00]), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        assert_eq!(
            BinaryCodec.decode(&[0x42, 0x00, 0x01]),
            Err(DecodeError::UnknownOpcode(0x42))
        );
    }

    #[test]
    fn test_decode_bad_reply_result() {
        assert_eq!(
            BinaryCodec.decode(b"\x01\x00\x01\x02\x00\x00x\0"),
            Err(DecodeError::InvalidResult(2))
        );
    }

    #[test]
    fn test_encode_requires_id() {
        let err = BinaryCodec
            .encode(&Envelope::bare(ProtocolMessage::Bye))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingId("BYE")));
    }

    #[test]
    fn test_encode_rejects_embedded_nul() {
        let err = BinaryCodec
            .encode(&Envelope::new(
                MessageId(1),
                ProtocolMessage::Msg {
                    display_name: "Bob".into(),
                    content: "a\0b".into(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Delimiter { field: "content" }));
    }

    #[test]
    fn test_every_binary_message_round_trips() {
        let messages = [
            ProtocolMessage::Auth {
                username: "user-1".into(),
                secret: "abc-DEF-123".into(),
                display_name: "B!g_Bob".into(),
            },
            ProtocolMessage::Join {
                channel_id: "general".into(),
                display_name: "Bob".into(),
            },
            ProtocolMessage::Msg {
                display_name: "Bob".into(),
                content: "hello world".into(),
            },
            ProtocolMessage::Err {
                display_name: "Bob".into(),
                content: "bad".into(),
            },
            ProtocolMessage::Reply {
                ok: false,
                ref_id: Some(MessageId(65535)),
                content: "no".into(),
            },
            ProtocolMessage::Bye,
        ];
        for (n, msg) in messages.into_iter().enumerate() {
            let env = Envelope::new(MessageId(n as u16 * 1000), msg);
            let bytes = BinaryCodec.encode(&env).unwrap();
            assert_eq!(BinaryCodec.decode(&bytes).unwrap(), env);
        }
    }
}
