use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::parser::parse_bytes;
use crate::core::serializer::stringify;
use crate::core::value::Value;
use crate::error::{ProtocolError, Result};

/// Fixed header length: opcode (4) + body length (4).
pub const HEADER_SIZE: usize = 8;

/// Frame opcodes. Values are fixed by the peer and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    /// Raw wire value.
    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Opcodes that may be sent before the session is authorized.
    #[inline]
    pub fn bypasses_authorization(self) -> bool {
        matches!(self, Opcode::Handshake | Opcode::Close)
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Handshake => "HANDSHAKE",
            Opcode::Frame => "FRAME",
            Opcode::Close => "CLOSE",
            Opcode::Ping => "PING",
            Opcode::Pong => "PONG",
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = ProtocolError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// One protocol message: an opcode and its document body.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub opcode: Opcode,
    pub body: Value,
}

impl Packet {
    pub fn new(opcode: Opcode, body: impl Into<Value>) -> Self {
        Self {
            opcode,
            body: body.into(),
        }
    }

    /// A `Close` packet with an empty object body.
    pub fn close() -> Self {
        Self::new(Opcode::Close, Value::object())
    }

    /// Serialize to wire format: `[opcode i32][length i32][body utf-8]`,
    /// integers in native byte order.
    ///
    /// # Errors
    /// `OversizedPacket` if the serialized body does not fit the length field
    /// or exceeds the payload limit.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = stringify(&self.body);
        let len = encode_length(body.len())?;

        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.extend_from_slice(&self.opcode.as_i32().to_ne_bytes());
        out.extend_from_slice(&len.to_ne_bytes());
        out.extend_from_slice(body.as_bytes());
        Ok(out)
    }

    /// Deserialize a complete frame from bytes.
    ///
    /// Bytes past the announced body length are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::InvalidHeader);
        }

        let (raw_opcode, len) = decode_header(&data[..HEADER_SIZE])?;

        let end = HEADER_SIZE + len;
        if data.len() < end {
            return Err(ProtocolError::InvalidHeader);
        }

        let opcode = Opcode::try_from(raw_opcode)?;
        let body = parse_bytes(&data[HEADER_SIZE..end])?;

        Ok(Self { opcode, body })
    }
}

/// Validate a body length against the wire field and the payload limit.
pub fn encode_length(len: usize) -> Result<i32> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedPacket(len));
    }
    i32::try_from(len).map_err(|_| ProtocolError::OversizedPacket(len))
}

/// Read a raw opcode from its 4 header bytes.
pub fn decode_opcode(bytes: &[u8]) -> Result<i32> {
    let raw: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::InvalidHeader)?;
    Ok(i32::from_ne_bytes(raw))
}

/// Read and validate a body length from its 4 header bytes.
pub fn decode_length(bytes: &[u8]) -> Result<usize> {
    let raw = decode_opcode(bytes)?;
    let len = usize::try_from(raw).map_err(|_| ProtocolError::OversizedPacket(raw as u32 as usize))?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedPacket(len));
    }
    Ok(len)
}

/// Split an 8-byte header into (raw opcode, body length).
pub fn decode_header(header: &[u8]) -> Result<(i32, usize)> {
    if header.len() < HEADER_SIZE {
        return Err(ProtocolError::InvalidHeader);
    }
    Ok((decode_opcode(&header[..4])?, decode_length(&header[4..8])?))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_empty_object_frame_layout() {
        let bytes = Packet::new(Opcode::Frame, Value::object()).to_bytes().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_ne_bytes());
        expected.extend_from_slice(&2i32.to_ne_bytes());
        expected.extend_from_slice(b"{}");

        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes, expected);

        if cfg!(target_endian = "little") {
            assert_eq!(bytes, [0x01, 0, 0, 0, 0x02, 0, 0, 0, 0x7B, 0x7D]);
        }

        let decoded = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.opcode, Opcode::Frame);
        assert_eq!(decoded.body, Value::object());
    }

    #[test]
    fn test_length_counts_utf8_bytes() {
        let bytes = Packet::new(Opcode::Frame, "é").to_bytes().unwrap();
        // "é" serializes to `"é"`: two quotes plus a two-byte code point.
        assert_eq!(decode_length(&bytes[4..8]).unwrap(), 4);
        assert_eq!(bytes.len(), HEADER_SIZE + 4);
    }

    #[test]
    fn test_opcode_mapping() {
        for raw in 0..=4 {
            assert_eq!(Opcode::try_from(raw).unwrap().as_i32(), raw);
        }
        assert!(matches!(Opcode::try_from(5), Err(ProtocolError::UnknownOpcode(5))));
        assert!(matches!(Opcode::try_from(-1), Err(ProtocolError::UnknownOpcode(-1))));
        assert!(Opcode::Handshake.bypasses_authorization());
        assert!(Opcode::Close.bypasses_authorization());
        assert!(!Opcode::Frame.bypasses_authorization());
        assert!(!Opcode::Pong.bypasses_authorization());
    }

    #[test]
    fn test_truncated_frames() {
        assert!(matches!(Packet::from_bytes(&[]), Err(ProtocolError::InvalidHeader)));
        assert!(matches!(Packet::from_bytes(&[1, 0, 0]), Err(ProtocolError::InvalidHeader)));

        let mut bytes = Packet::new(Opcode::Ping, Value::object()).to_bytes().unwrap();
        bytes.pop();
        assert!(matches!(Packet::from_bytes(&bytes), Err(ProtocolError::InvalidHeader)));
    }

    #[test]
    fn test_negative_and_oversized_lengths() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_ne_bytes());
        bytes.extend_from_slice(&(-1i32).to_ne_bytes());
        assert!(matches!(Packet::from_bytes(&bytes), Err(ProtocolError::OversizedPacket(_))));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_ne_bytes());
        bytes.extend_from_slice(&((MAX_PAYLOAD_SIZE + 1) as i32).to_ne_bytes());
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(ProtocolError::OversizedPacket(n)) if n == MAX_PAYLOAD_SIZE + 1
        ));
    }

    #[test]
    fn test_unknown_opcode_with_valid_body() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&9i32.to_ne_bytes());
        bytes.extend_from_slice(&2i32.to_ne_bytes());
        bytes.extend_from_slice(b"{}");
        assert!(matches!(Packet::from_bytes(&bytes), Err(ProtocolError::UnknownOpcode(9))));
    }

    #[test]
    fn test_malformed_body() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_ne_bytes());
        bytes.extend_from_slice(&2i32.to_ne_bytes());
        bytes.extend_from_slice(b"{]");
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(ProtocolError::MalformedInput { .. })
        ));
    }
}
