//! Tokio codec for driving IPC frames over any async byte stream.
//!
//! `Framed::new(stream, FrameCodec)` yields a `Stream` of [`Packet`]s and a
//! `Sink` accepting them. The client engine reads the header itself so it can
//! poll with a timeout; this codec serves peers, tools and tests.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{decode_header, encode_length, Opcode, Packet, HEADER_SIZE};
use crate::core::parser::parse_bytes;
use crate::core::serializer::stringify;
use crate::error::{ProtocolError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Length is validated before anything is reserved.
        let (raw_opcode, len) = decode_header(&src[..HEADER_SIZE])?;

        let total = HEADER_SIZE + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(len);

        let opcode = Opcode::try_from(raw_opcode)?;
        let body = parse_bytes(&body)?;

        Ok(Some(Packet { opcode, body }))
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let body = stringify(&item.body);
        let len = encode_length(body.len())?;

        dst.reserve(HEADER_SIZE + body.len());
        dst.put_slice(&item.opcode.as_i32().to_ne_bytes());
        dst.put_slice(&len.to_ne_bytes());
        dst.put_slice(body.as_bytes());
        Ok(())
    }
}
