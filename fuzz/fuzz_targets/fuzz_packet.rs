#![no_main]

use bytes::BytesMut;
use discord_ipc::core::codec::FrameCodec;
use discord_ipc::Packet;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let _ = Packet::from_bytes(data);

    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = FrameCodec.decode(&mut buf) {}
});
