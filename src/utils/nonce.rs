//! Request nonces.
//!
//! Every command carries a nonce the peer echoes back in its response. The
//! format is a random version 4 UUID in canonical hyphenated form.

use rand::Rng;

/// Generate a random UUID-formatted nonce, e.g. `3f2b8c1e-9a4d-4e7f-b1c2-0d9e8f7a6b5c`.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);

    // Version 4, RFC 4122 variant.
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
