#![no_main]

use discord_ipc::core::parser::parse_bytes;
use discord_ipc::core::serializer::stringify;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that parses must survive a serialize/parse cycle unchanged.
    if let Ok(value) = parse_bytes(data) {
        let text = stringify(&value);
        let reparsed = parse_bytes(text.as_bytes());
        assert_eq!(reparsed.ok(), Some(value));
    }
});
