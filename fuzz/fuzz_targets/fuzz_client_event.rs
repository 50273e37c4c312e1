#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Outbound events are produced locally, but a hostile or buggy peer may
    // replay them back at us — parsing must never panic.
    let _ = serde_json::from_slice::<keysprint_client::protocol::ClientEvent>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<keysprint_client::protocol::ClientEvent>(s);
    }
});
