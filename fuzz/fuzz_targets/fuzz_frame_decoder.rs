//! Fuzz the streaming frame decoder with arbitrary byte streams.
//!
//! Invariants: never panics, always consumes forward, and any yielded
//! body stays within the protocol bound.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scriptlink::rpc::codec::{FrameDecoder, MAX_BODY_LEN};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let mut off = 0;
    while off < data.len() {
        let (consumed, frame) = decoder.feed(&data[off..]);
        assert!(consumed > 0, "decoder stalled");
        if let Some(body) = frame {
            assert!(!body.is_empty() && body.len() <= MAX_BODY_LEN);
        }
        off += consumed;
    }
});
