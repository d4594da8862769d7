//! Fuzz the reply parser with arbitrary frame bodies.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scriptlink::rpc::command::{MAX_NAME_LEN, Reply, ReplyParse, parse_reply};

fuzz_target!(|body: &[u8]| {
    match parse_reply(body) {
        ReplyParse::Reply(Reply::NameAck { name }) => {
            // Bounded copy, never a borrow of the input.
            assert!(name.len() <= MAX_NAME_LEN);
        }
        ReplyParse::Reply(_) | ReplyParse::Malformed(_) => {}
    }
});
