//! Serial RPC layer — framing and the five-command protocol vocabulary.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RPC Stack                               │
//! │                                                             │
//! │  outbound:  Command ──▶ encode ──▶ frame ──▶ Transport      │
//! │                                                             │
//! │  inbound:   serial bytes ──▶ FrameDecoder ──▶ parse_reply   │
//! │                                  │                          │
//! │                         (resynchronizes on garbage)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The layer performs no I/O itself: encoded frames are handed to the
//! caller-supplied [`Transport`], and inbound bytes arrive through the
//! engine's `serial_rx` entry point.

pub mod codec;
pub mod command;
pub mod transport;

pub use codec::FrameDecoder;
pub use command::{Command, Reply, ReplyParse};
pub use transport::{NullTransport, Transport};
