//! ScriptLink — script upload protocol engine for remote embedded nodes.
//!
//! Pushes a compiled script image to a peer over a half-duplex serial RPC
//! link, one acknowledged block at a time, then verifies the installed
//! script's name and CRC end-to-end. The engine is purely reactive: the
//! caller feeds it received serial bytes, script data, and periodic ticks,
//! and polls the outcome. No I/O happens beyond the caller-supplied
//! [`Transport`](rpc::Transport).

#![deny(unused_must_use)]

pub mod config;
pub mod engine;
pub mod rpc;
pub mod status;

/// Semantic version triple reported by [`engine::UploadEngine::version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    /// The version of this crate, kept in sync with `Cargo.toml`.
    pub const CURRENT: Self = Self {
        major: 0,
        minor: 1,
        patch: 0,
    };
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
