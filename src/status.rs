//! Upload outcome codes and the single-value status registry.
//!
//! Every terminal failure of the protocol engine maps to exactly one
//! [`StatusCode`], attributable to one RPC exchange. All variants are
//! `Copy` so they can be passed through the state machine without
//! allocation. The registry retains the most recent non-OK code until it
//! is explicitly cleared or a new upload session starts.

use core::fmt;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Outcome of the last upload session or checksum query.
///
/// Three families:
/// - `NoResponse*` — the peer never answered within the retry budget
///   (recoverable only by restarting the whole upload);
/// - offset / block / reply-code violations — peer or transport corruption,
///   immediately terminal;
/// - `InvalidScriptName` / `InvalidScriptCrc` — the transfer mechanically
///   succeeded but the wrong or corrupt script ended up on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StatusCode {
    /// No error recorded; also the value after a successful upload.
    #[default]
    Ok = 0,
    /// Erase command acknowledged by nobody within the retry budget.
    NoResponseToEraseCommand,
    /// A write-block RPC ran out of retries without an acknowledgement.
    NoResponseToWriteDataBlock,
    /// Reboot RPC ran out of retries.
    NoResponseRebootRpc,
    /// Script-name query ran out of retries.
    NoResponseScriptNameRpc,
    /// Script-CRC query ran out of retries.
    NoResponseScriptCrcRpc,
    /// A write acknowledgement carried an offset other than the one just sent.
    InvalidOffsetInWriteAck,
    /// A block acknowledgement (or a supplied block) that nothing asked for.
    UnrequestedDataBlockReceived,
    /// The engine requested script data and none arrived in time.
    NoDataBlockReceived,
    /// A supplied block exceeds the single-RPC payload limit.
    DataBlockTooLong,
    /// The peer reports a script name different from the one uploaded.
    InvalidScriptName,
    /// The peer reports a CRC different from the expected one.
    InvalidScriptCrc,
    /// The peer answered with a reply code this engine does not know.
    InvalidStatusCode,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::NoResponseToEraseCommand => write!(f, "no response to erase command"),
            Self::NoResponseToWriteDataBlock => write!(f, "no response to write data block"),
            Self::NoResponseRebootRpc => write!(f, "no response to reboot RPC"),
            Self::NoResponseScriptNameRpc => write!(f, "no response to script name RPC"),
            Self::NoResponseScriptCrcRpc => write!(f, "no response to script CRC RPC"),
            Self::InvalidOffsetInWriteAck => write!(f, "invalid offset in write ack"),
            Self::UnrequestedDataBlockReceived => write!(f, "unrequested data block received"),
            Self::NoDataBlockReceived => write!(f, "no data block received"),
            Self::DataBlockTooLong => write!(f, "data block too long"),
            Self::InvalidScriptName => write!(f, "installed script name mismatch"),
            Self::InvalidScriptCrc => write!(f, "installed script CRC mismatch"),
            Self::InvalidStatusCode => write!(f, "invalid status code in reply"),
        }
    }
}

impl StatusCode {
    /// Whether this code represents a failure.
    pub fn is_error(self) -> bool {
        self != Self::Ok
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the single most recent status code.
///
/// A non-OK value is sticky: it survives until [`clear`](Self::clear) or
/// until a new session records over it.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    current: StatusCode,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status, replacing whatever was there.
    pub fn record(&mut self, code: StatusCode) {
        self.current = code;
    }

    /// The last recorded status.
    pub fn get(&self) -> StatusCode {
        self.current
    }

    /// Reset to [`StatusCode::Ok`].
    pub fn clear(&mut self) {
        self.current = StatusCode::Ok;
    }
}
