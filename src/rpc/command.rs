//! The five-command protocol vocabulary and its binary coding.
//!
//! Shared by both sides of the link: the host engine encodes commands and
//! parses replies; a device (or a test peer) parses commands and encodes
//! replies. Frame bodies are `opcode (1B) + payload`; reply opcodes are
//! the command opcode with the high bit set.
//!
//! ```text
//! 0x01 ERASE        payload: format (1B) + script name (≤ 32B)
//! 0x02 WRITE_BLOCK  payload: offset (LE u32) + data (1..=256B)
//! 0x03 REBOOT       payload: empty
//! 0x04 QUERY_NAME   payload: empty
//! 0x05 QUERY_CRC    payload: empty
//!
//! 0x81 ERASE_ACK    payload: empty
//! 0x82 WRITE_ACK    payload: offset (LE u32)
//! 0x83 REBOOT_ACK   payload: empty
//! 0x84 NAME_ACK     payload: script name (≤ 32B)
//! 0x85 CRC_ACK      payload: crc (LE u16)
//! ```

use heapless::Vec;

use super::codec::{self, MAX_FRAME_LEN};

/// Largest data payload carried by one write-block RPC.
pub const MAX_BLOCK_LEN: usize = 256;

/// Bound on the script name byte string.
pub const MAX_NAME_LEN: usize = 32;

// ── Opcodes ──────────────────────────────────────────────────

pub const OP_ERASE: u8 = 0x01;
pub const OP_WRITE_BLOCK: u8 = 0x02;
pub const OP_REBOOT: u8 = 0x03;
pub const OP_QUERY_NAME: u8 = 0x04;
pub const OP_QUERY_CRC: u8 = 0x05;

/// Reply opcodes mirror the command with the high bit set.
pub const REPLY_BIT: u8 = 0x80;

pub const OP_ERASE_ACK: u8 = OP_ERASE | REPLY_BIT;
pub const OP_WRITE_ACK: u8 = OP_WRITE_BLOCK | REPLY_BIT;
pub const OP_REBOOT_ACK: u8 = OP_REBOOT | REPLY_BIT;
pub const OP_NAME_ACK: u8 = OP_QUERY_NAME | REPLY_BIT;
pub const OP_CRC_ACK: u8 = OP_QUERY_CRC | REPLY_BIT;

// ── Commands (host → device) ─────────────────────────────────

/// One remote operation. Payload slices borrow from the caller; the
/// encoder copies them into the outbound frame before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Erase remote script storage and declare the incoming script.
    Erase { name: &'a [u8], format: u8 },
    /// Write one block of script bytes at the given offset.
    WriteBlock { offset: u32, data: &'a [u8] },
    /// Reboot into the freshly written script.
    Reboot,
    /// Ask which script is installed.
    QueryName,
    /// Ask for the CRC of the installed script.
    QueryCrc,
}

/// Encode a command as a complete wire frame (header included) into
/// `out_buf`. Returns the frame length, or `None` when a payload exceeds
/// its protocol bound.
pub fn encode_command(cmd: &Command<'_>, out_buf: &mut [u8]) -> Option<usize> {
    let mut body: Vec<u8, { MAX_FRAME_LEN }> = Vec::new();

    match cmd {
        Command::Erase { name, format } => {
            if name.len() > MAX_NAME_LEN {
                return None;
            }
            body.push(OP_ERASE).ok()?;
            body.push(*format).ok()?;
            body.extend_from_slice(name).ok()?;
        }
        Command::WriteBlock { offset, data } => {
            if data.is_empty() || data.len() > MAX_BLOCK_LEN {
                return None;
            }
            body.push(OP_WRITE_BLOCK).ok()?;
            body.extend_from_slice(&offset.to_le_bytes()).ok()?;
            body.extend_from_slice(data).ok()?;
        }
        Command::Reboot => body.push(OP_REBOOT).ok()?,
        Command::QueryName => body.push(OP_QUERY_NAME).ok()?,
        Command::QueryCrc => body.push(OP_QUERY_CRC).ok()?,
    }

    codec::encode_frame(&body, out_buf)
}

/// Owned command, decoded from a frame body on the device side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedCommand {
    Erase {
        name: Vec<u8, MAX_NAME_LEN>,
        format: u8,
    },
    WriteBlock {
        offset: u32,
        data: Vec<u8, MAX_BLOCK_LEN>,
    },
    Reboot,
    QueryName,
    QueryCrc,
}

/// Parse a frame body as a command. `None` means the body is not a
/// well-formed command frame.
pub fn parse_command(body: &[u8]) -> Option<OwnedCommand> {
    let (&opcode, payload) = body.split_first()?;
    match opcode {
        OP_ERASE => {
            let (&format, name) = payload.split_first()?;
            Some(OwnedCommand::Erase {
                name: Vec::from_slice(name).ok()?,
                format,
            })
        }
        OP_WRITE_BLOCK => {
            if payload.len() < 5 {
                return None;
            }
            let offset = u32::from_le_bytes(payload[..4].try_into().ok()?);
            Some(OwnedCommand::WriteBlock {
                offset,
                data: Vec::from_slice(&payload[4..]).ok()?,
            })
        }
        OP_REBOOT if payload.is_empty() => Some(OwnedCommand::Reboot),
        OP_QUERY_NAME if payload.is_empty() => Some(OwnedCommand::QueryName),
        OP_QUERY_CRC if payload.is_empty() => Some(OwnedCommand::QueryCrc),
        _ => None,
    }
}

// ── Replies (device → host) ──────────────────────────────────

/// Typed acknowledgement decoded from a frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    EraseAck,
    WriteAck { offset: u32 },
    RebootAck,
    NameAck { name: Vec<u8, MAX_NAME_LEN> },
    CrcAck { crc: u16 },
}

/// Result of parsing a complete frame body as a reply.
///
/// Framing incompleteness never reaches this function — the
/// [`FrameDecoder`](super::FrameDecoder) only yields whole bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyParse {
    /// A well-formed, recognized acknowledgement.
    Reply(Reply),
    /// A complete frame that is not a known reply: unknown opcode or a
    /// payload of the wrong shape. Carries the offending opcode byte
    /// (0 when the body was empty).
    Malformed(u8),
}

/// Parse a frame body as a reply.
pub fn parse_reply(body: &[u8]) -> ReplyParse {
    let Some((&opcode, payload)) = body.split_first() else {
        return ReplyParse::Malformed(0);
    };

    let reply = match opcode {
        OP_ERASE_ACK if payload.is_empty() => Reply::EraseAck,
        OP_WRITE_ACK => match payload.try_into() {
            Ok(bytes) => Reply::WriteAck {
                offset: u32::from_le_bytes(bytes),
            },
            Err(_) => return ReplyParse::Malformed(opcode),
        },
        OP_REBOOT_ACK if payload.is_empty() => Reply::RebootAck,
        OP_NAME_ACK => match Vec::from_slice(payload) {
            Ok(name) => Reply::NameAck { name },
            Err(()) => return ReplyParse::Malformed(opcode),
        },
        OP_CRC_ACK => match payload.try_into() {
            Ok(bytes) => Reply::CrcAck {
                crc: u16::from_le_bytes(bytes),
            },
            Err(_) => return ReplyParse::Malformed(opcode),
        },
        _ => return ReplyParse::Malformed(opcode),
    };

    ReplyParse::Reply(reply)
}

/// Encode a reply as a complete wire frame into `out_buf`. Used by the
/// device side of the link and by test peers.
pub fn encode_reply(reply: &Reply, out_buf: &mut [u8]) -> Option<usize> {
    let mut body: Vec<u8, { MAX_FRAME_LEN }> = Vec::new();

    match reply {
        Reply::EraseAck => body.push(OP_ERASE_ACK).ok()?,
        Reply::WriteAck { offset } => {
            body.push(OP_WRITE_ACK).ok()?;
            body.extend_from_slice(&offset.to_le_bytes()).ok()?;
        }
        Reply::RebootAck => body.push(OP_REBOOT_ACK).ok()?,
        Reply::NameAck { name } => {
            body.push(OP_NAME_ACK).ok()?;
            body.extend_from_slice(name).ok()?;
        }
        Reply::CrcAck { crc } => {
            body.push(OP_CRC_ACK).ok()?;
            body.extend_from_slice(&crc.to_le_bytes()).ok()?;
        }
    }

    codec::encode_frame(&body, out_buf)
}

// ── Tests ────────────────────────────────────────────────────
