//! Simulated remote node for integration tests.
//!
//! Implements [`Transport`], so the engine "sends" frames straight into
//! the simulated device. The device decodes each command, mutates its
//! script storage, and queues encoded reply frames in `outbox`; tests
//! feed those back through `serial_rx` with [`exchange`]. Fault knobs
//! make the peer go deaf per-RPC or lie in its acknowledgements.

use scriptlink::engine::UploadEngine;
use scriptlink::rpc::Transport;
use scriptlink::rpc::codec::{HEADER_LEN, MAX_FRAME_LEN};
use scriptlink::rpc::command::{OwnedCommand, Reply, encode_reply, parse_command};

/// Which RPC a fault knob refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rpc {
    Erase,
    Write,
    Reboot,
    QueryName,
    QueryCrc,
}

/// Honest-by-default simulated device.
#[derive(Default)]
pub struct MockPeer {
    /// Script bytes written since the last erase.
    pub storage: Vec<u8>,
    /// Name declared by the last erase command.
    pub script_name: Vec<u8>,
    pub format: u8,
    pub rebooted: bool,

    /// Encoded reply frames waiting to be fed back to the engine.
    pub outbox: Vec<Vec<u8>>,
    /// Every command received, in order.
    pub log: Vec<Rpc>,

    // ── Fault knobs ──
    /// The peer never answers this RPC.
    pub deaf_to: Option<Rpc>,
    /// Next write ack carries this offset instead of the real one.
    pub ack_offset_override: Option<u32>,
    /// Name reported by the name query, instead of the stored one.
    pub name_override: Option<Vec<u8>>,
    /// CRC reported by the CRC query, instead of the computed one.
    pub crc_override: Option<u16>,
}

impl MockPeer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_reply(&mut self, reply: &Reply) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = encode_reply(reply, &mut buf).expect("mock peer built an unencodable reply");
        self.outbox.push(buf[..n].to_vec());
    }

    fn handle(&mut self, cmd: OwnedCommand) {
        match cmd {
            OwnedCommand::Erase { name, format } => {
                self.log.push(Rpc::Erase);
                if self.deaf_to == Some(Rpc::Erase) {
                    return;
                }
                self.storage.clear();
                self.script_name = name.to_vec();
                self.format = format;
                self.rebooted = false;
                self.push_reply(&Reply::EraseAck);
            }
            OwnedCommand::WriteBlock { offset, data } => {
                self.log.push(Rpc::Write);
                if self.deaf_to == Some(Rpc::Write) {
                    return;
                }
                // Idempotent on retransmits: only append fresh data.
                if offset as usize == self.storage.len() {
                    self.storage.extend_from_slice(&data);
                }
                let ack = self.ack_offset_override.take().unwrap_or(offset);
                self.push_reply(&Reply::WriteAck { offset: ack });
            }
            OwnedCommand::Reboot => {
                self.log.push(Rpc::Reboot);
                if self.deaf_to == Some(Rpc::Reboot) {
                    return;
                }
                self.rebooted = true;
                self.push_reply(&Reply::RebootAck);
            }
            OwnedCommand::QueryName => {
                self.log.push(Rpc::QueryName);
                if self.deaf_to == Some(Rpc::QueryName) {
                    return;
                }
                let name = self
                    .name_override
                    .clone()
                    .unwrap_or_else(|| self.script_name.clone());
                self.push_reply(&Reply::NameAck {
                    name: heapless::Vec::from_slice(&name).expect("mock name too long"),
                });
            }
            OwnedCommand::QueryCrc => {
                self.log.push(Rpc::QueryCrc);
                if self.deaf_to == Some(Rpc::QueryCrc) {
                    return;
                }
                let crc = self.crc_override.unwrap_or_else(|| crc16_xmodem(&self.storage));
                self.push_reply(&Reply::CrcAck { crc });
            }
        }
    }
}

impl Transport for MockPeer {
    type Error = ();

    fn send(&mut self, frame: &[u8]) -> Result<(), ()> {
        let body = &frame[HEADER_LEN..];
        let cmd = parse_command(body).expect("engine sent an undecodable command");
        self.handle(cmd);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

/// CRC-16/XMODEM over the script image — what the simulated device
/// reports for its installed script.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Shuttle queued replies into the engine until the link goes quiet.
/// One reply can trigger the next command (and thus the next reply), so
/// this loops until the outbox stays empty.
pub fn exchange(engine: &mut UploadEngine<MockPeer>) {
    loop {
        let frames = std::mem::take(&mut engine.transport_mut().outbox);
        if frames.is_empty() {
            break;
        }
        for frame in frames {
            engine.serial_rx(&frame);
        }
    }
}
