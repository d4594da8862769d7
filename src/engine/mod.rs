//! Upload session state machine — the root of the protocol engine.
//!
//! A strict linear pipeline with one repeated speculative step (the block
//! write), so a single timeout/retry policy covers every exchange and each
//! failure is attributable to exactly one RPC:
//!
//! ```text
//!  IDLE ──start_upload──▶ ERASE_PENDING ──erase ack──▶ WRITING_BLOCK
//!                                                          │  ▲
//!                                             data supplied │  │ write ack
//!                                                          ▼  │
//!                                                  AWAITING_BLOCK_ACK
//!                                                          │
//!                                      [end of data, last ack]
//!                                                          ▼
//!  COMPLETED ◀──crc ok── CRC_QUERY ◀──name ok── NAME_QUERY ◀──reboot ack── REBOOT_PENDING
//!
//!  Any step ──retries exhausted / protocol violation──▶ FAILED(status)
//!  Any non-terminal state ──abort──▶ IDLE
//! ```
//!
//! The machine is purely reactive: `serial_rx` and `tick_100ms` drive it,
//! so it runs in whatever execution context the caller chooses, as long
//! as entry points are never re-entered concurrently.

pub mod blocks;
pub mod checksum;
pub mod retry;

use log::{debug, info, warn};

use crate::Version;
use crate::config::UploadConfig;
use crate::rpc::codec::{MAX_BODY_LEN, MAX_FRAME_LEN};
use crate::rpc::command::{self, Command, MAX_NAME_LEN, Reply, ReplyParse};
use crate::rpc::{FrameDecoder, Transport};
use crate::status::{StatusCode, StatusRegistry};

use blocks::BlockFeeder;
use checksum::ChecksumQuery;
use retry::{RetryTimer, TimerPoll};

// ---------------------------------------------------------------------------
// Session states
// ---------------------------------------------------------------------------

/// Where the current upload session stands.
///
/// `Completed` and `Failed` are terminal: only `start_upload` or `abort`
/// leaves them. The failure reason lives in the status registry, not in
/// the state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Erase sent, waiting for the peer to clear its script storage.
    ErasePending,
    /// The engine wants the next data block from the caller.
    WritingBlock,
    /// A block is on the wire, waiting for its acknowledgement.
    AwaitingBlockAck,
    RebootPending,
    NameQueryPending,
    CrcQueryPending,
    Completed,
    Failed,
}

impl SessionState {
    /// States in which an upload exchange is in flight.
    fn upload_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The upload protocol engine. One instance drives at most one session
/// at a time; starting a new upload supersedes a running one.
pub struct UploadEngine<T: Transport> {
    transport: T,
    state: SessionState,
    script_name: heapless::Vec<u8, MAX_NAME_LEN>,
    expected_crc: u16,
    format_id: u8,
    feeder: BlockFeeder,
    timer: RetryTimer,
    registry: StatusRegistry,
    decoder: FrameDecoder,
    checksum: ChecksumQuery,
}

impl<T: Transport> UploadEngine<T> {
    pub fn new(transport: T, config: &UploadConfig) -> Self {
        Self {
            transport,
            state: SessionState::Idle,
            script_name: heapless::Vec::new(),
            expected_crc: 0,
            format_id: 0,
            feeder: BlockFeeder::new(),
            timer: RetryTimer::new(config),
            registry: StatusRegistry::new(),
            decoder: FrameDecoder::new(),
            checksum: ChecksumQuery::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Session control
    // -----------------------------------------------------------------------

    /// Begin uploading a script. Any session already in flight is
    /// superseded; a pending checksum query is cancelled. The name is
    /// truncated to the protocol bound of 32 bytes.
    pub fn start_upload(&mut self, name: &[u8], expected_crc: u16, format: u8) {
        if self.state.upload_active() {
            warn!("superseding active upload session in {:?}", self.state);
        }
        if self.checksum.is_pending() {
            debug!("cancelling outstanding checksum query");
            self.checksum.fail();
        }

        self.registry.clear();
        self.feeder.reset();
        self.timer.disarm();
        // Serial noise from before this session must not poison it.
        self.decoder.reset();

        self.script_name.clear();
        let keep = name.len().min(MAX_NAME_LEN);
        let _ = self.script_name.extend_from_slice(&name[..keep]);
        self.expected_crc = expected_crc;
        self.format_id = format;

        info!(
            "upload start: script '{}', crc {:#06x}, format {}",
            self.name_for_log(),
            expected_crc,
            format
        );

        self.state = SessionState::ErasePending;
        self.send_erase();
        self.timer.arm();
    }

    /// Supply the next chunk of script bytes. Valid only while the
    /// engine is requesting data; anything else is a contract violation
    /// recorded as `UnrequestedDataBlockReceived` (the chunk is dropped,
    /// the session state is untouched).
    pub fn data_block(&mut self, data: &[u8]) {
        if data.is_empty() {
            debug!("ignoring empty data block");
            return;
        }
        if self.state == SessionState::WritingBlock {
            if self.feeder.supply(data) {
                self.pump_writing();
            } else {
                warn!("data block supplied while one is already buffered");
                self.registry.record(StatusCode::UnrequestedDataBlockReceived);
            }
        } else {
            warn!(
                "data block ({} bytes) supplied in {:?}, none requested",
                data.len(),
                self.state
            );
            // Don't clobber a terminal failure reason with the misuse marker.
            if self.state != SessionState::Failed {
                self.registry.record(StatusCode::UnrequestedDataBlockReceived);
            }
        }
    }

    /// Declare that no further script bytes exist.
    pub fn end_of_data(&mut self) {
        self.feeder.signal_end_of_data();
        if self.state == SessionState::WritingBlock && !self.feeder.has_block() {
            self.pump_writing();
        }
    }

    /// Drop the session and return to idle. The last error is left in
    /// place for inspection; the peer's storage is left as-is (possibly
    /// scriptless).
    pub fn abort(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        info!("upload aborted in {:?}", self.state);
        self.state = SessionState::Idle;
        self.timer.disarm();
        self.feeder.reset();
    }

    // -----------------------------------------------------------------------
    // External stimuli
    // -----------------------------------------------------------------------

    /// Advance timeout/retry accounting by one tick (documented cadence:
    /// 100 ms). Without ticks the session stalls in place indefinitely.
    pub fn tick_100ms(&mut self) {
        match self.timer.tick() {
            TimerPoll::Idle | TimerPoll::Waiting => {}
            TimerPoll::Resend => {
                debug!(
                    "timeout in {:?}, retry #{}",
                    self.state,
                    self.timer.retries()
                );
                self.resend_current();
            }
            TimerPoll::Exhausted => self.on_retries_exhausted(),
        }
    }

    /// Feed received serial bytes. Complete frames are decoded and
    /// dispatched in arrival order; partial frames are buffered.
    pub fn serial_rx(&mut self, data: &[u8]) {
        let mut offset = 0;
        while offset < data.len() {
            let mut scratch = [0u8; MAX_BODY_LEN];
            let (consumed, body_len) = {
                let (n, frame) = self.decoder.feed(&data[offset..]);
                match frame {
                    Some(body) => {
                        scratch[..body.len()].copy_from_slice(body);
                        (n, Some(body.len()))
                    }
                    None => (n, None),
                }
            };
            if consumed == 0 {
                break;
            }
            offset += consumed;
            if let Some(len) = body_len {
                self.handle_frame(&scratch[..len]);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Checksum query (independent of uploads)
    // -----------------------------------------------------------------------

    /// Ask the peer for the CRC of its installed script. Only valid while
    /// the session is idle; rejected without effect otherwise. Re-issuing
    /// before the reply clears the previous value's availability.
    pub fn request_script_checksum(&mut self) {
        if self.state != SessionState::Idle {
            debug!("checksum query rejected: session in {:?}", self.state);
            return;
        }
        self.checksum.request();
        self.send_bare(Command::QueryCrc);
        self.timer.arm();
    }

    pub fn checksum_available(&self) -> bool {
        self.checksum.available()
    }

    /// The last queried CRC; meaningful only while
    /// [`checksum_available`](Self::checksum_available) is true.
    pub fn checksum(&self) -> u16 {
        self.checksum.value()
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    /// Whether the last session ran to verified completion.
    pub fn completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// The last recorded status; `Ok` by default and after success.
    pub fn status(&self) -> StatusCode {
        self.registry.get()
    }

    /// Reset the status to `Ok`. Does not alter the session state.
    pub fn clear_error(&mut self) {
        self.registry.clear();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while the engine is waiting for the caller to supply the
    /// next data block.
    pub fn awaiting_data(&self) -> bool {
        self.state == SessionState::WritingBlock
    }

    /// Script bytes acknowledged by the peer so far.
    pub fn bytes_sent(&self) -> u32 {
        self.feeder.bytes_sent()
    }

    pub fn version(&self) -> Version {
        Version::CURRENT
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // -----------------------------------------------------------------------
    // Reply dispatch
    // -----------------------------------------------------------------------

    fn handle_frame(&mut self, body: &[u8]) {
        match command::parse_reply(body) {
            ReplyParse::Reply(reply) => self.on_reply(reply),
            ReplyParse::Malformed(opcode) => self.on_malformed(opcode),
        }
    }

    fn on_reply(&mut self, reply: Reply) {
        match reply {
            Reply::EraseAck => {
                if self.state == SessionState::ErasePending {
                    debug!("erase acknowledged");
                    self.timer.disarm();
                    self.state = SessionState::WritingBlock;
                    self.pump_writing();
                } else {
                    self.ignore_stale("erase ack");
                }
            }
            Reply::WriteAck { offset } => self.on_write_ack(offset),
            Reply::RebootAck => {
                if self.state == SessionState::RebootPending {
                    debug!("reboot acknowledged, verifying script name");
                    self.send_and_await(Command::QueryName, SessionState::NameQueryPending);
                } else {
                    self.ignore_stale("reboot ack");
                }
            }
            Reply::NameAck { name } => {
                if self.state != SessionState::NameQueryPending {
                    self.ignore_stale("name ack");
                } else if name == self.script_name {
                    debug!("script name verified, querying CRC");
                    self.send_and_await(Command::QueryCrc, SessionState::CrcQueryPending);
                } else {
                    self.fail(StatusCode::InvalidScriptName);
                }
            }
            Reply::CrcAck { crc } => self.on_crc_ack(crc),
        }
    }

    fn on_write_ack(&mut self, offset: u32) {
        if self.state != SessionState::AwaitingBlockAck {
            if !self.state.upload_active() {
                self.ignore_stale("write ack");
            } else if offset < self.feeder.bytes_sent() {
                // Late duplicate of a block already acknowledged.
                self.ignore_stale("duplicate write ack");
            } else {
                warn!("write ack for offset {offset} which was never sent");
                self.fail(StatusCode::UnrequestedDataBlockReceived);
            }
            return;
        }

        let (pending_offset, _) = self.feeder.pending();
        if offset > pending_offset {
            warn!("write ack for offset {offset} which was never sent");
            self.fail(StatusCode::UnrequestedDataBlockReceived);
            return;
        }
        if offset != pending_offset {
            warn!("write ack offset {offset}, expected {pending_offset}");
            self.fail(StatusCode::InvalidOffsetInWriteAck);
            return;
        }

        self.timer.disarm();
        self.feeder.acknowledge();
        self.state = SessionState::WritingBlock;
        self.pump_writing();
    }

    fn on_crc_ack(&mut self, crc: u16) {
        match self.state {
            SessionState::CrcQueryPending => {
                if crc == self.expected_crc {
                    self.complete();
                } else {
                    warn!(
                        "installed CRC {:#06x}, expected {:#06x}",
                        crc, self.expected_crc
                    );
                    self.fail(StatusCode::InvalidScriptCrc);
                }
            }
            SessionState::Idle if self.checksum.is_pending() => {
                info!("installed script CRC: {crc:#06x}");
                self.timer.disarm();
                self.checksum.complete(crc);
            }
            _ => self.ignore_stale("crc ack"),
        }
    }

    fn on_malformed(&mut self, opcode: u8) {
        if self.state.upload_active() {
            warn!("unrecognized reply (opcode {opcode:#04x}) during upload");
            self.fail(StatusCode::InvalidStatusCode);
        } else if self.state == SessionState::Idle && self.checksum.is_pending() {
            warn!("unrecognized reply (opcode {opcode:#04x}) to checksum query");
            self.registry.record(StatusCode::InvalidStatusCode);
            self.checksum.fail();
            self.timer.disarm();
        } else {
            debug!("ignoring unrecognized frame (opcode {opcode:#04x}), no exchange active");
        }
    }

    fn ignore_stale(&self, what: &str) {
        debug!("ignoring stale {what} in {:?}", self.state);
    }

    // -----------------------------------------------------------------------
    // Step sequencing
    // -----------------------------------------------------------------------

    /// In `WritingBlock`: send the buffered block, finish the transfer,
    /// or settle in to wait for caller data.
    fn pump_writing(&mut self) {
        if self.feeder.has_block() {
            if self.feeder.oversized() {
                self.fail(StatusCode::DataBlockTooLong);
                return;
            }
            self.send_pending_block();
            self.state = SessionState::AwaitingBlockAck;
            self.timer.arm();
        } else if self.feeder.end_of_data() {
            if self.feeder.bytes_sent() > 0 {
                debug!(
                    "all {} bytes acknowledged, rebooting peer",
                    self.feeder.bytes_sent()
                );
                self.send_and_await(Command::Reboot, SessionState::RebootPending);
            } else {
                self.fail(StatusCode::NoDataBlockReceived);
            }
        } else {
            // Nothing buffered yet: wait for data_block under the same
            // tick budget as any reply.
            self.timer.arm();
        }
    }

    fn on_retries_exhausted(&mut self) {
        match self.state {
            SessionState::ErasePending => self.fail(StatusCode::NoResponseToEraseCommand),
            SessionState::WritingBlock => self.fail(StatusCode::NoDataBlockReceived),
            SessionState::AwaitingBlockAck => self.fail(StatusCode::NoResponseToWriteDataBlock),
            SessionState::RebootPending => self.fail(StatusCode::NoResponseRebootRpc),
            SessionState::NameQueryPending => self.fail(StatusCode::NoResponseScriptNameRpc),
            SessionState::CrcQueryPending => self.fail(StatusCode::NoResponseScriptCrcRpc),
            SessionState::Idle if self.checksum.is_pending() => {
                warn!("checksum query: no response within retry budget");
                self.registry.record(StatusCode::NoResponseScriptCrcRpc);
                self.checksum.fail();
            }
            _ => {}
        }
    }

    /// Re-send the outbound RPC of the current step, verbatim.
    fn resend_current(&mut self) {
        match self.state {
            SessionState::ErasePending => self.send_erase(),
            SessionState::AwaitingBlockAck => self.send_pending_block(),
            SessionState::RebootPending => self.send_bare(Command::Reboot),
            SessionState::NameQueryPending => self.send_bare(Command::QueryName),
            SessionState::CrcQueryPending => self.send_bare(Command::QueryCrc),
            SessionState::Idle if self.checksum.is_pending() => {
                self.send_bare(Command::QueryCrc);
            }
            // WritingBlock: nothing on the wire, the wait is for the caller.
            _ => {}
        }
    }

    fn fail(&mut self, code: StatusCode) {
        warn!("upload failed in {:?}: {code}", self.state);
        self.registry.record(code);
        self.state = SessionState::Failed;
        self.timer.disarm();
    }

    fn complete(&mut self) {
        info!(
            "script '{}' uploaded and verified ({} bytes)",
            self.name_for_log(),
            self.feeder.bytes_sent()
        );
        self.registry.record(StatusCode::Ok);
        self.state = SessionState::Completed;
        self.timer.disarm();
    }

    // -----------------------------------------------------------------------
    // Outbound frames
    // -----------------------------------------------------------------------

    fn send_erase(&mut self) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let encoded = {
            let cmd = Command::Erase {
                name: &self.script_name,
                format: self.format_id,
            };
            command::encode_command(&cmd, &mut buf)
        };
        if let Some(n) = encoded {
            self.transmit(&buf[..n]);
        }
    }

    fn send_pending_block(&mut self) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let encoded = {
            let (offset, data) = self.feeder.pending();
            command::encode_command(&Command::WriteBlock { offset, data }, &mut buf)
        };
        if let Some(n) = encoded {
            self.transmit(&buf[..n]);
        }
    }

    fn send_bare(&mut self, cmd: Command<'_>) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        if let Some(n) = command::encode_command(&cmd, &mut buf) {
            self.transmit(&buf[..n]);
        }
    }

    fn send_and_await(&mut self, cmd: Command<'_>, next: SessionState) {
        self.send_bare(cmd);
        self.state = next;
        self.timer.arm();
    }

    fn transmit(&mut self, frame: &[u8]) {
        // A transport error counts as a dropped frame; the retry policy
        // covers recovery.
        if let Err(e) = self.transport.send(frame) {
            warn!("transport send failed: {e:?}");
            return;
        }
        if let Err(e) = self.transport.flush() {
            warn!("transport flush failed: {e:?}");
        }
    }

    fn name_for_log(&self) -> &str {
        core::str::from_utf8(&self.script_name).unwrap_or("<binary name>")
    }
}

// ── Tests ────────────────────────────────────────────────────
