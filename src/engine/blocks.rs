//! Pull-based script data flow control.
//!
//! The caller pushes chunks through `UploadEngine::data_block`; this
//! feeder owns the bounded copy of the one block currently in flight.
//! Offsets are assigned here, monotonically and without overlap, so the
//! state machine never has to reconstruct where a block belongs. The
//! block is retained until its acknowledgement arrives — the retry
//! controller re-sends it verbatim on timeout.

use heapless::Vec;

use crate::rpc::command::MAX_BLOCK_LEN;

/// Buffers at most one unacknowledged block and tracks transfer progress.
#[derive(Debug, Default)]
pub struct BlockFeeder {
    /// Copy of the in-flight block, truncated to the protocol bound.
    pending: Vec<u8, MAX_BLOCK_LEN>,
    /// Length the caller actually supplied. May exceed `MAX_BLOCK_LEN`,
    /// in which case the block is unsendable and the session must fail
    /// with `DataBlockTooLong` when it is pulled.
    pending_len: usize,
    has_pending: bool,
    /// Offset of the next block to send == bytes acknowledged so far.
    next_offset: u32,
    end_of_data: bool,
}

impl BlockFeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; ready for a new session.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.pending_len = 0;
        self.has_pending = false;
        self.next_offset = 0;
        self.end_of_data = false;
    }

    /// Accept the next chunk from the caller. The data is copied before
    /// returning — the caller keeps ownership of its buffer.
    ///
    /// Returns `false` if a block is already buffered (the protocol
    /// allows exactly one outstanding block; a second supply is caller
    /// misuse and the data is dropped).
    pub fn supply(&mut self, data: &[u8]) -> bool {
        if self.has_pending {
            return false;
        }

        self.pending.clear();
        let copy_len = data.len().min(MAX_BLOCK_LEN);
        // Capacity is MAX_BLOCK_LEN, copy_len is clamped to it.
        let _ = self.pending.extend_from_slice(&data[..copy_len]);
        self.pending_len = data.len();
        self.has_pending = true;
        true
    }

    /// The caller declares that no more chunks exist.
    pub fn signal_end_of_data(&mut self) {
        self.end_of_data = true;
    }

    pub fn end_of_data(&self) -> bool {
        self.end_of_data
    }

    /// Whether a block is buffered and awaiting send or acknowledgement.
    pub fn has_block(&self) -> bool {
        self.has_pending
    }

    /// Whether the buffered block exceeds the single-RPC payload limit.
    pub fn oversized(&self) -> bool {
        self.has_pending && self.pending_len > MAX_BLOCK_LEN
    }

    /// Offset and bytes of the in-flight block.
    /// Only meaningful while [`has_block`](Self::has_block) is true.
    pub fn pending(&self) -> (u32, &[u8]) {
        (self.next_offset, &self.pending)
    }

    /// The in-flight block was acknowledged: advance the offset and free
    /// the buffer for the next chunk.
    pub fn acknowledge(&mut self) {
        debug_assert!(self.has_pending, "acknowledge without a pending block");
        self.next_offset += self.pending.len() as u32;
        self.pending.clear();
        self.pending_len = 0;
        self.has_pending = false;
    }

    /// Bytes acknowledged by the peer so far.
    pub fn bytes_sent(&self) -> u32 {
        self.next_offset
    }
}
