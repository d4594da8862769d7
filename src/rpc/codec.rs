//! Length-prefix frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬───────────────────────────────┐
//! │ Length (2B)│ Body: opcode (1B) + payload   │
//! │ LE u16     │                               │
//! └────────────┴───────────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete frame
//! bodies. A single `serial_rx` call may deliver part of the header,
//! part of the body, or several frames concatenated; the decoder handles
//! all of it incrementally. An implausible length (zero, or larger than
//! [`MAX_BODY_LEN`]) is treated as stream garbage: the decoder slides
//! forward one byte and re-attempts header sync, so corruption never
//! desynchronizes later frames permanently.

/// Maximum frame body size (protects against memory exhaustion and
/// bounds the resync heuristic).
pub const MAX_BODY_LEN: usize = 512;

/// Frame header size (2-byte little-endian body length).
pub const HEADER_LEN: usize = 2;

/// Scratch size sufficient for any encoded frame.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_BODY_LEN;

/// Decoder state machine.
enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader { collected: usize },
    /// Header received, reading body.
    ReadingBody { expected: usize, collected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_LEN],
    body_buf: [u8; MAX_BODY_LEN],
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_LEN],
            body_buf: [0; MAX_BODY_LEN],
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// Returns the number of input bytes consumed and, if one completed,
    /// a complete frame body. The caller loops until all input is
    /// consumed, so multiple frames in one buffer are all surfaced:
    ///
    /// ```ignore
    /// let mut off = 0;
    /// while off < data.len() {
    ///     let (n, frame) = decoder.feed(&data[off..]);
    ///     off += n;
    ///     if let Some(body) = frame { handle(body); }
    /// }
    /// ```
    ///
    /// The returned slice is valid until the next call to `feed`.
    pub fn feed<'a>(&'a mut self, data: &[u8]) -> (usize, Option<&'a [u8]>) {
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let needed = HEADER_LEN - *collected;
                    let to_copy = needed.min(data.len() - offset);

                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);

                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_LEN {
                        let expected = u16::from_le_bytes(self.header_buf) as usize;

                        if expected == 0 || expected > MAX_BODY_LEN {
                            // Garbage header: discard the first byte and
                            // retry sync from the second.
                            self.header_buf[0] = self.header_buf[1];
                            self.state = DecoderState::ReadingHeader { collected: 1 };
                            continue;
                        }

                        self.state = DecoderState::ReadingBody {
                            expected,
                            collected: 0,
                        };
                    }
                }

                DecoderState::ReadingBody { expected, collected } => {
                    let needed = *expected - *collected;
                    let to_copy = needed.min(data.len() - offset);

                    self.body_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);

                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = *expected;
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        return (offset, Some(&self.body_buf[..len]));
                    }
                }
            }
        }

        (offset, None)
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a frame body into `[LE-u16 length][body]` in `out_buf`.
///
/// Returns the total number of bytes written, or `None` if the body is
/// empty, oversized, or does not fit the output buffer.
pub fn encode_frame(body: &[u8], out_buf: &mut [u8]) -> Option<usize> {
    let total = HEADER_LEN + body.len();
    if body.is_empty() || body.len() > MAX_BODY_LEN || total > out_buf.len() {
        return None;
    }

    let len_bytes = (body.len() as u16).to_le_bytes();
    out_buf[..HEADER_LEN].copy_from_slice(&len_bytes);
    out_buf[HEADER_LEN..total].copy_from_slice(body);

    Some(total)
}

// ── Tests ────────────────────────────────────────────────────
