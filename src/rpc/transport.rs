//! Transport abstraction — any byte-oriented outbound channel.
//!
//! Concrete implementations are supplied by the caller: a UART driver, an
//! RS-485 half-duplex link, a test harness capturing frames in memory.
//! The engine only ever emits whole encoded frames; inbound bytes flow the
//! other way, through `UploadEngine::serial_rx`.

/// Outbound byte channel for encoded RPC frames.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Send one encoded frame. A short or failed send is reported as an
    /// error; the engine treats it like a dropped frame and lets the
    /// retry policy recover.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A null transport that discards all writes.
/// Useful as a default when no peer is connected.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn send(&mut self, _frame: &[u8]) -> Result<(), ()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}
