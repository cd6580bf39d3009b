//! The capability surface the [`crate::Runner`] drives to move bytes. Everything below the
//! WebSocket frame boundary — TCP dialing, TLS, and the wire-level framing itself — is treated
//! as an external collaborator: callers plug in whatever stack their board already has.
//!
//! [`Transport`] is deliberately narrow: connect, send a frame, read whatever is available,
//! inspect what was last read, and tear down. The state machine in `runner.rs` never reaches
//! past this trait into a concrete socket type.

use crate::opcode::Opcode;

/// Everything the runner needs from an underlying WebSocket connection.
///
/// Implementors own the TCP/TLS session and the RFC 6455 framing atop it. A single
/// `Transport` instance is reused across reconnect attempts; `connect`/`close` may be called
/// many times over its lifetime.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Dial `host:port` and perform the WebSocket opening handshake. On success the transport
    /// is ready for `send_raw`/`read`. The runner bounds this call with `config.send_timeout_ms`
    /// via `embassy_time::with_timeout`; a `Transport` impl need not enforce its own timeout.
    async fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<(), Self::Error>;

    /// Send one complete frame. `opcode` is the frame's own opcode (control frames are sent
    /// whole; data frames are never fragmented by this client). Returns the number of payload
    /// bytes written, which is always `data.len()` on success. Bounded by `config.send_timeout_ms`
    /// the same way as `connect`.
    async fn send_raw(&mut self, opcode: Opcode, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read whatever payload bytes are available for the frame currently being received into
    /// `buf`, returning how many were written. The runner wraps each call in
    /// `embassy_time::with_timeout(config.poll_timeout_ms, ...)` and treats a timeout the same as
    /// `Ok(0)`: no full frame is available yet, not necessarily that the connection is idle.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// The opcode of the frame most recently completed by `read`. `Opcode::None` before the
    /// first frame, or once `read`'s payload has been fully drained.
    fn read_opcode(&self) -> Opcode;

    /// The declared payload length, in bytes, of the frame most recently completed by `read`.
    fn read_payload_len(&self) -> usize;

    /// Resolve once the peer has closed the underlying connection (TCP FIN/RST, or a WebSocket
    /// Close frame already consumed by `read`). Used by the poll loop to detect a server-
    /// initiated disconnect without a dedicated read.
    async fn poll_connection_closed(&mut self) -> Result<(), Self::Error>;

    /// Send a Close frame (if still open) and tear down the underlying connection. Idempotent.
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Whether the underlying connection is currently established.
    fn is_open(&self) -> bool;
}
