#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Required configuration field is missing (`host`).
    Config,
    /// The configured buffer size exceeds the runner's const-generic capacity.
    BufferTooSmall,
    /// A `send_text`/`send_binary` call was issued while not `Connected`.
    NotConnected,
    /// `connection_attempts` was reached without a successful connect.
    ConnectBudgetExhausted,
    /// A pending `connect()` was preempted by a new `Connect` or a `disconnect()`.
    Cancelled,
    /// The transport reported a read/write/connect failure.
    Transport,
    /// A frame carried an opcode outside {CONT, TEXT, BINARY, PING, PONG, CLOSE}.
    ProtocolViolation,
}
