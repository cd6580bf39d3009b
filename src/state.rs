/// The client's connection lifecycle. Exactly one of these holds at any instant; transitions
/// all happen inside `runner.rs`'s main loop or its error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ClientState {
    /// No transport session. The only state in which `connect()` is accepted.
    Disconnected,
    /// A `connect()` is in flight: dialing and performing the handshake.
    Connecting,
    /// Transport session established; the poll loop is pumping frames.
    Connected,
    /// The session dropped unexpectedly and the retry loop is re-dialing on its own schedule.
    Reconnecting,
}

/// At most one background timer is ever armed: the poll loop's fixed ~1ms tick while `Connected`,
/// or the retry loop's backoff while `Reconnecting`. Modeling this as one enum instead of two
/// `Option<Instant>` fields makes "both armed" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArmedTimer {
    None,
    Poll,
    Retry,
}
