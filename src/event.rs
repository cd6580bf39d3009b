/// Unexpected events surfaced to the caller outside of a pending command's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The client gave up recovering the connection (budget exhausted, or a clean
    /// server-initiated close). The client is now `Disconnected`.
    Disconnected,
    /// The client lost its connection mid-session and is attempting to recover it.
    /// Emitted at most once per recovery episode.
    Reconnecting,
    /// A recovery episode that emitted `Reconnecting` has succeeded.
    Reconnected,
}

/// Frame-level callbacks delivered to the owner of a [`crate::Client`].
///
/// `on_data` is invoked for every data frame (`Continuation`, `Text`, `Binary`) with the
/// client's internal receive buffer; it is only valid for the duration of the call.
pub trait Callbacks {
    fn on_data(&mut self, data: &[u8]);
    fn on_event(&mut self, event: Event);
}
