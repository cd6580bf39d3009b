use heapless::Vec;

/// One request dispatched from a [`crate::client::Client`] handle to the [`crate::runner::Runner`]
/// driving it. Sequenced through a single `embassy_sync::channel::Channel`, so handlers never
/// overlap: the runner fully handles one before receiving the next.
///
/// `SendText`/`SendBinary` copy the caller's payload into a fixed-capacity buffer up front —
/// `N` is the same const generic as the runner's receive buffer — so a payload that doesn't fit
/// is rejected by the client before it ever reaches the channel.
pub(crate) enum Command<const N: usize> {
    Connect,
    Disconnect,
    SendText(Vec<u8, N>),
    SendBinary(Vec<u8, N>),
}
