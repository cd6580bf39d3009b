use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::command::Command;
use crate::error::Error;

/// Pre-allocated, `'static`-friendly storage for one [`crate::client::Client`]/[`crate::runner::Runner`]
/// pair. No heap allocation: `N` bounds both the runner's receive buffer and the largest
/// `send_text`/`send_binary` payload; `Q` bounds how many commands may be queued ahead of the
/// runner at once.
///
/// The [`Signal`]s stand in for the original's caller-allocated "future" objects. They live here
/// rather than on the caller's stack because `Channel`'s item type is fixed at construction, so a
/// command can only carry a reference with the same lifetime as the channel itself — see
/// `DESIGN.md` for why, and for the mutexes that keep each `Signal` single-waiter safe.
///
/// `connect_reply` and `connect_cancel` are deliberately two separate signals rather than one:
/// a pending `connect()` call can be resolved by two distinct, independently-timed events — the
/// driving attempt concluding (`connect_reply`) or a later `connect()`/`disconnect()` preempting
/// it (`connect_cancel`) — and a single `Signal` only remembers its latest value. If both events
/// were funneled through one `Signal`, a preempted caller's `Err(Cancelled)` could be silently
/// overwritten by the new attempt's outcome before the preempted caller is ever polled again.
/// `connect_mutex` serializes which task is currently registered against either signal, so two
/// overlapping `connect()` calls never race for the same waker slot.
pub struct Resources<const N: usize, const Q: usize> {
    pub(crate) channel: Channel<NoopRawMutex, Command<N>, Q>,
    pub(crate) connect_reply: Signal<NoopRawMutex, Result<(), Error>>,
    pub(crate) connect_cancel: Signal<NoopRawMutex, ()>,
    pub(crate) connect_mutex: Mutex<NoopRawMutex, ()>,
    pub(crate) call_reply: Signal<NoopRawMutex, Result<(), Error>>,
    pub(crate) call_mutex: Mutex<NoopRawMutex, ()>,
}

impl<const N: usize, const Q: usize> Default for Resources<N, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const Q: usize> Resources<N, Q> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            connect_reply: Signal::new(),
            connect_cancel: Signal::new(),
            connect_mutex: Mutex::new(()),
            call_reply: Signal::new(),
            call_mutex: Mutex::new(()),
        }
    }
}
