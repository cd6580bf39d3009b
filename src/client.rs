use embassy_futures::select::{select, Either};
use heapless::Vec;

use crate::command::Command;
use crate::config::Config;
use crate::error::Error;
use crate::event::Callbacks;
use crate::resources::Resources;
use crate::runner::Runner;
use crate::transport::Transport;

/// Handle used to drive a websocket session from anywhere in the application. Cheap to copy:
/// every handle refers to the same [`Runner`] via shared, pre-allocated storage, so many tasks
/// may hold one concurrently.
pub struct Client<'d, const N: usize, const Q: usize> {
    resources: &'d Resources<N, Q>,
}

impl<'d, const N: usize, const Q: usize> Clone for Client<'d, N, Q> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'d, const N: usize, const Q: usize> Copy for Client<'d, N, Q> {}

impl<'d, const N: usize, const Q: usize> Client<'d, N, Q> {
    /// Request a connection. Resolves once the connection succeeds, the configured
    /// `connection_attempts` budget is exhausted, or the attempt is cancelled by a subsequent
    /// `connect()`/`disconnect()` call.
    ///
    /// May be called again while a previous `connect()` is still pending (e.g. during
    /// `Connecting`/`Reconnecting`): the previous call resolves with `Err(Error::Cancelled)` and
    /// this one takes over.
    ///
    /// The command is sent before acquiring `connect_mutex` so a preempting call always reaches
    /// the runner immediately, even while another `connect()` is still registered as the active
    /// waiter; the mutex only serializes *who* is currently waiting on the reply signals, never
    /// who may send.
    pub async fn connect(&self) -> Result<(), Error> {
        self.resources.channel.send(Command::Connect).await;
        let _guard = self.resources.connect_mutex.lock().await;
        match select(
            self.resources.connect_cancel.wait(),
            self.resources.connect_reply.wait(),
        )
        .await
        {
            Either::First(()) => Err(Error::Cancelled),
            Either::Second(result) => result,
        }
    }

    /// Tear down unconditionally. Always accepted, idempotent, and cancels any pending
    /// `connect()` with `Err(Error::Cancelled)`.
    pub async fn disconnect(&self) {
        let _guard = self.resources.call_mutex.lock().await;
        self.resources.channel.send(Command::Disconnect).await;
        let _ = self.resources.call_reply.wait().await;
    }

    /// Send one TEXT frame. Fails with `Error::BufferTooSmall` without reaching the runner if
    /// `data` exceeds the configured buffer size; fails with `Error::NotConnected` if the client
    /// is not `Connected` by the time the runner handles it.
    pub async fn send_text(&self, data: &str) -> Result<(), Error> {
        self.send(Command::SendText, data.as_bytes()).await
    }

    /// Send one BINARY frame. Same failure modes as [`Client::send_text`].
    pub async fn send_binary(&self, data: &[u8]) -> Result<(), Error> {
        self.send(Command::SendBinary, data).await
    }

    async fn send(
        &self,
        variant: fn(Vec<u8, N>) -> Command<N>,
        data: &[u8],
    ) -> Result<(), Error> {
        let payload = Vec::from_slice(data).map_err(|_| Error::BufferTooSmall)?;
        let _guard = self.resources.call_mutex.lock().await;
        self.resources.channel.send(variant(payload)).await;
        self.resources.call_reply.wait().await
    }
}

/// Build a [`Client`]/[`Runner`] pair over caller-owned `resources`. `transport` is driven
/// exclusively by the returned `Runner`; `handler` receives data and lifecycle events.
///
/// `Runner::run` must be polled continuously (typically as its own `embassy_executor` task) for
/// any `Client` method to make progress.
pub fn new<'d, T: Transport, H: Callbacks, const N: usize, const Q: usize>(
    resources: &'d Resources<N, Q>,
    transport: T,
    config: Config<'d>,
    handler: H,
) -> Result<(Client<'d, N, Q>, Runner<'d, T, H, N, Q>), Error> {
    config.validate()?;
    if config.buffer_size() > N {
        return Err(Error::BufferTooSmall);
    }

    let client = Client { resources };
    let runner = Runner::new(resources, transport, config, handler);
    Ok((client, runner))
}
