use core::future::pending;

use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, Duration, Timer};

use crate::command::Command;
use crate::config::Config;
use crate::error::Error;
use crate::event::{Callbacks, Event};
use crate::fmt::{debug, error, info, warn};
use crate::opcode::Opcode;
use crate::resources::Resources;
use crate::state::{ArmedTimer, ClientState};
use crate::transport::Transport;

/// Cadence of the receive pump while `ArmedTimer::Poll` is armed. Independent of
/// `config.poll_timeout_ms`, which bounds each individual `read` inside `poll_tick` instead —
/// matching the original's `aos_task_loop_set(task, _poll_loop, 1)` (a fixed 1ms loop period)
/// passing `poll_timeout_ms` only to `esp_transport_read`.
const POLL_TICK_INTERVAL_MS: u64 = 1;

/// Background driver for one [`crate::client::Client`] handle (or many clones of it). Must be
/// polled continuously — typically spawned as its own `embassy_executor` task — for `connect`,
/// `disconnect`, `send_text`, and `send_binary` to ever resolve.
pub struct Runner<'d, T: Transport, H: Callbacks, const N: usize, const Q: usize> {
    resources: &'d Resources<N, Q>,
    transport: T,
    config: Config<'d>,
    handler: H,
    state: ClientState,
    connection_attempt: u32,
    reconnection_attempt: u32,
    connect_pending: bool,
    armed_timer: ArmedTimer,
    buffer: [u8; N],
}

impl<'d, T: Transport, H: Callbacks, const N: usize, const Q: usize> Runner<'d, T, H, N, Q> {
    pub(crate) fn new(
        resources: &'d Resources<N, Q>,
        transport: T,
        config: Config<'d>,
        handler: H,
    ) -> Self {
        Self {
            resources,
            transport,
            config,
            handler,
            state: ClientState::Disconnected,
            connection_attempt: 0,
            reconnection_attempt: 0,
            connect_pending: false,
            armed_timer: ArmedTimer::None,
            buffer: [0; N],
        }
    }

    /// Drive the command dispatcher, receive pump, and retry loop. Never returns.
    pub async fn run(&mut self) -> ! {
        loop {
            match select(self.resources.channel.receive(), self.wait_timer()).await {
                Either::First(Command::Connect) => self.handle_connect().await,
                Either::First(Command::Disconnect) => self.handle_disconnect().await,
                Either::First(Command::SendText(data)) => {
                    self.handle_send(Opcode::Text, &data).await
                }
                Either::First(Command::SendBinary(data)) => {
                    self.handle_send(Opcode::Binary, &data).await
                }
                Either::Second(()) => self.handle_timer_fire().await,
            }
        }
    }

    async fn wait_timer(&self) {
        match self.armed_timer {
            ArmedTimer::None => pending::<()>().await,
            ArmedTimer::Poll => Timer::after(Duration::from_millis(POLL_TICK_INTERVAL_MS)).await,
            ArmedTimer::Retry => {
                Timer::after(Duration::from_millis(self.config.retry_interval_ms() as u64)).await
            }
        }
    }

    async fn handle_timer_fire(&mut self) {
        match self.armed_timer {
            ArmedTimer::Poll => self.poll_tick().await,
            ArmedTimer::Retry => self.retry_tick().await,
            ArmedTimer::None => {}
        }
    }

    /// Disarm the active timer and, unless the transport is already closed, send a Close frame
    /// and tear it down. Skipped on an already-closed transport to avoid a multi-second close
    /// timeout on a socket with nothing to close.
    async fn close_clean(&mut self) {
        self.armed_timer = ArmedTimer::None;
        if self.transport.is_open() {
            let _ = self.transport.send_raw(Opcode::Close, &[]).await;
            let _ = self.transport.poll_connection_closed().await;
            let _ = self.transport.close().await;
        }
    }

    /// Single decision point for every failing transport operation.
    async fn on_error(&mut self) {
        self.close_clean().await;

        if self.connect_pending {
            if self.connection_attempt >= self.config.connection_attempts() {
                error!("giving up connecting, attempt budget exhausted");
                self.state = ClientState::Disconnected;
                self.connect_pending = false;
                self.resources
                    .connect_reply
                    .signal(Err(Error::ConnectBudgetExhausted));
                return;
            }
            self.connection_attempt += 1;
            info!("retrying connect attempt {}", self.connection_attempt);
            self.armed_timer = ArmedTimer::Retry;
            self.state = ClientState::Connecting;
            return;
        }

        self.state = ClientState::Reconnecting;
        if self.reconnection_attempt == 0 {
            self.handler.on_event(Event::Reconnecting);
        }
        if self.reconnection_attempt >= self.config.reconnection_attempts() {
            error!("giving up reconnecting, attempt budget exhausted");
            self.state = ClientState::Disconnected;
            self.handler.on_event(Event::Disconnected);
            return;
        }
        self.reconnection_attempt += 1;
        debug!("retrying reconnect attempt {}", self.reconnection_attempt);
        self.armed_timer = ArmedTimer::Retry;
    }

    async fn handle_connect(&mut self) {
        match self.state {
            ClientState::Connected => {
                self.connection_attempt = 0;
                self.reconnection_attempt = 0;
                self.resources.connect_reply.signal(Ok(()));
            }
            ClientState::Disconnected | ClientState::Connecting | ClientState::Reconnecting => {
                self.close_clean().await;
                if self.connect_pending {
                    debug!("preempting a pending connect");
                    self.resources.connect_cancel.signal(());
                }
                self.connect_pending = true;
                self.connection_attempt = 0;
                self.reconnection_attempt = 0;

                let timeout = Duration::from_millis(self.config.send_timeout_ms() as u64);
                match with_timeout(
                    timeout,
                    self.transport
                        .connect(self.config.host, self.config.port(), self.config.path),
                )
                .await
                {
                    Ok(Err(_)) | Err(_) => self.on_error().await,
                    Ok(Ok(())) => {
                        info!("connected");
                        self.connect_pending = false;
                        self.state = ClientState::Connected;
                        self.resources.connect_reply.signal(Ok(()));
                        self.armed_timer = ArmedTimer::Poll;
                        self.poll_tick().await;
                    }
                }
            }
        }
    }

    async fn handle_disconnect(&mut self) {
        match self.state {
            ClientState::Connected | ClientState::Connecting | ClientState::Reconnecting => {
                self.close_clean().await;
                if self.connect_pending {
                    self.connect_pending = false;
                    self.resources.connect_cancel.signal(());
                }
                info!("disconnected");
                self.state = ClientState::Disconnected;
                self.resources.call_reply.signal(Ok(()));
            }
            ClientState::Disconnected => {
                self.resources.call_reply.signal(Ok(()));
            }
        }
    }

    async fn handle_send(&mut self, opcode: Opcode, data: &[u8]) {
        if self.state != ClientState::Connected {
            self.resources.call_reply.signal(Err(Error::NotConnected));
            return;
        }

        let timeout = Duration::from_millis(self.config.send_timeout_ms() as u64);
        match with_timeout(timeout, self.transport.send_raw(opcode, data)).await {
            Ok(Ok(_)) => self.resources.call_reply.signal(Ok(())),
            Ok(Err(_)) | Err(_) => {
                warn!("send failed");
                self.on_error().await;
                self.resources.call_reply.signal(Err(Error::Transport));
            }
        }
    }

    /// One read/dispatch cycle: drain whatever is available for the current frame, then act on
    /// its opcode.
    async fn poll_tick(&mut self) {
        let effective_len = self.config.buffer_size().min(N);
        let poll_timeout = Duration::from_millis(self.config.poll_timeout_ms() as u64);
        let mut data_len = 0usize;
        loop {
            match with_timeout(
                poll_timeout,
                self.transport.read(&mut self.buffer[data_len..effective_len]),
            )
            .await
            {
                Ok(Err(_)) => {
                    warn!("read failed");
                    self.on_error().await;
                    return;
                }
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    data_len += n;
                    if data_len >= effective_len || data_len >= self.transport.read_payload_len() {
                        break;
                    }
                }
            }
        }

        match self.transport.read_opcode() {
            Opcode::Continuation | Opcode::Text | Opcode::Binary => {
                self.handler.on_data(&self.buffer[..data_len]);
            }
            Opcode::Ping => {
                debug!("replying to ping");
                let timeout = Duration::from_millis(self.config.send_timeout_ms() as u64);
                if with_timeout(
                    timeout,
                    self.transport.send_raw(Opcode::Pong, &self.buffer[..data_len]),
                )
                .await
                .map_or(true, |r| r.is_err())
                {
                    self.on_error().await;
                }
            }
            Opcode::Pong | Opcode::None => {}
            Opcode::Close => {
                self.close_clean().await;
                self.state = ClientState::Disconnected;
                self.handler.on_event(Event::Disconnected);
            }
            Opcode::Unknown(op) => {
                warn!("unknown opcode {}", op);
                self.on_error().await;
            }
        }
    }

    /// Fired by the armed retry timer: one connect attempt, either promoting to `Connected` or
    /// re-entering `on_error`.
    async fn retry_tick(&mut self) {
        let timeout = Duration::from_millis(self.config.send_timeout_ms() as u64);
        match with_timeout(
            timeout,
            self.transport
                .connect(self.config.host, self.config.port(), self.config.path),
        )
        .await
        {
            Ok(Err(_)) | Err(_) => self.on_error().await,
            Ok(Ok(())) => {
                info!("connected");
                self.armed_timer = ArmedTimer::None;
                self.state = ClientState::Connected;
                self.connection_attempt = 0;
                if self.reconnection_attempt != 0 {
                    self.reconnection_attempt = 0;
                    self.handler.on_event(Event::Reconnected);
                }
                if self.connect_pending {
                    self.connect_pending = false;
                    self.resources.connect_reply.signal(Ok(()));
                }
                self.armed_timer = ArmedTimer::Poll;
                self.poll_tick().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec as StdVec;

    struct Recorder {
        data: Rc<RefCell<StdVec<StdVec<u8>>>>,
        events: Rc<RefCell<StdVec<Event>>>,
    }

    impl Callbacks for Recorder {
        fn on_data(&mut self, data: &[u8]) {
            self.data.borrow_mut().push(data.to_vec());
        }
        fn on_event(&mut self, event: Event) {
            self.events.borrow_mut().push(event);
        }
    }

    /// A scripted transport: connect/read outcomes are consumed from queues so each test can
    /// drive the runner through a precise scenario without a real socket.
    struct MockTransport {
        connect_results: StdVec<Result<(), ()>>,
        frames: StdVec<(Opcode, StdVec<u8>)>,
        sent: Rc<RefCell<StdVec<(Opcode, StdVec<u8>)>>>,
        /// In-progress frame payload plus how much of it has been delivered to the caller.
        pending: Option<(StdVec<u8>, usize)>,
        /// Opcode/length of the most recently completed (or in-progress) frame — persists after
        /// `pending` is drained, mirroring a real transport's "last frame" query methods.
        last_opcode: Opcode,
        last_payload_len: usize,
        open: bool,
        /// Number of upcoming `read` calls that should fail, consumed one at a time. Lets a
        /// test simulate a mid-session transport loss without an explicit CLOSE frame.
        fail_reads: Rc<RefCell<u32>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                connect_results: StdVec::new(),
                frames: StdVec::new(),
                sent: Rc::new(RefCell::new(StdVec::new())),
                pending: None,
                last_opcode: Opcode::None,
                last_payload_len: 0,
                open: false,
                fail_reads: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl Transport for MockTransport {
        type Error = ();

        async fn connect(&mut self, _host: &str, _port: u16, _path: &str) -> Result<(), ()> {
            let result = self.connect_results.pop().unwrap_or(Ok(()));
            if result.is_ok() {
                self.open = true;
            }
            result
        }

        async fn send_raw(&mut self, opcode: Opcode, data: &[u8]) -> Result<usize, ()> {
            self.sent.borrow_mut().push((opcode, data.to_vec()));
            Ok(data.len())
        }

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
            {
                let mut remaining = self.fail_reads.borrow_mut();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(());
                }
            }
            if self.pending.is_none() {
                if self.frames.is_empty() {
                    self.last_opcode = Opcode::None;
                    return Ok(0);
                }
                let (op, payload) = self.frames.remove(0);
                self.last_opcode = op;
                self.last_payload_len = payload.len();
                self.pending = Some((payload, 0));
            }
            let (payload, cursor) = self.pending.as_mut().unwrap();
            let remaining = &payload[*cursor..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            *cursor += n;
            if *cursor >= payload.len() {
                self.pending = None;
            }
            Ok(n)
        }

        fn read_opcode(&self) -> Opcode {
            self.last_opcode
        }

        fn read_payload_len(&self) -> usize {
            self.last_payload_len
        }

        async fn poll_connection_closed(&mut self) -> Result<(), ()> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ()> {
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn recorder() -> (Recorder, Rc<RefCell<StdVec<StdVec<u8>>>>, Rc<RefCell<StdVec<Event>>>) {
        let data = Rc::new(RefCell::new(StdVec::new()));
        let events = Rc::new(RefCell::new(StdVec::new()));
        (
            Recorder {
                data: data.clone(),
                events: events.clone(),
            },
            data,
            events,
        )
    }

    #[tokio::test]
    async fn connect_send_disconnect_happy_path() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let transport = MockTransport::new();
        let config = Config::new("example.com");
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            client.connect().await.unwrap();
            client.send_text("hello").await.unwrap();
            client.disconnect().await;
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn send_while_disconnected_is_rejected() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let transport = MockTransport::new();
        let config = Config::new("example.com");
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            let result = client.send_text("hello").await;
            assert_eq!(result, Err(Error::NotConnected));
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn server_close_frame_emits_disconnected_event() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, data, events) = recorder();
        let mut transport = MockTransport::new();
        transport.frames.push((Opcode::Close, StdVec::new()));
        let config = Config::new("example.com").with_poll_timeout_ms(1);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            client.connect().await.unwrap();
            // give the poll loop a tick to observe the close frame queued above.
            Timer::after(Duration::from_millis(20)).await;
            assert!(events.borrow().contains(&Event::Disconnected));
            let _ = data;
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let mut transport = MockTransport::new();
        transport.frames.push((Opcode::Ping, b"hi".to_vec()));
        let sent = transport.sent.clone();
        let config = Config::new("example.com").with_poll_timeout_ms(1);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            client.connect().await.unwrap();
            Timer::after(Duration::from_millis(20)).await;
            assert!(sent.borrow().iter().any(|(op, data)| *op == Opcode::Pong && data == b"hi"));
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn oversize_ping_is_truncated_to_buffer_size() {
        let resources: Resources<8, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let mut transport = MockTransport::new();
        transport.frames.push((Opcode::Ping, StdVec::from([b'A'; 20])));
        let sent = transport.sent.clone();
        let config = Config::new("example.com")
            .with_poll_timeout_ms(1)
            .with_buffer_size(8);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            client.connect().await.unwrap();
            Timer::after(Duration::from_millis(20)).await;
            let sent = sent.borrow();
            let pong = sent.iter().find(|(op, _)| *op == Opcode::Pong).unwrap();
            assert_eq!(pong.1.len(), 8);
            assert!(pong.1.iter().all(|&b| b == b'A'));
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn mid_session_loss_recovers_with_reconnecting_then_reconnected() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, events) = recorder();
        let mut transport = MockTransport::new();
        *transport.fail_reads.borrow_mut() = 1;
        let config = Config::new("example.com")
            .with_poll_timeout_ms(1)
            .with_retry_interval_ms(1)
            .with_reconnection_attempts(5);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            client.connect().await.unwrap();
            // first poll tick observes the injected read failure and starts a recovery episode.
            Timer::after(Duration::from_millis(30)).await;
            assert_eq!(events.borrow().as_slice(), &[Event::Reconnecting, Event::Reconnected]);
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn connect_budget_exhausted_surfaces_error() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let mut transport = MockTransport::new();
        // connect_results is popped (LIFO); two failures then we never reach a third attempt.
        transport.connect_results = alloc_vec_err(3);
        let config = Config::new("example.com")
            .with_connection_attempts(2)
            .with_retry_interval_ms(1);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            let result = client.connect().await;
            assert_eq!(result, Err(Error::ConnectBudgetExhausted));
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    #[tokio::test]
    async fn second_connect_while_connecting_cancels_the_first() {
        let resources: Resources<64, 4> = Resources::new();
        let (handler, _data, _events) = recorder();
        let mut transport = MockTransport::new();
        // Popped LIFO: the first dial (driven by `first`) fails, then the second dial (driven by
        // the preempting `second`) succeeds.
        transport.connect_results = StdVec::from([Ok(()), Err(())]);
        let config = Config::new("example.com")
            .with_connection_attempts(5)
            .with_retry_interval_ms(60_000);
        let (client, mut runner) = crate::client::new(&resources, transport, config, handler).unwrap();

        let run_fut = async { runner.run().await };
        let test_fut = async {
            let first = client.connect();
            let second = client.connect();
            let (first_result, second_result) = embassy_futures::join::join(first, second).await;
            assert_eq!(first_result, Err(Error::Cancelled));
            assert_eq!(second_result, Ok(()));
        };

        embassy_futures::select::select(run_fut, test_fut).await;
    }

    fn alloc_vec_err(n: usize) -> StdVec<Result<(), ()>> {
        let mut v = StdVec::new();
        for _ in 0..n {
            v.push(Err(()));
        }
        v
    }
}
