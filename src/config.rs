use crate::error::Error;

/// Transport mode: which transport the [`crate::Runner`] is expected to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// TLS, verifying the server's certificate chain and its CN/SAN.
    Secure,
    /// TLS, verifying the server's certificate chain but skipping the CN/SAN check.
    SecureTest,
    /// Plain TCP, no TLS.
    Insecure,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Secure
    }
}

const DEFAULT_USER_AGENT: &str = "aos-ws-client";

/// Websocket client configuration.
///
/// All string fields borrow from the caller for `'d`; the caller is responsible for keeping
/// them alive for as long as the [`crate::Client`]/[`crate::Runner`] pair built from this
/// config is in use.
#[derive(Debug, Clone, Copy)]
pub struct Config<'d> {
    pub(crate) host: &'d str,
    pub(crate) path: &'d str,
    pub(crate) mode: Mode,
    pub(crate) port: Option<u16>,
    pub(crate) subprotocol: Option<&'d str>,
    pub(crate) user_agent: &'d str,
    pub(crate) headers: Option<&'d str>,
    pub(crate) server_cert_chain_pem: Option<&'d str>,
    pub(crate) client_cert_chain_pem: Option<&'d str>,
    pub(crate) client_key_pem: Option<&'d str>,
    pub(crate) connection_attempts: Option<u32>,
    pub(crate) reconnection_attempts: Option<u32>,
    pub(crate) retry_interval_ms: Option<u32>,
    pub(crate) send_timeout_ms: Option<u32>,
    pub(crate) poll_timeout_ms: Option<u32>,
    pub(crate) buffer_size: Option<usize>,
}

impl<'d> Config<'d> {
    /// Start a configuration for `host`. All other fields take their documented defaults
    /// until overridden with the `with_*` builder methods.
    pub fn new(host: &'d str) -> Self {
        Self {
            host,
            path: "/",
            mode: Mode::Secure,
            port: None,
            subprotocol: None,
            user_agent: DEFAULT_USER_AGENT,
            headers: None,
            server_cert_chain_pem: None,
            client_cert_chain_pem: None,
            client_key_pem: None,
            connection_attempts: None,
            reconnection_attempts: None,
            retry_interval_ms: None,
            send_timeout_ms: None,
            poll_timeout_ms: None,
            buffer_size: None,
        }
    }

    pub fn with_path(self, path: &'d str) -> Self {
        Self { path, ..self }
    }

    pub fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    /// `port == 0` is treated as "use the default", matching the convention that 0 is never
    /// a valid WebSocket port.
    pub fn with_port(self, port: u16) -> Self {
        Self {
            port: if port == 0 { None } else { Some(port) },
            ..self
        }
    }

    pub fn with_subprotocol(self, subprotocol: &'d str) -> Self {
        Self {
            subprotocol: Some(subprotocol),
            ..self
        }
    }

    pub fn with_user_agent(self, user_agent: &'d str) -> Self {
        Self { user_agent, ..self }
    }

    pub fn with_headers(self, headers: &'d str) -> Self {
        Self {
            headers: Some(headers),
            ..self
        }
    }

    pub fn with_server_cert_chain_pem(self, pem: &'d str) -> Self {
        Self {
            server_cert_chain_pem: Some(pem),
            ..self
        }
    }

    pub fn with_client_cert_chain_pem(self, pem: &'d str) -> Self {
        Self {
            client_cert_chain_pem: Some(pem),
            ..self
        }
    }

    pub fn with_client_key_pem(self, pem: &'d str) -> Self {
        Self {
            client_key_pem: Some(pem),
            ..self
        }
    }

    pub fn with_connection_attempts(self, attempts: u32) -> Self {
        Self {
            connection_attempts: Some(attempts),
            ..self
        }
    }

    pub fn with_reconnection_attempts(self, attempts: u32) -> Self {
        Self {
            reconnection_attempts: Some(attempts),
            ..self
        }
    }

    pub fn with_retry_interval_ms(self, ms: u32) -> Self {
        Self {
            retry_interval_ms: Some(ms),
            ..self
        }
    }

    pub fn with_send_timeout_ms(self, ms: u32) -> Self {
        Self {
            send_timeout_ms: Some(ms),
            ..self
        }
    }

    pub fn with_poll_timeout_ms(self, ms: u32) -> Self {
        Self {
            poll_timeout_ms: Some(ms),
            ..self
        }
    }

    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self {
            buffer_size: Some(buffer_size),
            ..self
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.host.is_empty() {
            return Err(Error::Config);
        }
        Ok(())
    }

    pub(crate) fn port(&self) -> u16 {
        self.port.unwrap_or(443)
    }

    pub(crate) fn connection_attempts(&self) -> u32 {
        self.connection_attempts.unwrap_or(3)
    }

    pub(crate) fn reconnection_attempts(&self) -> u32 {
        self.reconnection_attempts.unwrap_or(u32::MAX)
    }

    pub(crate) fn retry_interval_ms(&self) -> u32 {
        self.retry_interval_ms.unwrap_or(3000)
    }

    pub(crate) fn send_timeout_ms(&self) -> u32 {
        self.send_timeout_ms.unwrap_or(3000)
    }

    pub(crate) fn poll_timeout_ms(&self) -> u32 {
        self.poll_timeout_ms.unwrap_or(100)
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(1024)
    }
}
