use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::frame::{Command, Frame};
use crate::id::{IdGenerator, SequentialIds};

/// Protocol version requested when the caller does not pick one.
pub const DEFAULT_ACCEPT_VERSION: &str = "1.1";

/// Connection-level settings.
///
/// Build with `ConnectionConfig::default()` and the `with_*` methods:
///
/// ```ignore
/// let config = ConnectionConfig::new("broker.local", 61613)
///     .with_response_timeout(Duration::from_secs(2));
/// ```
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// How long a request waits for its reply.
    pub response_timeout: Duration,
    /// Deadline for a single transport read. Expiry is not an error; it only
    /// bounds how long the reader goes without checking for shutdown.
    pub read_timeout: Duration,
    /// Capacity of the outbound queue feeding the writer.
    pub queue_capacity: usize,
    /// Capacity of each subscription's delivery queue.
    pub delivery_capacity: usize,
    /// Capacity of the queue holding unsolicited inbound frames.
    pub inbound_capacity: usize,
    /// Capacity of the error queue. Errors beyond it are logged and dropped.
    pub error_capacity: usize,
    /// Largest inbound frame accepted by the reader.
    pub max_frame_size: usize,
    pub id_generator: Arc<dyn IdGenerator>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `host:port` of the broker.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_delivery_capacity(mut self, capacity: usize) -> Self {
        self.delivery_capacity = capacity.max(1);
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    pub fn with_error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity.max(1);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 61613,
            response_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(100),
            queue_capacity: 32,
            delivery_capacity: 16,
            inbound_capacity: 32,
            error_capacity: 64,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            id_generator: Arc::new(SequentialIds::default()),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("response_timeout", &self.response_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("delivery_capacity", &self.delivery_capacity)
            .field("inbound_capacity", &self.inbound_capacity)
            .field("error_capacity", &self.error_capacity)
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

/// Headers for the CONNECT frame.
///
/// Every field is optional. `accept-version` falls back to
/// `DEFAULT_ACCEPT_VERSION` and `host` to the configured broker host.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub accept_version: Option<String>,
    pub host: Option<String>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Durable client identity (`client-id`, used by ActiveMQ).
    pub client_id: Option<String>,
    /// Additional headers, applied last.
    pub headers: Vec<(String, String)>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_version(mut self, version: impl Into<String>) -> Self {
        self.accept_version = Some(version.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Build the CONNECT frame. Custom headers override the typed fields;
    /// defaults only fill headers that are still missing.
    pub(crate) fn into_frame(self, default_host: &str) -> Frame {
        let mut frame = Frame::new(Command::Connect);
        let typed = [
            ("accept-version", self.accept_version),
            ("host", self.host),
            ("login", self.login),
            ("passcode", self.passcode),
            ("client-id", self.client_id),
        ];
        for (key, value) in typed {
            if let Some(value) = value {
                frame.set_header(key, value);
            }
        }
        for (key, value) in self.headers {
            frame.set_header(key, value);
        }
        if !frame.has_header("accept-version") {
            frame.set_header("accept-version", DEFAULT_ACCEPT_VERSION);
        }
        if !frame.has_header("host") {
            frame.set_header("host", default_host);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_connect_headers() {
        let f = ConnectOptions::new().into_frame("broker.local");
        assert_eq!(f.command, Command::Connect);
        assert_eq!(f.get_header("accept-version"), Some("1.1"));
        assert_eq!(f.get_header("host"), Some("broker.local"));
        assert!(!f.has_header("login"));
    }

    #[test]
    fn caller_headers_are_kept() {
        let f = ConnectOptions::new()
            .accept_version("1.2")
            .credentials("guest", "secret")
            .client_id("c-1")
            .header("host", "/vhost")
            .into_frame("ignored");
        assert_eq!(f.get_header("accept-version"), Some("1.2"));
        assert_eq!(f.get_header("login"), Some("guest"));
        assert_eq!(f.get_header("passcode"), Some("secret"));
        assert_eq!(f.get_header("client-id"), Some("c-1"));
        assert_eq!(f.get_header("host"), Some("/vhost"));
    }

    #[test]
    fn config_builder() {
        let c = ConnectionConfig::new("mq", 1234)
            .with_response_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_millis(5))
            .with_queue_capacity(8)
            .with_delivery_capacity(0)
            .with_inbound_capacity(4)
            .with_error_capacity(0)
            .with_max_frame_size(512);
        assert_eq!(c.addr(), "mq:1234");
        assert_eq!(c.response_timeout, Duration::from_secs(1));
        assert_eq!(c.read_timeout, Duration::from_millis(5));
        assert_eq!(c.queue_capacity, 8);
        assert_eq!(c.delivery_capacity, 1);
        assert_eq!(c.inbound_capacity, 4);
        assert_eq!(c.error_capacity, 1);
        assert_eq!(c.max_frame_size, 512);
        assert!(format!("{:?}", c).contains("mq"));
    }
}
