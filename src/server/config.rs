//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::protocol::constants::{DEFAULT_SERVER_NAME, DEFAULT_SESSION_TIMEOUT};

/// Default port for the local playback listener
pub const DEFAULT_LOCAL_PORT: u16 = 1234;

/// Basic credentials requests must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the listener for on-device players
    pub bind_addr: SocketAddr,

    /// Interface address per-peer accepting channels bind to
    pub link_bind_ip: IpAddr,

    /// Required credentials (None = open server)
    pub credentials: Option<Credentials>,

    /// Value of the `Server` header and the auth realm
    pub server_name: String,

    /// Whether DESCRIBE of the local path starts a playback session
    pub allow_live_streaming: bool,

    /// Socket read chunk size
    pub read_buffer_size: usize,

    /// Largest request accepted before answering 400
    pub max_request_size: usize,

    /// Session timeout advertised in `Session` headers
    pub session_timeout: Duration,

    /// Range local RTP/RTCP ports are drawn from
    pub rtp_port_range: RangeInclusive<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_LOCAL_PORT)),
            link_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            credentials: None,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            allow_live_streaming: true,
            read_buffer_size: 64 * 1024, // 64KB
            max_request_size: 64 * 1024,
            session_timeout: Duration::from_secs(u64::from(DEFAULT_SESSION_TIMEOUT)),
            rtp_port_range: 50000..=59999,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the interface address for per-peer channels
    pub fn link_bind_ip(mut self, ip: IpAddr) -> Self {
        self.link_bind_ip = ip;
        self
    }

    /// Require Basic credentials
    ///
    /// An empty username leaves the server open.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        self.credentials = if username.is_empty() {
            None
        } else {
            Some(Credentials {
                username,
                password: password.into(),
            })
        };
        self
    }

    /// Set the server name
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Allow or refuse local playback
    pub fn allow_live_streaming(mut self, allow: bool) -> Self {
        self.allow_live_streaming = allow;
        self
    }

    /// Set the largest accepted request
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size.max(1);
        self
    }

    /// Set the advertised session timeout
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the RTP port range
    pub fn rtp_port_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.rtp_port_range = range;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_LOCAL_PORT);
        assert!(config.bind_addr.ip().is_loopback());
        assert!(config.credentials.is_none());
        assert!(config.link_bind_ip.is_unspecified());
        assert_eq!(config.server_name, DEFAULT_SERVER_NAME);
        assert!(config.allow_live_streaming);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8554".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8554);
    }

    #[test]
    fn test_builder_credentials() {
        let config = ServerConfig::default().credentials("admin", "secret");

        assert_eq!(
            config.credentials,
            Some(Credentials {
                username: "admin".into(),
                password: "secret".into(),
            })
        );
    }

    #[test]
    fn test_empty_username_disables_auth() {
        let config = ServerConfig::default().credentials("", "secret");

        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_builder_max_request_size_floor() {
        let config = ServerConfig::default().max_request_size(0);

        assert_eq!(config.max_request_size, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:1234".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .server_name("Test Server")
            .allow_live_streaming(false)
            .session_timeout(Duration::from_secs(30))
            .rtp_port_range(6000..=6100);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.server_name, "Test Server");
        assert!(!config.allow_live_streaming);
        assert_eq!(config.session_timeout, Duration::from_secs(30));
        assert_eq!(config.rtp_port_range, 6000..=6100);
    }
}
