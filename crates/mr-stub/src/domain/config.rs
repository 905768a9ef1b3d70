//! Stub configuration with validation.
//!
//! Values come from defaults, then the process environment
//! ([`StubConfig::from_env`]), then command-line overrides applied in `main`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming the upstream topic the downloader reads from.
pub const ENV_TOPIC_READ: &str = "TOPIC_READ";
/// Environment variable naming the upstream topic the uploader writes to.
pub const ENV_TOPIC_WRITE: &str = "TOPIC_WRITE";
/// Environment variable naming the base URL generic topics are uploaded to.
pub const ENV_GENERIC_UPLOAD_BASEURL: &str = "GENERIC_TOPICS_UPLOAD_BASEURL";
/// Bind address override.
pub const ENV_HOST: &str = "MR_STUB_HOST";
/// Bind port override.
pub const ENV_PORT: &str = "MR_STUB_PORT";
/// HTTPS port override.
pub const ENV_TLS_PORT: &str = "MR_STUB_TLS_PORT";
/// PEM certificate chain for the HTTPS listener.
pub const ENV_TLS_CERT: &str = "MR_STUB_TLS_CERT";
/// PEM private key for the HTTPS listener.
pub const ENV_TLS_KEY: &str = "MR_STUB_TLS_KEY";

/// Certificate picked up when no TLS paths are configured
pub const DEFAULT_CERT_PATH: &str = "cert/cert.crt";
/// Key picked up when no TLS paths are configured
pub const DEFAULT_KEY_PATH: &str = "cert/key.crt";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bridge mode needs both TOPIC_READ and TOPIC_WRITE, only {0} is set")]
    IncompleteBridge(&'static str),
    #[error("invalid url for {name}: {url}")]
    InvalidUrl { name: &'static str, url: String },
    #[error("read and write topics must differ, both are '{0}'")]
    SameTopics(String),
    #[error("invalid topic name: '{0}'")]
    InvalidTopic(String),
    #[error("invalid poll setting: {0}")]
    InvalidPoll(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("https needs both a certificate and a key, only the {0} is set")]
    IncompleteTls(&'static str),
    #[error("http and https cannot share port {0}")]
    SamePorts(u16),
}

/// Main stub configuration
#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Fixed topic names of the command/response channel
    pub topics: TopicsConfig,
    /// Long-poll parameters
    pub poll: PollConfig,
    /// Upstream relay (bridge mode)
    pub bridge: BridgeConfig,
    /// Optional HTTPS listener
    pub tls: TlsConfig,
}

impl StubConfig {
    /// Defaults overridden by whatever is present in the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var(ENV_HOST) {
            match host.parse() {
                Ok(h) => config.http.host = h,
                Err(_) => warn!(value = %host, "Ignoring unparsable {}", ENV_HOST),
            }
        }
        if let Ok(port) = std::env::var(ENV_PORT) {
            match port.parse() {
                Ok(p) => config.http.port = p,
                Err(_) => warn!(value = %port, "Ignoring unparsable {}", ENV_PORT),
            }
        }

        if let Ok(port) = std::env::var(ENV_TLS_PORT) {
            match port.parse() {
                Ok(p) => config.tls.port = p,
                Err(_) => warn!(value = %port, "Ignoring unparsable {}", ENV_TLS_PORT),
            }
        }
        config.tls.cert_path = non_empty_env(ENV_TLS_CERT).map(PathBuf::from);
        config.tls.key_path = non_empty_env(ENV_TLS_KEY).map(PathBuf::from);
        if config.tls.cert_path.is_none() && config.tls.key_path.is_none() {
            config.tls = config.tls.with_default_files();
        }

        config.bridge.read_url = non_empty_env(ENV_TOPIC_READ);
        config.bridge.write_url = non_empty_env(ENV_TOPIC_WRITE);
        config.bridge.upload_base_url = non_empty_env(ENV_GENERIC_UPLOAD_BASEURL);

        if config.bridge.commands_bridged() {
            info!("Loaded upstream read/write topics from environment");
        }
        if config.bridge.uploads_topics() {
            info!("Loaded generic topic upload base url from environment");
        }
        if config.tls.is_enabled() {
            info!(port = config.tls.port, "HTTPS listener enabled");
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.bridge.read_url, &self.bridge.write_url) {
            (Some(_), None) => return Err(ConfigError::IncompleteBridge(ENV_TOPIC_READ)),
            (None, Some(_)) => return Err(ConfigError::IncompleteBridge(ENV_TOPIC_WRITE)),
            _ => {}
        }

        let urls = [
            (ENV_TOPIC_READ, &self.bridge.read_url),
            (ENV_TOPIC_WRITE, &self.bridge.write_url),
            (ENV_GENERIC_UPLOAD_BASEURL, &self.bridge.upload_base_url),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if reqwest::Url::parse(url).is_err() {
                    return Err(ConfigError::InvalidUrl {
                        name,
                        url: url.clone(),
                    });
                }
            }
        }

        for topic in [&self.topics.read, &self.topics.write] {
            if topic.is_empty() || topic.contains('/') {
                return Err(ConfigError::InvalidTopic(topic.clone()));
            }
        }
        if self.topics.read == self.topics.write {
            return Err(ConfigError::SameTopics(self.topics.read.clone()));
        }

        if self.poll.interval.is_zero() {
            return Err(ConfigError::InvalidPoll("interval cannot be 0".into()));
        }
        if self.poll.default_timeout > self.poll.max_timeout {
            return Err(ConfigError::InvalidPoll(
                "default timeout exceeds max timeout".into(),
            ));
        }

        if self.http.max_body_size == 0 {
            return Err(ConfigError::InvalidLimit("max_body_size cannot be 0".into()));
        }

        match (&self.tls.cert_path, &self.tls.key_path) {
            (Some(_), None) => return Err(ConfigError::IncompleteTls("certificate")),
            (None, Some(_)) => return Err(ConfigError::IncompleteTls("key")),
            _ => {}
        }
        if self.tls.is_enabled() && self.tls.port != 0 && self.tls.port == self.http.port {
            return Err(ConfigError::SamePorts(self.tls.port));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// HTTPS listener address; same host as HTTP
    pub fn tls_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.tls.port)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3905, the message-router plain HTTP port)
    pub port: u16,
    /// Max request body size in bytes (default: 8MB)
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3905,
            max_body_size: 8 * 1024 * 1024,
        }
    }
}

/// Topic names of the command/response channel.
#[derive(Debug, Clone)]
pub struct TopicsConfig {
    /// Topic the consumer long-polls for commands
    pub read: String,
    /// Topic the consumer posts responses to
    pub write: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            read: "A1-POLICY-AGENT-READ".to_string(),
            write: "A1-POLICY-AGENT-WRITE".to_string(),
        }
    }
}

/// Long-poll configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between attempts on an empty queue
    pub interval: Duration,
    /// Timeout used when the caller gives none
    pub default_timeout: Duration,
    /// Upper clamp for caller timeouts
    pub max_timeout: Duration,
    /// Upper clamp for the message count limit (also the default)
    pub max_limit: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(25),
            default_timeout: Duration::from_millis(10_000),
            max_timeout: Duration::from_millis(60_000),
            max_limit: 4096,
        }
    }
}

/// Upstream relay configuration. Immutable once the service starts.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upstream URL responses are downloaded from
    pub read_url: Option<String>,
    /// Upstream URL commands are uploaded to
    pub write_url: Option<String>,
    /// Base URL generic topic messages are uploaded to
    pub upload_base_url: Option<String>,
    /// Wait after a failed upstream call
    pub retry_backoff: Duration,
    /// Wait when there is nothing to relay
    pub idle_interval: Duration,
    /// Per-call timeout for upstream requests
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            read_url: None,
            write_url: None,
            upload_base_url: None,
            retry_backoff: Duration::from_secs(1),
            idle_interval: Duration::from_millis(10),
            request_timeout: Duration::from_secs(70),
        }
    }
}

impl BridgeConfig {
    /// Command queue and response map are relayed to an upstream broker.
    pub fn commands_bridged(&self) -> bool {
        self.read_url.is_some() && self.write_url.is_some()
    }

    /// Generic topic writes are uploaded instead of served locally.
    pub fn uploads_topics(&self) -> bool {
        self.upload_base_url.is_some()
    }

    /// Any relay loop needs to run.
    pub fn is_active(&self) -> bool {
        self.commands_bridged() || self.uploads_topics()
    }
}

/// HTTPS listener. Serves the same routes as HTTP when both PEM paths are set.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub port: u16,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            port: 3906,
            cert_path: None,
            key_path: None,
        }
    }
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }

    /// Use `cert/cert.crt` and `cert/key.crt` when both exist.
    pub fn with_default_files(self) -> Self {
        self.with_files_in(Path::new("."))
    }

    fn with_files_in(mut self, dir: &Path) -> Self {
        let cert = dir.join(DEFAULT_CERT_PATH);
        let key = dir.join(DEFAULT_KEY_PATH);
        if cert.is_file() && key.is_file() {
            self.cert_path = Some(cert);
            self.key_path = Some(key);
        }
        self
    }
}
