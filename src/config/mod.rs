//! Mail session configuration.
//!
//! The builder never opens a connection itself. These settings are stored
//! on the email, frozen into the built message and handed to whichever
//! transport delivers it.

use std::path::Path;
use std::time::Duration;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::{EmailError, EmailResult};

/// Default SMTP port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default SMTP-over-SSL port.
pub const DEFAULT_SSL_SMTP_PORT: u16 = 465;

/// Default socket I/O timeout in milliseconds.
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 60_000;

/// Default socket I/O timeout.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(DEFAULT_SOCKET_TIMEOUT_MS);

/// Default socket connection timeout.
pub const DEFAULT_SOCKET_CONNECTION_TIMEOUT: Duration =
    Duration::from_millis(DEFAULT_SOCKET_TIMEOUT_MS);

/// Transport security settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Upgrade the connection with STARTTLS when the server offers it.
    #[serde(default)]
    pub start_tls_enabled: bool,
    /// Refuse to send unless STARTTLS succeeds.
    #[serde(default)]
    pub start_tls_required: bool,
    /// Open the connection over SSL/TLS directly (uses the SSL port).
    #[serde(default)]
    pub ssl_on_connect: bool,
    /// Verify the server identity against its certificate.
    #[serde(default)]
    pub ssl_check_server_identity: bool,
}

/// Session settings for the external transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// SMTP server hostname.
    pub host_name: Option<String>,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP-over-SSL server port.
    #[serde(default = "default_ssl_smtp_port")]
    pub ssl_smtp_port: u16,
    /// Socket read/write timeout.
    #[serde(default = "default_socket_timeout", with = "humantime_serde")]
    pub socket_timeout: Duration,
    /// Socket connection timeout.
    #[serde(default = "default_socket_connection_timeout", with = "humantime_serde")]
    pub socket_connection_timeout: Duration,
    /// Transport security.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Authentication username.
    pub username: Option<String>,
    /// Authentication password (serialization skipped for security).
    #[serde(skip)]
    pub password: Option<SecretString>,
    /// Ask the transport for protocol-level debug output.
    #[serde(default)]
    pub debug: bool,
}

fn default_smtp_port() -> u16 { DEFAULT_SMTP_PORT }
fn default_ssl_smtp_port() -> u16 { DEFAULT_SSL_SMTP_PORT }
fn default_socket_timeout() -> Duration { DEFAULT_SOCKET_TIMEOUT }
fn default_socket_connection_timeout() -> Duration { DEFAULT_SOCKET_CONNECTION_TIMEOUT }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_name: None,
            smtp_port: DEFAULT_SMTP_PORT,
            ssl_smtp_port: DEFAULT_SSL_SMTP_PORT,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            socket_connection_timeout: DEFAULT_SOCKET_CONNECTION_TIMEOUT,
            security: SecurityConfig::default(),
            username: None,
            password: None,
            debug: false,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parses configuration from JSON.
    pub fn from_json(json: &str) -> EmailResult<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> EmailResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EmailError::configuration(format!("Cannot read {}", path.display())).with_cause(e)
        })?;
        Self::from_json(&json)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EmailResult<()> {
        if let Some(host) = &self.host_name {
            if host.trim().is_empty() {
                return Err(EmailError::configuration("Host name cannot be blank"));
            }
        }

        if self.smtp_port == 0 || self.ssl_smtp_port == 0 {
            return Err(EmailError::configuration("Port must be non-zero"));
        }

        if self.security.start_tls_required && !self.security.start_tls_enabled {
            return Err(EmailError::configuration(
                "start_tls_required needs start_tls_enabled",
            ));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(EmailError::configuration("Password set without a username"));
        }

        Ok(())
    }

    /// Returns the port the transport should connect to.
    pub fn effective_port(&self) -> u16 {
        if self.security.ssl_on_connect {
            self.ssl_smtp_port
        } else {
            self.smtp_port
        }
    }

    /// Returns the `host:port` address, if a host is configured.
    pub fn address(&self) -> Option<String> {
        self.host_name
            .as_ref()
            .map(|host| format!("{}:{}", host, self.effective_port()))
    }

    /// Returns true if authentication is configured.
    pub fn has_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Builder for session configuration.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Sets the SMTP server host.
    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.config.host_name = Some(host.into());
        self
    }

    /// Sets the SMTP port.
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.config.smtp_port = port;
        self
    }

    /// Sets the SMTP-over-SSL port.
    pub fn ssl_smtp_port(mut self, port: u16) -> Self {
        self.config.ssl_smtp_port = port;
        self
    }

    /// Sets the socket read/write timeout.
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_timeout = timeout;
        self
    }

    /// Sets the socket connection timeout.
    pub fn socket_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_connection_timeout = timeout;
        self
    }

    /// Sets the security configuration.
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// Sets authentication credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(SecretString::new(password.into()));
        self
    }

    /// Enables transport debug output.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EmailResult<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EmailErrorKind;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert!(config.host_name.is_none());
        assert_eq!(config.smtp_port, 25);
        assert_eq!(config.ssl_smtp_port, 465);
        assert_eq!(config.socket_connection_timeout.as_millis(), 60_000);
        assert_eq!(config.socket_timeout.as_millis(), 60_000);
        assert!(!config.security.ssl_on_connect);
        assert!(config.address().is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder()
            .host_name("smtp.example.com")
            .smtp_port(587)
            .credentials("user", "pass")
            .build()
            .unwrap();

        assert_eq!(config.address().as_deref(), Some("smtp.example.com:587"));
        assert!(config.has_auth());
    }

    #[test]
    fn test_effective_port_follows_ssl() {
        let config = SessionConfig::builder()
            .host_name("smtp.example.com")
            .security(SecurityConfig {
                ssl_on_connect: true,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(config.effective_port(), DEFAULT_SSL_SMTP_PORT);
    }

    #[test]
    fn test_config_validation() {
        let result = SessionConfig::builder().host_name("  ").build();
        assert!(result.is_err());

        let result = SessionConfig::builder().smtp_port(0).build();
        assert_eq!(result.unwrap_err().kind(), EmailErrorKind::ConfigurationInvalid);

        let result = SessionConfig::builder()
            .security(SecurityConfig {
                start_tls_required: true,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = SessionConfig::from_json(
            r#"{"host_name": "mail.example.org", "socket_connection_timeout": "5s"}"#,
        )
        .unwrap();
        assert_eq!(config.host_name.as_deref(), Some("mail.example.org"));
        assert_eq!(config.socket_connection_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_timeout, DEFAULT_SOCKET_TIMEOUT);

        let err = SessionConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::ConfigurationInvalid);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host_name": "relay.local", "smtp_port": 2525}}"#).unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.address().as_deref(), Some("relay.local:2525"));

        assert!(SessionConfig::from_file("/nonexistent/session.json").is_err());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let config = SessionConfig::builder()
            .credentials("user", "hunter2")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"socket_timeout\":\"1m\""));
    }
}
