//! Error types for the email builder.
//!
//! Errors carry a kind for programmatic matching, a human-readable message
//! and an optional underlying cause.

use std::fmt;
use thiserror::Error;

/// Result type for email operations.
pub type EmailResult<T> = Result<T, EmailError>;

/// Email error kinds categorizing different failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailErrorKind {
    // Input errors
    /// An argument was empty or malformed (address, header, charset, content type).
    InvalidArgument,
    /// A value required to build or send the message is missing.
    MissingConfiguration,

    // Lifecycle errors
    /// The MIME message was already built for this email.
    AlreadyBuilt,
    /// The MIME message has not been built yet.
    NotBuilt,

    // Encoding errors
    /// Text could not be represented in the selected charset.
    EncodingFailed,

    // Configuration errors
    /// Session configuration is invalid.
    ConfigurationInvalid,

    // Transport errors
    /// The transport failed to hand off the message.
    TransportFailed,
}

impl EmailErrorKind {
    /// Returns true if this error kind is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmailErrorKind::TransportFailed)
    }

    /// Returns the severity level of this error kind.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EmailErrorKind::ConfigurationInvalid => ErrorSeverity::Critical,

            EmailErrorKind::InvalidArgument
            | EmailErrorKind::MissingConfiguration
            | EmailErrorKind::EncodingFailed
            | EmailErrorKind::NotBuilt => ErrorSeverity::Error,

            EmailErrorKind::TransportFailed => ErrorSeverity::Warning,

            EmailErrorKind::AlreadyBuilt => ErrorSeverity::Info,
        }
    }
}

impl fmt::Display for EmailErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            EmailErrorKind::MissingConfiguration => write!(f, "Missing configuration"),
            EmailErrorKind::AlreadyBuilt => write!(f, "Message already built"),
            EmailErrorKind::NotBuilt => write!(f, "Message not built"),
            EmailErrorKind::EncodingFailed => write!(f, "Encoding failed"),
            EmailErrorKind::ConfigurationInvalid => write!(f, "Invalid configuration"),
            EmailErrorKind::TransportFailed => write!(f, "Transport failed"),
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - caller misuse with no lasting effect.
    Info,
    /// Warning - temporary issue, may recover.
    Warning,
    /// Error - operation failed.
    Error,
    /// Critical - requires immediate attention.
    Critical,
}

/// Email error with detailed information.
#[derive(Error, Debug)]
pub struct EmailError {
    kind: EmailErrorKind,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EmailError {
    /// Creates a new email error.
    pub fn new(kind: EmailErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> EmailErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        self.kind.severity()
    }

    // Convenience constructors

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(EmailErrorKind::InvalidArgument, message)
    }

    /// Creates a missing configuration error.
    pub fn missing_configuration(message: impl Into<String>) -> Self {
        Self::new(EmailErrorKind::MissingConfiguration, message)
    }

    /// Creates an already-built error.
    pub fn already_built() -> Self {
        Self::new(
            EmailErrorKind::AlreadyBuilt,
            "The MimeMessage is already built; reset it before changing the email",
        )
    }

    /// Creates a not-built error.
    pub fn not_built() -> Self {
        Self::new(EmailErrorKind::NotBuilt, "The MimeMessage has not been created yet")
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(EmailErrorKind::EncodingFailed, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(EmailErrorKind::ConfigurationInvalid, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(EmailErrorKind::TransportFailed, message)
    }
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::configuration(format!("Malformed configuration: {}", err)).with_cause(err)
    }
}
