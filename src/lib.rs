//! # Email Integration Library
//!
//! A mutable email builder that produces immutable, transport-ready MIME
//! messages:
//! - Sender, to/cc/bcc/reply-to recipients with address validation
//! - Ordered custom headers (duplicate names are kept)
//! - Subject, charset and content with RFC 2047 / RFC 5322 rendering
//! - Session settings (host, ports, timeouts, TLS flags) for the transport
//! - A one-shot `build_mime_message` step
//!
//! ## Quick Start
//!
//! ```rust
//! use integrations_email::{Email, EmailResult};
//!
//! fn main() -> EmailResult<()> {
//!     let mut email = Email::new();
//!     email
//!         .set_host_name("smtp.example.com")?
//!         .set_from("sender@example.com")?
//!         .add_to("recipient@example.com")?
//!         .set_subject("Hello from Rust!")?
//!         .set_content("This is a test email.", "text/plain")?;
//!
//!     let message = email.build_mime_message()?;
//!     assert!(message.size() > 0);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Builder
pub mod email;

// Rendering
pub mod message;

// Transport seam
pub mod transport;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use config::{SecurityConfig, SessionConfig, SessionConfigBuilder};
pub use email::Email;
pub use errors::{EmailError, EmailErrorKind, EmailResult, ErrorSeverity};
pub use message::{MimeEncoder, MimeMessage, TransferEncoding};
pub use observability::{EmailMetrics, MetricsSnapshot};
pub use transport::{Envelope, MailTransport, SendResult};
pub use types::{Address, Charset, Content, Headers};
