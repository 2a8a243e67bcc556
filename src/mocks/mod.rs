//! Mock implementations for testing.
//!
//! Provides a recording transport and ready-made emails.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::email::Email;
use crate::errors::{EmailError, EmailResult};
use crate::message::MimeMessage;
use crate::transport::{Envelope, MailTransport, SendResult};

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// The built message.
    pub message: MimeMessage,
    /// The envelope it was sent with.
    pub envelope: Envelope,
    /// The dot-stuffed DATA payload.
    pub data: Vec<u8>,
}

/// Mock transport that records every message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_next: Arc<Mutex<Option<EmailError>>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the next send to fail.
    pub fn fail_next_with(&self, error: EmailError) -> &Self {
        *self.fail_next.lock().unwrap() = Some(error);
        self
    }

    /// Returns every recorded message.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the most recently recorded message.
    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Returns the number of recorded messages.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Clears recorded data.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        *self.fail_next.lock().unwrap() = None;
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, message: &MimeMessage, envelope: &Envelope) -> EmailResult<SendResult> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        let data = crate::message::MimeEncoder::prepare_data_content(message.as_bytes());
        self.sent.lock().unwrap().push(SentMessage {
            message: message.clone(),
            envelope: envelope.clone(),
            data,
        });

        Ok(SendResult {
            message_id: message.message_id().to_string(),
            accepted: envelope.recipients.clone(),
            response: "250 OK: queued".to_string(),
            duration: Duration::ZERO,
        })
    }
}

/// Creates an email with host and sender set, ready to build.
pub fn test_email() -> EmailResult<Email> {
    let mut email = Email::new();
    email
        .set_host_name("hostname")?
        .set_from("fromAddress@mail.com")?
        .add_cc("abc@de.com")?;
    Ok(email)
}

/// Creates a fully populated email.
pub fn test_email_full() -> EmailResult<Email> {
    let mut email = test_email()?;
    email
        .add_to("jake@yahoo.com")?
        .add_bcc("emma@il.com")?
        .add_reply_to("format@example.net")?
        .set_subject("Important Test")?
        .set_charset("US-ASCII")?
        .set_content("Hello from the builder", "text/plain")?
        .add_header("X-Mailer", "integrations-email")?;
    Ok(email)
}
