//! Transport seam.
//!
//! Delivery is performed by an external mail transport. This module defines
//! what such a transport receives and returns.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::errors::{EmailError, EmailResult};
use crate::message::MimeMessage;
use crate::types::Address;

/// SMTP envelope derived from a built message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope sender (bounce address or From).
    pub from: Address,
    /// Envelope recipients (to + cc + bcc), in that order.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Builds the envelope for a message.
    ///
    /// Fails when the message has no recipient at all.
    pub fn from_message(message: &MimeMessage) -> EmailResult<Self> {
        let recipients: Vec<Address> = message.recipients().cloned().collect();
        if recipients.is_empty() {
            return Err(EmailError::missing_configuration(
                "At least one receiver address required",
            ));
        }
        Ok(Self {
            from: message.envelope_from().clone(),
            recipients,
        })
    }
}

/// Result of handing a message to a transport.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Message ID of the delivered message.
    pub message_id: String,
    /// Recipients accepted by the transport.
    pub accepted: Vec<Address>,
    /// Transport response text.
    pub response: String,
    /// Hand-off duration.
    pub duration: Duration,
}

/// A mail transport that delivers built messages.
#[async_trait]
pub trait MailTransport: Send + Sync + fmt::Debug {
    /// Delivers the message to the envelope recipients.
    async fn send(&self, message: &MimeMessage, envelope: &Envelope) -> EmailResult<SendResult>;
}
