//! The email builder.
//!
//! `Email` accumulates sender, recipients, headers, subject, charset,
//! content and session settings, then turns them into an immutable
//! [`MimeMessage`] exactly once through [`Email::build_mime_message`].
//! Once built, every mutator fails with `AlreadyBuilt` until
//! [`Email::reset_message`] discards the message.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::errors::{EmailError, EmailResult};
use crate::message::{MimeEncoder, MimeMessage};
use crate::observability::{EmailMetrics, Timer};
use crate::transport::{Envelope, MailTransport, SendResult};
use crate::types::{Address, Charset, Content, Headers};

/// Mutable email under construction.
#[derive(Debug, Default)]
pub struct Email {
    session: SessionConfig,
    from: Option<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    reply_to: Vec<Address>,
    headers: Headers,
    subject: Option<String>,
    charset: Option<Charset>,
    content: Option<Content>,
    sent_date: Option<DateTime<Utc>>,
    bounce_address: Option<Address>,
    message: Option<MimeMessage>,
    metrics: Arc<EmailMetrics>,
}

impl Email {
    /// Creates an empty email with default session settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty email using the given session settings.
    pub fn with_config(config: SessionConfig) -> EmailResult<Self> {
        config.validate()?;
        Ok(Self {
            session: config,
            ..Self::default()
        })
    }

    /// Shares a metrics collector with this email.
    pub fn with_metrics(mut self, metrics: Arc<EmailMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &EmailMetrics {
        &self.metrics
    }

    fn ensure_not_built(&self) -> EmailResult<()> {
        if self.message.is_some() {
            return Err(EmailError::already_built());
        }
        Ok(())
    }

    fn parse_all<I, S>(addresses: I) -> EmailResult<Vec<Address>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = addresses
            .into_iter()
            .map(|a| Address::parse(a.as_ref()))
            .collect::<EmailResult<Vec<_>>>()?;
        if parsed.is_empty() {
            return Err(EmailError::invalid_argument("Address List provided was invalid"));
        }
        Ok(parsed)
    }

    fn collect_list<I>(addresses: I) -> EmailResult<Vec<Address>>
    where
        I: IntoIterator<Item = Address>,
    {
        let list: Vec<Address> = addresses.into_iter().collect();
        if list.is_empty() {
            return Err(EmailError::invalid_argument("Address List provided was invalid"));
        }
        Ok(list)
    }

    // Sender

    /// Sets the sender.
    pub fn set_from(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.from = Some(Address::parse(email)?);
        Ok(self)
    }

    /// Sets the sender with a display name.
    pub fn set_from_named(&mut self, email: &str, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.from = Some(Address::with_name(name, email)?);
        Ok(self)
    }

    /// Returns the sender.
    pub fn from_address(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// Sets the bounce (envelope sender) address.
    pub fn set_bounce_address(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.bounce_address = Some(Address::parse(email)?);
        Ok(self)
    }

    /// Returns the bounce address.
    pub fn bounce_address(&self) -> Option<&Address> {
        self.bounce_address.as_ref()
    }

    // To

    /// Adds a primary recipient.
    pub fn add_to(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.to.push(Address::parse(email)?);
        Ok(self)
    }

    /// Adds a primary recipient with a display name.
    pub fn add_to_named(&mut self, email: &str, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.to.push(Address::with_name(name, email)?);
        Ok(self)
    }

    /// Adds several primary recipients; an empty sequence is rejected.
    pub fn add_to_all<I, S>(&mut self, addresses: I) -> EmailResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_not_built()?;
        let parsed = Self::parse_all(addresses)?;
        self.to.extend(parsed);
        Ok(self)
    }

    /// Replaces the primary recipients.
    pub fn set_to(&mut self, addresses: impl IntoIterator<Item = Address>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.to = Self::collect_list(addresses)?;
        Ok(self)
    }

    /// Returns the primary recipients.
    pub fn to_addresses(&self) -> &[Address] {
        &self.to
    }

    // Cc

    /// Adds a CC recipient.
    pub fn add_cc(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.cc.push(Address::parse(email)?);
        Ok(self)
    }

    /// Adds a CC recipient with a display name.
    pub fn add_cc_named(&mut self, email: &str, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.cc.push(Address::with_name(name, email)?);
        Ok(self)
    }

    /// Adds several CC recipients; an empty sequence is rejected.
    pub fn add_cc_all<I, S>(&mut self, addresses: I) -> EmailResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_not_built()?;
        let parsed = Self::parse_all(addresses)?;
        self.cc.extend(parsed);
        Ok(self)
    }

    /// Replaces the CC recipients.
    pub fn set_cc(&mut self, addresses: impl IntoIterator<Item = Address>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.cc = Self::collect_list(addresses)?;
        Ok(self)
    }

    /// Returns the CC recipients.
    pub fn cc_addresses(&self) -> &[Address] {
        &self.cc
    }

    // Bcc

    /// Adds a BCC recipient.
    pub fn add_bcc(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.bcc.push(Address::parse(email)?);
        Ok(self)
    }

    /// Adds a BCC recipient with a display name.
    pub fn add_bcc_named(&mut self, email: &str, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.bcc.push(Address::with_name(name, email)?);
        Ok(self)
    }

    /// Adds several BCC recipients.
    ///
    /// Fails with `InvalidArgument` when `addresses` is empty or any entry is
    /// invalid; in either case the list is left untouched. Duplicates are kept.
    pub fn add_bcc_all<I, S>(&mut self, addresses: I) -> EmailResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_not_built()?;
        let parsed = Self::parse_all(addresses)?;
        self.bcc.extend(parsed);
        Ok(self)
    }

    /// Replaces the BCC recipients.
    pub fn set_bcc(&mut self, addresses: impl IntoIterator<Item = Address>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.bcc = Self::collect_list(addresses)?;
        Ok(self)
    }

    /// Returns the BCC recipients.
    pub fn bcc_addresses(&self) -> &[Address] {
        &self.bcc
    }

    // Reply-To

    /// Adds a reply-to address.
    pub fn add_reply_to(&mut self, email: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.reply_to.push(Address::parse(email)?);
        Ok(self)
    }

    /// Adds a reply-to address with a display name.
    pub fn add_reply_to_named(&mut self, email: &str, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.reply_to.push(Address::with_name(name, email)?);
        Ok(self)
    }

    /// Replaces the reply-to addresses.
    pub fn set_reply_to(&mut self, addresses: impl IntoIterator<Item = Address>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.reply_to = Self::collect_list(addresses)?;
        Ok(self)
    }

    /// Returns the reply-to addresses.
    pub fn reply_to_addresses(&self) -> &[Address] {
        &self.reply_to
    }

    // Headers

    /// Appends a custom header. Repeated names are kept in insertion order.
    pub fn add_header(&mut self, name: &str, value: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.headers.append(name, value)?;
        Ok(self)
    }

    /// Replaces all custom headers. Nothing changes if any pair is invalid.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> EmailResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_not_built()?;
        let mut replacement = Headers::new();
        for (name, value) in headers {
            replacement.append(name, value)?;
        }
        self.headers = replacement;
        Ok(self)
    }

    /// Returns the custom headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    // Subject, charset and content

    /// Sets the subject. Line breaks are replaced by spaces.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        let subject: String = subject.into();
        self.subject = Some(subject.replace("\r\n", " ").replace(['\r', '\n'], " "));
        Ok(self)
    }

    /// Returns the subject.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the charset by name (e.g. "US-ASCII").
    pub fn set_charset(&mut self, name: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.charset = Some(Charset::from_name(name)?);
        Ok(self)
    }

    /// Returns the explicitly configured charset.
    pub fn charset(&self) -> Option<Charset> {
        self.charset
    }

    /// Sets the body and its content type.
    ///
    /// A `charset` parameter in the content type is adopted when no charset
    /// has been set explicitly.
    pub fn set_content(&mut self, body: impl Into<String>, content_type: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        let content = Content::new(body, content_type)?;
        let charset = match (self.charset, content.charset_param()) {
            (None, Some(name)) => Some(Charset::from_name(name)?),
            (current, _) => current,
        };
        self.content = Some(content);
        self.charset = charset;
        Ok(self)
    }

    /// Returns the content.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    // Dates

    /// Sets the sent date.
    pub fn set_sent_date(&mut self, date: DateTime<Utc>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.sent_date = Some(date);
        Ok(self)
    }

    /// Returns the sent date, or the current time when none was set.
    ///
    /// The fallback is evaluated on every call, so two calls without a
    /// stored date can differ.
    pub fn sent_date(&self) -> DateTime<Utc> {
        self.sent_date.unwrap_or_else(Utc::now)
    }

    // Session

    /// Sets the SMTP host name.
    pub fn set_host_name(&mut self, host_name: impl Into<String>) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.host_name = Some(host_name.into());
        Ok(self)
    }

    /// Returns the SMTP host name, if set.
    pub fn host_name(&self) -> Option<&str> {
        self.session.host_name.as_deref()
    }

    /// Sets the SMTP port.
    pub fn set_smtp_port(&mut self, port: u16) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        if port == 0 {
            return Err(EmailError::invalid_argument("Cannot connect to a port number that is less than 1"));
        }
        self.session.smtp_port = port;
        Ok(self)
    }

    /// Returns the SMTP port.
    pub fn smtp_port(&self) -> u16 {
        self.session.smtp_port
    }

    /// Sets the SMTP-over-SSL port.
    pub fn set_ssl_smtp_port(&mut self, port: u16) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        if port == 0 {
            return Err(EmailError::invalid_argument("Cannot connect to a port number that is less than 1"));
        }
        self.session.ssl_smtp_port = port;
        Ok(self)
    }

    /// Returns the SMTP-over-SSL port.
    pub fn ssl_smtp_port(&self) -> u16 {
        self.session.ssl_smtp_port
    }

    /// Sets the socket read/write timeout.
    pub fn set_socket_timeout(&mut self, timeout: Duration) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.socket_timeout = timeout;
        Ok(self)
    }

    /// Returns the socket read/write timeout.
    pub fn socket_timeout(&self) -> Duration {
        self.session.socket_timeout
    }

    /// Sets the socket connection timeout.
    pub fn set_socket_connection_timeout(&mut self, timeout: Duration) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.socket_connection_timeout = timeout;
        Ok(self)
    }

    /// Returns the socket connection timeout (60000 ms unless changed).
    pub fn socket_connection_timeout(&self) -> Duration {
        self.session.socket_connection_timeout
    }

    /// Enables STARTTLS.
    pub fn set_start_tls_enabled(&mut self, enabled: bool) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.security.start_tls_enabled = enabled;
        Ok(self)
    }

    /// Requires STARTTLS. Requiring it also enables it.
    pub fn set_start_tls_required(&mut self, required: bool) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.security.start_tls_required = required;
        if required {
            self.session.security.start_tls_enabled = true;
        }
        Ok(self)
    }

    /// Connects over SSL/TLS directly.
    pub fn set_ssl_on_connect(&mut self, ssl: bool) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.security.ssl_on_connect = ssl;
        Ok(self)
    }

    /// Verifies the server identity against its certificate.
    pub fn set_ssl_check_server_identity(&mut self, check: bool) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.security.ssl_check_server_identity = check;
        Ok(self)
    }

    /// Sets the authentication credentials handed to the transport.
    pub fn set_authentication(&mut self, username: &str, password: &str) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        if username.is_empty() {
            return Err(EmailError::invalid_argument("Username can not be empty"));
        }
        self.session.username = Some(username.to_string());
        self.session.password = Some(SecretString::new(password.to_string()));
        Ok(self)
    }

    /// Enables transport debug output.
    pub fn set_debug(&mut self, debug: bool) -> EmailResult<&mut Self> {
        self.ensure_not_built()?;
        self.session.debug = debug;
        Ok(self)
    }

    /// Returns the session settings.
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    // Build

    /// Builds the immutable MIME message.
    ///
    /// Requires a host name and a sender. Fails with `AlreadyBuilt` if a
    /// message already exists; nothing is stored when validation fails.
    pub fn build_mime_message(&mut self) -> EmailResult<&MimeMessage> {
        self.ensure_not_built()?;

        let timer = Timer::start("build_mime_message");
        let result = self.assemble();
        timer.stop();
        self.metrics.record_build(result.is_ok());

        match result {
            Ok(message) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    message_id = %message.message_id(),
                    recipients = message.recipient_count(),
                    size = message.size(),
                    "MIME message built"
                );
                Ok(&*self.message.insert(message))
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "MIME message rejected");
                Err(err)
            }
        }
    }

    fn assemble(&self) -> EmailResult<MimeMessage> {
        let host = self
            .session
            .host_name
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                EmailError::missing_configuration("Cannot find valid hostname for mail session")
            })?;

        let from = self
            .from
            .clone()
            .ok_or_else(|| EmailError::missing_configuration("From address required"))?;

        let sent_date = self.sent_date();
        let charset = self.charset.unwrap_or_default();

        let message_id = match self.headers.get("Message-ID") {
            Some(id) => id.trim().trim_start_matches('<').trim_end_matches('>').to_string(),
            None => format!(
                "{}.{}@{}",
                Uuid::new_v4().simple(),
                sent_date.timestamp_millis(),
                host
            ),
        };

        let mut message = MimeMessage {
            from,
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            reply_to: self.reply_to.clone(),
            subject: self.subject.clone(),
            charset,
            content: self.content.clone(),
            headers: self.headers.clone(),
            sent_date,
            message_id,
            bounce_address: self.bounce_address.clone(),
            session: self.session.clone(),
            raw: Vec::new(),
        };
        message.raw = MimeEncoder::new(charset).encode(&message)?;

        Ok(message)
    }

    /// Returns the built message, if any.
    pub fn mime_message(&self) -> Option<&MimeMessage> {
        self.message.as_ref()
    }

    /// Returns true once the message has been built.
    pub fn is_built(&self) -> bool {
        self.message.is_some()
    }

    /// Discards the built message so the email can be changed and rebuilt.
    pub fn reset_message(&mut self) -> Option<MimeMessage> {
        self.message.take()
    }

    // Send

    /// Hands the built message to a transport.
    pub async fn send_mime_message<T>(&self, transport: &T) -> EmailResult<SendResult>
    where
        T: MailTransport + ?Sized,
    {
        let message = self.message.as_ref().ok_or_else(EmailError::not_built)?;
        let envelope = Envelope::from_message(message)?;

        let result = transport.send(message, &envelope).await;
        self.metrics.record_send(result.is_ok());

        #[cfg(feature = "tracing")]
        match &result {
            Ok(sent) => tracing::info!(
                message_id = %sent.message_id,
                accepted = sent.accepted.len(),
                "Message handed to transport"
            ),
            Err(err) => tracing::warn!(
                message_id = %message.message_id(),
                error = %err,
                "Transport rejected message"
            ),
        }

        result
    }

    /// Builds the message and hands it to a transport.
    pub async fn send<T>(&mut self, transport: &T) -> EmailResult<SendResult>
    where
        T: MailTransport + ?Sized,
    {
        self.build_mime_message()?;
        self.send_mime_message(transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EmailErrorKind;
    use chrono::TimeZone;
    use rstest::rstest;

    const TEST_EMAILS: [&str; 4] = ["abc@de.com", "jake@yahoo.com", "emma@il.com", "format@example.net"];

    fn ready_email() -> Email {
        let mut email = Email::new();
        email.set_host_name("hostname").unwrap();
        email.set_from("fromAddress@mail.com").unwrap();
        email
    }

    #[test]
    fn test_add_bcc_all_rejects_invalid_entry_atomically() {
        let mut email = Email::new();
        let err = email.add_bcc_all(["ok@example.com", ""]).unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::InvalidArgument);
        assert!(email.bcc_addresses().is_empty());
    }

    #[test]
    fn test_add_bcc_all_keeps_duplicates() {
        let mut email = Email::new();
        email.add_bcc_all([TEST_EMAILS[0], TEST_EMAILS[0]]).unwrap();
        email.add_bcc(TEST_EMAILS[1]).unwrap();
        assert_eq!(email.bcc_addresses().len(), 3);
    }

    #[test]
    fn test_set_lists_replace_and_reject_empty() {
        let mut email = Email::new();
        email.add_to(TEST_EMAILS[0]).unwrap();
        email
            .set_to(vec![Address::new(TEST_EMAILS[1]).unwrap(), Address::new(TEST_EMAILS[2]).unwrap()])
            .unwrap();
        assert_eq!(email.to_addresses()[0].email(), TEST_EMAILS[1]);
        assert_eq!(email.to_addresses().len(), 2);

        assert!(email.set_cc(Vec::new()).is_err());
        assert!(email.set_reply_to(std::iter::empty()).is_err());
    }

    #[test]
    fn test_named_addresses() {
        let mut email = Email::new();
        email.add_to_named(TEST_EMAILS[0], "Abc De").unwrap();
        email.add_reply_to_named(TEST_EMAILS[2], "Emma").unwrap();
        email.set_from_named(TEST_EMAILS[3], "Format Bot").unwrap();

        assert_eq!(email.to_addresses()[0].to_string(), "Abc De <abc@de.com>");
        assert_eq!(email.reply_to_addresses()[0].name(), Some("Emma"));
        assert_eq!(email.from_address().unwrap().name(), Some("Format Bot"));
    }

    #[test]
    fn test_set_headers_is_all_or_nothing() {
        let mut email = Email::new();
        email.add_header("X-Keep", "yes").unwrap();

        assert!(email.set_headers([("X-A", "1"), ("", "2")]).is_err());
        assert_eq!(email.headers().get("X-Keep"), Some("yes"));

        email.set_headers([("X-A", "1"), ("X-B", "2")]).unwrap();
        assert_eq!(email.headers().len(), 2);
        assert!(!email.headers().contains("X-Keep"));
    }

    #[test]
    fn test_subject_line_breaks_become_spaces() {
        let mut email = Email::new();
        email.set_subject("Important\r\nTest\nNow").unwrap();
        assert_eq!(email.subject(), Some("Important Test Now"));
    }

    #[test]
    fn test_content_charset_is_adopted() {
        let mut email = Email::new();
        email.set_content("caf\u{e9}", "text/plain; charset=ISO-8859-1").unwrap();
        assert_eq!(email.charset(), Some(Charset::Iso8859_1));

        let mut explicit = Email::new();
        explicit.set_charset("UTF-8").unwrap();
        explicit.set_content("x", "text/plain; charset=US-ASCII").unwrap();
        assert_eq!(explicit.charset(), Some(Charset::Utf8));

        let mut bad = Email::new();
        assert!(bad.set_content("x", "text/plain; charset=klingon").is_err());
        assert!(bad.content().is_none());
    }

    #[test]
    fn test_bounce_address_accepts_named_form() {
        let mut email = Email::new();
        email.set_bounce_address("Bounces <bounces@mail.com>").unwrap();
        assert_eq!(email.bounce_address().unwrap().email(), "bounces@mail.com");
    }

    #[test]
    fn test_reserved_headers_rejected() {
        let mut email = ready_email();
        let err = email.add_header("Bcc", "hidden@example.net").unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::InvalidArgument);
        assert!(email.set_headers([("X-A", "1"), ("Subject", "dup")]).is_err());
        assert!(email.headers().is_empty());
    }

    #[test]
    fn test_content_parameters_survive_rendering() {
        let mut email = ready_email();
        email.set_content("hi", "text/plain; format=flowed").unwrap();

        let message = email.build_mime_message().unwrap();
        let rendered = String::from_utf8_lossy(message.as_bytes());
        assert!(rendered.contains("Content-Type: text/plain; format=flowed; charset=UTF-8\r\n"));
    }

    #[test]
    fn test_invalid_ports_rejected() {
        let mut email = Email::new();
        assert!(email.set_smtp_port(0).is_err());
        assert!(email.set_ssl_smtp_port(0).is_err());
        email.set_smtp_port(2525).unwrap();
        assert_eq!(email.smtp_port(), 2525);
    }

    #[test]
    fn test_start_tls_required_enables_start_tls() {
        let mut email = Email::new();
        email.set_start_tls_required(true).unwrap();
        assert!(email.session().security.start_tls_enabled);
    }

    #[test]
    fn test_with_config_carries_session() {
        let config = SessionConfig::builder()
            .host_name("smtp.example.com")
            .socket_connection_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let email = Email::with_config(config).unwrap();
        assert_eq!(email.host_name(), Some("smtp.example.com"));
        assert_eq!(email.socket_connection_timeout(), Duration::from_secs(5));
    }

    #[rstest]
    #[case::no_host(|e: &mut Email| { e.set_from("fromAddress@mail.com").unwrap(); })]
    #[case::blank_host(|e: &mut Email| { e.set_host_name("  ").unwrap(); e.set_from("fromAddress@mail.com").unwrap(); })]
    #[case::no_from(|e: &mut Email| { e.set_host_name("hostname").unwrap(); })]
    fn test_build_requires_host_and_from(#[case] configure: fn(&mut Email)) {
        let mut email = Email::new();
        configure(&mut email);

        let err = email.build_mime_message().unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::MissingConfiguration);
        assert!(email.mime_message().is_none());
        assert_eq!(email.metrics().snapshot().build_failures, 1);
    }

    #[test]
    fn test_build_freezes_sent_date_and_session() {
        let date = Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap();
        let mut email = ready_email();
        email.set_sent_date(date).unwrap();
        email.set_socket_timeout(Duration::from_secs(10)).unwrap();

        let message = email.build_mime_message().unwrap();
        assert_eq!(message.sent_date(), date);
        assert_eq!(message.session().socket_timeout, Duration::from_secs(10));
        assert!(message.message_id().ends_with("@hostname"));
        assert_eq!(message.charset(), Charset::Utf8);
    }

    #[test]
    fn test_mutation_after_build_fails_until_reset() {
        let mut email = ready_email();
        email.build_mime_message().unwrap();

        assert_eq!(email.add_cc(TEST_EMAILS[0]).unwrap_err().kind(), EmailErrorKind::AlreadyBuilt);
        assert_eq!(email.set_host_name("other").unwrap_err().kind(), EmailErrorKind::AlreadyBuilt);
        assert_eq!(email.build_mime_message().unwrap_err().kind(), EmailErrorKind::AlreadyBuilt);

        assert!(email.reset_message().is_some());
        email.add_cc(TEST_EMAILS[0]).unwrap();
        assert_eq!(email.build_mime_message().unwrap().cc().len(), 1);
    }

    #[test]
    fn test_custom_message_id_is_used() {
        let mut email = ready_email();
        email.add_header("Message-ID", "<custom-1@example.com>").unwrap();
        let message = email.build_mime_message().unwrap();
        assert_eq!(message.message_id(), "custom-1@example.com");

        let rendered = String::from_utf8_lossy(message.as_bytes());
        assert_eq!(rendered.matches("Message-ID:").count(), 1);
    }

    #[test]
    fn test_build_fails_when_subject_cannot_be_encoded() {
        let mut email = ready_email();
        email.set_charset("ISO-8859-1").unwrap();
        email.set_subject("Price: \u{20ac}5").unwrap();

        let err = email.build_mime_message().unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::EncodingFailed);
        assert!(!email.is_built());
    }

    #[test]
    fn test_send_mime_message_requires_build() {
        let email = ready_email();
        let transport = crate::mocks::MockTransport::new();
        let err = tokio_test::block_on(email.send_mime_message(&transport)).unwrap_err();
        assert_eq!(err.kind(), EmailErrorKind::NotBuilt);
    }
}
