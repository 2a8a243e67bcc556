//! Built MIME messages and their RFC 5322 rendering.
//!
//! Provides:
//! - `MimeMessage`, the immutable snapshot produced by `Email::build_mime_message`
//! - Header encoding (RFC 2047) in the message charset
//! - Header folding and 7bit / quoted-printable / Base64 body encoding
//! - SMTP dot-stuffing for the DATA phase

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::errors::{EmailError, EmailResult};
use crate::types::{Address, Charset, Content, Headers};

/// Maximum line length (excluding CRLF) permitted by RFC 5322.
const MAX_LINE_LENGTH: usize = 998;

/// Maximum length of an RFC 2047 encoded word.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII (no encoding).
    #[default]
    SevenBit,
    /// Quoted-printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Returns the header value.
    pub fn header_value(&self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
        }
    }

    /// Picks the lightest encoding that keeps `data` transport-safe.
    pub fn for_body(data: &[u8], is_text: bool) -> Self {
        let seven_bit_safe = data.is_ascii()
            && !data.contains(&0)
            && data
                .split(|&b| b == b'\n')
                .all(|line| line.len() <= MAX_LINE_LENGTH);

        if seven_bit_safe {
            TransferEncoding::SevenBit
        } else if is_text {
            TransferEncoding::QuotedPrintable
        } else {
            TransferEncoding::Base64
        }
    }
}

/// Immutable, transport-ready email message.
#[derive(Debug, Clone)]
pub struct MimeMessage {
    pub(crate) from: Address,
    pub(crate) to: Vec<Address>,
    pub(crate) cc: Vec<Address>,
    pub(crate) bcc: Vec<Address>,
    pub(crate) reply_to: Vec<Address>,
    pub(crate) subject: Option<String>,
    pub(crate) charset: Charset,
    pub(crate) content: Option<Content>,
    pub(crate) headers: Headers,
    pub(crate) sent_date: DateTime<Utc>,
    pub(crate) message_id: String,
    pub(crate) bounce_address: Option<Address>,
    pub(crate) session: SessionConfig,
    pub(crate) raw: Vec<u8>,
}

impl MimeMessage {
    /// Returns the sender.
    pub fn from(&self) -> &Address {
        &self.from
    }

    /// Returns the primary recipients.
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Returns the CC recipients.
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// Returns the BCC recipients.
    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// Returns the reply-to addresses.
    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    /// Returns the subject, if one was set.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns the charset the message was rendered in.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Returns the content, if any.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Returns the custom headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the `Date` header value, fixed when the message was built.
    pub fn sent_date(&self) -> DateTime<Utc> {
        self.sent_date
    }

    /// Returns the message ID without angle brackets.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the bounce address, if one was set.
    pub fn bounce_address(&self) -> Option<&Address> {
        self.bounce_address.as_ref()
    }

    /// Returns the session settings for the transport.
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Returns all envelope recipients (to + cc + bcc).
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }

    /// Returns the count of all envelope recipients.
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Returns the envelope sender: the bounce address if set, otherwise the sender.
    pub fn envelope_from(&self) -> &Address {
        self.bounce_address.as_ref().unwrap_or(&self.from)
    }

    /// Returns the rendered RFC 5322 message.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the rendered size in bytes.
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

/// Renders messages in a given charset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeEncoder {
    charset: Charset,
}

impl MimeEncoder {
    /// Creates a new encoder.
    pub fn new(charset: Charset) -> Self {
        Self { charset }
    }

    /// Encodes a message to RFC 5322 format.
    pub fn encode(&self, message: &MimeMessage) -> EmailResult<Vec<u8>> {
        let mut output = Vec::new();

        self.write_header(&mut output, "Date", &message.sent_date.format("%a, %d %b %Y %H:%M:%S %z").to_string())?;
        self.write_header(&mut output, "From", &self.encode_address(&message.from)?)?;

        if !message.to.is_empty() {
            self.write_header(&mut output, "To", &self.encode_address_list(&message.to)?)?;
        }

        if !message.cc.is_empty() {
            self.write_header(&mut output, "Cc", &self.encode_address_list(&message.cc)?)?;
        }

        // Bcc stays in the envelope only

        if !message.reply_to.is_empty() {
            self.write_header(&mut output, "Reply-To", &self.encode_address_list(&message.reply_to)?)?;
        }

        if let Some(subject) = &message.subject {
            self.write_header(&mut output, "Subject", &self.encode_header(subject)?)?;
        }

        self.write_header(&mut output, "Message-ID", &format!("<{}>", message.message_id))?;

        for (name, value) in message.headers.iter() {
            if name.eq_ignore_ascii_case("Message-ID") {
                continue;
            }
            self.write_header(&mut output, name, &self.encode_header(value)?)?;
        }

        self.write_header(&mut output, "MIME-Version", "1.0")?;

        let fallback;
        let content = match &message.content {
            Some(content) => content,
            None => {
                fallback = Content::text("");
                &fallback
            }
        };
        self.write_body(&mut output, content)?;

        Ok(output)
    }

    /// Writes the content headers, separator and encoded body.
    fn write_body(&self, output: &mut Vec<u8>, content: &Content) -> EmailResult<()> {
        let data = if content.is_text() {
            self.charset.encode(content.body())?
        } else {
            content.body().as_bytes().to_vec()
        };
        let encoding = TransferEncoding::for_body(&data, content.is_text());

        self.write_header(output, "Content-Type", &content.header_value(self.charset))?;
        self.write_header(output, "Content-Transfer-Encoding", encoding.header_value())?;
        output.extend_from_slice(b"\r\n");

        match encoding {
            TransferEncoding::SevenBit => output.extend_from_slice(&normalize_line_endings(&data)),
            TransferEncoding::QuotedPrintable => {
                output.extend_from_slice(&quoted_printable::encode(&normalize_line_endings(&data)))
            }
            TransferEncoding::Base64 => {
                let encoded = BASE64.encode(&data);
                for chunk in encoded.as_bytes().chunks(76) {
                    output.extend_from_slice(chunk);
                    output.extend_from_slice(b"\r\n");
                }
            }
        }

        if !output.ends_with(b"\r\n") {
            output.extend_from_slice(b"\r\n");
        }

        Ok(())
    }

    /// Writes a header line.
    fn write_header(&self, output: &mut Vec<u8>, name: &str, value: &str) -> EmailResult<()> {
        if name.chars().any(|c| c.is_control() || c == ':') {
            return Err(EmailError::invalid_argument(format!(
                "Invalid header name: {}",
                name
            )));
        }

        let folded = self.fold_header(&format!("{}: {}", name, value));
        output.extend_from_slice(folded.as_bytes());
        output.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Folds a header line at 78 characters.
    ///
    /// Lines are only broken before whitespace, and the whitespace is kept,
    /// so unfolding restores the original line exactly.
    pub fn fold_header(&self, header: &str) -> String {
        if header.len() <= 78 {
            return header.to_string();
        }

        let mut result = String::new();
        let mut current_line = String::new();

        for token in whitespace_tokens(header) {
            if !current_line.is_empty() && current_line.len() + token.len() > 76 {
                result.push_str(&current_line);
                result.push_str("\r\n");
                current_line.clear();
            }
            current_line.push_str(token);
        }

        result.push_str(&current_line);
        result
    }

    /// Encodes a header value using RFC 2047 when it is not plain ASCII.
    ///
    /// Long values are split into several encoded words of at most 75
    /// characters, separated by spaces, so the header can be folded.
    pub fn encode_header(&self, value: &str) -> EmailResult<String> {
        if value.chars().all(|c| c.is_ascii() && !c.is_control()) {
            return Ok(value.to_string());
        }

        let charset = if self.charset == Charset::UsAscii {
            // Encoded words may use any charset, ASCII messages fall back to UTF-8
            Charset::Utf8
        } else {
            self.charset
        };

        // "=?" charset "?B?" text "?="
        let overhead = charset.name().len() + 7;
        let max_bytes = (MAX_ENCODED_WORD_LENGTH - overhead) / 4 * 3;

        let mut words = Vec::new();
        let mut chunk = String::new();
        let mut chunk_bytes = 0;
        for c in value.chars() {
            let char_bytes = match charset {
                Charset::Utf8 => c.len_utf8(),
                Charset::UsAscii | Charset::Iso8859_1 => 1,
            };
            if chunk_bytes + char_bytes > max_bytes && !chunk.is_empty() {
                words.push(self.encoded_word(charset, &chunk)?);
                chunk.clear();
                chunk_bytes = 0;
            }
            chunk.push(c);
            chunk_bytes += char_bytes;
        }
        if !chunk.is_empty() {
            words.push(self.encoded_word(charset, &chunk)?);
        }

        Ok(words.join(" "))
    }

    fn encoded_word(&self, charset: Charset, text: &str) -> EmailResult<String> {
        let bytes = charset.encode(text)?;
        Ok(format!("=?{}?B?{}?=", charset.name(), BASE64.encode(bytes)))
    }

    /// Formats an address, encoding a non-ASCII display name.
    fn encode_address(&self, address: &Address) -> EmailResult<String> {
        match address.name() {
            Some(name) if !name.is_ascii() => {
                Ok(format!("{} <{}>", self.encode_header(name)?, address.email()))
            }
            _ => Ok(address.to_header()),
        }
    }

    fn encode_address_list(&self, addresses: &[Address]) -> EmailResult<String> {
        let encoded = addresses
            .iter()
            .map(|a| self.encode_address(a))
            .collect::<EmailResult<Vec<_>>>()?;
        Ok(encoded.join(", "))
    }

    /// Prepares the DATA content with dot-stuffing.
    pub fn prepare_data_content(encoded_email: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(encoded_email.len() + 100);
        let mut at_line_start = true;

        for &byte in encoded_email {
            if at_line_start && byte == b'.' {
                output.push(b'.');
            }

            output.push(byte);
            at_line_start = byte == b'\n';
        }

        if !output.ends_with(b"\r\n") {
            if output.ends_with(b"\n") {
                output.pop();
            }
            output.extend_from_slice(b"\r\n");
        }

        output.extend_from_slice(b".\r\n");

        output
    }
}

/// Splits a header line into tokens, each a run of whitespace followed by
/// the next word. Concatenating the tokens yields the input.
fn whitespace_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_word = false;
    for (i, c) in line.char_indices() {
        let is_space = c == ' ' || c == '\t';
        if is_space && in_word {
            tokens.push(&line[start..i]);
            start = i;
        }
        in_word = !is_space;
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

/// Converts bare LF line endings to CRLF.
fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut previous = 0u8;
    for &byte in data {
        if byte == b'\n' && previous != b'\r' {
            output.push(b'\r');
        }
        output.push(byte);
        previous = byte;
    }
    output
}
