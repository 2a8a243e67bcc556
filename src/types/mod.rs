//! Core types for the email builder.
//!
//! This module provides:
//! - Address types with validation
//! - An ordered, duplicate-preserving header collection
//! - Supported charsets
//! - Message content with a parsed MIME type

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::{EmailError, EmailResult};

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Display name (e.g., "John Doe").
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com").
    pub email: String,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> EmailResult<Self> {
        let email = email.into();
        let email = email.trim().to_string();
        Self::validate_email(&email)?;
        Ok(Self { name: None, email })
    }

    /// Creates a new address with display name and email.
    ///
    /// An empty display name is treated as absent.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> EmailResult<Self> {
        let mut address = Self::new(email)?;
        let name = name.into();
        if !name.trim().is_empty() {
            address.name = Some(name.trim().to_string());
        }
        Ok(address)
    }

    /// Parses an address from a string (e.g., "John Doe <john@example.com>").
    pub fn parse(s: &str) -> EmailResult<Self> {
        let s = s.trim();

        // "Name <email>"
        if let Some(start) = s.find('<') {
            if let Some(end) = s.rfind('>') {
                if end > start {
                    let name = s[..start].trim().trim_matches('"');
                    let email = s[start + 1..end].trim();
                    return Self::with_name(name, email);
                }
            }
            return Err(EmailError::invalid_argument(format!(
                "Unterminated angle address: {}",
                s
            )));
        }

        Self::new(s)
    }

    /// Validates an email address according to RFC 5321/5322 length and shape rules.
    fn validate_email(email: &str) -> EmailResult<()> {
        if email.is_empty() {
            return Err(EmailError::invalid_argument("Email address cannot be empty"));
        }

        if email.len() > 254 {
            return Err(EmailError::invalid_argument(
                "Email address too long (max 254 characters)",
            ));
        }

        if email.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(EmailError::invalid_argument(
                "Email address cannot contain whitespace or control characters",
            ));
        }

        let (local, domain) = match email.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => {
                return Err(EmailError::invalid_argument(format!(
                    "Email address must contain exactly one @: {}",
                    email
                )))
            }
        };

        if local.is_empty() || local.len() > 64 {
            return Err(EmailError::invalid_argument("Local part must be 1-64 characters"));
        }

        if domain.is_empty() {
            return Err(EmailError::invalid_argument("Domain cannot be empty"));
        }

        Ok(())
    }

    /// Returns the email part only.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name if present.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Formats the address for the SMTP envelope.
    pub fn to_smtp(&self) -> String {
        format!("<{}>", self.email)
    }

    /// Formats the address for email headers, without any charset encoding.
    pub fn to_header(&self) -> String {
        match &self.name {
            Some(name) => {
                if name.contains(|c: char| !c.is_alphanumeric() && c != ' ') {
                    format!("\"{}\" <{}>", name.replace('"', "\\\""), self.email)
                } else {
                    format!("{} <{}>", name, self.email)
                }
            }
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header())
    }
}

impl FromStr for Address {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<&str> for Address {
    type Error = EmailError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Address::parse(&s)
    }
}

/// Headers the encoder writes itself; `Bcc` is never rendered.
const RESERVED_HEADERS: [&str; 10] = [
    "Date",
    "From",
    "To",
    "Cc",
    "Bcc",
    "Reply-To",
    "Subject",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// Ordered header collection.
///
/// Names are compared case-insensitively. Adding a name that is already
/// present appends another value; nothing is overwritten. Names the
/// encoder writes itself (`From`, `Bcc`, `Content-Type`, ...) are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends a header.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> EmailResult<()> {
        let name = name.into();
        let value = value.into();
        Self::validate_name(&name)?;
        Self::validate_value(&name, &value)?;
        self.entries.push((name, value));
        Ok(())
    }

    /// Returns the first value for a header name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for a header name, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if at least one value exists for the name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of header entries (duplicates counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn validate_name(name: &str) -> EmailResult<()> {
        if name.is_empty() {
            return Err(EmailError::invalid_argument("name can not be null or empty"));
        }
        if RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            return Err(EmailError::invalid_argument(format!(
                "Header {} is set by the builder and cannot be added directly",
                name
            )));
        }
        if name
            .chars()
            .any(|c| !c.is_ascii() || c.is_ascii_control() || c.is_whitespace() || c == ':')
        {
            return Err(EmailError::invalid_argument(format!(
                "Invalid header name: {}",
                name
            )));
        }
        Ok(())
    }

    fn validate_value(name: &str, value: &str) -> EmailResult<()> {
        if value.is_empty() {
            return Err(EmailError::invalid_argument("value can not be null or empty"));
        }
        if value.contains(['\r', '\n']) {
            return Err(EmailError::invalid_argument(format!(
                "Header {} contains a line break",
                name
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Character sets a message can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    /// 7-bit US-ASCII.
    #[serde(rename = "US-ASCII")]
    UsAscii,
    /// ISO-8859-1 (Latin-1).
    #[serde(rename = "ISO-8859-1")]
    Iso8859_1,
    /// UTF-8.
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
}

impl Charset {
    /// Looks up a charset by name or common alias, ignoring case.
    pub fn from_name(name: &str) -> EmailResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "us-ascii" | "ascii" | "iso646-us" => Ok(Charset::UsAscii),
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => Ok(Charset::Iso8859_1),
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            _ => Err(EmailError::invalid_argument(format!(
                "Unsupported charset: {}",
                name
            ))),
        }
    }

    /// Returns the canonical MIME name.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::UsAscii => "US-ASCII",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::Utf8 => "UTF-8",
        }
    }

    /// Returns true if every character of `text` is representable.
    pub fn can_encode(&self, text: &str) -> bool {
        text.chars().all(|c| self.can_encode_char(c))
    }

    fn can_encode_char(&self, c: char) -> bool {
        match self {
            Charset::UsAscii => c.is_ascii(),
            Charset::Iso8859_1 => (c as u32) <= 0xFF,
            Charset::Utf8 => true,
        }
    }

    /// Encodes `text` into bytes of this charset.
    pub fn encode(&self, text: &str) -> EmailResult<Vec<u8>> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::UsAscii | Charset::Iso8859_1 => {
                if let Some(c) = text.chars().find(|c| !self.can_encode_char(*c)) {
                    return Err(EmailError::encoding(format!(
                        "Character {:?} cannot be encoded as {}",
                        c,
                        self.name()
                    )));
                }
                // Every char is <= 0xFF here
                Ok(text.chars().map(|c| c as u32 as u8).collect())
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Charset::from_name(s)
    }
}

/// Message body together with its MIME type.
///
/// Content types that `mime` cannot parse (e.g. `"list"`) are kept verbatim
/// and treated as opaque, non-text content.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    body: String,
    content_type: String,
    mime: Option<mime::Mime>,
}

impl Content {
    /// Creates content with the given content type (e.g. "text/plain; charset=UTF-8").
    pub fn new(body: impl Into<String>, content_type: &str) -> EmailResult<Self> {
        let content_type = content_type.trim();
        if content_type.is_empty() {
            return Err(EmailError::invalid_argument("Content type can not be empty"));
        }
        if content_type.chars().any(|c| c.is_control()) {
            return Err(EmailError::invalid_argument(format!(
                "Invalid content type: {:?}",
                content_type
            )));
        }
        Ok(Self {
            body: body.into(),
            content_type: content_type.to_string(),
            mime: content_type.parse().ok(),
        })
    }

    /// Creates plain text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: mime::TEXT_PLAIN.to_string(),
            mime: Some(mime::TEXT_PLAIN),
        }
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the content type as given.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the parsed content type, if it is a valid MIME type.
    pub fn mime(&self) -> Option<&mime::Mime> {
        self.mime.as_ref()
    }

    /// Returns the `charset` parameter of the content type, if any.
    pub fn charset_param(&self) -> Option<&str> {
        self.mime
            .as_ref()
            .and_then(|m| m.get_param(mime::CHARSET))
            .map(|n| n.as_str())
    }

    /// Returns true for `text/*` content.
    pub fn is_text(&self) -> bool {
        self.mime.as_ref().is_some_and(|m| m.type_() == mime::TEXT)
    }

    /// Returns the `Content-Type` header value.
    ///
    /// Text content keeps its parameters and gets `charset` set to the
    /// rendering charset. Anything else is written as given.
    pub fn header_value(&self, charset: Charset) -> String {
        let parsed = match &self.mime {
            Some(parsed) if parsed.type_() == mime::TEXT => parsed,
            _ => return self.content_type.clone(),
        };

        let mut value = parsed.essence_str().to_string();
        for (name, param) in parsed.params() {
            if name.as_str().eq_ignore_ascii_case(mime::CHARSET.as_str()) {
                continue;
            }
            value.push_str("; ");
            value.push_str(name.as_str());
            value.push('=');
            value.push_str(&quote_param(param.as_str()));
        }
        value.push_str("; charset=");
        value.push_str(charset.name());
        value
    }
}

/// Quotes a parameter value when it is not a plain MIME token.
fn quote_param(value: &str) -> String {
    const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";
    let is_token = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !TSPECIALS.contains(c));
    if is_token {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        let addr = Address::parse("test@example.com").unwrap();
        assert_eq!(addr.email, "test@example.com");
        assert!(addr.name.is_none());

        let addr = Address::parse("John Doe <john@example.com>").unwrap();
        assert_eq!(addr.email, "john@example.com");
        assert_eq!(addr.name, Some("John Doe".to_string()));

        let addr = Address::parse("\"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(addr.name, Some("Doe, John".to_string()));
        assert_eq!(addr.to_header(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_address_validation() {
        assert!(Address::new("abc@de.com").is_ok());
        assert!(Address::new("format@example.net").is_ok());
        assert!(Address::new("  padded@example.net ").is_ok());

        assert!(Address::new("").is_err());
        assert!(Address::new("no-at-sign").is_err());
        assert!(Address::new("two@@signs.com").is_err());
        assert!(Address::new("@no-local.com").is_err());
        assert!(Address::new("no-domain@").is_err());
        assert!(Address::new("spa ce@example.com").is_err());
        assert!(Address::parse("Broken <broken@example.com").is_err());
    }

    #[test]
    fn test_address_display_is_normalized() {
        let addr: Address = "  emma@il.com ".parse().unwrap();
        assert_eq!(addr.to_string(), "emma@il.com");
        assert_eq!(addr.to_smtp(), "<emma@il.com>");

        let named = Address::with_name("", "emma@il.com").unwrap();
        assert!(named.name().is_none());
    }

    #[test]
    fn test_headers_keep_duplicates_in_order() {
        let mut headers = Headers::new();
        headers.append("X-Tag", "one").unwrap();
        headers.append("X-Other", "value").unwrap();
        headers.append("x-tag", "two").unwrap();

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("X-TAG"), Some("one"));
        assert_eq!(headers.get_all("X-Tag").collect::<Vec<_>>(), vec!["one", "two"]);
        assert!(!headers.contains("X-Missing"));
    }

    #[test]
    fn test_headers_reject_invalid_pairs() {
        let mut headers = Headers::new();
        assert!(headers.append("", "value").is_err());
        assert!(headers.append("name", "").is_err());
        assert!(headers.append("bad name", "value").is_err());
        assert!(headers.append("bad:name", "value").is_err());
        assert!(headers.append("X-Inject", "value\r\nBcc: evil@example.com").is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_reject_reserved_names() {
        let mut headers = Headers::new();
        for name in ["Bcc", "bcc", "From", "To", "Subject", "Date", "Content-Type", "MIME-Version"] {
            let err = headers.append(name, "hidden@example.net").unwrap_err();
            assert_eq!(err.kind(), crate::errors::EmailErrorKind::InvalidArgument);
        }
        assert!(headers.is_empty());

        headers.append("Message-ID", "<custom@example.com>").unwrap();
        headers.append("X-Bcc-Note", "kept").unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_charset_lookup() {
        assert_eq!(Charset::from_name("US-ASCII").unwrap(), Charset::UsAscii);
        assert_eq!(Charset::from_name("utf8").unwrap(), Charset::Utf8);
        assert_eq!("Latin1".parse::<Charset>().unwrap(), Charset::Iso8859_1);
        assert!(Charset::from_name("no-such-charset").is_err());
    }

    #[test]
    fn test_charset_encode() {
        assert_eq!(Charset::Iso8859_1.encode("caf\u{e9}").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
        assert!(Charset::UsAscii.encode("caf\u{e9}").is_err());
        assert!(Charset::Iso8859_1.encode("\u{20ac}").is_err());
        assert_eq!(Charset::Utf8.encode("\u{20ac}").unwrap(), "\u{20ac}".as_bytes());
    }

    #[test]
    fn test_content_type_parsing() {
        let content = Content::new("Hi", "text/plain; charset=ISO-8859-1").unwrap();
        assert!(content.is_text());
        assert!(content
            .charset_param()
            .is_some_and(|c| c.eq_ignore_ascii_case("iso-8859-1")));
        assert_eq!(content.header_value(Charset::Utf8), "text/plain; charset=UTF-8");

        let json = Content::new("{}", "application/json").unwrap();
        assert!(!json.is_text());
        assert_eq!(json.header_value(Charset::Utf8), "application/json");

        assert!(Content::new("x", "").is_err());
        assert!(Content::new("x", "text/plain\r\nBcc: evil@example.com").is_err());
    }

    #[test]
    fn test_content_type_keeps_parameters() {
        let flowed = Content::new("hi", "text/plain; format=flowed; charset=us-ascii").unwrap();
        assert_eq!(
            flowed.header_value(Charset::Utf8),
            "text/plain; format=flowed; charset=UTF-8"
        );

        let html = Content::new("<p>hi</p>", "text/html").unwrap();
        assert_eq!(html.header_value(Charset::Iso8859_1), "text/html; charset=ISO-8859-1");
    }

    #[test]
    fn test_unparsable_content_type_is_kept_verbatim() {
        let list = Content::new("abc@de.com\njake@yahoo.com", "list").unwrap();
        assert!(list.mime().is_none());
        assert!(!list.is_text());
        assert!(list.charset_param().is_none());
        assert_eq!(list.content_type(), "list");
        assert_eq!(list.header_value(Charset::Utf8), "list");
    }
}
