//! Sign-In with Ethereum ([EIP-4361]) messages.
//!
//! The wallet never signs anything but the human readable message text. A
//! [`SiweMessage`] prints to that text with [`Display`] and is recovered
//! from it with [`FromStr`]; the two agree on the layout below.
//!
//! ```text
//! ${domain} wants you to sign in with your Ethereum account:
//! ${address}
//!
//! ${statement}
//!
//! URI: ${uri}
//! Version: 1
//! Chain ID: ${chain-id}
//! Nonce: ${nonce}
//! Issued At: ${issued-at}
//! Expiration Time: ${expiration-time}
//! Not Before: ${not-before}
//! Request ID: ${request-id}
//! Resources:
//! - ${resources[0]}
//! ```
//!
//! [EIP-4361]: https://eips.ethereum.org/EIPS/eip-4361
//! [`Display`]: std::fmt::Display

use crate::error::SiweError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use tinycloud_capability::Timestamp;
use tinycloud_credentials::ethereum::EthereumAddress;
use tinycloud_varsig::Did;

const PREAMBLE: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TAG: &str = "Expiration Time: ";
const NOT_BEFORE_TAG: &str = "Not Before: ";
const REQUEST_ID_TAG: &str = "Request ID: ";
const RESOURCES_TAG: &str = "Resources:";
const RESOURCE_ITEM: &str = "- ";

const NONCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const NONCE_LENGTH: usize = 17;
const MIN_NONCE_LENGTH: usize = 8;

/// A parsed EIP-4361 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    /// Authority requesting the signature.
    pub domain: String,
    /// The signing account.
    pub address: EthereumAddress,
    /// Human readable assertion, a single line.
    pub statement: Option<String>,
    /// Subject of the signing. Here, the DID of the session key being
    /// authorized.
    pub uri: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Replay protection, at least 8 alphanumeric characters.
    pub nonce: String,
    /// When the message was created.
    pub issued_at: DateTime<Utc>,
    /// When the signed message stops being valid.
    pub expiration_time: Option<DateTime<Utc>>,
    /// When the signed message becomes valid.
    pub not_before: Option<DateTime<Utc>>,
    /// Relying party specific request identifier.
    pub request_id: Option<String>,
    /// URIs the signer wants resolved as part of the sign in.
    pub resources: Vec<String>,
}

/// The wallet-side request to prepare a [`SiweMessage`].
///
/// Field names and formats follow the JSON shape web clients send:
///
/// ```json
/// {
///   "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
///   "chainId": 1,
///   "domain": "app.tinycloud.xyz",
///   "issuedAt": "2024-01-01T00:00:00Z",
///   "expirationTime": "2024-01-01T01:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweConfig {
    /// EIP-55 address of the signer.
    pub address: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// RFC 3986 authority requesting the signature.
    pub domain: String,
    /// Nonce; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// RFC 3339 creation time.
    pub issued_at: String,
    /// RFC 3339 expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    /// RFC 3339 start of validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    /// Request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Extra resource URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    /// Human readable statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

impl SiweMessage {
    /// Builds a message from a [`SiweConfig`], addressed to `uri`.
    ///
    /// # Errors
    ///
    /// Returns a [`SiweError`] naming the first invalid field.
    pub fn from_config(config: &SiweConfig, uri: &Did) -> Result<Self, SiweError> {
        let nonce = match &config.nonce {
            Some(nonce) => nonce.clone(),
            None => generate_nonce()?,
        };
        let message = Self {
            domain: config.domain.clone(),
            address: config.address.parse()?,
            statement: config.statement.clone(),
            uri: uri.to_string(),
            chain_id: config.chain_id,
            nonce,
            issued_at: parse_time("issuedAt", &config.issued_at)?,
            expiration_time: config
                .expiration_time
                .as_deref()
                .map(|value| parse_time("expirationTime", value))
                .transpose()?,
            not_before: config
                .not_before
                .as_deref()
                .map(|value| parse_time("notBefore", value))
                .transpose()?,
            request_id: config.request_id.clone(),
            resources: config.resources.clone().unwrap_or_default(),
        };
        message.validate()?;
        Ok(message)
    }

    /// The signer's `did:pkh`.
    #[must_use]
    pub fn signer(&self) -> Did {
        self.address.to_did(self.chain_id)
    }

    /// Checks the field constraints the text format relies on.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::InvalidField`] naming the offending field.
    pub fn validate(&self) -> Result<(), SiweError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(SiweError::InvalidField {
                field,
                reason: reason.to_string(),
            })
        };
        if self.domain.is_empty() || self.domain.contains(char::is_whitespace) {
            return invalid("domain", "must be a non-empty authority");
        }
        if self
            .statement
            .as_deref()
            .is_some_and(|statement| statement.is_empty() || statement.contains('\n'))
        {
            return invalid("statement", "must be a single non-empty line");
        }
        if self.uri.is_empty() || self.uri.contains(char::is_whitespace) {
            return invalid("uri", "must be a non-empty URI");
        }
        if self.nonce.len() < MIN_NONCE_LENGTH
            || !self.nonce.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return invalid("nonce", "must be at least 8 alphanumeric characters");
        }
        if let (Some(nbf), Some(exp)) = (self.not_before, self.expiration_time) {
            if nbf > exp {
                return invalid("notBefore", "must not be after the expiration time");
            }
        }
        if self
            .resources
            .iter()
            .any(|resource| resource.is_empty() || resource.contains(char::is_whitespace))
        {
            return invalid("resources", "must be URIs");
        }
        Ok(())
    }

    /// Returns `true` if the message is valid at `at`.
    #[must_use]
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.not_before.is_none_or(|nbf| to_not_before(nbf) <= at)
            && self.expiration_time.is_none_or(|exp| at <= to_timestamp(exp))
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{PREAMBLE}", self.domain)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "{URI_TAG}{}", self.uri)?;
        writeln!(f, "{VERSION_TAG}1")?;
        writeln!(f, "{CHAIN_TAG}{}", self.chain_id)?;
        writeln!(f, "{NONCE_TAG}{}", self.nonce)?;
        write!(f, "{ISSUED_AT_TAG}{}", format_time(&self.issued_at))?;
        if let Some(exp) = &self.expiration_time {
            write!(f, "\n{EXPIRATION_TAG}{}", format_time(exp))?;
        }
        if let Some(nbf) = &self.not_before {
            write!(f, "\n{NOT_BEFORE_TAG}{}", format_time(nbf))?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "\n{REQUEST_ID_TAG}{request_id}")?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{RESOURCES_TAG}")?;
            for resource in &self.resources {
                write!(f, "\n{RESOURCE_ITEM}{resource}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for SiweMessage {
    type Err = SiweError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = Lines::new(s);

        let domain = lines
            .next("preamble")?
            .strip_suffix(PREAMBLE)
            .ok_or_else(|| lines.rejected("expected the sign in preamble"))?
            .to_string();
        let address = lines.next("address")?.parse()?;
        lines.blank()?;

        let statement = match lines.peek() {
            Some("") => None,
            Some(line) if !line.starts_with(URI_TAG) => {
                let statement = line.to_string();
                lines.next("statement")?;
                Some(statement)
            }
            _ => return Err(lines.malformed("expected a statement or a blank line")),
        };
        lines.blank()?;

        let uri = lines.tagged(URI_TAG)?.to_string();
        if lines.tagged(VERSION_TAG)? != "1" {
            return Err(lines.rejected("only version 1 is supported"));
        }
        let chain_id = lines
            .tagged(CHAIN_TAG)?
            .parse()
            .map_err(|_| lines.rejected("chain id is not a number"))?;
        let nonce = lines.tagged(NONCE_TAG)?.to_string();
        let issued_at = parse_time("issuedAt", lines.tagged(ISSUED_AT_TAG)?)?;
        let expiration_time = lines
            .optional(EXPIRATION_TAG)
            .map(|value| parse_time("expirationTime", value))
            .transpose()?;
        let not_before = lines
            .optional(NOT_BEFORE_TAG)
            .map(|value| parse_time("notBefore", value))
            .transpose()?;
        let request_id = lines.optional(REQUEST_ID_TAG).map(str::to_string);

        let mut resources = Vec::new();
        if lines.peek() == Some(RESOURCES_TAG) {
            lines.next("resources")?;
            while let Some(resource) = lines.optional(RESOURCE_ITEM) {
                resources.push(resource.to_string());
            }
        }
        if lines.peek().is_some() {
            return Err(lines.malformed("unexpected trailing content"));
        }

        let message = Self {
            domain,
            address,
            statement,
            uri,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        };
        message.validate()?;
        Ok(message)
    }
}

struct Lines<'a> {
    lines: std::iter::Peekable<std::str::Split<'a, char>>,
    number: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.split('\n').peekable(),
            number: 0,
        }
    }

    /// Error about the next, unconsumed line.
    fn malformed(&self, reason: &str) -> SiweError {
        SiweError::Malformed {
            line: self.number + 1,
            reason: reason.to_string(),
        }
    }

    /// Error about the line just consumed.
    fn rejected(&self, reason: &str) -> SiweError {
        SiweError::Malformed {
            line: self.number,
            reason: reason.to_string(),
        }
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.lines.peek().copied()
    }

    fn next(&mut self, expected: &str) -> Result<&'a str, SiweError> {
        let line = self
            .lines
            .next()
            .ok_or_else(|| self.malformed(&format!("missing {expected}")))?;
        self.number += 1;
        Ok(line)
    }

    fn blank(&mut self) -> Result<(), SiweError> {
        if self.next("blank line")?.is_empty() {
            Ok(())
        } else {
            Err(self.rejected("expected a blank line"))
        }
    }

    fn tagged(&mut self, tag: &str) -> Result<&'a str, SiweError> {
        self.optional(tag)
            .ok_or_else(|| self.malformed(&format!("expected {}", tag.trim_end())))
    }

    fn optional(&mut self, tag: &str) -> Option<&'a str> {
        let value = self.peek()?.strip_prefix(tag)?;
        self.lines.next();
        self.number += 1;
        Some(value)
    }
}

/// Generates a random alphanumeric nonce.
///
/// # Errors
///
/// Returns [`SiweError::Rng`] if the platform CSPRNG is unavailable.
pub fn generate_nonce() -> Result<String, SiweError> {
    let mut nonce = String::with_capacity(NONCE_LENGTH);
    let mut buffer = [0u8; 32];
    while nonce.len() < NONCE_LENGTH {
        getrandom::getrandom(&mut buffer).map_err(|e| SiweError::Rng(e.to_string()))?;
        // Drop bytes past the last whole multiple of the alphabet length.
        for byte in buffer {
            let limit = NONCE_ALPHABET.len() * (256 / NONCE_ALPHABET.len());
            if usize::from(byte) < limit && nonce.len() < NONCE_LENGTH {
                nonce.push(char::from(
                    NONCE_ALPHABET[usize::from(byte) % NONCE_ALPHABET.len()],
                ));
            }
        }
    }
    Ok(nonce)
}

fn parse_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, SiweError> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| SiweError::InvalidField {
            field,
            reason: format!("{value:?} is not an RFC 3339 time: {e}"),
        })
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Converts a message time to a [`Timestamp`], truncating to whole seconds.
/// Times before the epoch map to the epoch.
#[must_use]
pub fn to_timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp::from_unix(u64::try_from(time.timestamp()).unwrap_or(0))
}

/// Converts a message not-before time to a [`Timestamp`], rounding up to
/// the next whole second so the window never opens early.
#[must_use]
pub fn to_not_before(time: DateTime<Utc>) -> Timestamp {
    let start = to_timestamp(time);
    if time.timestamp_subsec_nanos() > 0 && time.timestamp() >= 0 {
        start.saturating_add(Duration::from_secs(1))
    } else {
        start
    }
}

/// Converts a [`Timestamp`] to a message time.
///
/// # Errors
///
/// Returns [`SiweError::InvalidField`] if the timestamp is beyond the range
/// of calendar dates.
pub fn from_timestamp(field: &'static str, at: Timestamp) -> Result<DateTime<Utc>, SiweError> {
    i64::try_from(at.to_unix())
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .ok_or_else(|| SiweError::InvalidField {
            field,
            reason: format!("{at} is out of range"),
        })
}
