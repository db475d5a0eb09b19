//! Fetch request datagram.
//!
//! The request is plain text: `"<locator>;<ack_timeout_secs>"`. The first `;`
//! separates the two fields, so a locator can never contain the delimiter.

use crate::WireError;
use bytes::Bytes;
use std::fmt;

/// Delimiter between the locator and the ACK timeout
pub const REQUEST_DELIMITER: char = ';';

/// Request asking the server to fetch a resource and relay it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Resource locator handed to the fetcher
    pub locator: String,
    /// Seconds the server waits for an ACK before resending
    pub ack_timeout_secs: u64,
}

impl Request {
    /// Create a request, refusing locators that contain the delimiter
    pub fn new(locator: impl Into<String>, ack_timeout_secs: u64) -> Result<Self, WireError> {
        let locator = locator.into();
        if locator.contains(REQUEST_DELIMITER) {
            return Err(WireError::InvalidRequest(format!(
                "locator contains '{}'",
                REQUEST_DELIMITER
            )));
        }
        Ok(Self {
            locator,
            ack_timeout_secs,
        })
    }

    /// Encode the request datagram
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    /// Decode a request datagram
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(datagram)
            .map_err(|_| WireError::InvalidRequest("not valid UTF-8".to_string()))?;

        let (locator, timeout) = text.split_once(REQUEST_DELIMITER).ok_or_else(|| {
            WireError::InvalidRequest(format!("missing '{}' delimiter", REQUEST_DELIMITER))
        })?;

        let ack_timeout_secs = timeout
            .parse::<u64>()
            .map_err(|_| WireError::InvalidRequest(format!("bad ack timeout {:?}", timeout)))?;

        Ok(Self {
            locator: locator.to_string(),
            ack_timeout_secs,
        })
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.locator, REQUEST_DELIMITER, self.ack_timeout_secs
        )
    }
}
