use std::collections::HashMap;

use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Punctuation allowed in a header name besides letters and digits.
const TOKEN_SPECIALS: &[u8] = b"!#$%&'*+-.^_`|~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header line: {reason}")]
    Malformed { reason: &'static str },

    #[error("invalid character {found:?} in header name")]
    InvalidCharacter { found: char },
}

/// Header fields keyed by lower-cased name.
///
/// Lookups fold the queried name, so they are case-insensitive. Repeated
/// fields are combined into one value joined by `", "` in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses at most one header line from the front of `buf`.
    ///
    /// Returns the number of bytes consumed and whether the blank line that
    /// ends the header section was reached. `(0, false)` means no complete
    /// line is buffered yet. The terminator itself is reported as `(0, true)`
    /// and is left for the caller to consume.
    pub fn parse_one(&mut self, buf: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(line_end) = find_crlf(buf) else {
            return Ok((0, false));
        };

        if line_end == 0 {
            return Ok((0, true));
        }

        let line = &buf[..line_end];
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(HeaderError::Malformed { reason: "missing colon" })?;

        let (name, value) = (&line[..colon], &line[colon + 1..]);

        if name.is_empty() {
            return Err(HeaderError::Malformed { reason: "empty name" });
        }
        if name.last().is_some_and(|b| b.is_ascii_whitespace()) {
            return Err(HeaderError::Malformed { reason: "whitespace before colon" });
        }
        if let Some(&bad) = name.iter().find(|&&b| !is_token_byte(b)) {
            return Err(HeaderError::InvalidCharacter { found: bad as char });
        }

        let value = std::str::from_utf8(value)
            .map_err(|_| HeaderError::Malformed { reason: "value is not utf-8" })?;

        // `name` is all token bytes, hence ASCII.
        let name = String::from_utf8_lossy(name);
        self.append(&name, value.trim());

        Ok((line_end + CRLF.len(), false))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Replaces any existing value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Adds a value, joining it onto an existing one with `", "`.
    pub fn append(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(name.as_ref(), value);
        }
        headers
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || TOKEN_SPECIALS.contains(&b)
}
