//! Query-string parameters for inbound commands.
//!
//! Splits `key=value&key=value` into borrowed pairs without allocating.
//! Only numeric parameters exist, so no percent-decoding is performed;
//! an encoded number simply fails to parse.

use heapless::Vec;

use crate::error::ValidationError;

/// Pairs beyond this are ignored.
pub const MAX_PARAMS: usize = 8;

/// Borrowed view over a query string.
#[derive(Debug, Default)]
pub struct Params<'a> {
    pairs: Vec<(&'a str, &'a str), MAX_PARAMS>,
}

impl<'a> Params<'a> {
    /// Parse a raw query (without the leading `?`).
    ///
    /// Empty segments are skipped; a key without `=` gets an empty value.
    pub fn parse(query: &'a str) -> Self {
        let mut pairs = Vec::new();
        for segment in query.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            if pairs.push((key, value)).is_err() {
                break;
            }
        }
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(*v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Required finite number.
    pub fn number(&self, key: &'static str) -> Result<f32, ValidationError> {
        match self.get(key) {
            None => Err(ValidationError::MissingParam(key)),
            Some(raw) => parse_finite(key, raw),
        }
    }

    /// Optional finite number.  Present-but-invalid is still an error.
    pub fn optional_number(&self, key: &'static str) -> Result<Option<f32>, ValidationError> {
        self.get(key).map(|raw| parse_finite(key, raw)).transpose()
    }
}

fn parse_finite(key: &'static str, raw: &str) -> Result<f32, ValidationError> {
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::InvalidNumber(key)),
    }
}
