//! Message contract between the creation path and the verification worker.

use serde::{Deserialize, Serialize};

/// Separator of the plain-text `"<target>::<hash>"` encoding.
const TEXT_SEPARATOR: &str = "::";

/// A request to check `target` and record the verdict under `hash`.
///
/// Published as JSON. Consumers also accept the plain-text `"<target>::<hash>"`
/// form so that producers without a JSON encoder can enqueue work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub target: String,
    pub hash: String,
    /// Zero-based delivery attempt, incremented on every retry.
    #[serde(default)]
    pub attempt: u32,
}

/// Errors raised when a queue payload cannot be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is neither JSON nor '<target>::<hash>': {0}")]
    Malformed(String),
}

impl VerificationRequest {
    /// Creates a first-attempt request.
    pub fn new(target: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            hash: hash.into(),
            attempt: 0,
        }
    }

    /// Returns the same request for the next delivery attempt.
    ///
    /// The counter saturates; it comes off the wire and may hold any value.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Encodes the request for publishing.
    pub fn encode(&self) -> String {
        // Serializing two strings and an integer cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| self.encode_text())
    }

    /// Encodes the request in the plain-text form.
    pub fn encode_text(&self) -> String {
        format!("{}{}{}", self.target, TEXT_SEPARATOR, self.hash)
    }

    /// Decodes a payload in either supported encoding.
    ///
    /// The text form is split on the last `::` because hashes never contain a
    /// colon while targets may.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        if payload.starts_with('{') {
            return serde_json::from_str::<Self>(payload)
                .map_err(|e| DecodeError::Malformed(e.to_string()))
                .and_then(Self::checked);
        }

        let (target, hash) = payload
            .rsplit_once(TEXT_SEPARATOR)
            .ok_or_else(|| DecodeError::Malformed(payload.to_string()))?;

        Self::checked(Self::new(target, hash))
    }

    fn checked(self) -> Result<Self, DecodeError> {
        if self.target.is_empty() || self.hash.is_empty() {
            return Err(DecodeError::Malformed(format!(
                "missing target or hash in {}",
                self.encode_text()
            )));
        }
        Ok(self)
    }
}
