//! Short URL entity and its safety state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Safety state of a short URL.
///
/// Every record starts as [`Safety::Unknown`] and is resolved by the verification
/// worker to [`Safety::Safe`] or [`Safety::Unsafe`]. Writes only ever carry a
/// [`Verdict`], so a resolved record can never go back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    Unknown,
    Safe,
    Unsafe,
}

impl Safety {
    /// Storage representation used by the `short_urls.safety` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        }
    }

    /// Returns true once the reputation check has produced a verdict.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised safety value.
#[derive(Debug, thiserror::Error)]
#[error("unknown safety state: {0}")]
pub struct ParseSafetyError(String);

impl FromStr for Safety {
    type Err = ParseSafetyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "safe" => Ok(Self::Safe),
            "unsafe" => Ok(Self::Unsafe),
            other => Err(ParseSafetyError(other.to_string())),
        }
    }
}

/// Outcome of a reputation check. The only values a safety update may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Unsafe,
}

impl Verdict {
    pub fn from_is_safe(is_safe: bool) -> Self {
        if is_safe { Self::Safe } else { Self::Unsafe }
    }

    pub fn as_str(&self) -> &'static str {
        Safety::from(*self).as_str()
    }
}

impl From<Verdict> for Safety {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Safe => Safety::Safe,
            Verdict::Unsafe => Safety::Unsafe,
        }
    }
}

/// HTTP redirect semantics stored with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// 307 Temporary Redirect.
    #[default]
    Temporary,
    /// 301 Moved Permanently.
    Permanent,
}

impl RedirectMode {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Temporary => 307,
            Self::Permanent => 301,
        }
    }

    /// Maps a stored status code back to a mode. Anything but 301 is temporary.
    pub fn from_status_code(code: u16) -> Self {
        if code == 301 {
            Self::Permanent
        } else {
            Self::Temporary
        }
    }
}

/// A shortened URL with its verification state.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrl {
    pub hash: String,
    pub target: String,
    pub mode: RedirectMode,
    pub safety: Safety,
    pub sponsor: Option<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl ShortUrl {
    /// Builds an unverified record from creation input.
    pub fn pending(new: NewShortUrl, created_at: DateTime<Utc>) -> Self {
        Self {
            hash: new.hash,
            target: new.target,
            mode: new.mode,
            safety: Safety::Unknown,
            sponsor: new.sponsor,
            ip: new.ip,
            created_at,
            verified_at: None,
        }
    }
}

/// Input data for creating a short URL. Safety is not part of it: new records are
/// always `Unknown`.
#[derive(Debug, Clone)]
pub struct NewShortUrl {
    pub hash: String,
    pub target: String,
    pub mode: RedirectMode,
    pub sponsor: Option<String>,
    pub ip: Option<String>,
}

/// Provenance metadata supplied by the caller at creation time.
#[derive(Debug, Clone, Default)]
pub struct ShortUrlMetadata {
    pub sponsor: Option<String>,
    pub ip: Option<String>,
    pub permanent: bool,
}

/// Where a gated redirect should send the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub target: String,
    pub mode: RedirectMode,
}
