//! Click entity representing a single gated redirect.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A redirect that passed the safety gate.
///
/// Append-only: one row per successful redirect, never updated.
#[derive(Debug, Clone, Serialize)]
pub struct Click {
    pub hash: String,
    pub ip: Option<String>,
    pub browser: Option<String>,
    pub platform: Option<String>,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input data for recording a click. The timestamp is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClick {
    pub hash: String,
    pub ip: Option<String>,
    pub browser: Option<String>,
    pub platform: Option<String>,
    pub referrer: Option<String>,
}

impl NewClick {
    /// Materializes the click with the given timestamp.
    pub fn into_click(self, created_at: DateTime<Utc>) -> Click {
        Click {
            hash: self.hash,
            ip: self.ip,
            browser: self.browser,
            platform: self.platform,
            referrer: self.referrer,
            created_at,
        }
    }
}
