//! Helpers shared across layers:
//!
//! - [`url_normalizer`] - URL validation (scheme whitelist) and normalization
//! - [`hasher`] - Deterministic short keys
//! - [`user_agent`] - Browser/platform classification for click records
//! - [`backoff`] - Exponential delay schedules

pub mod backoff;
pub mod hasher;
pub mod url_normalizer;
pub mod user_agent;
