//! Core domain entities.
//!
//! # Entity Types
//!
//! - [`ShortUrl`] - A shortened URL with its tri-state [`Safety`] flag
//! - [`Click`] - A redirect that passed the safety gate
//!
//! Creation input uses separate structs ([`NewShortUrl`], [`NewClick`]) so that
//! store-assigned fields (timestamps, the initial `Unknown` safety) cannot be forged.

pub mod click;
pub mod short_url;

pub use click::{Click, NewClick};
pub use short_url::{
    NewShortUrl, ParseSafetyError, RedirectMode, Redirection, Safety, ShortUrl, ShortUrlMetadata,
    Verdict,
};
