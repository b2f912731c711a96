//! External reputation checks for shortened targets.

mod blocklist;
mod checker;
pub mod safe_browsing;

pub use blocklist::BlocklistChecker;
pub use checker::{SafetyCheckError, SafetyChecker};
pub use safe_browsing::SafeBrowsingClient;

#[cfg(test)]
pub use checker::MockSafetyChecker;
