//! Click event model for asynchronous click tracking.

use crate::domain::entities::NewClick;
use crate::utils::user_agent;

/// An in-memory representation of a gated redirect, queued for persistence.
///
/// Created by the gate once a redirect is allowed, sent to a bounded channel
/// (non-blocking) and turned into a [`NewClick`] by
/// [`crate::domain::click_worker::run_click_worker`].
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub hash: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClickEvent {
    pub fn new(
        hash: String,
        ip: Option<String>,
        user_agent: Option<&str>,
        referer: Option<&str>,
    ) -> Self {
        Self {
            hash,
            ip,
            user_agent: user_agent.map(|s| s.to_string()),
            referer: referer.map(|s| s.to_string()),
        }
    }

    /// Converts the raw request metadata into a persistable click.
    pub fn into_new_click(self) -> NewClick {
        let info = user_agent::classify(self.user_agent.as_deref());
        NewClick {
            hash: self.hash,
            ip: self.ip,
            browser: info.browser,
            platform: info.platform,
            referrer: self.referer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_event_creation_full() {
        let event = ClickEvent::new(
            "ab12cd34".to_string(),
            Some("192.168.1.1".to_string()),
            Some("Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"),
            Some("https://google.com"),
        );

        assert_eq!(event.hash, "ab12cd34");
        assert_eq!(event.ip, Some("192.168.1.1".to_string()));
        assert_eq!(event.referer, Some("https://google.com".to_string()));

        let click = event.into_new_click();
        assert_eq!(click.browser.as_deref(), Some("Firefox"));
        assert_eq!(click.platform.as_deref(), Some("Linux"));
        assert_eq!(click.referrer.as_deref(), Some("https://google.com"));
    }

    #[test]
    fn test_click_event_creation_minimal() {
        let click = ClickEvent::new("xyz".to_string(), None, None, None).into_new_click();

        assert_eq!(click.hash, "xyz");
        assert!(click.ip.is_none());
        assert!(click.browser.is_none());
        assert!(click.platform.is_none());
        assert!(click.referrer.is_none());
    }
}
