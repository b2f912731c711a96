//! Coarse browser/platform classification from a `User-Agent` header.

use regex::Regex;
use std::sync::LazyLock;

/// Ordered browser signatures. Order matters: Edge and Opera embed "Chrome",
/// Chrome embeds "Safari".
static BROWSERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"Edg(e|A|iOS)?/", "Edge"),
        (r"(OPR|Opera)/", "Opera"),
        (r"(Firefox|FxiOS)/", "Firefox"),
        (r"(Chrome|CriOS)/", "Chrome"),
        (r"Version/[\d.]+.*Safari/", "Safari"),
        (r"(curl|Wget)/", "CLI"),
        (r"(?i)bot|crawler|spider", "Bot"),
    ]
    .into_iter()
    .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, name)))
    .collect()
});

static PLATFORMS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"Android", "Android"),
        (r"(iPhone|iPad|iPod)", "iOS"),
        (r"Windows", "Windows"),
        (r"(Macintosh|Mac OS X)", "macOS"),
        (r"CrOS", "ChromeOS"),
        (r"Linux", "Linux"),
    ]
    .into_iter()
    .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, name)))
    .collect()
});

/// Browser and platform names derived from a user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: Option<String>,
    pub platform: Option<String>,
}

/// Classifies a `User-Agent` value. Unrecognised agents yield `None` fields.
pub fn classify(user_agent: Option<&str>) -> UserAgentInfo {
    let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) else {
        return UserAgentInfo::default();
    };

    let find = |table: &[(Regex, &'static str)]| {
        table
            .iter()
            .find(|(re, _)| re.is_match(ua))
            .map(|(_, name)| name.to_string())
    };

    UserAgentInfo {
        browser: find(BROWSERS.as_slice()),
        platform: find(PLATFORMS.as_slice()),
    }
}
