//! URL validation and normalization.
//!
//! Only `http` and `https` targets are accepted. Accepted URLs are brought into a
//! canonical form before hashing, so that trivially different spellings of the same
//! target share one short URL.

use url::Url;

/// Errors that can occur during URL normalization.
#[derive(Debug, thiserror::Error)]
pub enum UrlNormalizationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("Failed to normalize URL: {0}")]
    NormalizationFailed(String),
}

/// Syntactic acceptance of URLs submitted for shortening.
pub trait UrlValidator: Send + Sync {
    /// Validates `url` and returns its canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`UrlNormalizationError`] when the URL is malformed or uses a
    /// scheme outside the whitelist.
    fn normalize(&self, url: &str) -> Result<String, UrlNormalizationError>;

    fn is_valid(&self, url: &str) -> bool {
        self.normalize(url).is_ok()
    }
}

/// Validator accepting `http` and `https` URLs, backed by [`normalize_url`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpUrlValidator;

impl UrlValidator for HttpUrlValidator {
    fn normalize(&self, url: &str) -> Result<String, UrlNormalizationError> {
        normalize_url(url)
    }
}

/// Normalizes a URL to a canonical form.
///
/// # Normalization Rules
///
/// 1. **Protocol**: Only HTTP and HTTPS are allowed
/// 2. **Hostname**: Converted to lowercase
/// 3. **Default ports**: Removed (80 for HTTP, 443 for HTTPS)
/// 4. **Fragments**: Removed (e.g., `#section`)
/// 5. **Query and path**: Preserved as-is
///
/// # Errors
///
/// Returns [`UrlNormalizationError::InvalidFormat`] for malformed URLs.
/// Returns [`UrlNormalizationError::UnsupportedProtocol`] for non-HTTP(S) schemes.
pub fn normalize_url(input: &str) -> Result<String, UrlNormalizationError> {
    let mut url = Url::parse(input.trim())
        .map_err(|e| UrlNormalizationError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlNormalizationError::UnsupportedProtocol),
    }

    if let Some(host) = url.host_str() {
        let host_lowercase = host.to_ascii_lowercase();
        url.set_host(Some(&host_lowercase)).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to set normalized host".to_string())
        })?;
    }

    url.set_fragment(None);

    let is_default_port = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default_port {
        url.set_port(None).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to remove default port".to_string())
        })?;
    }

    Ok(url.to_string())
}
