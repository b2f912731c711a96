//! Google Safe Browsing v4 lookup client.

use super::checker::{SafetyCheckError, SafetyChecker};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

const THREAT_TYPES: &[&str] = &[
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindThreatMatchesRequest<'a> {
    client: ClientInfo<'a>,
    threat_info: ThreatInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo<'a> {
    client_id: &'a str,
    client_version: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: &'a [&'a str],
    platform_types: [&'a str; 1],
    threat_entry_types: [&'a str; 1],
    threat_entries: [ThreatEntry<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct FindThreatMatchesResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

fn build_request(url: &str) -> FindThreatMatchesRequest<'_> {
    FindThreatMatchesRequest {
        client: ClientInfo {
            client_id: env!("CARGO_PKG_NAME"),
            client_version: env!("CARGO_PKG_VERSION"),
        },
        threat_info: ThreatInfo {
            threat_types: THREAT_TYPES,
            platform_types: ["ANY_PLATFORM"],
            threat_entry_types: ["URL"],
            threat_entries: [ThreatEntry { url }],
        },
    }
}

/// An empty body (`{}`) means no threat matched.
fn is_safe_response(body: &str) -> Result<bool, SafetyCheckError> {
    if body.trim().is_empty() {
        return Ok(true);
    }
    let parsed: FindThreatMatchesResponse =
        serde_json::from_str(body).map_err(|e| SafetyCheckError::Parse(e.to_string()))?;
    Ok(parsed.matches.is_empty())
}

/// Safe Browsing client.
///
/// The HTTP client carries its own timeout equal to the configured check
/// timeout, so a hung connection surfaces as [`SafetyCheckError::Timeout`].
pub struct SafeBrowsingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl SafeBrowsingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SafetyCheckError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .build()
            .map_err(|e| SafetyCheckError::Transport(e.to_string()))?;

        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, "Using Safe Browsing reputation checks");

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SafetyChecker for SafeBrowsingClient {
    async fn is_safe(&self, url: &str) -> Result<bool, SafetyCheckError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SafetyCheckError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    SafetyCheckError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SafetyCheckError::Api {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SafetyCheckError::Transport(e.to_string()))?;

        let safe = is_safe_response(&body)?;
        debug!(url, safe, "Safe Browsing lookup finished");
        Ok(safe)
    }
}
