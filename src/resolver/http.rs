//! HTTP song-URL API client.

use super::{SongUrlApi, UrlCandidate};
use crate::config::SongQuality;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Song-URL API client
pub struct HttpSongApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSongApi {
    /// Create a new client against an API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SongUrlApi for HttpSongApi {
    async fn song_url(&self, id: u64, quality: SongQuality) -> Result<Option<UrlCandidate>> {
        let url = format!(
            "{}/song/url/v1?id={}&level={}",
            self.base_url,
            id,
            quality.api_level()
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| PlaybackError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackError::TransientNetwork(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: SongUrlResponse = response
            .json()
            .await
            .map_err(|e| PlaybackError::Parse(e.to_string()))?;

        Ok(body.into_candidate())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SongUrlResponse {
    data: Vec<SongUrlData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SongUrlData {
    url: Option<String>,
    #[serde(rename = "freeTrialInfo")]
    free_trial_info: Option<serde_json::Value>,
}

impl SongUrlResponse {
    fn into_candidate(self) -> Option<UrlCandidate> {
        let first = self.data.into_iter().next()?;
        let url = first.url.filter(|u| !u.is_empty())?;
        Some(UrlCandidate {
            url,
            trial_only: first.free_trial_info.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpSongApi::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_response_into_candidate() {
        let json = r#"{ "data": [ { "url": "http://cdn/a.mp3" } ] }"#;
        let resp: SongUrlResponse = serde_json::from_str(json).unwrap();
        let candidate = resp.into_candidate().unwrap();
        assert_eq!(candidate.url, "http://cdn/a.mp3");
        assert!(!candidate.trial_only);
    }

    #[test]
    fn test_trial_info_marks_candidate() {
        let json = r#"{
            "data": [ { "url": "http://cdn/a.mp3", "freeTrialInfo": { "start": 30 } } ]
        }"#;
        let resp: SongUrlResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_candidate().unwrap().trial_only);
    }

    #[test]
    fn test_missing_url_is_no_candidate() {
        let resp: SongUrlResponse = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        assert!(resp.into_candidate().is_none());

        let resp: SongUrlResponse =
            serde_json::from_str(r#"{ "data": [ { "url": null } ] }"#).unwrap();
        assert!(resp.into_candidate().is_none());

        let resp: SongUrlResponse =
            serde_json::from_str(r#"{ "data": [ { "url": "" } ] }"#).unwrap();
        assert!(resp.into_candidate().is_none());
    }
}
