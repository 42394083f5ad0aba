//! HTTP lyric API client.
//!
//! Remote lyrics come from the catalog's `/lyric` endpoint; local tracks
//! read a sidecar `.lrc` file next to the audio file.

use super::{LyricApi, RawLyricPayload};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Lyric API client
pub struct HttpLyricApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpLyricApi {
    /// Create a new client against an API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LyricApi for HttpLyricApi {
    async fn remote_lyrics(&self, id: u64) -> Result<Option<RawLyricPayload>> {
        let url = format!("{}/lyric?id={}", self.base_url, id);

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

        let body: LyricResponse = response
            .json()
            .await
            .map_err(|e| PlaybackError::Parse(e.to_string()))?;

        Ok(body.into_payload())
    }

    async fn local_lyrics(&self, path: &Path) -> Result<Option<String>> {
        let sidecar = path.with_extension("lrc");
        if !sidecar.exists() {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&sidecar).await?;
        Ok(Some(text))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LyricResponse {
    lrc: Option<LyricBody>,
    yrc: Option<LyricBody>,
    tlyric: Option<LyricBody>,
    romalrc: Option<LyricBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LyricBody {
    lyric: Option<String>,
}

impl LyricResponse {
    fn into_payload(self) -> Option<RawLyricPayload> {
        let plain = self.lrc.and_then(|b| b.lyric).filter(|s| !s.is_empty());
        let word_synced = self.yrc.and_then(|b| b.lyric).filter(|s| !s.is_empty());
        if plain.is_none() && word_synced.is_none() {
            return None;
        }
        let has_body = |b: &Option<LyricBody>| {
            b.as_ref()
                .and_then(|b| b.lyric.as_ref())
                .is_some_and(|s| !s.is_empty())
        };
        let has_translation = has_body(&self.tlyric);
        let has_romanization = has_body(&self.romalrc);
        Some(RawLyricPayload {
            plain,
            word_synced,
            has_translation,
            has_romanization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpLyricApi::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_response_into_payload() {
        let json = r#"{
            "lrc": { "lyric": "[00:01.00]hello" },
            "yrc": { "lyric": "[00:01.00]hel-lo" },
            "tlyric": { "lyric": "[00:01.00]bonjour" }
        }"#;
        let resp: LyricResponse = serde_json::from_str(json).unwrap();
        let payload = resp.into_payload().unwrap();
        assert_eq!(payload.plain.as_deref(), Some("[00:01.00]hello"));
        assert_eq!(payload.word_synced.as_deref(), Some("[00:01.00]hel-lo"));
        assert!(payload.has_translation);
        assert!(!payload.has_romanization);
    }

    #[test]
    fn test_empty_response_is_no_lyrics() {
        let resp: LyricResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.into_payload().is_none());

        let resp: LyricResponse =
            serde_json::from_str(r#"{ "lrc": { "lyric": "" } }"#).unwrap();
        assert!(resp.into_payload().is_none());
    }
}
