//! Firebase Storage adapter.
//!
//! Resolves a key through the object metadata endpoint and builds the same
//! token-bearing download URL the hosted console hands out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{validate_key, BlobStore};
use crate::config::FirebaseConfig;
use crate::error::BlobError;

pub struct FirebaseStorage {
    http: reqwest::Client,
    storage_url: String,
    bucket: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl FirebaseStorage {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self, BlobError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            storage_url: config.storage_url.trim_end_matches('/').to_string(),
            bucket: config.storage_bucket.clone(),
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Metadata URL of an object; the key is encoded as a single segment.
    pub fn object_url(&self, key: &str) -> Result<Url, BlobError> {
        let invalid = |reason: String| BlobError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        let mut url = Url::parse(&self.storage_url)
            .map_err(|e| invalid(format!("invalid storage URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("storage URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["v0", "b", self.bucket.as_str(), "o", key]);
        Ok(url)
    }

    /// Download URL for an object given its first download token.
    pub fn download_url(&self, key: &str, token: Option<&str>) -> Result<String, BlobError> {
        let mut url = self.object_url(key)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStore for FirebaseStorage {
    async fn resolve_url(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        let url = self.object_url(key)?;

        let mut req = self.http.get(url);
        if let Some(api_key) = &self.api_key {
            req = req.query(&[("key", api_key)]);
        }
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => {
                return Err(BlobError::Status {
                    key: key.to_string(),
                    status: s.as_u16(),
                })
            }
            _ => {}
        }

        let metadata: ObjectMetadata = response.json().await?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()));
        self.download_url(key, token).map(Some)
    }

    fn name(&self) -> &'static str {
        "firebase-storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> FirebaseStorage {
        let config = FirebaseConfig {
            project_id: "smarthvac-test".to_string(),
            api_key: None,
            storage_bucket: "smarthvac-test.appspot.com".to_string(),
            database: "(default)".to_string(),
            firestore_url: "https://firestore.googleapis.com/v1".to_string(),
            storage_url: "https://firebasestorage.googleapis.com/".to_string(),
            auth_token: None,
        };
        FirebaseStorage::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_object_url_encodes_key_as_one_segment() {
        let url = storage().object_url("results/job_1/zone_plot.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/smarthvac-test.appspot.com/o/results%2Fjob_1%2Fzone_plot.png"
        );
    }

    #[test]
    fn test_download_url_with_and_without_token() {
        let storage = storage();
        let with = storage
            .download_url("results/job_1/zone_plot.png", Some("abc-123"))
            .unwrap();
        assert!(with.ends_with("zone_plot.png?alt=media&token=abc-123"));

        let without = storage.download_url("results/job_1/zone_plot.png", None).unwrap();
        assert!(without.ends_with("?alt=media"));
    }

    #[test]
    fn test_metadata_tokens_parse() {
        let meta: ObjectMetadata =
            serde_json::from_str(r#"{"name": "x", "downloadTokens": "t1,t2"}"#).unwrap();
        assert_eq!(meta.download_tokens.as_deref(), Some("t1,t2"));
        let meta: ObjectMetadata = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(meta.download_tokens.is_none());
    }
}
