//! Hash reputation lookups
//!
//! Files are identified by the SHA-256 of their full contents. The lookup
//! service is consulted with that digest and answers whether the content is
//! known to be malicious. Lookups fail open: any transport error, non-200
//! status or unexpected body reads as "not malicious".

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Answers whether a content hash is flagged as malicious
#[async_trait]
pub trait ReputationClient: Send + Sync {
    /// `sha256` is the 64-character lower-case hex digest
    async fn is_malicious(&self, sha256: &str) -> bool;

    /// Disabled clients let the evaluator skip hashing altogether
    fn enabled(&self) -> bool {
        true
    }
}

/// Client used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl ReputationClient for Disabled {
    async fn is_malicious(&self, _sha256: &str) -> bool {
        false
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// HTTP lookup service keyed by content hash, bearer-token authenticated
#[derive(Debug, Clone)]
pub struct HashLookupClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: LookupData,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    attributes: LookupAttributes,
}

#[derive(Debug, Deserialize)]
struct LookupAttributes {
    last_analysis_stats: AnalysisStats,
}

#[derive(Debug, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    malicious: u32,
}

impl HashLookupClient {
    /// `endpoint` is the base URL the hash is appended to
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn lookup(&self, sha256: &str) -> reqwest::Result<Option<u32>> {
        let url = format!("{}/{}", self.endpoint, sha256);
        debug!("Reputation lookup: {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            debug!("Reputation service returned {} for {}", response.status(), sha256);
            return Ok(None);
        }

        let body: LookupResponse = response.json().await?;
        Ok(Some(body.data.attributes.last_analysis_stats.malicious))
    }
}

#[async_trait]
impl ReputationClient for HashLookupClient {
    async fn is_malicious(&self, sha256: &str) -> bool {
        match self.lookup(sha256).await {
            Ok(Some(detections)) => detections > 0,
            Ok(None) => false,
            Err(e) => {
                warn!("Reputation lookup failed for {}: {}", sha256, e);
                false
            }
        }
    }
}

/// SHA-256 of a file, streamed in fixed-size chunks
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
