//! Map difficulty tiers from the KZTimer Global API, cached per map name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use url::Url;

/// Tier shown when the difficulty is unknown or could not be fetched.
pub const UNKNOWN_TIER: &str = "T?";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("map name {0:?} cannot be used in a lookup url")]
    InvalidMapName(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves the difficulty rating of a map.
#[async_trait]
pub trait TierLookup: Send + Sync {
    /// Returns `Ok(None)` when the service answered but has no rating for the map.
    async fn difficulty(&self, map_name: &str) -> Result<Option<i64>, LookupError>;
}

#[derive(Debug, Deserialize)]
struct MapRecord {
    difficulty: Option<i64>,
}

/// `TierLookup` backed by the KZTimer Global API (`GET {base}/{map_name}`).
pub struct KzGlobalApi {
    client: reqwest::Client,
    base_url: Url,
}

impl KzGlobalApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let base_url =
            Url::parse(base_url).map_err(|e| format!("Invalid difficulty API url: {}", e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("Difficulty API url cannot be a base: {}", base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kz-rich-presence/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, base_url })
    }

    fn map_url(&self, map_name: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidMapName(map_name.to_string()))?
            .pop_if_empty()
            .push(map_name);
        Ok(url)
    }
}

#[async_trait]
impl TierLookup for KzGlobalApi {
    async fn difficulty(&self, map_name: &str) -> Result<Option<i64>, LookupError> {
        let url = self.map_url(map_name)?;
        tracing::debug!("Fetching difficulty for {} from {}", map_name, url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status()));
        }

        // Unknown maps come back as a literal `null` body.
        let record: Option<MapRecord> = response.json().await?;
        Ok(record.and_then(|r| r.difficulty))
    }
}

/// Formats a difficulty rating as a tier label, `"T?"` for anything non-positive.
pub fn tier_label(difficulty: Option<i64>) -> String {
    match difficulty {
        Some(d) if d > 0 => format!("T{}", d),
        _ => UNKNOWN_TIER.to_string(),
    }
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Resolved(String),
    Failed(Instant),
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// Caches tier labels per map name for the lifetime of the process.
///
/// Each map gets its own async slot, so concurrent callers asking for the same
/// unseen map wait on a single lookup instead of issuing their own. Answers from
/// the service are cached permanently; transport failures are remembered only
/// for `retry_after` and the map is looked up again afterwards.
pub struct DifficultyCache {
    lookup: Arc<dyn TierLookup>,
    slots: Mutex<HashMap<String, Slot>>,
    timeout: Duration,
    retry_after: Duration,
}

impl DifficultyCache {
    pub fn new(lookup: Arc<dyn TierLookup>, timeout: Duration, retry_after: Duration) -> Self {
        Self {
            lookup,
            slots: Mutex::new(HashMap::new()),
            timeout,
            retry_after,
        }
    }

    /// Returns the tier label for `map_name`. Never fails; problems degrade to `"T?"`.
    pub async fn tier(&self, map_name: &str) -> String {
        if map_name.is_empty() {
            return UNKNOWN_TIER.to_string();
        }

        let slot = self
            .slots
            .lock()
            .entry(map_name.to_string())
            .or_default()
            .clone();
        let mut entry = slot.lock().await;

        match &*entry {
            Some(CacheEntry::Resolved(tier)) => return tier.clone(),
            Some(CacheEntry::Failed(at)) if at.elapsed() < self.retry_after => {
                return UNKNOWN_TIER.to_string();
            }
            _ => {}
        }

        match self.resolve(map_name).await {
            Ok(tier) => {
                tracing::debug!("Difficulty for {} resolved to {}", map_name, tier);
                *entry = Some(CacheEntry::Resolved(tier.clone()));
                tier
            }
            Err(e) => {
                tracing::warn!("Failed to fetch difficulty for {}: {}", map_name, e);
                *entry = Some(CacheEntry::Failed(Instant::now()));
                UNKNOWN_TIER.to_string()
            }
        }
    }

    async fn resolve(&self, map_name: &str) -> Result<String, LookupError> {
        let difficulty = tokio::time::timeout(self.timeout, self.lookup.difficulty(map_name))
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))??;
        Ok(tier_label(difficulty))
    }
}
