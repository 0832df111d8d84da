use std::time::Duration;
use serde::Deserialize;
use crate::core::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_capacity: usize,                  // Positive cache entries held by the local layer
    pub positive_expiration_secs: u64,          // Sliding expiration for cached hits
    pub negative_expiration_secs: u64,          // Fixed expiration for cached misses
    pub max_subchunk_length: usize,             // LogChunkBuilder cut threshold
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cache_capacity: 1000,
            positive_expiration_secs: 2 * 60 * 60,     // 2 hours
            negative_expiration_secs: 30,
            max_subchunk_length: 128 * 1024,           // 128KB
        }
    }
}

impl StorageConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn positive_expiration(&self) -> Duration {
        Duration::from_secs(self.positive_expiration_secs)
    }

    pub fn negative_expiration(&self) -> Duration {
        Duration::from_secs(self.negative_expiration_secs)
    }
}
