//! Key-value cache port.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Best-effort byte cache.
///
/// Callers must treat every failure as a miss: a broken cache degrades
/// performance, never correctness.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Look up `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;
}
