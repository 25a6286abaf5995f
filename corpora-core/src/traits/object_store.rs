//! Object storage port.

use async_trait::async_trait;

use crate::error::Result;

/// Binary blob storage for original document files.
///
/// Keys are opaque relative paths chosen by the caller. All failures are
/// surfaced as [`crate::CorporaError::Storage`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning the key actually used.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object under `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
