//! Retrieval-time vocabulary shared by config and the security filter.

use serde::{Deserialize, Serialize};

/// How flagged chunks are treated at retrieval time.
///
/// Configured per workspace; the service default is [`FilterMode::Downrank`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Pass flagged chunks through untouched.
    Off,
    /// Subtract a fixed penalty from the fused score of flagged chunks.
    #[default]
    Downrank,
    /// Drop chunks whose risk score reaches the configured threshold.
    Exclude,
}
