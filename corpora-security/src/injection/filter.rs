//! Retrieval-time filtering of flagged chunks.

use tracing::debug;

use corpora_core::types::{ChunkSecurity, FilterMode};

/// Applies the per-workspace filter mode to fused retrieval candidates.
#[derive(Debug, Clone, Copy)]
pub struct InjectionFilter {
    pub mode: FilterMode,
    /// Risk score at or above which `Exclude` drops a chunk.
    pub risk_threshold: f32,
    /// Score penalty applied to flagged chunks in `Downrank` mode.
    pub penalty: f32,
}

impl InjectionFilter {
    /// Build a filter.
    #[must_use]
    pub const fn new(mode: FilterMode, risk_threshold: f32, penalty: f32) -> Self {
        Self {
            mode,
            risk_threshold,
            penalty,
        }
    }

    /// Apply the filter to `(item, fused_score)` candidates sorted by score
    /// descending. `security` projects each item onto its annotations.
    ///
    /// `Off` passes through; `Downrank` subtracts the penalty from flagged
    /// items and re-sorts (stable, so untouched items keep their order);
    /// `Exclude` drops items whose risk reaches the threshold.
    #[must_use]
    pub fn apply<T, F>(&self, mut candidates: Vec<(T, f32)>, security: F) -> Vec<(T, f32)>
    where
        F: Fn(&T) -> &ChunkSecurity,
    {
        match self.mode {
            FilterMode::Off => candidates,
            FilterMode::Downrank => {
                let mut touched = 0_usize;
                for (item, score) in &mut candidates {
                    if security(item).is_flagged() {
                        *score -= self.penalty;
                        touched += 1;
                    }
                }
                if touched > 0 {
                    debug!(downranked = touched, "penalized flagged chunks");
                    candidates.sort_by(|a, b| {
                        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
                candidates
            }
            FilterMode::Exclude => {
                let before = candidates.len();
                candidates.retain(|(item, _)| security(item).risk_score < self.risk_threshold);
                if candidates.len() < before {
                    debug!(excluded = before - candidates.len(), "dropped risky chunks");
                }
                candidates
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(risk: f32) -> ChunkSecurity {
        ChunkSecurity {
            risk_score: risk,
            security_flags: vec!["override_instruction".to_string()],
            detected_patterns: vec!["ignore_previous".to_string()],
        }
    }

    fn candidates() -> Vec<(ChunkSecurity, f32)> {
        vec![
            (flagged(0.9), 0.033),
            (ChunkSecurity::default(), 0.032),
            (ChunkSecurity::default(), 0.016),
        ]
    }

    #[test]
    fn test_off_passes_through() {
        let filter = InjectionFilter::new(FilterMode::Off, 0.5, 0.005);
        let out = filter.apply(candidates(), |security| security);
        assert_eq!(out.len(), 3);
        assert!(out[0].0.is_flagged());
    }

    #[test]
    fn test_downrank_demotes_flagged_top_hit() {
        let filter = InjectionFilter::new(FilterMode::Downrank, 0.5, 0.005);
        let out = filter.apply(candidates(), |security| security);
        assert_eq!(out.len(), 3);
        // 0.033 - 0.005 = 0.028 drops below the clean 0.032.
        assert!(!out[0].0.is_flagged());
        assert!(out[1].0.is_flagged());
    }

    #[test]
    fn test_exclude_drops_above_threshold() {
        let filter = InjectionFilter::new(FilterMode::Exclude, 0.5, 0.005);
        let out = filter.apply(candidates(), |security| security);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|(security, _)| !security.is_flagged()));
    }

    #[test]
    fn test_exclude_keeps_low_risk_flagged() {
        let filter = InjectionFilter::new(FilterMode::Exclude, 0.5, 0.005);
        let out = filter.apply(vec![(flagged(0.3), 0.02)], |security| security);
        assert_eq!(out.len(), 1);
    }
}
