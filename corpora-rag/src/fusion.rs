//! Reciprocal Rank Fusion and the reranker seam.

use async_trait::async_trait;
use uuid::Uuid;

use corpora_core::traits::ScoredChunk;
use corpora_core::Result;

/// Standard RRF constant.
pub const RRF_K: f32 = 60.0;

/// A retrieval candidate after fusion.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub chunk: ScoredChunk,
    /// RRF score, or the raw dense score when only one arm ran.
    pub score: f32,
    /// 1-based rank in the dense list, when present.
    pub dense_rank: Option<usize>,
    /// 1-based rank in the lexical list, when present.
    pub lexical_rank: Option<usize>,
    /// Score assigned by the reranker, when one ran.
    pub rerank_score: Option<f32>,
    /// Name of the reranker that annotated this candidate.
    pub rerank_provenance: Option<String>,
}

impl FusedCandidate {
    /// Identity used for fusion and deduplication: the chunk id.
    #[must_use]
    pub const fn identity(&self) -> Uuid {
        self.chunk.chunk.id
    }
}

/// Fuse dense and lexical ranked lists with RRF (`k = 60`).
///
/// Each chunk scores the sum over lists of `1 / (k + rank)` with 1-based
/// ranks; chunks missing from a list contribute nothing for it. The union
/// is sorted by fused score descending, ties broken by lowest dense rank,
/// then lowest lexical rank, then chunk identity.
#[must_use]
pub fn reciprocal_rank_fusion(
    dense: Vec<ScoredChunk>,
    lexical: Vec<ScoredChunk>,
) -> Vec<FusedCandidate> {
    let mut fused: Vec<FusedCandidate> = Vec::with_capacity(dense.len() + lexical.len());

    for (position, chunk) in dense.into_iter().enumerate() {
        let rank = position + 1;
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (RRF_K + rank as f32);
        fused.push(FusedCandidate {
            chunk,
            score: contribution,
            dense_rank: Some(rank),
            lexical_rank: None,
            rerank_score: None,
            rerank_provenance: None,
        });
    }

    for (position, chunk) in lexical.into_iter().enumerate() {
        let rank = position + 1;
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (RRF_K + rank as f32);

        if let Some(existing) = fused
            .iter_mut()
            .find(|candidate| candidate.identity() == chunk.chunk.id)
        {
            existing.score += contribution;
            existing.lexical_rank = Some(rank);
        } else {
            fused.push(FusedCandidate {
                chunk,
                score: contribution,
                dense_rank: None,
                lexical_rank: Some(rank),
                rerank_score: None,
                rerank_provenance: None,
            });
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| rank_or_max(a.dense_rank).cmp(&rank_or_max(b.dense_rank)))
            .then_with(|| rank_or_max(a.lexical_rank).cmp(&rank_or_max(b.lexical_rank)))
            .then_with(|| a.identity().cmp(&b.identity()))
    });

    fused
}

/// Wrap a dense-only result list so it flows through the same downstream
/// stages as a fused one, keeping the raw similarity as the score.
#[must_use]
pub fn dense_passthrough(dense: Vec<ScoredChunk>) -> Vec<FusedCandidate> {
    dense
        .into_iter()
        .enumerate()
        .map(|(position, chunk)| FusedCandidate {
            score: chunk.score,
            chunk,
            dense_rank: Some(position + 1),
            lexical_rank: None,
            rerank_score: None,
            rerank_provenance: None,
        })
        .collect()
}

const fn rank_or_max(rank: Option<usize>) -> usize {
    match rank {
        Some(value) => value,
        None => usize::MAX,
    }
}

/// Optional second-stage reordering of the fused list.
///
/// A failing reranker is not fatal: the caller falls back to the fused
/// order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` for `query`, annotating `rerank_score` and
    /// provenance on each.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedCandidate>,
    ) -> Result<Vec<FusedCandidate>>;

    /// Implementation name recorded as provenance.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpora_core::types::ChunkRecord;

    fn chunk(id: Uuid) -> ScoredChunk {
        ScoredChunk {
            chunk: ChunkRecord {
                id,
                ..ChunkRecord::new(Uuid::new_v4(), Uuid::new_v4(), 0, "contenido", vec![0.0; 4])
            },
            score: 0.9,
            document_title: "doc".to_string(),
        }
    }

    #[test]
    fn test_rrf_literal_expectations() {
        // dense [c1, c2, c3], lexical [c3, c4, c1] => [c1, c3, c2, c4]
        let (c1, c2, c3, c4) = (
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            Uuid::from_u128(3),
            Uuid::from_u128(4),
        );
        let dense = vec![chunk(c1), chunk(c2), chunk(c3)];
        let lexical = vec![chunk(c3), chunk(c4), chunk(c1)];

        let fused = reciprocal_rank_fusion(dense, lexical);
        let order: Vec<Uuid> = fused.iter().map(FusedCandidate::identity).collect();
        assert_eq!(order, vec![c1, c3, c2, c4]);

        let expected_c1 = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((fused[0].score - expected_c1).abs() < 1e-9);
        assert!((fused[1].score - expected_c1).abs() < 1e-9);
        assert!((fused[2].score - 1.0 / 62.0).abs() < 1e-9);
        assert!((fused[3].score - 1.0 / 62.0).abs() < 1e-9);

        // Ties broken by lower dense rank.
        assert_eq!(fused[0].dense_rank, Some(1));
        assert_eq!(fused[1].dense_rank, Some(3));
        assert_eq!(fused[2].dense_rank, Some(2));
        assert_eq!(fused[3].dense_rank, None);
    }

    #[test]
    fn test_missing_from_one_list_contributes_zero() {
        let only_dense = Uuid::from_u128(7);
        let fused = reciprocal_rank_fusion(vec![chunk(only_dense)], Vec::new());
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-9);
        assert_eq!(fused[0].lexical_rank, None);
    }

    #[test]
    fn test_dense_passthrough_keeps_similarity_scores() {
        let id = Uuid::from_u128(9);
        let candidates = dense_passthrough(vec![chunk(id)]);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].score - 0.9).abs() < 1e-9);
        assert_eq!(candidates[0].dense_rank, Some(1));
    }

    #[tokio::test]
    async fn test_reranker_annotations_survive() {
        let mut reranker = MockReranker::new();
        reranker.expect_name().return_const("mock".to_string());
        reranker.expect_rerank().returning(|_, mut candidates| {
            candidates.reverse();
            for candidate in &mut candidates {
                candidate.rerank_score = Some(0.9);
                candidate.rerank_provenance = Some("mock".to_string());
            }
            Ok(candidates)
        });

        let fused = reciprocal_rank_fusion(
            vec![chunk(Uuid::from_u128(1)), chunk(Uuid::from_u128(2))],
            Vec::new(),
        );
        let reordered = reranker.rerank("consulta", fused).await.unwrap();

        assert_eq!(reordered[0].identity(), Uuid::from_u128(2));
        assert_eq!(reordered[0].rerank_score, Some(0.9));
        assert_eq!(reordered[0].rerank_provenance.as_deref(), Some("mock"));
    }

    #[test]
    fn test_identity_tiebreak_is_deterministic() {
        let a = Uuid::from_u128(10);
        let b = Uuid::from_u128(11);
        // Same ranks in symmetric positions: tie on score and rank depth.
        let fused_one = reciprocal_rank_fusion(vec![chunk(a)], vec![chunk(b)]);
        let fused_two = reciprocal_rank_fusion(vec![chunk(a)], vec![chunk(b)]);
        let order_one: Vec<Uuid> = fused_one.iter().map(FusedCandidate::identity).collect();
        let order_two: Vec<Uuid> = fused_two.iter().map(FusedCandidate::identity).collect();
        assert_eq!(order_one, order_two);
    }
}
