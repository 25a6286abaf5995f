//! # corpora-rag
//!
//! The RAG engine of the corpora service:
//! - `chunking`: character-budgeted sliding-window chunker
//! - `extract`: MIME-dispatched text extraction (plain, PDF, DOCX)
//! - `embeddings`: provider backends plus the cache-aside wrapper with
//!   batch deduplication
//! - `fusion`: Reciprocal Rank Fusion and the reranker seam
//! - `context`: cited, delimited, length-bounded context assembly
//! - `generation`: versioned prompt templates and chat providers
//! - `pipeline`: the ingestion (intake / processor / worker) and
//!   retrieval-answer use cases, wired by a composition-root builder

#![warn(missing_debug_implementations)]

pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod extract;
pub mod fusion;
pub mod generation;
pub mod pipeline;

pub use chunking::{ChunkPiece, TextChunker};
pub use context::{BuiltContext, CitedChunk, ContextBuilder, FALLBACK_ANSWER};
pub use embeddings::{CachedEmbedder, InMemoryCache, LocalEmbeddings, OpenAiEmbeddings};
pub use extract::TextExtractor;
pub use fusion::{reciprocal_rank_fusion, FusedCandidate, Reranker, RRF_K};
pub use generation::{OpenAiChat, PromptTemplate};
pub use pipeline::{
    Answer, AnswerEvent, AnswerTimings, CancelHandle, DocumentIntake, IngestProcessor,
    IngestWorker, IntakeRequest, PipelineBuilder, ProcessOutcome, QueryOptions, QueryPipeline,
};
