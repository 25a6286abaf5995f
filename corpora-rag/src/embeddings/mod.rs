//! Embedding generation: provider backends and the cache-aside wrapper.

pub mod cache;
pub mod local;
pub mod memory;
pub mod openai;

pub use cache::{normalize, CachedEmbedder, NORMALIZATION_VERSION};
pub use local::LocalEmbeddings;
pub use memory::InMemoryCache;
pub use openai::OpenAiEmbeddings;
