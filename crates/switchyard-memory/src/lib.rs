pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod retrieval;
pub mod store;

pub use corpus::{
    CorpusStore, EventFilters, EventRecord, FileFilters, FileRecord, MessageFilters,
    MessageRecord,
};
pub use embeddings::{cosine_similarity, CachedEmbedder, EmbeddingProvider, HttpEmbeddingProvider};
pub use index::Indexer;
pub use retrieval::{HybridRetriever, ResourceFilters, RetrievalCandidate};
pub use store::SqliteCorpus;
