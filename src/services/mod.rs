pub mod blob_store;
mod chunker;
mod coordinator;
mod embedding;
pub mod index_store;

pub use blob_store::{BlobStore, ObjectStoreBackend, create_blob_store};
pub use chunker::{TextChunker, estimate_tokens};
pub use coordinator::HybridDataStore;
pub use embedding::{Embedder, EmbeddingClient, InstructionType};
pub use index_store::{IndexStore, InMemoryIndex, create_backend};
