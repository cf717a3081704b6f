//! Chunk and query-result caches.

mod chunk_cache;
mod result_cache;

pub use chunk_cache::{hash_path, ChunkCache, ChunkData, ChunkKey};
pub use result_cache::ResultCache;
