//! Remote collaborators: archive source trait, bucket client, in-memory source, decompression.

pub mod archive;
pub mod circuit_breaker;
pub mod listing;
pub mod memory;
pub mod provider;
pub mod vision;

pub use archive::{extract_single, Payload};
pub use circuit_breaker::CircuitBreaker;
pub use memory::MemorySource;
pub use provider::{ArchiveSource, SymbolInfo};
pub use vision::{VisionSettings, VisionSource};
