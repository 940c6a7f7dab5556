// Audio module - hand-off between the capture side and the detector thread

pub mod capture;
pub mod chunk_pool;

// Re-export commonly used types for convenience
pub use capture::HopFeeder;
pub use chunk_pool::{
    CaptureChannels, ChunkPool, ChunkPoolChannels, DetectorChannels, HopChunk, DEFAULT_CHUNK_COUNT,
};
