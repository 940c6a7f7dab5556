// ChunkPool - lock-free pool of hop-sized PCM chunks with dual SPSC queues
//
// Object pool built from two rtrb ring buffers so the capture side never
// allocates while streaming:
// - DATA queue: capture pushes filled hop chunks, detector consumes
// - POOL queue: detector returns emptied chunks, capture recycles
//
// Chunk flow:
// 1. Capture pops an empty chunk from POOL
// 2. Capture fills it with exactly `hop` PCM samples
// 3. Capture pushes it to DATA
// 4. Detector pops it from DATA and runs one pipeline hop
// 5. Detector pushes it back to POOL

use rtrb::{Consumer, Producer};

/// Default number of pre-allocated chunks (~320ms of audio at 10ms hops)
pub const DEFAULT_CHUNK_COUNT: usize = 32;

/// One hop of 16-bit PCM
pub type HopChunk = Vec<i16>;

/// All four queue endpoints, before being split between threads
pub struct ChunkPoolChannels {
    /// Producer for sending filled chunks to the detector thread
    pub data_producer: Producer<HopChunk>,
    /// Consumer for receiving filled chunks in the detector thread
    pub data_consumer: Consumer<HopChunk>,
    /// Producer for returning empty chunks from the detector thread
    pub pool_producer: Producer<HopChunk>,
    /// Consumer for retrieving empty chunks on the capture side
    pub pool_consumer: Consumer<HopChunk>,
}

/// Endpoints owned by the capture side
pub struct CaptureChannels {
    pub data_producer: Producer<HopChunk>,
    pub pool_consumer: Consumer<HopChunk>,
}

/// Endpoints owned by the detector thread
pub struct DetectorChannels {
    pub data_consumer: Consumer<HopChunk>,
    pub pool_producer: Producer<HopChunk>,
}

impl ChunkPoolChannels {
    /// Separate the endpoints by owning thread
    pub fn split(self) -> (CaptureChannels, DetectorChannels) {
        (
            CaptureChannels {
                data_producer: self.data_producer,
                pool_consumer: self.pool_consumer,
            },
            DetectorChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

/// Lock-free chunk pool using dual SPSC ring buffers
///
/// # Example
/// ```ignore
/// let (capture, detector) = ChunkPool::new(32, 160).split();
/// ```
pub struct ChunkPool;

impl ChunkPool {
    /// Pre-allocate `chunk_count` chunks of `hop` samples each
    ///
    /// # Panics
    /// Panics if chunk_count is 0 or hop is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(chunk_count: usize, hop: usize) -> ChunkPoolChannels {
        assert!(chunk_count > 0, "chunk_count must be greater than 0");
        assert!(hop > 0, "hop must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(chunk_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(chunk_count);

        // The only allocation site for chunks
        for _ in 0..chunk_count {
            let chunk = vec![0_i16; hop];
            pool_producer
                .push(chunk)
                .expect("Failed to push chunk to pool queue during initialization");
        }

        ChunkPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}
