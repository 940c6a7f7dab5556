// HopFeeder - capture-side adapter from arbitrary PCM reads to hop chunks
//
// Audio drivers deliver blocks of whatever size they like. The feeder stages
// samples until a full hop is available, moves it into a recycled pool chunk
// and pushes it onto the data queue. When the detector falls behind and the
// pool runs dry, the hop is dropped and counted; the capture side never
// blocks and never allocates after construction.

use crate::audio::chunk_pool::CaptureChannels;
use crate::telemetry;

pub struct HopFeeder {
    channels: CaptureChannels,
    hop: usize,
    staging: Vec<i16>,
    queue_capacity: usize,
    emitted_chunks: u64,
    dropped_chunks: u64,
}

impl HopFeeder {
    pub fn new(channels: CaptureChannels, hop: usize) -> Self {
        // Data queue is empty at this point, so free slots == capacity
        let queue_capacity = channels.data_producer.slots().max(1);
        Self {
            channels,
            hop,
            staging: Vec::with_capacity(hop),
            queue_capacity,
            emitted_chunks: 0,
            dropped_chunks: 0,
        }
    }

    /// Stage `samples` and forward every completed hop; returns hops emitted
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        let mut emitted = 0;
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.hop - self.staging.len()).min(rest.len());
            self.staging.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.staging.len() == self.hop {
                if self.forward_staged() {
                    emitted += 1;
                }
                self.staging.clear();
            }
        }
        emitted
    }

    fn forward_staged(&mut self) -> bool {
        let mut chunk = match self.channels.pool_consumer.pop() {
            Ok(chunk) => chunk,
            Err(_) => {
                self.dropped_chunks += 1;
                tracing::warn!(
                    "[HopFeeder] Chunk pool exhausted, dropping hop ({} dropped so far)",
                    self.dropped_chunks
                );
                return false;
            }
        };

        chunk.clear();
        chunk.extend_from_slice(&self.staging);

        if self.channels.data_producer.push(chunk).is_err() {
            self.dropped_chunks += 1;
            tracing::warn!("[HopFeeder] Data queue full, dropping hop");
            return false;
        }
        self.emitted_chunks += 1;

        let used = self.queue_capacity - self.channels.data_producer.slots();
        let occupancy = used as f32 / self.queue_capacity as f32 * 100.0;
        telemetry::hub().record_buffer_occupancy("hop_queue", occupancy);
        true
    }

    /// Empty chunks currently available to the capture side
    pub fn free_chunks(&self) -> usize {
        self.channels.pool_consumer.slots()
    }

    /// Samples waiting for the next full hop
    pub fn pending(&self) -> usize {
        self.staging.len()
    }

    pub fn emitted_chunks(&self) -> u64 {
        self.emitted_chunks
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }
}
