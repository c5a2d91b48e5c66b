//! Lock-free SPSC ring buffer between the capture callback and the level worker.
//!
//! Uses `ringbuf::HeapRb<f32>` whose `push_slice` is wait-free and never
//! allocates, so the capture side can call it from a real-time thread.
//! The ring is bounded: when the worker falls behind, new samples are dropped
//! rather than queued without limit.

pub mod block;

use ringbuf::{traits::Split, HeapRb};
use tracing::warn;

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, handed to the external capture collaborator.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the level worker thread.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Default capacity: 2^20 = 1 048 576 f32 samples ≈ 23.8 s at 44.1 kHz.
pub const DEFAULT_RING_CAPACITY: usize = 1 << 20;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_sample_ring(capacity: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(capacity).split()
}

/// Push `samples` into the ring, returning how many were dropped because it was full.
pub fn push_samples(producer: &mut SampleProducer, samples: &[f32]) -> usize {
    let written = producer.push_slice(samples);
    let dropped = samples.len() - written;
    if dropped > 0 {
        warn!(dropped, "sample ring full, dropping samples");
    }
    dropped
}
