//! Lock-free SPSC ring of captured blocks.
//!
//! Uses the `ringbuf` crate to hand whole blocks from the cpal callback
//! thread to the driver without locks. When the ring is full the newest
//! block is dropped and the next block that fits is flagged as an overflow.
//!
//! A second ring runs the other way and returns spent sample buffers to the
//! producer, so the callback reuses them instead of allocating per block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

use super::block::CapturedBlock;

/// Default capacity: ~3 seconds of 1024-frame blocks at 44.1 kHz.
pub const DEFAULT_CAPACITY: usize = 128;

/// Producer half, lives in the cpal audio callback thread.
pub struct BlockProducer {
    inner: ringbuf::HeapProd<CapturedBlock>,
    spent: ringbuf::HeapCons<Vec<f32>>,
    dropped: Arc<AtomicU64>,
    pending_overflow: bool,
}

/// Consumer half, lives in the driver task.
pub struct BlockConsumer {
    inner: ringbuf::HeapCons<CapturedBlock>,
    spent: ringbuf::HeapProd<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

/// Create a matched producer/consumer pair.
pub fn block_ring_buffer(capacity: Option<usize>) -> (BlockProducer, BlockConsumer) {
    let cap = capacity.unwrap_or(DEFAULT_CAPACITY).max(1);
    let rb = HeapRb::<CapturedBlock>::new(cap);
    let (prod, cons) = rb.split();
    let (spent_prod, spent_cons) = HeapRb::<Vec<f32>>::new(cap).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        BlockProducer {
            inner: prod,
            spent: spent_cons,
            dropped: Arc::clone(&dropped),
            pending_overflow: false,
        },
        BlockConsumer {
            inner: cons,
            spent: spent_prod,
            dropped,
        },
    )
}

impl BlockProducer {
    /// An empty sample buffer, recycled from the consumer when one is
    /// available.
    pub fn take_buffer(&mut self, capacity: usize) -> Vec<f32> {
        match self.spent.try_pop() {
            Some(mut buf) => {
                buf.clear();
                buf.reserve(capacity);
                buf
            }
            None => Vec::with_capacity(capacity),
        }
    }

    /// Push a block. Returns `false` if the ring was full and the block was
    /// dropped.
    pub fn push(&mut self, mut block: CapturedBlock) -> bool {
        if self.pending_overflow {
            block.status.input_overflow = true;
        }
        match self.inner.try_push(block) {
            Ok(()) => {
                self.pending_overflow = false;
                true
            }
            Err(_) => {
                self.pending_overflow = true;
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl BlockConsumer {
    /// Pop the oldest block, if any.
    pub fn pop(&mut self) -> Option<CapturedBlock> {
        self.inner.try_pop()
    }

    /// Hand a processed block's buffer back to the producer. Dropped if the
    /// return ring is full.
    pub fn recycle(&mut self, buf: Vec<f32>) {
        let _ = self.spent.try_push(buf);
    }

    /// Number of blocks waiting.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Total blocks dropped on overflow since the ring was created.
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::block::StreamStatus;
    use std::time::Duration;

    fn block(marker: f32) -> CapturedBlock {
        CapturedBlock {
            samples: vec![marker; 4],
            channels: 1,
            sample_rate: 44_100,
            captured_at: Duration::ZERO,
            status: StreamStatus::default(),
        }
    }

    #[test]
    fn test_fifo_order() {
        let (mut prod, mut cons) = block_ring_buffer(Some(4));
        assert!(prod.push(block(1.0)));
        assert!(prod.push(block(2.0)));
        assert_eq!(cons.available(), 2);
        assert_eq!(cons.pop().unwrap().samples[0], 1.0);
        assert_eq!(cons.pop().unwrap().samples[0], 2.0);
        assert!(cons.pop().is_none());
    }

    #[test]
    fn test_overflow_flags_next_block() {
        let (mut prod, mut cons) = block_ring_buffer(Some(1));
        assert!(prod.push(block(1.0)));
        assert!(!prod.push(block(2.0)));
        assert_eq!(cons.dropped_total(), 1);

        let first = cons.pop().unwrap();
        assert!(first.status.is_clean());

        assert!(prod.push(block(3.0)));
        let next = cons.pop().unwrap();
        assert_eq!(next.samples[0], 3.0);
        assert!(next.status.input_overflow);

        assert!(prod.push(block(4.0)));
        assert!(cons.pop().unwrap().status.is_clean());
    }

    #[test]
    fn test_recycled_buffers_are_reused() {
        let (mut prod, mut cons) = block_ring_buffer(Some(2));
        assert!(prod.push(block(1.0)));

        let spent = cons.pop().unwrap().samples;
        let ptr = spent.as_ptr();
        cons.recycle(spent);

        let buf = prod.take_buffer(4);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 4);
        assert_eq!(buf.as_ptr(), ptr);

        // Pool empty again: a fresh buffer is allocated.
        let fresh = prod.take_buffer(4);
        assert!(fresh.capacity() >= 4);
        assert_ne!(fresh.as_ptr(), ptr);
    }
}
