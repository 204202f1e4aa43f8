//! Audio capture, block types, session clock and block ring.

pub mod block;
pub mod capture;
pub mod clock;
pub mod ring_buffer;

pub use block::{AudioBlock, CapturedBlock, StreamStatus};
pub use capture::{list_devices, start_capture, CaptureGuard, InputDeviceInfo};
pub use clock::SessionClock;
pub use ring_buffer::{block_ring_buffer, BlockConsumer, BlockProducer};
