//! Audio block types passed from capture to the gate.

use std::time::Duration;

/// Borrowed view of one block of interleaved samples.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    samples: &'a [f32],
    channels: u16,
    sample_rate: u32,
}

impl<'a> AudioBlock<'a> {
    /// `channels` of 0 is treated as mono.
    pub fn new(samples: &'a [f32], channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Single-channel block.
    pub fn mono(samples: &'a [f32], sample_rate: u32) -> Self {
        Self::new(samples, 1, sample_rate)
    }

    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames in the block (samples per channel). A trailing partial frame
    /// is ignored.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

/// Backend status flags attached to a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatus {
    /// Blocks were dropped before this one because the ring was full.
    pub input_overflow: bool,
    /// The backend capture clock jumped ahead of the delivered audio.
    pub input_discontinuity: bool,
}

impl StreamStatus {
    pub fn is_clean(&self) -> bool {
        !self.input_overflow && !self.input_discontinuity
    }

    pub fn describe(&self) -> String {
        match (self.input_overflow, self.input_discontinuity) {
            (true, true) => "input overflow, capture discontinuity".to_string(),
            (true, false) => "input overflow".to_string(),
            (false, true) => "capture discontinuity".to_string(),
            (false, false) => "ok".to_string(),
        }
    }
}

/// Owned block produced by the capture callback.
#[derive(Debug, Clone)]
pub struct CapturedBlock {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    /// Monotonic capture time, relative to the session clock origin.
    pub captured_at: Duration,
    pub status: StreamStatus,
}

impl CapturedBlock {
    pub fn as_block(&self) -> AudioBlock<'_> {
        AudioBlock::new(&self.samples, self.channels, self.sample_rate)
    }

    pub fn frame_count(&self) -> usize {
        self.as_block().frame_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        let samples = [0.0f32; 10];
        assert_eq!(AudioBlock::new(&samples, 2, 48_000).frame_count(), 5);
        assert_eq!(AudioBlock::new(&samples, 3, 48_000).frame_count(), 3);
        assert_eq!(AudioBlock::new(&samples, 0, 48_000).channels(), 1);
    }

    #[test]
    fn test_status_describe() {
        assert!(StreamStatus::default().is_clean());
        let status = StreamStatus {
            input_overflow: true,
            input_discontinuity: false,
        };
        assert!(!status.is_clean());
        assert_eq!(status.describe(), "input overflow");
    }
}
