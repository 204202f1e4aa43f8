//! Audio capture via cpal.
//!
//! Opens the default (or selected) input device at the configured sample
//! rate, slices the interleaved callback data into fixed `block_size`-frame
//! blocks, stamps each with the session clock and pushes it to the block
//! ring for the driver. The stream is released when the returned
//! [`CaptureGuard`] is dropped.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig, StreamInstant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::block::{CapturedBlock, StreamStatus};
use super::clock::SessionClock;
use super::ring_buffer::BlockProducer;
use crate::config::{DeviceSelector, GateParams};
use crate::error::{GateError, GateResult};

/// Slack allowed between consecutive callbacks before a gap is reported.
const DISCONTINUITY_SLACK: Duration = Duration::from_millis(10);

/// An input device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InputDeviceInfo {
    pub id: usize,
    pub name: String,
}

/// List available input devices, in host order.
pub fn list_devices() -> Vec<InputDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for (id, dev) in inputs.enumerate() {
            if let Ok(name) = dev.name() {
                devices.push(InputDeviceInfo { id, name });
            }
        }
    }
    devices
}

/// Find the input device for `selector`, or the host default.
fn resolve_device(selector: Option<&DeviceSelector>) -> GateResult<cpal::Device> {
    let host = cpal::default_host();
    let enumerate = || {
        host.input_devices()
            .map_err(|e| GateError::device(format!("Failed to enumerate input devices: {e}")))
    };

    match selector {
        Some(DeviceSelector::Index(index)) => enumerate()?
            .nth(*index)
            .ok_or_else(|| GateError::device(format!("No input device at index {index}"))),
        Some(DeviceSelector::Name(name)) => enumerate()?
            .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
            .ok_or_else(|| GateError::device(format!("Input device not found: {name}"))),
        None => host
            .default_input_device()
            .ok_or_else(|| GateError::device("No default input device available")),
    }
}

/// Keeps the capture stream alive. Dropping it stops the device.
pub struct CaptureGuard {
    stream: Stream,
    device_name: String,
    channels: u16,
}

impl CaptureGuard {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause input stream on release: {}", e);
        }
        info!(device = %self.device_name, "Audio capture released");
    }
}

/// Slices callback data into fixed-size blocks and tracks capture gaps.
struct BlockAssembler {
    block_len: usize,
    channels: u16,
    sample_rate: u32,
    pending: Vec<f32>,
    last_capture: Option<(StreamInstant, usize)>,
    last_stamp: Option<Duration>,
    gap_pending: bool,
}

impl BlockAssembler {
    fn new(block_size: usize, channels: u16, sample_rate: u32) -> Self {
        let block_len = block_size * channels.max(1) as usize;
        Self {
            block_len,
            channels,
            sample_rate,
            pending: Vec::with_capacity(block_len * 2),
            last_capture: None,
            last_stamp: None,
            gap_pending: false,
        }
    }

    fn frames_to_duration(&self, frames: usize) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }

    /// Record the backend capture time of a callback delivering `frames`.
    fn observe(&mut self, capture: StreamInstant, frames: usize) {
        if let Some((prev, prev_frames)) = self.last_capture {
            if let Some(elapsed) = capture.duration_since(&prev) {
                self.note_interval(elapsed, self.frames_to_duration(prev_frames));
            }
        }
        self.last_capture = Some((capture, frames));
    }

    /// Flag a discontinuity if the backend clock advanced further than the
    /// audio it delivered since the previous callback.
    fn note_interval(&mut self, elapsed: Duration, expected: Duration) {
        if elapsed > expected * 2 + DISCONTINUITY_SLACK {
            self.gap_pending = true;
        }
    }

    /// Append one callback's samples and push every completed block.
    ///
    /// `now` is the session time at which the callback ran, taken as the
    /// arrival of the last frame in `data`. Each block is stamped with the
    /// arrival of its own last frame, so blocks from one large callback are
    /// spaced one block duration apart. Stamps never decrease.
    fn push(&mut self, data: &[f32], now: Duration, producer: &mut BlockProducer) {
        let channels = self.channels.max(1) as usize;
        let data_start = now.saturating_sub(self.frames_to_duration(data.len() / channels));
        let mut consumed = 0;

        while self.pending.len() + (data.len() - consumed) >= self.block_len {
            let take = self.block_len - self.pending.len();
            let mut samples = producer.take_buffer(self.block_len);
            samples.extend_from_slice(&self.pending);
            samples.extend_from_slice(&data[consumed..consumed + take]);
            self.pending.clear();
            consumed += take;

            let mut captured_at = data_start + self.frames_to_duration(consumed / channels);
            if let Some(last) = self.last_stamp {
                captured_at = captured_at.max(last);
            }
            self.last_stamp = Some(captured_at);

            let status = StreamStatus {
                input_overflow: false,
                input_discontinuity: std::mem::take(&mut self.gap_pending),
            };
            // Ring full: the block is dropped and the next one is flagged.
            producer.push(CapturedBlock {
                samples,
                channels: self.channels,
                sample_rate: self.sample_rate,
                captured_at,
                status,
            });
        }
        self.pending.extend_from_slice(&data[consumed..]);
    }
}

/// Start audio capture.
///
/// Backend stream errors are forwarded on `errors` as
/// [`GateError::StreamInterrupted`]; they never stop the stream.
pub fn start_capture(
    params: &GateParams,
    selector: Option<&DeviceSelector>,
    mut producer: BlockProducer,
    clock: SessionClock,
    errors: mpsc::UnboundedSender<GateError>,
) -> GateResult<CaptureGuard> {
    if let Some(sel) = selector {
        info!(selector = %sel, "Resolving input device");
    }
    let device = resolve_device(selector)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %device_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| GateError::device(format!("Failed to get default input config: {e}")))?;
    let channels = default_config.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(params.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        sample_rate = params.sample_rate,
        channels,
        block_size = params.block_size,
        "Input stream config"
    );

    let mut assembler = BlockAssembler::new(params.block_size, channels, params.sample_rate);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], info: &cpal::InputCallbackInfo| {
                let frames = data.len() / channels.max(1) as usize;
                assembler.observe(info.timestamp().capture, frames);
                assembler.push(data, clock.now(), &mut producer);
            },
            move |err| {
                error!("Audio input stream error: {}", err);
                let _ = errors.send(GateError::StreamInterrupted {
                    reason: err.to_string(),
                });
            },
            None,
        )
        .map_err(|e| GateError::device(format!("Failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| GateError::device(format!("Failed to start input stream: {e}")))?;

    info!("Audio capture started");

    Ok(CaptureGuard {
        stream,
        device_name,
        channels,
    })
}
