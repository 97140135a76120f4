//! Microphone capture behind a swappable backend.
//!
//! The cpal backend is the production path: the device callback pushes f32
//! samples into a ring buffer, the pipeline worker drains and encodes them.
//! Tests substitute their own [`AudioSource`].

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::warn;
use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapRb};

/// Fixed capture format expected by the recognition service.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 1;

/// Ring capacity in samples (~2.7s at 48kHz); overruns drop the oldest
/// audio rather than blocking the device callback.
const RING_CAPACITY: usize = 16384 * 8;

/// Convert one float sample in [-1, 1] to signed 16-bit PCM.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Encode a float buffer as little-endian 16-bit PCM bytes.
pub fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
    }
    out
}

/// A running capture graph. Dropping the handle stops capture and releases
/// the microphone; the handle never leaves the thread that opened it.
pub trait CaptureHandle {
    /// Pop captured samples into `buf`, returning how many were written.
    fn read_samples(&mut self, buf: &mut [f32]) -> usize;
}

/// Microphone acquisition seam. Opening the source is the permission
/// request: any failure here is reported as "microphone unavailable".
pub trait AudioSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn CaptureHandle>>;
}

/// Default input device via cpal.
pub struct CpalSource;

struct CpalHandle {
    // Held only so the stream keeps running; dropped on teardown
    _stream: cpal::Stream,
    consumer: HeapCons<f32>,
}

impl CaptureHandle for CpalHandle {
    fn read_samples(&mut self, buf: &mut [f32]) -> usize {
        self.consumer.pop_slice(buf)
    }
}

impl AudioSource for CpalSource {
    fn open(&self) -> Result<Box<dyn CaptureHandle>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no input device available"))?;

        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut producer, consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let err_fn = |err| warn!("capture stream error: {err}");

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                let _ = producer.push_slice(data);
            },
            err_fn,
            None,
        )?;
        stream.play()?;

        Ok(Box::new(CpalHandle {
            _stream: stream,
            consumer,
        }))
    }
}
