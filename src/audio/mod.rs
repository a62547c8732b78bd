//! Audio capture using cpal for cross-platform microphone access
//!
//! The microphone is reached through the [`MicrophoneSource`] trait so the
//! session engine can run against real hardware or a test double. The cpal
//! implementation captures on a dedicated thread and delivers raw float
//! buffers; [`AudioPipeline`] turns them into fixed-size frames at the
//! configured rate.

mod pcm;
mod pipeline;
mod resampler;
mod types;

pub use pcm::{decode_pcm16, encode_base64_pcm16, encode_pcm16, sample_to_pcm16, PCM16_SCALE};
pub use pipeline::AudioPipeline;
pub use types::{AcquireError, AudioFrame, CaptureHandle, CaptureSpec, MicStream};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Raw buffers queued between the device callback and the pipeline
const SAMPLE_QUEUE_DEPTH: usize = 600;

/// Poll interval of the capture thread while it keeps the stream alive
const CAPTURE_POLL: Duration = Duration::from_millis(20);

/// Source of microphone streams
#[async_trait]
pub trait MicrophoneSource: Send + Sync {
    /// Acquire a capture stream, preferring the requested rate and channel count
    async fn acquire(&self, spec: CaptureSpec) -> Result<MicStream, AcquireError>;

    /// Release a stream previously returned by `acquire`
    fn release(&self, stream: &mut MicStream) {
        stream.release();
    }
}

/// Default input device of the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMicrophone;

#[async_trait]
impl MicrophoneSource for CpalMicrophone {
    async fn acquire(&self, spec: CaptureSpec) -> Result<MicStream, AcquireError> {
        let is_capturing = Arc::new(AtomicBool::new(true));
        let is_capturing_thread = is_capturing.clone();
        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_handle = thread::spawn(move || {
            run_capture(is_capturing_thread, sample_tx, spec.sample_rate, ready_tx);
        });

        let handle = CaptureHandle {
            is_capturing,
            thread_handle: Some(thread_handle),
        };

        match ready_rx.await {
            Ok(Ok((sample_rate, channels))) => {
                Ok(MicStream::new(sample_rate, channels, sample_rx).with_handle(handle))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AcquireError::CaptureThread),
        }
    }
}

/// Run audio capture on the current thread (blocking)
///
/// Reports the negotiated native format (or the failure) through `ready`, then
/// keeps the stream alive until `is_capturing` is cleared.
fn run_capture(
    is_capturing: Arc<AtomicBool>,
    sample_tx: mpsc::Sender<Vec<f32>>,
    target_sample_rate: u32,
    ready: oneshot::Sender<Result<(u32, u16), AcquireError>>,
) {
    let stream = match open_input_stream(&is_capturing, sample_tx, target_sample_rate) {
        Ok((stream, sample_rate, channels)) => {
            let _ = ready.send(Ok((sample_rate, channels)));
            stream
        }
        Err(e) => {
            error!("Audio capture error: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };

    while is_capturing.load(Ordering::SeqCst) {
        thread::sleep(CAPTURE_POLL);
    }

    drop(stream);
}

fn open_input_stream(
    is_capturing: &Arc<AtomicBool>,
    sample_tx: mpsc::Sender<Vec<f32>>,
    target_sample_rate: u32,
) -> Result<(cpal::Stream, u32, u16), AcquireError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(AcquireError::NoInputDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio input device: {}", device_name);

    let supported_configs = device
        .supported_input_configs()
        .map_err(|e| AcquireError::ConfigError(e.to_string()))?;

    // Prefer a config that supports the target rate, else any supported rate
    let mut best_config = None;
    let mut found_target_rate = false;

    for config in supported_configs {
        if config.channels() == 0 {
            continue;
        }
        if config.min_sample_rate().0 <= target_sample_rate
            && config.max_sample_rate().0 >= target_sample_rate
        {
            best_config = Some(config.with_sample_rate(cpal::SampleRate(target_sample_rate)));
            found_target_rate = true;
            break;
        } else if best_config.is_none() {
            best_config = Some(config.with_max_sample_rate());
        }
    }

    let supported_config = best_config.ok_or(AcquireError::NoSupportedConfig)?;

    if !found_target_rate {
        warn!(
            "{}Hz not supported, capturing at {}Hz and resampling",
            target_sample_rate,
            supported_config.sample_rate().0
        );
    }

    let sample_format = supported_config.sample_format();
    let config: cpal::StreamConfig = supported_config.into();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    info!("Audio config: {} channels, {} Hz", channels, sample_rate);

    let err_callback = |err| {
        error!("Audio stream error: {}", err);
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let is_capturing = is_capturing.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    if !is_capturing.load(Ordering::SeqCst) {
                        return;
                    }
                    let samples: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    forward_samples(&sample_tx, samples);
                },
                err_callback,
                None,
            )?
        }
        SampleFormat::F32 => {
            let is_capturing = is_capturing.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    if !is_capturing.load(Ordering::SeqCst) {
                        return;
                    }
                    forward_samples(&sample_tx, data.to_vec());
                },
                err_callback,
                None,
            )?
        }
        sample_format => {
            return Err(AcquireError::UnsupportedFormat(format!(
                "{:?}",
                sample_format
            )));
        }
    };

    stream.play()?;
    info!("Audio capture started");

    Ok((stream, sample_rate, channels))
}

fn forward_samples(sender: &mpsc::Sender<Vec<f32>>, samples: Vec<f32>) {
    // try_send so the device callback never blocks
    if let Err(e) = sender.try_send(samples) {
        if let mpsc::error::TrySendError::Full(_) = e {
            warn!("Audio buffer overflow - buffer dropped");
        }
    }
}
