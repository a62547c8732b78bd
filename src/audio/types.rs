//! Audio types and error definitions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::info;

/// Capture parameters requested for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSpec {
    /// Sample rate frames are delivered at (Hz)
    pub sample_rate: u32,
    /// Interleaved channel count of delivered frames
    pub channels: u16,
    /// Samples per channel in one frame
    pub block_size: usize,
}

impl CaptureSpec {
    /// Number of interleaved samples in one frame
    pub fn frame_len(&self) -> usize {
        self.block_size * self.channels.max(1) as usize
    }
}

/// Fixed-length block of floating-point samples produced by one capture callback
///
/// Samples are interleaved when `channels > 1`. Frames are transient: they are
/// encoded and sent (or dropped) by the callback that produced them.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle for controlling a capture thread from outside
///
/// The capture stops when this handle is stopped or dropped.
pub struct CaptureHandle {
    pub(crate) is_capturing: Arc<AtomicBool>,
    pub(crate) thread_handle: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Stop capturing audio and join the capture thread
    ///
    /// Inside a tokio runtime the join runs on the blocking pool.
    pub fn stop(&mut self) {
        self.is_capturing.store(false, Ordering::SeqCst);
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        let join = move || {
            let _ = handle.join();
            info!("Audio capture stopped");
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(join);
            }
            Err(_) => join(),
        }
    }

    #[cfg(test)]
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An acquired microphone stream
///
/// Delivers raw interleaved sample buffers at the device's native rate and
/// channel count. Releasing the stream stops the underlying hardware capture;
/// releasing twice is a no-op.
pub struct MicStream {
    /// Native sample rate of the delivered buffers
    pub sample_rate: u32,
    /// Native channel count of the delivered buffers
    pub channels: u16,
    samples: Option<mpsc::Receiver<Vec<f32>>>,
    handle: Option<CaptureHandle>,
    released: bool,
}

impl MicStream {
    /// Wrap a receiver of raw sample buffers
    pub fn new(sample_rate: u32, channels: u16, samples: mpsc::Receiver<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Some(samples),
            handle: None,
            released: false,
        }
    }

    pub(crate) fn with_handle(mut self, handle: CaptureHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Take the raw sample receiver; only the first caller gets it
    pub fn take_samples(&mut self) -> Option<mpsc::Receiver<Vec<f32>>> {
        self.samples.take()
    }

    /// Stop the hardware capture and drop any undelivered buffers
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
        self.samples = None;
        self.released = true;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MicStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Errors that can occur while acquiring the microphone
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("No supported audio configuration found")]
    NoSupportedConfig,

    #[error("Microphone unavailable: {0}")]
    Unavailable(String),

    #[error("Audio configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio capture thread exited before the stream started")]
    CaptureThread,

    #[error("Audio stream error: {0}")]
    StreamError(#[from] cpal::BuildStreamError),

    #[error("Audio play error: {0}")]
    PlayError(#[from] cpal::PlayStreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_idempotent_and_drops_samples() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = MicStream::new(24000, 1, rx);
        assert!(!stream.is_released());
        stream.release();
        stream.release();
        assert!(stream.is_released());
        assert!(stream.take_samples().is_none());
        assert!(tx.is_closed());
    }

    fn capture_thread(is_capturing: &Arc<AtomicBool>) -> CaptureHandle {
        let flag = is_capturing.clone();
        CaptureHandle {
            is_capturing: is_capturing.clone(),
            thread_handle: Some(std::thread::spawn(move || {
                while flag.load(Ordering::SeqCst) {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            })),
        }
    }

    #[test]
    fn stop_outside_runtime_joins_the_thread() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut handle = capture_thread(&flag);
        assert!(handle.is_capturing());
        handle.stop();
        assert!(!handle.is_capturing());
        assert!(handle.thread_handle.is_none());
        handle.stop();
    }

    #[tokio::test]
    async fn stop_inside_runtime_hands_the_join_off() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut handle = capture_thread(&flag);
        handle.stop();
        assert!(!flag.load(Ordering::SeqCst));
        assert!(handle.thread_handle.is_none());
    }

    #[test]
    fn frame_len_counts_all_channels() {
        let spec = CaptureSpec {
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
        };
        assert_eq!(spec.frame_len(), 2048);
    }
}
