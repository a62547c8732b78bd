//! Audio capture pipeline
//!
//! Owns an acquired microphone stream while a session is streaming. Raw device
//! buffers are assembled into fixed-size frames and handed to the registered
//! frame callback. Whether a frame is actually sent is decided by the callback
//! owner on every invocation.

use super::resampler::FrameAssembler;
use super::types::{AudioFrame, CaptureSpec, MicStream};
use super::MicrophoneSource;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Running capture pipeline for one streaming session
pub struct AudioPipeline {
    callback: Option<JoinHandle<()>>,
    context: Arc<Mutex<Option<FrameAssembler>>>,
    stream: Option<MicStream>,
}

impl AudioPipeline {
    /// Open a capture context on `stream` and register `on_frame` as the periodic callback
    pub fn open<F>(mut stream: MicStream, spec: CaptureSpec, on_frame: F) -> Self
    where
        F: Fn(AudioFrame) + Send + 'static,
    {
        info!(
            native_rate = stream.sample_rate,
            native_channels = stream.channels,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            block_size = spec.block_size,
            "Opening audio capture pipeline"
        );

        let context = Arc::new(Mutex::new(Some(FrameAssembler::new(
            spec,
            stream.sample_rate,
            stream.channels,
        ))));

        let callback = stream.take_samples().map(|mut samples| {
            let context = context.clone();
            tokio::spawn(async move {
                while let Some(buffer) = samples.recv().await {
                    let frames = {
                        let mut guard = match context.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        match guard.as_mut() {
                            Some(assembler) => assembler.push(&buffer),
                            None => break,
                        }
                    };
                    for frame in frames {
                        on_frame(frame);
                    }
                }
                debug!("Audio frame callback finished");
            })
        });

        Self {
            callback,
            context,
            stream: Some(stream),
        }
    }

    /// Tear the pipeline down
    ///
    /// Disconnects the callback, closes the capture context and releases the
    /// hardware stream through `source`. Every step runs even if an earlier
    /// one already happened; calling this again is a no-op.
    pub fn close(&mut self, source: &dyn MicrophoneSource) {
        if let Some(callback) = self.callback.take() {
            callback.abort();
        }

        let mut context = match self.context.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        context.take();
        drop(context);

        if let Some(mut stream) = self.stream.take() {
            source.release(&mut stream);
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback.abort();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}
