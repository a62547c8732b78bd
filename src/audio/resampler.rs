//! Channel mapping, resampling and fixed-size framing of raw capture buffers

use super::types::{AudioFrame, CaptureSpec};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{error, info};

/// Sinc resampler plus its per-channel input accumulators
struct Resampling {
    engine: SincFixedIn<f32>,
    input_frames: usize,
    planar: Vec<Vec<f32>>,
}

/// Turns raw device buffers into fixed-size frames at the configured rate
///
/// This is the capture context of a running pipeline: it holds the partially
/// filled frame between callbacks.
pub(crate) struct FrameAssembler {
    spec: CaptureSpec,
    source_channels: usize,
    resampling: Option<Resampling>,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub(crate) fn new(spec: CaptureSpec, source_rate: u32, source_channels: u16) -> Self {
        let channels = spec.channels.max(1) as usize;
        let resampling = if source_rate != spec.sample_rate && source_rate > 0 {
            create_resampler(source_rate, spec.sample_rate, spec.block_size, channels)
        } else {
            None
        };

        Self {
            spec,
            source_channels: source_channels.max(1) as usize,
            resampling,
            pending: Vec::with_capacity(spec.frame_len() * 2),
        }
    }

    /// Feed one raw interleaved buffer; returns every frame it completed
    pub(crate) fn push(&mut self, data: &[f32]) -> Vec<AudioFrame> {
        let target_channels = self.spec.channels.max(1) as usize;
        let mapped = map_channels(data, self.source_channels, target_channels);

        match self.resampling.as_mut() {
            Some(resampling) => {
                for (i, sample) in mapped.iter().enumerate() {
                    resampling.planar[i % target_channels].push(*sample);
                }
                let input_frames = resampling.input_frames;
                while resampling.planar[0].len() >= input_frames {
                    let chunk: Vec<Vec<f32>> = resampling
                        .planar
                        .iter_mut()
                        .map(|channel| channel.drain(..input_frames).collect())
                        .collect();
                    match resampling.engine.process(&chunk, None) {
                        Ok(resampled) => interleave_into(&resampled, &mut self.pending),
                        Err(e) => error!("Resampling error: {}", e),
                    }
                }
            }
            None => self.pending.extend_from_slice(&mapped),
        }

        self.drain_frames()
    }

    fn drain_frames(&mut self) -> Vec<AudioFrame> {
        let frame_len = self.spec.frame_len();
        let mut frames = Vec::new();
        while frame_len > 0 && self.pending.len() >= frame_len {
            frames.push(AudioFrame {
                samples: self.pending.drain(..frame_len).collect(),
                sample_rate: self.spec.sample_rate,
                channels: self.spec.channels,
            });
        }
        frames
    }
}

fn create_resampler(
    source_rate: u32,
    target_rate: u32,
    block_size: usize,
    channels: usize,
) -> Option<Resampling> {
    info!(
        "Creating resampler: {} Hz -> {} Hz",
        source_rate, target_rate
    );
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let input_frames =
        (block_size.max(1) as f64 * source_rate as f64 / target_rate as f64).ceil() as usize;
    match SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        input_frames,
        channels,
    ) {
        Ok(engine) => Some(Resampling {
            engine,
            input_frames,
            planar: vec![Vec::with_capacity(input_frames * 2); channels],
        }),
        Err(e) => {
            error!("Failed to create resampler, passing audio through: {}", e);
            None
        }
    }
}

/// Map interleaved samples between channel counts
///
/// Downmixing to mono averages each frame; other mappings take channels in
/// order and repeat the last source channel when the target has more.
pub(crate) fn map_channels(data: &[f32], from: usize, to: usize) -> Vec<f32> {
    let from = from.max(1);
    if from == to {
        return data.to_vec();
    }
    data.chunks(from)
        .flat_map(|frame| {
            if to == 1 {
                vec![frame.iter().sum::<f32>() / frame.len() as f32]
            } else {
                (0..to)
                    .map(|c| frame[c.min(frame.len() - 1)])
                    .collect::<Vec<f32>>()
            }
        })
        .collect()
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    for i in 0..frames {
        for channel in planar {
            out.push(channel[i]);
        }
    }
}
