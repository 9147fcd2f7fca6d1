use std::io::Cursor;

use bindserve_core::Modality;
use candle_core::{Device, Tensor};
use hound::{SampleFormat, WavReader};

use super::fbank::{FbankOptions, kaldi_fbank};
use super::resample::resample;
use crate::config::AudioConfig;
use crate::error::ModelError;

/// Sample rates accepted from a WAV header.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 1_000..=384_000;

/// Mono PCM samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode WAV bytes, keeping the first channel.
///
/// Integer PCM is scaled by `2^(bits-1)`; 32-bit float is taken as is.
pub fn decode_wav(bytes: &[u8]) -> Result<Waveform, ModelError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };
    let samples = interleaved.into_iter().step_by(channels).collect();
    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Start and end (seconds) of `clips` evenly spaced clips of `clip_duration`.
///
/// The first clip starts at zero and the last ends at the end of the audio;
/// audio shorter than one clip yields clips that all start at zero.
pub fn clip_timepoints(duration: f64, clip_duration: f64, clips: usize) -> Vec<(f64, f64)> {
    let max_start = (duration - clip_duration).max(0.0);
    let spacing = if clips > 1 {
        max_start / (clips - 1) as f64
    } else {
        0.0
    };
    (0..clips)
        .map(|i| {
            let start = spacing * i as f64;
            (start, start + clip_duration)
        })
        .collect()
}

/// WAV bytes to normalised log-mel clips.
#[derive(Debug, Clone)]
pub struct AudioPreprocessor {
    config: AudioConfig,
    fbank: FbankOptions,
}

impl AudioPreprocessor {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            fbank: FbankOptions {
                sample_rate: config.sample_rate,
                num_mel_bins: config.num_mel_bins,
                ..FbankOptions::default()
            },
            config: config.clone(),
        }
    }

    /// `[clips, 1, mel_bins, target_length]` for one audio item, flattened.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<f32>, ModelError> {
        let waveform = decode_wav(bytes)?;
        if waveform.samples.is_empty() {
            return Err(ModelError::Dimension("WAV contains no samples".into()));
        }
        if !SAMPLE_RATE_RANGE.contains(&waveform.sample_rate) {
            return Err(ModelError::Dimension(format!(
                "sample rate {} Hz is outside {}..={} Hz",
                waveform.sample_rate,
                SAMPLE_RATE_RANGE.start(),
                SAMPLE_RATE_RANGE.end()
            )));
        }
        let rate = self.config.sample_rate;
        let samples = resample(&waveform.samples, waveform.sample_rate, rate);
        let duration = samples.len() as f64 / f64::from(rate);

        let clip_len = self.config.num_mel_bins * self.config.target_length;
        let mut out = Vec::with_capacity(self.config.clips_per_item * clip_len);
        for (start, end) in clip_timepoints(
            duration,
            self.config.clip_duration,
            self.config.clips_per_item,
        ) {
            let lo = ((start * f64::from(rate)) as usize).min(samples.len());
            let hi = ((end * f64::from(rate)) as usize).min(samples.len());
            let clip = self.clip_melspec(&samples[lo..hi]);
            out.extend(
                clip.into_iter()
                    .map(|v| (v - self.config.mean) / self.config.std),
            );
        }
        Ok(out)
    }

    pub fn process_batch(&self, items: &[Vec<u8>], device: &Device) -> Result<Tensor, ModelError> {
        let mut flat = Vec::new();
        for (index, bytes) in items.iter().enumerate() {
            let clips = self
                .process(bytes)
                .map_err(|e| e.at_item(Modality::Audio, index))?;
            flat.extend(clips);
        }
        Ok(Tensor::from_vec(
            flat,
            (
                items.len(),
                self.config.clips_per_item,
                1,
                self.config.num_mel_bins,
                self.config.target_length,
            ),
            device,
        )?)
    }

    /// Mean-removed clip to a `[mel_bins, target_length]` filterbank, row-major.
    fn clip_melspec(&self, clip: &[f32]) -> Vec<f32> {
        let mean = if clip.is_empty() {
            0.0
        } else {
            clip.iter().map(|&s| f64::from(s)).sum::<f64>() / clip.len() as f64
        };
        let centred: Vec<f32> = clip.iter().map(|&s| (f64::from(s) - mean) as f32).collect();
        let frames = kaldi_fbank(&centred, &self.fbank);

        let n_frames = frames.len();
        let target = self.config.target_length;
        if n_frames > 0 && (n_frames as f64 - target as f64).abs() / n_frames as f64 > 0.2 {
            tracing::warn!(
                frames = n_frames,
                target,
                "Large gap between audio frame count and target length"
            );
        }
        let bins = self.config.num_mel_bins;
        let mut out = vec![0f32; bins * target];
        for (t, frame) in frames.iter().take(target).enumerate() {
            for (m, value) in frame.iter().enumerate() {
                out[m * target + t] = *value;
            }
        }
        out
    }
}
