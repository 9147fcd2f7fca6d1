//! Kaldi-compatible log mel filterbank features.
//!
//! Matches `compute-fbank-feats` with `--dither=0 --window-type=hanning
//! --use-energy=false --snip-edges=true`: DC removal, pre-emphasis, a
//! symmetric Hann window, a power spectrum zero-padded to the next power of
//! two, and triangular mel filters on the `1127 ln(1 + f/700)` scale.
use std::f64::consts::PI;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

#[derive(Debug, Clone, PartialEq)]
pub struct FbankOptions {
    pub sample_rate: u32,
    pub num_mel_bins: usize,
    pub frame_length_ms: f64,
    pub frame_shift_ms: f64,
    pub preemphasis: f64,
    pub low_freq: f64,
    /// Upper filter edge; zero or negative is an offset from Nyquist.
    pub high_freq: f64,
    pub remove_dc_offset: bool,
}

impl Default for FbankOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            num_mel_bins: 128,
            frame_length_ms: 25.0,
            frame_shift_ms: 10.0,
            preemphasis: 0.97,
            low_freq: 20.0,
            high_freq: 0.0,
            remove_dc_offset: true,
        }
    }
}

impl FbankOptions {
    pub fn window_size(&self) -> usize {
        (f64::from(self.sample_rate) * self.frame_length_ms * 0.001) as usize
    }

    pub fn window_shift(&self) -> usize {
        (f64::from(self.sample_rate) * self.frame_shift_ms * 0.001) as usize
    }

    /// Frames produced for `num_samples` with edge snipping.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        let (size, shift) = (self.window_size(), self.window_shift());
        if size == 0 || shift == 0 || num_samples < size {
            0
        } else {
            1 + (num_samples - size) / shift
        }
    }
}

fn mel_scale(freq: f64) -> f64 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

/// Symmetric (non-periodic) Hann window.
fn hann_window(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos())
        .collect()
}

/// Triangular filters, one row per mel bin, `padded / 2 + 1` columns; the
/// Nyquist column is always zero.
fn mel_banks(opts: &FbankOptions, padded: usize) -> Vec<Vec<f64>> {
    let sample_rate = f64::from(opts.sample_rate);
    let num_fft_bins = padded / 2;
    let nyquist = sample_rate / 2.0;
    let high = if opts.high_freq <= 0.0 {
        nyquist + opts.high_freq
    } else {
        opts.high_freq
    };
    let fft_bin_width = sample_rate / padded as f64;
    let mel_low = mel_scale(opts.low_freq);
    let mel_delta = (mel_scale(high) - mel_low) / (opts.num_mel_bins + 1) as f64;

    (0..opts.num_mel_bins)
        .map(|bin| {
            let left = mel_low + bin as f64 * mel_delta;
            let center = left + mel_delta;
            let right = center + mel_delta;
            let mut row = vec![0.0; num_fft_bins + 1];
            for (k, weight) in row.iter_mut().take(num_fft_bins).enumerate() {
                let mel = mel_scale(fft_bin_width * k as f64);
                let up = (mel - left) / (center - left);
                let down = (right - mel) / (right - center);
                *weight = up.min(down).max(0.0);
            }
            row
        })
        .collect()
}

/// Log mel energies, one `num_mel_bins` row per frame.
pub fn kaldi_fbank(samples: &[f32], opts: &FbankOptions) -> Vec<Vec<f32>> {
    let num_frames = opts.num_frames(samples.len());
    if num_frames == 0 {
        return Vec::new();
    }
    let size = opts.window_size();
    let shift = opts.window_shift();
    let padded = size.next_power_of_two();
    let window = hann_window(size);
    let banks = mel_banks(opts, padded);
    let floor = f64::from(f32::EPSILON);

    let fft = FftPlanner::<f64>::new().plan_fft_forward(padded);
    let mut buffer = vec![Complex::new(0.0, 0.0); padded];
    let mut frame = vec![0.0f64; size];

    let mut out = Vec::with_capacity(num_frames);
    for f in 0..num_frames {
        let start = f * shift;
        for (dst, src) in frame.iter_mut().zip(&samples[start..start + size]) {
            *dst = f64::from(*src);
        }
        if opts.remove_dc_offset {
            let mean = frame.iter().sum::<f64>() / size as f64;
            frame.iter_mut().for_each(|v| *v -= mean);
        }
        if opts.preemphasis != 0.0 {
            // back to front so every sample sees its unmodified predecessor
            for i in (1..size).rev() {
                frame[i] -= opts.preemphasis * frame[i - 1];
            }
            frame[0] -= opts.preemphasis * frame[0];
        }

        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = match (frame.get(i), window.get(i)) {
                (Some(v), Some(w)) => Complex::new(v * w, 0.0),
                _ => Complex::new(0.0, 0.0),
            };
        }
        fft.process(&mut buffer);

        let power: Vec<f64> = buffer[..=padded / 2].iter().map(|c| c.norm_sqr()).collect();
        let energies = banks
            .iter()
            .map(|bank| {
                let energy: f64 = bank.iter().zip(&power).map(|(w, p)| w * p).sum();
                energy.max(floor).ln() as f32
            })
            .collect();
        out.push(energies);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_snips_edges() {
        let opts = FbankOptions::default();
        assert_eq!(opts.window_size(), 400);
        assert_eq!(opts.window_shift(), 160);
        assert_eq!(opts.num_frames(399), 0);
        assert_eq!(opts.num_frames(400), 1);
        assert_eq!(opts.num_frames(32_000), 198);
        let samples = vec![0.25f32; 16_000];
        assert_eq!(kaldi_fbank(&samples, &opts).len(), 1 + (16_000 - 400) / 160);
    }

    #[test]
    fn silence_hits_the_log_floor() {
        let opts = FbankOptions::default();
        let frames = kaldi_fbank(&vec![0.0; 800], &opts);
        let floor = f32::EPSILON.ln();
        assert!(frames.iter().flatten().all(|v| (*v - floor).abs() < 1e-4));
    }

    #[test]
    fn hann_window_is_symmetric_with_zero_ends() {
        let w = hann_window(400);
        assert!(w[0].abs() < 1e-12 && w[399].abs() < 1e-12);
        assert!((w[100] - w[299]).abs() < 1e-12);
    }

    #[test]
    fn mel_filters_are_triangles_below_nyquist() {
        let opts = FbankOptions::default();
        let banks = mel_banks(&opts, 512);
        assert_eq!(banks.len(), 128);
        for row in &banks {
            assert_eq!(row.len(), 257);
            assert_eq!(row[256], 0.0);
            assert!(row.iter().all(|w| (0.0..=1.0).contains(w)));
        }
    }

    #[test]
    fn tone_energy_lands_in_matching_bin() {
        let opts = FbankOptions {
            num_mel_bins: 40,
            ..FbankOptions::default()
        };
        let tone: Vec<f32> = (0..4_000)
            .map(|i| (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 16_000.0).sin())
            .collect();
        let frames = kaldi_fbank(&tone, &opts);
        let frame = &frames[5];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();

        let mel_low = mel_scale(20.0);
        let delta = (mel_scale(8_000.0) - mel_low) / 41.0;
        let expected = ((mel_scale(1_000.0) - mel_low) / delta).round() as usize - 1;
        assert!(peak.abs_diff(expected) <= 1, "peak {peak}, expected {expected}");
    }
}
