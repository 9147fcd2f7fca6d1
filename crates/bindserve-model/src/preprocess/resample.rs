//! Band-limited resampling with a Hann-windowed sinc kernel.
use std::f64::consts::PI;

const LOWPASS_FILTER_WIDTH: f64 = 6.0;
const ROLLOFF: f64 = 0.99;

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Above this many precomputed taps, weights are evaluated per output sample.
const MAX_TABLE_TAPS: usize = 1 << 20;

/// Windowed sinc for a gcd-reduced `orig -> new` ratio.
///
/// Output phase `p` of a frame reads padded inputs `k` in `0..2 * width + orig`
/// relative to the frame start.
#[derive(Debug, Clone, Copy)]
struct SincFilter {
    orig: u32,
    new: u32,
    width: usize,
    base_freq: f64,
    scale: f64,
}

impl SincFilter {
    fn new(orig: u32, new: u32) -> Self {
        let base_freq = f64::from(orig.min(new)) * ROLLOFF;
        Self {
            orig,
            new,
            width: (LOWPASS_FILTER_WIDTH * f64::from(orig) / base_freq).ceil() as usize,
            base_freq,
            scale: base_freq / f64::from(orig),
        }
    }

    fn span(&self) -> usize {
        2 * self.width + self.orig as usize
    }

    fn tap(&self, k: usize, phase: u32) -> f64 {
        let idx = (k as f64 - self.width as f64) / f64::from(self.orig);
        let t = (idx - f64::from(phase) / f64::from(self.new)) * self.base_freq;
        let t = t.clamp(-LOWPASS_FILTER_WIDTH, LOWPASS_FILTER_WIDTH);
        let window = (t * PI / LOWPASS_FILTER_WIDTH / 2.0).cos().powi(2);
        let t = t * PI;
        let sinc = if t == 0.0 { 1.0 } else { t.sin() / t };
        sinc * window * self.scale
    }

    /// Inputs with a non-zero weight for `phase`; the window vanishes beyond
    /// `width` samples either side of the phase centre.
    fn support(&self, phase: u32) -> std::ops::RangeInclusive<usize> {
        let centre =
            self.width as f64 + f64::from(self.orig) * f64::from(phase) / f64::from(self.new);
        let lo = (centre - self.width as f64).floor().max(0.0) as usize;
        let hi = ((centre + self.width as f64).ceil() as usize).min(self.span() - 1);
        lo..=hi
    }

    /// One row of `span()` taps per phase, or `None` when that exceeds `max_taps`.
    fn table(&self, max_taps: usize) -> Option<Vec<Vec<f64>>> {
        (self.new as usize)
            .checked_mul(self.span())
            .filter(|taps| *taps <= max_taps)?;
        Some(
            (0..self.new)
                .map(|phase| (0..self.span()).map(|k| self.tap(k, phase)).collect())
                .collect(),
        )
    }
}

/// Resample `samples` from `orig_rate` to `new_rate`.
///
/// The output has `ceil(len * new / orig)` samples after reducing the rate
/// ratio by its gcd.
pub fn resample(samples: &[f32], orig_rate: u32, new_rate: u32) -> Vec<f32> {
    resample_with(samples, orig_rate, new_rate, MAX_TABLE_TAPS)
}

fn resample_with(samples: &[f32], orig_rate: u32, new_rate: u32, max_table_taps: usize) -> Vec<f32> {
    if orig_rate == new_rate || samples.is_empty() || orig_rate == 0 || new_rate == 0 {
        return samples.to_vec();
    }
    let g = gcd(orig_rate, new_rate);
    let (orig, new) = (orig_rate / g, new_rate / g);
    let filter = SincFilter::new(orig, new);
    let table = filter.table(max_table_taps);

    let length = samples.len();
    let target = (new as usize * length).div_ceil(orig as usize);
    let frames = length / orig as usize + 1;
    // padded[p] = samples[p - width] inside the signal, zero elsewhere
    let sample_at = |p: usize| -> f64 {
        p.checked_sub(filter.width)
            .and_then(|i| samples.get(i))
            .map_or(0.0, |s| f64::from(*s))
    };

    let mut out = Vec::with_capacity(target);
    'frames: for frame in 0..frames {
        let start = frame * orig as usize;
        for phase in 0..new {
            if out.len() == target {
                break 'frames;
            }
            let acc: f64 = match &table {
                Some(rows) => rows[phase as usize]
                    .iter()
                    .enumerate()
                    .map(|(k, tap)| sample_at(start + k) * tap)
                    .sum(),
                None => filter
                    .support(phase)
                    .map(|k| sample_at(start + k) * filter.tap(k, phase))
                    .sum(),
            };
            out.push(acc as f32);
        }
    }
    out
}
