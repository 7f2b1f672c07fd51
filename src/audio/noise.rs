/// Frequency-domain noise profile of a microphone capture
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::models::NoiseProfile;

/// How the usable spectrum is divided into the low, mid and high bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSplit {
    /// "High-pass" cutoff: bins below this index are ignored
    pub noise_floor: usize,
    /// Share of the usable range counted in the low band (0.5 = 50%)
    pub low: f64,
    /// Share of the usable range counted in the mid band
    pub mid: f64,
    /// Share for the high band. Defaults to whatever `low` and `mid` leave over;
    /// a smaller value acts as a low-pass.
    pub high: Option<f64>,
}

impl Default for BandSplit {
    fn default() -> Self {
        BandSplit {
            noise_floor: 100,
            low: 0.12,
            mid: 0.36,
            high: None,
        }
    }
}

impl BandSplit {
    pub fn high_fraction(&self) -> f64 {
        self.high.unwrap_or(1.0 - self.low - self.mid)
    }
}

/// Magnitude spectrum of a real signal using an FFT of exactly `size` points.
///
/// Like numpy's `rfft(x, n)`, the input is truncated or zero-padded to `size`
/// and only the non-negative frequency bins (`size / 2 + 1`) are returned.
pub fn magnitude_spectrum(samples: &[f64], size: usize) -> Vec<f64> {
    if size == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .take(size)
        .map(|&s| Complex::new(s, 0.0))
        .collect();
    buffer.resize(size, Complex::new(0.0, 0.0));

    let fft = FftPlanner::<f64>::new().plan_fft_forward(size);
    fft.process(&mut buffer);

    buffer[..size / 2 + 1].iter().map(|c| c.norm()).collect()
}

fn band_mean(magnitude: &[f64], start: usize, end: usize) -> f64 {
    // Edges past the spectrum clamp to it; an empty band yields NaN
    let end = end.min(magnitude.len());
    let band = &magnitude[start.min(end)..end];
    band.iter().sum::<f64>() / band.len() as f64
}

/// Bins a capture into three bands and reports each band's mean magnitude.
///
/// The spectrum is sized to `sample_rate` points so bin index tracks
/// frequency in Hz. Band boundaries truncate to whole bins; `amp_total` is
/// the plain mean of the three band amplitudes.
pub fn profile(samples: &[f64], sample_rate: usize, split: &BandSplit) -> NoiseProfile {
    let magnitude = magnitude_spectrum(samples, sample_rate);

    let sample_count = (sample_rate / 2).saturating_sub(split.noise_floor) as f64;

    let mid_start = split.noise_floor + (sample_count * split.low) as usize;
    let high_start = mid_start + (sample_count * split.mid) as usize;
    let noise_ceiling = high_start + (sample_count * split.high_fraction()) as usize;

    let amp_low = band_mean(&magnitude, split.noise_floor, mid_start);
    let amp_mid = band_mean(&magnitude, mid_start, high_start);
    let amp_high = band_mean(&magnitude, high_start, noise_ceiling);
    let amp_total = (amp_low + amp_mid + amp_high) / 3.0;

    NoiseProfile {
        amp_low,
        amp_mid,
        amp_high,
        amp_total,
    }
}
