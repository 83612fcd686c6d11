use std::ops::Range;

use realfft::num_complex::Complex;

use crate::fft::Spectrum;

/// Frame-axis reduction applied to a pass window.
///
/// # Example
/// ```
/// use vp_audio::smoothing::Reduction;
/// assert_eq!(Reduction::Overlapping.output_frames(750, 10), 741);
/// assert_eq!(Reduction::Block.output_frames(750, 10), 75);
/// assert_eq!(Reduction::Block.output_frames(755, 10), 75);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// Sliding moving average over `len` frames.
    Overlapping,
    /// Mean of consecutive non-overlapping blocks of `len` frames.
    Block,
}

impl Reduction {
    #[must_use]
    pub fn from_overlap(overlap: bool) -> Self {
        if overlap { Self::Overlapping } else { Self::Block }
    }

    /// Frames left after reducing `frames` frames with averaging length `len`.
    #[must_use]
    pub fn output_frames(self, frames: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        match self {
            Self::Overlapping => (frames + 1).saturating_sub(len),
            Self::Block => frames / len,
        }
    }

    #[must_use]
    pub fn apply(self, frames: &[Spectrum], len: usize) -> Vec<Spectrum> {
        match self {
            Self::Overlapping => moving_average(frames, len),
            Self::Block => block_average(frames, len),
        }
    }
}

/// Elementwise mean of a run of frames.
fn mean(frames: &[Spectrum]) -> Spectrum {
    let bins = frames.first().map_or(0, Vec::len);
    let mut acc = vec![Complex::new(0.0, 0.0); bins];
    for frame in frames {
        for (a, &x) in acc.iter_mut().zip(frame) {
            *a += x;
        }
    }
    let scale = 1.0 / frames.len() as f64;
    for a in &mut acc {
        *a *= scale;
    }
    acc
}

/// Sliding mean over `len` consecutive frames ("valid" mode).
///
/// Real and imaginary parts are averaged independently, so the result is the
/// complex mean. Returns `frames.len() - len + 1` frames.
#[must_use]
pub fn moving_average(frames: &[Spectrum], len: usize) -> Vec<Spectrum> {
    if len == 0 || frames.len() < len {
        return Vec::new();
    }
    frames.windows(len).map(mean).collect()
}

/// Mean of each block of `len` frames; trailing `frames.len() % len` frames are dropped.
#[must_use]
pub fn block_average(frames: &[Spectrum], len: usize) -> Vec<Spectrum> {
    if len == 0 {
        return Vec::new();
    }
    frames.chunks_exact(len).map(mean).collect()
}

/// Bins retained by the band limit: DC is always dropped, and with a cutoff
/// only bins whose frequency `k·fs/N` does not exceed it are kept.
///
/// # Example
/// ```
/// use vp_audio::smoothing::band_bins;
/// // 48 kHz, 512-point FFT: 93.75 Hz per bin.
/// assert_eq!(band_bins(Some(3e3), 48_000, 512), 1..33);
/// assert_eq!(band_bins(None, 48_000, 512), 1..257);
/// assert!(band_bins(Some(50.0), 48_000, 512).is_empty());
/// ```
#[must_use]
pub fn band_bins(cutoff: Option<f64>, sample_rate: u32, fft_len: usize) -> Range<usize> {
    let nyquist_bin = fft_len / 2;
    let last = cutoff.map_or(nyquist_bin, |hz| {
        let k = (hz * fft_len as f64 / f64::from(sample_rate)).floor();
        if k <= 0.0 {
            0
        } else {
            (k as usize).min(nyquist_bin)
        }
    });
    1..last + 1
}

/// Keep only `bins` of every frame.
#[must_use]
pub fn band_limit(frames: &[Spectrum], bins: Range<usize>) -> Vec<Spectrum> {
    frames.iter().map(|f| f[bins.clone()].to_vec()).collect()
}

/// Magnitudes flattened in (frame, bin) order.
#[must_use]
pub fn magnitudes(frames: &[Spectrum]) -> Vec<f64> {
    frames.iter().flatten().map(|c| c.norm()).collect()
}

/// Magnitude of `r[i] / r[i + 1]` per bin for consecutive frames, in (frame, bin) order.
///
/// A zero bin in `r[i + 1]` gives `0.0` so the vector stays finite.
#[must_use]
pub fn amplitude_ratios(frames: &[Spectrum]) -> Vec<f64> {
    frames
        .windows(2)
        .flat_map(|pair| {
            pair[0].iter().zip(&pair[1]).map(|(a, b)| {
                let denom = b.norm();
                if denom > 0.0 { a.norm() / denom } else { 0.0 }
            })
        })
        .collect()
}

/// Phase of `r[i] / r[i + 1]` per bin for consecutive frames, in (frame, bin) order.
///
/// Computed as `arg(r[i] · conj(r[i + 1]))`, which has the same angle and
/// stays finite when a bin of `r[i + 1]` is zero.
#[must_use]
pub fn phase_differences(frames: &[Spectrum]) -> Vec<f64> {
    frames
        .windows(2)
        .flat_map(|pair| {
            pair[0]
                .iter()
                .zip(&pair[1])
                .map(|(a, b)| (a * b.conj()).arg())
        })
        .collect()
}
