use std::sync::Arc;

use rayon::prelude::*;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::AnalysisError;
use crate::waveform::Waveform;

/// Non-negative frequency bins of one frame (`fft_len / 2 + 1` values).
pub type Spectrum = Vec<Complex<f64>>;

/// Framed spectral analyzer: Hamming-windowed real FFT over overlapping frames.
///
/// Frame `i` covers samples `[i * fft_shift, i * fft_shift + fft_len)`. The
/// plan is built once and shared by the rayon workers; each worker keeps its
/// own input and scratch buffers.
///
/// # Example
/// ```
/// use vp_audio::fft::SpectralAnalyzer;
/// let analyzer = SpectralAnalyzer::new(512, 128).unwrap();
/// assert_eq!(analyzer.folds(), 4);
/// assert_eq!(analyzer.frame_count(48_000), 371);
/// ```
pub struct SpectralAnalyzer {
    fft_len: usize,
    fft_shift: usize,
    plan: Arc<dyn RealToComplex<f64>>,
    /// Hamming window coefficients.
    window: Vec<f64>,
}

impl SpectralAnalyzer {
    /// Create an analyzer for frames of `fft_len` samples every `fft_shift` samples.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Configuration`] if either length is zero or
    /// `fft_len` is not a multiple of `fft_shift`.
    pub fn new(fft_len: usize, fft_shift: usize) -> Result<Self, AnalysisError> {
        if fft_len == 0 || fft_shift == 0 {
            return Err(AnalysisError::Configuration(format!(
                "fft_len ({fft_len}) and fft_shift ({fft_shift}) must be non-zero"
            )));
        }
        if fft_len % fft_shift != 0 {
            return Err(AnalysisError::Configuration(format!(
                "fft_len ({fft_len}) must be a multiple of fft_shift ({fft_shift})"
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_forward(fft_len);

        Ok(Self {
            fft_len,
            fft_shift,
            plan,
            window: hamming(fft_len),
        })
    }

    #[must_use]
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    #[must_use]
    pub fn fft_shift(&self) -> usize {
        self.fft_shift
    }

    /// Number of shift steps overlapping one frame (`fft_len / fft_shift`).
    #[must_use]
    pub fn folds(&self) -> usize {
        self.fft_len / self.fft_shift
    }

    /// Frames produced for a channel of `n` samples: `floor(n / shift) - folds`.
    #[must_use]
    pub fn frame_count(&self, n: usize) -> usize {
        (n / self.fft_shift).saturating_sub(self.folds())
    }

    /// Windowed FFT of every frame of one channel, in frame order.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InsufficientData`] if not a single frame fits.
    pub fn spectra(&self, samples: &[f64]) -> Result<Vec<Spectrum>, AnalysisError> {
        let frames = self.frame_count(samples.len());
        if frames == 0 {
            return Err(AnalysisError::InsufficientData {
                needed: self.fft_len + self.fft_shift,
                got: samples.len(),
            });
        }

        (0..frames)
            .into_par_iter()
            .map_init(
                || (self.plan.make_input_vec(), self.plan.make_scratch_vec()),
                |(input, scratch), i| -> Result<Spectrum, AnalysisError> {
                    let start = i * self.fft_shift;
                    let frame = &samples[start..start + self.fft_len];
                    for ((slot, &s), &w) in input.iter_mut().zip(frame).zip(&self.window) {
                        *slot = s * w;
                    }

                    let mut spectrum = self.plan.make_output_vec();
                    self.plan
                        .process_with_scratch(input, &mut spectrum, scratch)
                        .map_err(|e| AnalysisError::Fft(e.to_string()))?;
                    Ok(spectrum)
                },
            )
            .collect()
    }

    /// Analyze both channels on the same frame grid.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InsufficientData`] for a waveform shorter than
    /// one frame plus one shift.
    ///
    /// # Example
    /// ```
    /// use vp_audio::fft::SpectralAnalyzer;
    /// use vp_audio::waveform::Waveform;
    ///
    /// let wave = Waveform::new(vec![0.0; 4096], vec![0.0; 4096], 48_000).unwrap();
    /// let spectra = SpectralAnalyzer::new(512, 128).unwrap().analyze(&wave).unwrap();
    /// assert_eq!(spectra.frames(), 4096 / 128 - 4);
    /// assert_eq!(spectra.bins(), 257);
    /// ```
    pub fn analyze(&self, wave: &Waveform) -> Result<StereoSpectra, AnalysisError> {
        let (left, right) = rayon::join(|| self.spectra(wave.left()), || self.spectra(wave.right()));
        let (left, right) = (left?, right?);

        log::debug!(
            "Analyzed {} frames × {} bins per channel ({} samples @ {}Hz)",
            left.len(),
            self.fft_len / 2 + 1,
            wave.len(),
            wave.sample_rate()
        );

        Ok(StereoSpectra {
            left,
            right,
            fft_len: self.fft_len,
            fft_shift: self.fft_shift,
            sample_rate: wave.sample_rate(),
        })
    }
}

/// Symmetric Hamming window, `0.54 - 0.46 cos(2πn / (N - 1))`.
#[must_use]
pub fn hamming(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos())
        .collect()
}

/// Cached per-channel spectra sharing one frame grid.
///
/// Written once by [`SpectralAnalyzer::analyze`] and read-only afterwards, so
/// any number of hypotheses can be evaluated against it concurrently.
#[derive(Clone, Debug)]
pub struct StereoSpectra {
    pub(crate) left: Vec<Spectrum>,
    pub(crate) right: Vec<Spectrum>,
    fft_len: usize,
    fft_shift: usize,
    sample_rate: u32,
}

impl StereoSpectra {
    /// Microphone 1 spectra.
    #[must_use]
    pub fn left(&self) -> &[Spectrum] {
        &self.left
    }

    /// Microphone 2 spectra.
    #[must_use]
    pub fn right(&self) -> &[Spectrum] {
        &self.right
    }

    /// Number of frames (identical for both channels).
    #[must_use]
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    /// Bins per frame.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.fft_len / 2 + 1
    }

    #[must_use]
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    #[must_use]
    pub fn fft_shift(&self) -> usize {
        self.fft_shift
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Time between consecutive frame starts, in seconds.
    #[must_use]
    pub fn frame_interval(&self) -> f64 {
        self.fft_shift as f64 / f64::from(self.sample_rate)
    }

    /// Center frequency of bin `k`, in Hz.
    #[must_use]
    pub fn bin_frequency(&self, k: usize) -> f64 {
        k as f64 * f64::from(self.sample_rate) / self.fft_len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        // xorshift, deterministic
        let mut x = seed;
        (0..n)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                (x % 2000) as f64 / 1000.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn frame_count_matches_formula() {
        for (len, shift) in [(512, 128), (512, 512), (480, 96), (256, 1), (64, 32)] {
            let analyzer = SpectralAnalyzer::new(len, shift).unwrap();
            for n in [len + shift, 3000, 4801, 10_007] {
                let wave = Waveform::new(noise(n, 3), noise(n, 5), 48_000).unwrap();
                let spectra = analyzer.analyze(&wave).unwrap();
                assert_eq!(spectra.frames(), n / shift - len / shift, "len={len} shift={shift} n={n}");
                assert_eq!(spectra.left().len(), spectra.right().len());
                assert!(spectra.left().iter().all(|s| s.len() == len / 2 + 1));
            }
        }
    }

    #[test]
    fn shift_must_divide_length() {
        assert!(matches!(
            SpectralAnalyzer::new(512, 100),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(SpectralAnalyzer::new(0, 1).is_err());
        assert!(SpectralAnalyzer::new(512, 0).is_err());
    }

    #[test]
    fn short_waveform_rejected() {
        let analyzer = SpectralAnalyzer::new(512, 128).unwrap();
        let wave = Waveform::new(vec![0.0; 300], vec![0.0; 300], 48_000).unwrap();
        assert!(matches!(
            analyzer.analyze(&wave),
            Err(AnalysisError::InsufficientData { got: 300, .. })
        ));
    }

    #[test]
    fn frames_start_at_multiples_of_shift() {
        // A single impulse at sample 300 appears in frames whose span covers it,
        // and its DC bin equals the window weight at that position.
        let mut samples = vec![0.0; 2048];
        samples[300] = 1.0;
        let analyzer = SpectralAnalyzer::new(256, 64).unwrap();
        let spectra = analyzer.spectra(&samples).unwrap();
        let window = hamming(256);

        for (i, spectrum) in spectra.iter().enumerate() {
            let start = i * 64;
            let expected = if (start..start + 256).contains(&300) {
                window[300 - start]
            } else {
                0.0
            };
            assert!((spectrum[0].re - expected).abs() < 1e-12, "frame {i}");
        }
    }

    #[test]
    fn hamming_endpoints() {
        let w = hamming(512);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[511] - 0.08).abs() < 1e-12);
        assert_eq!(hamming(1), vec![1.0]);
    }
}
