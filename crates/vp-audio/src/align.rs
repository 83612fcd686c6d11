use realfft::num_complex::Complex;

use crate::error::AnalysisError;
use crate::fft::{Spectrum, StereoSpectra};

impl StereoSpectra {
    /// Shift channel 1 by a per-frame delay and sum it with channel 2.
    ///
    /// `time_deltas[i]` (seconds) is applied to frame `offset + i`. The delta is
    /// rounded to a whole sample count `m`, and bin `k` of channel 1 is rotated
    /// by `exp(-j·2π·k·m / fft_len)`, a circular shift of the windowed frame.
    /// `count` defaults to `time_deltas.len()`.
    ///
    /// # Errors
    /// Returns [`AnalysisError::LengthMismatch`] if `time_deltas` does not hold
    /// exactly `count` values or the frames `offset..offset + count` are not all
    /// cached.
    ///
    /// # Example
    /// ```
    /// use vp_audio::fft::SpectralAnalyzer;
    /// use vp_audio::waveform::Waveform;
    ///
    /// let wave = Waveform::new(vec![0.1; 4096], vec![0.2; 4096], 48_000).unwrap();
    /// let spectra = SpectralAnalyzer::new(512, 128).unwrap().analyze(&wave).unwrap();
    /// let merged = spectra.shift_merge(&[0.0, 1e-4, -1e-4], 5, None).unwrap();
    /// assert_eq!(merged.len(), 3);
    /// assert!(spectra.shift_merge(&[0.0; 2], 5, Some(3)).is_err());
    /// ```
    pub fn shift_merge(
        &self,
        time_deltas: &[f64],
        offset: usize,
        count: Option<usize>,
    ) -> Result<Vec<Spectrum>, AnalysisError> {
        let count = count.unwrap_or(time_deltas.len());
        if time_deltas.len() != count {
            return Err(AnalysisError::LengthMismatch {
                what: "time deltas vs frame count",
                expected: count,
                got: time_deltas.len(),
            });
        }
        if offset
            .checked_add(count)
            .is_none_or(|end| end > self.frames())
        {
            return Err(AnalysisError::LengthMismatch {
                what: "merge range vs cached frames",
                expected: self.frames(),
                got: offset.saturating_add(count),
            });
        }

        let sample_rate = f64::from(self.sample_rate());
        let step = -2.0 * std::f64::consts::PI / self.fft_len() as f64;

        let merged: Vec<Spectrum> = time_deltas
            .iter()
            .zip(&self.left[offset..offset + count])
            .zip(&self.right[offset..offset + count])
            .map(|((&dt, x1), x2)| {
                let m = (dt * sample_rate).round();
                x1.iter()
                    .zip(x2)
                    .enumerate()
                    .map(|(k, (&a, &b))| a * Complex::from_polar(1.0, step * k as f64 * m) + b)
                    .collect::<Spectrum>()
            })
            .collect();
        Ok(merged)
    }
}
