use std::ops::Range;

use vp_core::config::{ExtractConfig, ExtractorKind};
use vp_core::records::Trajectory;

use crate::delay::DelayModel;
use crate::error::AnalysisError;
use crate::fft::{SpectralAnalyzer, Spectrum, StereoSpectra};
use crate::smoothing::{
    Reduction, amplitude_ratios, band_bins, band_limit, magnitudes, phase_differences,
};
use crate::waveform::Waveform;

/// Frames of the cached spectra covered by one pass window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameWindow {
    /// First frame of the window.
    pub start: usize,
    /// Number of frames.
    pub len: usize,
    /// Frame nearest the pass time.
    pub center: usize,
}

impl FrameWindow {
    #[must_use]
    pub fn frames(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Turns a trajectory hypothesis into a fixed-length feature vector.
///
/// Owns the cached spectra of one recording. Every call allocates its own
/// buffers, so a shared `&FeatureExtractor` can serve many threads.
///
/// # Example
/// ```
/// use vp_audio::extractor::FeatureExtractor;
/// use vp_audio::waveform::Waveform;
/// use vp_core::config::ExtractConfig;
/// use vp_core::records::Trajectory;
///
/// let n = 48_000 * 4;
/// let left: Vec<f64> = (0..n).map(|i| (i as f64 * 0.13).sin()).collect();
/// let right: Vec<f64> = (0..n).map(|i| (i as f64 * 0.11).sin()).collect();
/// let wave = Waveform::new(left, right, 48_000).unwrap();
///
/// let extractor = FeatureExtractor::from_waveform(&wave, &ExtractConfig::default()).unwrap();
/// let features = extractor.feature(Trajectory::new(2.0, 12.0)).unwrap();
/// assert_eq!(features.len(), extractor.feature_len());
/// assert!(extractor.feature(Trajectory::new(0.3, 12.0)).is_err());
/// ```
pub struct FeatureExtractor {
    spectra: StereoSpectra,
    model: DelayModel,
    kind: ExtractorKind,
    half_window: usize,
    bins: Range<usize>,
    ma_len: usize,
    reduction: Reduction,
    phase_diff: bool,
}

impl FeatureExtractor {
    /// Build an extractor over already analyzed spectra.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Configuration`] if the configuration is invalid,
    /// disagrees with the spectra's frame grid, or leaves no frequency bin or
    /// no reduced frame.
    pub fn new(spectra: StereoSpectra, config: &ExtractConfig) -> Result<Self, AnalysisError> {
        config
            .validate()
            .map_err(|e| AnalysisError::Configuration(e.to_string()))?;
        if spectra.fft_len() != config.fft_len || spectra.fft_shift() != config.fft_shift {
            return Err(AnalysisError::Configuration(format!(
                "spectra were analyzed with {}/{} but the configuration asks for {}/{}",
                spectra.fft_len(),
                spectra.fft_shift(),
                config.fft_len,
                config.fft_shift
            )));
        }

        // Window length in frames, from seconds: win / (shift / fs).
        let winlen =
            (config.win * f64::from(spectra.sample_rate()) / config.fft_shift as f64).floor();
        let half_window = (winlen.max(0.0) as usize) / 2;

        let reduction = Reduction::from_overlap(config.ma_overlap);
        if reduction.output_frames(half_window * 2, config.ma_len) == 0 {
            return Err(AnalysisError::Configuration(format!(
                "window of {} frames is shorter than ma_len ({})",
                half_window * 2,
                config.ma_len
            )));
        }

        let bins = band_bins(config.cutoff, spectra.sample_rate(), config.fft_len);
        if bins.is_empty() {
            return Err(AnalysisError::Configuration(format!(
                "cutoff {:?} Hz leaves no frequency bin above DC",
                config.cutoff
            )));
        }

        log::debug!(
            "Extractor {:?}: {} frames/window, bins {:?}, {:?} over {} frames",
            config.extractor,
            half_window * 2,
            bins,
            reduction,
            config.ma_len
        );

        Ok(Self {
            spectra,
            model: DelayModel::new(&config.geometry),
            kind: config.extractor,
            half_window,
            bins,
            ma_len: config.ma_len,
            reduction,
            phase_diff: config.phase_diff,
        })
    }

    /// Validate the configuration, analyze `wave`, and build the extractor.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Configuration`] before touching the audio if
    /// the configuration is invalid, then any analysis error.
    pub fn from_waveform(wave: &Waveform, config: &ExtractConfig) -> Result<Self, AnalysisError> {
        config
            .validate()
            .map_err(|e| AnalysisError::Configuration(e.to_string()))?;
        let analyzer = SpectralAnalyzer::new(config.fft_len, config.fft_shift)?;
        let spectra = analyzer.analyze(wave)?;
        Self::new(spectra, config)
    }

    #[must_use]
    pub fn spectra(&self) -> &StereoSpectra {
        &self.spectra
    }

    #[must_use]
    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    /// Frames in every pass window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.half_window * 2
    }

    /// Length of every vector returned by [`FeatureExtractor::feature`].
    #[must_use]
    pub fn feature_len(&self) -> usize {
        let frames = self.reduction.output_frames(self.window_len(), self.ma_len);
        let bins = self.bins.len();
        // Ratio and phase blocks, one value per bin per consecutive frame pair.
        let tail = if self.phase_diff {
            2 * frames.saturating_sub(1) * bins
        } else {
            0
        };
        frames * bins + tail
    }

    /// Locate the window centered on the frame nearest `t0`.
    ///
    /// # Errors
    /// Returns [`AnalysisError::EmptyWindow`] unless the whole window lies
    /// inside the analyzed frames.
    pub fn window(&self, t0: f64) -> Result<FrameWindow, AnalysisError> {
        let available = self.spectra.frames();
        let half = self.half_window as f64;
        let center = (t0 / self.spectra.frame_interval()).round();
        let (start, end) = (center - half, center + half);

        // Checked in f64 before any integer cast.
        if !center.is_finite() || start < 0.0 || end > available as f64 {
            return Err(AnalysisError::EmptyWindow {
                t0,
                start: start as i64,
                end: end as i64,
                available,
            });
        }
        Ok(FrameWindow {
            start: start as usize,
            len: self.window_len(),
            center: center as usize,
        })
    }

    /// Per-frame channel 1 shifts for a window: the negated modeled delay at
    /// each frame's offset from the pass frame.
    #[must_use]
    pub fn time_deltas(&self, window: &FrameWindow, v: f64) -> Vec<f64> {
        let interval = self.spectra.frame_interval();
        window
            .frames()
            .map(|i| {
                let dt = (i as f64 - window.center as f64) * interval;
                -self.model.delay(v, dt)
            })
            .collect()
    }

    /// Raw complex frames of the pass window, before band limit and reduction.
    ///
    /// # Errors
    /// Returns [`AnalysisError::EmptyWindow`] near the recording edges.
    pub fn raw_frames(&self, trajectory: Trajectory) -> Result<Vec<Spectrum>, AnalysisError> {
        let window = self.window(trajectory.t0)?;
        match self.kind {
            ExtractorKind::ShiftMerge => {
                let deltas = self.time_deltas(&window, trajectory.v);
                self.spectra
                    .shift_merge(&deltas, window.start, Some(window.len))
            }
            ExtractorKind::SingleChannel => Ok(self.spectra.left()[window.frames()].to_vec()),
        }
    }

    /// Feature vector of one pass hypothesis.
    ///
    /// Magnitudes of the band-limited, reduced window in (frame, bin) order,
    /// followed, when enabled, by the inter-frame amplitude ratios and then the
    /// inter-frame phase differences.
    ///
    /// # Errors
    /// Returns [`AnalysisError::EmptyWindow`] for hypotheses too close to the
    /// recording edges.
    pub fn feature(&self, trajectory: Trajectory) -> Result<Vec<f64>, AnalysisError> {
        let raw = self.raw_frames(trajectory)?;
        let band = band_limit(&raw, self.bins.clone());
        let reduced = self.reduction.apply(&band, self.ma_len);

        let mut features = magnitudes(&reduced);
        if self.phase_diff {
            features.extend(amplitude_ratios(&reduced));
            features.extend(phase_differences(&reduced));
        }

        if features.len() != self.feature_len() {
            return Err(AnalysisError::LengthMismatch {
                what: "feature vector",
                expected: self.feature_len(),
                got: features.len(),
            });
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::hamming;
    use realfft::num_complex::Complex;
    use vp_core::config::Geometry;

    const FS: u32 = 48_000;

    fn sine(freq: f64, n: usize, lead: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                (2.0 * std::f64::consts::PI * freq * (i as f64 / f64::from(FS) + lead)).sin()
            })
            .collect()
    }

    fn chirp_wave(seconds: usize) -> Waveform {
        let n = FS as usize * seconds;
        let left = (0..n)
            .map(|i| {
                let t = i as f64 / f64::from(FS);
                (2.0 * std::f64::consts::PI * (400.0 + 60.0 * t) * t).sin()
            })
            .collect();
        let right = sine(1.3e3, n, 0.0);
        Waveform::new(left, right, FS).unwrap()
    }

    fn irfft(spectrum: &[Complex<f64>], len: usize) -> Vec<f64> {
        let mut planner = realfft::RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_inverse(len);
        let mut input = spectrum.to_vec();
        input[0].im = 0.0;
        if let Some(last) = input.last_mut() {
            last.im = 0.0;
        }
        let mut output = plan.make_output_vec();
        plan.process(&mut input, &mut output).unwrap();
        output.iter().map(|x| x / len as f64).collect()
    }

    #[test]
    fn feature_length_is_constant_across_events() {
        let wave = chirp_wave(10);
        for ma_overlap in [true, false] {
            for phase_diff in [false, true] {
                let config = ExtractConfig {
                    ma_overlap,
                    phase_diff,
                    ..ExtractConfig::default()
                };
                let extractor = FeatureExtractor::from_waveform(&wave, &config).unwrap();
                let lengths: Vec<usize> = [(1.5, 8.0), (3.2, -14.0), (5.0, 0.0), (8.7, 30.0)]
                    .iter()
                    .map(|&(t0, v)| extractor.feature(Trajectory::new(t0, v)).unwrap().len())
                    .collect();
                assert!(lengths.iter().all(|&l| l == extractor.feature_len()));
            }
        }
    }

    #[test]
    fn default_dimensions() {
        // 2 s at 48 kHz / 128 = 750 frames; bins 1..=32 under 3 kHz.
        let extractor =
            FeatureExtractor::from_waveform(&chirp_wave(6), &ExtractConfig::default()).unwrap();
        assert_eq!(extractor.window_len(), 750);
        assert_eq!(extractor.feature_len(), (750 - 10 + 1) * 32);

        let block = ExtractConfig {
            ma_overlap: false,
            ..ExtractConfig::default()
        };
        let extractor = FeatureExtractor::from_waveform(&chirp_wave(6), &block).unwrap();
        assert_eq!(extractor.feature_len(), 75 * 32);
    }

    #[test]
    fn phase_tail_holds_ratios_then_phases() {
        let config = ExtractConfig {
            ma_overlap: false,
            phase_diff: true,
            ..ExtractConfig::default()
        };
        let extractor = FeatureExtractor::from_waveform(&chirp_wave(6), &config).unwrap();
        assert_eq!(extractor.feature_len(), 75 * 32 + 2 * 74 * 32);

        let trajectory = Trajectory::new(3.0, -12.0);
        let features = extractor.feature(trajectory).unwrap();
        let raw = extractor.raw_frames(trajectory).unwrap();
        let reduced = Reduction::Block.apply(&band_limit(&raw, 1..33), 10);

        let (mags, tail) = features.split_at(75 * 32);
        let (ratios, phases) = tail.split_at(74 * 32);
        assert_eq!(mags, magnitudes(&reduced).as_slice());
        assert_eq!(ratios, amplitude_ratios(&reduced).as_slice());
        assert_eq!(phases, phase_differences(&reduced).as_slice());
    }

    #[test]
    fn window_is_centered_on_nearest_frame() {
        let extractor =
            FeatureExtractor::from_waveform(&chirp_wave(6), &ExtractConfig::default()).unwrap();
        // Frame interval 128 / 48000 s; 3.0 s is frame 1125.
        let window = extractor.window(3.0).unwrap();
        assert_eq!(window.center, 1125);
        assert_eq!(window.start, 1125 - 375);
        assert_eq!(window.len, 750);
    }

    #[test]
    fn boundary_windows_are_rejected() {
        let extractor =
            FeatureExtractor::from_waveform(&chirp_wave(6), &ExtractConfig::default()).unwrap();
        let frames = extractor.spectra().frames();
        for t0 in [0.0, 0.5, 5.5, 6.0, 30.0, -1.0, f64::NAN] {
            let err = extractor.feature(Trajectory::new(t0, 10.0)).unwrap_err();
            assert!(matches!(err, AnalysisError::EmptyWindow { .. }), "t0={t0}");
        }
        // Exactly fitting at both edges.
        let interval = extractor.spectra().frame_interval();
        assert!(extractor.window(375.0 * interval).is_ok());
        assert!(extractor.window((frames - 375) as f64 * interval).is_ok());
        assert!(extractor.window((frames - 374) as f64 * interval).is_err());
    }

    #[test]
    fn far_off_pass_times_are_empty_windows() {
        let extractor =
            FeatureExtractor::from_waveform(&chirp_wave(6), &ExtractConfig::default()).unwrap();
        for t0 in [
            f64::INFINITY,
            f64::NEG_INFINITY,
            1e300,
            -1e300,
            f64::MAX,
            f64::MIN,
            1e18,
        ] {
            for kind in [ExtractorKind::ShiftMerge, ExtractorKind::SingleChannel] {
                let config = ExtractConfig {
                    extractor: kind,
                    ..ExtractConfig::default()
                };
                let strategy = FeatureExtractor::new(extractor.spectra().clone(), &config).unwrap();
                let err = strategy.feature(Trajectory::new(t0, 10.0)).unwrap_err();
                assert!(matches!(err, AnalysisError::EmptyWindow { .. }), "t0={t0}");
            }
        }
    }

    #[test]
    fn single_channel_slices_left_spectra() {
        let config = ExtractConfig {
            extractor: ExtractorKind::SingleChannel,
            ..ExtractConfig::default()
        };
        let extractor = FeatureExtractor::from_waveform(&chirp_wave(6), &config).unwrap();
        let raw = extractor.raw_frames(Trajectory::new(3.0, 20.0)).unwrap();
        let window = extractor.window(3.0).unwrap();
        assert_eq!(raw.as_slice(), &extractor.spectra().left()[window.frames()]);
    }

    #[test]
    fn stationary_source_reconstructs_summed_frame() {
        // 1 kHz stereo sine, 0.2 ms inter-channel lead on channel 2.
        let (len, shift) = (512, 128);
        let n = FS as usize * 3;
        let left = sine(1e3, n, 0.0);
        let right = sine(1e3, n, 0.2e-3);
        let wave = Waveform::new(left.clone(), right.clone(), FS).unwrap();
        let config = ExtractConfig {
            win: 0.5,
            fft_len: len,
            fft_shift: shift,
            geometry: Geometry {
                mic_separation: 0.5,
                road_distance: 2.0,
                sound_speed: 340.0,
            },
            ..ExtractConfig::default()
        };
        let extractor = FeatureExtractor::from_waveform(&wave, &config).unwrap();

        // t0 on a frame boundary, v = 0: every modeled delay is zero.
        let interval = extractor.spectra().frame_interval();
        let t0 = 600.0 * interval;
        let window = extractor.window(t0).unwrap();
        assert!(extractor.time_deltas(&window, 0.0).iter().all(|&d| d == 0.0));

        let raw = extractor.raw_frames(Trajectory::new(t0, 0.0)).unwrap();
        let center = window.center - window.start;
        let restored = irfft(&raw[center], len);

        let w = hamming(len);
        let start = window.center * shift;
        for i in 0..len {
            let expected = (left[start + i] + right[start + i]) * w[i];
            assert!((restored[i] - expected).abs() < 1e-9, "sample {i}");
        }
    }

    #[test]
    fn moving_vehicle_shifts_channel_one_back() {
        let wave = chirp_wave(6);
        let config = ExtractConfig::default();
        let extractor = FeatureExtractor::from_waveform(&wave, &config).unwrap();
        let window = extractor.window(3.0).unwrap();
        let deltas = extractor.time_deltas(&window, 15.0);

        let model = DelayModel::new(&config.geometry);
        let interval = extractor.spectra().frame_interval();
        for (i, frame) in window.frames().enumerate() {
            let dt = (frame as f64 - window.center as f64) * interval;
            assert_eq!(deltas[i], -model.delay(15.0, dt));
        }
        // Approaching (dt < 0) and receding (dt > 0) shifts have opposite signs.
        assert!(deltas[0] > 0.0 && deltas[deltas.len() - 1] < 0.0);

        let expected = extractor
            .spectra()
            .shift_merge(&deltas, window.start, None)
            .unwrap();
        let raw = extractor.raw_frames(Trajectory::new(3.0, 15.0)).unwrap();
        assert_eq!(raw, expected);
    }

    #[test]
    fn configuration_rejected_before_analysis() {
        let wave = chirp_wave(2);
        for config in [
            ExtractConfig {
                fft_shift: 100,
                ..ExtractConfig::default()
            },
            ExtractConfig {
                cutoff: Some(10.0),
                ..ExtractConfig::default()
            },
            ExtractConfig {
                win: 0.02,
                ..ExtractConfig::default()
            },
        ] {
            assert!(matches!(
                FeatureExtractor::from_waveform(&wave, &config),
                Err(AnalysisError::Configuration(_))
            ));
        }
    }

    #[test]
    fn spectra_grid_must_match_config() {
        let spectra = SpectralAnalyzer::new(256, 64)
            .unwrap()
            .analyze(&chirp_wave(2))
            .unwrap();
        assert!(FeatureExtractor::new(spectra, &ExtractConfig::default()).is_err());
    }
}
