use crate::error::AnalysisError;

/// Two equal-length channels plus their sample rate. Immutable once built.
///
/// # Example
/// ```
/// use vp_audio::waveform::Waveform;
/// let wave = Waveform::new(vec![0.0; 480], vec![0.0; 480], 48_000).unwrap();
/// assert!((wave.duration_secs() - 0.01).abs() < 1e-12);
/// assert!(Waveform::new(vec![0.0; 4], vec![0.0; 3], 48_000).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Waveform {
    left: Vec<f64>,
    right: Vec<f64>,
    sample_rate: u32,
}

impl Waveform {
    /// # Errors
    /// Returns [`AnalysisError::LengthMismatch`] for unequal channels and
    /// [`AnalysisError::Configuration`] for a zero sample rate.
    pub fn new(left: Vec<f64>, right: Vec<f64>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if left.len() != right.len() {
            return Err(AnalysisError::LengthMismatch {
                what: "waveform channels",
                expected: left.len(),
                got: right.len(),
            });
        }
        if sample_rate == 0 {
            return Err(AnalysisError::Configuration(
                "sample rate must be non-zero".into(),
            ));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Microphone 1.
    #[must_use]
    pub fn left(&self) -> &[f64] {
        &self.left
    }

    /// Microphone 2.
    #[must_use]
    pub fn right(&self) -> &[f64] {
        &self.right
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / f64::from(self.sample_rate)
    }
}
