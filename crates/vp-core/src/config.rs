use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Complete extraction configuration for one experiment run.
///
/// Serializable to TOML. Every field has a sane default matching the
/// reference roadside deployment (48 kHz stereo, mics 0.5 m apart, 2 m from
/// the road).
///
/// # Example
/// ```
/// use vp_core::config::ExtractConfig;
/// let config = ExtractConfig::default();
/// assert_eq!(config.fft_len, 512);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ExtractConfig {
    // === Analysis window ===
    /// Total window around the pass time, in seconds.
    pub win: f64,
    /// Highest retained frequency in Hz. `None` keeps every bin except DC.
    pub cutoff: Option<f64>,

    // === FFT ===
    /// FFT frame length in samples.
    pub fft_len: usize,
    /// Stride between consecutive frames in samples. Must divide `fft_len`.
    pub fft_shift: usize,

    // === Reduction ===
    /// Moving-average length in frames.
    pub ma_len: usize,
    /// Sliding moving average (`true`) or non-overlapping block average.
    pub ma_overlap: bool,
    /// Append inter-frame amplitude ratios and phase differences after the magnitudes.
    pub phase_diff: bool,

    // === Strategy ===
    /// Raw frame strategy.
    pub extractor: ExtractorKind,

    /// Microphone geometry and propagation constants.
    pub geometry: Geometry,

    /// Which pass records take part in the run.
    pub events: EventFilter,
}

/// Raw frame strategy used by the feature aggregator.
///
/// # Example
/// ```
/// use vp_core::config::ExtractorKind;
/// assert_eq!(ExtractorKind::default(), ExtractorKind::ShiftMerge);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Delay-compensate channel 1 onto channel 2 and sum, in the frequency domain.
    #[default]
    #[serde(alias = "shift_merge")]
    ShiftMerge,
    /// Channel 1 spectra only, no merging.
    #[serde(alias = "single_channel", alias = "single")]
    SingleChannel,
}

/// Physical constants of a two-microphone deployment.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Geometry {
    /// Distance between the two microphones (D), in meters.
    pub mic_separation: f64,
    /// Distance from the road to the microphone pair (L), in meters.
    pub road_distance: f64,
    /// Speed of sound (c), in m/s.
    pub sound_speed: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            mic_separation: 0.5,
            road_distance: 2.0,
            sound_speed: 340.0,
        }
    }
}

/// Pass record selection applied before feature extraction.
///
/// # Example
/// ```
/// use vp_core::config::EventFilter;
/// let filter = EventFilter::default();
/// assert!(filter.exclude_types.is_empty());
/// assert!(filter.simul_range.is_none());
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct EventFilter {
    /// Labels dropped from the run (e.g. `"truck"`).
    #[serde(default)]
    pub exclude_types: Vec<String>,
    /// Drop events with another pass closer than this many seconds.
    #[serde(default)]
    pub simul_range: Option<f64>,
    /// Keep only rows flagged both `detect` and `correct`.
    #[serde(default)]
    pub require_detected: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            win: 2.0,
            cutoff: Some(3e3),
            fft_len: 512,
            fft_shift: 128,
            ma_len: 10,
            ma_overlap: true,
            phase_diff: false,
            extractor: ExtractorKind::ShiftMerge,
            geometry: Geometry::default(),
            events: EventFilter::default(),
        }
    }
}

impl ExtractConfig {
    /// Reject any value the extraction engine cannot work with.
    ///
    /// Runs before any audio is touched so a bad frame/shift pair never
    /// surfaces mid-run.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] describing the first invalid field.
    ///
    /// # Example
    /// ```
    /// use vp_core::config::ExtractConfig;
    /// let config = ExtractConfig { fft_shift: 100, ..ExtractConfig::default() };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.fft_len == 0 || self.fft_shift == 0 {
            return Err(CoreError::Config(format!(
                "fft_len ({}) and fft_shift ({}) must be non-zero",
                self.fft_len, self.fft_shift
            )));
        }
        if self.fft_len % self.fft_shift != 0 {
            return Err(CoreError::Config(format!(
                "fft_len ({}) must be a multiple of fft_shift ({})",
                self.fft_len, self.fft_shift
            )));
        }
        if self.ma_len == 0 {
            return Err(CoreError::Config("ma_len must be at least 1".into()));
        }
        if !self.win.is_finite() || self.win <= 0.0 {
            return Err(CoreError::Config(format!(
                "win must be a positive duration, got {}",
                self.win
            )));
        }
        if let Some(cutoff) = self.cutoff
            && (!cutoff.is_finite() || cutoff <= 0.0)
        {
            return Err(CoreError::Config(format!(
                "cutoff must be a positive frequency, got {cutoff}"
            )));
        }

        let g = &self.geometry;
        if !g.sound_speed.is_finite() || g.sound_speed <= 0.0 {
            return Err(CoreError::Config(format!(
                "sound_speed must be positive, got {}",
                g.sound_speed
            )));
        }
        if !g.mic_separation.is_finite() || g.mic_separation < 0.0 {
            return Err(CoreError::Config(format!(
                "mic_separation must be non-negative, got {}",
                g.mic_separation
            )));
        }
        if !g.road_distance.is_finite() || g.road_distance < 0.0 {
            return Err(CoreError::Config(format!(
                "road_distance must be non-negative, got {}",
                g.road_distance
            )));
        }

        if let Some(range) = self.events.simul_range
            && (!range.is_finite() || range < 0.0)
        {
            return Err(CoreError::Config(format!(
                "simul_range must be non-negative, got {range}"
            )));
        }
        Ok(())
    }
}

/// Intermediate TOML structure, every section optional.
#[derive(Deserialize)]
struct ConfigFile {
    feature: Option<FeatureSection>,
    geometry: Option<GeometrySection>,
    events: Option<EventsSection>,
}

/// Feature section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct FeatureSection {
    extractor: Option<ExtractorKind>,
    win: Option<f64>,
    cutoff: Option<f64>,
    /// `false` disables the band limit entirely (TOML has no null).
    band_limit: Option<bool>,
    fft_len: Option<usize>,
    fft_shift: Option<usize>,
    ma_len: Option<usize>,
    ma_overlap: Option<bool>,
    phase_diff: Option<bool>,
}

#[derive(Deserialize)]
struct GeometrySection {
    mic_separation: Option<f64>,
    road_distance: Option<f64>,
    sound_speed: Option<f64>,
}

#[derive(Deserialize)]
struct EventsSection {
    exclude_types: Option<Vec<String>>,
    simul_range: Option<f64>,
    require_detected: Option<bool>,
}

/// Parse TOML text and merge it over the defaults, then validate.
///
/// # Errors
/// Returns an error if the text is not valid TOML or a value is rejected by
/// [`ExtractConfig::validate`].
///
/// # Example
/// ```
/// use vp_core::config::parse_config;
/// let config = parse_config("[feature]\nma_len = 5\nma_overlap = false\n").unwrap();
/// assert_eq!(config.ma_len, 5);
/// assert!(!config.ma_overlap);
/// ```
pub fn parse_config(content: &str) -> Result<ExtractConfig> {
    let file: ConfigFile = toml::from_str(content).context("TOML parsing error")?;

    let mut config = ExtractConfig::default();

    if let Some(f) = file.feature {
        if let Some(v) = f.extractor {
            config.extractor = v;
        }
        if let Some(v) = f.win {
            config.win = v;
        }
        if let Some(v) = f.cutoff {
            config.cutoff = Some(v);
        }
        if f.band_limit == Some(false) {
            config.cutoff = None;
        }
        if let Some(v) = f.fft_len {
            config.fft_len = v;
        }
        if let Some(v) = f.fft_shift {
            config.fft_shift = v;
        }
        if let Some(v) = f.ma_len {
            config.ma_len = v;
        }
        if let Some(v) = f.ma_overlap {
            config.ma_overlap = v;
        }
        if let Some(v) = f.phase_diff {
            config.phase_diff = v;
        }
    }

    if let Some(g) = file.geometry {
        if let Some(v) = g.mic_separation {
            config.geometry.mic_separation = v;
        }
        if let Some(v) = g.road_distance {
            config.geometry.road_distance = v;
        }
        if let Some(v) = g.sound_speed {
            config.geometry.sound_speed = v;
        }
    }

    if let Some(e) = file.events {
        if let Some(v) = e.exclude_types {
            config.events.exclude_types = v;
        }
        if let Some(v) = e.simul_range {
            config.events.simul_range = Some(v);
        }
        if let Some(v) = e.require_detected {
            config.events.require_detected = v;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Load a TOML file and merge it over the defaults.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or validated.
///
/// # Example
/// ```no_run
/// use vp_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<ExtractConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}
