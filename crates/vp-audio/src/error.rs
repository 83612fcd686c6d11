use thiserror::Error;

/// Errors originating from the analysis module.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Frame/shift relationship or another extraction parameter is unusable.
    #[error("Invalid analysis configuration: {0}")]
    Configuration(String),

    /// Waveform too short for the requested frame grid.
    #[error("Insufficient data: need at least {needed} samples per channel, got {got}")]
    InsufficientData {
        /// Minimum number of samples.
        needed: usize,
        /// Samples actually available.
        got: usize,
    },

    /// Two sequences that must line up do not.
    #[error("Length mismatch in {what}: expected {expected}, got {got}")]
    LengthMismatch {
        /// Which pair of sequences disagreed.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// The pass window does not fit inside the analyzed recording.
    #[error(
        "Empty window for pass at t0={t0:.3}s: frames {start}..{end} fall outside 0..{available}"
    )]
    EmptyWindow {
        /// Pass time of the rejected hypothesis.
        t0: f64,
        /// First requested frame (may be negative).
        start: i64,
        /// One past the last requested frame.
        end: i64,
        /// Number of analyzed frames.
        available: usize,
    },

    /// Audio container or codec could not be read.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Audio source does not carry two channels.
    #[error("Unsupported channel layout: {0}")]
    ChannelLayout(String),

    /// The FFT backend rejected a buffer.
    #[error("FFT error: {0}")]
    Fft(String),
}
