//! Spectral analysis and vehicle pass feature extraction for vpass.

pub mod align;
pub mod batch_analyzer;
pub mod decode;
pub mod delay;
pub mod error;
pub mod extractor;
pub mod fft;
pub mod smoothing;
pub mod waveform;

pub use batch_analyzer::{BatchAnalyzer, BatchReport, SkippedEvent};
pub use error::AnalysisError;
pub use extractor::{FeatureExtractor, FrameWindow};
pub use fft::{SpectralAnalyzer, Spectrum, StereoSpectra};
pub use waveform::Waveform;
