//! Configuration, shared types, and tabular I/O for vpass.
//!
//! This crate holds everything the extraction engine and the binary agree on:
//! the extraction configuration, vehicle pass records, and the stacked
//! feature matrix handed to the external classifier.

pub mod config;
pub mod error;
pub mod matrix;
pub mod records;

pub use config::{EventFilter, ExtractConfig, ExtractorKind, Geometry};
pub use error::CoreError;
pub use matrix::FeatureMatrix;
pub use records::{LabelIndex, PassRecord, Trajectory};
