use rayon::prelude::*;
use vp_core::error::CoreError;
use vp_core::matrix::FeatureMatrix;
use vp_core::records::{LabelIndex, PassRecord};

use crate::error::AnalysisError;
use crate::extractor::FeatureExtractor;

/// A pass record left out of the matrix, with the reason.
#[derive(Clone, Debug)]
pub struct SkippedEvent {
    /// Position in the input records.
    pub index: usize,
    /// The record as it was given.
    pub record: PassRecord,
    /// Display text of the error that excluded it.
    pub reason: String,
}

/// Outcome of a batch run: the stacked matrix plus every skipped event.
#[derive(Clone, Debug)]
pub struct BatchReport {
    /// One row per extracted event, in input order.
    pub matrix: FeatureMatrix,
    /// Events left out of the matrix, in input order.
    pub skipped: Vec<SkippedEvent>,
}

/// Offline batch analyzer: one feature row per labeled vehicle pass.
///
/// Events are extracted in parallel against the shared spectra; rows come
/// out in input order so they stay paired with their labels.
pub struct BatchAnalyzer<'a> {
    extractor: &'a FeatureExtractor,
}

impl<'a> BatchAnalyzer<'a> {
    #[must_use]
    pub fn new(extractor: &'a FeatureExtractor) -> Self {
        Self { extractor }
    }

    /// Extract and stack features for every record.
    ///
    /// Type ids follow the first appearance of each label in `records`. Events
    /// whose window does not fit the recording are skipped and reported; any
    /// other error aborts the batch.
    ///
    /// # Errors
    /// Returns the first non-recoverable [`AnalysisError`].
    ///
    /// # Example
    /// ```
    /// use vp_audio::batch_analyzer::BatchAnalyzer;
    /// use vp_audio::extractor::FeatureExtractor;
    /// use vp_audio::waveform::Waveform;
    /// use vp_core::config::ExtractConfig;
    /// use vp_core::records::parse_records;
    ///
    /// let n = 48_000 * 5;
    /// let left: Vec<f64> = (0..n).map(|i| (i as f64 * 0.05).sin()).collect();
    /// let wave = Waveform::new(left.clone(), left, 48_000).unwrap();
    /// let extractor = FeatureExtractor::from_waveform(&wave, &ExtractConfig::default()).unwrap();
    ///
    /// let records = parse_records("t0\tv\ttype\n2.0\t10\tnormal\n0.1\t-9\tbike\n3.0\t-8\tbike\n").unwrap();
    /// let report = BatchAnalyzer::new(&extractor).assemble(&records).unwrap();
    /// assert_eq!(report.matrix.labels, vec![0, 1]);
    /// assert_eq!(report.skipped.len(), 1);
    /// ```
    pub fn assemble(&self, records: &[PassRecord]) -> Result<BatchReport, AnalysisError> {
        let index = LabelIndex::from_records(records);

        let results: Vec<Result<Vec<f64>, AnalysisError>> = records
            .par_iter()
            .map(|record| self.extractor.feature(record.trajectory()))
            .collect();

        let mut matrix = FeatureMatrix::new(index);
        let mut skipped = Vec::new();

        for (i, (record, result)) in records.iter().zip(results).enumerate() {
            match result {
                Ok(features) => {
                    let label = matrix.index.id_of(&record.label).unwrap_or_default();
                    matrix.push(features, label).map_err(|e| match e {
                        CoreError::RaggedRow { expected, got } => AnalysisError::LengthMismatch {
                            what: "feature matrix row",
                            expected,
                            got,
                        },
                        other => AnalysisError::Configuration(other.to_string()),
                    })?;
                }
                Err(err @ AnalysisError::EmptyWindow { .. }) => {
                    log::warn!(
                        "Skipping event #{i} ({} at t0={:.2}s): {err}",
                        record.label,
                        record.t0
                    );
                    skipped.push(SkippedEvent {
                        index: i,
                        record: record.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        log::info!(
            "Assembled {} events ({} skipped), {} features each, {} classes",
            matrix.n_rows(),
            skipped.len(),
            matrix.n_features(),
            matrix.index.len()
        );

        Ok(BatchReport { matrix, skipped })
    }
}
