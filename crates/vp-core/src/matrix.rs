use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::CoreError;
use crate::records::LabelIndex;

/// Stacked per-event feature vectors with their integer type ids.
///
/// Row `i` pairs positionally with `labels[i]`; every row has the same width.
/// This is the hand-off format for the external classifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMatrix {
    /// Feature rows, one per event.
    pub rows: Vec<Vec<f64>>,
    /// Type id per row.
    pub labels: Vec<usize>,
    /// Id to label string mapping.
    pub index: LabelIndex,
}

impl FeatureMatrix {
    #[must_use]
    pub fn new(index: LabelIndex) -> Self {
        Self {
            rows: Vec::new(),
            labels: Vec::new(),
            index,
        }
    }

    /// Append one event row.
    ///
    /// # Errors
    /// Returns [`CoreError::RaggedRow`] if the width differs from earlier rows.
    ///
    /// # Example
    /// ```
    /// use vp_core::matrix::FeatureMatrix;
    /// use vp_core::records::LabelIndex;
    ///
    /// let mut m = FeatureMatrix::new(LabelIndex::from_labels(["normal"]));
    /// m.push(vec![1.0, 2.0], 0).unwrap();
    /// assert!(m.push(vec![1.0], 0).is_err());
    /// assert_eq!(m.n_rows(), 1);
    /// ```
    pub fn push(&mut self, features: Vec<f64>, label: usize) -> Result<(), CoreError> {
        if let Some(first) = self.rows.first()
            && first.len() != features.len()
        {
            return Err(CoreError::RaggedRow {
                expected: first.len(),
                got: features.len(),
            });
        }
        self.rows.push(features);
        self.labels.push(label);
        Ok(())
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of feature columns (excluding the label column).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Per-class row counts, indexed by type id.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.index.len()];
        for &label in &self.labels {
            if let Some(c) = counts.get_mut(label) {
                *c += 1;
            }
        }
        counts
    }

    /// Write as CSV: feature columns then the type id, one event per line.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn write_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for (row, label) in self.rows.iter().zip(&self.labels) {
            for value in row {
                write!(out, "{value},")?;
            }
            writeln!(out, "{label}")?;
        }
        out.flush()
    }

    /// Id to label string map, keyed by the id rendered as text.
    #[must_use]
    pub fn label_map(&self) -> BTreeMap<String, String> {
        self.index
            .names()
            .iter()
            .enumerate()
            .map(|(id, name)| (id.to_string(), name.clone()))
            .collect()
    }

    /// Write the feature CSV and the JSON label map.
    ///
    /// # Errors
    /// Returns an error if either file cannot be created or written.
    pub fn save(&self, csv_path: &Path, labels_path: &Path) -> Result<()> {
        let file = File::create(csv_path)
            .with_context(|| format!("Cannot create {}", csv_path.display()))?;
        self.write_csv(BufWriter::new(file))
            .with_context(|| format!("Cannot write {}", csv_path.display()))?;

        let json = serde_json::to_string_pretty(&self.label_map())
            .context("Cannot serialize label map")?;
        std::fs::write(labels_path, json)
            .with_context(|| format!("Cannot write {}", labels_path.display()))?;

        log::info!(
            "Wrote {}×{} feature matrix to {} (labels: {})",
            self.n_rows(),
            self.n_features(),
            csv_path.display(),
            labels_path.display()
        );
        Ok(())
    }
}
