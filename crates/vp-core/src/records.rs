use std::path::Path;

use anyhow::{Context, Result};

use crate::config::EventFilter;
use crate::error::CoreError;

/// A hypothesized vehicle trajectory: pass time and constant signed speed.
///
/// The sign of `v` encodes the travel direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trajectory {
    /// Pass time in seconds from the start of the recording.
    pub t0: f64,
    /// Signed speed in m/s.
    pub v: f64,
}

impl Trajectory {
    #[must_use]
    pub fn new(t0: f64, v: f64) -> Self {
        Self { t0, v }
    }
}

/// One labeled vehicle pass from the detection table.
#[derive(Clone, Debug, PartialEq)]
pub struct PassRecord {
    /// Pass time in seconds.
    pub t0: f64,
    /// Signed speed in m/s.
    pub v: f64,
    /// Vehicle type label (e.g. `"normal"`, `"bike"`).
    pub label: String,
    /// Optional `detect` column.
    pub detected: Option<bool>,
    /// Optional `correct` column.
    pub correct: Option<bool>,
}

impl PassRecord {
    #[must_use]
    pub fn trajectory(&self) -> Trajectory {
        Trajectory::new(self.t0, self.v)
    }
}

/// Label string to integer type id, assigned in order of first appearance.
///
/// # Example
/// ```
/// use vp_core::records::LabelIndex;
/// let index = LabelIndex::from_labels(["normal", "bike", "normal"]);
/// assert_eq!(index.id_of("bike"), Some(1));
/// assert_eq!(index.names(), &["normal".to_string(), "bike".to_string()]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelIndex {
    names: Vec<String>,
}

impl LabelIndex {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for label in labels {
            if !names.iter().any(|n| n == label) {
                names.push(label.to_string());
            }
        }
        Self { names }
    }

    #[must_use]
    pub fn from_records(records: &[PassRecord]) -> Self {
        Self::from_labels(records.iter().map(|r| r.label.as_str()))
    }

    #[must_use]
    pub fn id_of(&self, label: &str) -> Option<usize> {
        self.names.iter().position(|n| n == label)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Column positions resolved from the header row.
struct Columns {
    t0: usize,
    v: usize,
    label: usize,
    detect: Option<usize>,
    correct: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, CoreError> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| CoreError::MissingColumn {
                column: name.to_string(),
            })
        };
        Ok(Self {
            t0: require("t0")?,
            v: require("v")?,
            label: require("type")?,
            detect: find("detect"),
            correct: find("correct"),
        })
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a tab-separated pass table with a header row.
///
/// Required columns are `t0`, `v` and `type`; `detect` and `correct` are
/// picked up when present. Blank lines are skipped.
///
/// # Errors
/// Returns [`CoreError::MissingColumn`] or [`CoreError::InvalidRecord`].
///
/// # Example
/// ```
/// use vp_core::records::parse_records;
/// let table = "t0\tv\ttype\n12.5\t-8.3\tnormal\n20.0\t9.1\tbike\n";
/// let records = parse_records(table).unwrap();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[1].label, "bike");
/// ```
pub fn parse_records(content: &str) -> Result<Vec<PassRecord>, CoreError> {
    let mut lines = content.lines().enumerate();
    let Some((_, header)) = lines.find(|(_, l)| !l.trim().is_empty()) else {
        return Err(CoreError::MissingColumn {
            column: "t0".into(),
        });
    };
    let columns = Columns::from_header(header)?;

    let mut records = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |col: usize, name: &str| {
            fields
                .get(col)
                .map(|f| f.trim())
                .ok_or_else(|| CoreError::InvalidRecord {
                    line: line_no,
                    reason: format!("missing '{name}' field"),
                })
        };
        let number = |col: usize, name: &str| -> Result<f64, CoreError> {
            let raw = field(col, name)?;
            raw.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| CoreError::InvalidRecord {
                    line: line_no,
                    reason: format!("'{name}' is not a finite number: {raw:?}"),
                })
        };

        let label = field(columns.label, "type")?;
        if label.is_empty() {
            return Err(CoreError::InvalidRecord {
                line: line_no,
                reason: "empty 'type' field".into(),
            });
        }

        records.push(PassRecord {
            t0: number(columns.t0, "t0")?,
            v: number(columns.v, "v")?,
            label: label.to_string(),
            detected: columns
                .detect
                .and_then(|c| fields.get(c))
                .and_then(|f| parse_bool(f)),
            correct: columns
                .correct
                .and_then(|c| fields.get(c))
                .and_then(|f| parse_bool(f)),
        });
    }
    Ok(records)
}

/// Read and parse a pass table from disk.
///
/// # Errors
/// Returns an error if the file is missing, unreadable, or malformed.
pub fn load_records(path: &Path) -> Result<Vec<PassRecord>> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let records = parse_records(&content)
        .with_context(|| format!("Malformed pass table {}", path.display()))?;
    log::info!("Loaded {} pass records from {}", records.len(), path.display());
    Ok(records)
}

/// Flag every record that has another pass within `range` seconds.
///
/// Computed over the full table, so excluded types still count as neighbors.
#[must_use]
pub fn simultaneous_flags(records: &[PassRecord], range: f64) -> Vec<bool> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[a].t0.total_cmp(&records[b].t0));

    let mut flags = vec![false; records.len()];
    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if records[b].t0 - records[a].t0 <= range {
            flags[a] = true;
            flags[b] = true;
        }
    }
    flags
}

/// Apply an [`EventFilter`], preserving the input order of survivors.
///
/// # Example
/// ```
/// use vp_core::config::EventFilter;
/// use vp_core::records::{filter_records, parse_records};
///
/// let table = "t0\tv\ttype\n10\t8\tnormal\n11\t8\tbike\n30\t8\ttruck\n50\t8\tnormal\n";
/// let records = parse_records(table).unwrap();
/// let filter = EventFilter {
///     exclude_types: vec!["truck".into()],
///     simul_range: Some(2.0),
///     require_detected: false,
/// };
/// let kept = filter_records(records, &filter);
/// assert_eq!(kept.len(), 1);
/// assert!((kept[0].t0 - 50.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn filter_records(records: Vec<PassRecord>, filter: &EventFilter) -> Vec<PassRecord> {
    let total = records.len();
    let simul = filter
        .simul_range
        .map(|range| simultaneous_flags(&records, range));

    let kept: Vec<PassRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(i, r)| {
            if filter.exclude_types.iter().any(|t| *t == r.label) {
                return false;
            }
            if filter.require_detected
                && (r.detected == Some(false) || r.correct == Some(false))
            {
                return false;
            }
            !simul.as_ref().is_some_and(|flags| flags[*i])
        })
        .map(|(_, r)| r)
        .collect();

    log::debug!("Event filter kept {}/{} records", kept.len(), total);
    kept
}
