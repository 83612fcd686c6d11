use std::path::PathBuf;

use clap::Parser;
use vp_core::config::{ExtractConfig, ExtractorKind};

/// vpass: vehicle type features from two-microphone roadside recordings.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Two-channel roadside recording (WAV, FLAC, ...).
    pub wavfile: PathBuf,

    /// Tab-separated pass table with `t0`, `v` and `type` columns.
    pub vehicle_info: PathBuf,

    /// TOML configuration file. Defaults are used if it does not exist.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Feature matrix output (CSV, type id in the last column).
    #[arg(short, long, default_value = "features.csv")]
    pub output: PathBuf,

    /// Type id to label map output (JSON).
    #[arg(long, default_value = "labels.json")]
    pub labels: PathBuf,

    /// Raw frame strategy: "shift-merge" or "single".
    #[arg(long)]
    pub extractor: Option<String>,

    /// Window around each pass, in seconds.
    #[arg(short, long)]
    pub win: Option<f64>,

    /// Band limit in Hz.
    #[arg(long, conflicts_with = "no_cutoff")]
    pub cutoff: Option<f64>,

    /// Keep every frequency bin above DC.
    #[arg(long, default_value_t = false)]
    pub no_cutoff: bool,

    /// Non-overlapping block averaging instead of a sliding moving average.
    #[arg(long, default_value_t = false)]
    pub block: bool,

    /// Append inter-frame amplitude ratios and phase differences to each feature vector.
    #[arg(long, default_value_t = false)]
    pub phase_diff: bool,

    /// Drop passes of this type (repeatable).
    #[arg(long = "exclude-type")]
    pub exclude_types: Vec<String>,

    /// Drop passes closer than this many seconds to another pass.
    #[arg(long)]
    pub simul_range: Option<f64>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// # Errors
    /// Returns an error for an unknown extractor name.
    pub fn apply_overrides(&self, config: &mut ExtractConfig) -> anyhow::Result<()> {
        if let Some(ref name) = self.extractor {
            config.extractor = match name.as_str() {
                "shift-merge" | "shift_merge" | "merge" => ExtractorKind::ShiftMerge,
                "single" | "single-channel" | "single_channel" => ExtractorKind::SingleChannel,
                _ => anyhow::bail!("Unknown extractor '{name}'. Use shift-merge or single."),
            };
        }
        if let Some(win) = self.win {
            config.win = win;
        }
        if let Some(cutoff) = self.cutoff {
            config.cutoff = Some(cutoff);
        }
        if self.no_cutoff {
            config.cutoff = None;
        }
        if self.block {
            config.ma_overlap = false;
        }
        if self.phase_diff {
            config.phase_diff = true;
        }
        if !self.exclude_types.is_empty() {
            config.events.exclude_types.clone_from(&self.exclude_types);
        }
        if let Some(range) = self.simul_range {
            config.events.simul_range = Some(range);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "vpass",
            "rec.wav",
            "passes.tsv",
            "--extractor",
            "single",
            "--win",
            "4",
            "--no-cutoff",
            "--block",
            "--exclude-type",
            "truck",
            "--simul-range",
            "2",
        ])
        .unwrap();

        let mut config = ExtractConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.extractor, ExtractorKind::SingleChannel);
        assert!((config.win - 4.0).abs() < f64::EPSILON);
        assert!(config.cutoff.is_none());
        assert!(!config.ma_overlap);
        assert_eq!(config.events.exclude_types, vec!["truck".to_string()]);
        assert_eq!(config.events.simul_range, Some(2.0));
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["vpass", "rec.wav", "passes.tsv"]).unwrap();
        let mut config = ExtractConfig {
            ma_len: 4,
            ..ExtractConfig::default()
        };
        let before = config.clone();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn unknown_extractor_rejected() {
        let cli =
            Cli::try_parse_from(["vpass", "rec.wav", "passes.tsv", "--extractor", "svm"]).unwrap();
        assert!(cli.apply_overrides(&mut ExtractConfig::default()).is_err());
    }

    #[test]
    fn cutoff_conflicts_with_no_cutoff() {
        let parsed = Cli::try_parse_from([
            "vpass",
            "rec.wav",
            "passes.tsv",
            "--cutoff",
            "5000",
            "--no-cutoff",
        ]);
        assert!(parsed.is_err());
    }
}
