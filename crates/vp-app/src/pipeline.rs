use std::path::Path;

use anyhow::{Context, Result};
use vp_audio::batch_analyzer::{BatchAnalyzer, BatchReport};
use vp_audio::decode::decode_stereo;
use vp_audio::extractor::FeatureExtractor;
use vp_core::config::ExtractConfig;
use vp_core::records::{filter_records, load_records};

/// Decode, analyze, and assemble the feature matrix for one recording.
///
/// # Errors
/// Returns an error if the audio or the pass table cannot be loaded, or the
/// extraction fails for a reason other than an event too close to an edge.
pub fn extract_matrix(
    wavfile: &Path,
    vehicle_info: &Path,
    config: &ExtractConfig,
) -> Result<BatchReport> {
    let records = load_records(vehicle_info)?;
    let total = records.len();
    let records = filter_records(records, &config.events);
    log::info!("{} of {} passes selected", records.len(), total);
    if records.is_empty() {
        anyhow::bail!("No pass left in {} after filtering", vehicle_info.display());
    }

    let wave = decode_stereo(wavfile)?;
    let extractor = FeatureExtractor::from_waveform(&wave, config)
        .with_context(|| format!("Spectral analysis of {} failed", wavfile.display()))?;
    drop(wave);

    log::info!(
        "{:?} extractor: {} frames per pass, {} features",
        extractor.kind(),
        extractor.window_len(),
        extractor.feature_len()
    );

    let report = BatchAnalyzer::new(&extractor)
        .assemble(&records)
        .context("Feature assembly failed")?;
    Ok(report)
}

/// Run the whole pipeline and write both outputs.
///
/// # Errors
/// Returns an error if extraction or writing fails.
pub fn run(
    wavfile: &Path,
    vehicle_info: &Path,
    output: &Path,
    labels: &Path,
    config: &ExtractConfig,
) -> Result<()> {
    let report = extract_matrix(wavfile, vehicle_info, config)?;

    for skipped in &report.skipped {
        log::warn!(
            "Pass #{} ({}, t0={:.2}s) not in matrix: {}",
            skipped.index,
            skipped.record.label,
            skipped.record.t0,
            skipped.reason
        );
    }
    if report.matrix.n_rows() == 0 {
        anyhow::bail!("Every pass was skipped, nothing to write");
    }

    report.matrix.save(output, labels)?;

    let counts = report.matrix.class_counts();
    for (name, count) in report.matrix.index.names().iter().zip(counts) {
        log::info!("  {name}: {count} passes");
    }
    Ok(())
}
