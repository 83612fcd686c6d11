use anyhow::Result;
use clap::Parser;
use vp_core::config::ExtractConfig;

pub mod cli;
pub mod pipeline;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    // 3. Charger la config
    let mut config = resolve_config(&cli)?;

    // 4. Appliquer les overrides CLI, puis valider avant toute analyse
    cli.apply_overrides(&mut config)?;
    config.validate()?;

    // 5. Extraction et écriture
    pipeline::run(
        &cli.wavfile,
        &cli.vehicle_info,
        &cli.output,
        &cli.labels,
        &config,
    )
}

/// Load `--config` if it exists, otherwise fall back to the defaults.
fn resolve_config(cli: &cli::Cli) -> Result<ExtractConfig> {
    if cli.config.exists() {
        vp_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config not found: {}. Using defaults.",
            cli.config.display()
        );
        Ok(ExtractConfig::default())
    }
}
