//! mitomorph CLI - analyzes every stack in a folder against its ROI file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use common::file_utils::{files_with_extensions, STACK_EXTENSIONS};
use mitomorph::{
    AnalysisConfig, ArtifactWriter, BackendKind, BatchRunner, Calibration, JsonRoiProvider,
    NoArtifacts, RoiAnalyzer, ShollMode, TiffArtifactWriter, TiffStackSource, TsvResultsSink,
};

#[derive(Parser)]
#[command(name = "mitomorph")]
#[command(about = "Mitochondrial network morphometry inside astrocyte ROIs")]
#[command(version)]
struct Cli {
    /// Folder with the TIFF stacks and their `<stem>.rois.json` files.
    images_dir: PathBuf,

    /// Channel holding the mitochondria (0-based). Acquisitions carry the
    /// astrocyte marker first and the mitochondria second.
    #[arg(long, default_value = "1")]
    channel: usize,

    /// Channels interleaved per slice in each stack.
    #[arg(long, default_value = "2")]
    channels: usize,

    /// In-plane pixel size in microns.
    #[arg(long, default_value = "1.0")]
    pixel_width: f64,

    /// Slice spacing in microns.
    #[arg(long, default_value = "1.0")]
    pixel_depth: f64,

    /// JSON analysis configuration; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder with ROI files, when they are not next to the stacks.
    #[arg(long)]
    rois_dir: Option<PathBuf>,

    /// Output folder (default: `<images_dir>/Results`).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Images analyzed concurrently (overrides the configuration).
    #[arg(long)]
    jobs: Option<usize>,

    /// Filter backend (overrides the configuration).
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Radial profile sampling (overrides the configuration).
    #[arg(long, value_enum)]
    sholl_mode: Option<ShollModeArg>,

    /// Skip writing object stacks, skeleton projections and profiles.
    #[arg(long)]
    no_artifacts: bool,

    /// Base log level; RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Cpu,
    Gpu,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cpu => BackendKind::Cpu,
            BackendArg::Gpu => BackendKind::Gpu,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShollModeArg {
    Planar,
    Volumetric,
}

impl From<ShollModeArg> for ShollMode {
    fn from(arg: ShollModeArg) -> Self {
        match arg {
            ShollModeArg::Planar => ShollMode::Planar,
            ShollModeArg::Volumetric => ShollMode::Volumetric,
        }
    }
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(jobs) = cli.jobs {
        config.max_parallel_images = jobs.max(1);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(mode) = cli.sholl_mode {
        config.sholl.mode = mode.into();
    }
    if cli.no_artifacts {
        config.write_artifacts = false;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| cli.images_dir.join("Results"));
    common::log_setup::setup_logging(&cli.log_level, &out_dir.join("logs"), "mitomorph")
        .context("Failed to set up logging")?;

    if cli.channels == 0 || cli.channel >= cli.channels {
        bail!(
            "--channel {} must be below --channels {}",
            cli.channel,
            cli.channels
        );
    }
    if cli.pixel_width <= 0.0 || cli.pixel_depth <= 0.0 {
        bail!("pixel sizes must be positive");
    }

    let config = load_config(&cli)?;
    let analyzer = RoiAnalyzer::new(config).context("Filter backend check failed")?;

    let images = files_with_extensions(&cli.images_dir, STACK_EXTENSIONS)
        .with_context(|| format!("Failed to list {}", cli.images_dir.display()))?;
    if images.is_empty() {
        tracing::warn!(dir = %cli.images_dir.display(), "No TIFF stacks found");
        return Ok(());
    }
    tracing::info!(images = images.len(), out = %out_dir.display(), "Starting run");

    let source = TiffStackSource::new(
        cli.channels,
        Calibration::new(cli.pixel_width, cli.pixel_depth),
    );
    let rois = match &cli.rois_dir {
        Some(dir) => JsonRoiProvider::in_dir(dir),
        None => JsonRoiProvider::beside_images(),
    };
    let artifacts: Box<dyn ArtifactWriter> = if analyzer.config().write_artifacts {
        Box::new(TiffArtifactWriter::new(&out_dir))
    } else {
        Box::new(NoArtifacts)
    };

    let results_path = out_dir.join("Results.xls");
    let mut sink = TsvResultsSink::create(&results_path)
        .with_context(|| format!("Failed to create {}", results_path.display()))?;

    let runner = BatchRunner::new(&analyzer, &source, &rois, artifacts.as_ref(), cli.channel);
    let summary = runner.run(&images, &mut sink).context("Run aborted")?;

    println!(
        "Analyzed {} ROIs in {} images ({} images skipped, {} ROIs failed). Results: {}",
        summary.rois_analyzed,
        summary.images_processed,
        summary.images_skipped,
        summary.rois_failed,
        results_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_read_second_of_two_channels() {
        let cli = Cli::try_parse_from(["mitomorph", "/data/stacks"]).unwrap();
        assert_eq!(cli.channels, 2);
        assert_eq!(cli.channel, 1);
        assert!(cli.channel < cli.channels);
    }

    #[test]
    fn test_overrides_reach_config() {
        let cli = Cli::try_parse_from([
            "mitomorph",
            "/data/stacks",
            "--channels",
            "1",
            "--channel",
            "0",
            "--jobs",
            "4",
            "--sholl-mode",
            "volumetric",
            "--no-artifacts",
        ])
        .unwrap();
        assert_eq!((cli.channels, cli.channel), (1, 0));

        let config = load_config(&cli).unwrap();
        assert_eq!(config.max_parallel_images, 4);
        assert_eq!(config.sholl.mode, ShollMode::Volumetric);
        assert!(!config.write_artifacts);
    }
}
