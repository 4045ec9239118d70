//! # mobpack
//!
//! Command-line tool that assembles the layered mobile SDK package:
//!
//! ```text
//! mobpack                  # all stages, release
//! mobpack -c               # core library only
//! mobpack -a --debug       # app platform only, debug
//! mobpack --clean          # remove every output for both build types
//! mobpack --init           # write a starter mobpack.toml
//! ```
//!
//! The stage flags are mutually exclusive; passing more than one is a usage
//! error.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};

use mobpack_core::{
    BuildConfiguration, BuildType, Pipeline, PipelineSettings, StageSelector, Toolchain,
};

pub mod config;
pub mod telemetry;

use config::{CONFIG_FILE_NAME, ConfigResolver, EnvOverrides, MobpackConfig};

/// Builds the media engine, core library and app platform frameworks into one package.
#[derive(Parser, Debug)]
#[command(
    name = "mobpack",
    author,
    version,
    about = "Mobile SDK package build coordinator",
    long_about = None
)]
#[command(group(
    ArgGroup::new("stage")
        .args(["media_engine", "core_library", "app_platform"])
        .multiple(false)
))]
pub struct Cli {
    /// Build only the media-engine framework.
    #[arg(short = 'm', long)]
    pub media_engine: bool,

    /// Build only the core library, its header and module map.
    #[arg(short = 'c', long)]
    pub core_library: bool,

    /// Build only the app-platform framework (needs the other two stages' outputs).
    #[arg(short = 'a', long)]
    pub app_platform: bool,

    /// Build the debug configuration instead of release.
    #[arg(short, long)]
    pub debug: bool,

    /// Remove all outputs for both build types and exit.
    #[arg(long, conflicts_with = "init")]
    pub clean: bool,

    /// Write a starter mobpack.toml in the current directory and exit.
    #[arg(long)]
    pub init: bool,

    /// Path to the config file (default: discovered mobpack.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the output root.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Stream tool output and log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn stage_selector(&self) -> StageSelector {
        if self.media_engine {
            StageSelector::MediaEngine
        } else if self.core_library {
            StageSelector::CoreLibrary
        } else if self.app_platform {
            StageSelector::AppPlatform
        } else {
            StageSelector::All
        }
    }

    pub fn build_type(&self) -> BuildType {
        if self.debug {
            BuildType::Debug
        } else {
            BuildType::Release
        }
    }

    pub fn build_configuration(&self) -> BuildConfiguration {
        BuildConfiguration {
            stage_selector: self.stage_selector(),
            build_type: self.build_type(),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    load_dotenv(&cwd);
    telemetry::init_tracing(cli.verbose);

    if cli.init {
        return cmd_init(&cwd, cli.config.as_deref());
    }

    let settings = resolve_settings(&cli, &cwd)?;
    let toolchain = Toolchain::system(&settings.tools, cli.verbose);
    let pipeline = Pipeline::new(&settings, &toolchain);

    if cli.clean {
        return cmd_clean(&pipeline);
    }
    cmd_build(&pipeline, &cli.build_configuration())
}

fn resolve_settings(cli: &Cli, cwd: &Path) -> Result<PipelineSettings> {
    let resolver = ConfigResolver::load(cli.config.as_deref(), cwd)?;
    match &resolver.config_path {
        Some(path) => tracing::debug!(config = %path.display(), "loaded config"),
        None => tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults"),
    }
    resolver.settings(cwd, &EnvOverrides::from_env(), cli.output_dir.as_deref())
}

fn cmd_build(pipeline: &Pipeline<'_>, config: &BuildConfiguration) -> Result<()> {
    let stages: Vec<&str> = config
        .stage_selector
        .stages()
        .iter()
        .map(|stage| stage.as_str())
        .collect();
    println!("Building {} ({})...", stages.join(", "), config.build_type);
    let report = pipeline.run(config)?;

    for output in &report.stages {
        println!("✓ {}", output.stage);
        for artifact in &output.artifacts {
            println!("    {}", artifact.display());
        }
    }
    println!(
        "Outputs written to {}",
        pipeline.layout().build_root(report.build_type).display()
    );
    Ok(())
}

fn cmd_clean(pipeline: &Pipeline<'_>) -> Result<()> {
    let report = pipeline.clean()?;
    if report.removed.is_empty() {
        println!("Nothing to clean");
    } else {
        for path in &report.removed {
            println!("Removed {}", path.display());
        }
        println!("✓ Cleaned {} path(s)", report.removed.len());
    }
    Ok(())
}

fn cmd_init(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.join(CONFIG_FILE_NAME));
    let crate_name = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "core".to_string());
    MobpackConfig::write_starter(&path, &crate_name)?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}

fn load_dotenv(cwd: &Path) {
    let _ = dotenvy::from_path(cwd.join(".env"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_release() {
        let cli = Cli::try_parse_from(["mobpack"]).unwrap();
        assert_eq!(cli.build_configuration(), BuildConfiguration::default());
    }

    #[test]
    fn single_stage_flags() {
        let cli = Cli::try_parse_from(["mobpack", "-c"]).unwrap();
        assert_eq!(cli.stage_selector(), StageSelector::CoreLibrary);

        let cli = Cli::try_parse_from(["mobpack", "--app-platform", "--debug"]).unwrap();
        assert_eq!(
            cli.build_configuration(),
            BuildConfiguration {
                stage_selector: StageSelector::AppPlatform,
                build_type: BuildType::Debug,
            }
        );

        let cli = Cli::try_parse_from(["mobpack", "-m", "-d"]).unwrap();
        assert_eq!(cli.stage_selector(), StageSelector::MediaEngine);
        assert_eq!(cli.build_type(), BuildType::Debug);
    }

    #[test]
    fn stage_flags_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["mobpack", "-m", "-c"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(Cli::try_parse_from(["mobpack", "--core-library", "--app-platform"]).is_err());
    }

    #[test]
    fn clean_and_init_conflict() {
        assert!(Cli::try_parse_from(["mobpack", "--clean"]).unwrap().clean);
        assert!(Cli::try_parse_from(["mobpack", "--clean", "--init"]).is_err());
    }

    #[test]
    fn help_short_circuits() {
        let err = Cli::try_parse_from(["mobpack", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
