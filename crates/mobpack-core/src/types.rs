//! Core types for mobpack-core.
//!
//! This module defines the fundamental types used throughout the coordinator:
//!
//! - [`PackError`] - Error type for every pipeline, merge and clean operation
//! - [`Stage`] / [`StageSelector`] - Which component builds run, in which order
//! - [`BuildType`] / [`BuildConfiguration`] - The immutable per-run configuration
//! - [`StageOutput`] / [`PipelineReport`] - What a run produced

use std::fmt;
use std::path::PathBuf;

use crate::header::HeaderError;
use crate::merge::MergeError;
use crate::tools::ToolStatus;

/// Error types for mobpack-core operations.
///
/// Every stage-scoped variant carries the [`Stage`] so the message shown to the
/// user always names the failing stage.
///
/// # Example
///
/// ```ignore
/// use mobpack_core::{PackError, Pipeline};
///
/// match pipeline.run(&config) {
///     Ok(report) => println!("built {} stage(s)", report.stages.len()),
///     Err(PackError::ExternalBuild { stage, step, .. }) => {
///         eprintln!("{stage}: {step} failed, re-run after fixing the build");
///     }
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// A prerequisite tool or setting is missing.
    ///
    /// Raised by preflight before any stage runs.
    #[error("environment check failed: {0}")]
    Environment(String),

    /// The settings themselves are inconsistent (e.g. an unknown target triple).
    #[error("configuration error: {0}. Check mobpack.toml or CLI flags")]
    Config(String),

    /// A delegated build step ran and reported failure.
    #[error("{stage}: {step} failed ({status})")]
    ExternalBuild {
        stage: Stage,
        step: String,
        status: ToolStatus,
    },

    /// A delegated build step could not be started at all.
    #[error("{stage}: failed to start {step}: {source}. Ensure the tool is installed and on PATH")]
    ToolLaunch {
        stage: Stage,
        step: String,
        #[source]
        source: std::io::Error,
    },

    /// Architecture slices could not be merged into a universal binary.
    #[error("{stage}: {source}")]
    Merge {
        stage: Stage,
        #[source]
        source: MergeError,
    },

    /// The binding header could not be generated.
    #[error("core-library: header generation failed: {0}")]
    Header(#[from] HeaderError),

    /// A product the stage (or a prerequisite stage) should have produced is absent.
    #[error("{stage}: expected artifact not found at {}", .path.display())]
    MissingArtifact { stage: Stage, path: PathBuf },

    /// The provenance record could not be written.
    #[error("provenance: {0}")]
    Provenance(String),

    /// A copy, move or delete failed.
    #[error("{context} ({}): {source}", .path.display())]
    Filesystem {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackError {
    /// Builds a [`PackError::Filesystem`] from an I/O error.
    pub fn fs(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Filesystem {
            context: context.into(),
            path: path.into(),
            source,
        }
    }
}

/// One independently-buildable component of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Media-engine framework built by its own native build system.
    MediaEngine,
    /// Core interface library cross-compiled per architecture.
    CoreLibrary,
    /// Consumer-facing framework linking against the two above.
    AppPlatform,
}

impl Stage {
    /// The fixed dependency order every run follows.
    pub const ORDER: [Stage; 3] = [Stage::MediaEngine, Stage::CoreLibrary, Stage::AppPlatform];

    /// Returns the label used in directory names and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MediaEngine => "media-engine",
            Stage::CoreLibrary => "core-library",
            Stage::AppPlatform => "app-platform",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage group a run executes.
///
/// # Example
///
/// ```
/// use mobpack_core::{Stage, StageSelector};
///
/// assert_eq!(StageSelector::CoreLibrary.stages(), vec![Stage::CoreLibrary]);
/// assert_eq!(StageSelector::All.stages(), Stage::ORDER.to_vec());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageSelector {
    /// Every stage, in dependency order.
    #[default]
    All,
    MediaEngine,
    CoreLibrary,
    AppPlatform,
}

impl StageSelector {
    /// Returns the selected stages, always a subsequence of [`Stage::ORDER`].
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ORDER
            .into_iter()
            .filter(|stage| self.includes(*stage))
            .collect()
    }

    /// Returns `true` if `stage` runs under this selector.
    pub fn includes(&self, stage: Stage) -> bool {
        match self {
            StageSelector::All => true,
            StageSelector::MediaEngine => stage == Stage::MediaEngine,
            StageSelector::CoreLibrary => stage == Stage::CoreLibrary,
            StageSelector::AppPlatform => stage == Stage::AppPlatform,
        }
    }
}

/// Build type controlling optimization and which output subtree is used.
///
/// Debug and release outputs live in disjoint subtrees of the output root.
///
/// # Example
///
/// ```
/// use mobpack_core::BuildType;
///
/// assert_eq!(BuildType::Debug.as_str(), "debug");
/// assert_eq!(BuildType::Release.configuration(), "Release");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildType {
    /// Debug build with symbols and no optimizations.
    Debug,
    /// Optimized build; the default.
    #[default]
    Release,
}

impl BuildType {
    /// Both build types, used by clean.
    pub const ALL: [BuildType; 2] = [BuildType::Debug, BuildType::Release];

    /// Returns the lowercase name (`debug` / `release`), which is also the
    /// output subtree and the cross-compiler's profile directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }

    /// Returns the configuration name the application-platform tool expects.
    pub fn configuration(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one pipeline run. Immutable once the run starts.
///
/// # Example
///
/// ```
/// use mobpack_core::{BuildConfiguration, BuildType, StageSelector};
///
/// let config = BuildConfiguration {
///     stage_selector: StageSelector::CoreLibrary,
///     build_type: BuildType::Release,
/// };
/// assert_eq!(config, BuildConfiguration::default().with_selector(StageSelector::CoreLibrary));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildConfiguration {
    /// Stages to execute.
    pub stage_selector: StageSelector,
    /// Output subtree and configuration flag forwarded to every tool.
    pub build_type: BuildType,
}

impl BuildConfiguration {
    /// Returns a copy with a different stage selector.
    pub fn with_selector(mut self, stage_selector: StageSelector) -> Self {
        self.stage_selector = stage_selector;
        self
    }

    /// Returns a copy with a different build type.
    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }
}

/// Result of one completed stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Stage that was built.
    pub stage: Stage,
    /// Canonical paths of every artifact the stage placed.
    pub artifacts: Vec<PathBuf>,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub build_type: BuildType,
    /// Completed stages, in execution order.
    pub stages: Vec<StageOutput>,
}

/// Result of a clean.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Paths that existed and were removed.
    pub removed: Vec<PathBuf>,
}
