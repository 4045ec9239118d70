//! The pipeline coordinator.
//!
//! Stages run strictly one after another in [`Stage::ORDER`](crate::types::Stage::ORDER), restricted to the
//! selected subset. The first failure aborts the run; later stages are never
//! attempted.

use std::fs;
use std::io;
use std::path::Path;

use crate::fs_ops;
use crate::layout::ArtifactLayout;
use crate::preflight;
use crate::settings::PipelineSettings;
use crate::stages::{StageContext, builder_for};
use crate::tools::Toolchain;
use crate::types::{BuildConfiguration, BuildType, CleanReport, PackError, PipelineReport};

/// Drives the stages against one output root.
///
/// # Example
///
/// ```ignore
/// use mobpack_core::{BuildConfiguration, BuildType, Pipeline, PipelineSettings, StageSelector, Toolchain};
///
/// let settings = PipelineSettings::new(Path::new("."));
/// let toolchain = Toolchain::system(&settings.tools, false);
/// let pipeline = Pipeline::new(&settings, &toolchain);
///
/// let report = pipeline.run(&BuildConfiguration {
///     stage_selector: StageSelector::CoreLibrary,
///     build_type: BuildType::Release,
/// })?;
/// ```
pub struct Pipeline<'a> {
    settings: &'a PipelineSettings,
    toolchain: &'a Toolchain,
    layout: ArtifactLayout,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a PipelineSettings, toolchain: &'a Toolchain) -> Self {
        Self {
            settings,
            toolchain,
            layout: ArtifactLayout::new(settings),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Checks the environment, then builds every selected stage in order.
    pub fn run(&self, config: &BuildConfiguration) -> Result<PipelineReport, PackError> {
        let stages = config.stage_selector.stages();
        preflight::check(self.settings, self.toolchain, &stages)?;

        let ctx = StageContext {
            settings: self.settings,
            layout: &self.layout,
            toolchain: self.toolchain,
        };

        let mut report = PipelineReport {
            build_type: config.build_type,
            stages: Vec::with_capacity(stages.len()),
        };
        for stage in stages {
            tracing::info!(%stage, build_type = %config.build_type, "stage started");
            let output = builder_for(stage, ctx).build(config.build_type)?;
            tracing::info!(%stage, artifacts = output.artifacts.len(), "stage complete");
            report.stages.push(output);
        }
        Ok(report)
    }

    /// Removes every output and cache the pipeline creates, for both build types.
    ///
    /// Invokes no external tool. Paths that do not exist are skipped, so
    /// cleaning twice succeeds both times.
    pub fn clean(&self) -> Result<CleanReport, PackError> {
        let mut report = CleanReport::default();
        let app = &self.settings.app_platform;

        let mut targets = self.layout.all_output_dirs();
        targets.push(self.settings.core_library.target_dir());
        targets.push(app.project_dir.join("Pods"));
        targets.push(app.workspace_path().join("xcuserdata"));

        for path in targets {
            let removed = fs_ops::remove_path(&path)
                .map_err(|e| PackError::fs("failed to remove", &path, e))?;
            if removed {
                tracing::info!(path = %path.display(), "removed");
                report.removed.push(path);
            }
        }

        // Leftover parents, innermost first.
        let root = self.layout.output_root();
        let mut parents: Vec<_> = BuildType::ALL
            .iter()
            .map(|bt| self.layout.build_root(*bt))
            .collect();
        parents.push(self.layout.work_base());
        parents.push(root.to_path_buf());
        for dir in parents {
            if remove_if_empty(&dir).map_err(|e| PackError::fs("failed to remove", &dir, e))? {
                report.removed.push(dir);
            }
        }

        Ok(report)
    }
}

fn remove_if_empty(dir: &Path) -> io::Result<bool> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    Ok(true)
}
