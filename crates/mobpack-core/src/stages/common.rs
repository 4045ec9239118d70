//! Helpers shared by the stage builders.
//!
//! Every helper maps its failure onto a [`PackError`] labelled with the stage,
//! so callers can use `?` without adding context.

use std::fs;
use std::path::{Path, PathBuf};

use crate::fs_ops;
use crate::provenance::Provenance;
use crate::settings::PipelineSettings;
use crate::tools::{Collaborator, Invocation};
use crate::types::{BuildType, PackError, Stage};

const STAGING_DIR: &str = "staging";

/// Runs one external step and turns launch failures and non-zero exits into errors.
pub(crate) fn run_step(
    tool: &dyn Collaborator,
    invocation: &Invocation,
    stage: Stage,
    step: &str,
) -> Result<(), PackError> {
    tracing::info!(%stage, step, "running external step");
    let status = tool.run(invocation).map_err(|source| PackError::ToolLaunch {
        stage,
        step: step.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(PackError::ExternalBuild {
            stage,
            step: step.to_string(),
            status,
        });
    }
    Ok(())
}

/// Fails with [`PackError::MissingArtifact`] unless `path` exists.
pub(crate) fn require_exists(stage: Stage, path: &Path) -> Result<(), PackError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PackError::MissingArtifact {
            stage,
            path: path.to_path_buf(),
        })
    }
}

/// Empties the stage's work dir and returns it.
pub(crate) fn fresh_work_dir(work_dir: &Path) -> Result<PathBuf, PackError> {
    fs_ops::reset_dir(work_dir)
        .map_err(|e| PackError::fs("failed to prepare work directory", work_dir, e))?;
    Ok(work_dir.to_path_buf())
}

/// Creates an empty staging tree inside the work dir.
pub(crate) fn staging_dir(work_dir: &Path) -> Result<PathBuf, PackError> {
    let staging = work_dir.join(STAGING_DIR);
    fs_ops::reset_dir(&staging)
        .map_err(|e| PackError::fs("failed to prepare staging directory", &staging, e))?;
    Ok(staging)
}

/// Copies a bundle directory or a single file to `dest`.
pub(crate) fn copy_artifact(src: &Path, dest: &Path) -> Result<(), PackError> {
    let result = if src.is_dir() {
        fs_ops::copy_dir_recursive(src, dest)
    } else {
        dest.parent()
            .map(fs::create_dir_all)
            .transpose()
            .and_then(|_| fs::copy(src, dest).map(|_| ()))
    };
    result.map_err(|e| PackError::fs(format!("failed to copy to {}", dest.display()), src, e))
}

/// Writes the provenance record into `bundle`.
pub(crate) fn stamp(
    settings: &PipelineSettings,
    bundle: &Path,
    stage: Stage,
    build_type: BuildType,
) -> Result<(), PackError> {
    let record = Provenance::new(
        &settings.upstream_version,
        &settings.package_version,
        stage,
        build_type,
    )?;
    let path = record.write_to(bundle)?;
    tracing::debug!(path = %path.display(), "stamped provenance");
    Ok(())
}

/// Swaps the finished staging tree into the canonical stage directory.
pub(crate) fn place(staging: &Path, canonical: &Path) -> Result<(), PackError> {
    fs_ops::replace_tree(staging, canonical)
        .map_err(|e| PackError::fs("failed to place stage outputs", canonical, e))?;
    tracing::info!(dir = %canonical.display(), "outputs placed");
    Ok(())
}

/// Renders a path as a tool argument.
pub(crate) fn arg(path: &Path) -> String {
    path.display().to_string()
}
