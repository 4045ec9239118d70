//! Environment checks run before any stage.
//!
//! Every problem is collected so the user sees the full list in one run
//! rather than fixing prerequisites one at a time.

use std::path::Path;

use crate::settings::PipelineSettings;
use crate::tools::{Collaborator, Toolchain};
use crate::types::{PackError, Stage};

/// Verifies versions, tools and source locations needed by `stages`.
pub fn check(
    settings: &PipelineSettings,
    toolchain: &Toolchain,
    stages: &[Stage],
) -> Result<(), PackError> {
    let mut problems = Vec::new();

    if settings.upstream_version.trim().is_empty() {
        problems.push(
            "upstream version is not set (set [project].upstream_version or MOBPACK_UPSTREAM_VERSION)"
                .to_string(),
        );
    }
    if settings.package_version.trim().is_empty() {
        problems.push(
            "package version is not set (set [project].package_version or MOBPACK_PACKAGE_VERSION)"
                .to_string(),
        );
    }

    for stage in stages {
        match stage {
            Stage::MediaEngine => {
                require_dir(&mut problems, "media-engine source", &settings.media_engine.source_dir);
                require_tool(&mut problems, "media-engine build", toolchain.media_engine.as_ref());
            }
            Stage::CoreLibrary => {
                let core = &settings.core_library;
                require_dir(&mut problems, "core library crate", &core.crate_dir);
                if !core.header_config.is_file() {
                    problems.push(format!(
                        "header generator config not found at {}",
                        core.header_config.display()
                    ));
                }
                if core.targets.is_empty() {
                    problems.push("no cross-compilation targets configured".to_string());
                }
                require_tool(&mut problems, "cross-compiler", toolchain.cross_compiler.as_ref());
                require_tool(&mut problems, "header generator", toolchain.header_generator.as_ref());
            }
            Stage::AppPlatform => {
                require_dir(&mut problems, "app-platform project", &settings.app_platform.project_dir);
                require_tool(&mut problems, "dependency manager", toolchain.dependency_manager.as_ref());
                require_tool(&mut problems, "platform build tool", toolchain.platform_build.as_ref());
            }
        }
    }

    if problems.is_empty() {
        tracing::debug!(stages = stages.len(), "preflight passed");
        Ok(())
    } else {
        Err(PackError::Environment(problems.join("; ")))
    }
}

fn require_dir(problems: &mut Vec<String>, what: &str, path: &Path) {
    if !path.is_dir() {
        problems.push(format!("{what} directory not found at {}", path.display()));
    }
}

fn require_tool(problems: &mut Vec<String>, what: &str, tool: &dyn Collaborator) {
    if !tool.is_available() {
        problems.push(format!("{what} is not available"));
    }
}
