//! Canonical output paths.
//!
//! ```text
//! <output_root>/
//! ├── debug/                         # one subtree per build type, never shared
//! │   ├── media-engine/<Media>.framework, <Media>.framework.dSYM
//! │   ├── core-library/lib<core>.a, <header>.h, module.modulemap
//! │   └── app-platform/<App>.framework, <App>.framework.dSYM
//! ├── release/ …
//! └── .work/<build type>/<stage>/    # staging and tool roots
//! ```

use std::path::{Path, PathBuf};

use crate::settings::PipelineSettings;
use crate::types::{BuildType, Stage};

/// File name of the module descriptor.
pub const MODULE_MAP_FILE: &str = "module.modulemap";
/// File name of the provenance record inside each bundle.
pub const PROVENANCE_FILE: &str = "provenance.json";

const WORK_DIR: &str = ".work";

/// Resolves every path the pipeline reads or writes under the output root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    output_root: PathBuf,
    media_framework: String,
    app_framework: String,
    static_library: String,
    header_name: String,
}

impl ArtifactLayout {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            output_root: settings.output_root.clone(),
            media_framework: settings.media_engine.framework_name.clone(),
            app_framework: settings.app_platform.framework_name.clone(),
            static_library: settings.core_library.static_library_file(),
            header_name: settings.core_library.header_name.clone(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Root of one build type's canonical outputs.
    pub fn build_root(&self, build_type: BuildType) -> PathBuf {
        self.output_root.join(build_type.as_str())
    }

    /// Canonical directory of one stage's outputs.
    pub fn stage_dir(&self, build_type: BuildType, stage: Stage) -> PathBuf {
        self.build_root(build_type).join(stage.as_str())
    }

    pub fn media_framework(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::MediaEngine)
            .join(framework_dir_name(&self.media_framework))
    }

    pub fn media_dsym(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::MediaEngine)
            .join(dsym_dir_name(&self.media_framework))
    }

    pub fn static_library(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::CoreLibrary)
            .join(&self.static_library)
    }

    pub fn header(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::CoreLibrary)
            .join(&self.header_name)
    }

    pub fn module_map(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::CoreLibrary)
            .join(MODULE_MAP_FILE)
    }

    pub fn app_framework(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::AppPlatform)
            .join(framework_dir_name(&self.app_framework))
    }

    pub fn app_dsym(&self, build_type: BuildType) -> PathBuf {
        self.stage_dir(build_type, Stage::AppPlatform)
            .join(dsym_dir_name(&self.app_framework))
    }

    /// Parent of every work directory.
    pub fn work_base(&self) -> PathBuf {
        self.output_root.join(WORK_DIR)
    }

    /// Root of one build type's staging and tool directories.
    pub fn work_root(&self, build_type: BuildType) -> PathBuf {
        self.work_base().join(build_type.as_str())
    }

    /// Scratch directory owned by one stage for one build type.
    pub fn work_dir(&self, build_type: BuildType, stage: Stage) -> PathBuf {
        self.work_root(build_type).join(stage.as_str())
    }

    /// Every canonical artifact a stage produces, in placement order.
    pub fn stage_artifacts(&self, build_type: BuildType, stage: Stage) -> Vec<PathBuf> {
        match stage {
            Stage::MediaEngine => vec![self.media_framework(build_type), self.media_dsym(build_type)],
            Stage::CoreLibrary => vec![
                self.static_library(build_type),
                self.header(build_type),
                self.module_map(build_type),
            ],
            Stage::AppPlatform => vec![self.app_framework(build_type), self.app_dsym(build_type)],
        }
    }

    /// Every directory clean removes, for both build types.
    pub fn all_output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for build_type in BuildType::ALL {
            for stage in Stage::ORDER {
                dirs.push(self.stage_dir(build_type, stage));
            }
            dirs.push(self.work_root(build_type));
        }
        dirs
    }
}

/// `<name>.framework`
pub fn framework_dir_name(name: &str) -> String {
    format!("{name}.framework")
}

/// `<name>.framework.dSYM`
pub fn dsym_dir_name(name: &str) -> String {
    format!("{name}.framework.dSYM")
}

/// Path of the binary inside a framework bundle.
pub fn framework_binary(framework: &Path, name: &str) -> PathBuf {
    framework.join(name)
}

/// Path of the DWARF binary inside a debug-symbol bundle.
pub fn dsym_binary(dsym: &Path, name: &str) -> PathBuf {
    dsym.join("Contents/Resources/DWARF").join(name)
}

/// Path of the per-architecture module interface directory inside a bundle.
pub fn swiftmodule_dir(framework: &Path, name: &str) -> PathBuf {
    framework.join("Modules").join(format!("{name}.swiftmodule"))
}
