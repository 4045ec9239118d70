//! Explicit pipeline settings.
//!
//! [`PipelineSettings`] is built once at startup (by the CLI, from
//! `mobpack.toml`, environment overrides and flags) and passed by reference to
//! every component. Nothing below this module reads process-global state.

use std::path::{Path, PathBuf};

/// Everything the coordinator needs to know about the workspace.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root under which every canonical output and work dir lives.
    pub output_root: PathBuf,
    /// Version of the upstream media engine, stamped into every bundle.
    pub upstream_version: String,
    /// Version of the assembled package, stamped into every bundle.
    pub package_version: String,
    pub media_engine: MediaEngineSettings,
    pub core_library: CoreLibrarySettings,
    pub app_platform: AppPlatformSettings,
    pub tools: ToolSettings,
}

impl PipelineSettings {
    /// Creates settings with conventional locations relative to `project_root`.
    ///
    /// Versions start empty; preflight rejects a run until they are set.
    pub fn new(project_root: &Path) -> Self {
        Self {
            output_root: project_root.join("output"),
            upstream_version: String::new(),
            package_version: String::new(),
            media_engine: MediaEngineSettings::new(project_root),
            core_library: CoreLibrarySettings::new(project_root),
            app_platform: AppPlatformSettings::new(project_root),
            tools: ToolSettings::new(project_root),
        }
    }
}

/// Media-engine stage settings.
#[derive(Debug, Clone)]
pub struct MediaEngineSettings {
    /// Working directory of the media-engine build system.
    pub source_dir: PathBuf,
    /// Bundle name, without the `.framework` extension.
    pub framework_name: String,
    /// Path of the produced bundles relative to the build's output directory.
    pub product_subdir: PathBuf,
}

impl MediaEngineSettings {
    fn new(project_root: &Path) -> Self {
        Self {
            source_dir: project_root.join("media-engine"),
            framework_name: "WebRTC".to_string(),
            product_subdir: PathBuf::new(),
        }
    }
}

/// Core-library stage settings.
#[derive(Debug, Clone)]
pub struct CoreLibrarySettings {
    /// Crate directory; the header generator's interface source root.
    pub crate_dir: PathBuf,
    /// Package name passed to the header generator.
    pub crate_name: String,
    /// Library name; slices are `lib<library_name>.a` and the module map links it.
    pub library_name: String,
    /// Cross-compilation targets, one slice each.
    pub targets: Vec<String>,
    /// Cross-compiler output root. Defaults to `<crate_dir>/target`.
    pub target_dir: Option<PathBuf>,
    /// Fixed header generator configuration file.
    pub header_config: PathBuf,
    /// File name of the generated binding header.
    pub header_name: String,
}

impl CoreLibrarySettings {
    fn new(project_root: &Path) -> Self {
        let crate_dir = project_root.join("core");
        Self {
            header_config: crate_dir.join("cbindgen.toml"),
            crate_dir,
            crate_name: "core".to_string(),
            library_name: "core".to_string(),
            targets: vec![
                "aarch64-apple-ios".to_string(),
                "x86_64-apple-ios".to_string(),
            ],
            target_dir: None,
            header_name: "core_ffi.h".to_string(),
        }
    }

    /// Returns the cross-compiler's output root.
    pub fn target_dir(&self) -> PathBuf {
        self.target_dir
            .clone()
            .unwrap_or_else(|| self.crate_dir.join("target"))
    }

    /// Returns the file name of one static-library slice.
    pub fn static_library_file(&self) -> String {
        format!("lib{}.a", self.library_name)
    }
}

/// Application-platform stage settings.
#[derive(Debug, Clone)]
pub struct AppPlatformSettings {
    /// Directory holding the workspace and the dependency manifest.
    pub project_dir: PathBuf,
    /// Workspace file name, e.g. `Sdk.xcworkspace`.
    pub workspace: String,
    pub scheme: String,
    /// Bundle name, without the `.framework` extension.
    pub framework_name: String,
    /// Architecture built for the on-device environment.
    pub device_arch: String,
    /// Architecture built for the simulator environment.
    pub simulator_arch: String,
}

impl AppPlatformSettings {
    fn new(project_root: &Path) -> Self {
        Self {
            project_dir: project_root.join("platform"),
            workspace: "Sdk.xcworkspace".to_string(),
            scheme: "Sdk".to_string(),
            framework_name: "Sdk".to_string(),
            device_arch: "arm64".to_string(),
            simulator_arch: "x86_64".to_string(),
        }
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.project_dir.join(&self.workspace)
    }
}

/// Programs backing each collaborator.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub media_engine: PathBuf,
    pub cross_compiler: PathBuf,
    pub header_generator: PathBuf,
    pub dependency_manager: PathBuf,
    pub platform_build: PathBuf,
}

impl ToolSettings {
    fn new(project_root: &Path) -> Self {
        Self {
            media_engine: project_root.join("media-engine/build.sh"),
            cross_compiler: PathBuf::from("cargo"),
            header_generator: PathBuf::from("cbindgen"),
            dependency_manager: PathBuf::from("pod"),
            platform_build: PathBuf::from("xcodebuild"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_rooted_in_project() {
        let root = Path::new("/work/sdk");
        let settings = PipelineSettings::new(root);
        assert_eq!(settings.output_root, root.join("output"));
        assert_eq!(settings.core_library.target_dir(), root.join("core/target"));
        assert_eq!(settings.core_library.static_library_file(), "libcore.a");
        assert_eq!(
            settings.app_platform.workspace_path(),
            root.join("platform/Sdk.xcworkspace")
        );
        assert!(settings.upstream_version.is_empty());
    }

    #[test]
    fn explicit_target_dir_wins() {
        let mut settings = CoreLibrarySettings::new(Path::new("/p"));
        settings.target_dir = Some(PathBuf::from("/shared/target"));
        assert_eq!(settings.target_dir(), PathBuf::from("/shared/target"));
    }
}
