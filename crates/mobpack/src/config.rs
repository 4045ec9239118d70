//! Configuration file support for mobpack.
//!
//! Project settings live in `mobpack.toml` so the build can be re-run with no
//! flags beyond the stage selection.
//!
//! ## Configuration File Location
//!
//! The file given with `--config` is used if present. Otherwise it is searched
//! for in the current directory and then in each parent, stopping at the
//! repository root (a directory containing `.git`) or the filesystem root.
//!
//! Relative paths in the file are resolved against the directory holding it.
//!
//! ## Precedence
//!
//! CLI flags, then `MOBPACK_*` environment variables (which may come from
//! `.env`), then `mobpack.toml`, then built-in defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! upstream_version = "M120"
//! package_version = "2.3.0"
//!
//! [media_engine]
//! source_dir = "media-engine"
//! framework_name = "WebRTC"
//!
//! [core_library]
//! crate_dir = "core"
//! crate = "sdk-core"
//! targets = ["aarch64-apple-ios", "x86_64-apple-ios"]
//!
//! [app_platform]
//! project_dir = "platform"
//! workspace = "Sdk.xcworkspace"
//! scheme = "Sdk"
//! ```

use anyhow::{Context, Result, bail};
use mobpack_core::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "mobpack.toml";

pub const ENV_UPSTREAM_VERSION: &str = "MOBPACK_UPSTREAM_VERSION";
pub const ENV_PACKAGE_VERSION: &str = "MOBPACK_PACKAGE_VERSION";
pub const ENV_OUTPUT_DIR: &str = "MOBPACK_OUTPUT_DIR";

/// Root structure of `mobpack.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MobpackConfig {
    pub project: ProjectConfig,
    pub media_engine: MediaEngineConfig,
    pub core_library: CoreLibraryConfig,
    pub app_platform: AppPlatformConfig,
    pub tools: ToolsConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Output root for every stage. Defaults to `output/`.
    pub output_dir: Option<PathBuf>,

    /// Upstream media-engine version stamped into each bundle.
    pub upstream_version: Option<String>,

    /// Package version stamped into each bundle.
    pub package_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaEngineConfig {
    pub source_dir: Option<PathBuf>,
    pub framework_name: Option<String>,
    /// Where the build system puts its bundles, relative to its output dir.
    pub product_subdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreLibraryConfig {
    pub crate_dir: Option<PathBuf>,

    /// Package name of the core crate (e.g., "sdk-core").
    #[serde(rename = "crate")]
    pub crate_name: Option<String>,

    /// Library name. Derived from the crate name when unset.
    pub library_name: Option<String>,

    pub targets: Option<Vec<String>>,
    pub target_dir: Option<PathBuf>,
    pub header_config: Option<PathBuf>,
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPlatformConfig {
    pub project_dir: Option<PathBuf>,
    pub workspace: Option<String>,
    pub scheme: Option<String>,
    pub framework_name: Option<String>,
    pub device_arch: Option<String>,
    pub simulator_arch: Option<String>,
}

/// Programs backing each external tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub media_engine: Option<PathBuf>,
    pub cross_compiler: Option<PathBuf>,
    pub header_generator: Option<PathBuf>,
    pub dependency_manager: Option<PathBuf>,
    pub platform_build: Option<PathBuf>,
}

impl MobpackConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: MobpackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Searches for `mobpack.toml` from `start_dir` upward.
    ///
    /// Returns `Ok(None)` when no file is found, and an error when one is
    /// found but cannot be parsed.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Returns the library name, either from config or derived from crate name.
    pub fn library_name(&self) -> Option<String> {
        self.core_library.library_name.clone().or_else(|| {
            self.core_library
                .crate_name
                .as_ref()
                .map(|c| c.replace('-', "_"))
        })
    }

    /// Generates a commented starter `mobpack.toml`.
    pub fn generate_starter_toml(crate_name: &str) -> String {
        let library_name = crate_name.replace('-', "_");

        format!(
            r#"# mobpack configuration file
# CLI flags and MOBPACK_* environment variables override these settings.

[project]
# Versions stamped into every bundle's provenance.json (required)
upstream_version = "0.0.0"
package_version = "0.1.0"

# Output root for all stages (default: output)
# output_dir = "output"

[media_engine]
# Working directory of the media-engine build system
source_dir = "media-engine"
framework_name = "WebRTC"

# Location of the produced bundles inside the build's output directory
# product_subdir = "ios"

[core_library]
crate_dir = "core"
crate = "{crate_name}"
library_name = "{library_name}"
targets = ["aarch64-apple-ios", "x86_64-apple-ios"]

# Header generator configuration and output name
header_config = "core/cbindgen.toml"
header_name = "{library_name}_ffi.h"

[app_platform]
project_dir = "platform"
workspace = "Sdk.xcworkspace"
scheme = "Sdk"
framework_name = "Sdk"
device_arch = "arm64"
simulator_arch = "x86_64"

[tools]
# media_engine = "media-engine/build.sh"
# cross_compiler = "cargo"
# header_generator = "cbindgen"
# dependency_manager = "pod"
# platform_build = "xcodebuild"
"#,
        )
    }

    /// Writes the starter file to `path`, refusing to replace an existing one.
    pub fn write_starter(path: &Path, crate_name: &str) -> Result<()> {
        if path.exists() {
            bail!("{:?} already exists; remove it first to regenerate", path);
        }
        std::fs::write(path, Self::generate_starter_toml(crate_name))
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }
}

/// Overrides read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub upstream_version: Option<String>,
    pub package_version: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl EnvOverrides {
    /// Reads the `MOBPACK_*` variables. Empty values count as unset.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            upstream_version: var(ENV_UPSTREAM_VERSION),
            package_version: var(ENV_PACKAGE_VERSION),
            output_dir: var(ENV_OUTPUT_DIR).map(PathBuf::from),
        }
    }
}

/// Merges the config file, environment and CLI into [`PipelineSettings`].
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<MobpackConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers a config from `cwd`.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let config = MobpackConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }
        match MobpackConfig::discover_from(cwd)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Directory relative paths are resolved against: the config file's
    /// directory, or `cwd` without a config file.
    pub fn project_root(&self, cwd: &Path) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| cwd.join(p))
            .unwrap_or_else(|| cwd.to_path_buf())
    }

    /// Builds the settings for one run.
    pub fn settings(
        &self,
        cwd: &Path,
        env: &EnvOverrides,
        cli_output_dir: Option<&Path>,
    ) -> Result<PipelineSettings> {
        let root = self.project_root(cwd);
        let mut settings = PipelineSettings::new(&root);
        let at_root = |p: &Path| root.join(p);

        if let Some(config) = &self.config {
            let project = &config.project;
            if let Some(dir) = &project.output_dir {
                settings.output_root = at_root(dir);
            }
            if let Some(v) = &project.upstream_version {
                settings.upstream_version = v.clone();
            }
            if let Some(v) = &project.package_version {
                settings.package_version = v.clone();
            }

            let media = &config.media_engine;
            let m = &mut settings.media_engine;
            if let Some(dir) = &media.source_dir {
                m.source_dir = at_root(dir);
            }
            if let Some(name) = &media.framework_name {
                m.framework_name = name.clone();
            }
            if let Some(sub) = &media.product_subdir {
                m.product_subdir = sub.clone();
            }

            let core = &config.core_library;
            let c = &mut settings.core_library;
            if let Some(dir) = &core.crate_dir {
                c.crate_dir = at_root(dir);
                c.header_config = c.crate_dir.join("cbindgen.toml");
            }
            if let Some(name) = &core.crate_name {
                c.crate_name = name.clone();
            }
            if let Some(name) = config.library_name() {
                c.library_name = name;
            }
            if let Some(targets) = &core.targets {
                c.targets = targets.clone();
            }
            if let Some(dir) = &core.target_dir {
                c.target_dir = Some(at_root(dir));
            }
            if let Some(file) = &core.header_config {
                c.header_config = at_root(file);
            }
            if let Some(name) = &core.header_name {
                c.header_name = name.clone();
            }

            let app = &config.app_platform;
            let a = &mut settings.app_platform;
            if let Some(dir) = &app.project_dir {
                a.project_dir = at_root(dir);
            }
            for (value, field) in [
                (&app.workspace, &mut a.workspace),
                (&app.scheme, &mut a.scheme),
                (&app.framework_name, &mut a.framework_name),
                (&app.device_arch, &mut a.device_arch),
                (&app.simulator_arch, &mut a.simulator_arch),
            ] {
                if let Some(v) = value {
                    *field = v.clone();
                }
            }

            let tools = &config.tools;
            let t = &mut settings.tools;
            if let Some(p) = &tools.media_engine {
                t.media_engine = resolve_program(&root, p);
            }
            if let Some(p) = &tools.cross_compiler {
                t.cross_compiler = resolve_program(&root, p);
            }
            if let Some(p) = &tools.header_generator {
                t.header_generator = resolve_program(&root, p);
            }
            if let Some(p) = &tools.dependency_manager {
                t.dependency_manager = resolve_program(&root, p);
            }
            if let Some(p) = &tools.platform_build {
                t.platform_build = resolve_program(&root, p);
            }
        }

        if let Some(v) = &env.upstream_version {
            settings.upstream_version = v.clone();
        }
        if let Some(v) = &env.package_version {
            settings.package_version = v.clone();
        }
        if let Some(dir) = &env.output_dir {
            settings.output_root = cwd.join(dir);
        }
        if let Some(dir) = cli_output_dir {
            settings.output_root = cwd.join(dir);
        }

        Ok(settings)
    }
}

/// Bare program names stay PATH lookups; anything with a separator is a path.
fn resolve_program(root: &Path, program: &Path) -> PathBuf {
    if program.components().count() > 1 {
        root.join(program)
    } else {
        program.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("mobpack.toml");

        let toml_content = r#"
[project]
upstream_version = "M120"
package_version = "2.3.0"

[core_library]
crate = "sdk-core"
targets = ["aarch64-apple-ios"]

[app_platform]
scheme = "Client"
"#;
        std::fs::write(&config_path, toml_content).unwrap();

        let config = MobpackConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.project.upstream_version.as_deref(), Some("M120"));
        assert_eq!(config.core_library.crate_name.as_deref(), Some("sdk-core"));
        assert_eq!(config.library_name().as_deref(), Some("sdk_core"));
        assert_eq!(config.app_platform.scheme.as_deref(), Some("Client"));
        assert!(config.media_engine.source_dir.is_none());
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[project]\npackage_version = \"1.0\"\n").unwrap();
        let nested = temp_dir.path().join("platform/Sources");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = MobpackConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(path, config_path);
        assert_eq!(config.project.package_version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_discover_no_config() {
        let temp_dir = TempDir::new().unwrap();
        // Create a .git directory to stop the search
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let result = MobpackConfig::discover_from(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[project\n").unwrap();
        assert!(MobpackConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_settings_resolve_relative_to_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[project]
upstream_version = "M120"
package_version = "2.3.0"
output_dir = "dist"

[core_library]
crate_dir = "rust/core"

[tools]
media_engine = "scripts/build-media.sh"
platform_build = "xcodebuild"
"#,
        )
        .unwrap();

        let resolver = ConfigResolver::load(Some(path.as_path()), Path::new("/elsewhere")).unwrap();
        let settings = resolver
            .settings(Path::new("/elsewhere"), &EnvOverrides::default(), None)
            .unwrap();

        let root = temp_dir.path();
        assert_eq!(settings.output_root, root.join("dist"));
        assert_eq!(settings.core_library.crate_dir, root.join("rust/core"));
        assert_eq!(
            settings.core_library.header_config,
            root.join("rust/core/cbindgen.toml")
        );
        assert_eq!(settings.tools.media_engine, root.join("scripts/build-media.sh"));
        assert_eq!(settings.tools.platform_build, PathBuf::from("xcodebuild"));
        assert_eq!(settings.upstream_version, "M120");
    }

    #[test]
    fn test_env_and_cli_take_precedence() {
        let resolver = ConfigResolver {
            config: Some(MobpackConfig {
                project: ProjectConfig {
                    output_dir: Some(PathBuf::from("from-config")),
                    upstream_version: Some("M100".to_string()),
                    package_version: Some("1.0.0".to_string()),
                },
                ..Default::default()
            }),
            config_path: Some(PathBuf::from("/repo/mobpack.toml")),
        };
        let env = EnvOverrides {
            upstream_version: Some("M120".to_string()),
            package_version: None,
            output_dir: Some(PathBuf::from("from-env")),
        };

        let settings = resolver.settings(Path::new("/cwd"), &env, None).unwrap();
        assert_eq!(settings.upstream_version, "M120");
        assert_eq!(settings.package_version, "1.0.0");
        assert_eq!(settings.output_root, PathBuf::from("/cwd/from-env"));

        let settings = resolver
            .settings(Path::new("/cwd"), &env, Some(Path::new("/abs/out")))
            .unwrap();
        assert_eq!(settings.output_root, PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let resolver = ConfigResolver::default();
        let settings = resolver
            .settings(Path::new("/repo"), &EnvOverrides::default(), None)
            .unwrap();
        assert_eq!(settings.output_root, PathBuf::from("/repo/output"));
        assert!(settings.package_version.is_empty());
    }

    #[test]
    fn test_starter_toml_parses() {
        let toml = MobpackConfig::generate_starter_toml("sdk-core");
        assert!(toml.contains("crate = \"sdk-core\""));
        assert!(toml.contains("library_name = \"sdk_core\""));

        let config: MobpackConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.project.package_version.as_deref(), Some("0.1.0"));
        assert_eq!(config.app_platform.device_arch.as_deref(), Some("arm64"));
    }

    #[test]
    fn test_write_starter_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        MobpackConfig::write_starter(&path, "core").unwrap();
        assert!(MobpackConfig::write_starter(&path, "core").is_err());
    }
}
