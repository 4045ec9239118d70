use std::path::{Path, PathBuf};

use crate::layout::{
    MODULE_MAP_FILE, dsym_binary, dsym_dir_name, framework_binary, framework_dir_name,
    swiftmodule_dir,
};
use crate::merge::{self, Arch, ArchitectureSlice};
use crate::modulemap;
use crate::tools::Invocation;
use crate::types::{BuildType, PackError, Stage, StageOutput};

use super::common::{
    arg, copy_artifact, fresh_work_dir, place, require_exists, run_step, stamp, staging_dir,
};
use super::{StageBuilder, StageContext};

/// A target environment the platform build tool is run for.
struct Environment<'s> {
    label: &'static str,
    sdk: &'static str,
    destination: &'static str,
    arch: &'s str,
}

/// Bundles one environment's build produced.
struct EnvironmentProduct {
    arch: Arch,
    framework: PathBuf,
    dsym: PathBuf,
}

/// Builds the consumer-facing framework once per environment, against the
/// media-engine and core-library outputs of the same build type, and merges the
/// per-environment bundles into one.
pub struct AppPlatformBuilder<'a> {
    ctx: StageContext<'a>,
}

impl<'a> AppPlatformBuilder<'a> {
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self { ctx }
    }

    fn environments(&self) -> [Environment<'a>; 2] {
        let app = &self.ctx.settings.app_platform;
        [
            Environment {
                label: "device",
                sdk: "iphoneos",
                destination: "generic/platform=iOS",
                arch: &app.device_arch,
            },
            Environment {
                label: "simulator",
                sdk: "iphonesimulator",
                destination: "generic/platform=iOS Simulator",
                arch: &app.simulator_arch,
            },
        ]
    }

    fn build_environment(
        &self,
        env: &Environment<'_>,
        build_type: BuildType,
        work: &Path,
    ) -> Result<EnvironmentProduct, PackError> {
        let stage = self.stage();
        let app = &self.ctx.settings.app_platform;
        let layout = self.ctx.layout;
        let arch = Arch::from_name(env.arch).ok_or_else(|| {
            PackError::Config(format!("unsupported {} architecture '{}'", env.label, env.arch))
        })?;

        let obj_root = work.join(env.label).join("obj");
        let sym_root = work.join(env.label).join("sym");
        let media_dir = layout.stage_dir(build_type, Stage::MediaEngine);
        let core_dir = layout.stage_dir(build_type, Stage::CoreLibrary);

        let invocation = Invocation::new([
            "-workspace".to_string(),
            arg(&app.workspace_path()),
            "-scheme".to_string(),
            app.scheme.clone(),
            "-configuration".to_string(),
            build_type.configuration().to_string(),
            "-sdk".to_string(),
            env.sdk.to_string(),
            "-destination".to_string(),
            env.destination.to_string(),
            format!("ARCHS={}", env.arch),
            "ONLY_ACTIVE_ARCH=NO".to_string(),
            "BUILD_LIBRARY_FOR_DISTRIBUTION=YES".to_string(),
            format!("OBJROOT={}", arg(&obj_root)),
            format!("SYMROOT={}", arg(&sym_root)),
            format!("FRAMEWORK_SEARCH_PATHS=$(inherited) {}", arg(&media_dir)),
            format!("LIBRARY_SEARCH_PATHS=$(inherited) {}", arg(&core_dir)),
            format!("HEADER_SEARCH_PATHS=$(inherited) {}", arg(&core_dir)),
            "build".to_string(),
        ])
        .current_dir(&app.project_dir);
        run_step(
            self.ctx.toolchain.platform_build.as_ref(),
            &invocation,
            stage,
            &format!("platform build ({})", env.label),
        )?;

        let products = sym_root.join(format!("{}-{}", build_type.configuration(), env.sdk));
        let framework = products.join(framework_dir_name(&app.framework_name));
        let dsym = products.join(dsym_dir_name(&app.framework_name));
        require_exists(stage, &framework)?;
        require_exists(stage, &dsym)?;

        Ok(EnvironmentProduct {
            arch,
            framework,
            dsym,
        })
    }
}

impl StageBuilder for AppPlatformBuilder<'_> {
    fn stage(&self) -> Stage {
        Stage::AppPlatform
    }

    fn build(&self, build_type: BuildType) -> Result<StageOutput, PackError> {
        let stage = self.stage();
        let settings = self.ctx.settings;
        let app = &settings.app_platform;
        let layout = self.ctx.layout;
        let name = app.framework_name.as_str();

        // Links against both earlier stages of the same build type.
        for prerequisite in [
            layout.media_framework(build_type),
            layout.static_library(build_type),
            layout.header(build_type),
        ] {
            require_exists(stage, &prerequisite)?;
        }

        let work = fresh_work_dir(&layout.work_dir(build_type, stage))?;

        run_step(
            self.ctx.toolchain.dependency_manager.as_ref(),
            &Invocation::new(["install"]).current_dir(&app.project_dir),
            stage,
            "dependency install",
        )?;

        let mut products = Vec::new();
        for env in self.environments() {
            products.push(self.build_environment(&env, build_type, &work)?);
        }

        let staging = staging_dir(&work)?;
        let framework = staging.join(framework_dir_name(name));
        let dsym = staging.join(dsym_dir_name(name));
        copy_artifact(&products[0].framework, &framework)?;
        copy_artifact(&products[0].dsym, &dsym)?;

        let binaries: Vec<ArchitectureSlice> = products
            .iter()
            .map(|p| {
                let slice = ArchitectureSlice::new(name, p.arch, framework_binary(&p.framework, name));
                let interfaces = swiftmodule_dir(&p.framework, name);
                if interfaces.is_dir() {
                    slice.with_interface_dir(interfaces)
                } else {
                    slice
                }
            })
            .collect();
        let symbols: Vec<ArchitectureSlice> = products
            .iter()
            .map(|p| ArchitectureSlice::new(name, p.arch, dsym_binary(&p.dsym, name)))
            .collect();

        tracing::info!(%stage, environments = products.len(), "merging framework slices");
        let merge_err = |source: merge::MergeError| PackError::Merge { stage, source };
        merge::merge(&binaries, &framework_binary(&framework, name)).map_err(merge_err)?;
        merge::merge_interfaces(&binaries, &swiftmodule_dir(&framework, name)).map_err(merge_err)?;
        merge::merge(&symbols, &dsym_binary(&dsym, name)).map_err(merge_err)?;

        let core = &settings.core_library;
        copy_artifact(
            &layout.header(build_type),
            &framework.join("Headers").join(&core.header_name),
        )?;
        let text = modulemap::compose(name, &core.header_name, &core.library_name);
        modulemap::write_module_map(&framework.join("Modules").join(MODULE_MAP_FILE), &text)?;

        stamp(settings, &framework, stage, build_type)?;
        place(&staging, &layout.stage_dir(build_type, stage))?;

        Ok(StageOutput {
            stage,
            artifacts: layout.stage_artifacts(build_type, stage),
        })
    }
}
