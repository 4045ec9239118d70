use crate::header::{HeaderGenerator, HeaderRequest};
use crate::layout::MODULE_MAP_FILE;
use crate::merge::{self, Arch, ArchitectureSlice};
use crate::modulemap;
use crate::tools::Invocation;
use crate::types::{BuildType, PackError, Stage, StageOutput};

use super::common::{arg, fresh_work_dir, place, run_step, staging_dir};
use super::{StageBuilder, StageContext};

/// Cross-compiles the core library for every configured target, merges the
/// slices into one static library and generates the header and module map
/// that expose it.
pub struct CoreLibraryBuilder<'a> {
    ctx: StageContext<'a>,
}

impl<'a> CoreLibraryBuilder<'a> {
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self { ctx }
    }

    fn target_arches(&self) -> Result<Vec<(&str, Arch)>, PackError> {
        self.ctx
            .settings
            .core_library
            .targets
            .iter()
            .map(|triple| {
                Arch::from_target_triple(triple)
                    .map(|arch| (triple.as_str(), arch))
                    .ok_or_else(|| {
                        PackError::Config(format!("unsupported target triple '{triple}'"))
                    })
            })
            .collect()
    }
}

impl StageBuilder for CoreLibraryBuilder<'_> {
    fn stage(&self) -> Stage {
        Stage::CoreLibrary
    }

    fn build(&self, build_type: BuildType) -> Result<StageOutput, PackError> {
        let stage = self.stage();
        let core = &self.ctx.settings.core_library;
        let layout = self.ctx.layout;
        let targets = self.target_arches()?;

        let work = fresh_work_dir(&layout.work_dir(build_type, stage))?;

        let mut args = vec!["build".to_string(), "--lib".to_string()];
        for (triple, _) in &targets {
            args.push("--target".to_string());
            args.push(triple.to_string());
        }
        if let Some(target_dir) = &core.target_dir {
            args.push("--target-dir".to_string());
            args.push(arg(target_dir));
        }
        if build_type == BuildType::Release {
            args.push("--release".to_string());
        }
        let invocation = Invocation::new(args).current_dir(&core.crate_dir);
        run_step(
            self.ctx.toolchain.cross_compiler.as_ref(),
            &invocation,
            stage,
            "cross-compile",
        )?;

        let library = core.static_library_file();
        let target_dir = core.target_dir();
        let slices: Vec<ArchitectureSlice> = targets
            .iter()
            .map(|(triple, arch)| {
                ArchitectureSlice::new(
                    &library,
                    *arch,
                    target_dir.join(triple).join(build_type.as_str()).join(&library),
                )
            })
            .collect();

        let staging = staging_dir(&work)?;
        tracing::info!(%stage, slices = slices.len(), "merging static library slices");
        merge::merge(&slices, &staging.join(&library))
            .map_err(|source| PackError::Merge { stage, source })?;

        let header = HeaderGenerator::new(self.ctx.toolchain.header_generator.as_ref()).generate(
            &HeaderRequest {
                source_root: &core.crate_dir,
                config: &core.header_config,
                crate_name: &core.crate_name,
                output: &staging.join(&core.header_name),
            },
        )?;

        let text = modulemap::compose(
            &self.ctx.settings.app_platform.framework_name,
            &header.file_name,
            &core.library_name,
        );
        modulemap::write_module_map(&staging.join(MODULE_MAP_FILE), &text)?;

        place(&staging, &layout.stage_dir(build_type, stage))?;

        Ok(StageOutput {
            stage,
            artifacts: layout.stage_artifacts(build_type, stage),
        })
    }
}
