use crate::layout::{dsym_dir_name, framework_dir_name};
use crate::tools::Invocation;
use crate::types::{BuildType, PackError, Stage, StageOutput};

use super::common::{arg, copy_artifact, fresh_work_dir, place, require_exists, run_step, stamp, staging_dir};
use super::{StageBuilder, StageContext};

/// Builds the media-engine framework with its own native build system and
/// relocates the framework and debug-symbol bundles.
pub struct MediaEngineBuilder<'a> {
    ctx: StageContext<'a>,
}

impl<'a> MediaEngineBuilder<'a> {
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self { ctx }
    }
}

impl StageBuilder for MediaEngineBuilder<'_> {
    fn stage(&self) -> Stage {
        Stage::MediaEngine
    }

    fn build(&self, build_type: BuildType) -> Result<StageOutput, PackError> {
        let stage = self.stage();
        let media = &self.ctx.settings.media_engine;
        let layout = self.ctx.layout;

        let work = fresh_work_dir(&layout.work_dir(build_type, stage))?;
        let out_dir = work.join("out");

        let invocation = Invocation::new([
            "--output-dir".to_string(),
            arg(&out_dir),
            "--build-config".to_string(),
            build_type.as_str().to_string(),
        ])
        .current_dir(&media.source_dir);
        run_step(
            self.ctx.toolchain.media_engine.as_ref(),
            &invocation,
            stage,
            "media-engine build",
        )?;

        let products = out_dir.join(&media.product_subdir);
        let framework = products.join(framework_dir_name(&media.framework_name));
        let dsym = products.join(dsym_dir_name(&media.framework_name));
        require_exists(stage, &framework)?;
        require_exists(stage, &dsym)?;

        let staging = staging_dir(&work)?;
        let staged_framework = staging.join(framework_dir_name(&media.framework_name));
        copy_artifact(&framework, &staged_framework)?;
        copy_artifact(&dsym, &staging.join(dsym_dir_name(&media.framework_name)))?;
        stamp(self.ctx.settings, &staged_framework, stage, build_type)?;

        place(&staging, &layout.stage_dir(build_type, stage))?;

        Ok(StageOutput {
            stage,
            artifacts: layout.stage_artifacts(build_type, stage),
        })
    }
}
