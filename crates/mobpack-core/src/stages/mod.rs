//! Stage builders.
//!
//! Each stage drives its external tools into a private work directory,
//! assembles a complete replacement for its canonical output directory in a
//! staging tree, and only then swaps the staging tree into place. A stage that
//! fails at any step leaves the previous canonical outputs untouched.
//!
//! | Builder | Stage | Output |
//! |---------|-------|--------|
//! | [`MediaEngineBuilder`] | media-engine | framework + dSYM from the native build system |
//! | [`CoreLibraryBuilder`] | core-library | universal static library, binding header, module map |
//! | [`AppPlatformBuilder`] | app-platform | universal framework + dSYM linking the two above |

mod app_platform;
mod common;
mod core_library;
mod media_engine;

pub use app_platform::AppPlatformBuilder;
pub use core_library::CoreLibraryBuilder;
pub use media_engine::MediaEngineBuilder;

use crate::layout::ArtifactLayout;
use crate::settings::PipelineSettings;
use crate::tools::Toolchain;
use crate::types::{BuildType, PackError, Stage, StageOutput};

/// One independently-buildable component.
pub trait StageBuilder {
    fn stage(&self) -> Stage;

    /// Runs the stage for `build_type` and places its outputs.
    fn build(&self, build_type: BuildType) -> Result<StageOutput, PackError>;
}

/// Shared, read-only inputs every builder needs.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub settings: &'a PipelineSettings,
    pub layout: &'a ArtifactLayout,
    pub toolchain: &'a Toolchain,
}

/// Creates the builder for `stage`.
pub fn builder_for<'a>(stage: Stage, ctx: StageContext<'a>) -> Box<dyn StageBuilder + 'a> {
    match stage {
        Stage::MediaEngine => Box::new(MediaEngineBuilder::new(ctx)),
        Stage::CoreLibrary => Box::new(CoreLibraryBuilder::new(ctx)),
        Stage::AppPlatform => Box::new(AppPlatformBuilder::new(ctx)),
    }
}
