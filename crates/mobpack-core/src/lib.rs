//! Build pipeline coordinator for a layered mobile SDK package.
//!
//! `mobpack-core` assembles a distributable package from three separately
//! built components:
//!
//! 1. **media-engine** - a framework produced by its own native build system
//! 2. **core-library** - a static library cross-compiled per architecture and
//!    merged into one universal binary, plus a generated binding header and
//!    module map
//! 3. **app-platform** - the consumer-facing framework, built per environment
//!    against the two above and merged into one universal bundle
//!
//! The external tools are opaque [`Collaborator`]s; this crate sequences them,
//! places their outputs under a fixed [`ArtifactLayout`], merges architecture
//! slices and stamps provenance.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use mobpack_core::{BuildConfiguration, BuildType, Pipeline, PipelineSettings, StageSelector, Toolchain};
//!
//! fn main() -> Result<(), mobpack_core::PackError> {
//!     let mut settings = PipelineSettings::new(Path::new("."));
//!     settings.upstream_version = "M120".into();
//!     settings.package_version = "2.3.0".into();
//!
//!     let toolchain = Toolchain::system(&settings.tools, false);
//!     let pipeline = Pipeline::new(&settings, &toolchain);
//!
//!     let report = pipeline.run(&BuildConfiguration {
//!         stage_selector: StageSelector::All,
//!         build_type: BuildType::Release,
//!     })?;
//!     println!("built {} stage(s)", report.stages.len());
//!     Ok(())
//! }
//! ```

pub mod fs_ops;
pub mod header;
pub mod layout;
pub mod merge;
pub mod modulemap;
pub mod pipeline;
pub mod preflight;
pub mod provenance;
pub mod settings;
pub mod stages;
pub mod tools;
pub mod types;

pub use header::{HeaderArtifact, HeaderError, HeaderGenerator, HeaderRequest};
pub use layout::ArtifactLayout;
pub use merge::{Arch, ArchitectureSlice, MergeError};
pub use pipeline::Pipeline;
pub use provenance::Provenance;
pub use settings::{
    AppPlatformSettings, CoreLibrarySettings, MediaEngineSettings, PipelineSettings, ToolSettings,
};
pub use tools::{Collaborator, Invocation, ProcessCollaborator, Toolchain, ToolStatus};
pub use types::{
    BuildConfiguration, BuildType, CleanReport, PackError, PipelineReport, Stage, StageOutput,
    StageSelector,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
