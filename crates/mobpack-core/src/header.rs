//! Binding header generation.
//!
//! The header generator is a black box; this module only finds the inputs,
//! passes the right flags and places the result. The tool writes into a
//! temporary file beside the destination which is renamed over the canonical
//! path once the tool succeeds, so a failed run never leaves a partial header.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::tools::{Collaborator, Invocation, ToolStatus};

/// Mode of the placed header; temp files are created owner-only.
#[cfg(unix)]
const HEADER_MODE: u32 = 0o644;

/// Errors from the header generation step.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("header generator config not found at {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("failed to start header generator: {0}")]
    Launch(#[source] io::Error),

    #[error("header generator failed ({0})")]
    ToolFailed(ToolStatus),

    #[error("header generator reported success but wrote no header")]
    EmptyOutput,

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Inputs for one generation run.
#[derive(Debug, Clone)]
pub struct HeaderRequest<'a> {
    /// Directory holding the library's exported interface.
    pub source_root: &'a Path,
    /// Fixed generator configuration file.
    pub config: &'a Path,
    /// Package name the generator resolves inside `source_root`.
    pub crate_name: &'a str,
    /// Canonical destination of the header.
    pub output: &'a Path,
}

/// A header placed at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderArtifact {
    pub path: PathBuf,
    /// File name, as referenced by the module descriptor.
    pub file_name: String,
}

/// Invokes the header generation tool.
pub struct HeaderGenerator<'a> {
    tool: &'a dyn Collaborator,
}

impl<'a> HeaderGenerator<'a> {
    pub fn new(tool: &'a dyn Collaborator) -> Self {
        Self { tool }
    }

    /// Runs the generator once and moves its output to `request.output`.
    pub fn generate(&self, request: &HeaderRequest<'_>) -> Result<HeaderArtifact, HeaderError> {
        if !request.config.is_file() {
            return Err(HeaderError::MissingConfig(request.config.to_path_buf()));
        }

        let parent = request
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| HeaderError::Io {
            path: parent.to_path_buf(),
            source,
        })?;

        // Dropping `temp` on any early return deletes it.
        let temp = tempfile::Builder::new()
            .prefix(".header")
            .suffix(".h")
            .tempfile_in(parent)
            .map_err(|source| HeaderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;

        let invocation = Invocation::new([
            "--config".to_string(),
            request.config.display().to_string(),
            "--crate".to_string(),
            request.crate_name.to_string(),
            "--output".to_string(),
            temp.path().display().to_string(),
            request.source_root.display().to_string(),
        ])
        .current_dir(request.source_root);

        tracing::debug!(output = %request.output.display(), "generating binding header");
        let status = self.tool.run(&invocation).map_err(HeaderError::Launch)?;
        if !status.is_success() {
            return Err(HeaderError::ToolFailed(status));
        }

        let len = fs::metadata(temp.path())
            .map_err(|source| HeaderError::Io {
                path: temp.path().to_path_buf(),
                source,
            })?
            .len();
        if len == 0 {
            return Err(HeaderError::EmptyOutput);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(HEADER_MODE)).map_err(
                |source| HeaderError::Io {
                    path: temp.path().to_path_buf(),
                    source,
                },
            )?;
        }

        temp.persist(request.output)
            .map_err(|e| HeaderError::Io {
                path: request.output.to_path_buf(),
                source: e.error,
            })?;

        let file_name = request
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(HeaderArtifact {
            path: request.output.to_path_buf(),
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes `body` to the `--output` path, then reports `code`.
    struct FakeGenerator {
        body: &'static str,
        code: i32,
        calls: RefCell<Vec<Invocation>>,
    }

    impl FakeGenerator {
        fn new(body: &'static str, code: i32) -> Self {
            Self {
                body,
                code,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Collaborator for FakeGenerator {
        fn run(&self, invocation: &Invocation) -> io::Result<ToolStatus> {
            self.calls.borrow_mut().push(invocation.clone());
            if let Some(out) = invocation.value_of("--output") {
                fs::write(out, self.body)?;
            }
            Ok(ToolStatus::from_code(self.code))
        }
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("core");
        fs::create_dir_all(&src).unwrap();
        let config = src.join("cbindgen.toml");
        fs::write(&config, "language = \"C\"\n").unwrap();
        (temp, src, config)
    }

    #[test]
    fn places_header_at_destination() {
        let (temp, src, config) = fixture();
        let output = temp.path().join("out/core_ffi.h");
        let tool = FakeGenerator::new("void core_init(void);\n", 0);

        let artifact = HeaderGenerator::new(&tool)
            .generate(&HeaderRequest {
                source_root: &src,
                config: &config,
                crate_name: "core",
                output: &output,
            })
            .unwrap();

        assert_eq!(artifact.file_name, "core_ffi.h");
        assert_eq!(fs::read_to_string(&output).unwrap(), "void core_init(void);\n");

        let calls = tool.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].value_of("--config"), Some(config.to_str().unwrap()));
        assert_eq!(calls[0].value_of("--crate"), Some("core"));
        assert_eq!(calls[0].args.last().map(String::as_str), src.to_str());
    }

    #[cfg(unix)]
    #[test]
    fn placed_header_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, src, config) = fixture();
        let output = temp.path().join("out/core_ffi.h");
        let tool = FakeGenerator::new("void core_init(void);\n", 0);

        HeaderGenerator::new(&tool)
            .generate(&HeaderRequest {
                source_root: &src,
                config: &config,
                crate_name: "core",
                output: &output,
            })
            .unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn failure_leaves_previous_header_untouched() {
        let (temp, src, config) = fixture();
        let output = temp.path().join("out/core_ffi.h");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, "previous").unwrap();
        let tool = FakeGenerator::new("partial", 1);

        let err = HeaderGenerator::new(&tool)
            .generate(&HeaderRequest {
                source_root: &src,
                config: &config,
                crate_name: "core",
                output: &output,
            })
            .unwrap_err();

        assert!(matches!(err, HeaderError::ToolFailed(_)));
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
        // Only the previous header remains; the temp file is gone.
        assert_eq!(fs::read_dir(output.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn empty_output_is_an_error() {
        let (temp, src, config) = fixture();
        let output = temp.path().join("core_ffi.h");
        let tool = FakeGenerator::new("", 0);

        let err = HeaderGenerator::new(&tool)
            .generate(&HeaderRequest {
                source_root: &src,
                config: &config,
                crate_name: "core",
                output: &output,
            })
            .unwrap_err();
        assert!(matches!(err, HeaderError::EmptyOutput));
        assert!(!output.exists());
    }

    #[test]
    fn missing_config_fails_before_running() {
        let (temp, src, _) = fixture();
        let tool = FakeGenerator::new("x", 0);
        let err = HeaderGenerator::new(&tool)
            .generate(&HeaderRequest {
                source_root: &src,
                config: &temp.path().join("nope.toml"),
                crate_name: "core",
                output: &temp.path().join("h.h"),
            })
            .unwrap_err();
        assert!(matches!(err, HeaderError::MissingConfig(_)));
        assert!(tool.calls.borrow().is_empty());
    }
}
