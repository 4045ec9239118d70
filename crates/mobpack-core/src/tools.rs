//! External build tools, modelled as black-box collaborators.
//!
//! Every tool the pipeline drives (the media-engine build system, the
//! cross-compiler, the header generator, the dependency manager and the
//! application-platform build tool) sits behind the one-method
//! [`Collaborator`] trait. [`ProcessCollaborator`] spawns the real program;
//! tests substitute fakes that record invocations and fabricate products.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::settings::ToolSettings;

/// Number of trailing stderr lines kept when a captured command fails.
const STDERR_TAIL_LINES: usize = 20;

/// Arguments, working directory and extra environment for one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    /// Creates an invocation from an argument list.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Returns the value following `flag`, e.g. `value_of("--output")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Returns every value following each occurrence of `flag`.
    pub fn values_of(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    /// Returns the value of a `KEY=value` argument.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            arg.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Outcome of a tool run.
///
/// `code` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub code: Option<i32>,
    /// Trailing stderr, when output was captured.
    pub detail: Option<String>,
}

impl ToolStatus {
    /// A successful run.
    pub fn success() -> Self {
        Self::from_code(0)
    }

    /// A run that exited with `code`.
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            detail: None,
        }
    }

    /// Returns `true` for a zero exit code.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            detail: None,
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}")?,
            None => f.write_str("terminated by signal")?,
        }
        if let Some(detail) = &self.detail {
            write!(f, "\n\nStderr:\n{detail}")?;
        }
        Ok(())
    }
}

/// An external tool the pipeline delegates to.
pub trait Collaborator {
    /// Runs the tool to completion.
    ///
    /// `Err` means the tool could not be started; a non-zero exit is reported
    /// through the returned [`ToolStatus`].
    fn run(&self, invocation: &Invocation) -> io::Result<ToolStatus>;

    /// Returns `true` if the tool can be launched. Used by preflight.
    fn is_available(&self) -> bool {
        true
    }
}

/// Runs a real program with [`std::process::Command`].
#[derive(Debug, Clone)]
pub struct ProcessCollaborator {
    program: PathBuf,
    /// Stream child output instead of capturing it.
    verbose: bool,
    /// Arguments used to check that the program launches.
    probe_args: Vec<String>,
}

impl ProcessCollaborator {
    /// Creates a collaborator for `program`, probed with `--version`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            verbose: false,
            probe_args: vec!["--version".to_string()],
        }
    }

    /// Streams child stdout/stderr to the terminal when `true`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overrides the availability probe arguments.
    pub fn probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Collaborator for ProcessCollaborator {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolStatus> {
        let mut cmd = self.command(invocation);
        tracing::debug!(program = %self.program.display(), args = ?invocation.args, "running");

        if self.verbose {
            return cmd.status().map(ToolStatus::from);
        }

        let output = cmd.output()?;
        let mut status = ToolStatus::from(output.status);
        if !status.is_success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
            status.detail = Some(lines[start..].join("\n"));
        }
        Ok(status)
    }

    fn is_available(&self) -> bool {
        // A script given by path only has to exist; PATH lookups must launch.
        if self.program.components().count() > 1 {
            return self.program.is_file();
        }
        Command::new(&self.program)
            .args(&self.probe_args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// One collaborator per external role.
pub struct Toolchain {
    /// Native build system producing the media-engine framework.
    pub media_engine: Box<dyn Collaborator>,
    /// Cross-compiler producing one static-library slice per target.
    pub cross_compiler: Box<dyn Collaborator>,
    /// Binding header generator.
    pub header_generator: Box<dyn Collaborator>,
    /// Materializes third-party dependencies before the platform build.
    pub dependency_manager: Box<dyn Collaborator>,
    /// Builds the application-platform framework per environment.
    pub platform_build: Box<dyn Collaborator>,
}

impl Toolchain {
    /// Builds a toolchain that spawns the configured programs.
    pub fn system(tools: &ToolSettings, verbose: bool) -> Self {
        Self {
            media_engine: Box::new(ProcessCollaborator::new(&tools.media_engine).verbose(verbose)),
            cross_compiler: Box::new(ProcessCollaborator::new(&tools.cross_compiler).verbose(verbose)),
            header_generator: Box::new(
                ProcessCollaborator::new(&tools.header_generator).verbose(verbose),
            ),
            dependency_manager: Box::new(
                ProcessCollaborator::new(&tools.dependency_manager).verbose(verbose),
            ),
            platform_build: Box::new(
                ProcessCollaborator::new(&tools.platform_build)
                    .verbose(verbose)
                    .probe_args(["-version"]),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_lookups() {
        let inv = Invocation::new([
            "build",
            "--target",
            "aarch64-apple-ios",
            "--target",
            "x86_64-apple-ios",
            "--output",
            "out.h",
            "SYMROOT=/tmp/sym",
        ]);
        assert_eq!(inv.value_of("--output"), Some("out.h"));
        assert_eq!(
            inv.values_of("--target"),
            vec!["aarch64-apple-ios", "x86_64-apple-ios"]
        );
        assert_eq!(inv.setting("SYMROOT"), Some("/tmp/sym"));
        assert_eq!(inv.value_of("--missing"), None);
    }

    #[test]
    fn status_display() {
        assert_eq!(ToolStatus::from_code(3).to_string(), "exit code 3");
        let signalled = ToolStatus {
            code: None,
            detail: Some("boom".to_string()),
        };
        let msg = signalled.to_string();
        assert!(msg.contains("terminated by signal"));
        assert!(msg.contains("boom"));
        assert!(ToolStatus::success().is_success());
    }

    #[test]
    fn missing_program_fails_to_launch() {
        let tool = ProcessCollaborator::new("nonexistent-command-12345");
        assert!(tool.run(&Invocation::new(["--help"])).is_err());
        assert!(!tool.is_available());
    }

    #[test]
    fn script_path_availability_checks_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("build.sh");
        let tool = ProcessCollaborator::new(&script);
        assert!(!tool.is_available());
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        assert!(tool.is_available());
    }
}
