//! Fake collaborators and a scratch workspace for end-to-end tests.
//!
//! Each fake records its invocation in a shared log and writes the products
//! the real tool would, so stages can relocate and merge them.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mobpack_core::{Arch, Collaborator, Invocation, PipelineSettings, ToolStatus, Toolchain};
use tempfile::TempDir;

pub const MEDIA_ENGINE: &str = "media-engine";
pub const CROSS_COMPILER: &str = "cross-compiler";
pub const HEADER_GENERATOR: &str = "header-generator";
pub const DEPENDENCY_MANAGER: &str = "dependency-manager";
pub const PLATFORM_BUILD: &str = "platform-build";

#[derive(Debug, Clone)]
pub struct Call {
    pub role: &'static str,
    pub invocation: Invocation,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

type Behavior = Box<dyn Fn(&Invocation) -> io::Result<()>>;

/// A collaborator that logs and runs `behavior`. The call numbered
/// `failing_call` (zero-based) skips the behavior and exits with code 1.
pub struct Fake {
    role: &'static str,
    log: CallLog,
    failing_call: Option<usize>,
    calls: Cell<usize>,
    behavior: Behavior,
}

impl Collaborator for Fake {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolStatus> {
        self.log.borrow_mut().push(Call {
            role: self.role,
            invocation: invocation.clone(),
        });
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.failing_call == Some(call) {
            return Ok(ToolStatus::from_code(1));
        }
        (self.behavior)(invocation)?;
        Ok(ToolStatus::success())
    }
}

/// A little-endian `mach_header_64` (dylib, no load commands) for `arch`
/// followed by `body`.
pub fn thin_macho(arch: Arch, body: &str) -> Vec<u8> {
    let fields: [u32; 8] = [0xfeed_facf, arch.cpu_type(), arch.cpu_subtype(), 6, 0, 0, 0, 0];
    let mut data: Vec<u8> = fields.iter().flat_map(|f| f.to_le_bytes()).collect();
    data.extend_from_slice(body.as_bytes());
    data
}

fn write(path: &Path, data: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}

fn required<'a>(invocation: &'a Invocation, flag: &str) -> io::Result<&'a str> {
    invocation
        .value_of(flag)
        .or_else(|| invocation.setting(flag))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("missing {flag}")))
}

/// A project tree with every source location the stages expect.
pub struct Workspace {
    pub temp: TempDir,
    pub settings: PipelineSettings,
    pub log: CallLog,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut settings = PipelineSettings::new(temp.path());
        settings.upstream_version = "M120".to_string();
        settings.package_version = "2.3.0".to_string();

        fs::create_dir_all(&settings.media_engine.source_dir).unwrap();
        fs::create_dir_all(settings.core_library.crate_dir.join("src")).unwrap();
        fs::write(&settings.core_library.header_config, "language = \"C\"\n").unwrap();
        fs::create_dir_all(settings.app_platform.workspace_path()).unwrap();

        Self {
            temp,
            settings,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Roles invoked so far, in order.
    pub fn roles(&self) -> Vec<&'static str> {
        self.log.borrow().iter().map(|c| c.role).collect()
    }

    pub fn calls_for(&self, role: &str) -> Vec<Invocation> {
        self.log
            .borrow()
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.invocation.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn toolchain(&self) -> Toolchain {
        self.toolchain_failing(None)
    }

    /// A toolchain where the collaborator named `failing` exits with code 1.
    pub fn toolchain_failing(&self, failing: Option<&'static str>) -> Toolchain {
        self.toolchain_failing_at(failing.map(|role| (role, 0)))
    }

    /// A toolchain where only the given call (zero-based) of one role fails.
    pub fn toolchain_failing_at(&self, failing: Option<(&'static str, usize)>) -> Toolchain {
        let fake = |role: &'static str, behavior: Behavior| -> Box<dyn Collaborator> {
            Box::new(Fake {
                role,
                log: Rc::clone(&self.log),
                failing_call: failing.filter(|(r, _)| *r == role).map(|(_, call)| call),
                calls: Cell::new(0),
                behavior,
            })
        };

        let media_name = self.settings.media_engine.framework_name.clone();
        let product_subdir = self.settings.media_engine.product_subdir.clone();
        let target_dir = self.settings.core_library.target_dir();
        let library = self.settings.core_library.static_library_file();
        let app_name = self.settings.app_platform.framework_name.clone();

        Toolchain {
            media_engine: fake(
                MEDIA_ENGINE,
                Box::new(move |inv: &Invocation| {
                    let out = PathBuf::from(required(inv, "--output-dir")?).join(&product_subdir);
                    let config = required(inv, "--build-config")?;
                    let fw = out.join(format!("{media_name}.framework"));
                    write(&fw.join(&media_name), thin_macho(Arch::Arm64, config))?;
                    write(&fw.join("Info.plist"), "<plist/>")?;
                    write(
                        &out.join(format!("{media_name}.framework.dSYM/Contents/Resources/DWARF"))
                            .join(&media_name),
                        thin_macho(Arch::Arm64, "dwarf"),
                    )
                }),
            ),
            cross_compiler: fake(
                CROSS_COMPILER,
                Box::new(move |inv: &Invocation| {
                    let profile = if inv.args.iter().any(|a| a == "--release") {
                        "release"
                    } else {
                        "debug"
                    };
                    for triple in inv.values_of("--target") {
                        write(
                            &target_dir.join(triple).join(profile).join(&library),
                            format!("!<arch>\n{triple}"),
                        )?;
                    }
                    Ok(())
                }),
            ),
            header_generator: fake(
                HEADER_GENERATOR,
                Box::new(|inv: &Invocation| write(Path::new(required(inv, "--output")?), "void core_init(void);\n")),
            ),
            dependency_manager: fake(
                DEPENDENCY_MANAGER,
                Box::new(|inv: &Invocation| {
                    let cwd = inv.cwd.clone().unwrap_or_default();
                    write(&cwd.join("Pods/Manifest.lock"), "PODS: []\n")
                }),
            ),
            platform_build: fake(
                PLATFORM_BUILD,
                Box::new(move |inv: &Invocation| {
                    let sym_root = PathBuf::from(required(inv, "SYMROOT")?);
                    let configuration = required(inv, "-configuration")?;
                    let sdk = required(inv, "-sdk")?;
                    let arch_name = required(inv, "ARCHS")?;
                    let arch = Arch::from_name(arch_name).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "unknown arch")
                    })?;
                    let suffix = if sdk == "iphonesimulator" { "-simulator" } else { "" };

                    let products = sym_root.join(format!("{configuration}-{sdk}"));
                    let fw = products.join(format!("{app_name}.framework"));
                    write(&fw.join(&app_name), thin_macho(arch, sdk))?;
                    write(&fw.join("Headers").join(format!("{app_name}.h")), "#import <Foundation/Foundation.h>\n")?;
                    write(
                        &fw.join(format!("Modules/{app_name}.swiftmodule"))
                            .join(format!("{arch_name}-apple-ios{suffix}.swiftinterface")),
                        "// swift-interface-format-version: 1.0\n",
                    )?;
                    write(
                        &products
                            .join(format!("{app_name}.framework.dSYM/Contents/Resources/DWARF"))
                            .join(&app_name),
                        thin_macho(arch, "dwarf"),
                    )
                }),
            ),
        }
    }
}

/// Sorted file names directly inside `dir`.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
