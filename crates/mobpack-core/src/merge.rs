//! Universal binary merging.
//!
//! Architecture slices for the same logical binary are combined into one
//! Mach-O universal ("fat") file: a big-endian `0xCAFEBABE` header, one
//! `fat_arch` record per slice in input order, then each slice payload at an
//! aligned offset. The container embeds no timestamps, so merging the same
//! slices twice yields identical bytes.
//!
//! Companion interface trees (per-architecture module interface files) are not
//! merged at the binary level; [`merge_interfaces`] copies them side by side
//! into the output bundle's interface directory.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};

use object::macho::{self, FatArch32, FatHeader, MachHeader32, MachHeader64};
use object::read::macho::MachHeader;
use object::{BigEndian, Endianness, U32, pod};

use crate::fs_ops;

const FAT_HEADER_LEN: usize = mem::size_of::<FatHeader>();
const FAT_ARCH_LEN: usize = mem::size_of::<FatArch32>();

/// A CPU architecture a slice can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Arm64,
    Armv7,
    Armv7s,
    X86_64,
    I386,
}

impl Arch {
    /// Returns the conventional architecture name (`arm64`, `x86_64`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::Armv7 => "armv7",
            Arch::Armv7s => "armv7s",
            Arch::X86_64 => "x86_64",
            Arch::I386 => "i386",
        }
    }

    /// Parses an architecture name.
    pub fn from_name(name: &str) -> Option<Arch> {
        match name {
            "arm64" | "aarch64" => Some(Arch::Arm64),
            "armv7" => Some(Arch::Armv7),
            "armv7s" => Some(Arch::Armv7s),
            "x86_64" => Some(Arch::X86_64),
            "i386" => Some(Arch::I386),
            _ => None,
        }
    }

    /// Maps a Rust target triple such as `aarch64-apple-ios` to its architecture.
    pub fn from_target_triple(triple: &str) -> Option<Arch> {
        triple.split('-').next().and_then(Arch::from_name)
    }

    pub fn cpu_type(&self) -> u32 {
        match self {
            Arch::Arm64 => macho::CPU_TYPE_ARM64,
            Arch::Armv7 | Arch::Armv7s => macho::CPU_TYPE_ARM,
            Arch::X86_64 => macho::CPU_TYPE_X86_64,
            Arch::I386 => macho::CPU_TYPE_X86,
        }
    }

    pub fn cpu_subtype(&self) -> u32 {
        match self {
            Arch::Arm64 => macho::CPU_SUBTYPE_ARM64_ALL,
            Arch::Armv7 => macho::CPU_SUBTYPE_ARM_V7,
            Arch::Armv7s => macho::CPU_SUBTYPE_ARM_V7S,
            Arch::X86_64 => macho::CPU_SUBTYPE_X86_64_ALL,
            Arch::I386 => macho::CPU_SUBTYPE_I386_ALL,
        }
    }

    /// Slice alignment as a power of two: 16 KiB pages on ARM, 4 KiB on x86.
    fn align_log2(&self) -> u32 {
        match self {
            Arch::Arm64 | Arch::Armv7 | Arch::Armv7s => 14,
            Arch::X86_64 | Arch::I386 => 12,
        }
    }

    fn from_cpu(cpu_type: u32, cpu_subtype: u32) -> Option<Arch> {
        let subtype = cpu_subtype & !macho::CPU_SUBTYPE_MASK;
        match (cpu_type, subtype) {
            (macho::CPU_TYPE_ARM64, macho::CPU_SUBTYPE_ARM64_ALL | macho::CPU_SUBTYPE_ARM64_V8) => {
                Some(Arch::Arm64)
            }
            (macho::CPU_TYPE_ARM, macho::CPU_SUBTYPE_ARM_V7) => Some(Arch::Armv7),
            (macho::CPU_TYPE_ARM, macho::CPU_SUBTYPE_ARM_V7S) => Some(Arch::Armv7s),
            (macho::CPU_TYPE_X86_64, _) => Some(Arch::X86_64),
            (macho::CPU_TYPE_X86, _) => Some(Arch::I386),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-architecture binary plus its optional interface metadata tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureSlice {
    /// Logical binary name; every slice in one merge must share it.
    pub name: String,
    pub arch: Arch,
    pub binary: PathBuf,
    /// Per-architecture module interface directory, if the build produced one.
    pub interface_dir: Option<PathBuf>,
}

impl ArchitectureSlice {
    pub fn new(name: impl Into<String>, arch: Arch, binary: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            arch,
            binary: binary.into(),
            interface_dir: None,
        }
    }

    /// Attaches a module interface directory.
    pub fn with_interface_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.interface_dir = Some(dir.into());
        self
    }
}

/// Errors from merging architecture slices.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no architecture slices to merge")]
    NoSlices,

    /// Slices belong to different logical binaries.
    #[error("slice binary names differ: expected '{expected}', found '{found}'")]
    BinaryNameMismatch { expected: String, found: String },

    #[error("architecture {0} appears in more than one slice")]
    DuplicateArchitecture(Arch),

    #[error("slice not found at {}", .0.display())]
    MissingSlice(PathBuf),

    /// A thin Mach-O slice's header disagrees with its declared architecture.
    #[error("slice {} was declared {declared} but contains {found}", .path.display())]
    ArchitectureMismatch {
        path: PathBuf,
        declared: Arch,
        found: Arch,
    },

    #[error("slice {} is already a universal binary", .0.display())]
    AlreadyUniversal(PathBuf),

    #[error("merged binary would exceed the 4 GiB universal format limit")]
    TooLarge,

    #[error("{} is not a Mach-O binary", .0.display())]
    NotMachO(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MergeError {
    fn io(path: &Path, source: io::Error) -> Self {
        MergeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Merges `slices` into one binary at `output`.
///
/// A single slice is copied unchanged. The output is written to a temporary
/// file beside `output` and renamed into place, so any failure leaves no
/// output file behind. The output takes the first slice's permissions.
///
/// # Example
///
/// ```ignore
/// use mobpack_core::merge::{merge, read_architectures, Arch, ArchitectureSlice};
///
/// merge(
///     &[
///         ArchitectureSlice::new("libcore.a", Arch::Arm64, "target/aarch64-apple-ios/release/libcore.a"),
///         ArchitectureSlice::new("libcore.a", Arch::X86_64, "target/x86_64-apple-ios/release/libcore.a"),
///     ],
///     Path::new("output/release/core-library/libcore.a"),
/// )?;
/// ```
pub fn merge(slices: &[ArchitectureSlice], output: &Path) -> Result<(), MergeError> {
    let first = slices.first().ok_or(MergeError::NoSlices)?;

    if let Some(other) = slices.iter().find(|s| s.name != first.name) {
        return Err(MergeError::BinaryNameMismatch {
            expected: first.name.clone(),
            found: other.name.clone(),
        });
    }

    let mut seen = HashSet::new();
    for slice in slices {
        if !seen.insert(slice.arch) {
            return Err(MergeError::DuplicateArchitecture(slice.arch));
        }
    }

    let mut payloads = Vec::with_capacity(slices.len());
    for slice in slices {
        let data = fs::read(&slice.binary).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MergeError::MissingSlice(slice.binary.clone()),
            _ => MergeError::io(&slice.binary, e),
        })?;
        check_declared_arch(slice, &data, slices.len() > 1)?;
        payloads.push((slice.arch, data));
    }

    let permissions = fs::metadata(&first.binary)
        .map_err(|e| MergeError::io(&first.binary, e))?
        .permissions();

    let bytes = if payloads.len() == 1 {
        payloads.remove(0).1
    } else {
        build_fat(&payloads)?
    };

    write_atomic(output, &bytes, permissions)
}

/// Copies every slice's interface tree into `output_dir`, keyed by the
/// per-architecture file names the build tool produced.
pub fn merge_interfaces(slices: &[ArchitectureSlice], output_dir: &Path) -> Result<(), MergeError> {
    for dir in slices.iter().filter_map(|s| s.interface_dir.as_deref()) {
        if !dir.is_dir() {
            return Err(MergeError::MissingSlice(dir.to_path_buf()));
        }
        fs_ops::copy_dir_recursive(dir, output_dir).map_err(|e| MergeError::io(dir, e))?;
    }
    Ok(())
}

/// Reports the architectures contained in a universal or thin Mach-O file.
pub fn read_architectures(path: &Path) -> Result<Vec<Arch>, MergeError> {
    let data = fs::read(path).map_err(|e| MergeError::io(path, e))?;

    let not_macho = || MergeError::NotMachO(path.to_path_buf());

    if is_universal(&data) {
        // Fails when the declared record count runs past the end of the file.
        let records = FatHeader::parse_arch32(&*data).map_err(|_| not_macho())?;
        return records
            .iter()
            .map(|record| {
                Arch::from_cpu(
                    record.cputype.get(BigEndian),
                    record.cpusubtype.get(BigEndian),
                )
                .ok_or_else(not_macho)
            })
            .collect();
    }

    thin_arch(&data).map(|arch| vec![arch]).ok_or_else(not_macho)
}

fn is_universal(data: &[u8]) -> bool {
    FatHeader::parse(data).is_ok_and(|header| header.magic.get(BigEndian) == macho::FAT_MAGIC)
}

/// Static archives carry no single Mach-O header and are trusted as declared.
fn check_declared_arch(slice: &ArchitectureSlice, data: &[u8], merging: bool) -> Result<(), MergeError> {
    if merging && is_universal(data) {
        return Err(MergeError::AlreadyUniversal(slice.binary.clone()));
    }
    match thin_arch(data) {
        Some(found) if found != slice.arch => Err(MergeError::ArchitectureMismatch {
            path: slice.binary.clone(),
            declared: slice.arch,
            found,
        }),
        _ => Ok(()),
    }
}

fn thin_arch(data: &[u8]) -> Option<Arch> {
    if let Ok(header) = MachHeader64::<Endianness>::parse(data, 0) {
        let endian = header.endian().ok()?;
        return Arch::from_cpu(header.cputype(endian), header.cpusubtype(endian));
    }
    let header = MachHeader32::<Endianness>::parse(data, 0).ok()?;
    let endian = header.endian().ok()?;
    Arch::from_cpu(header.cputype(endian), header.cpusubtype(endian))
}

fn build_fat(payloads: &[(Arch, Vec<u8>)]) -> Result<Vec<u8>, MergeError> {
    let header_len = FAT_HEADER_LEN + FAT_ARCH_LEN * payloads.len();
    let mut records = Vec::with_capacity(payloads.len());
    let mut offset = header_len as u64;
    for (arch, data) in payloads {
        let align = 1u64 << arch.align_log2();
        offset = offset.div_ceil(align) * align;
        records.push((offset, data.len() as u64));
        offset += data.len() as u64;
    }
    if offset > u64::from(u32::MAX) {
        return Err(MergeError::TooLarge);
    }

    let mut out = Vec::with_capacity(offset as usize);
    let header = FatHeader {
        magic: U32::new(BigEndian, macho::FAT_MAGIC),
        nfat_arch: U32::new(BigEndian, payloads.len() as u32),
    };
    out.extend_from_slice(pod::bytes_of(&header));
    for ((arch, _), (offset, size)) in payloads.iter().zip(&records) {
        let record = FatArch32 {
            cputype: U32::new(BigEndian, arch.cpu_type()),
            cpusubtype: U32::new(BigEndian, arch.cpu_subtype()),
            offset: U32::new(BigEndian, *offset as u32),
            size: U32::new(BigEndian, *size as u32),
            align: U32::new(BigEndian, arch.align_log2()),
        };
        out.extend_from_slice(pod::bytes_of(&record));
    }
    for ((_, data), (offset, _)) in payloads.iter().zip(&records) {
        out.resize(*offset as usize, 0);
        out.extend_from_slice(data);
    }
    Ok(out)
}

fn write_atomic(output: &Path, bytes: &[u8], permissions: fs::Permissions) -> Result<(), MergeError> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| MergeError::io(parent, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".merge")
        .tempfile_in(parent)
        .map_err(|e| MergeError::io(parent, e))?;
    temp.write_all(bytes).map_err(|e| MergeError::io(output, e))?;
    // Temp files are created owner-only.
    temp.as_file()
        .set_permissions(permissions)
        .map_err(|e| MergeError::io(output, e))?;
    temp.persist(output)
        .map_err(|e| MergeError::io(output, e.error))?;
    Ok(())
}
