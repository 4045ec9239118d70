//! Build provenance records.
//!
//! Each top-level bundle carries exactly one `provenance.json`, written once
//! at the end of the stage that produced the bundle.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::layout::PROVENANCE_FILE;
use crate::types::{BuildType, PackError, Stage};

/// Versions and build facts stamped into a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    pub upstream_version: String,
    pub package_version: String,
    /// Stage label (`media-engine`, `app-platform`).
    pub stage: String,
    /// `debug` or `release`.
    pub build_type: String,
    /// RFC 3339 UTC timestamp.
    pub built_at: String,
}

impl Provenance {
    /// Creates a record timestamped now. Both versions must be non-empty.
    pub fn new(
        upstream_version: &str,
        package_version: &str,
        stage: Stage,
        build_type: BuildType,
    ) -> Result<Self, PackError> {
        if upstream_version.trim().is_empty() {
            return Err(PackError::Provenance("upstream version is empty".into()));
        }
        if package_version.trim().is_empty() {
            return Err(PackError::Provenance("package version is empty".into()));
        }
        let built_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| PackError::Provenance(format!("failed to format timestamp: {e}")))?;

        Ok(Self {
            upstream_version: upstream_version.to_string(),
            package_version: package_version.to_string(),
            stage: stage.as_str().to_string(),
            build_type: build_type.as_str().to_string(),
            built_at,
        })
    }

    /// Writes the record into `bundle`. Fails if a record is already there.
    pub fn write_to(&self, bundle: &Path) -> Result<PathBuf, PackError> {
        let path = bundle.join(PROVENANCE_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PackError::Provenance(format!("failed to serialize: {e}")))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => PackError::Provenance(format!(
                    "{} already exists",
                    path.display()
                )),
                _ => PackError::fs("failed to create provenance file", &path, e),
            })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| PackError::fs("failed to write provenance file", &path, e))?;
        Ok(path)
    }

    /// Reads the record from `bundle`.
    pub fn read_from(bundle: &Path) -> Result<Self, PackError> {
        let path = bundle.join(PROVENANCE_FILE);
        let contents = fs::read_to_string(&path)
            .map_err(|e| PackError::fs("failed to read provenance file", &path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| PackError::Provenance(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let temp = TempDir::new().unwrap();
        let record = Provenance::new("M120", "2.3.0", Stage::AppPlatform, BuildType::Release).unwrap();
        let path = record.write_to(temp.path()).unwrap();
        assert_eq!(path, temp.path().join("provenance.json"));

        let read = Provenance::read_from(temp.path()).unwrap();
        assert_eq!(read, record);
        assert_eq!(read.stage, "app-platform");
        assert!(OffsetDateTime::parse(&read.built_at, &Rfc3339).is_ok());
    }

    #[test]
    fn never_overwrites() {
        let temp = TempDir::new().unwrap();
        let record = Provenance::new("M120", "2.3.0", Stage::MediaEngine, BuildType::Debug).unwrap();
        record.write_to(temp.path()).unwrap();
        let err = record.write_to(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::Provenance(_)));
    }

    #[test]
    fn rejects_empty_versions() {
        assert!(Provenance::new("", "1.0", Stage::MediaEngine, BuildType::Debug).is_err());
        assert!(Provenance::new("M120", "  ", Stage::MediaEngine, BuildType::Debug).is_err());
    }
}
