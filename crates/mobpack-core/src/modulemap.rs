//! Module descriptor composition.

use std::fs;
use std::path::Path;

use crate::types::PackError;

/// Composes the module map exposing the framework's umbrella header plus an
/// explicit `Private` sub-module for the binding header and its library.
///
/// Pure: the same inputs always produce the same text.
///
/// # Example
///
/// ```
/// use mobpack_core::modulemap::compose;
///
/// let text = compose("Sdk", "core_ffi.h", "core");
/// assert!(text.starts_with("framework module Sdk {"));
/// assert!(text.contains("link \"core\""));
/// ```
pub fn compose(framework_name: &str, header_file_name: &str, binary_name: &str) -> String {
    format!(
        r#"framework module {framework_name} {{
  umbrella header "{framework_name}.h"

  export *
  module * {{ export * }}

  explicit module Private {{
    header "{header_file_name}"
    link "{binary_name}"
    export *
  }}
}}
"#
    )
}

/// Writes `text` to `path`, replacing any previous descriptor.
pub fn write_module_map(path: &Path, text: &str) -> Result<(), PackError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PackError::fs("failed to create module map directory", parent, e))?;
    }
    fs::write(path, text).map_err(|e| PackError::fs("failed to write module map", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_is_deterministic() {
        assert_eq!(
            compose("Sdk", "core_ffi.h", "core"),
            compose("Sdk", "core_ffi.h", "core")
        );
    }

    #[test]
    fn compose_layout() {
        let expected = "framework module Sdk {\n  umbrella header \"Sdk.h\"\n\n  export *\n  module * { export * }\n\n  explicit module Private {\n    header \"core_ffi.h\"\n    link \"core\"\n    export *\n  }\n}\n";
        assert_eq!(compose("Sdk", "core_ffi.h", "core"), expected);
    }

    #[test]
    fn write_overwrites() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("Modules/module.modulemap");
        write_module_map(&path, &compose("Old", "a.h", "a")).unwrap();
        write_module_map(&path, &compose("Sdk", "b.h", "b")).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("framework module Sdk"));
        assert!(!text.contains("Old"));
    }
}
