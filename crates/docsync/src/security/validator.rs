//! Identifier and file name validation

use crate::error::{LockError, LockResult};
use regex::Regex;
use std::sync::LazyLock;

/// Document file names: alphanumeric, underscore, hyphen, dot, space
static VALID_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-\. ]+$").unwrap());

/// Project ids as generated by the platform (uuid) or imported (cuid)
static VALID_PROJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-]{1,64}$").unwrap());

/// Validate a document file name.
///
/// File names are written verbatim into a client's cache directory, so
/// they must be a single path component.
pub fn validate_file_name(name: &str) -> LockResult<()> {
    let invalid = |message: &str| Err(LockError::invalid("fileName", message));

    if name.trim().is_empty() {
        return invalid("must not be empty");
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') || name.contains('\0') {
        return invalid("must be a single path component");
    }
    if name.starts_with('.') {
        return invalid("must not be a hidden file");
    }
    if !VALID_FILE_NAME.is_match(name) {
        return invalid("contains forbidden characters");
    }

    // Reserved device names on Windows
    let upper_name = name.to_uppercase();
    let reserved_names = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let base_name = upper_name.split('.').next().unwrap_or(&upper_name);
    if reserved_names.contains(&base_name) {
        return invalid("is a reserved name");
    }

    if name.len() > 200 {
        return invalid("must be at most 200 bytes");
    }

    Ok(())
}

pub fn validate_project_id(project_id: &str) -> LockResult<()> {
    if VALID_PROJECT_ID.is_match(project_id) {
        Ok(())
    } else {
        Err(LockError::invalid("projectId", "malformed project id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_file_names() {
        for name in ["README.md", "api-guide.md", "setup_notes v2.md"] {
            assert!(validate_file_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_rejects_path_traversal() {
        for name in ["../etc/passwd", "a/b.md", "a\\b.md", "..", "", ".sync-hash", "CON.md"] {
            assert!(validate_file_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_project_id() {
        assert!(validate_project_id("ckx1y2z3a0000abcd1234efgh").is_ok());
        assert!(validate_project_id("0b8f6a2e-6c1d-4a8e-9d37-1f2e3d4c5b6a").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("../x").is_err());
    }
}
