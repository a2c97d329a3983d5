//! Name and path checks applied before any network call.

use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;

/// Characters the server refuses in file and folder names.
pub const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validate a single file or folder name and return it trimmed.
pub fn validate_name(name: &str) -> AppResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name must not be empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::validation(format!("'{trimmed}' is not a valid name")));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(AppError::validation(format!(
            "Name '{trimmed}' contains the forbidden character '{c}'"
        )));
    }
    Ok(trimmed)
}

/// Normalize a `/`-separated folder path.
///
/// Leading and trailing slashes are dropped; `""` is the root. Every
/// segment must be a valid name.
pub fn normalize_path(path: &str) -> AppResult<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(AppError::validation(format!(
                "Path '{path}' contains an empty segment"
            )));
        }
        segments.push(validate_name(segment)?);
    }
    Ok(segments.join("/"))
}

/// Join a validated name onto a folder path.
pub fn join_path(parent: &str, name: &str) -> AppResult<String> {
    let parent = normalize_path(parent)?;
    let name = validate_name(name)?;
    Ok(if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  report.pdf ").unwrap(), "report.pdf");
        assert!(validate_name("   ").is_err());
        assert!(validate_name("..").is_err());
        for bad in ["a<b", "a>b", "a:b", "a\"b", "a/b", "a\\b", "a|b", "a?b", "a*b"] {
            let err = validate_name(bad).unwrap_err();
            assert_eq!(err.kind, cloudbox_core::ErrorKind::Validation, "{bad}");
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path("/docs/2024/").unwrap(), "docs/2024");
        assert!(normalize_path("docs//2024").is_err());
        assert!(normalize_path("docs/../etc").is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "new").unwrap(), "new");
        assert_eq!(join_path("/docs", " new ").unwrap(), "docs/new");
        assert!(join_path("docs", "a/b").is_err());
    }
}
