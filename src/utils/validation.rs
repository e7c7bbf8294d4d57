use crate::utils::error::{ModelError, Result};

/// Extensions the archive sink and `ArchiveSource` accept.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "npz"];

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

/// Case-insensitive check of the file extension.
pub fn validate_extension(field_name: &str, path: &str, allowed: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| invalid(field_name, path, "File has no extension or invalid filename"))?;

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(extension)) {
        return Err(invalid(
            field_name,
            path,
            format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed.join(", ")
            ),
        ));
    }
    Ok(())
}

pub fn validate_archive_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;
    validate_extension(field_name, path, &ARCHIVE_EXTENSIONS)
}

/// Prefixes become part of archive entry names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_key_prefix(field_name: &str, prefix: &str) -> Result<()> {
    if let Some(bad) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(invalid(
            field_name,
            prefix,
            format!("Character '{}' cannot appear in an archive key prefix", bad),
        ));
    }
    Ok(())
}

pub fn validate_min_count(field_name: &str, count: usize, min: usize) -> Result<()> {
    if count < min {
        return Err(invalid(
            field_name,
            &count.to_string(),
            format!("At least {} required", min),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}
