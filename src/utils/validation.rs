use crate::core::merge::parse_threshold_date;
use crate::utils::error::{MergeError, Result};
use std::collections::HashSet;
use std::path::PathBuf;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(MergeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(MergeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(MergeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extensions(field_name: &str, files: &[String], allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        if let Some(extension) = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            if !allowed_set.contains(extension) {
                return Err(MergeError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.clone(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                });
            }
        } else {
            return Err(MergeError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: file.clone(),
                reason: "File has no extension or invalid filename".to_string(),
            });
        }
    }

    Ok(())
}

pub fn validate_date(field_name: &str, value: &str) -> Result<()> {
    parse_threshold_date(value).map_err(|e| MergeError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Checks shared by every configuration source.
pub fn validate_merge_settings(
    files: &[PathBuf],
    max_count: Option<usize>,
    max_recorded_date: Option<&str>,
) -> Result<()> {
    if files.len() != 4 {
        return Err(MergeError::ConfigValidationError {
            field: "files".to_string(),
            message: format!(
                "Expected 4 files (vehicles, updates, employment, personal_info), got {}",
                files.len()
            ),
        });
    }

    let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    for name in &names {
        validate_path("files", name)?;
    }
    validate_file_extensions("files", &names, &["csv"])?;

    if let Some(count) = max_count {
        validate_positive_number("max_count", count, 1)?;
    }
    if let Some(date) = max_recorded_date {
        validate_date("max_recorded_date", date)?;
    }
    Ok(())
}
