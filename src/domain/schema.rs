//! Fixed record shapes for the four source files.
//!
//! Each field carries its own coercion rule, so the same column name can never
//! pick up another shape's format by accident.

use crate::utils::error::{MergeError, Result};
use std::collections::HashSet;

pub const YEAR_FORMAT: &str = "%Y";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const THRESHOLD_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Opaque text, no coercion.
    Text,
    /// Year-only timestamp, anchored at January 1st 00:00 UTC.
    Year,
    /// Full UTC timestamp parsed with the given format.
    Timestamp(&'static str),
}

impl FieldKind {
    pub fn format(&self) -> Option<&'static str> {
        match *self {
            FieldKind::Text => None,
            FieldKind::Year => Some(YEAR_FORMAT),
            FieldKind::Timestamp(format) => Some(format),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
        }
    }

    pub const fn year(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Year,
        }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Timestamp(TIMESTAMP_FORMAT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    /// Position of the identity key column.
    pub key_index: usize,
}

impl FieldSchema {
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn key_field(&self) -> &'static str {
        self.fields[self.key_index].name
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| MergeError::InvalidSchema {
            schema: self.name,
            reason,
        };

        if self.fields.is_empty() {
            return Err(invalid("schema has no fields".to_string()));
        }
        if self.key_index >= self.fields.len() {
            return Err(invalid(format!(
                "key index {} is out of range for {} fields",
                self.key_index,
                self.fields.len()
            )));
        }
        if self.fields[self.key_index].kind != FieldKind::Text {
            return Err(invalid("identity key must be a text field".to_string()));
        }

        let mut seen = HashSet::new();
        for field in self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("field name cannot be empty".to_string()));
            }
            if !seen.insert(field.name) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
        }
        Ok(())
    }
}

pub const VEHICLE_SCHEMA: FieldSchema = FieldSchema {
    name: "Vehicle",
    fields: &[
        FieldSpec::text("ssn"),
        FieldSpec::text("vehicle_make"),
        FieldSpec::text("vehicle_model"),
        FieldSpec::year("model_year"),
    ],
    key_index: 0,
};

pub const UPDATE_STATUS_SCHEMA: FieldSchema = FieldSchema {
    name: "UpdateStatus",
    fields: &[
        FieldSpec::text("ssn"),
        FieldSpec::timestamp("last_updated"),
        FieldSpec::timestamp("created"),
    ],
    key_index: 0,
};

pub const EMPLOYMENT_SCHEMA: FieldSchema = FieldSchema {
    name: "Employment",
    fields: &[
        FieldSpec::text("employer"),
        FieldSpec::text("department"),
        FieldSpec::text("employee_id"),
        FieldSpec::text("ssn"),
    ],
    key_index: 3,
};

pub const PERSONAL_INFO_SCHEMA: FieldSchema = FieldSchema {
    name: "PersonalInfo",
    fields: &[
        FieldSpec::text("ssn"),
        FieldSpec::text("first_name"),
        FieldSpec::text("last_name"),
        FieldSpec::text("gender"),
        FieldSpec::text("language"),
    ],
    key_index: 0,
};

/// All source schemas in file role order.
pub const SOURCE_SCHEMAS: [&FieldSchema; 4] = [
    &VEHICLE_SCHEMA,
    &UPDATE_STATUS_SCHEMA,
    &EMPLOYMENT_SCHEMA,
    &PERSONAL_INFO_SCHEMA,
];

/// 啟動時驗證所有 schema
pub fn validate_registry() -> Result<()> {
    for schema in SOURCE_SCHEMAS {
        schema.validate()?;
    }
    Ok(())
}
