use crate::domain::schema::{
    FieldSchema, EMPLOYMENT_SCHEMA, PERSONAL_INFO_SCHEMA, TIMESTAMP_FORMAT, UPDATE_STATUS_SCHEMA,
    VEHICLE_SCHEMA, YEAR_FORMAT,
};
use crate::utils::error::{MergeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A single coerced column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Converted values of one row, consumed in schema order by [`TypedRecord::from_fields`].
#[derive(Debug)]
pub struct ConvertedFields {
    schema: &'static FieldSchema,
    values: std::vec::IntoIter<FieldValue>,
    position: usize,
}

impl ConvertedFields {
    pub fn new(schema: &'static FieldSchema, values: Vec<FieldValue>) -> Self {
        Self {
            schema,
            values: values.into_iter(),
            position: 0,
        }
    }

    fn next_value(&mut self, expected: &str) -> Result<FieldValue> {
        let position = self.position;
        self.position += 1;
        self.values.next().ok_or_else(|| MergeError::InvalidSchema {
            schema: self.schema.name,
            reason: format!("missing {} value at position {}", expected, position),
        })
    }

    pub fn text(&mut self) -> Result<String> {
        match self.next_value("text")? {
            FieldValue::Text(value) => Ok(value),
            FieldValue::Timestamp(_) => Err(MergeError::InvalidSchema {
                schema: self.schema.name,
                reason: format!("expected text at position {}", self.position - 1),
            }),
        }
    }

    pub fn timestamp(&mut self) -> Result<DateTime<Utc>> {
        match self.next_value("timestamp")? {
            FieldValue::Timestamp(value) => Ok(value),
            FieldValue::Text(_) => Err(MergeError::InvalidSchema {
                schema: self.schema.name,
                reason: format!("expected timestamp at position {}", self.position - 1),
            }),
        }
    }
}

/// A record shape declared in the schema registry.
pub trait TypedRecord: Sized {
    const SCHEMA: &'static FieldSchema;

    fn from_fields(fields: ConvertedFields) -> Result<Self>;

    /// Identity key shared by all four source shapes.
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub ssn: String,
    pub make: String,
    pub model: String,
    pub model_year: DateTime<Utc>,
}

impl TypedRecord for Vehicle {
    const SCHEMA: &'static FieldSchema = &VEHICLE_SCHEMA;

    fn from_fields(mut fields: ConvertedFields) -> Result<Self> {
        Ok(Self {
            ssn: fields.text()?,
            make: fields.text()?,
            model: fields.text()?,
            model_year: fields.timestamp()?,
        })
    }

    fn key(&self) -> &str {
        &self.ssn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub ssn: String,
    pub last_updated: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl TypedRecord for UpdateStatus {
    const SCHEMA: &'static FieldSchema = &UPDATE_STATUS_SCHEMA;

    fn from_fields(mut fields: ConvertedFields) -> Result<Self> {
        Ok(Self {
            ssn: fields.text()?,
            last_updated: fields.timestamp()?,
            created: fields.timestamp()?,
        })
    }

    fn key(&self) -> &str {
        &self.ssn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employment {
    pub employer: String,
    pub department: String,
    pub employee_id: String,
    pub ssn: String,
}

impl TypedRecord for Employment {
    const SCHEMA: &'static FieldSchema = &EMPLOYMENT_SCHEMA;

    fn from_fields(mut fields: ConvertedFields) -> Result<Self> {
        Ok(Self {
            employer: fields.text()?,
            department: fields.text()?,
            employee_id: fields.text()?,
            ssn: fields.text()?,
        })
    }

    fn key(&self) -> &str {
        &self.ssn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalInfo {
    pub ssn: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub language: String,
}

impl TypedRecord for PersonalInfo {
    const SCHEMA: &'static FieldSchema = &PERSONAL_INFO_SCHEMA;

    fn from_fields(mut fields: ConvertedFields) -> Result<Self> {
        Ok(Self {
            ssn: fields.text()?,
            first_name: fields.text()?,
            last_name: fields.text()?,
            gender: fields.text()?,
            language: fields.text()?,
        })
    }

    fn key(&self) -> &str {
        &self.ssn
    }
}

/// One denormalized row, keyed once by `ssn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    pub ssn: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub language: String,
    pub employer: String,
    pub department: String,
    pub employee_id: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created: DateTime<Utc>,
    pub vehicle_make: String,
    pub vehicle_model: String,
    #[serde(serialize_with = "serialize_year")]
    pub model_year: DateTime<Utc>,
}

impl MergedRecord {
    /// Caller guarantees the four keys already agree.
    pub fn from_parts(
        personal: PersonalInfo,
        employment: Employment,
        update: UpdateStatus,
        vehicle: Vehicle,
    ) -> Self {
        Self {
            ssn: personal.ssn,
            first_name: personal.first_name,
            last_name: personal.last_name,
            gender: personal.gender,
            language: personal.language,
            employer: employment.employer,
            department: employment.department,
            employee_id: employment.employee_id,
            last_updated: update.last_updated,
            created: update.created,
            vehicle_make: vehicle.make,
            vehicle_model: vehicle.model,
            model_year: vehicle.model_year,
        }
    }

    /// Render any column as text, timestamps in their source format.
    pub fn field(&self, field: MergedField) -> Cow<'_, str> {
        match field {
            MergedField::Ssn => Cow::Borrowed(&self.ssn),
            MergedField::FirstName => Cow::Borrowed(&self.first_name),
            MergedField::LastName => Cow::Borrowed(&self.last_name),
            MergedField::Gender => Cow::Borrowed(&self.gender),
            MergedField::Language => Cow::Borrowed(&self.language),
            MergedField::Employer => Cow::Borrowed(&self.employer),
            MergedField::Department => Cow::Borrowed(&self.department),
            MergedField::EmployeeId => Cow::Borrowed(&self.employee_id),
            MergedField::LastUpdated => {
                Cow::Owned(self.last_updated.format(TIMESTAMP_FORMAT).to_string())
            }
            MergedField::Created => Cow::Owned(self.created.format(TIMESTAMP_FORMAT).to_string()),
            MergedField::VehicleMake => Cow::Borrowed(&self.vehicle_make),
            MergedField::VehicleModel => Cow::Borrowed(&self.vehicle_model),
            MergedField::ModelYear => Cow::Owned(self.model_year.format(YEAR_FORMAT).to_string()),
        }
    }
}

fn serialize_timestamp<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
}

fn serialize_year<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(YEAR_FORMAT))
}

/// Column names of [`MergedRecord`], used to pick aggregation fields at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergedField {
    Ssn,
    FirstName,
    LastName,
    Gender,
    Language,
    Employer,
    Department,
    EmployeeId,
    LastUpdated,
    Created,
    VehicleMake,
    VehicleModel,
    ModelYear,
}

impl MergedField {
    pub const ALL: [MergedField; 13] = [
        MergedField::Ssn,
        MergedField::FirstName,
        MergedField::LastName,
        MergedField::Gender,
        MergedField::Language,
        MergedField::Employer,
        MergedField::Department,
        MergedField::EmployeeId,
        MergedField::LastUpdated,
        MergedField::Created,
        MergedField::VehicleMake,
        MergedField::VehicleModel,
        MergedField::ModelYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergedField::Ssn => "ssn",
            MergedField::FirstName => "first_name",
            MergedField::LastName => "last_name",
            MergedField::Gender => "gender",
            MergedField::Language => "language",
            MergedField::Employer => "employer",
            MergedField::Department => "department",
            MergedField::EmployeeId => "employee_id",
            MergedField::LastUpdated => "last_updated",
            MergedField::Created => "created",
            MergedField::VehicleMake => "vehicle_make",
            MergedField::VehicleModel => "vehicle_model",
            MergedField::ModelYear => "model_year",
        }
    }
}

impl fmt::Display for MergedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergedField {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        MergedField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| MergeError::InvalidConfigValueError {
                field: "merged_field".to_string(),
                value: s.to_string(),
                reason: format!(
                    "Unknown column. Valid columns: {}",
                    MergedField::ALL.map(|f| f.as_str()).join(", ")
                ),
            })
    }
}

/// Role of a source file, in the order the file list is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Vehicles,
    Updates,
    Employment,
    PersonalInfo,
}

impl SourceRole {
    pub const FILE_ORDER: [SourceRole; 4] = [
        SourceRole::Vehicles,
        SourceRole::Updates,
        SourceRole::Employment,
        SourceRole::PersonalInfo,
    ];

    pub fn schema(&self) -> &'static FieldSchema {
        match self {
            SourceRole::Vehicles => &VEHICLE_SCHEMA,
            SourceRole::Updates => &UPDATE_STATUS_SCHEMA,
            SourceRole::Employment => &EMPLOYMENT_SCHEMA,
            SourceRole::PersonalInfo => &PERSONAL_INFO_SCHEMA,
        }
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceRole::Vehicles => "vehicles",
            SourceRole::Updates => "updates",
            SourceRole::Employment => "employment",
            SourceRole::PersonalInfo => "personal_info",
        };
        f.write_str(name)
    }
}
