use crate::domain::model::{ConvertedFields, FieldValue, TypedRecord};
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, YEAR_FORMAT};
use crate::utils::error::{MergeError, Result};
use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::StringRecord;

/// Convert one raw row into values of the given schema.
///
/// Fails with [`MergeError::SchemaMismatch`] when the column count differs and
/// with [`MergeError::FieldFormatError`] when a timestamp column does not parse.
/// No cross-field validation happens here.
pub fn convert_row(row: &StringRecord, schema: &FieldSchema) -> Result<Vec<FieldValue>> {
    if row.len() != schema.arity() {
        return Err(MergeError::SchemaMismatch {
            schema: schema.name,
            expected: schema.arity(),
            found: row.len(),
        });
    }

    row.iter()
        .zip(schema.fields)
        .map(|(raw, spec)| convert_field(raw, spec))
        .collect()
}

/// Convert a raw row straight into its typed record.
pub fn convert_record<T: TypedRecord>(row: &StringRecord) -> Result<T> {
    let values = convert_row(row, T::SCHEMA)?;
    T::from_fields(ConvertedFields::new(T::SCHEMA, values))
}

fn convert_field(raw: &str, spec: &FieldSpec) -> Result<FieldValue> {
    let parsed = match spec.kind {
        FieldKind::Text => return Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Year => parse_year(raw),
        FieldKind::Timestamp(format) => parse_timestamp(raw, format),
    };

    parsed
        .map(FieldValue::Timestamp)
        .map_err(|source| MergeError::FieldFormatError {
            field: spec.name,
            value: raw.to_string(),
            format: spec.kind.format().unwrap_or_default(),
            source,
        })
}

/// `%Y` alone leaves month and day unset; anchor at January 1st.
pub fn parse_year(raw: &str) -> std::result::Result<DateTime<Utc>, format::ParseError> {
    let mut parsed = Parsed::new();
    format::parse(&mut parsed, raw, StrftimeItems::new(YEAR_FORMAT))?;
    parsed.set_month(1)?;
    parsed.set_day(1)?;
    let date = parsed.to_naive_date()?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

pub fn parse_timestamp(
    raw: &str,
    format: &str,
) -> std::result::Result<DateTime<Utc>, format::ParseError> {
    let naive = NaiveDateTime::parse_from_str(raw, format)?;
    Ok(Utc.from_utc_datetime(&naive))
}
