use crate::core::aggregate::AggregationReport;
use crate::domain::model::{MergedField, MergedRecord};
use crate::utils::error::Result;
use std::path::PathBuf;

pub trait Storage {
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

pub trait ConfigProvider {
    /// Four paths in role order: vehicles, updates, employment, personal_info.
    fn source_files(&self) -> Vec<PathBuf>;
    fn output_path(&self) -> &str;
    fn max_count(&self) -> Option<usize>;
    fn max_recorded_date(&self) -> Option<&str>;
    fn group_by(&self) -> MergedField;
    fn count_field(&self) -> MergedField;
    fn write_merged(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub merged_records: Vec<MergedRecord>,
    pub report: AggregationReport,
}

pub trait Pipeline {
    fn extract(&self) -> Result<Vec<MergedRecord>>;
    fn transform(&self, data: Vec<MergedRecord>) -> Result<TransformResult>;
    fn load(&self, result: TransformResult) -> Result<String>;
}
