pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::model::MergedField;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "merge-etl")]
#[command(about = "Merge vehicle, update, employment and personal info files by identity key")]
pub struct CliConfig {
    /// Source files in order: vehicles, updates, employment, personal_info
    #[arg(long, value_delimiter = ',', required = true)]
    pub files: Vec<PathBuf>,

    /// Maximum number of rows read from each file
    #[arg(long)]
    pub max_count: Option<usize>,

    /// Drop records last updated before this date (DD/MM/YYYY)
    #[arg(long)]
    pub max_recorded_date: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "gender")]
    pub group_by: MergedField,

    #[arg(long, default_value = "vehicle_make")]
    pub count_field: MergedField,

    /// Only write the aggregation report
    #[arg(long)]
    pub no_merged_output: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn source_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn max_count(&self) -> Option<usize> {
        self.max_count
    }

    fn max_recorded_date(&self) -> Option<&str> {
        self.max_recorded_date.as_deref()
    }

    fn group_by(&self) -> MergedField {
        self.group_by
    }

    fn count_field(&self) -> MergedField {
        self.count_field
    }

    fn write_merged(&self) -> bool {
        !self.no_merged_output
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_merge_settings(
            &self.files,
            self.max_count,
            self.max_recorded_date.as_deref(),
        )?;
        validation::validate_path("output_path", &self.output_path)
    }
}
