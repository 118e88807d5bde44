pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{cli::LocalStorage, toml_config::TomlConfig};

pub use crate::core::{
    aggregate::{group_mode, most_popular_make_by_gender, TopValues},
    etl::EtlEngine,
    merge::{FullRecordMerger, MergeOutcome, MergedRecords},
    pipeline::MergePipeline,
};
pub use crate::domain::model::{MergedField, MergedRecord};
pub use crate::utils::error::{MergeError, Result};
