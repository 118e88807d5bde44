pub mod aggregate;
pub mod converter;
pub mod etl;
pub mod merge;
pub mod pipeline;
pub mod reader;
pub mod typed_rows;

pub use crate::domain::model::MergedRecord;
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TransformResult};
pub use crate::utils::error::Result;
