use crate::core::aggregate::aggregate;
use crate::core::merge::{FullRecordMerger, MergeOutcome, MergeStats};
use crate::core::{ConfigProvider, MergedRecord, Pipeline, Storage, TransformResult};
use crate::utils::error::{MergeError, Result};
use std::cell::RefCell;

pub const MERGED_FILE: &str = "merged.csv";
pub const REPORT_FILE: &str = "popular_values.json";

pub struct MergePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    last_stats: RefCell<Option<MergeStats>>,
}

impl<S: Storage, C: ConfigProvider> MergePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            last_stats: RefCell::new(None),
        }
    }

    /// 建立合併器：日期格式錯誤時立即失敗
    pub fn merger(&self) -> Result<FullRecordMerger> {
        FullRecordMerger::new(
            &self.config.source_files(),
            self.config.max_count(),
            self.config.max_recorded_date(),
        )
    }

    pub fn last_stats(&self) -> Option<MergeStats> {
        self.last_stats.borrow().clone()
    }
}

impl<S: Storage, C: ConfigProvider> Pipeline for MergePipeline<S, C> {
    fn extract(&self) -> Result<Vec<MergedRecord>> {
        let merger = self.merger()?;
        let mut merged = merger.iter();
        let mut records = Vec::new();

        for item in merged.by_ref() {
            match item {
                Ok(record) => records.push(record),
                // 已輸出的資料仍然有效，保留結構錯誤之前的結果
                Err(
                    e @ (MergeError::KeyMismatchError { .. }
                    | MergeError::SchemaMismatch { .. }),
                ) => {
                    tracing::error!("❌ {}", e.user_friendly_message());
                    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                }
                Err(e) => return Err(e),
            }
        }

        let stats = merged.stats();
        for source in &stats.sources {
            tracing::debug!(
                "{}: consumed {}, yielded {}, skipped {}",
                source.role,
                source.stats.consumed,
                source.stats.yielded,
                source.stats.skipped
            );
        }
        match merged.outcome() {
            MergeOutcome::Aborted => tracing::warn!(
                "Merge aborted after {} rows; keeping {} records",
                stats.rows_read,
                records.len()
            ),
            outcome => tracing::debug!("Merge outcome: {:?}", outcome),
        }
        if stats.filtered > 0 {
            tracing::info!("{} records older than the cutoff date were dropped", stats.filtered);
        }
        *self.last_stats.borrow_mut() = Some(stats);

        Ok(records)
    }

    fn transform(&self, data: Vec<MergedRecord>) -> Result<TransformResult> {
        let mut report = aggregate(&data, self.config.group_by(), self.config.count_field());
        report.merge = self.last_stats();

        for (group, top) in &report.groups {
            let values: Vec<&str> = top.values.iter().map(String::as_str).collect();
            tracing::debug!(
                "{} = {}: {} ({} records)",
                report.group_by,
                group,
                values.join(", "),
                top.count
            );
        }

        Ok(TransformResult {
            merged_records: data,
            report,
        })
    }

    fn load(&self, result: TransformResult) -> Result<String> {
        if self.config.write_merged() {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for record in &result.merged_records {
                writer.serialize(record)?;
            }
            let data = writer
                .into_inner()
                .map_err(|e| MergeError::IoError(e.into_error()))?;
            tracing::debug!("Writing {} ({} bytes)", MERGED_FILE, data.len());
            self.storage.write_file(MERGED_FILE, &data)?;
        }

        let report = serde_json::to_string_pretty(&result.report)?;
        tracing::debug!("Writing {} ({} bytes)", REPORT_FILE, report.len());
        self.storage.write_file(REPORT_FILE, report.as_bytes())?;

        Ok(format!("{}/{}", self.config.output_path(), REPORT_FILE))
    }
}
