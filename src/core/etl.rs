use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("Starting merge process...");

        // Extract
        let merged = self.pipeline.extract()?;
        tracing::info!("Merged {} records", merged.len());

        // Transform
        let result = self.pipeline.transform(merged)?;
        tracing::info!(
            "Aggregated {} groups by {}",
            result.report.groups.len(),
            result.report.group_by
        );

        // Load
        let output_path = self.pipeline.load(result)?;
        tracing::info!(
            "Output saved to: {} ({:?})",
            output_path,
            started.elapsed()
        );

        Ok(output_path)
    }
}
