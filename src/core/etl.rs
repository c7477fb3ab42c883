use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// Runs a [`Pipeline`] phase by phase and reports timings.
pub struct RepresentationEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> RepresentationEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting representation run");
        let mut timings = Vec::with_capacity(3);

        // Extract
        let started = Instant::now();
        let source = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} grid cells x {} time steps and {} regions",
            source.dataset.n_cells(),
            source.dataset.n_time_steps(),
            source.regions.regions.len()
        );
        timings.push(self.monitor.finish_phase("extract", started));

        // Transform
        let started = Instant::now();
        let result = self.pipeline.transform(source).await?;
        tracing::info!(
            "Represented {} regions{}",
            result.represented.regions.len(),
            result
                .typical_periods
                .as_ref()
                .map(|t| format!(" with {} typical periods", t.n_typical_periods()))
                .unwrap_or_default()
        );
        timings.push(self.monitor.finish_phase("transform", started));

        // Load
        let started = Instant::now();
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        timings.push(self.monitor.finish_phase("load", started));

        self.monitor.log_final_stats(&timings);
        Ok(output_path)
    }
}
