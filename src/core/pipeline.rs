use crate::adapters::gridded_csv::parse_gridded_dataset;
use crate::adapters::regions_json::parse_regions;
use crate::adapters::writers::{render_outputs, zip_outputs};
use crate::core::{ConfigProvider, Pipeline, SourceData, Storage, TransformResult};
use crate::domain::model::RepresentedDataset;
use crate::domain::services::aggregation::represent_regions;
use crate::domain::services::rasterize::rasterize;
use crate::domain::services::typical_periods::{self, TimeSeriesSet};
use crate::utils::error::{RepresentError, Result};
use std::sync::Arc;

pub struct RepresentationPipeline<S: Storage, C: ConfigProvider> {
    source: S,
    sink: S,
    config: C,
    name: String,
}

impl<S: Storage, C: ConfigProvider> RepresentationPipeline<S, C> {
    /// `source` resolves the input files, `sink` receives the outputs.
    pub fn new(source: S, sink: S, config: C) -> Self {
        Self {
            source,
            sink,
            config,
            name: "re-represent".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// 把代表化後的序列整理成典型週期的輸入，含缺值的序列會被略過
fn represented_series_set(represented: &RepresentedDataset) -> TimeSeriesSet {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for region in &represented.regions {
        for series in &region.series {
            let label =
                RepresentedDataset::series_label(&region.region_id, series.ts_id.as_deref());
            if series.capacity_factor.iter().all(|v| v.is_finite()) {
                names.push(label);
                values.push(series.capacity_factor.clone());
            } else {
                tracing::warn!("Skipping {} in period aggregation: series has gaps", label);
            }
        }
    }
    TimeSeriesSet { names, values }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RepresentationPipeline<S, C> {
    async fn extract(&self) -> Result<SourceData> {
        tracing::debug!(
            "Reading {}, {} and {}",
            self.config.capacity_file(),
            self.config.capacity_factor_file(),
            self.config.regions_file()
        );
        let (capacity, capacity_factor, regions) = tokio::try_join!(
            self.source.read_file(self.config.capacity_file()),
            self.source.read_file(self.config.capacity_factor_file()),
            self.source.read_file(self.config.regions_file()),
        )?;

        let dataset = parse_gridded_dataset(
            &capacity,
            &capacity_factor,
            self.config.columns(),
            self.config.dataset_crs().map(str::to_string),
        )?;
        let regions = parse_regions(&regions, &self.config.columns().region_index)?;

        Ok(SourceData { dataset, regions })
    }

    async fn transform(&self, data: SourceData) -> Result<TransformResult> {
        let SourceData { dataset, regions } = data;
        let rasters = rasterize(&dataset, &regions)?;

        let settings = self.config.representation();
        let represented = represent_regions(Arc::new(dataset), &rasters, &settings).await?;

        let (typical_periods, accuracy) = match self.config.typical_periods() {
            Some(period_settings) => {
                let set = represented_series_set(&represented);
                if set.values.is_empty() {
                    return Err(RepresentError::validation(
                        "no gap-free represented series available for typical periods",
                    ));
                }
                let (typical, accuracy) = tokio::task::spawn_blocking(move || {
                    typical_periods::aggregate(&set, &period_settings).map(|typical| {
                        let accuracy = typical_periods::accuracy(&set, &typical);
                        (typical, accuracy)
                    })
                })
                .await??;
                for entry in &accuracy {
                    tracing::debug!(
                        "{}: RMSE {:.4}, duration curve RMSE {:.4}",
                        entry.name,
                        entry.rmse,
                        entry.duration_curve_rmse
                    );
                }
                (Some(typical), accuracy)
            }
            None => (None, Vec::new()),
        };

        Ok(TransformResult {
            rasters,
            represented,
            typical_periods,
            accuracy,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let files = render_outputs(&self.name, &result)?;

        match self.config.archive_name() {
            Some(archive) => {
                tracing::debug!("Creating ZIP file with {} files", files.len());
                let zip_data = zip_outputs(&files)?;
                tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
                self.sink.write_file(archive, &zip_data).await?;
                Ok(format!("{}/{}", self.config.output_path(), archive))
            }
            None => {
                for file in &files {
                    self.sink.write_file(&file.name, &file.data).await?;
                }
                Ok(self.config.output_path().to_string())
            }
        }
    }
}
