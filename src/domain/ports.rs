use crate::domain::model::{SourceData, TransformResult};
use crate::domain::services::clustering::Linkage;
use crate::domain::services::typical_periods::TypicalPeriodSettings;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Column names used in the gridded CSV inputs and the region file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct ColumnNames {
    #[cfg_attr(feature = "cli", arg(long = "longitude-column", default_value = "x"))]
    pub longitude: String,
    #[cfg_attr(feature = "cli", arg(long = "latitude-column", default_value = "y"))]
    pub latitude: String,
    #[cfg_attr(feature = "cli", arg(long = "time-column", default_value = "time"))]
    pub time: String,
    #[cfg_attr(feature = "cli", arg(long = "capacity-column", default_value = "capacity"))]
    pub capacity: String,
    #[cfg_attr(
        feature = "cli",
        arg(long = "capacity-factor-column", default_value = "capacity factor")
    )]
    pub capacity_factor: String,
    /// Feature property holding the region id
    #[cfg_attr(feature = "cli", arg(long = "region-index", default_value = "region_ids"))]
    pub region_index: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            longitude: "x".to_string(),
            latitude: "y".to_string(),
            time: "time".to_string(),
            capacity: "capacity".to_string(),
            capacity_factor: "capacity factor".to_string(),
            region_index: "region_ids".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepresentationSettings {
    pub n_time_series_per_region: usize,
    pub linkage: Linkage,
    pub workers: usize,
}

pub trait ConfigProvider: Send + Sync {
    fn capacity_file(&self) -> &str;
    fn capacity_factor_file(&self) -> &str;
    fn regions_file(&self) -> &str;
    fn dataset_crs(&self) -> Option<&str>;
    fn columns(&self) -> &ColumnNames;
    fn representation(&self) -> RepresentationSettings;
    fn typical_periods(&self) -> Option<TypicalPeriodSettings>;
    fn output_path(&self) -> &str;
    /// ZIP 檔名，`None` 表示不壓縮
    fn archive_name(&self) -> Option<&str>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<SourceData>;
    async fn transform(&self, data: SourceData) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
