use crate::domain::ports::{ColumnNames, ConfigProvider, RepresentationSettings};
use crate::domain::services::clustering::Linkage;
use crate::domain::services::typical_periods::{
    RepresentationMethod, TypicalPeriodSettings,
};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path,
    validate_positive_number, Validate,
};
use clap::Parser;

pub const DEFAULT_ARCHIVE_NAME: &str = "representation.zip";

#[derive(Debug, Clone, Parser)]
#[command(name = "re-represent")]
#[command(about = "Represent gridded renewable time series by region")]
pub struct CliConfig {
    /// CSV with one row per grid cell: longitude, latitude, capacity
    #[arg(long)]
    pub capacity_file: String,

    /// Long-format CSV: time, longitude, latitude, capacity factor
    #[arg(long)]
    pub capacity_factor_file: String,

    /// GeoJSON FeatureCollection with the region shapes
    #[arg(long)]
    pub regions_file: String,

    /// CRS of the gridded dataset, e.g. EPSG:3035
    #[arg(long)]
    pub dataset_crs: Option<String>,

    #[command(flatten)]
    pub columns: ColumnNames,

    #[arg(long, default_value = "1")]
    pub time_series_per_region: usize,

    #[arg(long, default_value = "average")]
    pub linkage: Linkage,

    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Aggregate the represented series into this many typical periods
    #[arg(long)]
    pub typical_periods: Option<usize>,

    #[arg(long, default_value = "24")]
    pub period_length: usize,

    #[arg(long, default_value = "medoid")]
    pub period_method: RepresentationMethod,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Bundle all outputs into one ZIP archive
    #[arg(long)]
    pub compress: bool,

    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    pub archive_name: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl ConfigProvider for CliConfig {
    fn capacity_file(&self) -> &str {
        &self.capacity_file
    }

    fn capacity_factor_file(&self) -> &str {
        &self.capacity_factor_file
    }

    fn regions_file(&self) -> &str {
        &self.regions_file
    }

    fn dataset_crs(&self) -> Option<&str> {
        self.dataset_crs.as_deref()
    }

    fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    fn representation(&self) -> RepresentationSettings {
        RepresentationSettings {
            n_time_series_per_region: self.time_series_per_region,
            linkage: self.linkage,
            workers: self.workers,
        }
    }

    fn typical_periods(&self) -> Option<TypicalPeriodSettings> {
        self.typical_periods.map(|n| TypicalPeriodSettings {
            period_length: self.period_length,
            n_typical_periods: n,
            method: self.period_method,
            linkage: self.linkage,
        })
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn archive_name(&self) -> Option<&str> {
        self.compress.then_some(self.archive_name.as_str())
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("capacity_file", &self.capacity_file)?;
        validate_file_extension("capacity_file", &self.capacity_file, &["csv"])?;
        validate_path("capacity_factor_file", &self.capacity_factor_file)?;
        validate_file_extension("capacity_factor_file", &self.capacity_factor_file, &["csv"])?;
        validate_path("regions_file", &self.regions_file)?;
        validate_file_extension("regions_file", &self.regions_file, &["json", "geojson"])?;
        validate_path("output_path", &self.output_path)?;
        validate_positive_number("time_series_per_region", self.time_series_per_region, 1)?;
        validate_positive_number("workers", self.workers, 1)?;
        if let Some(n) = self.typical_periods {
            validate_positive_number("typical_periods", n, 1)?;
            validate_positive_number("period_length", self.period_length, 1)?;
        }
        if self.compress {
            validate_file_extension("archive_name", &self.archive_name, &["zip"])?;
        }
        validate_non_empty_string("region_index", &self.columns.region_index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> CliConfig {
        let mut args = vec![
            "re-represent",
            "--capacity-file",
            "cap.csv",
            "--capacity-factor-file",
            "cf.csv",
            "--regions-file",
            "regions.geojson",
        ];
        args.extend_from_slice(extra);
        CliConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.columns, ColumnNames::default());
        assert_eq!(config.representation().n_time_series_per_region, 1);
        assert_eq!(config.representation().linkage, Linkage::Average);
        assert!(config.typical_periods().is_none());
        assert_eq!(config.archive_name(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--time-series-per-region",
            "3",
            "--linkage",
            "ward",
            "--typical-periods",
            "4",
            "--period-length",
            "12",
            "--compress",
            "--longitude-column",
            "lon",
        ]);
        assert_eq!(config.representation().linkage, Linkage::Ward);
        let typical = config.typical_periods().unwrap();
        assert_eq!(typical.n_typical_periods, 4);
        assert_eq!(typical.period_length, 12);
        assert_eq!(config.archive_name(), Some(DEFAULT_ARCHIVE_NAME));
        assert_eq!(config.columns.longitude, "lon");
    }

    #[test]
    fn test_validation_rejects_zero_series() {
        let config = parse(&["--time-series-per-region", "0"]);
        assert!(config.validate().is_err());
    }
}
