use crate::domain::ports::{ColumnNames, ConfigProvider, RepresentationSettings};
use crate::domain::services::clustering::Linkage;
use crate::domain::services::typical_periods::{RepresentationMethod, TypicalPeriodSettings};
use crate::utils::error::{RepresentError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default)]
    pub representation: RepresentationConfig,
    pub typical_periods: Option<TypicalPeriodsConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub capacity_file: String,
    pub capacity_factor_file: String,
    pub regions_file: String,
    pub dataset_crs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentationConfig {
    #[serde(default = "default_time_series_per_region")]
    pub n_time_series_per_region: usize,
    #[serde(default)]
    pub linkage: Linkage,
    pub workers: Option<usize>,
}

fn default_time_series_per_region() -> usize {
    1
}

impl Default for RepresentationConfig {
    fn default() -> Self {
        Self {
            n_time_series_per_region: default_time_series_per_region(),
            linkage: Linkage::default(),
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypicalPeriodsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub period_length: usize,
    pub n_typical_periods: usize,
    #[serde(default)]
    pub method: RepresentationMethod,
    pub linkage: Option<Linkage>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RepresentError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RepresentError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        validate_path("source.capacity_file", &self.source.capacity_file)?;
        validate_file_extension("source.capacity_file", &self.source.capacity_file, &["csv"])?;
        validate_path("source.capacity_factor_file", &self.source.capacity_factor_file)?;
        validate_file_extension(
            "source.capacity_factor_file",
            &self.source.capacity_factor_file,
            &["csv"],
        )?;
        validate_path("source.regions_file", &self.source.regions_file)?;
        validate_file_extension(
            "source.regions_file",
            &self.source.regions_file,
            &["json", "geojson"],
        )?;

        validate_non_empty_string("columns.region_index", &self.columns.region_index)?;

        validate_positive_number(
            "representation.n_time_series_per_region",
            self.representation.n_time_series_per_region,
            1,
        )?;
        if let Some(workers) = self.representation.workers {
            validate_positive_number("representation.workers", workers, 1)?;
        }

        if let Some(typical) = self.typical_periods.as_ref().filter(|t| t.enabled) {
            validate_positive_number("typical_periods.period_length", typical.period_length, 1)?;
            validate_positive_number(
                "typical_periods.n_typical_periods",
                typical.n_typical_periods,
                1,
            )?;
        }

        validate_path("load.output_path", &self.load.output_path)?;
        if let Some(compression) = self.load.compression.as_ref().filter(|c| c.enabled) {
            validate_file_extension("load.compression.filename", &compression.filename, &["zip"])?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn workers(&self) -> usize {
        self.representation.workers.unwrap_or_else(default_workers)
    }

    /// 輸出目錄，相對路徑以 `base`（設定檔所在目錄）為基準
    pub fn output_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.load.output_path)
    }

    /// 實際寫出的位置：啟用壓縮時為 ZIP 檔，否則為輸出目錄
    pub fn output_location(&self, base: &Path) -> PathBuf {
        let dir = self.output_dir(base);
        match self.archive_name() {
            Some(archive) => dir.join(archive),
            None => dir,
        }
    }
}

impl ConfigProvider for TomlConfig {
    fn capacity_file(&self) -> &str {
        &self.source.capacity_file
    }

    fn capacity_factor_file(&self) -> &str {
        &self.source.capacity_factor_file
    }

    fn regions_file(&self) -> &str {
        &self.source.regions_file
    }

    fn dataset_crs(&self) -> Option<&str> {
        self.source.dataset_crs.as_deref()
    }

    fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    fn representation(&self) -> RepresentationSettings {
        RepresentationSettings {
            n_time_series_per_region: self.representation.n_time_series_per_region,
            linkage: self.representation.linkage,
            workers: self.workers(),
        }
    }

    fn typical_periods(&self) -> Option<TypicalPeriodSettings> {
        self.typical_periods
            .as_ref()
            .filter(|t| t.enabled)
            .map(|t| TypicalPeriodSettings {
                period_length: t.period_length,
                n_typical_periods: t.n_typical_periods,
                method: t.method,
                linkage: t.linkage.unwrap_or(self.representation.linkage),
            })
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn archive_name(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "wind-onshore"

[source]
capacity_file = "data/capacity.csv"
capacity_factor_file = "data/capfac.csv"
regions_file = "data/regions.geojson"
dataset_crs = "EPSG:3035"

[load]
output_path = "./out"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.pipeline.name, "wind-onshore");
        assert_eq!(config.dataset_crs(), Some("EPSG:3035"));
        assert_eq!(config.columns, ColumnNames::default());
        assert_eq!(config.representation().n_time_series_per_region, 1);
        assert_eq!(config.representation().linkage, Linkage::Average);
        assert!(config.representation().workers >= 1);
        assert!(config.typical_periods().is_none());
        assert_eq!(config.archive_name(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_toml_config() {
        let toml_content = r#"
[pipeline]
name = "pv"
description = "PV rooftop"
version = "1.0"

[source]
capacity_file = "cap.csv"
capacity_factor_file = "cf.csv"
regions_file = "regions.json"

[columns]
longitude = "lon"
latitude = "lat"
capacity_factor = "cf"

[representation]
n_time_series_per_region = 3
linkage = "complete"
workers = 2

[typical_periods]
period_length = 24
n_typical_periods = 8
method = "mean"

[load]
output_path = "./out"
compression = { enabled = true, filename = "pv.zip" }

[monitoring]
enabled = true
json_logs = true
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.columns.longitude, "lon");
        assert_eq!(config.columns.time, "time");
        assert_eq!(config.representation().workers, 2);

        let typical = config.typical_periods().unwrap();
        assert_eq!(typical.method, RepresentationMethod::Mean);
        assert_eq!(typical.linkage, Linkage::Complete);
        assert_eq!(config.archive_name(), Some("pv.zip"));
        assert!(config.monitoring_enabled());
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RE_REPRESENT_TEST_DIR", "/data/era5");

        let toml_content = BASIC.replace("data/capacity.csv", "${RE_REPRESENT_TEST_DIR}/cap.csv");
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.source.capacity_file, "/data/era5/cap.csv");

        std::env::remove_var("RE_REPRESENT_TEST_DIR");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = BASIC.replace("data/regions.geojson", "data/regions.shp");
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = format!("{}\n[representation]\nn_time_series_per_region = 0\n", BASIC);
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_linkage_is_parse_error() {
        let toml_content = format!("{}\n[representation]\nlinkage = \"centroid\"\n", BASIC);
        assert!(matches!(
            TomlConfig::from_toml_str(&toml_content),
            Err(RepresentError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_output_location_follows_config_dir() {
        let base = Path::new("/srv/runs/wind");
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.output_dir(base), PathBuf::from("/srv/runs/wind/./out"));
        assert_eq!(config.output_location(base), config.output_dir(base));

        let zipped = BASIC.replace(
            "output_path = \"./out\"",
            "output_path = \"results\"\ncompression = { enabled = true, filename = \"wind.zip\" }",
        );
        let config = TomlConfig::from_toml_str(&zipped).unwrap();
        assert_eq!(
            config.output_location(base),
            PathBuf::from("/srv/runs/wind/results/wind.zip")
        );

        let absolute = BASIC.replace("./out", "/data/out");
        let config = TomlConfig::from_toml_str(&absolute).unwrap();
        assert_eq!(config.output_location(base), PathBuf::from("/data/out"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "wind-onshore");
    }
}
