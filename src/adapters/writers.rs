use crate::domain::model::{RepresentedDataset, TransformResult};
use crate::domain::services::typical_periods::{SeriesAccuracy, TypicalPeriods};
use crate::utils::error::{RepresentError, Result};
use serde::Serialize;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const CAPACITIES_FILE: &str = "capacities.csv";
pub const CAPACITY_FACTORS_FILE: &str = "capacity_factors.csv";
pub const TYPICAL_PERIODS_FILE: &str = "typical_periods.csv";
pub const PERIOD_ORDER_FILE: &str = "period_order.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// One output file ready to be stored.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub data: Vec<u8>,
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| RepresentError::processing(format!("failed to flush CSV buffer: {}", e)))
}

pub fn capacities_csv(represented: &RepresentedDataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["region_id", "ts_id", "capacity"])?;
    for region in &represented.regions {
        for series in &region.series {
            writer.write_record([
                region.region_id.as_str(),
                series.ts_id.as_deref().unwrap_or(""),
                series.capacity.to_string().as_str(),
            ])?;
        }
    }
    finish_csv(writer)
}

pub fn capacity_factors_csv(represented: &RepresentedDataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["time", "region_id", "ts_id", "capacity_factor"])?;
    for (t, label) in represented.time.iter().enumerate() {
        for region in &represented.regions {
            for series in &region.series {
                writer.write_record([
                    label.as_str(),
                    region.region_id.as_str(),
                    series.ts_id.as_deref().unwrap_or(""),
                    series.capacity_factor[t].to_string().as_str(),
                ])?;
            }
        }
    }
    finish_csv(writer)
}

pub fn typical_periods_csv(typical: &TypicalPeriods) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["typical_period", "step", "series", "value"])?;
    for (k, profile) in typical.profiles.iter().enumerate() {
        for step in 0..typical.period_length {
            for (name, values) in typical.series_names.iter().zip(profile) {
                writer.write_record([
                    k.to_string().as_str(),
                    step.to_string().as_str(),
                    name.as_str(),
                    values[step].to_string().as_str(),
                ])?;
            }
        }
    }
    finish_csv(writer)
}

pub fn period_order_csv(typical: &TypicalPeriods) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["period", "typical_period"])?;
    for (period, k) in typical.period_order.iter().enumerate() {
        writer.write_record([period.to_string(), k.to_string()])?;
    }
    finish_csv(writer)
}

#[derive(Debug, Serialize)]
struct RegionSummary<'a> {
    region_id: &'a str,
    raster_cells: usize,
    eligible_cells: usize,
    total_capacity: f64,
}

#[derive(Debug, Serialize)]
struct TypicalPeriodSummary<'a> {
    period_length: usize,
    n_periods: usize,
    n_typical_periods: usize,
    occurrences: &'a [usize],
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    pipeline: &'a str,
    generated_at: String,
    time_steps: usize,
    n_time_series_per_region: usize,
    regions: Vec<RegionSummary<'a>>,
    typical_periods: Option<TypicalPeriodSummary<'a>>,
    accuracy: &'a [SeriesAccuracy],
}

pub fn summary_json(pipeline_name: &str, result: &TransformResult) -> Result<Vec<u8>> {
    let regions = result
        .represented
        .regions
        .iter()
        .map(|region| RegionSummary {
            region_id: &region.region_id,
            raster_cells: result
                .rasters
                .iter()
                .find(|r| r.region_id == region.region_id)
                .map_or(0, |r| r.cells.len()),
            eligible_cells: region.eligible_cells,
            total_capacity: region.total_capacity(),
        })
        .collect();

    let summary = RunSummary {
        pipeline: pipeline_name,
        generated_at: chrono::Utc::now().to_rfc3339(),
        time_steps: result.represented.time.len(),
        n_time_series_per_region: result.represented.n_time_series_per_region,
        regions,
        typical_periods: result.typical_periods.as_ref().map(|t| TypicalPeriodSummary {
            period_length: t.period_length,
            n_periods: t.n_periods(),
            n_typical_periods: t.n_typical_periods(),
            occurrences: &t.occurrences,
        }),
        accuracy: &result.accuracy,
    };
    Ok(serde_json::to_vec_pretty(&summary)?)
}

/// Renders every output of a run.
pub fn render_outputs(pipeline_name: &str, result: &TransformResult) -> Result<Vec<OutputFile>> {
    let mut files = vec![
        OutputFile {
            name: CAPACITIES_FILE.to_string(),
            data: capacities_csv(&result.represented)?,
        },
        OutputFile {
            name: CAPACITY_FACTORS_FILE.to_string(),
            data: capacity_factors_csv(&result.represented)?,
        },
    ];
    if let Some(typical) = &result.typical_periods {
        files.push(OutputFile {
            name: TYPICAL_PERIODS_FILE.to_string(),
            data: typical_periods_csv(typical)?,
        });
        files.push(OutputFile {
            name: PERIOD_ORDER_FILE.to_string(),
            data: period_order_csv(typical)?,
        });
    }
    files.push(OutputFile {
        name: SUMMARY_FILE.to_string(),
        data: summary_json(pipeline_name, result)?,
    });
    Ok(files)
}

pub fn zip_outputs(files: &[OutputFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for file in files {
        zip.start_file(file.name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(&file.data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
