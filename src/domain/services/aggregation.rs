use crate::domain::model::{
    GriddedDataset, RegionRaster, RegionRepresentation, RepresentedDataset, RepresentedSeries,
};
use crate::domain::ports::RepresentationSettings;
use crate::domain::services::clustering::{agglomerative_labels, Linkage};
use crate::utils::error::{RepresentError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Capacity-weighted aggregation of a set of cells: total capacity and the
/// capacity factor `sum(capacity * cf_t) / sum(capacity)` at every step.
pub fn aggregate_cells(dataset: &GriddedDataset, cells: &[usize]) -> (f64, Vec<f64>) {
    let capacity_total: f64 = cells.iter().map(|&c| dataset.capacity[c]).sum();
    let capacity_factor = dataset
        .capacity_factor
        .iter()
        .map(|row| {
            let power: f64 = cells.iter().map(|&c| dataset.capacity[c] * row[c]).sum();
            // 沒有格點時 0/0 = NaN
            power / capacity_total
        })
        .collect();
    (capacity_total, capacity_factor)
}

pub fn eligible_cells(dataset: &GriddedDataset, raster: &RegionRaster) -> Vec<usize> {
    raster
        .cells
        .iter()
        .copied()
        .filter(|&c| dataset.is_eligible(c))
        .collect()
}

pub fn ts_id(index: usize) -> String {
    format!("TS_{}", index)
}

/// Represents one region by `n_time_series` series.
pub fn represent_region(
    dataset: &GriddedDataset,
    raster: &RegionRaster,
    n_time_series: usize,
    linkage: Linkage,
) -> Result<RegionRepresentation> {
    let n_cells = dataset.n_cells();
    if let Some(&cell) = raster.cells.iter().find(|&&c| c >= n_cells) {
        return Err(RepresentError::validation(format!(
            "region '{}' references cell {} but the grid has {} cells",
            raster.region_id, cell, n_cells
        )));
    }
    let cells = eligible_cells(dataset, raster);
    tracing::info!(
        "Number of time series in {}: {}",
        raster.region_id,
        cells.len()
    );

    let series = match n_time_series {
        0 => {
            return Err(RepresentError::InvalidConfigValueError {
                field: "n_time_series_per_region".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            })
        }
        1 => {
            let (capacity, capacity_factor) = aggregate_cells(dataset, &cells);
            vec![RepresentedSeries {
                ts_id: None,
                capacity,
                capacity_factor,
            }]
        }
        n => {
            let samples: Vec<Vec<f64>> = cells
                .iter()
                .map(|&c| dataset.capacity_factor_series(c))
                .collect();
            let labels = agglomerative_labels(&samples, n, linkage).map_err(|e| {
                RepresentError::ClusteringError {
                    region: raster.region_id.clone(),
                    message: e.to_string(),
                }
            })?;

            (0..n)
                .map(|label| {
                    let members: Vec<usize> = cells
                        .iter()
                        .zip(&labels)
                        .filter(|(_, &l)| l == label)
                        .map(|(&c, _)| c)
                        .collect();
                    let (capacity, capacity_factor) = aggregate_cells(dataset, &members);
                    RepresentedSeries {
                        ts_id: Some(ts_id(label)),
                        capacity,
                        capacity_factor,
                    }
                })
                .collect()
        }
    };

    Ok(RegionRepresentation {
        region_id: raster.region_id.clone(),
        eligible_cells: cells.len(),
        series,
    })
}

/// Runs `work` for every raster on blocking worker tasks, at most `workers`
/// at a time. Results keep raster order; the first failure aborts the rest.
async fn run_bounded<T, F>(rasters: &[RegionRaster], workers: usize, work: F) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(RegionRaster) -> Result<T> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let work = Arc::new(work);
    let mut tasks = JoinSet::new();

    for (index, raster) in rasters.iter().cloned().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = Arc::clone(&work);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| RepresentError::processing(format!("worker pool closed: {}", e)))?;
            let output = tokio::task::spawn_blocking(move || (*work)(raster)).await??;
            Ok::<_, RepresentError>((index, output))
        });
    }

    let mut slots: Vec<Option<T>> = (0..rasters.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok((index, output)) => slots[index] = Some(output),
            Err(e) => {
                // 任一區域失敗就中止其餘工作
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Runs [`represent_region`] for every raster, at most `settings.workers` at
/// a time. Output keeps raster order.
pub async fn represent_regions(
    dataset: Arc<GriddedDataset>,
    rasters: &[RegionRaster],
    settings: &RepresentationSettings,
) -> Result<RepresentedDataset> {
    tracing::debug!(
        "Representing {} regions with {} workers ({} series per region, {} linkage)",
        rasters.len(),
        settings.workers.max(1),
        settings.n_time_series_per_region,
        settings.linkage
    );

    let n = settings.n_time_series_per_region;
    let linkage = settings.linkage;
    let shared = Arc::clone(&dataset);
    let regions = run_bounded(rasters, settings.workers, move |raster| {
        represent_region(&shared, &raster, n, linkage)
    })
    .await?;

    Ok(RepresentedDataset {
        time: dataset.time.clone(),
        n_time_series_per_region: n,
        regions,
    })
}
