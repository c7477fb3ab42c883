use serde::{Deserialize, Serialize};

/// Gridded RE dataset: installed capacity per cell and a capacity-factor
/// time series per cell. Cells are ordered x-major, `cell = ix * ny + iy`.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedDataset {
    pub crs: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub time: Vec<String>,
    pub capacity: Vec<f64>,
    /// `capacity_factor[t][cell]`
    pub capacity_factor: Vec<Vec<f64>>,
}

impl GriddedDataset {
    pub fn n_cells(&self) -> usize {
        self.x.len() * self.y.len()
    }

    pub fn n_time_steps(&self) -> usize {
        self.time.len()
    }

    pub fn cell_index(&self, ix: usize, iy: usize) -> usize {
        ix * self.y.len() + iy
    }

    pub fn capacity_factor_series(&self, cell: usize) -> Vec<f64> {
        self.capacity_factor.iter().map(|row| row[cell]).collect()
    }

    /// 容量 > 0 且時間序列沒有缺值的格點才參與代表化
    pub fn is_eligible(&self, cell: usize) -> bool {
        let capacity = self.capacity[cell];
        capacity.is_finite()
            && capacity > 0.0
            && self.capacity_factor.iter().all(|row| row[cell].is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon(pub Vec<Polygon>);

#[derive(Debug, Clone, PartialEq)]
pub struct RegionShape {
    pub id: String,
    pub geometry: MultiPolygon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionCollection {
    pub crs: Option<String>,
    pub regions: Vec<RegionShape>,
}

/// Cells whose centre falls inside a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionRaster {
    pub region_id: String,
    pub cells: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentedSeries {
    pub ts_id: Option<String>,
    pub capacity: f64,
    pub capacity_factor: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRepresentation {
    pub region_id: String,
    pub eligible_cells: usize,
    pub series: Vec<RepresentedSeries>,
}

impl RegionRepresentation {
    pub fn total_capacity(&self) -> f64 {
        self.series.iter().map(|s| s.capacity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentedDataset {
    pub time: Vec<String>,
    pub n_time_series_per_region: usize,
    pub regions: Vec<RegionRepresentation>,
}

impl RepresentedDataset {
    pub fn region(&self, region_id: &str) -> Option<&RegionRepresentation> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    /// Series label used when the represented data is handed to period
    /// aggregation: `region` or `region/TS_i`.
    pub fn series_label(region_id: &str, ts_id: Option<&str>) -> String {
        match ts_id {
            Some(ts) => format!("{}/{}", region_id, ts),
            None => region_id.to_string(),
        }
    }
}

/// Output of the extract phase.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub dataset: GriddedDataset,
    pub regions: RegionCollection,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub rasters: Vec<RegionRaster>,
    pub represented: RepresentedDataset,
    pub typical_periods: Option<crate::domain::services::typical_periods::TypicalPeriods>,
    pub accuracy: Vec<crate::domain::services::typical_periods::SeriesAccuracy>,
}
