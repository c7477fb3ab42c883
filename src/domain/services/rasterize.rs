use crate::domain::model::{GriddedDataset, MultiPolygon, Polygon, RegionCollection, RegionRaster};
use crate::utils::error::{RepresentError, Result};
use std::collections::HashSet;

/// Even-odd ray casting against one ring.
fn ring_contains(ring: &[[f64; 2]], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Polygon {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.exterior, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }

    fn bounds(&self) -> Option<[f64; 4]> {
        self.exterior.iter().fold(None, |acc, &[x, y]| {
            Some(match acc {
                None => [x, y, x, y],
                Some([min_x, min_y, max_x, max_y]) => {
                    [min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y)]
                }
            })
        })
    }
}

impl MultiPolygon {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.0.iter().any(|p| p.contains(x, y))
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn bounds(&self) -> Option<[f64; 4]> {
        self.0
            .iter()
            .filter_map(Polygon::bounds)
            .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])])
    }
}

fn same_crs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// 檢查座標系統，兩邊都有宣告且不同時直接報錯（不做投影轉換）
pub fn check_crs(dataset: &GriddedDataset, regions: &RegionCollection) -> Result<()> {
    match (&dataset.crs, &regions.crs) {
        (Some(d), Some(r)) if !same_crs(d, r) => Err(RepresentError::CrsMismatch {
            dataset: d.clone(),
            regions: r.clone(),
        }),
        (Some(d), None) => {
            tracing::warn!("Region file declares no CRS, assuming dataset CRS {}", d);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Assigns grid cells to every region by cell centre. Regions are handled
/// independently, so overlapping shapes may share cells.
pub fn rasterize(dataset: &GriddedDataset, regions: &RegionCollection) -> Result<Vec<RegionRaster>> {
    check_crs(dataset, regions)?;

    let mut seen = HashSet::new();
    for region in &regions.regions {
        if region.id.trim().is_empty() {
            return Err(RepresentError::validation("region id cannot be empty"));
        }
        if !seen.insert(region.id.as_str()) {
            return Err(RepresentError::validation(format!(
                "duplicate region id '{}'",
                region.id
            )));
        }
    }

    let rasters = regions
        .regions
        .iter()
        .map(|region| {
            let cells = match region.geometry.bounds() {
                Some([min_x, min_y, max_x, max_y]) => (0..dataset.x.len())
                    .filter(|&ix| (min_x..=max_x).contains(&dataset.x[ix]))
                    .flat_map(|ix| {
                        (0..dataset.y.len())
                            .filter(|&iy| (min_y..=max_y).contains(&dataset.y[iy]))
                            .map(move |iy| (ix, iy))
                    })
                    .filter(|&(ix, iy)| region.geometry.contains(dataset.x[ix], dataset.y[iy]))
                    .map(|(ix, iy)| dataset.cell_index(ix, iy))
                    .collect(),
                None => Vec::new(),
            };
            if cells.is_empty() {
                tracing::warn!("Region {} covers no grid cell", region.id);
            }
            RegionRaster {
                region_id: region.id.clone(),
                cells,
            }
        })
        .collect();

    Ok(rasters)
}
