//! Typical-period aggregation: the horizon is cut into equal periods, the
//! periods are clustered and every cluster is replaced by one profile.

use crate::domain::services::clustering::{agglomerative_labels, euclidean, Linkage};
use crate::utils::error::{RepresentError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationMethod {
    #[default]
    Medoid,
    Mean,
}

impl FromStr for RepresentationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "medoid" => Ok(Self::Medoid),
            "mean" => Ok(Self::Mean),
            other => Err(format!(
                "unknown representation method '{}', expected medoid or mean",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypicalPeriodSettings {
    /// Time steps per period.
    pub period_length: usize,
    pub n_typical_periods: usize,
    #[serde(default)]
    pub method: RepresentationMethod,
    #[serde(default)]
    pub linkage: Linkage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSet {
    pub names: Vec<String>,
    /// `values[series][step]`
    pub values: Vec<Vec<f64>>,
}

impl TimeSeriesSet {
    pub fn horizon(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    fn check(&self) -> Result<()> {
        if self.values.is_empty() || self.horizon() == 0 {
            return Err(RepresentError::validation("no time series to aggregate"));
        }
        if self.names.len() != self.values.len() {
            return Err(RepresentError::validation(format!(
                "{} names for {} time series",
                self.names.len(),
                self.values.len()
            )));
        }
        let horizon = self.horizon();
        for (name, series) in self.names.iter().zip(&self.values) {
            if series.len() != horizon {
                return Err(RepresentError::validation(format!(
                    "series '{}' has {} steps, expected {}",
                    name,
                    series.len(),
                    horizon
                )));
            }
            if series.iter().any(|v| !v.is_finite()) {
                return Err(RepresentError::validation(format!(
                    "series '{}' contains missing or non-finite values",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypicalPeriods {
    pub period_length: usize,
    pub series_names: Vec<String>,
    /// `profiles[typical_period][series][step]`
    pub profiles: Vec<Vec<Vec<f64>>>,
    /// Typical period that stands in for each original period.
    pub period_order: Vec<usize>,
    /// Number of original periods per typical period.
    pub occurrences: Vec<usize>,
}

impl TypicalPeriods {
    pub fn n_periods(&self) -> usize {
        self.period_order.len()
    }

    pub fn n_typical_periods(&self) -> usize {
        self.profiles.len()
    }

    /// Full-horizon series rebuilt by laying typical profiles out in
    /// `period_order`.
    pub fn reconstruct(&self) -> Vec<Vec<f64>> {
        (0..self.series_names.len())
            .map(|s| {
                self.period_order
                    .iter()
                    .flat_map(|&k| self.profiles[k][s].iter().copied())
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesAccuracy {
    pub name: String,
    pub rmse: f64,
    pub mean_absolute_error: f64,
    pub duration_curve_rmse: f64,
}

fn normalized(series: &[f64]) -> Vec<f64> {
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span > 0.0 {
        series.iter().map(|v| (v - min) / span).collect()
    } else {
        vec![0.0; series.len()]
    }
}

pub fn aggregate(set: &TimeSeriesSet, settings: &TypicalPeriodSettings) -> Result<TypicalPeriods> {
    set.check()?;
    let horizon = set.horizon();
    let length = settings.period_length;
    if length == 0 {
        return Err(RepresentError::validation("period length must be at least 1"));
    }
    if horizon % length != 0 {
        return Err(RepresentError::validation(format!(
            "horizon of {} steps is not a multiple of the period length {}",
            horizon, length
        )));
    }
    let n_periods = horizon / length;
    if settings.n_typical_periods == 0 || settings.n_typical_periods > n_periods {
        return Err(RepresentError::validation(format!(
            "cannot build {} typical periods from {} periods",
            settings.n_typical_periods, n_periods
        )));
    }

    let normalized: Vec<Vec<f64>> = set.values.iter().map(|s| normalized(s)).collect();
    // 每個週期的特徵向量：所有序列依序串接
    let features: Vec<Vec<f64>> = (0..n_periods)
        .map(|p| {
            normalized
                .iter()
                .flat_map(|s| s[p * length..(p + 1) * length].iter().copied())
                .collect()
        })
        .collect();

    let labels = agglomerative_labels(&features, settings.n_typical_periods, settings.linkage)
        .map_err(|e| RepresentError::validation(format!("period clustering failed: {}", e)))?;

    let mut occurrences = vec![0usize; settings.n_typical_periods];
    for &label in &labels {
        occurrences[label] += 1;
    }

    let profiles = (0..settings.n_typical_periods)
        .map(|k| {
            let members: Vec<usize> = (0..n_periods).filter(|&p| labels[p] == k).collect();
            match settings.method {
                RepresentationMethod::Medoid => {
                    let medoid = medoid(&features, &members);
                    set.values
                        .iter()
                        .map(|s| s[medoid * length..(medoid + 1) * length].to_vec())
                        .collect()
                }
                RepresentationMethod::Mean => set
                    .values
                    .iter()
                    .map(|s| {
                        (0..length)
                            .map(|t| {
                                members.iter().map(|&p| s[p * length + t]).sum::<f64>()
                                    / members.len() as f64
                            })
                            .collect()
                    })
                    .collect(),
            }
        })
        .collect();

    tracing::debug!(
        "Aggregated {} periods of {} steps into {} typical periods",
        n_periods,
        length,
        settings.n_typical_periods
    );

    Ok(TypicalPeriods {
        period_length: length,
        series_names: set.names.clone(),
        profiles,
        period_order: labels,
        occurrences,
    })
}

/// Member with the smallest summed distance to the other members, earliest
/// on ties.
fn medoid(features: &[Vec<f64>], members: &[usize]) -> usize {
    let mut best = (members[0], f64::INFINITY);
    for &candidate in members {
        let total: f64 = members
            .iter()
            .map(|&other| euclidean(&features[candidate], &features[other]))
            .sum();
        if total < best.1 {
            best = (candidate, total);
        }
    }
    best.0
}

fn rmse(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().max(1) as f64;
    (a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>() / n).sqrt()
}

pub fn accuracy(original: &TimeSeriesSet, typical: &TypicalPeriods) -> Vec<SeriesAccuracy> {
    let reconstructed = typical.reconstruct();
    original
        .names
        .iter()
        .zip(&original.values)
        .zip(&reconstructed)
        .map(|((name, series), rebuilt)| {
            let n = series.len().max(1) as f64;
            let mut sorted_original = series.clone();
            let mut sorted_rebuilt = rebuilt.clone();
            sorted_original.sort_by(|a, b| b.total_cmp(a));
            sorted_rebuilt.sort_by(|a, b| b.total_cmp(a));
            SeriesAccuracy {
                name: name.clone(),
                rmse: rmse(series, rebuilt),
                mean_absolute_error: series
                    .iter()
                    .zip(rebuilt)
                    .map(|(x, y)| (x - y).abs())
                    .sum::<f64>()
                    / n,
                duration_curve_rmse: rmse(&sorted_original, &sorted_rebuilt),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(n: usize, method: RepresentationMethod) -> TypicalPeriodSettings {
        TypicalPeriodSettings {
            period_length: 2,
            n_typical_periods: n,
            method,
            linkage: Linkage::Average,
        }
    }

    /// Three periods of two steps; periods 0 and 2 are near copies.
    fn set() -> TimeSeriesSet {
        TimeSeriesSet {
            names: vec!["pv".to_string()],
            values: vec![vec![0.0, 1.0, 0.5, 0.5, 0.0, 0.9]],
        }
    }

    #[test]
    fn test_medoid_aggregation() {
        let typical = aggregate(&set(), &settings(2, RepresentationMethod::Medoid)).unwrap();
        assert_eq!(typical.period_order, vec![0, 1, 0]);
        assert_eq!(typical.occurrences, vec![2, 1]);
        assert_eq!(typical.profiles[0][0], vec![0.0, 1.0]);
        assert_eq!(typical.profiles[1][0], vec![0.5, 0.5]);
        assert_eq!(
            typical.reconstruct(),
            vec![vec![0.0, 1.0, 0.5, 0.5, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_mean_aggregation_and_accuracy() {
        let original = set();
        let typical = aggregate(&original, &settings(2, RepresentationMethod::Mean)).unwrap();
        assert!((typical.profiles[0][0][1] - 0.95).abs() < 1e-12);

        let report = accuracy(&original, &typical);
        assert_eq!(report.len(), 1);
        assert!(report[0].rmse > 0.0);
        assert!((report[0].mean_absolute_error - 0.1 / 6.0).abs() < 1e-12);

        let exact = aggregate(&original, &settings(3, RepresentationMethod::Mean)).unwrap();
        let report = accuracy(&original, &exact);
        assert_eq!(report[0].rmse, 0.0);
        assert_eq!(report[0].duration_curve_rmse, 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let original = set();
        let mut bad = settings(2, RepresentationMethod::Medoid);
        bad.period_length = 4;
        assert!(aggregate(&original, &bad).is_err());
        assert!(aggregate(&original, &settings(4, RepresentationMethod::Medoid)).is_err());
        assert!(aggregate(&original, &settings(0, RepresentationMethod::Medoid)).is_err());

        let with_gap = TimeSeriesSet {
            names: vec!["pv".to_string()],
            values: vec![vec![0.0, f64::NAN]],
        };
        assert!(aggregate(&with_gap, &settings(1, RepresentationMethod::Medoid)).is_err());
    }

    #[test]
    fn test_medoid_ties_pick_the_earliest_period() {
        // 兩個成員的群組中，兩者的距離總和必然相同
        let forward = TimeSeriesSet {
            names: vec!["pv".to_string()],
            values: vec![vec![0.0, 1.0, 1.0, 0.0]],
        };
        let typical = aggregate(&forward, &settings(1, RepresentationMethod::Medoid)).unwrap();
        assert_eq!(typical.profiles[0][0], vec![0.0, 1.0]);

        let backward = TimeSeriesSet {
            names: vec!["pv".to_string()],
            values: vec![vec![1.0, 0.0, 0.0, 1.0]],
        };
        let typical = aggregate(&backward, &settings(1, RepresentationMethod::Medoid)).unwrap();
        assert_eq!(typical.profiles[0][0], vec![1.0, 0.0]);

        // 三個等距成員：中間的期間距離總和最小
        let spread = TimeSeriesSet {
            names: vec!["pv".to_string()],
            values: vec![vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]],
        };
        let typical = aggregate(&spread, &settings(1, RepresentationMethod::Medoid)).unwrap();
        assert_eq!(typical.profiles[0][0], vec![0.5, 0.5]);
    }

    #[test]
    fn test_constant_series_do_not_break_normalization() {
        let set = TimeSeriesSet {
            names: vec!["flat".to_string(), "pv".to_string()],
            values: vec![vec![1.0; 4], vec![0.0, 1.0, 0.0, 1.0]],
        };
        let typical = aggregate(&set, &settings(1, RepresentationMethod::Medoid)).unwrap();
        assert_eq!(typical.occurrences, vec![2]);
        assert_eq!(typical.profiles[0][0], vec![1.0, 1.0]);
    }
}
