//! Agglomerative hierarchical clustering on Euclidean distance, backed by
//! `kodama`.

use kodama::Method;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Single,
    Complete,
    #[default]
    Average,
    Ward,
}

impl FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "ward" => Ok(Self::Ward),
            other => Err(format!(
                "unknown linkage '{}', expected one of: single, complete, average, ward",
                other
            )),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Complete => "complete",
            Self::Average => "average",
            Self::Ward => "ward",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusteringError {
    #[error("no samples to cluster")]
    NoSamples,
    #[error("number of clusters must be at least 1")]
    ZeroClusters,
    #[error("cannot extract {requested} clusters from {samples} samples")]
    TooManyClusters { requested: usize, samples: usize },
    #[error("sample {sample} has {found} features, expected {expected}")]
    RaggedSamples {
        expected: usize,
        found: usize,
        sample: usize,
    },
    #[error("sample {sample} contains missing or non-finite values")]
    NonFiniteSample { sample: usize },
    #[error("invalid sample matrix: {0}")]
    InvalidShape(String),
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl Linkage {
    fn method(self) -> Method {
        match self {
            Self::Single => Method::Single,
            Self::Complete => Method::Complete,
            Self::Average => Method::Average,
            Self::Ward => Method::Ward,
        }
    }
}

/// Upper triangle of the pairwise Euclidean distances, row by row, as
/// expected by `kodama::linkage`.
fn condensed_distances(data: &Array2<f64>) -> Vec<f64> {
    let n = data.nrows();
    let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        let row_i = data.row(i);
        for j in (i + 1)..n {
            let squared: f64 = row_i
                .iter()
                .zip(data.row(j).iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            condensed.push(squared.sqrt());
        }
    }
    condensed
}

/// Clusters `samples` into `n_clusters` groups and returns one label per
/// sample. Labels are numbered in order of each cluster's first sample.
pub fn agglomerative_labels(
    samples: &[Vec<f64>],
    n_clusters: usize,
    linkage: Linkage,
) -> Result<Vec<usize>, ClusteringError> {
    let n = samples.len();
    if n == 0 {
        return Err(ClusteringError::NoSamples);
    }
    if n_clusters == 0 {
        return Err(ClusteringError::ZeroClusters);
    }
    if n_clusters > n {
        return Err(ClusteringError::TooManyClusters {
            requested: n_clusters,
            samples: n,
        });
    }
    let width = samples[0].len();
    if let Some((sample, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != width) {
        return Err(ClusteringError::RaggedSamples {
            expected: width,
            found: s.len(),
            sample,
        });
    }
    if let Some(sample) = samples
        .iter()
        .position(|s| s.iter().any(|v| !v.is_finite()))
    {
        return Err(ClusteringError::NonFiniteSample { sample });
    }

    let data = Array2::from_shape_vec((n, width), samples.concat())
        .map_err(|e| ClusteringError::InvalidShape(e.to_string()))?;
    let mut condensed = condensed_distances(&data);
    let dendrogram = kodama::linkage(&mut condensed, n, linkage.method());
    let steps = dendrogram.steps();

    // 步驟 k 產生的群組編號為 n + k；依距離由小到大套用前 n - n_clusters 步
    let mut order: Vec<usize> = (0..steps.len()).collect();
    order.sort_by(|&a, &b| steps[a].dissimilarity.total_cmp(&steps[b].dissimilarity));

    let mut members: Vec<Vec<usize>> = (0..n)
        .map(|i| vec![i])
        .chain(steps.iter().map(|_| Vec::new()))
        .collect();
    let mut active: Vec<bool> = (0..members.len()).map(|i| i < n).collect();
    for &k in order.iter().take(n - n_clusters) {
        let step = &steps[k];
        let mut merged = std::mem::take(&mut members[step.cluster1]);
        merged.extend(std::mem::take(&mut members[step.cluster2]));
        active[step.cluster1] = false;
        active[step.cluster2] = false;
        members[n + k] = merged;
        active[n + k] = true;
    }

    // 以每個群組最小的樣本索引排序，標籤才會穩定
    let mut clusters: Vec<&Vec<usize>> = (0..members.len())
        .filter(|&i| active[i])
        .map(|i| &members[i])
        .collect();
    clusters.sort_by_key(|m| m.iter().copied().min().unwrap_or(usize::MAX));

    let mut labels = vec![0; n];
    for (label, cluster) in clusters.iter().enumerate() {
        for &sample in cluster.iter() {
            labels[sample] = label;
        }
    }
    Ok(labels)
}
