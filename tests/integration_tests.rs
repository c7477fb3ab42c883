use re_represent::{LocalStorage, RepresentationEngine, RepresentationPipeline, TomlConfig};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

/// 2 x 2 grid covered by one region: two dim cells and two bright cells.
fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("cap.csv"),
        "x,y,capacity\n0.5,0.5,1\n0.5,1.5,1\n1.5,0.5,2\n1.5,1.5,2\n",
    )
    .unwrap();

    let series = [
        ((0.5, 0.5), [0.1, 0.1, 0.1, 0.1]),
        ((0.5, 1.5), [0.1, 0.1, 0.1, 0.2]),
        ((1.5, 0.5), [0.9, 0.9, 0.9, 0.9]),
        ((1.5, 1.5), [0.9, 0.9, 0.9, 0.8]),
    ];
    let mut cf = String::from("time,x,y,capacity factor\n");
    for t in 0..4 {
        for ((x, y), values) in &series {
            cf.push_str(&format!("2020-01-01T0{},{},{},{}\n", t, x, y, values[t]));
        }
    }
    std::fs::write(dir.join("cf.csv"), cf).unwrap();

    let regions = serde_json::json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:3035"}},
        "features": [
            {"type": "Feature", "properties": {"region_ids": "all"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]}}
        ]
    });
    std::fs::write(dir.join("regions.geojson"), regions.to_string()).unwrap();
}

fn read_zip_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_with_toml_config() {
    let temp_dir = TempDir::new().unwrap();
    write_inputs(temp_dir.path());

    let config = TomlConfig::from_toml_str(
        r#"
[pipeline]
name = "integration"

[source]
capacity_file = "cap.csv"
capacity_factor_file = "cf.csv"
regions_file = "regions.geojson"
dataset_crs = "EPSG:3035"

[representation]
n_time_series_per_region = 2
workers = 2

[typical_periods]
period_length = 2
n_typical_periods = 2

[load]
output_path = "out"
compression = { enabled = true, filename = "bundle.zip" }
"#,
    )
    .unwrap();

    let source = LocalStorage::new(temp_dir.path());
    let sink = LocalStorage::new(temp_dir.path().join("out"));
    let pipeline = RepresentationPipeline::new(source, sink, config).with_name("integration");
    let engine = RepresentationEngine::new_with_monitoring(pipeline, false);

    let output = engine.run().await.unwrap();
    assert_eq!(output, "out/bundle.zip");

    let zip_path = temp_dir.path().join("out").join("bundle.zip");
    assert!(zip_path.exists());
    let zip_data = std::fs::read(&zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 5);

    let capacities = read_zip_entry(&mut archive, "capacities.csv");
    assert_eq!(
        capacities,
        "region_id,ts_id,capacity\nall,TS_0,2\nall,TS_1,4\n"
    );

    let factors = read_zip_entry(&mut archive, "capacity_factors.csv");
    let last_step: Vec<&str> = factors
        .lines()
        .filter(|l| l.starts_with("2020-01-01T03"))
        .collect();
    assert_eq!(last_step.len(), 2);
    let dim: f64 = last_step[0].rsplit(',').next().unwrap().parse().unwrap();
    let bright: f64 = last_step[1].rsplit(',').next().unwrap().parse().unwrap();
    assert!((dim - 0.15).abs() < 1e-12);
    assert!((bright - 0.85).abs() < 1e-12);

    let order = read_zip_entry(&mut archive, "period_order.csv");
    assert_eq!(order.lines().count(), 3);

    let summary: serde_json::Value =
        serde_json::from_str(&read_zip_entry(&mut archive, "summary.json")).unwrap();
    assert_eq!(summary["pipeline"], "integration");
    assert_eq!(summary["regions"][0]["region_id"], "all");
    assert_eq!(summary["regions"][0]["eligible_cells"], 4);
    assert_eq!(summary["typical_periods"]["n_periods"], 2);
    // 週期數等於典型週期數時，重建不失真
    for entry in summary["accuracy"].as_array().unwrap() {
        assert_eq!(entry["rmse"].as_f64().unwrap(), 0.0);
    }
}

#[cfg(feature = "cli")]
#[tokio::test]
async fn test_end_to_end_with_cli_config_plain_files() {
    use clap::Parser;
    use re_represent::CliConfig;

    let temp_dir = TempDir::new().unwrap();
    write_inputs(temp_dir.path());
    let output_dir = temp_dir.path().join("plain");

    let config = CliConfig::try_parse_from([
        "re-represent",
        "--capacity-file",
        "cap.csv",
        "--capacity-factor-file",
        "cf.csv",
        "--regions-file",
        "regions.geojson",
        "--dataset-crs",
        "EPSG:3035",
        "--output-path",
        output_dir.to_str().unwrap(),
    ])
    .unwrap();

    let source = LocalStorage::new(temp_dir.path());
    let sink = LocalStorage::new(output_dir.clone());
    let pipeline = RepresentationPipeline::new(source, sink, config);
    let engine = RepresentationEngine::new(pipeline);

    let output = engine.run().await.unwrap();
    assert_eq!(output, output_dir.to_str().unwrap());

    let capacities = std::fs::read_to_string(output_dir.join("capacities.csv")).unwrap();
    assert_eq!(capacities, "region_id,ts_id,capacity\nall,,6\n");

    // (0.1*1 + 0.2*1 + 0.9*2 + 0.8*2) / 6
    let factors = std::fs::read_to_string(output_dir.join("capacity_factors.csv")).unwrap();
    let last: f64 = factors
        .lines()
        .last()
        .unwrap()
        .rsplit(',')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert!((last - 3.7 / 6.0).abs() < 1e-12);

    assert!(output_dir.join("summary.json").exists());
    assert!(!output_dir.join("typical_periods.csv").exists());
}

#[tokio::test]
async fn test_crs_mismatch_fails_the_run() {
    let temp_dir = TempDir::new().unwrap();
    write_inputs(temp_dir.path());

    let config = TomlConfig::from_toml_str(
        r#"
[pipeline]
name = "mismatch"

[source]
capacity_file = "cap.csv"
capacity_factor_file = "cf.csv"
regions_file = "regions.geojson"
dataset_crs = "EPSG:4326"

[load]
output_path = "out"
"#,
    )
    .unwrap();

    let source = LocalStorage::new(temp_dir.path());
    let sink = LocalStorage::new(temp_dir.path().join("out"));
    let engine = RepresentationEngine::new(RepresentationPipeline::new(source, sink, config));

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, re_represent::RepresentError::CrsMismatch { .. }));
    assert!(!temp_dir.path().join("out").exists());
}
