use crate::domain::model::GriddedDataset;
use crate::domain::ports::ColumnNames;
use crate::utils::error::{RepresentError, Result};
use std::collections::HashMap;

const CAPACITY_SOURCE: &str = "capacity file";
const CAPACITY_FACTOR_SOURCE: &str = "capacity factor file";

fn column_index(headers: &csv::StringRecord, name: &str, source: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| RepresentError::input(source, format!("missing column '{}'", name)))
}

/// 空白欄位視為缺值
fn parse_value(record: &csv::StringRecord, index: usize, source: &str, line: usize) -> Result<f64> {
    let raw = record.get(index).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| {
        RepresentError::input(source, format!("line {}: '{}' is not a number", line, raw))
    })
}

fn parse_coordinate(
    record: &csv::StringRecord,
    index: usize,
    source: &str,
    line: usize,
) -> Result<f64> {
    let value = parse_value(record, index, source, line)?;
    if !value.is_finite() {
        return Err(RepresentError::input(
            source,
            format!("line {}: coordinate must be a finite number", line),
        ));
    }
    // -0.0 與 0.0 視為同一個座標
    Ok(value + 0.0)
}

struct AxisIndex {
    values: Vec<f64>,
    lookup: HashMap<u64, usize>,
}

impl AxisIndex {
    fn new(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        values.dedup();
        let lookup = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_bits(), i))
            .collect();
        Self { values, lookup }
    }

    fn get(&self, value: f64) -> usize {
        self.lookup[&value.to_bits()]
    }
}

/// Builds a dataset from a capacity CSV (`x,y,capacity`) and a long-format
/// capacity-factor CSV (`time,x,y,capacity factor`).
pub fn parse_gridded_dataset(
    capacity_csv: &[u8],
    capacity_factor_csv: &[u8],
    columns: &ColumnNames,
    crs: Option<String>,
) -> Result<GriddedDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(capacity_csv);
    let headers = reader.headers()?.clone();
    let x_col = column_index(&headers, &columns.longitude, CAPACITY_SOURCE)?;
    let y_col = column_index(&headers, &columns.latitude, CAPACITY_SOURCE)?;
    let cap_col = column_index(&headers, &columns.capacity, CAPACITY_SOURCE)?;

    let mut capacity_rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        capacity_rows.push((
            parse_coordinate(&record, x_col, CAPACITY_SOURCE, line)?,
            parse_coordinate(&record, y_col, CAPACITY_SOURCE, line)?,
            parse_value(&record, cap_col, CAPACITY_SOURCE, line)?,
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(capacity_factor_csv);
    let headers = reader.headers()?.clone();
    let t_col = column_index(&headers, &columns.time, CAPACITY_FACTOR_SOURCE)?;
    let x_col = column_index(&headers, &columns.longitude, CAPACITY_FACTOR_SOURCE)?;
    let y_col = column_index(&headers, &columns.latitude, CAPACITY_FACTOR_SOURCE)?;
    let cf_col = column_index(&headers, &columns.capacity_factor, CAPACITY_FACTOR_SOURCE)?;

    let mut time: Vec<String> = Vec::new();
    let mut time_lookup: HashMap<String, usize> = HashMap::new();
    let mut factor_rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let label = record.get(t_col).unwrap_or("").to_string();
        if label.is_empty() {
            return Err(RepresentError::input(
                CAPACITY_FACTOR_SOURCE,
                format!("line {}: empty time label", line),
            ));
        }
        let t = *time_lookup.entry(label.clone()).or_insert_with(|| {
            time.push(label);
            time.len() - 1
        });
        factor_rows.push((
            t,
            parse_coordinate(&record, x_col, CAPACITY_FACTOR_SOURCE, line)?,
            parse_coordinate(&record, y_col, CAPACITY_FACTOR_SOURCE, line)?,
            parse_value(&record, cf_col, CAPACITY_FACTOR_SOURCE, line)?,
        ));
    }

    if capacity_rows.is_empty() || factor_rows.is_empty() {
        return Err(RepresentError::input(
            CAPACITY_SOURCE,
            "gridded dataset contains no rows",
        ));
    }

    let xs = AxisIndex::new(
        capacity_rows
            .iter()
            .map(|r| r.0)
            .chain(factor_rows.iter().map(|r| r.1))
            .collect(),
    );
    let ys = AxisIndex::new(
        capacity_rows
            .iter()
            .map(|r| r.1)
            .chain(factor_rows.iter().map(|r| r.2))
            .collect(),
    );
    let ny = ys.values.len();
    let n_cells = xs.values.len() * ny;

    let mut capacity = vec![f64::NAN; n_cells];
    let mut filled = vec![false; n_cells];
    for &(x, y, value) in &capacity_rows {
        let cell = xs.get(x) * ny + ys.get(y);
        if std::mem::replace(&mut filled[cell], true) {
            return Err(RepresentError::input(
                CAPACITY_SOURCE,
                format!("duplicate cell ({}, {})", x, y),
            ));
        }
        capacity[cell] = value;
    }

    let mut capacity_factor = vec![vec![f64::NAN; n_cells]; time.len()];
    let mut filled = vec![vec![false; n_cells]; time.len()];
    for &(t, x, y, value) in &factor_rows {
        let cell = xs.get(x) * ny + ys.get(y);
        if std::mem::replace(&mut filled[t][cell], true) {
            return Err(RepresentError::input(
                CAPACITY_FACTOR_SOURCE,
                format!("duplicate entry for {} at ({}, {})", time[t], x, y),
            ));
        }
        capacity_factor[t][cell] = value;
    }

    tracing::debug!(
        "Loaded grid of {} x {} cells over {} time steps",
        xs.values.len(),
        ny,
        time.len()
    );

    Ok(GriddedDataset {
        crs,
        x: xs.values,
        y: ys.values,
        time,
        capacity,
        capacity_factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: &str = "x,y,capacity\n0,0,1.5\n1,0,2\n0,1,\n";
    const FACTORS: &str = "time,x,y,capacity factor\n\
        2020-01-01T00,0,0,0.1\n2020-01-01T00,1,0,0.2\n\
        2020-01-01T01,0,0,0.3\n2020-01-01T01,1,0,0.4\n";

    #[test]
    fn test_parse_builds_full_grid() {
        let dataset = parse_gridded_dataset(
            CAPACITY.as_bytes(),
            FACTORS.as_bytes(),
            &ColumnNames::default(),
            Some("EPSG:3035".to_string()),
        )
        .unwrap();

        assert_eq!(dataset.x, vec![0.0, 1.0]);
        assert_eq!(dataset.y, vec![0.0, 1.0]);
        assert_eq!(dataset.time, vec!["2020-01-01T00", "2020-01-01T01"]);
        assert_eq!(dataset.capacity[0], 1.5);
        assert!(dataset.capacity[1].is_nan());
        assert_eq!(dataset.capacity[2], 2.0);
        assert!(dataset.capacity[3].is_nan());
        assert_eq!(dataset.capacity_factor_series(2), vec![0.2, 0.4]);
        assert!(dataset.is_eligible(0));
        assert!(!dataset.is_eligible(1));
        assert!(!dataset.is_eligible(3));
    }

    #[test]
    fn test_custom_column_names() {
        let columns = ColumnNames {
            longitude: "lon".to_string(),
            latitude: "lat".to_string(),
            time: "hour".to_string(),
            capacity: "cap".to_string(),
            capacity_factor: "cf".to_string(),
            ..ColumnNames::default()
        };
        let dataset = parse_gridded_dataset(
            b"lon,lat,cap\n5,6,1\n",
            b"hour,lon,lat,cf\nh1,5,6,0.5\n",
            &columns,
            None,
        )
        .unwrap();
        assert_eq!(dataset.n_cells(), 1);
        assert_eq!(dataset.capacity_factor[0][0], 0.5);
    }

    #[test]
    fn test_malformed_inputs() {
        let columns = ColumnNames::default();
        let missing_column = parse_gridded_dataset(b"x,y\n0,0\n", FACTORS.as_bytes(), &columns, None);
        assert!(matches!(
            missing_column,
            Err(RepresentError::InputFormatError { .. })
        ));

        let not_a_number =
            parse_gridded_dataset(b"x,y,capacity\n0,0,abc\n", FACTORS.as_bytes(), &columns, None);
        assert!(not_a_number.is_err());

        let duplicate = parse_gridded_dataset(
            b"x,y,capacity\n0,0,1\n0,0,2\n",
            FACTORS.as_bytes(),
            &columns,
            None,
        );
        assert!(duplicate.is_err());

        let empty = parse_gridded_dataset(b"x,y,capacity\n", FACTORS.as_bytes(), &columns, None);
        assert!(empty.is_err());
    }

    #[test]
    fn test_duplicate_capacity_factor_entry() {
        let factors = format!("{}2020-01-01T01,1,0,0.5\n", FACTORS);
        let err = parse_gridded_dataset(
            CAPACITY.as_bytes(),
            factors.as_bytes(),
            &ColumnNames::default(),
            None,
        )
        .unwrap_err();
        match err {
            RepresentError::InputFormatError {
                source_name,
                message,
            } => {
                assert_eq!(source_name, CAPACITY_FACTOR_SOURCE);
                assert!(message.contains("duplicate entry for 2020-01-01T01"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
