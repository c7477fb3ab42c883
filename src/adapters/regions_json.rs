use crate::domain::model::{MultiPolygon, Polygon, RegionCollection, RegionShape};
use crate::utils::error::{RepresentError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

const SOURCE: &str = "regions file";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<NamedCrs>,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct NamedCrs {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Geometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

fn to_polygon(rings: Vec<Vec<[f64; 2]>>, region: &str) -> Result<Polygon> {
    let mut rings = rings.into_iter();
    let exterior = rings.next().ok_or_else(|| {
        RepresentError::input(SOURCE, format!("region '{}' has a polygon without rings", region))
    })?;
    Ok(Polygon {
        exterior,
        holes: rings.collect(),
    })
}

fn region_id(properties: &Map<String, Value>, index_col: &str, feature: usize) -> Result<String> {
    match properties.get(index_col) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(RepresentError::input(
            SOURCE,
            format!("feature {}: '{}' is not a string or number: {}", feature, index_col, other),
        )),
        None => Err(RepresentError::input(
            SOURCE,
            format!("feature {} has no property '{}'", feature, index_col),
        )),
    }
}

/// Parses a GeoJSON `FeatureCollection` of Polygon/MultiPolygon regions.
/// The region id is read from `properties[index_col]`.
pub fn parse_regions(data: &[u8], index_col: &str) -> Result<RegionCollection> {
    let collection: FeatureCollection = serde_json::from_slice(data)?;

    let regions = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            let id = region_id(&feature.properties, index_col, i)?;
            let polygons = match feature.geometry {
                Some(Geometry::Polygon(rings)) => vec![to_polygon(rings, &id)?],
                Some(Geometry::MultiPolygon(parts)) => parts
                    .into_iter()
                    .map(|rings| to_polygon(rings, &id))
                    .collect::<Result<Vec<_>>>()?,
                None => {
                    return Err(RepresentError::input(
                        SOURCE,
                        format!("region '{}' has no geometry", id),
                    ))
                }
            };
            Ok(RegionShape {
                id,
                geometry: MultiPolygon(polygons),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Loaded {} region shapes", regions.len());

    Ok(RegionCollection {
        crs: collection.crs.map(|c| c.properties.name),
        regions,
    })
}
