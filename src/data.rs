use crate::config::DataConfig;
use crate::layers::LayerId;
use crate::types::{seed_points, PointOfInterest};
use anyhow::{anyhow, Context, Result};
use geo::bounding_rect::BoundingRect;
use geo::{Geometry, GeometryCollection};
use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Static GeoJSON collections keyed by layer, plus the point-of-interest list.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    collections: HashMap<LayerId, FeatureCollection>,
    points: Vec<PointOfInterest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl FeatureStore {
    pub fn new(points: Vec<PointOfInterest>) -> Self {
        Self {
            collections: HashMap::new(),
            points,
        }
    }

    pub fn with_collection(mut self, id: LayerId, collection: FeatureCollection) -> Self {
        self.insert(id, collection);
        self
    }

    pub fn insert(&mut self, id: LayerId, collection: FeatureCollection) {
        self.collections.insert(id, collection);
    }

    pub fn collection(&self, id: LayerId) -> Option<&FeatureCollection> {
        self.collections.get(&id)
    }

    /// True when the layer has a collection with at least one feature.
    pub fn has_features(&self, id: LayerId) -> bool {
        self.collection(id)
            .map(|fc| !fc.features.is_empty())
            .unwrap_or(false)
    }

    pub fn loaded_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.collections.keys().copied()
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    /// Bounding box over every convertible geometry of a layer.
    pub fn extent(&self, id: LayerId) -> Option<Extent> {
        let collection = self.collection(id)?;
        let geometries: Vec<Geometry<f64>> = collection
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .filter_map(|geometry| Geometry::<f64>::try_from(geometry.value.clone()).ok())
            .collect();

        let rect = GeometryCollection(geometries).bounding_rect()?;
        Some(Extent {
            min_lng: rect.min().x,
            min_lat: rect.min().y,
            max_lng: rect.max().x,
            max_lat: rect.max().y,
        })
    }
}

pub fn load_store(config: &DataConfig) -> Result<FeatureStore> {
    info!("Loading map data from {:?}...", config.layer_dir);

    let points = match &config.points {
        Some(path) => load_points(path)?,
        None => seed_points(),
    };
    let mut store = FeatureStore::new(points);

    if !config.layer_dir.is_dir() {
        warn!(
            "Layer directory {:?} does not exist; map layers will be empty",
            config.layer_dir
        );
        return Ok(store);
    }

    for id in LayerId::ALL {
        let path = config.layer_dir.join(format!("{id}.geojson"));
        if !path.exists() {
            debug!("No GeoJSON for layer {id}");
            continue;
        }
        let collection = load_collection(&path)?;
        debug!("Loaded {} features for layer {id}", collection.features.len());
        store.insert(id, collection);
    }

    info!(
        "Loaded {} layer collections and {} points",
        store.collections.len(),
        store.points.len()
    );
    Ok(store)
}

pub fn load_collection(path: &Path) -> Result<FeatureCollection> {
    let file = File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader)
        .with_context(|| format!("Failed to parse GeoJSON: {:?}", path))?;

    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(anyhow!("GeoJSON must be a FeatureCollection: {:?}", path)),
    }
}

fn load_points(path: &Path) -> Result<Vec<PointOfInterest>> {
    let file = File::open(path).with_context(|| format!("Failed to open points file: {:?}", path))?;
    let points: Vec<PointOfInterest> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse points file: {:?}", path))?;
    Ok(points)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use geojson::FeatureCollection;
    use serde_json::json;

    pub fn collection(value: serde_json::Value) -> FeatureCollection {
        serde_json::from_value(value).expect("valid feature collection")
    }

    pub fn typed_polygon(kind: &str) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": { "name": format!("{kind} zone"), "type": kind },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[120.5, 15.4], [120.6, 15.4], [120.6, 15.5], [120.5, 15.4]]]
            }
        })
    }

    pub fn typed_line(kind: &str) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": { "name": format!("{kind} line"), "type": kind },
            "geometry": { "type": "LineString", "coordinates": [[120.45, 15.5], [120.75, 15.5]] }
        })
    }

    /// Two flood polygons, one landslide polygon and one fault line.
    pub fn hazard_collection() -> FeatureCollection {
        collection(json!({
            "type": "FeatureCollection",
            "features": [
                typed_polygon("flood"),
                typed_polygon("landslide"),
                typed_polygon("flood"),
                typed_line("fault"),
            ]
        }))
    }
}
