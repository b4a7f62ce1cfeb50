//! Projection of map data and toggle state into the plan the browser map draws.

use crate::config::{MapConfig, TileSourceConfig};
use crate::data::FeatureStore;
use crate::layers::LayerRegistry;
use crate::style::{marker_icon, MarkerIcon, PathStyle, StyleBook, StyleError};
use crate::visibility::{BaseLayer, HazardKind, VisibilityState};
use geojson::{Feature, FeatureCollection};
use serde::Serialize;

pub struct MapContext<'a> {
    pub store: &'a FeatureStore,
    pub registry: &'a LayerRegistry,
    pub styles: &'a StyleBook,
    pub map: &'a MapConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    pub center: LatLng,
    pub zoom: u8,
    pub base_layers: Vec<BaseLayerOption>,
    pub overlays: Vec<Overlay>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseLayerOption {
    pub id: BaseLayer,
    pub name: &'static str,
    pub selected: bool,
    /// Stacked bottom to top.
    pub tiles: Vec<TileSourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub key: String,
    pub name: String,
    pub features: Vec<StyledFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledFeature {
    pub feature: Feature,
    /// `None` draws with the map library's default style.
    pub style: Option<PathStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: u32,
    pub lat: f64,
    pub lng: f64,
    pub icon: MarkerIcon,
    pub popup: Popup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    pub kind: String,
}

impl RenderPlan {
    pub fn overlay(&self, key: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|overlay| overlay.key == key)
    }

    pub fn selected_base(&self) -> Option<BaseLayer> {
        self.base_layers.iter().find(|b| b.selected).map(|b| b.id)
    }
}

pub fn render(ctx: &MapContext<'_>, visibility: &VisibilityState) -> Result<RenderPlan, StyleError> {
    let mut overlays = Vec::new();

    for layer in visibility.active_layers(ctx.store) {
        let Some(collection) = ctx.store.collection(layer) else {
            continue;
        };
        let features = collection
            .features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                Ok(StyledFeature {
                    feature: feature.clone(),
                    style: ctx.styles.feature_style(layer, index, feature)?,
                })
            })
            .collect::<Result<Vec<_>, StyleError>>()?;

        overlays.push(Overlay {
            key: layer.to_string(),
            name: ctx.registry.name_of(layer),
            features,
        });
    }

    for kind in [HazardKind::Flood, HazardKind::Landslide] {
        if let Some(collection) = visibility.hazard_overlay(kind, ctx.store) {
            overlays.push(hazard_overlay(kind, collection, ctx.styles.hazard_style(kind)));
        }
    }

    let markers = visibility
        .visible_points(ctx.store.points())
        .into_iter()
        .map(|point| Marker {
            id: point.id,
            lat: point.lat,
            lng: point.lng,
            icon: marker_icon(point.kind),
            popup: Popup {
                title: point.title.clone(),
                kind: point.kind.humanized(),
            },
        })
        .collect();

    Ok(RenderPlan {
        center: LatLng {
            lat: ctx.map.center_lat,
            lng: ctx.map.center_lng,
        },
        zoom: ctx.map.zoom,
        base_layers: base_layers(ctx.map, visibility.base_layer()),
        overlays,
        markers,
    })
}

fn hazard_overlay(kind: HazardKind, collection: FeatureCollection, style: &PathStyle) -> Overlay {
    let (key, name) = match kind {
        HazardKind::Flood => ("flood-prone", "Flood Prone Areas"),
        HazardKind::Landslide => ("landslide-risk", "Landslide Risk"),
    };
    Overlay {
        key: key.to_string(),
        name: name.to_string(),
        features: collection
            .features
            .into_iter()
            .map(|feature| StyledFeature {
                feature,
                style: Some(style.clone()),
            })
            .collect(),
    }
}

fn base_layers(map: &MapConfig, selected: BaseLayer) -> Vec<BaseLayerOption> {
    vec![
        BaseLayerOption {
            id: BaseLayer::Plain,
            name: "Clean Map",
            selected: selected == BaseLayer::Plain,
            tiles: vec![map.plain_tiles.clone()],
        },
        BaseLayerOption {
            id: BaseLayer::SatelliteHybrid,
            name: "Satellite Hybrid",
            selected: selected == BaseLayer::SatelliteHybrid,
            tiles: vec![map.imagery_tiles.clone(), map.label_tiles.clone()],
        },
    ]
}
