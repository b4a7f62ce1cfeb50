//! Style rules for overlays and marker icons.
//!
//! Layers are either drawn with one static style or, for the road network, land
//! use and hazard layers, with a style looked up per feature from its
//! `properties.type`. The lookup tables are explicit: a feature whose type has
//! no rule is a data error reported by [`StyleBook::validate`], not a silent
//! fallback color.

use crate::data::FeatureStore;
use crate::layers::LayerId;
use crate::types::{feature_type, PoiType};
use crate::visibility::HazardKind;
use geojson::Feature;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

impl PathStyle {
    pub fn stroke(color: &str, weight: f32) -> Self {
        Self {
            color: Some(color.to_string()),
            weight: Some(weight),
            ..Self::default()
        }
    }

    pub fn outline(self) -> Self {
        Self {
            fill: Some(false),
            ..self
        }
    }

    pub fn dashed(self, pattern: &str) -> Self {
        Self {
            dash_array: Some(pattern.to_string()),
            ..self
        }
    }

    pub fn fill_opacity(self, opacity: f32) -> Self {
        Self {
            fill_opacity: Some(opacity),
            ..self
        }
    }

    pub fn fill_color(self, color: &str) -> Self {
        Self {
            fill_color: Some(color.to_string()),
            ..self
        }
    }

    fn colors(&self) -> impl Iterator<Item = &str> {
        self.color.iter().chain(self.fill_color.iter()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TypeRule {
    color: String,
    weight: Option<f32>,
}

/// Per-feature styling keyed by `properties.type`, layered over a base style.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    base: PathStyle,
    rules: BTreeMap<String, TypeRule>,
}

impl StyleTable {
    pub fn new(base: PathStyle) -> Self {
        Self {
            base,
            rules: BTreeMap::new(),
        }
    }

    pub fn rule(mut self, kind: &str, color: &str, weight: Option<f32>) -> Self {
        self.rules.insert(
            kind.to_string(),
            TypeRule {
                color: color.to_string(),
                weight,
            },
        );
        self
    }

    pub fn style_for(&self, kind: &str) -> Option<PathStyle> {
        let rule = self.rules.get(kind)?;
        let mut style = self.base.clone();
        style.color = Some(rule.color.clone());
        if let Some(weight) = rule.weight {
            style.weight = Some(weight);
        }
        Some(style)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerStyle {
    /// Drawn with the map library's default path style.
    Default,
    Static(PathStyle),
    ByType(StyleTable),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StyleError {
    #[error("layer {layer}: feature #{index} has no `type` property")]
    MissingType { layer: LayerId, index: usize },
    #[error("layer {layer}: feature #{index} has type {kind:?} with no style rule")]
    UnknownType {
        layer: LayerId,
        index: usize,
        kind: String,
    },
    #[error("{context}: invalid color {color:?}, expected #rrggbb")]
    InvalidColor { context: String, color: String },
}

static DEFAULT_STYLE: LayerStyle = LayerStyle::Default;

pub struct StyleBook {
    layers: HashMap<LayerId, LayerStyle>,
    flood: PathStyle,
    landslide: PathStyle,
}

impl StyleBook {
    pub fn builtin() -> Self {
        use LayerId::*;
        let mut layers = HashMap::new();

        layers.insert(ProvincialBoundary, LayerStyle::Static(PathStyle::stroke("#1f2937", 3.0).outline()));
        layers.insert(MunicipalBoundaries, LayerStyle::Static(PathStyle::stroke("#7c3aed", 2.0).outline()));
        layers.insert(
            BarangayBoundaries,
            LayerStyle::Static(PathStyle::stroke("#0ea5e9", 1.5).outline().dashed("5,5")),
        );
        layers.insert(
            RoadNetwork,
            LayerStyle::ByType(
                StyleTable::new(PathStyle::default())
                    .rule("national-highway", "#dc2626", Some(3.0))
                    .rule("provincial-road", "#f59e0b", Some(2.0))
                    .rule("municipal-road", "#64748b", Some(1.5)),
            ),
        );
        layers.insert(RiversWaterBodies, LayerStyle::Static(PathStyle::stroke("#06b6d4", 2.0)));
        layers.insert(
            LandUse,
            LayerStyle::ByType(
                StyleTable::new(PathStyle::default().fill_opacity(0.4))
                    .rule("agricultural", "#84cc16", None)
                    .rule("built-up", "#ef4444", None)
                    .rule("forest", "#059669", None),
            ),
        );
        layers.insert(ElevationTerrain, LayerStyle::Default);
        layers.insert(
            HazardMaps,
            LayerStyle::ByType(
                StyleTable::new(PathStyle {
                    weight: Some(2.0),
                    fill_opacity: Some(0.3),
                    ..PathStyle::default()
                })
                .rule("flood", "#3b82f6", None)
                .rule("landslide", "#f97316", None)
                .rule("fault", "#000000", None),
            ),
        );
        layers.insert(PopulationDensity, LayerStyle::Default);
        layers.insert(PublicFacilities, LayerStyle::Default);
        layers.insert(SatelliteImagery, LayerStyle::Default);
        layers.insert(InfrastructureProjects, LayerStyle::Static(PathStyle::stroke("#8b5cf6", 2.0)));
        layers.insert(
            AgricultureLayers,
            LayerStyle::Static(PathStyle::stroke("#84cc16", 2.0).fill_opacity(0.3)),
        );
        layers.insert(
            BusinessEconomic,
            LayerStyle::Static(PathStyle::stroke("#f59e0b", 2.0).fill_opacity(0.3)),
        );
        layers.insert(
            EnvironmentProtected,
            LayerStyle::Static(PathStyle::stroke("#10b981", 2.0).fill_opacity(0.25)),
        );
        layers.insert(TourismMap, LayerStyle::Static(PathStyle::stroke("#ec4899", 2.0)));
        layers.insert(Transportation, LayerStyle::Static(PathStyle::stroke("#0891b2", 2.5)));

        Self {
            layers,
            flood: PathStyle::stroke("#3b82f6", 1.5)
                .fill_color("#3b82f6")
                .fill_opacity(0.25),
            landslide: PathStyle::stroke("#ef4444", 1.5)
                .fill_color("#ef4444")
                .fill_opacity(0.25),
        }
    }

    pub fn layer_style(&self, layer: LayerId) -> &LayerStyle {
        self.layers.get(&layer).unwrap_or(&DEFAULT_STYLE)
    }

    pub fn hazard_style(&self, kind: HazardKind) -> &PathStyle {
        match kind {
            HazardKind::Flood => &self.flood,
            HazardKind::Landslide => &self.landslide,
        }
    }

    /// Style for one feature of `layer`, `index` being its position in the collection.
    pub fn feature_style(
        &self,
        layer: LayerId,
        index: usize,
        feature: &Feature,
    ) -> Result<Option<PathStyle>, StyleError> {
        match self.layer_style(layer) {
            LayerStyle::Default => Ok(None),
            LayerStyle::Static(style) => Ok(Some(style.clone())),
            LayerStyle::ByType(table) => {
                let kind = feature_type(feature).ok_or(StyleError::MissingType { layer, index })?;
                table
                    .style_for(kind)
                    .map(Some)
                    .ok_or_else(|| StyleError::UnknownType {
                        layer,
                        index,
                        kind: kind.to_string(),
                    })
            }
        }
    }

    /// Checks every color in the book and every feature of typed layers in `store`.
    pub fn validate(&self, store: &FeatureStore) -> Result<(), StyleError> {
        for (layer, style) in &self.layers {
            let context = format!("layer {layer}");
            match style {
                LayerStyle::Default => {}
                LayerStyle::Static(style) => check_colors(&context, style)?,
                LayerStyle::ByType(table) => {
                    check_colors(&context, &table.base)?;
                    for rule in table.rules.values() {
                        check_color(&context, &rule.color)?;
                    }
                }
            }
        }
        check_colors("flood overlay", &self.flood)?;
        check_colors("landslide overlay", &self.landslide)?;

        for layer in store.loaded_layers() {
            if !matches!(self.layer_style(layer), LayerStyle::ByType(_)) {
                continue;
            }
            if let Some(collection) = store.collection(layer) {
                for (index, feature) in collection.features.iter().enumerate() {
                    self.feature_style(layer, index, feature)?;
                }
            }
        }
        Ok(())
    }
}

fn check_colors(context: &str, style: &PathStyle) -> Result<(), StyleError> {
    style.colors().try_for_each(|color| check_color(context, color))
}

fn check_color(context: &str, color: &str) -> Result<(), StyleError> {
    match parse_hex_color(color) {
        Some(_) => Ok(()),
        None => Err(StyleError::InvalidColor {
            context: context.to_string(),
            color: color.to_string(),
        }),
    }
}

/// Parses `#rrggbb` into its channels.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerIcon {
    pub color: &'static str,
    pub icon_size: [i32; 2],
    pub icon_anchor: [i32; 2],
    pub popup_anchor: [i32; 2],
}

const fn pin(color: &'static str) -> MarkerIcon {
    MarkerIcon {
        color,
        icon_size: [25, 39],
        icon_anchor: [12, 39],
        popup_anchor: [0, -32],
    }
}

pub const SCHOOL_PIN: MarkerIcon = pin("#0049ff");
pub const HOSPITAL_PIN: MarkerIcon = pin("#ef4444");
pub const INFRASTRUCTURE_PIN: MarkerIcon = pin("#f59e0b");
pub const DEFAULT_PIN: MarkerIcon = pin("#824c31");

pub fn marker_icon(kind: PoiType) -> MarkerIcon {
    match kind {
        PoiType::School => SCHOOL_PIN,
        PoiType::Hospital => HOSPITAL_PIN,
        PoiType::Infrastructure => INFRASTRUCTURE_PIN,
        _ => DEFAULT_PIN,
    }
}
