use crate::data::FeatureStore;
use crate::layers::LayerId;
use crate::types::{feature_type, PoiType, PointOfInterest};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    Flood,
    Landslide,
}

impl HazardKind {
    /// The `properties.type` value selected from the hazard collection.
    pub fn feature_type(&self) -> &'static str {
        match self {
            HazardKind::Flood => "flood",
            HazardKind::Landslide => "landslide",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseLayer {
    #[default]
    Plain,
    SatelliteHybrid,
}

/// Toggle state behind the map viewer. Every flag is independent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityState {
    base_layer: BaseLayer,
    layers: BTreeMap<LayerId, bool>,
    schools: bool,
    hospitals: bool,
    infrastructure: bool,
    flood_prone: bool,
    landslide: bool,
}

impl Default for VisibilityState {
    fn default() -> Self {
        use LayerId::*;
        let on = [
            ProvincialBoundary,
            MunicipalBoundaries,
            RoadNetwork,
            RiversWaterBodies,
            PublicFacilities,
        ];
        Self {
            base_layer: BaseLayer::Plain,
            layers: LayerId::ALL.into_iter().map(|id| (id, on.contains(&id))).collect(),
            schools: true,
            hospitals: true,
            infrastructure: true,
            flood_prone: false,
            landslide: false,
        }
    }
}

/// Marker families with their own toggle. Public facilities and tourism points
/// follow their layer flags instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointFilter {
    Schools,
    Hospitals,
    Infrastructure,
}

impl VisibilityState {
    /// Every flag off, plain base map.
    pub fn hidden() -> Self {
        Self {
            base_layer: BaseLayer::Plain,
            layers: LayerId::ALL.into_iter().map(|id| (id, false)).collect(),
            schools: false,
            hospitals: false,
            infrastructure: false,
            flood_prone: false,
            landslide: false,
        }
    }

    pub fn set_visible(&mut self, layer: LayerId, visible: bool) {
        self.layers.insert(layer, visible);
    }

    pub fn is_visible(&self, layer: LayerId) -> bool {
        self.layers.get(&layer).copied().unwrap_or(false)
    }

    pub fn base_layer(&self) -> BaseLayer {
        self.base_layer
    }

    pub fn set_base_layer(&mut self, base: BaseLayer) {
        self.base_layer = base;
    }

    pub fn set_point_filter(&mut self, filter: PointFilter, visible: bool) {
        match filter {
            PointFilter::Schools => self.schools = visible,
            PointFilter::Hospitals => self.hospitals = visible,
            PointFilter::Infrastructure => self.infrastructure = visible,
        }
    }

    pub fn point_filter(&self, filter: PointFilter) -> bool {
        match filter {
            PointFilter::Schools => self.schools,
            PointFilter::Hospitals => self.hospitals,
            PointFilter::Infrastructure => self.infrastructure,
        }
    }

    /// Sets schools, hospitals and infrastructure together.
    pub fn set_core_facilities(&mut self, visible: bool) {
        self.schools = visible;
        self.hospitals = visible;
        self.infrastructure = visible;
    }

    /// Checked only when all three core facility filters are on.
    pub fn core_facilities_checked(&self) -> bool {
        self.schools && self.hospitals && self.infrastructure
    }

    pub fn set_hazard_overlay(&mut self, kind: HazardKind, visible: bool) {
        match kind {
            HazardKind::Flood => self.flood_prone = visible,
            HazardKind::Landslide => self.landslide = visible,
        }
    }

    pub fn hazard_overlay_enabled(&self, kind: HazardKind) -> bool {
        match kind {
            HazardKind::Flood => self.flood_prone,
            HazardKind::Landslide => self.landslide,
        }
    }

    /// Layers that are switched on and have features to draw.
    pub fn active_layers(&self, store: &FeatureStore) -> BTreeSet<LayerId> {
        self.layers
            .iter()
            .filter(|(id, visible)| **visible && store.has_features(**id))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn point_visible(&self, kind: PoiType) -> bool {
        match kind {
            PoiType::School => self.schools,
            PoiType::Hospital => self.hospitals,
            PoiType::Infrastructure => self.infrastructure,
            PoiType::Police | PoiType::Fire | PoiType::Government => {
                self.is_visible(LayerId::PublicFacilities)
            }
            PoiType::Hotel | PoiType::Restaurant | PoiType::TouristSpot => {
                self.is_visible(LayerId::TourismMap)
            }
        }
    }

    pub fn visible_points<'a>(&self, points: &'a [PointOfInterest]) -> Vec<&'a PointOfInterest> {
        points.iter().filter(|p| self.point_visible(p.kind)).collect()
    }

    /// The hazard sub-collection for an enabled overlay, if it has any features.
    pub fn hazard_overlay(&self, kind: HazardKind, store: &FeatureStore) -> Option<FeatureCollection> {
        if !self.hazard_overlay_enabled(kind) {
            return None;
        }
        split_hazard(store, kind)
    }

    pub fn apply(&mut self, patch: &VisibilityPatch) {
        if let Some(base) = patch.base_layer {
            self.set_base_layer(base);
        }
        if let Some(visible) = patch.core_facilities {
            self.set_core_facilities(visible);
        }
        for (layer, visible) in &patch.layers {
            self.set_visible(*layer, *visible);
        }
        for (filter, visible) in &patch.points {
            self.set_point_filter(*filter, *visible);
        }
        for (kind, visible) in &patch.hazards {
            self.set_hazard_overlay(*kind, *visible);
        }
    }
}

/// Hazard features whose `properties.type` matches `kind`, or `None` when there are none.
pub fn split_hazard(store: &FeatureStore, kind: HazardKind) -> Option<FeatureCollection> {
    let hazards = store.collection(LayerId::HazardMaps)?;
    let features: Vec<_> = hazards
        .features
        .iter()
        .filter(|feature| feature_type(feature) == Some(kind.feature_type()))
        .cloned()
        .collect();
    if features.is_empty() {
        return None;
    }
    Some(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// A set of toggles applied over the current state. Aggregate toggles are
/// applied before individual ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisibilityPatch {
    pub base_layer: Option<BaseLayer>,
    pub core_facilities: Option<bool>,
    pub layers: BTreeMap<LayerId, bool>,
    pub points: BTreeMap<PointFilter, bool>,
    pub hazards: BTreeMap<HazardKind, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::*;
    use crate::types::seed_points;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> FeatureStore {
        let roads = collection(json!({
            "type": "FeatureCollection",
            "features": [typed_line("national-highway")]
        }));
        let empty = collection(json!({ "type": "FeatureCollection", "features": [] }));
        FeatureStore::new(seed_points())
            .with_collection(LayerId::RoadNetwork, roads)
            .with_collection(LayerId::HazardMaps, hazard_collection())
            .with_collection(LayerId::Transportation, empty)
    }

    #[test]
    fn active_layers_require_flag_and_features() {
        let store = store();
        let mut state = VisibilityState::hidden();
        assert!(state.active_layers(&store).is_empty());

        state.set_visible(LayerId::RoadNetwork, true);
        state.set_visible(LayerId::Transportation, true);
        state.set_visible(LayerId::LandUse, true);
        assert_eq!(
            state.active_layers(&store),
            BTreeSet::from([LayerId::RoadNetwork])
        );

        state.set_visible(LayerId::HazardMaps, true);
        state.set_visible(LayerId::RoadNetwork, false);
        assert_eq!(state.active_layers(&store), BTreeSet::from([LayerId::HazardMaps]));
    }

    #[test]
    fn unrelated_toggles_leave_other_point_types_alone() {
        let mut state = VisibilityState::default();
        let before: Vec<bool> = PoiType::ALL.iter().map(|k| state.point_visible(*k)).collect();

        state.set_visible(LayerId::TourismMap, true);
        for (kind, was) in PoiType::ALL.iter().zip(&before) {
            let tourism = matches!(kind, PoiType::Hotel | PoiType::Restaurant | PoiType::TouristSpot);
            if tourism {
                assert!(state.point_visible(*kind));
            } else {
                assert_eq!(state.point_visible(*kind), *was, "{kind} changed");
            }
        }

        state.set_point_filter(PointFilter::Hospitals, false);
        assert!(!state.point_visible(PoiType::Hospital));
        assert!(state.point_visible(PoiType::School));
        assert!(state.point_visible(PoiType::Police));
    }

    #[test]
    fn public_facility_points_follow_the_layer_flag() {
        let mut state = VisibilityState::hidden();
        assert!(!state.point_visible(PoiType::Fire));
        state.set_visible(LayerId::PublicFacilities, true);
        for kind in [PoiType::Police, PoiType::Fire, PoiType::Government] {
            assert!(state.point_visible(kind));
        }
        assert!(!state.point_visible(PoiType::School));
    }

    #[test]
    fn core_facility_toggle_sets_all_three() {
        let mut state = VisibilityState::hidden();
        assert!(!state.core_facilities_checked());

        state.set_core_facilities(true);
        assert!(state.core_facilities_checked());

        state.set_point_filter(PointFilter::Infrastructure, false);
        assert!(!state.core_facilities_checked());
        assert!(state.point_filter(PointFilter::Schools));

        state.set_core_facilities(false);
        assert!(!state.point_filter(PointFilter::Schools));
        assert!(!state.point_filter(PointFilter::Hospitals));
    }

    #[test]
    fn flood_overlay_renders_only_flood_features() {
        let store = store();
        let mut state = VisibilityState::hidden();
        assert_eq!(state.hazard_overlay(HazardKind::Flood, &store), None);

        state.set_hazard_overlay(HazardKind::Flood, true);
        let flood = state.hazard_overlay(HazardKind::Flood, &store).unwrap();
        assert_eq!(flood.features.len(), 2);
        assert!(flood.features.iter().all(|f| feature_type(f) == Some("flood")));
        assert_eq!(state.hazard_overlay(HazardKind::Landslide, &store), None);
        assert!(!state.is_visible(LayerId::HazardMaps));
    }

    #[test]
    fn overlay_without_matching_features_renders_nothing() {
        let store = FeatureStore::new(vec![]).with_collection(
            LayerId::HazardMaps,
            collection(json!({ "type": "FeatureCollection", "features": [typed_line("fault")] })),
        );
        let mut state = VisibilityState::hidden();
        state.set_hazard_overlay(HazardKind::Landslide, true);
        assert_eq!(state.hazard_overlay(HazardKind::Landslide, &store), None);
    }

    #[test]
    fn visible_points_filters_the_seed_list() {
        let points = seed_points();
        let mut state = VisibilityState::hidden();
        state.set_point_filter(PointFilter::Schools, true);
        let titles: Vec<&str> = state
            .visible_points(&points)
            .into_iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec![
                "Tarlac National High School",
                "Camiling Elementary School",
                "Concepcion High School",
            ]
        );
    }

    #[test]
    fn patch_applies_aggregate_before_individual_toggles() {
        let patch: VisibilityPatch = serde_json::from_value(json!({
            "base_layer": "satellite_hybrid",
            "core_facilities": true,
            "layers": { "land-use": true, "road-network": false },
            "points": { "hospitals": false },
            "hazards": { "landslide": true }
        }))
        .unwrap();

        let mut state = VisibilityState::hidden();
        state.apply(&patch);
        assert_eq!(state.base_layer(), BaseLayer::SatelliteHybrid);
        assert!(state.point_filter(PointFilter::Schools));
        assert!(!state.point_filter(PointFilter::Hospitals));
        assert!(state.is_visible(LayerId::LandUse));
        assert!(!state.is_visible(LayerId::RoadNetwork));
        assert!(state.hazard_overlay_enabled(HazardKind::Landslide));
        assert!(!state.hazard_overlay_enabled(HazardKind::Flood));
    }

    #[test]
    fn patch_rejects_unknown_layers() {
        let result: Result<VisibilityPatch, _> =
            serde_json::from_value(json!({ "layers": { "roads": true } }));
        assert!(result.is_err());
    }
}
