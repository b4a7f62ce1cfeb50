//! Static descriptors for the thematic map layers and the downloadable dataset catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerId {
    ProvincialBoundary,
    MunicipalBoundaries,
    BarangayBoundaries,
    RoadNetwork,
    RiversWaterBodies,
    LandUse,
    ElevationTerrain,
    HazardMaps,
    PopulationDensity,
    PublicFacilities,
    SatelliteImagery,
    InfrastructureProjects,
    AgricultureLayers,
    BusinessEconomic,
    EnvironmentProtected,
    TourismMap,
    Transportation,
}

impl LayerId {
    pub const ALL: [LayerId; 17] = [
        LayerId::ProvincialBoundary,
        LayerId::MunicipalBoundaries,
        LayerId::BarangayBoundaries,
        LayerId::RoadNetwork,
        LayerId::RiversWaterBodies,
        LayerId::LandUse,
        LayerId::ElevationTerrain,
        LayerId::HazardMaps,
        LayerId::PopulationDensity,
        LayerId::PublicFacilities,
        LayerId::SatelliteImagery,
        LayerId::InfrastructureProjects,
        LayerId::AgricultureLayers,
        LayerId::BusinessEconomic,
        LayerId::EnvironmentProtected,
        LayerId::TourismMap,
        LayerId::Transportation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerId::ProvincialBoundary => "provincial-boundary",
            LayerId::MunicipalBoundaries => "municipal-boundaries",
            LayerId::BarangayBoundaries => "barangay-boundaries",
            LayerId::RoadNetwork => "road-network",
            LayerId::RiversWaterBodies => "rivers-water-bodies",
            LayerId::LandUse => "land-use",
            LayerId::ElevationTerrain => "elevation-terrain",
            LayerId::HazardMaps => "hazard-maps",
            LayerId::PopulationDensity => "population-density",
            LayerId::PublicFacilities => "public-facilities",
            LayerId::SatelliteImagery => "satellite-imagery",
            LayerId::InfrastructureProjects => "infrastructure-projects",
            LayerId::AgricultureLayers => "agriculture-layers",
            LayerId::BusinessEconomic => "business-economic",
            LayerId::EnvironmentProtected => "environment-protected",
            LayerId::TourismMap => "tourism-map",
            LayerId::Transportation => "transportation",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layer id: {0}")]
pub struct UnknownLayer(pub String);

impl FromStr for LayerId {
    type Err = UnknownLayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownLayer(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub id: LayerId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub dataset_keys: BTreeSet<String>,
    pub source: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GisDataset {
    pub id: String,
    pub name: String,
    pub format: String,
    pub size: String,
    pub description: String,
}

pub struct LayerRegistry {
    layers: Vec<LayerDescriptor>,
    datasets: Vec<GisDataset>,
}

fn descriptor(
    id: LayerId,
    name: &str,
    description: &str,
    category: &str,
    datasets: &[&str],
    source: &str,
    last_updated: &str,
) -> LayerDescriptor {
    LayerDescriptor {
        id,
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        dataset_keys: datasets.iter().map(|d| d.to_string()).collect(),
        source: source.to_string(),
        last_updated: last_updated.to_string(),
    }
}

fn dataset(id: &str, name: &str, size: &str, description: &str) -> GisDataset {
    GisDataset {
        id: id.to_string(),
        name: name.to_string(),
        format: "GeoJSON".to_string(),
        size: size.to_string(),
        description: description.to_string(),
    }
}

impl LayerRegistry {
    pub fn builtin() -> Self {
        use LayerId::*;
        let layers = vec![
            descriptor(
                ProvincialBoundary,
                "Provincial Boundary",
                "Outline of Tarlac Province - base layer for all other maps",
                "Administrative",
                &["provincial-boundary"],
                "PSA, NAMRIA, PhilGIS",
                "Dec 2025",
            ),
            descriptor(
                MunicipalBoundaries,
                "Municipal/City Boundaries",
                "17 municipalities + Tarlac City for local statistics breakdown",
                "Administrative",
                &["municipal-boundaries"],
                "PSA, NAMRIA, PhilGIS",
                "Dec 2025",
            ),
            descriptor(
                BarangayBoundaries,
                "Barangay Boundaries",
                "All barangays of Tarlac - useful for planning, demographics, disaster response",
                "Administrative",
                &["barangay-boundaries"],
                "PSA, NAMRIA, PhilGIS",
                "Dec 2025",
            ),
            descriptor(
                RoadNetwork,
                "Road Network",
                "National highways (SCTEX, MacArthur), provincial and municipal/barangay roads",
                "Infrastructure",
                &["national-highways", "provincial-roads", "municipal-roads"],
                "DPWH, OpenStreetMap",
                "Nov 2025",
            ),
            descriptor(
                RiversWaterBodies,
                "Rivers & Water Bodies",
                "Tarlac River, O'Donnell River, Sacobia River, dams, reservoirs",
                "Environment",
                &["rivers", "dams", "reservoirs"],
                "NAMRIA, Phivolcs",
                "Nov 2025",
            ),
            descriptor(
                LandUse,
                "Land Use Classification",
                "Agricultural areas, built-up zones, forest/LNIP, protected areas for planning and zoning",
                "Environment",
                &["land-classification", "forest-cover", "protected-areas"],
                "NAMRIA, DENR",
                "Sep 2025",
            ),
            descriptor(
                ElevationTerrain,
                "Elevation / Terrain / Slope (DEM)",
                "Terrain visualization showing lowlands vs mountains (Mt. Pinatubo, Bamban, Capas)",
                "Environment",
                &["dem-data", "slope-analysis"],
                "SRTM, NAMRIA",
                "Aug 2025",
            ),
            descriptor(
                HazardMaps,
                "Hazard Maps",
                "Flood susceptibility, landslide susceptibility, active faults, liquefaction",
                "Disaster Risk",
                &[
                    "flood-susceptibility",
                    "landslide-susceptibility",
                    "active-faults",
                    "liquefaction",
                ],
                "NAMRIA, Phivolcs, OCD",
                "Nov 2025",
            ),
            descriptor(
                PopulationDensity,
                "Population Density Heatmap",
                "PSA census distribution per barangay for health, education, disaster relief planning",
                "Demographics",
                &["population-census", "barangay-population"],
                "PSA",
                "Nov 2025",
            ),
            descriptor(
                PublicFacilities,
                "Public Facilities",
                "Schools, health centers, hospitals, police/fire stations, evacuation centers, govt offices",
                "Services",
                &["schools", "health-facilities", "emergency-services", "govt-offices"],
                "DepEd, DOH, Local Govt",
                "Dec 2025",
            ),
            descriptor(
                SatelliteImagery,
                "Satellite Imagery / Orthophotos",
                "High-resolution basemaps for visualization and planning",
                "Imagery",
                &["satellite-imagery", "orthophotos"],
                "Google, Mapbox, ESRI, Sentinel, NAMRIA",
                "Nov 2025",
            ),
            descriptor(
                InfrastructureProjects,
                "Infrastructure & Projects",
                "Provincial roads under repair, ongoing construction, completed projects, bidding status",
                "Infrastructure",
                &["construction-projects", "maintenance-status"],
                "DPWH, Local Govt, PMS",
                "Dec 2025",
            ),
            descriptor(
                AgricultureLayers,
                "Agriculture Data",
                "Crop distribution, irrigation networks, soil maps, farm-to-market roads",
                "Agriculture",
                &["crop-distribution", "irrigation-systems", "soil-maps"],
                "DA, LGU",
                "Oct 2025",
            ),
            descriptor(
                BusinessEconomic,
                "Business & Economic Activity",
                "Business establishments (DTI permits), industrial zones, commercial centers",
                "Economy",
                &["business-establishments", "industrial-zones", "commercial-centers"],
                "DTI, BIR",
                "Nov 2025",
            ),
            descriptor(
                EnvironmentProtected,
                "Environmental & Protected Areas",
                "Ancestral domains, watershed boundaries, reforestation zones, biodiversity areas",
                "Environment",
                &["ancestral-domains", "watersheds", "biodiversity-areas"],
                "DENR, NCIP",
                "Oct 2025",
            ),
            descriptor(
                TourismMap,
                "Tourism Attractions",
                "Tourist spots (Monasterio, Mt. Pinatubo jump-off), hotels, restaurants, tourist circuits",
                "Tourism",
                &["tourist-spots", "hotels", "restaurants", "tourist-circuits"],
                "Tourism Board, Local Govt",
                "Nov 2025",
            ),
            descriptor(
                Transportation,
                "Transportation Network",
                "Bus terminals, jeep/tricycle routes, SCTEX points, proposed transport lines",
                "Transportation",
                &["bus-terminals", "transport-routes", "sctex-points"],
                "LTFRB, DPWH",
                "Dec 2025",
            ),
        ];

        let datasets = vec![
            dataset(
                "barangay-boundaries-geojson",
                "Barangay Boundaries",
                "12 MB",
                "Official administrative boundaries of all barangays",
            ),
            dataset(
                "municipality-boundaries-geojson",
                "Municipality Boundaries",
                "3.2 MB",
                "Municipal boundaries with land area data",
            ),
            dataset(
                "road-network-geojson",
                "Road Network",
                "35 MB",
                "Complete road network with classification",
            ),
            dataset(
                "rivers-geojson",
                "Rivers & Water Bodies",
                "8.5 MB",
                "Major rivers, creeks, and water bodies",
            ),
            dataset(
                "schools-geojson",
                "School Locations",
                "1.2 MB",
                "Point data for all schools",
            ),
            dataset(
                "health-facilities-geojson",
                "Health Facilities",
                "800 KB",
                "Point data for health facilities",
            ),
        ];

        Self { layers, datasets }
    }

    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Display name of a layer, falling back to its id.
    pub fn name_of(&self, id: LayerId) -> String {
        self.get(id)
            .map(|layer| layer.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Layers whose category matches case-insensitively, in registry order.
    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a LayerDescriptor> {
        self.layers
            .iter()
            .filter(move |layer| layer.category.eq_ignore_ascii_case(category))
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.layers.iter().map(|layer| layer.category.as_str()).collect()
    }

    pub fn datasets(&self) -> &[GisDataset] {
        &self.datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_registry_describes_every_layer_once() {
        let registry = LayerRegistry::builtin();
        assert_eq!(registry.layers().len(), LayerId::ALL.len());
        for id in LayerId::ALL {
            assert!(registry.get(id).is_some(), "missing descriptor for {id}");
        }
    }

    #[test]
    fn layer_ids_round_trip_through_their_wire_names() {
        for id in LayerId::ALL {
            assert_eq!(id.as_str().parse::<LayerId>(), Ok(id));
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
        assert!("roads".parse::<LayerId>().is_err());
    }

    #[test]
    fn category_filter_is_case_insensitive() {
        let registry = LayerRegistry::builtin();
        let ids: Vec<LayerId> = registry.by_category("environment").map(|l| l.id).collect();
        assert_eq!(
            ids,
            vec![
                LayerId::RiversWaterBodies,
                LayerId::LandUse,
                LayerId::ElevationTerrain,
                LayerId::EnvironmentProtected,
            ]
        );
    }

    #[test]
    fn hazard_layer_lists_its_dataset_keys() {
        let registry = LayerRegistry::builtin();
        let hazard = registry.get(LayerId::HazardMaps).unwrap();
        assert!(hazard.dataset_keys.contains("flood-susceptibility"));
        assert_eq!(hazard.dataset_keys.len(), 4);
    }
}
