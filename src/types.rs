use geojson::Feature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a point of interest shown as a map marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiType {
    School,
    Hospital,
    Infrastructure,
    Police,
    Fire,
    Government,
    Hotel,
    Restaurant,
    TouristSpot,
}

impl PoiType {
    pub const ALL: [PoiType; 9] = [
        PoiType::School,
        PoiType::Hospital,
        PoiType::Infrastructure,
        PoiType::Police,
        PoiType::Fire,
        PoiType::Government,
        PoiType::Hotel,
        PoiType::Restaurant,
        PoiType::TouristSpot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoiType::School => "school",
            PoiType::Hospital => "hospital",
            PoiType::Infrastructure => "infrastructure",
            PoiType::Police => "police",
            PoiType::Fire => "fire",
            PoiType::Government => "government",
            PoiType::Hotel => "hotel",
            PoiType::Restaurant => "restaurant",
            PoiType::TouristSpot => "tourist_spot",
        }
    }

    /// Display form used in marker popups: underscores become spaces.
    pub fn humanized(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for PoiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: u32,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PoiType,
}

impl PointOfInterest {
    fn seed(id: u32, lat: f64, lng: f64, title: &str, kind: PoiType) -> Self {
        Self {
            id,
            lat,
            lng,
            title: title.to_string(),
            kind,
        }
    }
}

/// Points shown when no points file is configured.
pub fn seed_points() -> Vec<PointOfInterest> {
    use PoiType::*;
    vec![
        PointOfInterest::seed(1, 15.482, 120.598, "Tarlac National High School", School),
        PointOfInterest::seed(2, 15.489, 120.603, "Central Luzon State Hospital", Hospital),
        PointOfInterest::seed(3, 15.464, 120.587, "Camiling Elementary School", School),
        PointOfInterest::seed(4, 15.459, 120.612, "Tarlac Provincial Hospital", Hospital),
        PointOfInterest::seed(5, 15.505, 120.595, "Concepcion High School", School),
        PointOfInterest::seed(6, 15.475, 120.605, "Tarlac City Hall", Government),
        PointOfInterest::seed(7, 15.490, 120.590, "Provincial Capitol", Infrastructure),
        PointOfInterest::seed(8, 15.470, 120.600, "Central Bus Terminal", Infrastructure),
        PointOfInterest::seed(9, 15.600, 120.485, "Police Station 1", Police),
        PointOfInterest::seed(10, 15.592, 120.478, "Fire Station Main", Fire),
        PointOfInterest::seed(11, 15.587, 120.512, "Monasterio de Tarlac", TouristSpot),
        PointOfInterest::seed(12, 15.600, 120.488, "Tarlac Hotel & Resort", Hotel),
    ]
}

/// The `properties.type` string of a feature, if it has one.
pub fn feature_type(feature: &Feature) -> Option<&str> {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get("type"))
        .and_then(|value| value.as_str())
}
