use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[api].base_url`.
pub const API_BASE_URL_ENV: &str = "PORTAL_API_BASE_URL";

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub data: DataConfig,
    pub map: MapConfig,
    pub upload: UploadConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: [u8; 4],
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: [127, 0, 0, 1],
            port: 3000,
            static_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Prefix joined with stored upload paths to build download links.
    pub files_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 15,
            files_base_url: "http://localhost:8000/storage".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding one `<layer-id>.geojson` file per layer.
    pub layer_dir: PathBuf,
    /// JSON array of points of interest; the built-in seed list is used when unset.
    pub points: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            layer_dir: PathBuf::from("data/layers"),
            points: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
    pub plain_tiles: TileSourceConfig,
    pub imagery_tiles: TileSourceConfig,
    pub label_tiles: TileSourceConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 15.4801,
            center_lng: 120.5979,
            zoom: 10,
            plain_tiles: TileSourceConfig {
                url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                attribution: "&copy; OpenStreetMap contributors".to_string(),
                opacity: 1.0,
            },
            imagery_tiles: TileSourceConfig {
                url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}".to_string(),
                attribution: "Tiles &copy; Esri".to_string(),
                opacity: 1.0,
            },
            label_tiles: TileSourceConfig {
                url: "https://stamen-tiles.a.ssl.fastly.net/toner-lines/{z}/{x}/{y}.png".to_string(),
                attribution: "Map tiles by Stamen Design".to_string(),
                opacity: 0.7,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, serde::Serialize)]
pub struct TileSourceConfig {
    pub url: String,
    pub attribution: String,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

fn full_opacity() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub page_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(API_BASE_URL_ENV) {
            self.api.base_url = base_url.trim_end_matches('/').to_string();
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.api.base_url = config.api.base_url.trim_end_matches('/').to_string();
        if config.dashboard.page_size == 0 {
            anyhow::bail!("dashboard.page_size must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.upload.max_bytes, 5_242_880);
        assert_eq!(config.dashboard.page_size, 5);
        assert_eq!(config.map.zoom, 10);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_api_base() {
        let config = AppConfig::from_toml(
            r#"
            [api]
            base_url = "https://portal.example.gov/api/"

            [server]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://portal.example.gov/api");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.api.timeout_secs, 15);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = AppConfig::from_toml("[dashboard]\npage_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn bundled_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
        let config = AppConfig::from_toml(&fs::read_to_string(path).unwrap()).unwrap();
        let defaults = MapConfig::default();
        assert_eq!(config.map.plain_tiles, defaults.plain_tiles);
        assert_eq!(config.map.label_tiles, defaults.label_tiles);
        assert_eq!(config.data.layer_dir, PathBuf::from("data/layers"));
        assert_eq!(config.server.static_dir, None);
    }
}
