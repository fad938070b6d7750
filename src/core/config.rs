use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "config.yml";
const BASE_URL_ENV: &str = "BLOGSMITH_API_BASE_URL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default = "default_storage")]
    pub storage_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Page geometry is in PDF points, fragment width in CSS pixels.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_page_width")]
    pub page_width: f64,
    #[serde(default = "default_page_height")]
    pub page_height: f64,
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default = "default_fragment_width")]
    pub fragment_width: u32,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,
    #[serde(default = "default_summary_page_size")]
    pub summary_page_size: u32,
    #[serde(default = "default_image_timeout")]
    pub image_timeout_seconds: u64,
}

fn default_storage() -> String {
    ".blogsmith".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1:8001".to_string()
}
fn default_timeout() -> u64 {
    60
}
fn default_page_width() -> f64 {
    595.28
}
fn default_page_height() -> f64 {
    841.89
}
fn default_margin() -> f64 {
    28.35
}
fn default_fragment_width() -> u32 {
    800
}
fn default_pixel_ratio() -> f32 {
    2.0
}
fn default_summary_page_size() -> u32 {
    50
}
fn default_image_timeout() -> u64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage_folder: default_storage(),
            output_folder: default_output(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_width: default_page_width(),
            page_height: default_page_height(),
            margin: default_margin(),
            fragment_width: default_fragment_width(),
            pixel_ratio: default_pixel_ratio(),
            summary_page_size: default_summary_page_size(),
            image_timeout_seconds: default_image_timeout(),
        }
    }
}

impl ExportConfig {
    /// Width available to content once both side margins are removed.
    pub fn content_width(&self) -> f64 {
        self.page_width - self.margin * 2.0
    }

    pub fn page_body_height(&self) -> f64 {
        self.page_height - self.margin * 2.0
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl Config {
    /// Reads `config.yml` from the working directory. A missing file is not an
    /// error: every field has a default.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            log::info!("{} not found, using defaults", CONFIG_FILE);
            Config::default()
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url;
            }
        }
        config.api.base_url = normalize_base_url(&config.api.base_url);
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.api.base_url = normalize_base_url(&config.api.base_url);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(CONFIG_FILE, content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn exists() -> bool {
        Path::new(CONFIG_FILE).exists()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
