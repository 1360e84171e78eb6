use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Which critique field this deployment collects on the add-book form.
/// A deployment-time choice: every record in one installation uses the same
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueMode {
    #[default]
    Review,
    Rating,
}

impl CritiqueMode {
    pub fn field_label(&self) -> &'static str {
        match self {
            CritiqueMode::Review => "Review",
            CritiqueMode::Rating => "Rating (0-5)",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub critique_mode: Option<CritiqueMode>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn critique_mode(&self) -> CritiqueMode {
        self.critique_mode.unwrap_or_default()
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("lia").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::new();
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(config.critique_mode(), CritiqueMode::Review);
    }

    #[test]
    fn config_file_fields_are_lowercase() {
        let config: Config = serde_json::from_str(
            r#"{"backend_url": "http://10.0.0.5:8000", "critique_mode": "rating"}"#,
        )
        .unwrap();
        assert_eq!(config.backend_url(), "http://10.0.0.5:8000");
        assert_eq!(config.critique_mode(), CritiqueMode::Rating);
    }
}
