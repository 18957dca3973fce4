//! Configuration file support for Lift.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/lift/config.toml`.

use crate::{Barbell, Error, Plate, Result, WeightUnit};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub equipment: EquipmentConfig,

    #[serde(default)]
    pub workout: WorkoutConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Bars and plates available in the gym
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EquipmentConfig {
    #[serde(default)]
    pub unit: WeightUnit,

    #[serde(default = "default_barbells")]
    pub barbells: Vec<Barbell>,

    #[serde(default = "default_plates")]
    pub plates: Vec<Plate>,
}

impl Default for EquipmentConfig {
    fn default() -> Self {
        Self {
            unit: WeightUnit::default(),
            barbells: default_barbells(),
            plates: default_plates(),
        }
    }
}

impl EquipmentConfig {
    /// The bar marked as default, else the first one listed
    pub fn default_barbell(&self) -> Option<&Barbell> {
        self.barbells
            .iter()
            .find(|b| b.is_default)
            .or_else(|| self.barbells.first())
    }

    /// Look up a bar by name, ignoring case
    pub fn barbell(&self, name: &str) -> Option<&Barbell> {
        self.barbells
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// In-workout adjustment steps
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutConfig {
    #[serde(default = "default_rest_extend_seconds")]
    pub rest_extend_seconds: i64,

    #[serde(default = "default_weight_step")]
    pub weight_step: f64,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            rest_extend_seconds: default_rest_extend_seconds(),
            weight_step: default_weight_step(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lift")
}

fn default_barbells() -> Vec<Barbell> {
    vec![Barbell {
        name: "Olympic Barbell".into(),
        weight: 45.0,
        unit: WeightUnit::Lb,
        is_default: true,
    }]
}

fn default_plates() -> Vec<Plate> {
    vec![
        Plate::new(45.0, 4, "blue"),
        Plate::new(35.0, 2, "yellow"),
        Plate::new(25.0, 2, "green"),
        Plate::new(10.0, 4, "white"),
        Plate::new(5.0, 4, "red"),
        Plate::new(2.5, 4, "gray"),
    ]
}

fn default_rest_extend_seconds() -> i64 {
    30
}

fn default_weight_step() -> f64 {
    5.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lift")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(bar) = self.equipment.barbells.iter().find(|b| b.weight < 0.0) {
            return Err(Error::Config(format!(
                "Barbell '{}' has negative weight",
                bar.name
            )));
        }
        if self.equipment.plates.iter().any(|p| p.weight <= 0.0) {
            return Err(Error::Config("Plate weights must be positive".into()));
        }
        if self.workout.weight_step <= 0.0 {
            return Err(Error::Config("weight_step must be positive".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
