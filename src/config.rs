use anyhow::{Context, Result};
use serde::Deserialize;
use skyforge_core::DEFAULT_TICK_DURATION_MS;
use skyforge_machines::DefinitionRegistry;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Wall-clock duration of one scheduler tick, in milliseconds.
    pub tick_duration_ms: u64,
    /// JSON document the machine definitions are loaded from.
    pub definitions_path: PathBuf,
    /// JSON file active machines are persisted to.
    pub data_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration_ms: DEFAULT_TICK_DURATION_MS,
            definitions_path: PathBuf::from("config/machines.json"),
            data_path: PathBuf::from("data/machines.json"),
        }
    }
}

impl ServerConfig {
    /// Load server configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Server config not found at {}. Using defaults",
                        path.display()
                    );
                }
                ServerConfig::default()
            }
        }
    }
}

/// Load the machine definition registry, falling back to the built-in set
/// when the file is missing, unreadable, or empty.
pub fn load_machine_registry(path: &Path) -> DefinitionRegistry {
    match load_registry_from_file(path) {
        Ok(registry) if !registry.is_empty() => registry,
        Ok(_) => {
            warn!(
                "No usable machine definitions in {}. Using built-in set",
                path.display()
            );
            default_registry()
        }
        Err(err) => {
            warn!(
                "Failed to load machine definitions {}: {err:#}. Using built-in set",
                path.display()
            );
            default_registry()
        }
    }
}

fn load_registry_from_file(path: &Path) -> Result<DefinitionRegistry> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let registry = DefinitionRegistry::load_from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(registry)
}

const DEFAULT_DEFINITIONS: &str = r#"[
    {"id": "basic_miner", "type": "basic_miner", "name": "Basic Miner",
     "block": "cobblestone", "base_interval": 40, "base_yield": 1},
    {"id": "wood_cutter", "type": "wood_cutter", "name": "Wood Cutter",
     "block": "oak_log", "base_interval": 60, "base_yield": 1},
    {"id": "crop_farm", "type": "crop_farm", "name": "Crop Farm",
     "block": "hay_block", "base_interval": 80, "base_yield": 2},
    {"id": "mob_grinder", "type": "mob_grinder", "name": "Mob Grinder",
     "block": "mossy_cobblestone", "base_interval": 100, "base_yield": 1},
    {"id": "sell_station", "type": "sell_station", "name": "Sell Station",
     "block": "emerald_block", "base_interval": 120, "base_yield": 1}
]"#;

fn default_registry() -> DefinitionRegistry {
    DefinitionRegistry::load_from_str(DEFAULT_DEFINITIONS).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tick_duration_ms, 50);
        assert_eq!(cfg.definitions_path, PathBuf::from("config/machines.json"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: ServerConfig = toml::from_str("tick_duration_ms = 25").unwrap();
        assert_eq!(cfg.tick_duration_ms, 25);
        assert_eq!(cfg.data_path, PathBuf::from("data/machines.json"));
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load_from_path(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.tick_duration_ms, 50);
    }

    #[test]
    fn built_in_registry_covers_every_kind() {
        let registry = default_registry();
        assert_eq!(registry.len(), 5);
        for id in [
            "basic_miner",
            "wood_cutter",
            "crop_farm",
            "mob_grinder",
            "sell_station",
        ] {
            assert!(registry.get(id).is_some(), "missing built-in {id}");
        }
    }

    #[test]
    fn missing_definitions_file_falls_back_to_built_ins() {
        let registry = load_machine_registry(Path::new("/definitely/not/here.json"));
        assert_eq!(registry.len(), 5);
    }
}
