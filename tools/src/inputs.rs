//! Loading a run's inputs from a data directory.
//!
//!   <data_dir>/sim_config.json       optional, defaults when absent
//!   <data_dir>/personas.json         required, array of persona profiles
//!   <data_dir>/product_catalog.json  required

use crate::catalog::CatalogAdapter;
use anyhow::{Context, Result};
use personasim_core::{config::SimConfig, persona::PersonaProfile};
use std::path::Path;

pub struct RunInputs {
    pub config:   SimConfig,
    pub personas: Vec<PersonaProfile>,
    pub adapter:  CatalogAdapter,
}

impl RunInputs {
    pub fn load(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);

        let config_path = dir.join("sim_config.json");
        let config = if config_path.exists() {
            SimConfig::load(&config_path.to_string_lossy())?
        } else {
            log::warn!("{} not found; using default config", config_path.display());
            SimConfig::default()
        };

        let personas = load_personas(&dir.join("personas.json"))?;
        let adapter = CatalogAdapter::load(&dir.join("product_catalog.json").to_string_lossy())?;

        log::info!(
            "loaded {} personas and {} catalog actions from {data_dir}",
            personas.len(),
            adapter.catalog().actions.len()
        );
        Ok(Self { config, personas, adapter })
    }
}

pub fn load_personas(path: &Path) -> Result<Vec<PersonaProfile>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Cannot parse {}", path.display()))
}
