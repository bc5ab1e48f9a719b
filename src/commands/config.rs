use crate::config::{CamSourceConfig, DialogConfig, DiscoveryConfig, ProbingConfig};
use crate::resolution_cache::ResolutionCache;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<CamSourceConfig>> = Arc::new(RwLock::new(CamSourceConfig::load_or_default()));
}

/// Snapshot of the configuration the commands run with
pub fn current_config() -> CamSourceConfig {
    GLOBAL_CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// Validate `new_config`, make it current and resize the shared probe workers.
///
/// Discovery and dialog settings take effect with the next dialog.
fn apply_config(new_config: CamSourceConfig) -> Result<CamSourceConfig, String> {
    new_config.validate()?;

    let previous = {
        let mut config = GLOBAL_CONFIG
            .write()
            .map_err(|e| format!("Failed to write config: {}", e))?;
        std::mem::replace(&mut *config, new_config.clone())
    };

    let cache = ResolutionCache::global();
    if cache.workers() != new_config.probing.workers {
        cache.set_workers(new_config.probing.workers);
    }
    if previous.discovery != new_config.discovery {
        log::info!(
            "Discovery now prefers {} and probes {} indexes",
            new_config.discovery.preferred_driver.as_str(),
            new_config.discovery.max_probe_index
        );
    }
    Ok(new_config)
}

fn apply_and_save(new_config: CamSourceConfig) -> Result<CamSourceConfig, String> {
    let applied = apply_config(new_config)?;
    applied
        .save_to_file(CamSourceConfig::default_path())
        .map_err(|e| e.to_string())?;
    Ok(applied)
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<CamSourceConfig, String> {
    Ok(current_config())
}

/// Replace the whole configuration and persist it
#[command]
pub async fn update_config(new_config: CamSourceConfig) -> Result<(), String> {
    apply_and_save(new_config).map(|_| ())
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<CamSourceConfig, String> {
    apply_and_save(CamSourceConfig::default())
}

/// Get discovery configuration
#[command]
pub async fn get_discovery_config() -> Result<DiscoveryConfig, String> {
    Ok(current_config().discovery)
}

/// Get probing configuration
#[command]
pub async fn get_probing_config() -> Result<ProbingConfig, String> {
    Ok(current_config().probing)
}

/// Get dialog configuration
#[command]
pub async fn get_dialog_config() -> Result<DialogConfig, String> {
    Ok(current_config().dialog)
}

/// Update discovery configuration
#[command]
pub async fn update_discovery_config(discovery_config: DiscoveryConfig) -> Result<(), String> {
    let mut updated = current_config();
    updated.discovery = discovery_config;
    apply_and_save(updated).map(|_| ())
}

/// Update probing configuration; worker changes apply to probes already queued
#[command]
pub async fn update_probing_config(probing_config: ProbingConfig) -> Result<(), String> {
    let mut updated = current_config();
    updated.probing = probing_config;
    apply_and_save(updated).map(|_| ())
}
