//! camsource: discover, test and register physical cameras as input sources
//!
//! This crate drives the "create camera source" workflow of a vision
//! simulation host: it enumerates cameras, probes their resolutions in the
//! background, tests that the chosen camera opens and produces a frame, and
//! registers a configured camera source with the host.
//!
//! # Features
//! - Native camera discovery with an index-probing fallback
//! - Shared, write-once resolution cache with bounded waits
//! - Explicit test-and-create state machine, usable without a widget toolkit
//! - Deferred hardware access on the host's main-update cycle
//!
//! # Usage
//! In a Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(camsource::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! Headless, with your own host:
//! ```rust,ignore
//! use camsource::{CamSourceConfig, CameraEnumerator, CreateCameraSourceDialog, Host, ResolutionCache};
//!
//! let config = CamSourceConfig::load_or_default();
//! let (host, registry, main_update) = Host::in_process();
//! let enumerator = CameraEnumerator::system(&config.discovery);
//! let mut dialog =
//!     CreateCameraSourceDialog::show(host, ResolutionCache::global(), config, &enumerator).await;
//! dialog.press_action()?;
//! main_update.run_pending();
//! dialog.process_pending();
//! ```
pub mod commands;
pub mod config;
pub mod dialog;
pub mod discovery;
pub mod errors;
pub mod host;
pub mod platform;
pub mod resolution_cache;
pub mod source;
pub mod types;

// Testing utilities - scripted cameras for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::CamSourceConfig;
pub use dialog::{CreateCameraSourceDialog, DialogOutcome, DialogState, DialogView};
pub use discovery::{CameraEnumerator, Enumeration};
pub use errors::CameraError;
pub use host::{Host, InputSourceManager, InputSourceRegistry, MainUpdateHook, MainUpdateQueue};
pub use platform::{SharedWebcam, Webcam, WebcamDiscovery};
pub use resolution_cache::{ProbeWait, ResolutionCache};
pub use source::{CameraSource, SourceRequest};
pub use types::{CameraId, Frame, Resolution, WebcamDriver, WebcamRotation};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the camsource plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("camsource")
        .invoke_handler(tauri::generate_handler![
            // Discovery commands
            commands::init::get_available_cameras,
            commands::init::get_camera_resolutions,
            // Dialog commands
            commands::dialog::open_camera_source_dialog,
            commands::dialog::get_dialog_view,
            commands::dialog::select_dialog_camera,
            commands::dialog::select_dialog_resolution,
            commands::dialog::set_dialog_rotation,
            commands::dialog::set_dialog_source_name,
            commands::dialog::press_dialog_action,
            commands::dialog::wait_dialog_test,
            commands::dialog::wait_dialog_resolutions,
            commands::dialog::cancel_camera_source_dialog,
            commands::dialog::list_input_sources,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
            commands::config::get_discovery_config,
            commands::config::get_probing_config,
            commands::config::get_dialog_config,
            commands::config::update_discovery_config,
            commands::config::update_probing_config,
        ])
        .setup(|_app, _api| {
            commands::dialog::ensure_main_update_loop();
            Ok(())
        })
        .build()
}

/// Initialize logging for the camera system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camsource=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
