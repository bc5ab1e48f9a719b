use crate::commands::config::current_config;
use crate::dialog::{CreateCameraSourceDialog, DialogState, DialogView};
use crate::discovery::CameraEnumerator;
use crate::host::{Host, InputSourceManager, MainUpdateQueue, RegisteredSource};
use crate::resolution_cache::ResolutionCache;
use crate::types::WebcamRotation;
use std::sync::{Arc, Once};
use std::time::Duration;
use tauri::command;
use tokio::sync::Mutex;

/// Interval of the plugin's main-update cycle
pub const MAIN_UPDATE_INTERVAL: Duration = Duration::from_millis(16);

/// Host state owned by the plugin
pub struct PluginHost {
    pub host: Host,
    pub registry: Arc<InputSourceManager>,
    pub main_update: Arc<MainUpdateQueue>,
}

lazy_static::lazy_static! {
    static ref GLOBAL_HOST: PluginHost = {
        let (host, registry, main_update) = Host::in_process();
        PluginHost { host, registry, main_update }
    };
    static ref GLOBAL_DIALOG: Arc<Mutex<Option<CreateCameraSourceDialog>>> = Arc::new(Mutex::new(None));
}

static MAIN_UPDATE_LOOP: Once = Once::new();

/// Host shared by every command
pub fn plugin_host() -> &'static PluginHost {
    &GLOBAL_HOST
}

/// Start the thread that drives the plugin's main-update cycle
pub fn ensure_main_update_loop() {
    MAIN_UPDATE_LOOP.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name("camsource-main-update".to_string())
            .spawn(|| loop {
                let ran = GLOBAL_HOST.main_update.run_pending();
                if ran > 0 {
                    log::debug!("Main update ran {} tasks", ran);
                }
                std::thread::sleep(MAIN_UPDATE_INTERVAL);
            });

        match spawned {
            Ok(_) => log::info!("Main update loop started"),
            Err(e) => log::error!("Failed to start main update loop: {}", e),
        }
    });
}

/// Open the create-camera-source dialog, replacing any previous one
#[command]
pub async fn open_camera_source_dialog() -> Result<DialogView, String> {
    ensure_main_update_loop();
    let config = current_config();
    let host = GLOBAL_HOST.host.clone();

    let opened = tokio::task::spawn_blocking(move || {
        let enumerator = CameraEnumerator::system(&config.discovery);
        CreateCameraSourceDialog::open(host, ResolutionCache::global(), config, &enumerator)
    })
    .await
    .map_err(|e| format!("Failed to open camera source dialog: {}", e))?;

    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.insert(opened);

    if !dialog.camera_labels().is_empty() {
        dialog
            .select_camera(0)
            .map_err(|e| format!("Failed to select camera: {}", e))?;
    }

    log::info!("Camera source dialog opened in state {:?}", dialog.state());
    Ok(dialog.view())
}

/// Current dialog view, after applying finished camera tests
#[command]
pub async fn get_dialog_view() -> Result<DialogView, String> {
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog.process_pending();
    Ok(dialog.view())
}

/// Select a camera by its position in the camera list.
///
/// Returns while resolutions may still be loading; poll `get_dialog_view` for the result.
#[command]
pub async fn select_dialog_camera(index: usize) -> Result<DialogView, String> {
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog
        .select_camera(index)
        .map_err(|e| format!("Failed to select camera: {}", e))?;
    Ok(dialog.view())
}

/// Select a resolution by its position in the dimension list
#[command]
pub async fn select_dialog_resolution(index: usize) -> Result<DialogView, String> {
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog
        .select_resolution(index)
        .map_err(|e| format!("Failed to select resolution: {}", e))?;
    Ok(dialog.view())
}

/// Set the rotation by display name or short form ("cw", "180", ...)
#[command]
pub async fn set_dialog_rotation(rotation: String) -> Result<DialogView, String> {
    let rotation: WebcamRotation = rotation.parse().map_err(|e| format!("{}", e))?;
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog
        .set_rotation(rotation)
        .map_err(|e| format!("Failed to set rotation: {}", e))?;
    Ok(dialog.view())
}

/// Replace the source name text
#[command]
pub async fn set_dialog_source_name(name: String) -> Result<DialogView, String> {
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog
        .set_name(&name)
        .map_err(|e| format!("Failed to set source name: {}", e))?;
    Ok(dialog.view())
}

/// Press the Test / Create button
#[command]
pub async fn press_dialog_action() -> Result<DialogView, String> {
    ensure_main_update_loop();
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog
        .press_action()
        .map_err(|e| format!("Failed to press action: {}", e))?;
    Ok(dialog.view())
}

/// Poll the dialog until `done` holds or `timeout` passes.
///
/// The dialog lock is released between polls so views and cancellation go through.
async fn poll_dialog<F>(timeout: Duration, done: F) -> Result<DialogView, String>
where
    F: Fn(&CreateCameraSourceDialog) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        {
            let mut guard = GLOBAL_DIALOG.lock().await;
            let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
            dialog.process_pending();
            if dialog.is_closed() || done(dialog) || tokio::time::Instant::now() >= deadline {
                log::debug!("Dialog wait finished in state {:?}", dialog.state());
                return Ok(dialog.view());
            }
        }
        tokio::time::sleep(MAIN_UPDATE_INTERVAL).await;
    }
}

/// Wait for an outstanding camera test, up to the configured test timeout
#[command]
pub async fn wait_dialog_test(timeout_ms: Option<u64>) -> Result<DialogView, String> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| current_config().probing.test_timeout());
    poll_dialog(timeout, |dialog| dialog.state() != DialogState::ClickedTest).await
}

/// Wait for the selected camera's resolutions, up to the configured resolution timeout
#[command]
pub async fn wait_dialog_resolutions(timeout_ms: Option<u64>) -> Result<DialogView, String> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| current_config().probing.resolution_timeout());
    poll_dialog(timeout, |dialog| !dialog.is_loading()).await
}

/// Close the dialog without creating a source
#[command]
pub async fn cancel_camera_source_dialog() -> Result<DialogView, String> {
    let mut guard = GLOBAL_DIALOG.lock().await;
    let dialog = guard.as_mut().ok_or("Camera source dialog is not open")?;
    dialog.cancel();
    Ok(dialog.view())
}

/// Sources registered through the plugin
#[command]
pub async fn list_input_sources() -> Result<Vec<RegisteredSource>, String> {
    Ok(GLOBAL_HOST.registry.sources())
}
