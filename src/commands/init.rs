use crate::commands::config::current_config;
use crate::dialog::display_name;
use crate::discovery::CameraEnumerator;
use crate::platform::lock_webcam;
use crate::resolution_cache::{ProbeWait, ResolutionCache};
use crate::types::{Resolution, WebcamDriver};
use tauri::command;

/// Summary of a discovered camera
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CameraSummary {
    pub index: u32,
    pub name: String,
    pub display_name: String,
    pub driver: WebcamDriver,
}

/// Cameras found through the configured discovery mechanisms
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AvailableCameras {
    pub cameras: Vec<CameraSummary>,
    pub using_index_discovery: bool,
}

/// List cameras with the same primary/fallback policy the dialog uses
#[command]
pub async fn get_available_cameras() -> Result<AvailableCameras, String> {
    let config = current_config();

    let enumeration = tokio::task::spawn_blocking(move || {
        let enumerator = CameraEnumerator::system(&config.discovery);
        let enumeration = enumerator.enumerate();
        let mut cameras = Vec::with_capacity(enumeration.webcams.len());
        for webcam in &enumeration.webcams {
            let webcam = lock_webcam(webcam).map_err(|e| e.to_string())?;
            let name = webcam.name();
            cameras.push(CameraSummary {
                index: webcam.index(),
                display_name: display_name(&name, config.dialog.visible_name_chars),
                name,
                driver: webcam.kind(),
            });
        }
        Ok::<_, String>(AvailableCameras {
            cameras,
            using_index_discovery: enumeration.using_index_discovery,
        })
    })
    .await
    .map_err(|e| format!("Failed to list cameras: {}", e))??;

    log::info!("Found {} cameras", enumeration.cameras.len());
    for camera in &enumeration.cameras {
        log::debug!(
            "Camera: {} - {} ({})",
            camera.index,
            camera.name,
            camera.driver.as_str()
        );
    }
    Ok(enumeration)
}

/// Resolutions cached for a camera display name, waiting for an outstanding probe
#[command]
pub async fn get_camera_resolutions(display_name: String) -> Result<Vec<Resolution>, String> {
    let timeout = current_config().probing.resolution_timeout();

    match ResolutionCache::global().wait_for(&display_name, timeout).await {
        ProbeWait::Ready(resolutions) => Ok(resolutions),
        ProbeWait::Unusable => Err(format!("Camera '{}' reported no resolutions", display_name)),
        ProbeWait::TimedOut => Err(format!(
            "Timed out waiting for resolutions of '{}'",
            display_name
        )),
        ProbeWait::NotScheduled => Err(format!(
            "Resolutions of '{}' have not been probed",
            display_name
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unprobed_camera_resolutions() {
        let result = get_camera_resolutions("no such camera here".to_string()).await;
        let error = result.unwrap_err();
        assert!(error.contains("have not been probed"));
    }
}
