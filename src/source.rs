//! Camera-backed input sources and their creation

use crate::host::Host;
use crate::types::{CameraId, Resolution, WebcamDriver, WebcamRotation};
use serde::{Deserialize, Serialize};

/// A configured camera input source, as registered with the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSource {
    pub camera: CameraId,
    pub resolution: Resolution,
    pub rotation: WebcamRotation,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CameraSource {
    pub fn new(camera: CameraId, resolution: Resolution, rotation: WebcamRotation) -> Self {
        Self {
            camera,
            resolution,
            rotation,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Everything needed to register a new camera source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRequest {
    pub name: String,
    pub camera: CameraId,
    pub resolution: Resolution,
    pub rotation: WebcamRotation,
}

/// Pick how a created source refers to its camera.
///
/// With index discovery in effect the source is keyed by index: the device index
/// when the webcam came from the index prober, its position in the camera list
/// otherwise. Native discovery keys sources by camera name.
pub fn resolve_camera_id(
    using_index_discovery: bool,
    webcam_kind: WebcamDriver,
    webcam_index: u32,
    webcam_name: &str,
    list_position: usize,
) -> CameraId {
    if !using_index_discovery {
        return CameraId::Name(webcam_name.to_string());
    }

    match webcam_kind {
        WebcamDriver::IndexProbe => CameraId::Index(webcam_index),
        WebcamDriver::Native => CameraId::Index(list_position as u32),
    }
}

/// Queue registration of a new camera source on the host's main-update cycle.
///
/// The new source becomes the active one.
pub fn create_source(host: &Host, request: SourceRequest) {
    log::info!(
        "Creating camera source {} for {} at {} ({})",
        request.name,
        request.camera,
        request.resolution,
        request.rotation.display_name()
    );

    let registry = host.registry.clone();
    host.main_update.do_once(Box::new(move || {
        let source = CameraSource::new(request.camera, request.resolution, request.rotation);
        if let Err(e) = registry.add_input_source(&request.name, source, true) {
            log::error!("Failed to register camera source {}: {}", request.name, e);
        }
    }));
}
