//! Camera backends
//!
//! A [`Webcam`] is an opaque handle to one physical device. A
//! [`WebcamDiscovery`] lists the devices one discovery mechanism can see.
//! The nokhwa-backed implementations live in [`nokhwa_backend`].

pub mod nokhwa_backend;

#[cfg(target_os = "linux")]
pub mod linux;

use crate::errors::CameraError;
use crate::types::{Frame, Resolution, WebcamDriver};
use std::sync::{Arc, Mutex};

pub use nokhwa_backend::{IndexProbeDiscovery, NativeDiscovery, NokhwaWebcam};

/// Camera handle shared between the dialog, probe workers and the main-update cycle
pub type SharedWebcam = Arc<Mutex<dyn Webcam>>;

/// Operations the workflow needs from a camera device
pub trait Webcam: Send {
    /// Human readable device name
    fn name(&self) -> String;

    /// Backend device index
    fn index(&self) -> u32;

    /// Discovery mechanism that produced this handle
    fn kind(&self) -> WebcamDriver;

    fn open(&mut self) -> Result<(), CameraError>;

    fn is_open(&self) -> bool;

    /// Read one frame; the camera must be open
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    fn close(&mut self);

    /// Resolutions the device reports, in backend order. Empty when the device is unusable.
    fn supported_resolutions(&mut self) -> Vec<Resolution>;

    /// Resolution used by the next `open`
    fn set_resolution(&mut self, resolution: Resolution);
}

/// One mechanism for listing camera devices
pub trait WebcamDiscovery: Send + Sync {
    fn driver(&self) -> WebcamDriver;

    fn discover(&self) -> Result<Vec<SharedWebcam>, CameraError>;
}

/// Wrap a concrete webcam into the shared handle type
pub fn share<W: Webcam + 'static>(webcam: W) -> SharedWebcam {
    Arc::new(Mutex::new(webcam))
}

/// Lock a shared webcam, mapping a poisoned lock into a camera error
pub fn lock_webcam(
    webcam: &SharedWebcam,
) -> Result<std::sync::MutexGuard<'_, dyn Webcam + 'static>, CameraError> {
    webcam
        .lock()
        .map_err(|_| CameraError::OpenError("Camera lock poisoned".to_string()))
}

/// Open the camera, read one frame and close it again.
///
/// Returns `true` when the camera opened and produced a complete frame.
pub fn test_camera(webcam: &mut dyn Webcam) -> bool {
    if let Err(e) = webcam.open() {
        log::warn!("Failed to open camera {}: {}", webcam.name(), e);
        return false;
    }

    if !webcam.is_open() {
        log::warn!("Camera {} did not report open", webcam.name());
        return false;
    }

    let opened = match webcam.read_frame() {
        Ok(frame) if !frame.is_valid() => {
            log::warn!(
                "Camera {} produced a {}x{} frame with only {} bytes",
                webcam.name(),
                frame.width,
                frame.height,
                frame.data.len()
            );
            false
        }
        Ok(frame) => {
            log::debug!(
                "Camera {} produced a {}x{} {} frame",
                webcam.name(),
                frame.width,
                frame.height,
                frame.format
            );
            true
        }
        Err(e) => {
            log::warn!("Threw error when trying to read from camera {}: {}", webcam.name(), e);
            false
        }
    };

    webcam.close();
    opened
}

/// Platform API backend nokhwa should query on this OS
pub fn native_api_backend() -> nokhwa::utils::ApiBackend {
    #[cfg(target_os = "linux")]
    {
        nokhwa::utils::ApiBackend::Video4Linux
    }
    #[cfg(target_os = "macos")]
    {
        nokhwa::utils::ApiBackend::AVFoundation
    }
    #[cfg(target_os = "windows")]
    {
        nokhwa::utils::ApiBackend::MediaFoundation
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        nokhwa::utils::ApiBackend::Auto
    }
}
