use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera discovery error: {0}")]
    DiscoveryError(String),
    #[error("Camera open error: {0}")]
    OpenError(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Resolution error: {0}")]
    ResolutionError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Input source registry error: {0}")]
    RegistryError(String),
    #[error("Dialog is closed")]
    DialogClosed,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
