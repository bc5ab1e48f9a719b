use super::{share, SharedWebcam, Webcam, WebcamDiscovery};
use crate::config::DiscoveryConfig;
use crate::errors::CameraError;
use crate::types::{Frame, Resolution, WebcamDriver};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

/// Webcam backed by a nokhwa camera handle
pub struct NokhwaWebcam {
    index: u32,
    name: String,
    kind: WebcamDriver,
    resolution: Option<Resolution>,
    camera: Option<Camera>,
}

impl NokhwaWebcam {
    pub fn new(index: u32, name: String, kind: WebcamDriver) -> Self {
        Self {
            index,
            name,
            kind,
            resolution: None,
            camera: None,
        }
    }

    fn requested_format(&self) -> RequestedFormat<'static> {
        match self.resolution {
            Some(res) if !res.is_empty() => RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::HighestResolution(nokhwa::utils::Resolution::new(
                    res.width, res.height,
                )),
            ),
            _ => RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
        }
    }

    /// Ask nokhwa for every format the device can produce
    fn query_formats(&self) -> Result<Vec<Resolution>, CameraError> {
        let mut camera = Camera::new(
            CameraIndex::Index(self.index),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        )
        .map_err(|e| CameraError::ResolutionError(format!("Failed to open camera: {}", e)))?;

        let formats = camera.compatible_camera_formats().map_err(|e| {
            CameraError::ResolutionError(format!("Failed to query formats: {}", e))
        })?;

        let mut resolutions = Vec::new();
        for format in formats {
            let res = Resolution::new(format.resolution().width(), format.resolution().height());
            if !res.is_empty() && !resolutions.contains(&res) {
                resolutions.push(res);
            }
        }
        Ok(resolutions)
    }
}

impl Webcam for NokhwaWebcam {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn kind(&self) -> WebcamDriver {
        self.kind
    }

    fn open(&mut self) -> Result<(), CameraError> {
        if self.is_open() {
            return Ok(());
        }

        let mut camera = Camera::new(CameraIndex::Index(self.index), self.requested_format())
            .map_err(|e| CameraError::OpenError(format!("Failed to initialize camera: {}", e)))?;

        camera
            .open_stream()
            .map_err(|e| CameraError::OpenError(format!("Failed to open stream: {}", e)))?;

        log::debug!("Opened camera {} ({})", self.index, self.name);
        self.camera = Some(camera);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.camera
            .as_ref()
            .map(|camera| camera.is_stream_open())
            .unwrap_or(false)
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::CaptureError("Camera is not open".to_string()))?;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;

        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureError(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (image.width(), image.height());
        Ok(Frame::new(image.into_raw(), width, height))
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::debug!("Failed to stop stream of camera {}: {}", self.index, e);
            }
        }
    }

    fn supported_resolutions(&mut self) -> Vec<Resolution> {
        #[cfg(target_os = "linux")]
        {
            match super::linux::list_resolutions(self.index) {
                Ok(resolutions) if !resolutions.is_empty() => return resolutions,
                Ok(_) => log::debug!("V4L2 reported no frame sizes for camera {}", self.index),
                Err(e) => log::debug!("V4L2 frame size query failed: {}", e),
            }
        }

        match self.query_formats() {
            Ok(resolutions) => resolutions,
            Err(e) => {
                log::warn!("Could not query resolutions of {}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
    }
}

impl Drop for NokhwaWebcam {
    fn drop(&mut self) {
        self.close();
    }
}

// nokhwa handles are only touched through the SharedWebcam mutex
unsafe impl Send for NokhwaWebcam {}

/// Lists devices through the platform camera API
#[derive(Debug, Default)]
pub struct NativeDiscovery;

impl WebcamDiscovery for NativeDiscovery {
    fn driver(&self) -> WebcamDriver {
        WebcamDriver::Native
    }

    fn discover(&self) -> Result<Vec<SharedWebcam>, CameraError> {
        let backend = super::native_api_backend();
        let cameras = query(backend).map_err(|e| {
            CameraError::DiscoveryError(format!("Failed to query cameras: {}", e))
        })?;

        log::debug!("Found {} cameras using {:?} backend", cameras.len(), backend);

        let mut webcams = Vec::with_capacity(cameras.len());
        for info in cameras {
            let index = info.index().as_index().map_err(|e| {
                CameraError::DiscoveryError(format!("Camera without numeric index: {}", e))
            })?;
            webcams.push(share(NokhwaWebcam::new(
                index,
                info.human_name(),
                WebcamDriver::Native,
            )));
        }
        Ok(webcams)
    }
}

/// Opens device indexes in order and keeps the ones that respond
#[derive(Debug, Clone)]
pub struct IndexProbeDiscovery {
    max_index: u32,
    max_misses: u32,
}

impl IndexProbeDiscovery {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            max_index: config.max_probe_index,
            max_misses: config.max_consecutive_misses,
        }
    }
}

impl WebcamDiscovery for IndexProbeDiscovery {
    fn driver(&self) -> WebcamDriver {
        WebcamDriver::IndexProbe
    }

    fn discover(&self) -> Result<Vec<SharedWebcam>, CameraError> {
        let mut webcams = Vec::new();
        let mut misses = 0;

        for index in 0..self.max_index {
            match Camera::new(
                CameraIndex::Index(index),
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
            ) {
                Ok(camera) => {
                    misses = 0;
                    let mut name = camera.info().human_name();
                    if name.trim().is_empty() {
                        name = format!("Camera {}", index);
                    }
                    log::debug!("Index {} responded as {}", index, name);
                    webcams.push(share(NokhwaWebcam::new(index, name, WebcamDriver::IndexProbe)));
                }
                Err(e) => {
                    log::debug!("Index {} did not open: {}", index, e);
                    misses += 1;
                    if misses >= self.max_misses {
                        break;
                    }
                }
            }
        }

        Ok(webcams)
    }
}
