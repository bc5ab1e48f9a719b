//! Scripted webcams for offline tests

use crate::errors::CameraError;
use crate::platform::{share, SharedWebcam, Webcam, WebcamDiscovery};
use crate::types::{Frame, Resolution, WebcamDriver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Create a synthetic RGB8 frame with a gradient pattern
pub fn synthetic_frame(frame_number: u64, width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    Frame::new(data, width, height).with_format("SYNTHETIC".to_string())
}

/// Call counters of a [`ScriptedWebcam`], readable after the webcam is shared
#[derive(Debug, Clone, Default)]
pub struct WebcamCounters {
    inner: Arc<CounterInner>,
}

#[derive(Debug, Default)]
struct CounterInner {
    opens: AtomicUsize,
    reads: AtomicUsize,
    closes: AtomicUsize,
    resolution_queries: AtomicUsize,
    last_resolution: Mutex<Option<Resolution>>,
}

impl WebcamCounters {
    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    pub fn resolution_queries(&self) -> usize {
        self.inner.resolution_queries.load(Ordering::SeqCst)
    }

    /// Resolution set right before the last open
    pub fn last_resolution(&self) -> Option<Resolution> {
        self.inner.last_resolution.lock().ok().and_then(|r| *r)
    }
}

/// In-memory camera with scripted behavior
#[derive(Debug)]
pub struct ScriptedWebcam {
    name: String,
    index: u32,
    kind: WebcamDriver,
    resolutions: Vec<Resolution>,
    resolution_delay: Duration,
    open_error: bool,
    silent_open_failure: bool,
    read_error: bool,
    truncated_frames: bool,
    open: bool,
    current: Option<Resolution>,
    frames: u64,
    counters: WebcamCounters,
}

impl ScriptedWebcam {
    /// A working camera reporting 640x480 and 1280x720
    pub fn new(name: &str, index: u32) -> Self {
        Self {
            name: name.to_string(),
            index,
            kind: WebcamDriver::Native,
            resolutions: vec![Resolution::vga(), Resolution::hd()],
            resolution_delay: Duration::ZERO,
            open_error: false,
            silent_open_failure: false,
            read_error: false,
            truncated_frames: false,
            open: false,
            current: None,
            frames: 0,
            counters: WebcamCounters::default(),
        }
    }

    pub fn with_resolutions(mut self, resolutions: Vec<Resolution>) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn with_kind(mut self, kind: WebcamDriver) -> Self {
        self.kind = kind;
        self
    }

    /// Block the resolution query for `delay`
    pub fn with_resolution_delay(mut self, delay: Duration) -> Self {
        self.resolution_delay = delay;
        self
    }

    /// `open` returns an error
    pub fn failing_open(mut self) -> Self {
        self.open_error = true;
        self
    }

    /// `open` succeeds but the device never reports open
    pub fn never_opens(mut self) -> Self {
        self.silent_open_failure = true;
        self
    }

    /// `read_frame` returns an error
    pub fn failing_read(mut self) -> Self {
        self.read_error = true;
        self
    }

    /// Frames come back with fewer bytes than their dimensions need
    pub fn truncated_frames(mut self) -> Self {
        self.truncated_frames = true;
        self
    }

    pub fn counters(&self) -> WebcamCounters {
        self.counters.clone()
    }

    pub fn into_shared(self) -> SharedWebcam {
        share(self)
    }
}

impl Webcam for ScriptedWebcam {
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
        self.counters.inner.opens.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.counters.inner.last_resolution.lock() {
            *last = self.current;
        }

        if self.open_error {
            return Err(CameraError::OpenError(format!("{} is busy", self.name)));
        }
        self.open = !self.silent_open_failure;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        self.counters.inner.reads.fetch_add(1, Ordering::SeqCst);

        if !self.open {
            return Err(CameraError::CaptureError("Camera is not open".to_string()));
        }
        if self.read_error {
            return Err(CameraError::CaptureError("Device disconnected".to_string()));
        }

        let res = self
            .current
            .or_else(|| self.resolutions.first().copied())
            .unwrap_or_else(Resolution::vga);
        self.frames += 1;
        let mut frame = synthetic_frame(self.frames, res.width.min(64), res.height.min(48));
        if self.truncated_frames {
            frame.data.truncate(frame.data.len() / 2);
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.counters.inner.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
    }

    fn supported_resolutions(&mut self) -> Vec<Resolution> {
        self.counters
            .inner
            .resolution_queries
            .fetch_add(1, Ordering::SeqCst);
        if !self.resolution_delay.is_zero() {
            std::thread::sleep(self.resolution_delay);
        }
        self.resolutions.clone()
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.current = Some(resolution);
    }
}

/// Discovery returning a fixed list of shared webcams
#[derive(Clone)]
pub struct ScriptedDiscovery {
    driver: WebcamDriver,
    webcams: Vec<SharedWebcam>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDiscovery {
    pub fn new(driver: WebcamDriver, webcams: Vec<SharedWebcam>) -> Self {
        Self {
            driver,
            webcams,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty(driver: WebcamDriver) -> Self {
        Self::new(driver, Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebcamDiscovery for ScriptedDiscovery {
    fn driver(&self) -> WebcamDriver {
        self.driver
    }

    fn discover(&self) -> Result<Vec<SharedWebcam>, CameraError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.webcams.clone())
    }
}

/// Discovery whose backend is unusable
#[derive(Debug, Clone, Copy)]
pub struct FailingDiscovery(pub WebcamDriver);

impl WebcamDiscovery for FailingDiscovery {
    fn driver(&self) -> WebcamDriver {
        self.0
    }

    fn discover(&self) -> Result<Vec<SharedWebcam>, CameraError> {
        Err(CameraError::DiscoveryError(
            "Native camera library failed to load".to_string(),
        ))
    }
}
