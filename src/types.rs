//! Core value types shared by discovery, probing and source creation.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width/height pair reported by a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Standard VGA
    pub const fn vga() -> Self {
        Self::new(640, 480)
    }

    /// 720p
    pub const fn hd() -> Self {
        Self::new(1280, 720)
    }

    /// 1080p
    pub const fn full_hd() -> Self {
        Self::new(1920, 1080)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| CameraError::InvalidArgument(format!("Invalid resolution '{}'", s)))?;

        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| CameraError::InvalidArgument(format!("Invalid width in '{}'", s)))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| CameraError::InvalidArgument(format!("Invalid height in '{}'", s)))?;

        Ok(Self::new(width, height))
    }
}

/// Rotation applied to frames of a registered camera source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WebcamRotation {
    #[default]
    Upright,
    UpsideDown,
    Clockwise,
    Anticlockwise,
}

impl WebcamRotation {
    pub const ALL: [WebcamRotation; 4] = [
        WebcamRotation::Upright,
        WebcamRotation::UpsideDown,
        WebcamRotation::Clockwise,
        WebcamRotation::Anticlockwise,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            WebcamRotation::Upright => "Upright",
            WebcamRotation::UpsideDown => "Upside down",
            WebcamRotation::Clockwise => "Rotated 90 clockwise",
            WebcamRotation::Anticlockwise => "Rotated 90 anticlockwise",
        }
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rotation| rotation.display_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl FromStr for WebcamRotation {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rotation) = Self::from_display_name(s) {
            return Ok(rotation);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "upright" | "0" => Ok(WebcamRotation::Upright),
            "upside_down" | "upsidedown" | "180" => Ok(WebcamRotation::UpsideDown),
            "clockwise" | "cw" | "90" => Ok(WebcamRotation::Clockwise),
            "anticlockwise" | "ccw" | "270" => Ok(WebcamRotation::Anticlockwise),
            other => Err(CameraError::InvalidArgument(format!(
                "Unknown rotation '{}'",
                other
            ))),
        }
    }
}

/// Preferred camera discovery mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebcamDriver {
    /// Query the platform camera API for device names (lighter)
    #[default]
    Native,
    /// Open device indexes one by one until they stop responding (heavier)
    IndexProbe,
}

impl WebcamDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebcamDriver::Native => "native",
            WebcamDriver::IndexProbe => "index_probe",
        }
    }
}

/// Identity used to reopen a camera once it is registered as a source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraId {
    Index(u32),
    Name(String),
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Index(index) => write!(f, "#{}", index),
            CameraId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A single captured frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: "RGB8".to_string(),
            captured_at: chrono::Utc::now(),
        }
    }

    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    /// Check that the buffer holds a full RGB8 image
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() as u64 == self.width as u64 * self.height as u64 * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display_and_parse() {
        let res = Resolution::new(1280, 720);
        assert_eq!(res.to_string(), "1280x720");
        assert_eq!("1280x720".parse::<Resolution>().unwrap(), res);
        assert_eq!(" 640 X 480 ".parse::<Resolution>().unwrap(), Resolution::vga());
        assert!("1280".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_rotation_names_round_trip() {
        for rotation in WebcamRotation::ALL {
            assert_eq!(
                WebcamRotation::from_display_name(rotation.display_name()),
                Some(rotation)
            );
        }
        assert_eq!("cw".parse::<WebcamRotation>().unwrap(), WebcamRotation::Clockwise);
        assert!("sideways".parse::<WebcamRotation>().is_err());
    }

    #[test]
    fn test_frame_validity() {
        let frame = Frame::new(vec![0; 4 * 2 * 3], 4, 2);
        assert!(frame.is_valid());

        let short = Frame::new(vec![0; 5], 4, 2);
        assert!(!short.is_valid());
        assert!(!Frame::new(Vec::new(), 0, 0).is_valid());
    }

    #[test]
    fn test_driver_serialization() {
        let json = serde_json::to_string(&WebcamDriver::IndexProbe).unwrap();
        assert_eq!(json, "\"index_probe\"");
    }
}
