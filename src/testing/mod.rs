//! Testing utilities for camsource
//!
//! Scripted cameras and discovery mechanisms that behave like real hardware
//! closely enough to drive the whole create-camera-source workflow offline.

pub mod scripted;

pub use scripted::{
    synthetic_frame, FailingDiscovery, ScriptedDiscovery, ScriptedWebcam, WebcamCounters,
};
