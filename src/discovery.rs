//! Camera enumeration with fallback between discovery mechanisms

use crate::config::DiscoveryConfig;
use crate::platform::{IndexProbeDiscovery, NativeDiscovery, SharedWebcam, WebcamDiscovery};
use crate::types::WebcamDriver;
use std::sync::Arc;

/// Result of one enumeration
pub struct Enumeration {
    pub webcams: Vec<SharedWebcam>,
    /// Index discovery ended up in effect; created sources are keyed by index
    pub using_index_discovery: bool,
}

impl Enumeration {
    pub fn is_empty(&self) -> bool {
        self.webcams.is_empty()
    }
}

/// Lists cameras through the preferred mechanism, falling back to index probing
pub struct CameraEnumerator {
    preferred: WebcamDriver,
    native: Arc<dyn WebcamDiscovery>,
    index_probe: Arc<dyn WebcamDiscovery>,
}

impl CameraEnumerator {
    pub fn new(
        preferred: WebcamDriver,
        native: Arc<dyn WebcamDiscovery>,
        index_probe: Arc<dyn WebcamDiscovery>,
    ) -> Self {
        Self {
            preferred,
            native,
            index_probe,
        }
    }

    /// Enumerator over the real nokhwa backends
    pub fn system(config: &DiscoveryConfig) -> Self {
        Self::new(
            config.preferred_driver,
            Arc::new(NativeDiscovery),
            Arc::new(IndexProbeDiscovery::new(config)),
        )
    }

    pub fn enumerate(&self) -> Enumeration {
        if self.preferred == WebcamDriver::Native {
            match self.native.discover() {
                Ok(webcams) if !webcams.is_empty() => {
                    log::info!("Native discovery found {} cameras", webcams.len());
                    return Enumeration {
                        webcams,
                        using_index_discovery: false,
                    };
                }
                Ok(_) => {
                    log::warn!("Native discovery returned 0 cameras, trying with index discovery");
                }
                Err(e) => {
                    log::warn!(
                        "Native discovery is unusable ({}), falling back to index discovery",
                        e
                    );
                }
            }
        }

        Enumeration {
            webcams: self.discover_by_index(),
            using_index_discovery: true,
        }
    }

    fn discover_by_index(&self) -> Vec<SharedWebcam> {
        match self.index_probe.discover() {
            Ok(webcams) => {
                log::info!("Index discovery found {} cameras", webcams.len());
                webcams
            }
            Err(e) => {
                log::error!("Index discovery failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingDiscovery, ScriptedDiscovery, ScriptedWebcam};

    fn cams(names: &[&str], kind: WebcamDriver) -> Vec<SharedWebcam> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ScriptedWebcam::new(name, i as u32)
                    .with_kind(kind)
                    .into_shared()
            })
            .collect()
    }

    #[test]
    fn test_native_success_keeps_native() {
        let native = ScriptedDiscovery::new(WebcamDriver::Native, cams(&["A"], WebcamDriver::Native));
        let index = ScriptedDiscovery::empty(WebcamDriver::IndexProbe);
        let enumerator =
            CameraEnumerator::new(WebcamDriver::Native, Arc::new(native), Arc::new(index.clone()));

        let result = enumerator.enumerate();
        assert_eq!(result.webcams.len(), 1);
        assert!(!result.using_index_discovery);
        assert_eq!(index.calls(), 0);
    }

    #[test]
    fn test_native_failure_falls_back() {
        let index = ScriptedDiscovery::new(
            WebcamDriver::IndexProbe,
            cams(&["A", "B"], WebcamDriver::IndexProbe),
        );
        let enumerator = CameraEnumerator::new(
            WebcamDriver::Native,
            Arc::new(FailingDiscovery(WebcamDriver::Native)),
            Arc::new(index.clone()),
        );

        let result = enumerator.enumerate();
        assert_eq!(result.webcams.len(), 2);
        assert!(result.using_index_discovery);
        assert_eq!(index.calls(), 1);
    }

    #[test]
    fn test_native_empty_falls_back() {
        let native = ScriptedDiscovery::empty(WebcamDriver::Native);
        let index = ScriptedDiscovery::new(
            WebcamDriver::IndexProbe,
            cams(&["A"], WebcamDriver::IndexProbe),
        );
        let enumerator = CameraEnumerator::new(
            WebcamDriver::Native,
            Arc::new(native.clone()),
            Arc::new(index),
        );

        let result = enumerator.enumerate();
        assert_eq!(native.calls(), 1);
        assert_eq!(result.webcams.len(), 1);
        assert!(result.using_index_discovery);
    }

    #[test]
    fn test_index_preference_skips_native() {
        let native = ScriptedDiscovery::new(WebcamDriver::Native, cams(&["A"], WebcamDriver::Native));
        let index = ScriptedDiscovery::empty(WebcamDriver::IndexProbe);
        let enumerator = CameraEnumerator::new(
            WebcamDriver::IndexProbe,
            Arc::new(native.clone()),
            Arc::new(index),
        );

        let result = enumerator.enumerate();
        assert_eq!(native.calls(), 0);
        assert!(result.is_empty());
        assert!(result.using_index_discovery);
    }

    #[test]
    fn test_both_failing_yields_empty() {
        let enumerator = CameraEnumerator::new(
            WebcamDriver::Native,
            Arc::new(FailingDiscovery(WebcamDriver::Native)),
            Arc::new(FailingDiscovery(WebcamDriver::IndexProbe)),
        );
        let result = enumerator.enumerate();
        assert!(result.is_empty());
        assert!(result.using_index_discovery);
    }
}
