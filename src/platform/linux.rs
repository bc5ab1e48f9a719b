use crate::errors::CameraError;
use crate::types::Resolution;
use v4l::framesize::FrameSizeEnum;
use v4l::video::Capture;
use v4l::Device;

/// Sizes tried against stepwise V4L2 frame size ranges
const STEPWISE_CANDIDATES: [(u32, u32); 6] = [
    (320, 240),
    (640, 480),
    (800, 600),
    (1280, 720),
    (1920, 1080),
    (3840, 2160),
];

/// List the frame sizes a V4L2 device reports, in driver order, without duplicates
pub fn list_resolutions(index: u32) -> Result<Vec<Resolution>, CameraError> {
    let device = Device::new(index as usize).map_err(|e| {
        CameraError::ResolutionError(format!("Failed to open /dev/video{}: {}", index, e))
    })?;

    let formats = device
        .enum_formats()
        .map_err(|e| CameraError::ResolutionError(format!("Failed to list formats: {}", e)))?;

    let mut resolutions = Vec::new();
    for format in formats {
        let sizes = match device.enum_framesizes(format.fourcc) {
            Ok(sizes) => sizes,
            Err(e) => {
                log::debug!("No frame sizes for {:?}: {}", format.fourcc, e);
                continue;
            }
        };

        for size in sizes {
            match size.size {
                FrameSizeEnum::Discrete(discrete) => {
                    push_unique(&mut resolutions, Resolution::new(discrete.width, discrete.height));
                }
                FrameSizeEnum::Stepwise(step) => {
                    for (w, h) in STEPWISE_CANDIDATES {
                        if (step.min_width..=step.max_width).contains(&w)
                            && (step.min_height..=step.max_height).contains(&h)
                        {
                            push_unique(&mut resolutions, Resolution::new(w, h));
                        }
                    }
                }
            }
        }
    }

    Ok(resolutions)
}

fn push_unique(resolutions: &mut Vec<Resolution>, res: Resolution) {
    if !res.is_empty() && !resolutions.contains(&res) {
        resolutions.push(res);
    }
}
