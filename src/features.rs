//! Turns raw per-frame detections into the normalised features the engine
//! consumes.

use tracing::debug;

use crate::{
    config::TrackerConfig,
    detection::{Detection, FrameDetection, Thumbnail},
};

/// Pixel dimensions of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDims {
    pub width: i32,
    pub height: i32,
}

/// Clips every detection to the frame, drops those that collapse below the
/// minimum size, and pairs the rest with their thumbnail and box feature.
///
/// `thumbnails[i]` belongs to `detections[i]`; a missing thumbnail becomes an
/// empty one.
pub fn extract_frame_features(
    detections: &[Detection],
    thumbnails: &[Thumbnail],
    dims: FrameDims,
    config: &TrackerConfig,
) -> Vec<FrameDetection> {
    let usable: Vec<FrameDetection> = detections
        .iter()
        .enumerate()
        .filter_map(|(i, detection)| {
            let bbox = detection.bbox().clip(dims.width, dims.height);
            if bbox.is_degenerate(config.min_box_size) {
                return None;
            }
            let thumbnail = thumbnails
                .get(i)
                .cloned()
                .unwrap_or_else(|| Thumbnail::from(Vec::new()));
            Some(FrameDetection {
                detection: detection.clone().with_bbox(bbox),
                feature: bbox.to_feature(config.norm),
                thumbnail,
            })
        })
        .collect();

    if usable.len() != detections.len() {
        debug!(
            dropped = detections.len() - usable.len(),
            kept = usable.len(),
            "dropped degenerate detections"
        );
    }

    usable
}
