use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bbox::{BBox, BoxFeature};

/// Fixed-size appearance crop of a detection. Opaque to the engine, only the
/// affinity scorer looks inside.
pub type Thumbnail = Arc<[u8]>;

/// A detection as exchanged with the host framework.
///
/// Fields the tracker does not know about are carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Detection {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            ..Default::default()
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.left, self.top, self.right, self.bottom)
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.left = bbox.x_1;
        self.top = bbox.y_1;
        self.right = bbox.x_2;
        self.bottom = bbox.y_2;
        self
    }
}

/// A usable detection of the current frame, ready for association.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    pub detection: Detection,
    pub feature: BoxFeature,
    pub thumbnail: Thumbnail,
}
