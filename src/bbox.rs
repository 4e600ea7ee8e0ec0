use nalgebra::SVector;

/// Normalised `(center_x, center_y, width, height)` of a box.
pub type BoxFeature = SVector<f32, 4>;

/// Pixel-space bounding box, `(x_1, y_1)` top-left and `(x_2, y_2)` bottom-right.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BBox {
    pub x_1: i32,
    pub y_1: i32,
    pub x_2: i32,
    pub y_2: i32,
}

impl BBox {
    pub fn new(x_1: i32, y_1: i32, x_2: i32, y_2: i32) -> Self {
        if x_1 > x_2 || y_1 > y_2 {
            return BBox::default();
        };
        BBox { x_1, y_1, x_2, y_2 }
    }

    pub fn width(&self) -> i32 {
        self.x_2 - self.x_1
    }

    pub fn height(&self) -> i32 {
        self.y_2 - self.y_1
    }

    /// Clips the box to a `width` x `height` frame.
    pub fn clip(&self, width: i32, height: i32) -> Self {
        Self {
            x_1: self.x_1.max(0),
            y_1: self.y_1.max(0),
            x_2: self.x_2.min(width),
            y_2: self.y_2.min(height),
        }
    }

    pub fn is_degenerate(&self, min_size: i32) -> bool {
        self.width() < min_size || self.height() < min_size
    }

    pub fn to_feature(&self, norm: f64) -> BoxFeature {
        let cx = (self.x_1 + self.x_2) as f64 / 2.0;
        let cy = (self.y_1 + self.y_2) as f64 / 2.0;

        SVector::<f32, 4>::new(
            (cx / norm) as f32,
            (cy / norm) as f32,
            (self.width() as f64 / norm) as f32,
            (self.height() as f64 / norm) as f32,
        )
    }
}
