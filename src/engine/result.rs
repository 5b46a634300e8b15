use std::time::Duration;

use super::request::SourceRegion;

/// Result of running inference on one request.
#[derive(Clone, Debug)]
pub struct InferenceResult {
    /// Sequence of the frame the request was built from.
    pub sequence: u64,
    /// Frame region the normalised payload coordinates refer to.
    pub region: SourceRegion,
    /// Time spent inside the backend.
    pub latency: Duration,
    pub payload: Payload,
}

/// Engine-specific payload.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Detections(Vec<Detection>),
    Landmarks(Vec<LandmarkSet>),
    Classifications(Vec<Category>),
    Mask(SegmentationMask),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Detections(_) => "detections",
            Payload::Landmarks(_) => "landmarks",
            Payload::Classifications(_) => "classifications",
            Payload::Mask(_) => "mask",
        }
    }

    /// Number of reported items (boxes, subjects, categories, or 1 for masks).
    pub fn len(&self) -> usize {
        match self {
            Payload::Detections(d) => d.len(),
            Payload::Landmarks(l) => l.len(),
            Payload::Classifications(c) => c.len(),
            Payload::Mask(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounding box in normalised 0..1 coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

/// Keypoints for one subject (hand, face, body).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// Per-pixel category mask. 0 is background.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationMask {
    pub width: u32,
    pub height: u32,
    pub categories: Vec<u8>,
}

impl SegmentationMask {
    /// Category at normalised coordinates, if inside the mask.
    pub fn category_at(&self, nx: f32, ny: f32) -> Option<u8> {
        if !(0.0..1.0).contains(&nx) || !(0.0..1.0).contains(&ny) {
            return None;
        }
        let x = (nx * self.width as f32) as usize;
        let y = (ny * self.height as f32) as usize;
        self.categories.get(y * self.width as usize + x).copied()
    }
}
