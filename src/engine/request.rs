use image::RgbImage;

/// Region of the source frame that an inference request covers, in frame pixels.
///
/// Normalised result coordinates are relative to this region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRegion {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Map a normalised (0..1) point inside the region to frame pixels.
    pub fn to_frame(&self, nx: f32, ny: f32) -> (f32, f32) {
        (
            self.x as f32 + nx * self.width as f32,
            self.y as f32 + ny * self.height as f32,
        )
    }
}

/// Preprocessed image tagged with the sequence of the frame it came from.
///
/// Consumed once by the dispatcher.
#[derive(Debug)]
pub struct InferenceRequest {
    pub sequence: u64,
    pub image: RgbImage,
    pub region: SourceRegion,
}

impl InferenceRequest {
    pub fn new(sequence: u64, image: RgbImage, region: SourceRegion) -> Self {
        Self {
            sequence,
            image,
            region,
        }
    }

    /// Requests with an empty buffer cannot be run by any backend.
    pub fn is_well_formed(&self) -> bool {
        self.image.width() > 0
            && self.image.height() > 0
            && self.region.width > 0
            && self.region.height > 0
    }
}
