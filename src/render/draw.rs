//! Minimal overlay drawing onto RGB images.

use image::{Rgb, RgbImage};

use crate::engine::{Category, Detection, LandmarkSet, SegmentationMask, SourceRegion};

pub(crate) const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub(crate) const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub(crate) const MASK_COLOR: Rgb<u8> = Rgb([80, 160, 255]);
pub(crate) const BAR_COLOR: Rgb<u8> = Rgb([255, 200, 0]);

const BOX_THICKNESS: u32 = 3;
const LANDMARK_RADIUS: i64 = 2;
const BAR_HEIGHT: u32 = 6;
const BAR_MARGIN: u32 = 4;

/// Outline of a normalised box. Score is drawn as a bar above the box.
pub(crate) fn draw_detection(
    image: &mut RgbImage,
    region: &SourceRegion,
    d: &Detection,
    label_bar: bool,
) {
    let (x0, y0) = region.to_frame(d.x, d.y);
    let (x1, y1) = region.to_frame(d.x + d.w, d.y + d.h);
    stroke_rect(image, x0 as i64, y0 as i64, x1 as i64, y1 as i64, BOX_COLOR);
    if label_bar {
        let width = ((x1 - x0).max(0.0) * d.category.score.clamp(0.0, 1.0)) as i64;
        let top = y0 as i64 - (BAR_HEIGHT + BAR_MARGIN) as i64;
        fill_rect(image, x0 as i64, top, x0 as i64 + width, top + BAR_HEIGHT as i64, BAR_COLOR);
    }
}

pub(crate) fn draw_landmarks(image: &mut RgbImage, region: &SourceRegion, set: &LandmarkSet) {
    for point in &set.points {
        let (x, y) = region.to_frame(point.x, point.y);
        let (x, y) = (x as i64, y as i64);
        fill_rect(
            image,
            x - LANDMARK_RADIUS,
            y - LANDMARK_RADIUS,
            x + LANDMARK_RADIUS + 1,
            y + LANDMARK_RADIUS + 1,
            LANDMARK_COLOR,
        );
    }
}

/// Blend non-background mask pixels with the mask colour.
pub(crate) fn draw_mask(image: &mut RgbImage, region: &SourceRegion, mask: &SegmentationMask) {
    if mask.width == 0 || mask.height == 0 {
        return;
    }
    let x_end = (region.x + region.width).min(image.width());
    let y_end = (region.y + region.height).min(image.height());
    for y in region.y..y_end {
        for x in region.x..x_end {
            let nx = (x - region.x) as f32 / region.width as f32;
            let ny = (y - region.y) as f32 / region.height as f32;
            if mask.category_at(nx, ny).unwrap_or(0) == 0 {
                continue;
            }
            let pixel = image.get_pixel_mut(x, y);
            for (channel, tint) in pixel.0.iter_mut().zip(MASK_COLOR.0) {
                *channel = ((*channel as u16 + tint as u16) / 2) as u8;
            }
        }
    }
}

/// One bar per category in the top-left corner, length proportional to score.
pub(crate) fn draw_classifications(image: &mut RgbImage, categories: &[Category]) {
    let max_len = image.width() / 3;
    for (row, category) in categories.iter().enumerate() {
        let top = (BAR_MARGIN + row as u32 * (BAR_HEIGHT + BAR_MARGIN)) as i64;
        let len = (max_len as f32 * category.score.clamp(0.0, 1.0)) as i64;
        let left = BAR_MARGIN as i64;
        fill_rect(image, left, top, left + len, top + BAR_HEIGHT as i64, BAR_COLOR);
    }
}

fn stroke_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let t = BOX_THICKNESS as i64;
    fill_rect(image, x0, y0, x1, y0 + t, color);
    fill_rect(image, x0, y1 - t, x1, y1, color);
    fill_rect(image, x0, y0, x0 + t, y1, color);
    fill_rect(image, x1 - t, y0, x1, y1, color);
}

/// Fill `[x0, x1) x [y0, y1)`, clipped to the image.
fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
    let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_is_clipped_to_image() {
        let mut image = RgbImage::new(4, 4);
        fill_rect(&mut image, -5, -5, 2, 100, BOX_COLOR);
        assert_eq!(image.get_pixel(1, 3), &BOX_COLOR);
        assert_eq!(image.get_pixel(2, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn detection_box_maps_through_region() {
        let mut image = RgbImage::new(100, 100);
        let region = SourceRegion {
            x: 50,
            y: 0,
            width: 50,
            height: 100,
        };
        let detection = Detection {
            x: 0.0,
            y: 0.5,
            w: 0.5,
            h: 0.5,
            category: Category {
                label: "thing".into(),
                score: 1.0,
            },
        };
        draw_detection(&mut image, &region, &detection, false);

        assert_eq!(image.get_pixel(50, 60), &BOX_COLOR);
        assert_eq!(image.get_pixel(40, 60), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(62, 75), &Rgb([0, 0, 0]));
    }
}
