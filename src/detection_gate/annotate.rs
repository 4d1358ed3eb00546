//! Frame annotation
//!
//! Draws retained detection boxes onto a JPEG frame for the live stream.

use crate::detector_client::BoundingBox;
use crate::error::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const JPEG_QUALITY: u8 = 80;

/// Draw boxes onto the frame and re-encode it.
///
/// With no boxes the input is passed through untouched, skipping the
/// decode/encode round trip on idle frames.
pub fn annotate_jpeg(jpeg: &[u8], boxes: &[BoundingBox]) -> Result<Vec<u8>> {
    if boxes.is_empty() {
        return Ok(jpeg.to_vec());
    }

    let mut img = image::load_from_memory(jpeg)?.to_rgb8();
    for b in boxes {
        draw_box(&mut img, b);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&img)?;
    Ok(out)
}

fn draw_box(img: &mut RgbImage, b: &BoundingBox) {
    let w = img.width() as i32;
    let h = img.height() as i32;

    let left = (b.x1.round() as i32).clamp(0, w - 1);
    let top = (b.y1.round() as i32).clamp(0, h - 1);
    let right = (b.x2.round() as i32).clamp(0, w - 1);
    let bottom = (b.y2.round() as i32).clamp(0, h - 1);

    for t in 0..BOX_THICKNESS {
        for x in left..=right {
            put(img, x, top + t);
            put(img, x, bottom - t);
        }
        for y in top..=bottom {
            put(img, left + t, y);
            put(img, right - t, y);
        }
    }
}

fn put(img: &mut RgbImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        *img.get_pixel_mut(x as u32, y as u32) = BOX_COLOR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::new(width, height);
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&img)
            .unwrap();
        out
    }

    fn test_box() -> BoundingBox {
        BoundingBox {
            x1: 4.0,
            y1: 4.0,
            x2: 20.0,
            y2: 20.0,
            label: "person".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_no_boxes_passes_input_through() {
        let jpeg = test_jpeg(32, 32);
        let out = annotate_jpeg(&jpeg, &[]).unwrap();
        assert_eq!(out, jpeg);
    }

    #[test]
    fn test_annotated_frame_keeps_dimensions() {
        let jpeg = test_jpeg(64, 48);
        let out = annotate_jpeg(&jpeg, &[test_box()]).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn test_box_outside_frame_is_clamped() {
        let jpeg = test_jpeg(16, 16);
        let mut b = test_box();
        b.x2 = 500.0;
        b.y2 = 500.0;
        // Must not panic on out-of-bounds coordinates
        annotate_jpeg(&jpeg, &[b]).unwrap();
    }

    #[test]
    fn test_invalid_jpeg_is_an_error() {
        assert!(annotate_jpeg(b"not a jpeg", &[test_box()]).is_err());
    }
}
