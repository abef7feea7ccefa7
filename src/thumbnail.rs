use eframe::egui::ColorImage;
use tracing::debug;

use crate::config::{METADATA_TIMEOUT, USER_AGENT};

/// Widest preview drawn in the Video Info panel.
const MAX_WIDTH: u32 = 240;

/// Downloads and decodes the preview image advertised by the video info.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(METADATA_TIMEOUT)
        .build()
        .ok()?;
    let bytes = match client.get(url).send().and_then(|r| r.error_for_status()) {
        Ok(resp) => resp.bytes().ok()?,
        Err(e) => {
            debug!(error = %e, url, "thumbnail unavailable");
            return None;
        }
    };
    decode_preview(&bytes)
}

/// Decodes image bytes into an egui image no wider than the preview area.
pub fn decode_preview(bytes: &[u8]) -> Option<ColorImage> {
    let mut img = image::load_from_memory(bytes).ok()?;
    if img.width() > MAX_WIDTH {
        let height = img.height() * MAX_WIDTH / img.width();
        img = img.thumbnail(MAX_WIDTH, height.max(1));
    }
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn large_images_are_scaled_to_the_preview_width() {
        let preview = decode_preview(&png(480, 360)).unwrap();
        assert_eq!(preview.size, [240, 180]);
    }

    #[test]
    fn small_images_keep_their_size() {
        let preview = decode_preview(&png(120, 90)).unwrap();
        assert_eq!(preview.size, [120, 90]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_preview(b"not an image").is_none());
    }
}
