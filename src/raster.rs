//! Conversions between `image` buffers (straight alpha) and tiny-skia
//! pixmaps (premultiplied alpha), plus PNG encoding.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use tiny_skia::{ColorU8, IntSize, Pixmap};

use crate::error::{EditorError, Result};

pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = image.dimensions();
    let invalid = EditorError::InvalidDimensions { width, height };
    let Some(size) = IntSize::from_wh(width, height) else {
        return Err(invalid);
    };
    let data: Vec<u8> = image
        .pixels()
        .flat_map(|p| {
            let c = ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Pixmap::from_vec(data, size).ok_or(invalid)
}

pub fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RgbaImage> {
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data).ok_or(
        EditorError::InvalidDimensions {
            width: pixmap.width(),
            height: pixmap.height(),
        },
    )
}

/// Lossless encoding used for every export artifact.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(pixmap_to_rgba(pixmap)?);
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_pixels_survive_conversion() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, image::Rgba([10, 200, 30, 255]));
        image.put_pixel(2, 0, image::Rgba([0, 0, 0, 0]));
        let pixmap = pixmap_from_rgba(&image).unwrap();
        assert_eq!(pixmap_to_rgba(&pixmap).unwrap(), image);
    }

    #[test]
    fn png_decodes_back_to_same_size() {
        let pixmap = Pixmap::new(7, 5).unwrap();
        let bytes = encode_png(&pixmap).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
    }
}
