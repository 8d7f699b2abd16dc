//! Native-resolution export artifacts: the flattened image and the mask.

use tiny_skia::{ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::error::{EditorError, Result};
use crate::overlay::PlacedObject;
use crate::surface::DrawingSurface;

/// Transform that maps an object's source pixmap onto its image-space rect.
pub fn object_placement(object: &PlacedObject) -> Transform {
    let sx = object.rect.width / object.source.width().max(1) as f32;
    let sy = object.rect.height / object.source.height().max(1) as f32;
    Transform::from_row(sx, 0.0, 0.0, sy, object.rect.x, object.rect.y)
}

pub(crate) fn object_paint() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..Default::default()
    }
}

/// Base image, then strokes, then objects in insertion order, with no
/// viewport transform applied.
pub fn flatten<'a>(
    base: &Pixmap,
    surface: &DrawingSurface,
    objects: impl IntoIterator<Item = &'a PlacedObject>,
) -> Pixmap {
    let mut out = base.clone();
    out.draw_pixmap(
        0,
        0,
        surface.pixmap().as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    let paint = object_paint();
    for object in objects {
        let source: &Pixmap = &object.source;
        out.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            object_placement(object),
            None,
        );
    }
    out
}

/// Opaque white wherever the surface holds any stroke coverage, opaque
/// black everywhere else.
pub fn build_mask(surface: &DrawingSurface) -> Result<Pixmap> {
    let (width, height) = (surface.width(), surface.height());
    let mut mask = Pixmap::new(width, height).ok_or(EditorError::InvalidDimensions { width, height })?;

    let white = ColorU8::from_rgba(255, 255, 255, 255).premultiply();
    let black = ColorU8::from_rgba(0, 0, 0, 255).premultiply();
    for (dst, src) in mask.pixels_mut().iter_mut().zip(surface.pixmap().pixels()) {
        *dst = if src.alpha() > 0 { white } else { black };
    }
    Ok(mask)
}
