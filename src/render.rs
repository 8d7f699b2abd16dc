//! Viewport compositing.
//!
//! The display canvas is redrawn from scratch out of session state: nothing
//! here mutates the session, so the same state always gives the same pixels.

use tiny_skia::{
    Color, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

use crate::dispatch::Interaction;
use crate::export::{object_paint, object_placement};
use crate::geometry::ImageRect;
use crate::session::EditorSession;
use crate::surface::{stroke_shape_onto, Shape};
use crate::transform::{CanvasGeometry, ViewportTransform};

const SELECTION_RGBA: [u8; 4] = [0, 120, 255, 255];

/// Allocate a display-sized pixmap and render into it. `None` until an image
/// has been laid out.
pub fn render(session: &EditorSession) -> Option<Pixmap> {
    let geometry = session.geometry()?;
    let (width, height) = geometry.display_size_px();
    let mut target = Pixmap::new(width, height)?;
    render_viewport(session, &mut target);
    Some(target)
}

/// Back to front: background, base image, strokes, objects, selection
/// handles, live shape preview.
pub fn render_viewport(session: &EditorSession, target: &mut Pixmap) {
    let [r, g, b, a] = session.config().background;
    target.fill(Color::from_rgba8(r, g, b, a));

    let (Some(geometry), Some(base)) = (session.geometry(), session.base()) else {
        return;
    };
    let to_canvas = geometry.image_to_canvas(session.view());
    let scaled = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..Default::default()
    };

    target.draw_pixmap(0, 0, base.pixmap().as_ref(), &scaled, to_canvas, None);

    if let Some(surface) = session.surface() {
        target.draw_pixmap(0, 0, surface.pixmap().as_ref(), &scaled, to_canvas, None);
    }

    let paint = object_paint();
    for object in session.objects().iter() {
        let source: &Pixmap = &object.source;
        let transform = to_canvas.pre_concat(object_placement(object));
        target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    }

    if let Some(object) = session
        .objects()
        .selected()
        .and_then(|id| session.objects().get(id))
    {
        draw_selection(
            target,
            geometry,
            session.view(),
            session.config().handle_size,
            object.rect,
        );
    }

    if let Interaction::Drawing { start, last, options } = *session.interaction() {
        if let Some(shape) = Shape::from_gesture(options.mode, start, last) {
            stroke_shape_onto(target, &shape, &options, to_canvas);
        }
    }
}

/// Outline plus a bottom-right handle whose on-screen size ignores zoom.
fn draw_selection(
    target: &mut Pixmap,
    geometry: &CanvasGeometry,
    view: &ViewportTransform,
    handle_size: f32,
    rect: ImageRect,
) {
    let mut paint = Paint::default();
    let [r, g, b, a] = SELECTION_RGBA;
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;

    // Stroked in canvas space so the outline stays 1.5px wide at any zoom.
    let (left, top) = canvas_point(geometry, view, rect.x, rect.y);
    let (right, bottom) = canvas_point(geometry, view, rect.right(), rect.bottom());
    if let Some(outline) = Rect::from_ltrb(left, top, right, bottom) {
        let stroke = Stroke {
            width: 1.5,
            ..Default::default()
        };
        target.stroke_path(
            &PathBuilder::from_rect(outline),
            &paint,
            &stroke,
            Transform::identity(),
            None,
        );
    }

    let half = handle_size * 0.5;
    if let Some(handle) = Rect::from_xywh(right - half, bottom - half, handle_size, handle_size) {
        target.fill_rect(handle, &paint, Transform::identity(), None);
    }
}

fn canvas_point(geometry: &CanvasGeometry, view: &ViewportTransform, x: f32, y: f32) -> (f32, f32) {
    (
        x * geometry.ratio_x() * view.scale + view.offset_x,
        y * geometry.ratio_y() * view.scale + view.offset_y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImagePoint, ScreenPoint};
    use crate::surface::{DrawMode, OptionsChange};
    use std::sync::Arc;

    fn pixel(p: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let c = p.pixels()[(y * p.width() + x) as usize];
        (c.red(), c.green(), c.blue(), c.alpha())
    }

    fn white_image(w: u32, h: u32) -> Pixmap {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(Color::WHITE);
        p
    }

    #[test]
    fn nothing_loaded_renders_nothing() {
        assert!(render(&EditorSession::default()).is_none());
    }

    #[test]
    fn background_shows_around_panned_image() {
        let mut session = EditorSession::default();
        session.set_base_image(white_image(40, 40)).unwrap();
        session.pan(20.0, 0.0);
        let frame = render(&session).unwrap();
        assert_eq!(pixel(&frame, 5, 20), (40, 40, 40, 255));
        assert_eq!(pixel(&frame, 30, 20), (255, 255, 255, 255));
    }

    #[test]
    fn display_canvas_is_downscaled() {
        let mut session = EditorSession::default();
        session.set_base_image(white_image(400, 200)).unwrap();
        session.set_canvas_area(ScreenPoint::new(0.0, 0.0), 200.0, 200.0);
        let frame = render(&session).unwrap();
        assert_eq!((frame.width(), frame.height()), (200, 100));
    }

    #[test]
    fn strokes_and_objects_are_composited() {
        let mut session = EditorSession::default();
        session.set_base_image(white_image(100, 100)).unwrap();

        let mut red = Pixmap::new(10, 10).unwrap();
        red.fill(Color::from_rgba8(255, 0, 0, 255));
        session.add_object(Arc::new(red)).unwrap();
        session.select_object(None);

        session.set_options(OptionsChange { mode: Some(DrawMode::Brush), size: Some(4.0), ..Default::default() });
        session.begin_stroke(ImagePoint::new(5.0, 90.0));
        session.extend_stroke(ImagePoint::new(40.0, 90.0));
        session.end_stroke();

        let frame = render(&session).unwrap();
        // Object: 25×25 at (50, 50).
        assert_eq!(pixel(&frame, 60, 60), (255, 0, 0, 255));
        // Default brush is red on white.
        assert_eq!(pixel(&frame, 20, 90), (255, 0, 0, 255));
        assert_eq!(pixel(&frame, 20, 20), (255, 255, 255, 255));
    }

    #[test]
    fn shape_preview_does_not_touch_surface() {
        let mut session = EditorSession::default();
        session.set_base_image(white_image(60, 60)).unwrap();
        session.set_options(OptionsChange { mode: Some(DrawMode::Line), size: Some(4.0), ..Default::default() });
        session.begin_stroke(ImagePoint::new(0.0, 30.0));
        session.extend_stroke(ImagePoint::new(60.0, 30.0));

        let frame = render(&session).unwrap();
        assert_eq!(pixel(&frame, 30, 30), (255, 0, 0, 255));
        assert!(session.surface().unwrap().is_blank());
    }
}
