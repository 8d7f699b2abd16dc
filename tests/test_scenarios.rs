use std::sync::Arc;

use image::{Rgba, RgbaImage};
use sketch_edit::loader::{decode, ImageSource};
use sketch_edit::raster::{encode_png, pixmap_from_rgba};
use sketch_edit::transform::ViewportTransform;
use sketch_edit::{
    DrawMode, EditorEvent, EditorSession, OptionsChange, PointerButton, ScreenPoint, ToolbarAction,
};
use tiny_skia::Pixmap;

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn loaded_session(width: u32, height: u32) -> (EditorSession, RgbaImage) {
    let base = gradient(width, height);
    let png = encode_png(&pixmap_from_rgba(&base).unwrap()).unwrap();
    let pixmap = decode(&ImageSource::Bytes(png)).unwrap();

    let mut session = EditorSession::default();
    session.set_base_image(pixmap).unwrap();
    (session, base)
}

fn drag(session: &mut EditorSession, points: &[(f32, f32)]) {
    let (first, rest) = points.split_first().unwrap();
    session.dispatch(EditorEvent::PointerDown {
        pos: ScreenPoint::new(first.0, first.1),
        button: PointerButton::Primary,
    });
    for &(x, y) in rest {
        session.dispatch(EditorEvent::PointerMove { pos: ScreenPoint::new(x, y) });
    }
    let last = points.last().unwrap();
    session.dispatch(EditorEvent::PointerUp { pos: ScreenPoint::new(last.0, last.1) });
}

fn set_mode(session: &mut EditorSession, mode: DrawMode) {
    session.dispatch(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
        mode: Some(mode),
        ..Default::default()
    })));
}

#[test]
fn brush_export_only_changes_stroke_region() {
    let (mut session, base) = loaded_session(800, 600);
    drag(&mut session, &[(100.0, 100.0), (200.0, 120.0), (300.0, 150.0)]);

    let png = session.combined_image().unwrap().unwrap();
    let combined = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(combined.dimensions(), (800, 600));

    // Stroke bounds grown by half the default 5px width plus AA slack.
    let margin = 5.0;
    let (min_x, max_x, min_y, max_y) = (100.0 - margin, 300.0 + margin, 100.0 - margin, 150.0 + margin);

    let mut changed = 0;
    for (x, y, pixel) in combined.enumerate_pixels() {
        if pixel != base.get_pixel(x, y) {
            changed += 1;
            let (fx, fy) = (x as f32, y as f32);
            assert!(
                fx >= min_x && fx <= max_x && fy >= min_y && fy <= max_y,
                "pixel ({x}, {y}) changed outside the stroke"
            );
        }
    }
    assert!(changed > 0);
}

#[test]
fn rectangle_undo_restores_previous_pixels() {
    let (mut session, _) = loaded_session(320, 240);
    drag(&mut session, &[(10.0, 10.0), (90.0, 40.0)]);
    let before: Vec<u8> = session.surface().unwrap().pixmap().data().to_vec();

    set_mode(&mut session, DrawMode::Rectangle);
    drag(&mut session, &[(50.0, 50.0), (120.0, 90.0), (200.0, 180.0)]);
    assert_ne!(session.surface().unwrap().pixmap().data(), &before[..]);

    session.dispatch(EditorEvent::Toolbar(ToolbarAction::Undo));
    assert_eq!(session.surface().unwrap().pixmap().data(), &before[..]);
    assert_eq!(session.history().len(), 1);
}

#[test]
fn history_length_matches_strokes_and_unwinds_to_blank() {
    let (mut session, _) = loaded_session(200, 200);
    let modes = [
        DrawMode::Brush,
        DrawMode::Line,
        DrawMode::Eraser,
        DrawMode::Circle,
        DrawMode::Rectangle,
        DrawMode::Brush,
    ];
    for (i, mode) in modes.iter().enumerate() {
        set_mode(&mut session, *mode);
        let offset = i as f32 * 10.0;
        drag(&mut session, &[(20.0 + offset, 30.0), (90.0, 60.0 + offset), (150.0, 170.0)]);
        assert_eq!(session.history().len(), i + 1);
    }

    for _ in 0..modes.len() {
        session.dispatch(EditorEvent::Toolbar(ToolbarAction::Undo));
    }
    assert!(session.surface().unwrap().is_blank());

    // Past the bottom of the stack nothing changes.
    assert!(!session.dispatch(EditorEvent::Toolbar(ToolbarAction::Undo)));
    assert!(session.history().is_empty());
}

#[test]
fn zoom_at_cursor_then_reset() {
    let (mut session, _) = loaded_session(640, 480);
    let cursor = ScreenPoint::new(212.0, 97.0);
    let anchored = session.to_image_space(cursor).unwrap();

    session.dispatch(EditorEvent::Wheel { pos: cursor, delta: 3.0 });
    session.dispatch(EditorEvent::Wheel { pos: cursor, delta: 3.0 });
    let after = session.to_image_space(cursor).unwrap();
    assert!((anchored.x - after.x).abs() < 1e-3 && (anchored.y - after.y).abs() < 1e-3);
    assert!(session.view().scale > 1.2);

    session.dispatch(EditorEvent::Toolbar(ToolbarAction::ResetZoom));
    assert_eq!(*session.view(), ViewportTransform::default());
}

#[test]
fn mask_is_absent_until_something_is_drawn() {
    let (mut session, _) = loaded_session(120, 90);
    assert_eq!(session.mask().unwrap(), None);

    set_mode(&mut session, DrawMode::Circle);
    drag(&mut session, &[(60.0, 45.0), (80.0, 45.0)]);
    let png = session.mask().unwrap().unwrap();
    let mask = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(mask.dimensions(), (120, 90));

    let mut white = 0;
    for pixel in mask.pixels() {
        match pixel.0 {
            [255, 255, 255, 255] => white += 1,
            [0, 0, 0, 255] => {}
            other => panic!("non-binary mask pixel {other:?}"),
        }
    }
    assert!(white > 0);
    // Circle outline only; the centre stays unmasked.
    assert_eq!(mask.get_pixel(60, 45).0, [0, 0, 0, 255]);
}

#[test]
fn drawing_on_downscaled_canvas_lands_in_image_space() {
    let (mut session, _) = loaded_session(1600, 1200);
    session.set_canvas_area(ScreenPoint::new(0.0, 0.0), 800.0, 600.0);
    let geometry = *session.geometry().unwrap();
    assert_eq!(geometry.display_size_px(), (800, 600));

    // Screen (200, 150) is image (400, 300) at half display scale.
    drag(&mut session, &[(200.0, 150.0), (201.0, 150.0)]);
    let surface = session.surface().unwrap();
    let alpha = |x: u32, y: u32| surface.pixmap().pixels()[(y * surface.width() + x) as usize].alpha();
    assert!(alpha(401, 300) > 0);
    assert_eq!(alpha(201, 150), 0);
}

#[test]
fn overlapping_objects_resolve_to_newest() {
    let (mut session, _) = loaded_session(400, 400);
    let older = session.add_object(Arc::new(Pixmap::new(100, 100).unwrap())).unwrap();
    let newer = session.add_object(Arc::new(Pixmap::new(100, 100).unwrap())).unwrap();
    // Both land at the default offset: 100×100 at (50, 50).

    drag(&mut session, &[(100.0, 100.0), (130.0, 110.0)]);
    assert_eq!(session.objects().get(newer).unwrap().rect.x, 80.0);
    assert_eq!(session.objects().get(older).unwrap().rect.x, 50.0);
    assert!(session.history().is_empty());

    // Newer corner is at (180, 160); resize keeps the 1:1 aspect.
    drag(&mut session, &[(180.0, 160.0), (240.0, 20.0)]);
    let rect = session.objects().get(newer).unwrap().rect;
    assert_eq!((rect.width, rect.height), (160.0, 160.0));

    // Corner is now at (240, 220); a near-zero width clamps to the minimum.
    drag(&mut session, &[(240.0, 220.0), (81.0, 220.0)]);
    let rect = session.objects().get(newer).unwrap().rect;
    assert_eq!((rect.width, rect.height), (20.0, 20.0));
}

#[test]
fn generation_request_carries_both_artifacts() {
    let (mut session, _) = loaded_session(64, 48);
    let request = session.generation_request("make it snow").unwrap().unwrap();
    assert!(request.mask.is_none());

    drag(&mut session, &[(5.0, 5.0), (40.0, 30.0)]);
    let request = session.generation_request("make it snow").unwrap().unwrap();
    assert_eq!(request.prompt, "make it snow");
    assert!(request.mask.is_some());
    assert!(!request.image.is_empty());
}
