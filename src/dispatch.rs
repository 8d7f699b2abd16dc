//! Pointer/toolbar events and the gesture state machine.
//!
//! ```text
//! Idle ──down(secondary/middle)──▶ Panning
//!      ──down(on handle)─────────▶ Resizing(id)
//!      ──down(on object)─────────▶ Moving(id)
//!      ──down(elsewhere)─────────▶ Drawing
//! any  ──up / leave──────────────▶ Idle
//! ```

use crate::geometry::{ImagePoint, ScreenPoint};
use crate::overlay::{HitKind, ObjectId};
use crate::session::EditorSession;
use crate::surface::{DrawingOptions, OptionsChange};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolbarAction {
    Options(OptionsChange),
    Undo,
    Clear,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    RemoveSelected,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditorEvent {
    PointerDown { pos: ScreenPoint, button: PointerButton },
    PointerMove { pos: ScreenPoint },
    PointerUp { pos: ScreenPoint },
    PointerLeave,
    /// Positive `delta` zooms in.
    Wheel { pos: ScreenPoint, delta: f32 },
    Toolbar(ToolbarAction),
}

/// State of the gesture in progress, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    /// `options` is the brush state captured at pointer-down; toolbar
    /// changes only apply from the next gesture on.
    Drawing {
        start: ImagePoint,
        last: ImagePoint,
        options: DrawingOptions,
    },
    Panning { last: ScreenPoint },
    Moving { id: ObjectId, anchor: (f32, f32) },
    Resizing { id: ObjectId, aspect: f32 },
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }
}

impl EditorSession {
    /// Feed one event through the state machine. Returns whether the
    /// viewport needs to be redrawn.
    pub fn dispatch(&mut self, event: EditorEvent) -> bool {
        match event {
            EditorEvent::PointerDown { pos, button } => self.pointer_down(pos, button),
            EditorEvent::PointerMove { pos } => self.pointer_move(pos),
            EditorEvent::PointerUp { pos } => {
                let moved = self.pointer_move(pos);
                self.finish_interaction() || moved
            }
            EditorEvent::PointerLeave => self.finish_interaction(),
            EditorEvent::Wheel { pos, delta } => {
                if delta == 0.0 {
                    return false;
                }
                let step = self.config.wheel_zoom_step;
                let factor = if delta > 0.0 { step } else { 1.0 / step };
                self.zoom_at(pos, factor)
            }
            EditorEvent::Toolbar(action) => self.apply_toolbar(action),
        }
    }

    fn apply_toolbar(&mut self, action: ToolbarAction) -> bool {
        match action {
            ToolbarAction::Options(change) => {
                self.set_options(change);
                false
            }
            ToolbarAction::Undo => self.undo(),
            ToolbarAction::Clear => {
                self.clear();
                true
            }
            ToolbarAction::ZoomIn => self.zoom_in(),
            ToolbarAction::ZoomOut => self.zoom_out(),
            ToolbarAction::ResetZoom => self.reset_zoom(),
            ToolbarAction::RemoveSelected => match self.objects.selected() {
                Some(id) => self.remove_object(id).is_some(),
                None => false,
            },
        }
    }

    fn pointer_down(&mut self, pos: ScreenPoint, button: PointerButton) -> bool {
        // A down without a matching up (e.g. release outside the window)
        // closes the previous gesture first.
        let finished = self.finish_interaction();

        if matches!(button, PointerButton::Secondary | PointerButton::Middle) {
            self.interaction = Interaction::Panning { last: pos };
            tracing::debug!("pan started");
            return finished;
        }

        let Some(geometry) = self.geometry else {
            return finished;
        };
        let p = geometry.to_image_space(&self.view, pos);
        let half = geometry.screen_len_to_image(&self.view, self.config.handle_size * 0.5);

        if let Some(hit) = self.objects.hit_test(p, half) {
            self.select_object(Some(hit.id));
            self.interaction = match hit.kind {
                HitKind::Resize => {
                    let aspect = self.objects.get(hit.id).map_or(1.0, |o| o.aspect());
                    Interaction::Resizing { id: hit.id, aspect }
                }
                HitKind::Move => {
                    let anchor = self.objects.drag_anchor(hit.id, p).unwrap_or_default();
                    Interaction::Moving { id: hit.id, anchor }
                }
            };
            tracing::debug!(kind = ?hit.kind, "object gesture on {}", hit.id);
            return true;
        }

        self.select_object(None);
        self.begin_stroke(p) || finished
    }

    fn pointer_move(&mut self, pos: ScreenPoint) -> bool {
        match self.interaction {
            Interaction::Idle => false,
            Interaction::Panning { last } => {
                self.interaction = Interaction::Panning { last: pos };
                self.pan(pos.x - last.x, pos.y - last.y)
            }
            Interaction::Moving { id, anchor } => {
                let Some(p) = self.to_image_space(pos) else {
                    return false;
                };
                self.objects.move_to(id, p, anchor);
                self.touch();
                true
            }
            Interaction::Resizing { id, aspect } => {
                let Some(p) = self.to_image_space(pos) else {
                    return false;
                };
                self.objects.resize_to(id, p, aspect, self.config.min_object_size);
                self.touch();
                true
            }
            Interaction::Drawing { .. } => match self.to_image_space(pos) {
                Some(p) => self.extend_stroke(p),
                None => false,
            },
        }
    }

    /// Close whatever gesture is active. A no-op when idle.
    pub fn finish_interaction(&mut self) -> bool {
        match self.interaction {
            Interaction::Idle => false,
            Interaction::Drawing { .. } => self.end_stroke(),
            Interaction::Panning { .. }
            | Interaction::Moving { .. }
            | Interaction::Resizing { .. } => {
                self.interaction = Interaction::Idle;
                tracing::debug!("gesture finished");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::DrawMode;
    use std::sync::Arc;
    use tiny_skia::Pixmap;

    fn session() -> EditorSession {
        let mut session = EditorSession::default();
        session.set_base_image(Pixmap::new(200, 200).unwrap()).unwrap();
        session
    }

    fn down(x: f32, y: f32) -> EditorEvent {
        EditorEvent::PointerDown { pos: ScreenPoint::new(x, y), button: PointerButton::Primary }
    }

    fn mv(x: f32, y: f32) -> EditorEvent {
        EditorEvent::PointerMove { pos: ScreenPoint::new(x, y) }
    }

    fn up(x: f32, y: f32) -> EditorEvent {
        EditorEvent::PointerUp { pos: ScreenPoint::new(x, y) }
    }

    #[test]
    fn secondary_button_pans() {
        let mut s = session();
        s.dispatch(EditorEvent::PointerDown {
            pos: ScreenPoint::new(10.0, 10.0),
            button: PointerButton::Secondary,
        });
        s.dispatch(mv(25.0, 5.0));
        s.dispatch(up(30.0, 0.0));
        assert_eq!((s.view().offset_x, s.view().offset_y), (20.0, -10.0));
        assert!(s.history().is_empty());
        assert!(s.interaction().is_idle());
    }

    #[test]
    fn primary_on_empty_canvas_draws() {
        let mut s = session();
        s.dispatch(down(10.0, 10.0));
        assert!(matches!(s.interaction(), Interaction::Drawing { .. }));
        s.dispatch(mv(50.0, 50.0));
        s.dispatch(up(90.0, 60.0));
        assert!(s.interaction().is_idle());
        assert_eq!(s.history().len(), 1);
        assert!(!s.surface().unwrap().is_blank());
    }

    #[test]
    fn object_body_moves_and_handle_resizes() {
        let mut s = session();
        let id = s.add_object(Arc::new(Pixmap::new(100, 50).unwrap())).unwrap();
        // 25% of 200 → 50×25 at (50, 50); corner at (100, 75).

        s.dispatch(down(60.0, 60.0));
        assert!(matches!(s.interaction(), Interaction::Moving { .. }));
        s.dispatch(mv(70.0, 80.0));
        s.dispatch(up(70.0, 80.0));
        let rect = s.objects().get(id).unwrap().rect;
        assert_eq!((rect.x, rect.y), (60.0, 70.0));

        // Corner is now at (110, 95).
        s.dispatch(down(110.0, 95.0));
        assert!(matches!(s.interaction(), Interaction::Resizing { .. }));
        s.dispatch(mv(160.0, 10.0));
        s.dispatch(up(160.0, 10.0));
        let rect = s.objects().get(id).unwrap().rect;
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (60.0, 70.0, 100.0, 50.0));

        assert!(s.history().is_empty());
    }

    #[test]
    fn handle_hit_area_is_constant_on_screen() {
        let mut s = session();
        s.add_object(Arc::new(Pixmap::new(100, 100).unwrap())).unwrap();
        // Object spans (50,50)-(100,100). At 4× the 5px screen half-handle
        // covers 1.25 image px, so 4px off the corner hits and 7px misses.
        for _ in 0..10 {
            s.zoom_in();
        }
        let corner = s.to_screen_space(ImagePoint::new(100.0, 100.0)).unwrap();
        s.dispatch(down(corner.x + 4.0, corner.y + 4.0));
        assert!(matches!(s.interaction(), Interaction::Resizing { .. }));
        s.dispatch(EditorEvent::PointerLeave);

        s.dispatch(down(corner.x + 7.0, corner.y + 7.0));
        assert!(matches!(s.interaction(), Interaction::Drawing { .. }));
    }

    #[test]
    fn leave_commits_shape() {
        let mut s = session();
        s.dispatch(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
            mode: Some(DrawMode::Rectangle),
            ..Default::default()
        })));
        s.dispatch(down(20.0, 20.0));
        s.dispatch(mv(80.0, 80.0));
        assert!(s.surface().unwrap().is_blank());
        s.dispatch(EditorEvent::PointerLeave);
        assert!(s.interaction().is_idle());
        assert_eq!(s.history().len(), 1);
        assert!(!s.surface().unwrap().is_blank());
    }

    #[test]
    fn second_down_commits_pending_shape() {
        let mut s = session();
        s.dispatch(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
            mode: Some(DrawMode::Rectangle),
            ..Default::default()
        })));
        s.dispatch(down(20.0, 20.0));
        s.dispatch(mv(80.0, 80.0));
        assert!(s.surface().unwrap().is_blank());

        // No up in between, e.g. the release happened outside the window.
        s.dispatch(down(120.0, 130.0));
        assert_eq!(s.history().len(), 1);
        assert!(!s.surface().unwrap().is_blank());
        match *s.interaction() {
            Interaction::Drawing { start, last, options } => {
                assert_eq!(start, ImagePoint::new(120.0, 130.0));
                assert_eq!(last, start);
                assert_eq!(options.mode, DrawMode::Rectangle);
            }
            other => panic!("expected a new drawing gesture, got {other:?}"),
        }

        s.dispatch(up(150.0, 160.0));
        assert_eq!(s.history().len(), 2);
        assert!(s.interaction().is_idle());
    }

    #[test]
    fn pan_interrupted_by_primary_down_starts_stroke() {
        let mut s = session();
        s.dispatch(EditorEvent::PointerDown {
            pos: ScreenPoint::new(10.0, 10.0),
            button: PointerButton::Middle,
        });
        s.dispatch(down(30.0, 30.0));
        assert!(matches!(s.interaction(), Interaction::Drawing { .. }));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn stray_up_is_absorbed() {
        let mut s = session();
        let revision = s.revision();
        assert!(!s.dispatch(up(5.0, 5.0)));
        assert!(!s.dispatch(EditorEvent::PointerLeave));
        assert_eq!(s.revision(), revision);
    }

    #[test]
    fn wheel_zooms_towards_cursor() {
        let mut s = session();
        let cursor = ScreenPoint::new(120.0, 40.0);
        let before = s.to_image_space(cursor).unwrap();
        assert!(s.dispatch(EditorEvent::Wheel { pos: cursor, delta: 1.0 }));
        let after = s.to_image_space(cursor).unwrap();
        assert!((before.x - after.x).abs() < 1e-3 && (before.y - after.y).abs() < 1e-3);
        assert!(s.view().scale > 1.0);
    }

    #[test]
    fn remove_selected_from_toolbar() {
        let mut s = session();
        s.add_object(Arc::new(Pixmap::new(10, 10).unwrap())).unwrap();
        assert!(s.dispatch(EditorEvent::Toolbar(ToolbarAction::RemoveSelected)));
        assert!(s.objects().is_empty());
        assert!(!s.dispatch(EditorEvent::Toolbar(ToolbarAction::RemoveSelected)));
    }
}
