//! The drawing layer: a native-resolution raster holding only user strokes.

use serde::{Deserialize, Serialize};
use tiny_skia::{
    BlendMode, Color, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Rect, Stroke,
    Transform,
};

use crate::error::{EditorError, Result};
use crate::geometry::{ImagePoint, ImageRect};
use crate::history::Snapshot;

// ── Options ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    Brush,
    Eraser,
    Line,
    Rectangle,
    Circle,
}

impl DrawMode {
    pub const ALL: [DrawMode; 5] = [
        DrawMode::Brush,
        DrawMode::Eraser,
        DrawMode::Line,
        DrawMode::Rectangle,
        DrawMode::Circle,
    ];

    /// Brush and eraser paint continuously while the pointer moves; the
    /// other modes commit a single shape on release.
    pub fn is_freehand(self) -> bool {
        matches!(self, DrawMode::Brush | DrawMode::Eraser)
    }

    pub fn label(self) -> &'static str {
        match self {
            DrawMode::Brush => "Brush",
            DrawMode::Eraser => "Eraser",
            DrawMode::Line => "Line",
            DrawMode::Rectangle => "Rectangle",
            DrawMode::Circle => "Circle",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    pub fn from_rgba8(c: [u8; 4]) -> Self {
        Self {
            r: c[0] as f32 / 255.0,
            g: c[1] as f32 / 255.0,
            b: c[2] as f32 / 255.0,
            a: c[3] as f32 / 255.0,
        }
    }
}

impl Default for Color4 {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingOptions {
    pub color: Color4,
    pub stroke_width: f32,
    pub mode: DrawMode,
}

impl Default for DrawingOptions {
    fn default() -> Self {
        Self {
            color: Color4::default(),
            stroke_width: 5.0,
            mode: DrawMode::Brush,
        }
    }
}

/// Partial update emitted by the toolbar; absent fields are left alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptionsChange {
    pub mode: Option<DrawMode>,
    pub color: Option<Color4>,
    pub size: Option<f32>,
}

impl DrawingOptions {
    pub fn apply(&mut self, change: OptionsChange) {
        if let Some(mode) = change.mode {
            self.mode = mode;
        }
        if let Some(color) = change.color {
            self.color = color;
        }
        if let Some(size) = change.size {
            self.stroke_width = size.max(1.0);
        }
    }

    fn paint(&self) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.anti_alias = true;
        if self.mode == DrawMode::Eraser {
            paint.set_color_rgba8(0, 0, 0, 255);
            paint.blend_mode = BlendMode::DestinationOut;
        } else {
            let [r, g, b, a] = self.color.to_rgba8();
            paint.set_color_rgba8(r, g, b, a);
        }
        paint
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            width: self.stroke_width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        }
    }
}

// ── Shapes ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Line { from: ImagePoint, to: ImagePoint },
    Rectangle(ImageRect),
    Circle { center: ImagePoint, radius: f32 },
}

impl Shape {
    /// Shape described by a drag from `start` to `end`; `None` for the
    /// freehand modes.
    pub fn from_gesture(mode: DrawMode, start: ImagePoint, end: ImagePoint) -> Option<Shape> {
        match mode {
            DrawMode::Brush | DrawMode::Eraser => None,
            DrawMode::Line => Some(Shape::Line { from: start, to: end }),
            DrawMode::Rectangle => Some(Shape::Rectangle(ImageRect::from_corners(start, end))),
            DrawMode::Circle => Some(Shape::Circle {
                center: start,
                radius: start.distance(end),
            }),
        }
    }

    /// Outline path in image space. Degenerate shapes have no path.
    pub fn to_path(&self) -> Option<Path> {
        match *self {
            Shape::Line { from, to } => segment_path(from, to),
            Shape::Rectangle(r) => {
                Rect::from_xywh(r.x, r.y, r.width, r.height).map(PathBuilder::from_rect)
            }
            Shape::Circle { center, radius } => PathBuilder::from_circle(center.x, center.y, radius),
        }
    }
}

fn segment_path(from: ImagePoint, to: ImagePoint) -> Option<Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(from.x, from.y);
    pb.line_to(to.x, to.y);
    pb.finish()
}

/// Stroke a shape outline onto any pixmap through `transform`. Shared by the
/// surface commit and the renderer's live preview.
pub fn stroke_shape_onto(
    pixmap: &mut Pixmap,
    shape: &Shape,
    options: &DrawingOptions,
    transform: Transform,
) {
    if let Some(path) = shape.to_path() {
        pixmap.stroke_path(&path, &options.paint(), &options.stroke(), transform, None);
    }
}

// ── Surface ─────────────────────────────────────────────────────────────────

pub struct DrawingSurface {
    pixmap: Pixmap,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(EditorError::InvalidDimensions { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.pixmap.clone())
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        let pixmap = snapshot.into_pixmap();
        if pixmap.width() == self.pixmap.width() && pixmap.height() == self.pixmap.height() {
            self.pixmap = pixmap;
        } else {
            tracing::warn!(
                "ignoring {}x{} snapshot for {}x{} surface",
                pixmap.width(),
                pixmap.height(),
                self.pixmap.width(),
                self.pixmap.height()
            );
        }
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|p| p.alpha() == 0)
    }

    /// Round dot at the start of a freehand stroke, so a click without
    /// movement still leaves a mark.
    pub fn stamp_dot(&mut self, at: ImagePoint, options: &DrawingOptions) {
        let radius = options.stroke_width * 0.5;
        if let Some(path) = PathBuilder::from_circle(at.x, at.y, radius) {
            self.pixmap.fill_path(
                &path,
                &options.paint(),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// Stroke one incremental freehand segment directly into the surface.
    pub fn stroke_segment(&mut self, from: ImagePoint, to: ImagePoint, options: &DrawingOptions) {
        if let Some(path) = segment_path(from, to) {
            self.pixmap.stroke_path(
                &path,
                &options.paint(),
                &options.stroke(),
                Transform::identity(),
                None,
            );
        }
    }

    pub fn stroke_shape(&mut self, shape: &Shape, options: &DrawingOptions) {
        stroke_shape_onto(&mut self.pixmap, shape, options, Transform::identity());
    }
}
