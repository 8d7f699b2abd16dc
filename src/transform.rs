//! Screen-space ↔ image-space mapping.
//!
//! Three coordinate systems are involved:
//!
//! * screen: pointer positions as reported by the windowing layer,
//! * canvas: pixels of the display canvas (screen minus the canvas origin),
//! * image: natural pixels of the base image.
//!
//! The viewport transform (pan + zoom) maps canvas content to canvas pixels,
//! and the display canvas is a possibly down-scaled copy of the native image,
//! so image → canvas additionally scales by `display / natural` per axis.

use tiny_skia::Transform;

use crate::geometry::{ImagePoint, ScreenPoint};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewportTransform {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Change the scale while keeping the content under the canvas-space
    /// anchor `(ax, ay)` fixed.
    pub fn zoom_about(&mut self, ax: f32, ay: f32, new_scale: f32) {
        let cx = (ax - self.offset_x) / self.scale;
        let cy = (ay - self.offset_y) / self.scale;
        self.offset_x = ax - cx * new_scale;
        self.offset_y = ay - cy * new_scale;
        self.scale = new_scale;
    }

    pub fn to_skia(&self) -> Transform {
        Transform::from_row(self.scale, 0.0, 0.0, self.scale, self.offset_x, self.offset_y)
    }
}

/// Placement of the display canvas on screen and its size relative to the
/// native image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasGeometry {
    pub origin: ScreenPoint,
    pub display_width: f32,
    pub display_height: f32,
    pub natural_width: f32,
    pub natural_height: f32,
}

impl CanvasGeometry {
    /// Display canvas at native resolution, anchored at the screen origin.
    pub fn native(natural_width: u32, natural_height: u32) -> Self {
        Self {
            origin: ScreenPoint::default(),
            display_width: natural_width as f32,
            display_height: natural_height as f32,
            natural_width: natural_width as f32,
            natural_height: natural_height as f32,
        }
    }

    /// Fit the natural image inside the available screen area without
    /// up-scaling, centred in that area.
    pub fn fit(
        natural_width: u32,
        natural_height: u32,
        area_min: ScreenPoint,
        area_width: f32,
        area_height: f32,
    ) -> Self {
        let nw = natural_width.max(1) as f32;
        let nh = natural_height.max(1) as f32;
        let ratio = (area_width / nw).min(area_height / nh).min(1.0).max(0.0);
        let display_width = (nw * ratio).floor().max(1.0);
        let display_height = (nh * ratio).floor().max(1.0);
        Self {
            origin: ScreenPoint::new(
                (area_min.x + (area_width - display_width) * 0.5).round(),
                (area_min.y + (area_height - display_height) * 0.5).round(),
            ),
            display_width,
            display_height,
            natural_width: nw,
            natural_height: nh,
        }
    }

    pub fn ratio_x(&self) -> f32 {
        self.display_width / self.natural_width
    }

    pub fn ratio_y(&self) -> f32 {
        self.display_height / self.natural_height
    }

    pub fn display_size_px(&self) -> (u32, u32) {
        (self.display_width as u32, self.display_height as u32)
    }

    /// Screen point relative to the canvas origin.
    pub fn screen_to_canvas(&self, p: ScreenPoint) -> (f32, f32) {
        (p.x - self.origin.x, p.y - self.origin.y)
    }

    pub fn to_image_space(&self, view: &ViewportTransform, p: ScreenPoint) -> ImagePoint {
        let (qx, qy) = self.screen_to_canvas(p);
        let cx = (qx - view.offset_x) / view.scale;
        let cy = (qy - view.offset_y) / view.scale;
        ImagePoint::new(cx / self.ratio_x(), cy / self.ratio_y())
    }

    pub fn to_screen_space(&self, view: &ViewportTransform, p: ImagePoint) -> ScreenPoint {
        let cx = p.x * self.ratio_x();
        let cy = p.y * self.ratio_y();
        ScreenPoint::new(
            cx * view.scale + view.offset_x + self.origin.x,
            cy * view.scale + view.offset_y + self.origin.y,
        )
    }

    /// Full image-space → canvas-pixel transform used by the renderer.
    pub fn image_to_canvas(&self, view: &ViewportTransform) -> Transform {
        view.to_skia().pre_scale(self.ratio_x(), self.ratio_y())
    }

    /// Image-space extent of a length that should appear `screen_len`
    /// pixels long on screen at the current zoom.
    pub fn screen_len_to_image(&self, view: &ViewportTransform, screen_len: f32) -> (f32, f32) {
        (
            screen_len / (view.scale * self.ratio_x()),
            screen_len / (view.scale * self.ratio_y()),
        )
    }
}
