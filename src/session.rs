//! The editor's single session-state value.
//!
//! Every user-visible change goes through one of the named transitions
//! below; the shell never pokes at the individual components directly.

use std::sync::Arc;

use tiny_skia::Pixmap;

use crate::config::EditorConfig;
use crate::dispatch::Interaction;
use crate::error::{EditorError, Result};
use crate::export;
use crate::generate::GenerationRequest;
use crate::geometry::{ImagePoint, ScreenPoint};
use crate::history::History;
use crate::loader::{LoadOutcome, LoadTarget, LoadTicket};
use crate::overlay::{ObjectId, ObjectLayer, ObjectUpdate, PlacedObject};
use crate::raster::encode_png;
use crate::surface::{DrawingOptions, DrawingSurface, OptionsChange, Shape};
use crate::transform::{CanvasGeometry, ViewportTransform};

pub struct BaseImage {
    pixmap: Pixmap,
    ticket: LoadTicket,
}

impl BaseImage {
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScreenArea {
    min: ScreenPoint,
    width: f32,
    height: f32,
}

pub struct EditorSession {
    pub(crate) config: EditorConfig,
    pub(crate) base: Option<BaseImage>,
    pub(crate) surface: Option<DrawingSurface>,
    pub(crate) history: History,
    pub(crate) options: DrawingOptions,
    pub(crate) objects: ObjectLayer,
    pub(crate) view: ViewportTransform,
    pub(crate) geometry: Option<CanvasGeometry>,
    pub(crate) interaction: Interaction,
    area: Option<ScreenArea>,
    next_ticket: u64,
    pending_base: Option<LoadTicket>,
    pending_objects: Vec<LoadTicket>,
    revision: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let options = config.drawing;
        Self {
            config,
            base: None,
            surface: None,
            history: History::new(),
            options,
            objects: ObjectLayer::new(),
            view: ViewportTransform::default(),
            geometry: None,
            interaction: Interaction::Idle,
            area: None,
            next_ticket: 0,
            pending_base: None,
            pending_objects: Vec::new(),
            revision: 0,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn base(&self) -> Option<&BaseImage> {
        self.base.as_ref()
    }

    pub fn surface(&self) -> Option<&DrawingSurface> {
        self.surface.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn options(&self) -> &DrawingOptions {
        &self.options
    }

    pub fn objects(&self) -> &ObjectLayer {
        &self.objects
    }

    pub fn view(&self) -> &ViewportTransform {
        &self.view
    }

    pub fn geometry(&self) -> Option<&CanvasGeometry> {
        self.geometry.as_ref()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Bumped by every transition that changes what the viewport shows.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loading(&self) -> bool {
        self.pending_base.is_some() || !self.pending_objects.is_empty()
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn to_image_space(&self, p: ScreenPoint) -> Option<ImagePoint> {
        self.geometry.map(|g| g.to_image_space(&self.view, p))
    }

    pub fn to_screen_space(&self, p: ImagePoint) -> Option<ScreenPoint> {
        self.geometry.map(|g| g.to_screen_space(&self.view, p))
    }

    // ── Image lifecycle ─────────────────────────────────────────────────

    fn issue_ticket(&mut self) -> LoadTicket {
        self.next_ticket += 1;
        LoadTicket(self.next_ticket)
    }

    /// Start a base-image load. Only the most recently issued base ticket
    /// will be accepted by `finish_load`.
    pub fn request_base_load(&mut self) -> LoadTicket {
        let ticket = self.issue_ticket();
        self.pending_base = Some(ticket);
        ticket
    }

    pub fn request_object_load(&mut self) -> LoadTicket {
        let ticket = self.issue_ticket();
        self.pending_objects.push(ticket);
        ticket
    }

    /// Apply a finished decode. Returns whether the session changed.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> bool {
        match outcome.target {
            LoadTarget::Base => {
                if self.pending_base != Some(outcome.ticket) {
                    tracing::warn!("discarding stale base image load {:?}", outcome.ticket);
                    return false;
                }
                self.pending_base = None;
                match outcome.result {
                    Ok(pixmap) => self.install_base(pixmap, outcome.ticket),
                    Err(e) => {
                        tracing::warn!("base image unavailable: {e}");
                        false
                    }
                }
            }
            LoadTarget::Object => {
                let Some(index) = self.pending_objects.iter().position(|t| *t == outcome.ticket)
                else {
                    tracing::warn!("discarding stale object load {:?}", outcome.ticket);
                    return false;
                };
                self.pending_objects.swap_remove(index);
                match outcome.result {
                    Ok(pixmap) => match self.add_object(Arc::new(pixmap)) {
                        Ok(_) => true,
                        Err(e) => {
                            tracing::warn!("cannot place object: {e}");
                            false
                        }
                    },
                    Err(e) => {
                        tracing::warn!("object image unavailable: {e}");
                        false
                    }
                }
            }
        }
    }

    /// Replace the base image synchronously, e.g. when a generated result
    /// is picked. Any pending base load is superseded.
    pub fn set_base_image(&mut self, pixmap: Pixmap) -> Result<()> {
        let ticket = self.request_base_load();
        self.pending_base = None;
        let (width, height) = (pixmap.width(), pixmap.height());
        if self.install_base(pixmap, ticket) {
            Ok(())
        } else {
            Err(EditorError::InvalidDimensions { width, height })
        }
    }

    fn install_base(&mut self, pixmap: Pixmap, ticket: LoadTicket) -> bool {
        let surface = match DrawingSurface::new(pixmap.width(), pixmap.height()) {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("cannot create drawing surface: {e}");
                return false;
            }
        };
        tracing::info!(
            width = pixmap.width(),
            height = pixmap.height(),
            "installed base image {:?}",
            ticket
        );

        self.surface = Some(surface);
        self.history.clear();
        self.objects.clear();
        self.pending_objects.clear();
        self.view.reset();
        self.interaction = Interaction::Idle;
        self.base = Some(BaseImage { pixmap, ticket });
        self.refresh_geometry();
        self.touch();
        true
    }

    /// Tell the session where on screen the canvas may be laid out.
    /// Returns whether the canvas geometry changed.
    pub fn set_canvas_area(&mut self, min: ScreenPoint, width: f32, height: f32) -> bool {
        let area = ScreenArea { min, width, height };
        if self.area == Some(area) {
            return false;
        }
        self.area = Some(area);
        let before = self.geometry;
        self.refresh_geometry();
        if self.geometry != before {
            self.touch();
            true
        } else {
            false
        }
    }

    fn refresh_geometry(&mut self) {
        self.geometry = self.base.as_ref().map(|base| match self.area {
            Some(area) => CanvasGeometry::fit(
                base.width(),
                base.height(),
                area.min,
                area.width,
                area.height,
            ),
            None => CanvasGeometry::native(base.width(), base.height()),
        });
    }

    // ── Objects ─────────────────────────────────────────────────────────

    pub fn add_object(&mut self, source: Arc<Pixmap>) -> Result<ObjectId> {
        let canvas_width = self.base.as_ref().ok_or(EditorError::NoBaseImage)?.width() as f32;
        let id = self.objects.add(
            source,
            canvas_width,
            self.config.object_width_fraction,
            self.config.default_object_offset,
        );
        tracing::info!("placed object {id}");
        self.touch();
        Ok(id)
    }

    pub fn update_object(&mut self, id: ObjectId, update: ObjectUpdate) -> Result<()> {
        self.objects.update(id, update)?;
        self.touch();
        Ok(())
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<PlacedObject> {
        let removed = self.objects.remove(id)?;
        if matches!(
            self.interaction,
            Interaction::Moving { id: active, .. } | Interaction::Resizing { id: active, .. } if active == id
        ) {
            self.interaction = Interaction::Idle;
        }
        tracing::info!("removed object {id}");
        self.touch();
        Some(removed)
    }

    pub fn select_object(&mut self, id: Option<ObjectId>) {
        if self.objects.selected() != id {
            self.objects.select(id);
            self.touch();
        }
    }

    // ── Strokes ─────────────────────────────────────────────────────────

    pub fn set_options(&mut self, change: OptionsChange) {
        self.options.apply(change);
    }

    /// Start a stroke at `p` with the current options. Freehand modes
    /// snapshot the surface and mark it immediately; shape modes only record
    /// the start point.
    pub fn begin_stroke(&mut self, p: ImagePoint) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        let options = self.options;
        if options.mode.is_freehand() {
            self.history.push(surface.snapshot());
            surface.stamp_dot(p, &options);
        }
        tracing::debug!(mode = ?options.mode, "stroke started at ({:.1}, {:.1})", p.x, p.y);
        self.interaction = Interaction::Drawing { start: p, last: p, options };
        self.touch();
        true
    }

    pub fn extend_stroke(&mut self, p: ImagePoint) -> bool {
        let Interaction::Drawing { start, last, options } = self.interaction else {
            return false;
        };
        if options.mode.is_freehand() {
            if let Some(surface) = self.surface.as_mut() {
                surface.stroke_segment(last, p, &options);
            }
        }
        self.interaction = Interaction::Drawing { start, last: p, options };
        self.touch();
        true
    }

    /// Finish the active stroke. Shapes are committed here, after a
    /// snapshot of the pre-shape surface.
    pub fn end_stroke(&mut self) -> bool {
        let Interaction::Drawing { start, last, options } = self.interaction else {
            return false;
        };
        self.interaction = Interaction::Idle;
        if let Some(shape) = Shape::from_gesture(options.mode, start, last) {
            if let Some(surface) = self.surface.as_mut() {
                self.history.push(surface.snapshot());
                surface.stroke_shape(&shape, &options);
            }
        }
        tracing::debug!(entries = self.history.len(), "stroke finished");
        self.touch();
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        match self.history.undo() {
            Some(snapshot) => {
                surface.restore(snapshot);
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
        tracing::info!("drawing cleared");
        self.touch();
    }

    // ── Viewport ────────────────────────────────────────────────────────

    /// Zoom by `factor` keeping the image point under `p` fixed.
    pub fn zoom_at(&mut self, p: ScreenPoint, factor: f32) -> bool {
        let Some(geometry) = self.geometry else {
            return false;
        };
        let new_scale = self.config.clamp_scale(self.view.scale * factor);
        if new_scale == self.view.scale {
            return false;
        }
        let (ax, ay) = geometry.screen_to_canvas(p);
        self.view.zoom_about(ax, ay, new_scale);
        self.touch();
        true
    }

    fn canvas_centre(&self) -> Option<ScreenPoint> {
        self.geometry.map(|g| {
            ScreenPoint::new(
                g.origin.x + g.display_width * 0.5,
                g.origin.y + g.display_height * 0.5,
            )
        })
    }

    pub fn zoom_in(&mut self) -> bool {
        let step = self.config.zoom_step;
        self.canvas_centre().is_some_and(|c| self.zoom_at(c, step))
    }

    pub fn zoom_out(&mut self) -> bool {
        let step = 1.0 / self.config.zoom_step;
        self.canvas_centre().is_some_and(|c| self.zoom_at(c, step))
    }

    pub fn reset_zoom(&mut self) -> bool {
        if self.view == ViewportTransform::default() {
            return false;
        }
        self.view.reset();
        self.touch();
        true
    }

    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.view.pan(dx, dy);
        self.touch();
        true
    }

    // ── Export ──────────────────────────────────────────────────────────

    /// Base image, strokes and objects flattened at native resolution and
    /// PNG-encoded. `None` when no image is loaded.
    pub fn combined_image(&self) -> Result<Option<Vec<u8>>> {
        let (Some(base), Some(surface)) = (&self.base, &self.surface) else {
            return Ok(None);
        };
        let flat = export::flatten(base.pixmap(), surface, self.objects.iter());
        Ok(Some(encode_png(&flat)?))
    }

    /// Binary stroke mask as PNG, or `None` when nothing was drawn.
    pub fn mask(&self) -> Result<Option<Vec<u8>>> {
        if self.history.is_empty() {
            return Ok(None);
        }
        let Some(surface) = &self.surface else {
            return Ok(None);
        };
        Ok(Some(encode_png(&export::build_mask(surface)?)?))
    }

    pub fn generation_request(&self, prompt: &str) -> Result<Option<GenerationRequest>> {
        let Some(image) = self.combined_image()? else {
            return Ok(None);
        };
        let mask = self.mask()?;
        Ok(Some(GenerationRequest::new(prompt, &image, mask.as_deref())))
    }
}
