//! Placeable object images layered over the base image.

use std::fmt;
use std::sync::Arc;

use tiny_skia::Pixmap;

use crate::error::{EditorError, Result};
use crate::geometry::{ImagePoint, ImageRect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub source: Arc<Pixmap>,
    /// Position and size in image space.
    pub rect: ImageRect,
}

impl PlacedObject {
    pub fn aspect(&self) -> f32 {
        if self.rect.width > 0.0 {
            self.rect.height / self.rect.width
        } else {
            1.0
        }
    }

    fn handle_contains(&self, p: ImagePoint, half: (f32, f32)) -> bool {
        (p.x - self.rect.right()).abs() <= half.0 && (p.y - self.rect.bottom()).abs() <= half.1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitKind {
    Resize,
    Move,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub id: ObjectId,
    pub kind: HitKind,
}

/// Objects in insertion order; later entries are drawn on top.
#[derive(Default)]
pub struct ObjectLayer {
    objects: Vec<PlacedObject>,
    next_id: u64,
    selected: Option<ObjectId>,
}

impl ObjectLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `source` at `offset`, `width_fraction` of the canvas width wide,
    /// keeping the source aspect ratio. The new object becomes selected.
    pub fn add(
        &mut self,
        source: Arc<Pixmap>,
        canvas_width: f32,
        width_fraction: f32,
        offset: [f32; 2],
    ) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let width = (canvas_width * width_fraction).max(1.0);
        let height = width * source.height() as f32 / source.width().max(1) as f32;
        self.objects.push(PlacedObject {
            id,
            source,
            rect: ImageRect {
                x: offset[0],
                y: offset[1],
                width,
                height,
            },
        });
        self.selected = Some(id);
        id
    }

    pub fn update(&mut self, id: ObjectId, update: ObjectUpdate) -> Result<()> {
        let object = self.get_mut(id).ok_or(EditorError::UnknownObject(id))?;
        if let Some(x) = update.x {
            object.rect.x = x;
        }
        if let Some(y) = update.y {
            object.rect.y = y;
        }
        if let Some(width) = update.width {
            object.rect.width = width;
        }
        if let Some(height) = update.height {
            object.rect.height = height;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<PlacedObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.objects.remove(index))
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.selected = None;
    }

    pub fn get(&self, id: ObjectId) -> Option<&PlacedObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut PlacedObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<ObjectId>) {
        self.selected = id.filter(|id| self.get(*id).is_some());
    }

    /// Topmost object under `p`. Each object's corner handle is tested
    /// before its body, and the first object that matches either wins.
    /// `handle_half` is the handle's half-extent in image space.
    pub fn hit_test(&self, p: ImagePoint, handle_half: (f32, f32)) -> Option<Hit> {
        self.objects.iter().rev().find_map(|object| {
            if object.handle_contains(p, handle_half) {
                Some(Hit { id: object.id, kind: HitKind::Resize })
            } else if object.rect.contains(p) {
                Some(Hit { id: object.id, kind: HitKind::Move })
            } else {
                None
            }
        })
    }

    /// Pointer offset from the object's origin, captured when a move starts.
    pub fn drag_anchor(&self, id: ObjectId, p: ImagePoint) -> Option<(f32, f32)> {
        self.get(id).map(|o| (p.x - o.rect.x, p.y - o.rect.y))
    }

    pub fn move_to(&mut self, id: ObjectId, p: ImagePoint, anchor: (f32, f32)) {
        if let Some(object) = self.get_mut(id) {
            object.rect.x = p.x - anchor.0;
            object.rect.y = p.y - anchor.1;
        }
    }

    /// Corner-handle resize: the top-left stays put, width follows the
    /// pointer (never below `min_width`) and height is derived from `aspect`.
    pub fn resize_to(&mut self, id: ObjectId, p: ImagePoint, aspect: f32, min_width: f32) {
        if let Some(object) = self.get_mut(id) {
            let width = (p.x - object.rect.x).max(min_width);
            object.rect.width = width;
            object.rect.height = width * aspect;
        }
    }
}
