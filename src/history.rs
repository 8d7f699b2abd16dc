use tiny_skia::Pixmap;

/// Full copy of the drawing surface taken right before a stroke mutates it.
#[derive(Clone)]
pub struct Snapshot {
    pixmap: Pixmap,
}

impl Snapshot {
    pub fn new(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn byte_len(&self) -> usize {
        self.pixmap.data().len()
    }
}

/// Undo log over the drawing surface.
///
/// Every entry is a full raster copy, so memory grows with
/// `strokes × width × height`. Fine for an editing session, not meant for
/// huge canvases.
#[derive(Clone, Default)]
pub struct History {
    stack: Vec<Snapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        tracing::debug!(
            entries = self.stack.len() + 1,
            bytes = snapshot.byte_len(),
            "history push"
        );
        self.stack.push(snapshot);
    }

    /// Pop the most recent pre-stroke snapshot, or `None` when there is
    /// nothing left to undo.
    pub fn undo(&mut self) -> Option<Snapshot> {
        self.stack.pop()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn memory_size(&self) -> usize {
        self.stack.iter().map(Snapshot::byte_len).sum()
    }
}
