//! Off-thread image decoding.
//!
//! Requests go to a single worker thread over a channel and decoded pixmaps
//! come back tagged with the `LoadTicket` they were issued under. The session
//! owns ticket issuance and drops results whose ticket is no longer current.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tiny_skia::Pixmap;

use crate::error::{EditorError, Result};
use crate::raster::pixmap_from_rgba;

#[derive(Clone, Debug)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Decode a source into a premultiplied pixmap.
pub fn decode(source: &ImageSource) -> Result<Pixmap> {
    let image = match source {
        ImageSource::Path(path) => image::open(path)?,
        ImageSource::Bytes(bytes) => image::load_from_memory(bytes)?,
    };
    pixmap_from_rgba(&image.to_rgba8())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadTarget {
    Base,
    Object,
}

pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub target: LoadTarget,
    pub source: ImageSource,
}

pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub target: LoadTarget,
    pub result: Result<Pixmap>,
}

pub struct ImageLoader {
    requests: mpsc::Sender<LoadRequest>,
    outcomes: mpsc::Receiver<LoadOutcome>,
}

impl ImageLoader {
    /// Start the worker. `notify` runs after every finished decode, which
    /// lets the UI schedule a repaint.
    pub fn spawn(notify: impl Fn() + Send + 'static) -> Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<LoadRequest>();
        let (out_tx, out_rx) = mpsc::channel::<LoadOutcome>();

        thread::Builder::new()
            .name("image-loader".into())
            .spawn(move || {
                for request in req_rx {
                    let result = decode(&request.source);
                    if let Err(e) = &result {
                        tracing::debug!("decode of {} failed: {e}", request.source.describe());
                    }
                    let outcome = LoadOutcome {
                        ticket: request.ticket,
                        target: request.target,
                        result,
                    };
                    if out_tx.send(outcome).is_err() {
                        break;
                    }
                    notify();
                }
            })?;

        Ok(Self {
            requests: req_tx,
            outcomes: out_rx,
        })
    }

    pub fn submit(&self, request: LoadRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| EditorError::LoaderDisconnected)
    }

    pub fn try_recv(&self) -> Option<LoadOutcome> {
        self.outcomes.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}
