//! Raster canvas editor core: a photo, a stroke layer on top of it, object
//! overlays, pan/zoom, undo, and the export artifacts for image generation.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod generate;
pub mod geometry;
pub mod history;
pub mod loader;
pub mod overlay;
pub mod raster;
pub mod render;
pub mod session;
pub mod surface;
pub mod transform;

pub use config::EditorConfig;
pub use dispatch::{EditorEvent, Interaction, PointerButton, ToolbarAction};
pub use error::{EditorError, Result};
pub use geometry::{ImagePoint, ImageRect, ScreenPoint};
pub use session::EditorSession;
pub use surface::{Color4, DrawMode, DrawingOptions, OptionsChange};
