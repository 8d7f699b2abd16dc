use thiserror::Error;

use crate::overlay::ObjectId;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("No base image loaded")]
    NoBaseImage,

    #[error("Unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image loader thread is gone")]
    LoaderDisconnected,
}

pub type Result<T> = std::result::Result<T, EditorError>;
