use std::path::PathBuf;

use crate::device::{Extent, PixelFormat};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("shader effect `{0}` not found")]
    EffectNotFound(String),
    #[error("failed to compile shader effect `{name}`: {reason}")]
    EffectCompile { name: String, reason: String },
    #[error("failed to load image {}: {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("image extent {0} is empty")]
    EmptyExtent(Extent),
    #[error("expected {expected} texels, got {actual}")]
    DataSize { expected: usize, actual: usize },
    #[error("format {0:?} does not support this operation")]
    UnsupportedFormat(PixelFormat),
    #[error("unknown image handle")]
    UnknownImage,
    #[error("unknown effect handle")]
    UnknownEffect,
    #[error("effect `{effect}` has no parameter named `{name}`")]
    UnknownParameter { effect: String, name: String },
    #[error("parameter `{name}` of effect `{effect}` has the wrong type")]
    ParameterType { effect: String, name: String },
    #[error("effect target is also bound as an input")]
    TargetAliased,
    #[error("no frame is being recorded")]
    NoFrame,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("chain has no stages")]
    Empty,
    #[error("duplicate stage name `{0}`")]
    DuplicateStage(String),
    #[error("stage `{stage}` failed to load")]
    Load {
        stage: String,
        #[source]
        source: DeviceError,
    },
    #[error("stage `{stage}` failed to resize")]
    Resize {
        stage: String,
        #[source]
        source: DeviceError,
    },
    #[error("stage `{stage}` failed to render")]
    Render {
        stage: String,
        #[source]
        source: DeviceError,
    },
    #[error("chain is not loaded")]
    NotLoaded,
    #[error("{input} input is {actual} but the chain renders at {expected}")]
    ExtentMismatch {
        input: &'static str,
        expected: Extent,
        actual: Extent,
    },
    #[error("{input} input has format {format:?}, expected an RGBA color format")]
    FormatMismatch {
        input: &'static str,
        format: PixelFormat,
    },
    #[error("{0} input is not a live image")]
    MissingInput(&'static str),
}

impl ChainError {
    /// Frame-level input problems: the driver may skip postprocessing for
    /// this frame and present the base color instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChainError::ExtentMismatch { .. }
                | ChainError::FormatMismatch { .. }
                | ChainError::MissingInput(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate stage name `{0}`")]
    DuplicateStage(String),
    #[error("invalid override `{0}`, expected `stage.param=value`")]
    Override(String),
    #[error("stage `{stage}` has no parameter `{param}`")]
    UnknownParameter { stage: String, param: String },
}
