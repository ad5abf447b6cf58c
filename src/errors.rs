use crate::config::ConfigError;
use crate::render::BackendKind;

/// Errors raised while setting up contexts, surfaces and playgrounds.
///
/// Per-frame failures are never reported through this type. They surface as a `false` return from
/// [`Renderer::render`](crate::render::Renderer::render) so the render loop can carry on.
#[derive(Debug, thiserror::Error)]
pub enum InteropError {
    #[error("Version mismatch: expected {expected:#010x}, got {actual:#010x}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Context is not valid")]
    InvalidContext,

    #[error("Backend {0:?} is not supported by this build")]
    UnsupportedBackend(BackendKind),

    #[error("Backend setup failed: {0}")]
    BackendSetup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Texture contents do not match {width}x{height} RGBA8 ({len} bytes given)")]
    InvalidTextureContents { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
