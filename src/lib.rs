pub mod config;
pub mod errors;
pub mod ffi;
pub mod geometry;
pub mod interop;
pub mod playground;
pub mod render;
pub mod version;

pub use config::{ConfigError, PlaygroundConfig};
pub use errors::InteropError;
pub use interop::{Context, ScopedObject, Surface};
pub use playground::{Playground, PlaygroundStats};
pub use render::{BackendKind, Renderer};
pub use version::{check_version, IMPELLER_VERSION};
