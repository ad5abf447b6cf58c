//! Reference counted objects handed across the embedding API.
//!
//! Everything here lives behind an `Arc` and is passed around as a [`ScopedObject`]. The
//! [`handle`] module converts objects to and from the raw pointers the C API deals in.

pub mod handle;

mod context;
mod display_list;
mod object;
mod paint;
mod path;
mod surface;
mod texture;

pub use context::Context;
pub use display_list::{DisplayList, DisplayListBuilder, DisplayOp};
pub use object::ScopedObject;
pub use paint::{BlendMode, DrawStyle, Paint};
pub use path::{Contour, FillType, Path, PathBuilder};
pub use surface::Surface;
pub use texture::Texture;
