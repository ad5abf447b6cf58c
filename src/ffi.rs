//! C ABI.
//!
//! Every object is handed out as an opaque pointer carrying one strong reference. Functions named
//! `*_new` return such a +1 handle (or null on failure); the caller gives it back with the matching
//! `*_release`, and may take extra references with `*_retain`. Retaining or releasing null is a
//! no-op. Nothing here panics across the boundary: failures are reported as null or `false`.
//!
//! Paints, path builders and display list builders are mutable from C. Drawing with a paint
//! snapshots its current state, so later changes to the paint do not affect recorded ops.

use crate::geometry::{Color, Point, Rect, SurfaceSize};
use crate::interop::handle::{borrow, from_opaque, release, retain, to_opaque};
use crate::interop::{
    BlendMode, Context, DisplayList, DisplayListBuilder, DrawStyle, FillType, Paint, Path,
    PathBuilder, ScopedObject, Surface, Texture,
};
use crate::render::SurfaceOptions;
use crate::version::IMPELLER_VERSION;
use std::sync::{Mutex, MutexGuard};

#[repr(C)]
pub struct ImpellerContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerSurface {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerPaint {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerPath {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerPathBuilder {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerDisplayList {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerDisplayListBuilder {
    _private: [u8; 0],
}

#[repr(C)]
pub struct ImpellerTexture {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpellerColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl From<ImpellerColor> for Color {
    fn from(c: ImpellerColor) -> Self {
        Color::new(c.red, c.green, c.blue, c.alpha)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpellerPoint {
    pub x: f32,
    pub y: f32,
}

impl From<ImpellerPoint> for Point {
    fn from(p: ImpellerPoint) -> Self {
        Point::new(p.x as f64, p.y as f64)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpellerRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<ImpellerRect> for Rect {
    fn from(r: ImpellerRect) -> Self {
        Rect::new(r.x as f64, r.y as f64, (r.x + r.width) as f64, (r.y + r.height) as f64)
    }
}

pub const IMPELLER_DRAW_STYLE_FILL: u32 = 0;
pub const IMPELLER_DRAW_STYLE_STROKE: u32 = 1;

pub const IMPELLER_BLEND_MODE_SOURCE_OVER: u32 = 0;
pub const IMPELLER_BLEND_MODE_SOURCE: u32 = 1;

pub const IMPELLER_FILL_TYPE_NON_ZERO: u32 = 0;
pub const IMPELLER_FILL_TYPE_EVEN_ODD: u32 = 1;

// Handle types as seen from Rust.
type PaintObject = Mutex<Paint>;
type PathBuilderObject = Mutex<PathBuilder>;
type DisplayListBuilderObject = Mutex<DisplayListBuilder>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn into_handle<T, H>(mut object: ScopedObject<T>) -> *mut H {
    to_opaque(object.leak())
}

/// # Safety
/// `handle` must be null or a live handle of the matching type.
unsafe fn object<'a, H, T>(handle: *mut H) -> Option<&'a T> {
    borrow(from_opaque::<H, T>(handle))
}

/// A new owning reference to the object behind `handle`.
///
/// # Safety
/// `handle` must be null or a live handle of the matching type.
unsafe fn shared<H, T>(handle: *mut H) -> ScopedObject<T> {
    ScopedObject::ref_raw(from_opaque::<H, T>(handle))
}

macro_rules! ref_counted_handle {
    ($handle:ty, $object:ty, $retain:ident, $release:ident) => {
        /// Adds a reference. Null is a no-op.
        ///
        /// # Safety
        /// `handle` must be null or a live handle.
        #[no_mangle]
        pub unsafe extern "C" fn $retain(handle: *mut $handle) {
            retain(from_opaque::<$handle, $object>(handle));
        }

        /// Gives back a reference, destroying the object with the last one. Null is a no-op.
        ///
        /// # Safety
        /// `handle` must be null or carry a reference the caller owns.
        #[no_mangle]
        pub unsafe extern "C" fn $release(handle: *mut $handle) {
            release(from_opaque::<$handle, $object>(handle));
        }
    };
}

ref_counted_handle!(ImpellerContext, Context, impeller_context_retain, impeller_context_release);
ref_counted_handle!(ImpellerSurface, Surface, impeller_surface_retain, impeller_surface_release);
ref_counted_handle!(ImpellerPaint, PaintObject, impeller_paint_retain, impeller_paint_release);
ref_counted_handle!(ImpellerPath, Path, impeller_path_retain, impeller_path_release);
ref_counted_handle!(
    ImpellerPathBuilder,
    PathBuilderObject,
    impeller_path_builder_retain,
    impeller_path_builder_release
);
ref_counted_handle!(
    ImpellerDisplayList,
    DisplayList,
    impeller_display_list_retain,
    impeller_display_list_release
);
ref_counted_handle!(
    ImpellerDisplayListBuilder,
    DisplayListBuilderObject,
    impeller_display_list_builder_retain,
    impeller_display_list_builder_release
);
ref_counted_handle!(ImpellerTexture, Texture, impeller_texture_retain, impeller_texture_release);

// ---------- Version and logging ----------

/// The version this library was built as. Pass it to the context factories.
#[no_mangle]
pub extern "C" fn impeller_get_version() -> u32 {
    IMPELLER_VERSION
}

/// Routes library logs to stderr, filtered by `RUST_LOG`. Safe to call more than once.
#[no_mangle]
pub extern "C" fn impeller_init_logging() {
    let _ = env_logger::builder().try_init();
}

// ---------- Contexts ----------

/// Creates a context on the CPU rasterizer. Null if `version` is not the library's version.
#[no_mangle]
pub extern "C" fn impeller_context_create_software_new(version: u32) -> *mut ImpellerContext {
    match Context::create_software(version, crate::config::DEFAULT_MAX_FRAMES_IN_FLIGHT) {
        Ok(context) => into_handle(context),
        Err(e) => {
            log::error!("could not create software context: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Creates a context that draws nothing. Null if `version` is not the library's version.
#[no_mangle]
pub extern "C" fn impeller_context_create_null_new(version: u32) -> *mut ImpellerContext {
    match Context::create_null(version, crate::config::DEFAULT_MAX_FRAMES_IN_FLIGHT) {
        Ok(context) => into_handle(context),
        Err(e) => {
            log::error!("could not create null context: {e}");
            std::ptr::null_mut()
        }
    }
}

// ---------- Surfaces ----------

/// Creates an offscreen surface. Null on failure.
///
/// # Safety
/// `context` must be null or a live context handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_surface_create_offscreen_new(
    context: *mut ImpellerContext,
    width: u32,
    height: u32,
) -> *mut ImpellerSurface {
    let context: ScopedObject<Context> = shared(context);
    if context.is_empty() {
        return std::ptr::null_mut();
    }
    match Surface::create_offscreen(&context, SurfaceSize::new(width, height), SurfaceOptions::default()) {
        Ok(surface) => into_handle(surface),
        Err(e) => {
            log::error!("could not create offscreen surface: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Draws a display list into the surface's next frame and presents it.
///
/// # Safety
/// Both handles must be null or live handles of their type.
#[no_mangle]
pub unsafe extern "C" fn impeller_surface_draw_display_list(
    surface: *mut ImpellerSurface,
    display_list: *mut ImpellerDisplayList,
) -> bool {
    match (object::<_, Surface>(surface), object::<_, DisplayList>(display_list)) {
        (Some(surface), Some(list)) => surface.draw_display_list(list),
        _ => false,
    }
}

/// Copies the last presented frame as tightly packed RGBA8 rows into `out`. Returns the number of
/// bytes written, or 0 if there is nothing to read or `out_len` is too small.
///
/// # Safety
/// `surface` must be null or a live surface handle, and `out` must be valid for `out_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn impeller_surface_read_pixels(
    surface: *mut ImpellerSurface,
    out: *mut u8,
    out_len: usize,
) -> usize {
    let Some(surface) = object::<_, Surface>(surface) else {
        return 0;
    };
    let Some(image) = surface.snapshot() else {
        return 0;
    };
    let len = image.width as usize * image.height as usize * 4;
    if out.is_null() || out_len < len || image.stride as usize != image.width as usize * 4 {
        return 0;
    }
    std::ptr::copy_nonoverlapping(image.pixels.as_ptr(), out, len);
    len
}

// ---------- Paints ----------

/// A new paint: solid black fill.
#[no_mangle]
pub extern "C" fn impeller_paint_new() -> *mut ImpellerPaint {
    into_handle(ScopedObject::create(Mutex::new(Paint::default())))
}

/// # Safety
/// `paint` must be null or a live paint handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_paint_set_color(paint: *mut ImpellerPaint, color: ImpellerColor) {
    if let Some(paint) = object::<_, PaintObject>(paint) {
        lock(paint).set_color(color.into());
    }
}

/// Unknown styles are ignored.
///
/// # Safety
/// `paint` must be null or a live paint handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_paint_set_draw_style(paint: *mut ImpellerPaint, style: u32) {
    let style = match style {
        IMPELLER_DRAW_STYLE_FILL => DrawStyle::Fill,
        IMPELLER_DRAW_STYLE_STROKE => DrawStyle::Stroke,
        _ => return,
    };
    if let Some(paint) = object::<_, PaintObject>(paint) {
        lock(paint).set_style(style);
    }
}

/// # Safety
/// `paint` must be null or a live paint handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_paint_set_stroke_width(paint: *mut ImpellerPaint, width: f32) {
    if let Some(paint) = object::<_, PaintObject>(paint) {
        lock(paint).set_stroke_width(width);
    }
}

/// Unknown modes are ignored.
///
/// # Safety
/// `paint` must be null or a live paint handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_paint_set_blend_mode(paint: *mut ImpellerPaint, mode: u32) {
    let mode = match mode {
        IMPELLER_BLEND_MODE_SOURCE_OVER => BlendMode::SourceOver,
        IMPELLER_BLEND_MODE_SOURCE => BlendMode::Source,
        _ => return,
    };
    if let Some(paint) = object::<_, PaintObject>(paint) {
        lock(paint).set_blend_mode(mode);
    }
}

/// # Safety
/// `paint` must be null or a live paint handle.
unsafe fn paint_snapshot(paint: *mut ImpellerPaint) -> Option<ScopedObject<Paint>> {
    object::<_, PaintObject>(paint).map(|p| ScopedObject::create(lock(p).clone()))
}

// ---------- Paths ----------

#[no_mangle]
pub extern "C" fn impeller_path_builder_new() -> *mut ImpellerPathBuilder {
    into_handle(ScopedObject::create(Mutex::new(PathBuilder::new())))
}

/// # Safety
/// `builder` must be null or a live path builder handle.
unsafe fn with_path_builder(builder: *mut ImpellerPathBuilder, f: impl FnOnce(&mut PathBuilder)) {
    if let Some(builder) = object::<_, PathBuilderObject>(builder) {
        f(&mut lock(builder));
    }
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_move_to(builder: *mut ImpellerPathBuilder, p: ImpellerPoint) {
    with_path_builder(builder, |b| {
        b.move_to(p.into());
    });
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_line_to(builder: *mut ImpellerPathBuilder, p: ImpellerPoint) {
    with_path_builder(builder, |b| {
        b.line_to(p.into());
    });
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_quadratic_curve_to(
    builder: *mut ImpellerPathBuilder,
    control: ImpellerPoint,
    end: ImpellerPoint,
) {
    with_path_builder(builder, |b| {
        b.quadratic_curve_to(control.into(), end.into());
    });
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_cubic_curve_to(
    builder: *mut ImpellerPathBuilder,
    control_1: ImpellerPoint,
    control_2: ImpellerPoint,
    end: ImpellerPoint,
) {
    with_path_builder(builder, |b| {
        b.cubic_curve_to(control_1.into(), control_2.into(), end.into());
    });
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_add_rect(builder: *mut ImpellerPathBuilder, rect: ImpellerRect) {
    with_path_builder(builder, |b| {
        b.add_rect(rect.into());
    });
}

/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_close(builder: *mut ImpellerPathBuilder) {
    with_path_builder(builder, |b| {
        b.close();
    });
}

/// Builds the recorded path and resets the builder. Unknown fill types fall back to non-zero.
///
/// # Safety
/// `builder` must be null or a live path builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_path_builder_take_path_new(
    builder: *mut ImpellerPathBuilder,
    fill_type: u32,
) -> *mut ImpellerPath {
    let fill_type = match fill_type {
        IMPELLER_FILL_TYPE_EVEN_ODD => FillType::EvenOdd,
        _ => FillType::NonZero,
    };
    match object::<_, PathBuilderObject>(builder) {
        Some(builder) => into_handle(ScopedObject::create(lock(builder).take_path(fill_type))),
        None => std::ptr::null_mut(),
    }
}

// ---------- Textures ----------

/// Creates a texture from tightly packed RGBA8 rows. Null if `len` does not match the size.
///
/// # Safety
/// `context` must be null or a live context handle, and `data` must be valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn impeller_texture_create_with_contents_new(
    context: *mut ImpellerContext,
    width: u32,
    height: u32,
    data: *const u8,
    len: usize,
) -> *mut ImpellerTexture {
    let valid = object::<_, Context>(context).map(|c| c.is_valid()).unwrap_or(false);
    if !valid || data.is_null() {
        return std::ptr::null_mut();
    }
    let contents = std::slice::from_raw_parts(data, len).to_vec();
    match Texture::with_contents(width, height, contents) {
        Ok(texture) => into_handle(ScopedObject::create(texture)),
        Err(e) => {
            log::error!("could not create texture: {e}");
            std::ptr::null_mut()
        }
    }
}

// ---------- Display lists ----------

#[no_mangle]
pub extern "C" fn impeller_display_list_builder_new() -> *mut ImpellerDisplayListBuilder {
    into_handle(ScopedObject::create(Mutex::new(DisplayListBuilder::new())))
}

/// # Safety
/// `builder` must be null or a live display list builder handle.
unsafe fn with_display_list_builder(
    builder: *mut ImpellerDisplayListBuilder,
    f: impl FnOnce(&mut DisplayListBuilder),
) {
    if let Some(builder) = object::<_, DisplayListBuilderObject>(builder) {
        f(&mut lock(builder));
    }
}

/// # Safety
/// `builder` must be null or a live display list builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_clear(
    builder: *mut ImpellerDisplayListBuilder,
    color: ImpellerColor,
) {
    with_display_list_builder(builder, |b| b.clear(color.into()));
}

/// # Safety
/// Every handle must be null or live. Nothing is recorded if `paint` is null.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_draw_rect(
    builder: *mut ImpellerDisplayListBuilder,
    rect: ImpellerRect,
    paint: *mut ImpellerPaint,
) {
    let Some(paint) = paint_snapshot(paint) else {
        return;
    };
    with_display_list_builder(builder, |b| b.draw_rect(rect.into(), &paint));
}

/// # Safety
/// Every handle must be null or live. Nothing is recorded if `path` or `paint` is null.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_draw_path(
    builder: *mut ImpellerDisplayListBuilder,
    path: *mut ImpellerPath,
    paint: *mut ImpellerPaint,
) {
    let path: ScopedObject<Path> = shared(path);
    let Some(paint) = paint_snapshot(paint) else {
        return;
    };
    if path.is_some() {
        with_display_list_builder(builder, |b| b.draw_path(&path, &paint));
    }
}

/// # Safety
/// Every handle must be null or live. Nothing is recorded if `texture` or `paint` is null.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_draw_texture(
    builder: *mut ImpellerDisplayListBuilder,
    texture: *mut ImpellerTexture,
    origin: ImpellerPoint,
    paint: *mut ImpellerPaint,
) {
    let texture: ScopedObject<Texture> = shared(texture);
    let Some(paint) = paint_snapshot(paint) else {
        return;
    };
    if texture.is_some() {
        with_display_list_builder(builder, |b| b.draw_texture(&texture, origin.into(), &paint));
    }
}

/// # Safety
/// Both handles must be null or live.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_draw_display_list(
    builder: *mut ImpellerDisplayListBuilder,
    display_list: *mut ImpellerDisplayList,
) {
    if let Some(list) = object::<_, DisplayList>(display_list) {
        with_display_list_builder(builder, |b| b.draw_display_list(list));
    }
}

/// Builds the recorded display list and resets the builder.
///
/// # Safety
/// `builder` must be null or a live display list builder handle.
#[no_mangle]
pub unsafe extern "C" fn impeller_display_list_builder_create_display_list_new(
    builder: *mut ImpellerDisplayListBuilder,
) -> *mut ImpellerDisplayList {
    match object::<_, DisplayListBuilderObject>(builder) {
        Some(builder) => into_handle(lock(builder).build()),
        None => std::ptr::null_mut(),
    }
}
