//! Playground configuration.
//!
//! `PlaygroundConfig` controls how a [`Playground`](crate::playground::Playground) sets up its
//! backend, its window (or offscreen stand-in) and the renderer that drives it. It replaces the
//! process-wide switches a test harness would otherwise keep in globals: a playground only ever
//! sees the configuration it was handed.
//!
//! `PlaygroundConfig` provides sensible defaults via [`Default`], a fluent
//! [`PlaygroundConfig::builder()`] with validation, and JSON loading through serde.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use impeller_toolkit::config::PlaygroundConfig;
//! let cfg = PlaygroundConfig::default();
//! assert_eq!(cfg.max_frames_in_flight, 3);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use impeller_toolkit::config::PlaygroundConfig;
//! use impeller_toolkit::render::BackendKind;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = PlaygroundConfig::builder()
//!     .backend(BackendKind::Software)
//!     .window_size(640, 480)
//!     .max_frames_in_flight(2)
//!     .build()?; // returns Result<PlaygroundConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `backend`: Which backend the playground should set up (default: `Software`).
//! - `window_size`: Size of the window or offscreen surface in pixels (default: 1024x768).
//! - `title`: Window title, used for logging on headless backends.
//! - `max_frames_in_flight`: Capacity of the renderer's frame gate (default: 3, at least 1).
//! - `swapchain_image_count`: Number of images the surface rotates through (default: 3, 1..=8).
//! - `damage_history`: Number of frame damages kept for partial repaint (default: 10, at least 1).
//! - `enable_validation`: Ask the backend for its validation layers, if it has any.
//!
//! # Errors
//!
//! Builder validation can return [`ConfigError`] if values are invalid.

use crate::errors::InteropError;
use crate::geometry::SurfaceSize;
use crate::render::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_MAX_FRAMES_IN_FLIGHT: usize = 3;
pub const DEFAULT_DAMAGE_HISTORY: usize = 10;
pub const MAX_SWAPCHAIN_IMAGES: usize = 8;
/// Largest frame gate the renderer can build.
pub const MAX_FRAMES_IN_FLIGHT: usize = tokio::sync::Semaphore::MAX_PERMITS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    pub backend: BackendKind,
    pub window_size: SurfaceSize,
    pub title: String,
    pub max_frames_in_flight: usize,
    pub swapchain_image_count: usize,
    pub damage_history: usize,
    pub enable_validation: bool,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            window_size: SurfaceSize { width: 1024, height: 768 },
            title: "Impeller Playground".to_string(),
            max_frames_in_flight: DEFAULT_MAX_FRAMES_IN_FLIGHT,
            swapchain_image_count: 3,
            damage_history: DEFAULT_DAMAGE_HISTORY,
            enable_validation: false,
        }
    }
}

impl PlaygroundConfig {
    pub fn builder() -> PlaygroundConfigBuilder {
        PlaygroundConfigBuilder::default()
    }

    /// Parses and validates a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, InteropError> {
        let cfg: PlaygroundConfig = serde_json::from_str(json)?;
        validate(&cfg)?;
        Ok(cfg)
    }

    /// Reads a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InteropError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Builder for [`PlaygroundConfig`].
#[derive(Debug, Clone, Default)]
pub struct PlaygroundConfigBuilder {
    inner: PlaygroundConfig,
}

impl PlaygroundConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut PlaygroundConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn backend(self, backend: BackendKind) -> Self { self.map(|c| c.backend = backend) }
    pub fn window_size(self, width: u32, height: u32) -> Self { self.map(|c| c.window_size = SurfaceSize { width, height }) }
    pub fn title<S: Into<String>>(self, title: S) -> Self { self.map(|c| c.title = title.into()) }
    pub fn max_frames_in_flight(self, n: usize) -> Self { self.map(|c| c.max_frames_in_flight = n) }
    pub fn swapchain_image_count(self, n: usize) -> Self { self.map(|c| c.swapchain_image_count = n) }
    pub fn damage_history(self, n: usize) -> Self { self.map(|c| c.damage_history = n) }
    pub fn enable_validation(self, on: bool) -> Self { self.map(|c| c.enable_validation = on) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut PlaygroundConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<PlaygroundConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroFramesInFlight,
    TooManyFramesInFlight(usize),
    SwapchainImageCount(usize),
    ZeroDamageHistory,
    EmptyWindow { width: u32, height: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroFramesInFlight =>
                write!(f, "max_frames_in_flight must be at least 1"),
            ConfigError::TooManyFramesInFlight(n) =>
                write!(f, "max_frames_in_flight {n} exceeds {MAX_FRAMES_IN_FLIGHT}"),
            ConfigError::SwapchainImageCount(n) =>
                write!(f, "swapchain_image_count {n} is out of range (expected 1..={MAX_SWAPCHAIN_IMAGES})"),
            ConfigError::ZeroDamageHistory =>
                write!(f, "damage_history must be at least 1"),
            ConfigError::EmptyWindow { width, height } =>
                write!(f, "window size {width}x{height} has no pixels"),
        }
    }
}
impl std::error::Error for ConfigError {}

pub(crate) fn validate(c: &PlaygroundConfig) -> Result<(), ConfigError> {
    if c.max_frames_in_flight == 0 {
        return Err(ConfigError::ZeroFramesInFlight);
    }
    if c.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT {
        return Err(ConfigError::TooManyFramesInFlight(c.max_frames_in_flight));
    }
    if !(1..=MAX_SWAPCHAIN_IMAGES).contains(&c.swapchain_image_count) {
        return Err(ConfigError::SwapchainImageCount(c.swapchain_image_count));
    }
    if c.damage_history == 0 {
        return Err(ConfigError::ZeroDamageHistory);
    }
    if c.window_size.is_empty() {
        return Err(ConfigError::EmptyWindow {
            width: c.window_size.width,
            height: c.window_size.height,
        });
    }
    Ok(())
}
