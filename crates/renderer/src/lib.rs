//! Tile rendering for the pollutant overlay.
//!
//! [`compositor`] turns a tile coordinate plus the current overlay sampler
//! into composited RGBA pixels, [`png`] encodes them, and [`service`] wires
//! both behind the tile cache with an atomically swappable overlay handle.

pub mod compositor;
pub mod png;
pub mod service;

pub use compositor::{CompositorConfig, TileCompositor, TileImage};
pub use service::{OverlaySnapshot, OverlayTileService};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferShape { expected: usize, actual: usize },

    #[error("tile encoding failed: {0}")]
    Io(#[from] std::io::Error),
}
