//! Common types shared across the airq-tiles workspace.

pub mod model;
pub mod pollutant;
pub mod raster;
pub mod tile;

pub use model::ModelRun;
pub use pollutant::{Pollutant, SeriesSpec};
pub use raster::RawRaster;
pub use tile::TileCoord;
