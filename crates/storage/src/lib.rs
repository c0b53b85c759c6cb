//! Caching and persistence for decoded pollutant rasters and rendered
//! tiles.
//!
//! [`tile_cache`] holds encoded tile bytes behind a byte budget,
//! [`raster_file`] is the on-disk raster format, and [`store`] owns the
//! per-series freshness policy over a remote data source.

pub mod raster_file;
pub mod store;
pub mod tile_cache;

pub use raster_file::{RasterDiskCache, SeriesMetadata};
pub use store::{DatamartSource, SpatialDataStore, SpatialSnapshot};
pub use tile_cache::{CacheStats, TileCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("raster decode failed: {0}")]
    Decode(#[from] grib2_decoder::DecodeError),

    #[error("data source failure: {0}")]
    Source(String),
}
