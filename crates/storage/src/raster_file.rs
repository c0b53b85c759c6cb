//! On-disk cache of decoded rasters.
//!
//! One file per series, gzip-compressed, in a fixed big-endian layout:
//! `i32 width, i32 height, i32 pixel_count, pixel_count bytes, [optional]
//! pixel_count f32 values`. Older files omit the value grid; reading one
//! yields a raster with no values rather than an error. Metadata lives in
//! a JSON sidecar so the multi-megabyte payload never round-trips through
//! a text format.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use grib2_decoder::sections::{DataScaling, GridGeometry};
use overlay_common::{ModelRun, Pollutant, RawRaster};

use crate::StoreError;

/// Cached files older than this are deleted instead of read.
pub const MAX_FILE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Everything about a decoded series except the raster payload itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub model_run: ModelRun,
    pub geometry: GridGeometry,
    pub scaling: DataScaling,
    pub stored_at: DateTime<Utc>,
}

pub struct RasterDiskCache {
    dir: PathBuf,
}

impl RasterDiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn write_raster(&self, pollutant: Pollutant, raster: &RawRaster) -> Result<(), StoreError> {
        let path = self.raster_path(pollutant);
        let mut out = GzEncoder::new(
            BufWriter::new(File::create(&path)?),
            flate2::Compression::default(),
        );

        out.write_all(&(raster.width as i32).to_be_bytes())?;
        out.write_all(&(raster.height as i32).to_be_bytes())?;
        out.write_all(&(raster.pixels.len() as i32).to_be_bytes())?;
        out.write_all(&raster.pixels)?;
        if let Some(values) = &raster.values {
            for v in values {
                out.write_all(&v.to_be_bytes())?;
            }
        }
        out.finish()?.flush()?;
        Ok(())
    }

    /// Read the cached raster, or `None` when the file is absent or has
    /// aged out (aged-out files are deleted on the way).
    pub fn read_raster(&self, pollutant: Pollutant) -> Result<Option<RawRaster>, StoreError> {
        let path = self.raster_path(pollutant);
        if !path.exists() {
            return Ok(None);
        }
        if self.expire_if_old(&path)? {
            return Ok(None);
        }

        let mut input = GzDecoder::new(BufReader::new(File::open(&path)?));
        let width = read_i32(&mut input)?;
        let height = read_i32(&mut input)?;
        let pixel_count = read_i32(&mut input)?;
        if width <= 0 || height <= 0 || pixel_count != width * height {
            warn!(path = %path.display(), width, height, pixel_count, "corrupt raster cache file");
            fs::remove_file(&path)?;
            return Ok(None);
        }

        let mut pixels = vec![0u8; pixel_count as usize];
        input.read_exact(&mut pixels)?;

        // The value grid is a later addition to the format; absence means
        // an older file, not corruption.
        let mut rest = Vec::new();
        input.read_to_end(&mut rest)?;
        let values = if rest.len() == pixel_count as usize * 4 {
            Some(
                rest.chunks_exact(4)
                    .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )
        } else {
            if !rest.is_empty() {
                warn!(
                    path = %path.display(),
                    trailing = rest.len(),
                    "ignoring short value grid in raster cache file"
                );
            }
            None
        };

        Ok(Some(RawRaster {
            width: width as u32,
            height: height as u32,
            pixels,
            values,
        }))
    }

    pub fn write_metadata(
        &self,
        pollutant: Pollutant,
        metadata: &SeriesMetadata,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec(metadata)?;
        fs::write(self.metadata_path(pollutant), json)?;
        Ok(())
    }

    pub fn read_metadata(&self, pollutant: Pollutant) -> Result<Option<SeriesMetadata>, StoreError> {
        let path = self.metadata_path(pollutant);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) => {
                // Unreadable metadata is useless without trust in it.
                warn!(path = %path.display(), %err, "discarding unreadable series metadata");
                fs::remove_file(&path)?;
                Ok(None)
            }
        }
    }

    pub fn remove(&self, pollutant: Pollutant) -> Result<(), StoreError> {
        for path in [self.raster_path(pollutant), self.metadata_path(pollutant)] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn expire_if_old(&self, path: &Path) -> Result<bool, StoreError> {
        let modified = fs::metadata(path)?.modified()?;
        let age = modified.elapsed().unwrap_or(Duration::ZERO);
        if age > MAX_FILE_AGE {
            info!(path = %path.display(), "raster cache file is too old, deleting");
            fs::remove_file(path)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn raster_path(&self, pollutant: Pollutant) -> PathBuf {
        self.dir.join(format!("{}.bin.gz", pollutant.spec().forecast_name))
    }

    fn metadata_path(&self, pollutant: Pollutant) -> PathBuf {
        self.dir.join(format!("{}.json", pollutant.spec().forecast_name))
    }
}

fn read_i32(input: &mut impl Read) -> Result<i32, StoreError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}
