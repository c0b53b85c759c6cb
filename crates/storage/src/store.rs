//! Per-series raster store and freshness policy.
//!
//! Each pollutant series owns its own lock and cached entry, so refreshing
//! one series never blocks sampling or refreshing another. A full sweep
//! over every series is serialized by one outer gate: bulk refreshes
//! decode one raster at a time, which bounds peak memory during the sweep.
//!
//! The policy prefers stale data over none. A failed probe, fetch, or
//! decode leaves whatever entry exists untouched; renders keep using it
//! until something better arrives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use grib2_decoder::codec::{DecodeParams, PixelCodec};
use grib2_decoder::Grib2Field;
use overlay_common::{ModelRun, Pollutant};

use crate::raster_file::{RasterDiskCache, SeriesMetadata};
use crate::StoreError;

/// How long a validated entry counts as current.
pub const DATA_VALIDITY: Duration = Duration::from_secs(2 * 60 * 60);

/// Entries validated more recently than this are not even probed again.
pub const REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// One series' decoded raster and where it came from. Published as a unit
/// behind an `Arc`; never mutated after creation.
pub struct SpatialSnapshot {
    pub model_run: ModelRun,
    pub field: Grib2Field,
}

/// Remote source of model data. The probe variant fetches provenance only
/// (a HEAD-style request); `fetch_latest` downloads the full payload.
/// Either returns `Ok(None)` when the source currently has nothing for the
/// series, which is a normal condition, not an error.
#[async_trait]
pub trait DatamartSource: Send + Sync {
    async fn probe_latest(&self, pollutant: Pollutant) -> Result<Option<ModelRun>, StoreError>;

    async fn fetch_latest(
        &self,
        pollutant: Pollutant,
    ) -> Result<Option<(ModelRun, Bytes)>, StoreError>;
}

struct SeriesEntry {
    snapshot: Arc<SpatialSnapshot>,
    validated_at: Instant,
}

pub struct SpatialDataStore {
    source: Arc<dyn DatamartSource>,
    codec: Arc<dyn PixelCodec>,
    disk: Option<RasterDiskCache>,
    series: HashMap<Pollutant, Mutex<Option<SeriesEntry>>>,
    sweep_gate: Mutex<()>,
    validity: Duration,
    refresh_min_interval: Duration,
}

impl SpatialDataStore {
    pub fn new(source: Arc<dyn DatamartSource>, codec: Arc<dyn PixelCodec>) -> Self {
        let series = Pollutant::ALL
            .iter()
            .map(|&p| (p, Mutex::new(None)))
            .collect();
        Self {
            source,
            codec,
            disk: None,
            series,
            sweep_gate: Mutex::new(()),
            validity: DATA_VALIDITY,
            refresh_min_interval: REFRESH_MIN_INTERVAL,
        }
    }

    /// Persist decoded rasters to disk and reload them on startup.
    pub fn with_disk_cache(mut self, disk: RasterDiskCache) -> Self {
        self.disk = Some(disk);
        self
    }

    /// Override the freshness windows. Intended for tests; production uses
    /// [`DATA_VALIDITY`] and [`REFRESH_MIN_INTERVAL`].
    pub fn with_windows(mut self, validity: Duration, refresh_min_interval: Duration) -> Self {
        self.validity = validity;
        self.refresh_min_interval = refresh_min_interval;
        self
    }

    /// The current snapshot for a series, or `None` when nothing valid is
    /// cached. Never touches the network.
    pub async fn get(&self, pollutant: Pollutant) -> Option<Arc<SpatialSnapshot>> {
        let slot = self.slot(pollutant).lock().await;
        slot.as_ref()
            .filter(|e| e.validated_at.elapsed() <= self.validity)
            .map(|e| Arc::clone(&e.snapshot))
    }

    /// Series that currently hold a valid snapshot.
    pub async fn loaded_series(&self) -> Vec<Pollutant> {
        let mut loaded = Vec::new();
        for &pollutant in Pollutant::ALL.iter() {
            if self.get(pollutant).await.is_some() {
                loaded.push(pollutant);
            }
        }
        loaded
    }

    /// Refresh every series, one at a time. Concurrent sweeps queue on the
    /// outer gate; per-series errors are logged and do not stop the sweep.
    pub async fn refresh_all(&self) {
        let _gate = self.sweep_gate.lock().await;
        for &pollutant in Pollutant::ALL.iter() {
            if let Err(err) = self.refresh(pollutant).await {
                warn!(pollutant = ?pollutant, %err, "series refresh failed, keeping prior data");
            }
        }
    }

    /// Bring one series up to date.
    ///
    /// Recently validated entries are left alone. An entry past the probe
    /// interval but still valid is checked with a provenance-only probe:
    /// matching provenance just advances the validation timestamp. Only a
    /// changed (or absent) provenance pays for a full fetch and decode.
    pub async fn refresh(&self, pollutant: Pollutant) -> Result<(), StoreError> {
        let mut slot = self.slot(pollutant).lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.validated_at.elapsed() <= self.refresh_min_interval {
                debug!(pollutant = ?pollutant, "entry validated recently, skipping refresh");
                return Ok(());
            }
        }

        let current = slot
            .as_ref()
            .filter(|e| e.validated_at.elapsed() <= self.validity)
            .map(|e| e.snapshot.model_run.clone());

        match current {
            None => self.fetch_and_publish(pollutant, &mut slot).await,
            Some(current_run) => {
                // The payload is large; check provenance first and skip
                // the download when nothing has changed upstream.
                match self.source.probe_latest(pollutant).await? {
                    None => {
                        debug!(pollutant = ?pollutant, "source has no data, keeping what we have");
                        Ok(())
                    }
                    Some(latest) if latest == current_run => {
                        if let Some(entry) = slot.as_mut() {
                            entry.validated_at = Instant::now();
                        }
                        debug!(pollutant = ?pollutant, "provenance unchanged, timestamp advanced");
                        Ok(())
                    }
                    Some(latest) => {
                        debug!(
                            pollutant = ?pollutant,
                            old = %current_run,
                            new = %latest,
                            "provenance changed, fetching full payload"
                        );
                        self.fetch_and_publish(pollutant, &mut slot).await
                    }
                }
            }
        }
    }

    async fn fetch_and_publish(
        &self,
        pollutant: Pollutant,
        slot: &mut Option<SeriesEntry>,
    ) -> Result<(), StoreError> {
        let Some((model_run, payload)) = self.source.fetch_latest(pollutant).await? else {
            debug!(pollutant = ?pollutant, "source has no payload, keeping what we have");
            return Ok(());
        };

        let params = DecodeParams::for_series(pollutant.spec());
        let field = grib2_decoder::decode(&payload, &params, self.codec.as_ref())?;

        info!(
            pollutant = ?pollutant,
            model_run = %model_run,
            width = field.raster.width,
            height = field.raster.height,
            "decoded new raster"
        );

        self.persist(pollutant, &model_run, &field);
        *slot = Some(SeriesEntry {
            snapshot: Arc::new(SpatialSnapshot { model_run, field }),
            validated_at: Instant::now(),
        });
        Ok(())
    }

    /// Best-effort disk persistence; failures are logged, never fatal.
    fn persist(&self, pollutant: Pollutant, model_run: &ModelRun, field: &Grib2Field) {
        let Some(disk) = &self.disk else {
            return;
        };
        let metadata = SeriesMetadata {
            model_run: model_run.clone(),
            geometry: field.geometry.clone(),
            scaling: field.scaling.clone(),
            stored_at: Utc::now(),
        };
        if let Err(err) = disk
            .write_raster(pollutant, &field.raster)
            .and_then(|()| disk.write_metadata(pollutant, &metadata))
        {
            warn!(pollutant = ?pollutant, %err, "failed to persist raster to disk");
        }
    }

    /// Repopulate series entries from the disk cache, typically once at
    /// startup. Entries older than the validity window are skipped.
    pub async fn load_persisted(&self) -> Result<(), StoreError> {
        let Some(disk) = &self.disk else {
            return Ok(());
        };

        for &pollutant in Pollutant::ALL.iter() {
            let Some(metadata) = disk.read_metadata(pollutant)? else {
                continue;
            };
            let age = (Utc::now() - metadata.stored_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age > self.validity {
                continue;
            }
            let Some(raster) = disk.read_raster(pollutant)? else {
                // Payload and metadata must live and die together.
                disk.remove(pollutant)?;
                continue;
            };

            let snapshot = SpatialSnapshot {
                model_run: metadata.model_run,
                field: Grib2Field {
                    geometry: metadata.geometry,
                    scaling: metadata.scaling,
                    raster,
                },
            };
            let validated_at = Instant::now()
                .checked_sub(age)
                .unwrap_or_else(Instant::now);

            let mut slot = self.slot(pollutant).lock().await;
            *slot = Some(SeriesEntry {
                snapshot: Arc::new(snapshot),
                validated_at,
            });
            info!(pollutant = ?pollutant, "restored series from disk cache");
        }
        Ok(())
    }

    fn slot(&self, pollutant: Pollutant) -> &Mutex<Option<SeriesEntry>> {
        // The map is built over every Pollutant variant at construction.
        &self.series[&pollutant]
    }
}
