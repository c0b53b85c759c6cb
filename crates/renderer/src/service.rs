//! Overlay tile service: cache in front of the compositor, plus the
//! atomically published "current overlay" handle.
//!
//! Renders never block on a refresh. Whatever snapshot is published when a
//! tile request arrives is the one used; a refresh publishes a wholly new
//! snapshot and flushes the tile cache. A render racing with a publish may
//! complete against the outgoing snapshot; that is detected by comparing
//! the handle before and after the render and resolved by re-rendering
//! once against the new snapshot rather than locking the whole render path.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tracing::{debug, info};

use grid_sampler::GridSampler;
use overlay_common::{ModelRun, TileCoord};
use storage::TileCache;

use crate::compositor::{TileCompositor, TileImage};
use crate::RenderError;

/// One published overlay: the sampler over the decoded raster plus the
/// provenance it came from. Replaced as a unit, never mutated.
pub struct OverlaySnapshot {
    pub sampler: GridSampler,
    pub model_run: ModelRun,
}

#[cfg(test)]
type MidRenderHook = Box<dyn FnOnce(&OverlayTileService) + Send>;

pub struct OverlayTileService {
    compositor: TileCompositor,
    cache: TileCache,
    current: RwLock<Option<Arc<OverlaySnapshot>>>,
    /// Test seam: runs once between the first render and the snapshot
    /// comparison, where a concurrent publish would land.
    #[cfg(test)]
    mid_render_hook: std::sync::Mutex<Option<MidRenderHook>>,
}

impl OverlayTileService {
    pub fn new(compositor: TileCompositor, cache: TileCache) -> Self {
        Self {
            compositor,
            cache,
            current: RwLock::new(None),
            #[cfg(test)]
            mid_render_hook: std::sync::Mutex::new(None),
        }
    }

    /// Swap in a new overlay and drop every cached tile, since cached
    /// bytes carry no version tag and would silently show stale data.
    pub fn publish_overlay(&self, snapshot: OverlaySnapshot) {
        info!(model_run = %snapshot.model_run, "publishing new overlay");
        *self.write_current() = Some(Arc::new(snapshot));
        self.cache.invalidate_all();
    }

    /// Remove the overlay entirely; tiles fall back to the bare basemap.
    pub fn clear_overlay(&self) {
        *self.write_current() = None;
        self.cache.invalidate_all();
    }

    pub fn current_model_run(&self) -> Option<ModelRun> {
        self.read_current().map(|s| s.model_run.clone())
    }

    /// Render or fetch one tile as encoded PNG bytes.
    pub fn tile(&self, coord: TileCoord, base: &TileImage) -> Result<Bytes, RenderError> {
        if let Some(cached) = self.cache.get(&coord) {
            return Ok(cached);
        }

        let before = self.read_current();
        let mut encoded = self.render_against(coord, before.as_deref(), base)?;

        #[cfg(test)]
        self.fire_mid_render_hook();

        // An overlay publish may have landed mid-render. One retry against
        // the new snapshot is enough: publishes are rare and a second race
        // in the same render is acceptable staleness.
        let after = self.read_current();
        if !same_snapshot(&before, &after) {
            debug!(key = %coord.cache_key(), "overlay swapped mid-render, rendering again");
            encoded = self.render_against(coord, after.as_deref(), base)?;
        }

        let bytes = Bytes::from(encoded);
        self.cache.insert(coord, bytes.clone());
        Ok(bytes)
    }

    fn render_against(
        &self,
        coord: TileCoord,
        snapshot: Option<&OverlaySnapshot>,
        base: &TileImage,
    ) -> Result<Vec<u8>, RenderError> {
        let sampler: Option<&GridSampler> = snapshot.map(|s| &s.sampler);
        self.compositor.render(coord, sampler, base)
    }

    fn read_current(&self) -> Option<Arc<OverlaySnapshot>> {
        // A poisoned lock only means a render thread panicked mid-read;
        // the handle itself is always a complete value.
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn write_current(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Option<Arc<OverlaySnapshot>>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn set_mid_render_hook(&self, hook: MidRenderHook) {
        *self.mid_render_hook.lock().unwrap() = Some(hook);
    }

    #[cfg(test)]
    fn fire_mid_render_hook(&self) {
        let hook = self.mid_render_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(self);
        }
    }
}

fn same_snapshot(a: &Option<Arc<OverlaySnapshot>>, b: &Option<Arc<OverlaySnapshot>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::CompositorConfig;
    use grib2_decoder::sections::{GridGeometry, GridTemplate};
    use overlay_common::RawRaster;
    use projection::MapTransformer;

    fn service() -> OverlayTileService {
        let compositor = TileCompositor::new(
            CompositorConfig::default(),
            MapTransformer::canada_base_map().unwrap(),
        );
        OverlayTileService::new(compositor, TileCache::new(4 * 1024 * 1024))
    }

    /// A plain global lat-lon grid so every basemap pixel samples inside it.
    fn global_snapshot(alpha: u8) -> OverlaySnapshot {
        let geometry = GridGeometry {
            template: GridTemplate::PlainLatLon,
            ni: 361,
            nj: 181,
            first_lat_deg: -90.0,
            first_lon_deg: -180.0,
            last_lat_deg: 90.0,
            last_lon_deg: 180.0,
            d_lat_deg: 1.0,
            d_lon_deg: 1.0,
            scan_mode: 0x40,
            rotation: None,
        };
        let raster = Arc::new(RawRaster {
            width: 361,
            height: 181,
            pixels: vec![alpha; 361 * 181],
            values: None,
        });
        OverlaySnapshot {
            sampler: GridSampler::new(&geometry, raster),
            model_run: ModelRun::new("RAQDPS", "_PM2.5_Sfc", "20260829", "12", "000"),
        }
    }

    fn coord() -> TileCoord {
        TileCoord {
            row: 0,
            col: 0,
            zoom: 8,
        }
    }

    #[test]
    fn bare_service_serves_the_base_tile() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);
        let tile = svc.tile(coord(), &base).unwrap();
        let direct = crate::png::encode_rgba(&base.pixels, 256, 256).unwrap();
        assert_eq!(&tile[..], &direct[..]);
    }

    #[test]
    fn overlay_changes_the_rendered_tile() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);
        let bare = svc.tile(coord(), &base).unwrap();

        svc.publish_overlay(global_snapshot(200));
        let tinted = svc.tile(coord(), &base).unwrap();
        assert_ne!(&bare[..], &tinted[..]);
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);
        svc.publish_overlay(global_snapshot(128));

        svc.tile(coord(), &base).unwrap();
        svc.tile(coord(), &base).unwrap();
        let stats = svc.cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn publish_invalidates_cached_tiles() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);

        svc.publish_overlay(global_snapshot(64));
        let first = svc.tile(coord(), &base).unwrap();

        svc.publish_overlay(global_snapshot(230));
        let second = svc.tile(coord(), &base).unwrap();

        assert_ne!(&first[..], &second[..]);
        // Each publish flushed, so both renders were cache misses and each
        // triggered exactly one insertion.
        let stats = svc.cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.insertions, 2);
    }

    #[test]
    fn publish_landing_mid_render_yields_the_new_overlay() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);
        svc.publish_overlay(global_snapshot(32));

        // Land a publish in the window between the render and the snapshot
        // comparison; the service must notice and render again.
        svc.set_mid_render_hook(Box::new(|s| s.publish_overlay(global_snapshot(230))));
        let tile = svc.tile(coord(), &base).unwrap();

        // Identical to a render where the new overlay was current all along.
        let reference = service();
        reference.publish_overlay(global_snapshot(230));
        let expected = reference.tile(coord(), &base).unwrap();
        assert_eq!(&tile[..], &expected[..]);

        // One request, one miss, one insertion despite the second render.
        let stats = svc.cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn clearing_the_overlay_restores_the_bare_tile() {
        let svc = service();
        let base = TileImage::solid(256, 256, [40, 40, 40, 255]);
        let bare = svc.tile(coord(), &base).unwrap();

        svc.publish_overlay(global_snapshot(200));
        svc.tile(coord(), &base).unwrap();

        svc.clear_overlay();
        let restored = svc.tile(coord(), &base).unwrap();
        assert_eq!(&bare[..], &restored[..]);
        assert!(svc.current_model_run().is_none());
    }
}
