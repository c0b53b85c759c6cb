//! Sampling of decoded model grids at geographic coordinates.
//!
//! A [`GridSampler`] wraps one grid geometry and raster pair, immutable once
//! constructed. Construction precomputes everything the per-pixel path
//! needs: inverse grid increments, the grid origin, and for rotated grids
//! the pole rotation trigonometry. Sampling is bilinear over the four
//! neighbouring nodes; anything outside the grid yields a sentinel value
//! rather than an error, since out-of-domain lookups are the common case
//! when a map view extends past the model domain.

use std::sync::Arc;

use grib2_decoder::sections::{GridGeometry, GridTemplate};
use overlay_common::RawRaster;

/// Alignment correction added to the true longitude before the rotated-pole
/// conversion. Calibrated empirically against the published model grids;
/// no derivation for it is documented upstream. Overridable through
/// [`GridSampler::with_lon_offset`].
pub const DEFAULT_LON_OFFSET_DEG: f64 = 4.8;

/// Sentinel returned by [`GridSampler::sample_alpha`] for points outside
/// the grid.
pub const ALPHA_OUTSIDE: f64 = -1.0;

#[derive(Debug, Clone, Copy)]
struct PoleTrig {
    sin_phi_p: f64,
    cos_phi_p: f64,
    lam_p_rad: f64,
}

/// One grid's worth of sampling state. Cheap to clone; the raster is
/// shared, not copied.
#[derive(Debug, Clone)]
pub struct GridSampler {
    raster: Arc<RawRaster>,
    width: usize,
    height: usize,
    origin_lat_deg: f64,
    origin_lon_deg: f64,
    inv_d_lat: f64,
    inv_d_lon: f64,
    lon_offset_deg: f64,
    rotation: Option<PoleTrig>,
}

impl GridSampler {
    pub fn new(geometry: &GridGeometry, raster: Arc<RawRaster>) -> Self {
        let rotation = match geometry.template {
            GridTemplate::PlainLatLon => None,
            GridTemplate::RotatedLatLon => geometry.rotation.as_ref().map(|r| {
                // The grid is described by its south pole; sampling needs
                // the north pole: lat negated, lon reflected through the
                // antimeridian.
                let np_lat = -r.south_pole_lat_deg;
                let np_lon = wrap_lon_deg(-r.south_pole_lon_deg + 180.0);
                let phi_p = np_lat.to_radians();
                PoleTrig {
                    sin_phi_p: phi_p.sin(),
                    cos_phi_p: phi_p.cos(),
                    lam_p_rad: np_lon.to_radians(),
                }
            }),
        };

        Self {
            width: raster.width as usize,
            height: raster.height as usize,
            raster,
            origin_lat_deg: geometry.first_lat_deg,
            origin_lon_deg: geometry.first_lon_deg,
            inv_d_lat: 1.0 / geometry.d_lat_deg,
            inv_d_lon: 1.0 / geometry.d_lon_deg,
            lon_offset_deg: if rotation.is_some() {
                DEFAULT_LON_OFFSET_DEG
            } else {
                0.0
            },
            rotation,
        }
    }

    /// Replace the longitude alignment correction.
    pub fn with_lon_offset(mut self, offset_deg: f64) -> Self {
        self.lon_offset_deg = offset_deg;
        self
    }

    pub fn raster(&self) -> &Arc<RawRaster> {
        &self.raster
    }

    /// Fractional grid indices (column, row) for a geographic point.
    /// The result may lie outside `[0, width) x [0, height)`; the sample
    /// functions treat that as "not on the grid".
    pub fn lat_lon_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let (grid_lat, grid_lon) = match self.rotation {
            None => (lat_deg, lon_deg),
            Some(trig) => {
                let phi = lat_deg.to_radians();
                let lam = (lon_deg + self.lon_offset_deg).to_radians();
                let d_lam = lam - trig.lam_p_rad;

                let (sin_lat, cos_lat) = (phi.sin(), phi.cos());
                let sin_phi_r =
                    sin_lat * trig.sin_phi_p - trig.cos_phi_p * cos_lat * d_lam.cos();
                let y = cos_lat * d_lam.sin();
                let x = sin_lat * trig.cos_phi_p + trig.sin_phi_p * cos_lat * d_lam.cos();

                let phi_r = sin_phi_r.atan2(y.hypot(x));
                let lam_r = y.atan2(x);
                (phi_r.to_degrees(), lam_r.to_degrees())
            }
        };

        let fi = (grid_lon - self.origin_lon_deg) * self.inv_d_lon;
        let fj = (grid_lat - self.origin_lat_deg) * self.inv_d_lat;
        (fi, fj)
    }

    /// Bilinear sample of the 8-bit alpha raster at fractional indices.
    /// Returns [`ALPHA_OUTSIDE`] when any part of the footprint leaves the
    /// grid; otherwise a value in `[0, 255]`.
    pub fn sample_alpha(&self, fi: f64, fj: f64) -> f64 {
        let Some(n) = self.neighborhood(fi, fj) else {
            return ALPHA_OUTSIDE;
        };
        let p = &self.raster.pixels;
        let a00 = p[n.idx00] as f64;
        let a10 = p[n.idx10] as f64;
        let a01 = p[n.idx01] as f64;
        let a11 = p[n.idx11] as f64;

        let top = a00 + n.dx * (a10 - a00);
        let bottom = a01 + n.dx * (a11 - a01);
        (top + n.dy * (bottom - top)).clamp(0.0, 255.0)
    }

    /// Bilinear sample of the physical value grid. NaN when the point is
    /// outside the grid or the raster carries no values.
    pub fn sample_value(&self, fi: f64, fj: f64) -> f32 {
        let Some(values) = self.raster.values.as_ref() else {
            return f32::NAN;
        };
        let Some(n) = self.neighborhood(fi, fj) else {
            return f32::NAN;
        };
        let v00 = values[n.idx00] as f64;
        let v10 = values[n.idx10] as f64;
        let v01 = values[n.idx01] as f64;
        let v11 = values[n.idx11] as f64;

        let top = v00 + n.dx * (v10 - v00);
        let bottom = v01 + n.dx * (v11 - v01);
        (top + n.dy * (bottom - top)) as f32
    }

    /// Convenience: rotate, index, and sample alpha in one call.
    pub fn alpha_at_lat_lon(&self, lat_deg: f64, lon_deg: f64) -> f64 {
        let (fi, fj) = self.lat_lon_to_grid(lat_deg, lon_deg);
        self.sample_alpha(fi, fj)
    }

    fn neighborhood(&self, fi: f64, fj: f64) -> Option<Neighborhood> {
        if !fi.is_finite() || !fj.is_finite() {
            return None;
        }
        if fi < 0.0 || fj < 0.0 || fi > (self.width - 1) as f64 || fj > (self.height - 1) as f64
        {
            return None;
        }

        let i0 = fi.floor() as usize;
        let j0 = fj.floor() as usize;
        // Upper neighbours clamp at the last node so sampling exactly on
        // the grid edge stays in bounds.
        let i1 = (i0 + 1).min(self.width - 1);
        let j1 = (j0 + 1).min(self.height - 1);

        Some(Neighborhood {
            dx: fi - i0 as f64,
            dy: fj - j0 as f64,
            idx00: j0 * self.width + i0,
            idx10: j0 * self.width + i1,
            idx01: j1 * self.width + i0,
            idx11: j1 * self.width + i1,
        })
    }
}

struct Neighborhood {
    dx: f64,
    dy: f64,
    idx00: usize,
    idx10: usize,
    idx01: usize,
    idx11: usize,
}

fn wrap_lon_deg(mut lon: f64) -> f64 {
    while lon >= 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

#[cfg(test)]
mod tests {
    use super::*;
    use grib2_decoder::sections::{GridGeometry, GridTemplate, PoleRotation};

    fn plain_geometry(ni: u32, nj: u32) -> GridGeometry {
        GridGeometry {
            template: GridTemplate::PlainLatLon,
            ni,
            nj,
            first_lat_deg: 0.0,
            first_lon_deg: 0.0,
            last_lat_deg: (nj - 1) as f64,
            last_lon_deg: (ni - 1) as f64,
            d_lat_deg: 1.0,
            d_lon_deg: 1.0,
            scan_mode: 0x40,
            rotation: None,
        }
    }

    fn raster(width: u32, height: u32, pixels: Vec<u8>) -> Arc<RawRaster> {
        let values = pixels.iter().map(|&p| p as f32 * 0.5).collect();
        Arc::new(RawRaster {
            width,
            height,
            pixels,
            values: Some(values),
        })
    }

    fn raqdps_sampler() -> GridSampler {
        // The regional deterministic air-quality model grid.
        let geometry = GridGeometry {
            template: GridTemplate::RotatedLatLon,
            ni: 729,
            nj: 599,
            first_lat_deg: -32.0,
            first_lon_deg: -39.5,
            last_lat_deg: -32.0 + 0.09 * 598.0,
            last_lon_deg: -39.5 + 0.09 * 728.0,
            d_lat_deg: 0.09,
            d_lon_deg: 0.09,
            scan_mode: 0x40,
            rotation: Some(PoleRotation {
                south_pole_lat_deg: -31.758312225341797,
                south_pole_lon_deg: -92.40298461914062,
                angle_deg: 0.0,
            }),
        };
        let pixels = vec![128u8; 729 * 599];
        GridSampler::new(&geometry, raster(729, 599, pixels))
    }

    #[test]
    fn plain_grid_indices_are_degrees_over_increment() {
        let s = GridSampler::new(&plain_geometry(4, 3), raster(4, 3, vec![0; 12]));
        let (fi, fj) = s.lat_lon_to_grid(2.0, 3.0);
        assert!((fi - 3.0).abs() < 1e-12);
        assert!((fj - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sampling_at_a_node_is_exact() {
        let pixels = vec![10, 20, 30, 40, 50, 60];
        let s = GridSampler::new(&plain_geometry(3, 2), raster(3, 2, pixels));
        assert_eq!(s.sample_alpha(0.0, 0.0), 10.0);
        assert_eq!(s.sample_alpha(2.0, 0.0), 30.0);
        assert_eq!(s.sample_alpha(1.0, 1.0), 50.0);
    }

    #[test]
    fn midpoint_sampling_averages_the_four_neighbours() {
        let pixels = vec![0, 100, 200, 100];
        let s = GridSampler::new(&plain_geometry(2, 2), raster(2, 2, pixels));
        assert_eq!(s.sample_alpha(0.5, 0.5), 100.0);
    }

    #[test]
    fn outside_the_grid_is_a_sentinel_not_a_panic() {
        let s = GridSampler::new(&plain_geometry(2, 2), raster(2, 2, vec![9; 4]));
        assert_eq!(s.sample_alpha(-0.001, 0.0), ALPHA_OUTSIDE);
        assert_eq!(s.sample_alpha(0.0, 1.001), ALPHA_OUTSIDE);
        assert_eq!(s.sample_alpha(f64::NAN, 0.5), ALPHA_OUTSIDE);
        assert!(s.sample_value(5.0, 0.0).is_nan());
    }

    #[test]
    fn sampling_exactly_on_the_far_edge_stays_in_bounds() {
        let s = GridSampler::new(&plain_geometry(3, 3), raster(3, 3, vec![7; 9]));
        assert_eq!(s.sample_alpha(2.0, 2.0), 7.0);
    }

    #[test]
    fn value_grid_absence_yields_nan() {
        let s = GridSampler::new(
            &plain_geometry(2, 2),
            Arc::new(RawRaster {
                width: 2,
                height: 2,
                pixels: vec![1; 4],
                values: None,
            }),
        );
        assert!(s.sample_value(0.5, 0.5).is_nan());
    }

    #[test]
    fn rotated_grid_contains_southern_canada() {
        let s = raqdps_sampler().with_lon_offset(0.0);
        for (lat, lon) in [(45.43433, -75.676), (48.44, -123.416)] {
            let (fi, fj) = s.lat_lon_to_grid(lat, lon);
            assert!(fi > 0.0 && fi < 728.0, "fi for ({lat},{lon}): {fi}");
            assert!(fj > 0.0 && fj < 598.0, "fj for ({lat},{lon}): {fj}");
        }
    }

    #[test]
    fn lon_offset_shifts_the_column_index_only() {
        let base = raqdps_sampler().with_lon_offset(0.0);
        let offset = raqdps_sampler(); // default +4.8
        let (fi0, _) = base.lat_lon_to_grid(50.0, -95.0);
        let (fi1, _) = offset.lat_lon_to_grid(50.0, -95.0);
        assert!(
            fi1 > fi0,
            "positive offset should move the point east on the grid: {fi0} vs {fi1}"
        );
    }

    #[test]
    fn rotated_pole_itself_maps_to_ninety_rotated_latitude() {
        // The rotated north pole sits at (-sp_lat, wrap(-sp_lon + 180)).
        let s = raqdps_sampler().with_lon_offset(0.0);
        let (_, fj) = s.lat_lon_to_grid(31.758312225341797, -87.59701538085938 + 180.0);
        // phi_r = 90 deg -> fj = (90 - (-32)) / 0.09
        assert!((fj - (90.0 + 32.0) / 0.09).abs() < 1e-6);
    }
}
