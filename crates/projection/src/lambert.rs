//! Ellipsoidal Lambert Conformal Conic projection (two standard parallels).
//!
//! The basemap raster is drawn in EPSG:3978 (NAD83 / Canada Atlas Lambert),
//! which uses the GRS 1980 ellipsoid. A spherical cone is off by several
//! kilometres at Canadian latitudes, so the full ellipsoidal form is used
//! here: isometric-latitude `t` and parallel-scale `m` terms on the forward
//! path, and a conformal-latitude series on the inverse.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Defining constants for a Lambert Conformal Conic projection on an
/// ellipsoid of revolution. Angles are in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LambertParams {
    /// Semi-major axis (metres)
    pub semi_major_m: f64,
    /// Inverse flattening (1/f)
    pub inverse_flattening: f64,
    /// Latitude of origin
    pub origin_lat_deg: f64,
    /// Central meridian
    pub origin_lon_deg: f64,
    /// First standard parallel
    pub parallel1_deg: f64,
    /// Second standard parallel
    pub parallel2_deg: f64,
}

impl Default for LambertParams {
    /// EPSG:3978, NAD83 / Canada Atlas Lambert on GRS 1980.
    fn default() -> Self {
        Self {
            semi_major_m: 6_378_137.0,
            inverse_flattening: 298.257222101,
            origin_lat_deg: 49.0,
            origin_lon_deg: -95.0,
            parallel1_deg: 49.0,
            parallel2_deg: 77.0,
        }
    }
}

/// A configured projection with the per-parameter constants precomputed.
/// Construction is the expensive part; `forward`/`inverse` are a handful of
/// transcendental calls each.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    params: LambertParams,
    /// First eccentricity
    e: f64,
    /// Cone constant
    n: f64,
    /// Mapping radius factor, premultiplied by the semi-major axis
    af: f64,
    /// Radius of the origin parallel
    rho0: f64,
    origin_lon_rad: f64,
    /// Conformal-to-geodetic latitude series coefficients
    c2: f64,
    c4: f64,
    c6: f64,
    c8: f64,
}

impl LambertConformal {
    pub fn new(params: LambertParams) -> Self {
        let f = 1.0 / params.inverse_flattening;
        let e2 = 2.0 * f - f * f;
        let e = e2.sqrt();

        let phi0 = params.origin_lat_deg.to_radians();
        let phi1 = params.parallel1_deg.to_radians();
        let phi2 = params.parallel2_deg.to_radians();

        let m1 = m(phi1, e);
        let t0 = t(phi0, e);
        let t1 = t(phi1, e);

        let n = if (phi1 - phi2).abs() < 1e-10 {
            phi1.sin()
        } else {
            let m2 = m(phi2, e);
            let t2 = t(phi2, e);
            (m1.ln() - m2.ln()) / (t1.ln() - t2.ln())
        };

        let big_f = m1 / (n * t1.powf(n));
        let af = params.semi_major_m * big_f;
        let rho0 = af * t0.powf(n);

        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let e8 = e6 * e2;

        Self {
            e,
            n,
            af,
            rho0,
            origin_lon_rad: params.origin_lon_deg.to_radians(),
            c2: e2 / 2.0 + 5.0 * e4 / 24.0 + e6 / 12.0 + 13.0 * e8 / 360.0,
            c4: 7.0 * e4 / 48.0 + 29.0 * e6 / 240.0 + 811.0 * e8 / 11520.0,
            c6: 7.0 * e6 / 120.0 + 81.0 * e8 / 1120.0,
            c8: 4279.0 * e8 / 161280.0,
            params,
        }
    }

    pub fn params(&self) -> &LambertParams {
        &self.params
    }

    /// Geographic to projected coordinates. Returns (easting, northing)
    /// in metres relative to the projection origin.
    pub fn forward(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let phi = lat_deg.to_radians();
        let lambda = normalize_lon_rad(lon_deg.to_radians() - self.origin_lon_rad);

        let rho = self.af * t(phi, self.e).powf(self.n);
        let theta = self.n * lambda;

        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }

    /// Projected to geographic coordinates. Returns (lat, lon) in degrees,
    /// longitude normalized to [-180, 180).
    pub fn inverse(&self, easting_m: f64, northing_m: f64) -> (f64, f64) {
        let dy = self.rho0 - northing_m;
        let mut rho = (easting_m * easting_m + dy * dy).sqrt();
        let mut x = easting_m;
        let mut y = dy;
        if self.n < 0.0 {
            rho = -rho;
            x = -x;
            y = -y;
        }
        let theta = x.atan2(y);

        let t_prime = (rho / self.af).powf(1.0 / self.n);
        let chi = FRAC_PI_2 - 2.0 * t_prime.atan();
        let phi = chi
            + self.c2 * (2.0 * chi).sin()
            + self.c4 * (4.0 * chi).sin()
            + self.c6 * (6.0 * chi).sin()
            + self.c8 * (8.0 * chi).sin();

        let lambda = normalize_lon_rad(self.origin_lon_rad + theta / self.n);
        (phi.to_degrees(), lambda.to_degrees())
    }
}

/// Scale of a parallel: m = cos(phi) / sqrt(1 - e^2 sin^2 phi)
fn m(phi: f64, e: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e * e * s * s).sqrt()
}

/// Isometric latitude function:
/// t = tan(pi/4 - phi/2) / ((1 - e sin phi) / (1 + e sin phi))^(e/2)
fn t(phi: f64, e: f64) -> f64 {
    let s = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - s) / (1.0 + s)).powf(e / 2.0)
}

/// Wrap a longitude in radians to [-pi, pi).
fn normalize_lon_rad(mut lon: f64) -> f64 {
    while lon >= PI {
        lon -= 2.0 * PI;
    }
    while lon < -PI {
        lon += 2.0 * PI;
    }
    lon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canada() -> LambertConformal {
        LambertConformal::new(LambertParams::default())
    }

    #[test]
    fn origin_projects_to_zero_easting() {
        let proj = canada();
        let (e, n) = proj.forward(49.0, -95.0);
        assert!(e.abs() < 1e-6, "easting at the origin should be 0, got {e}");
        assert!(n.abs() < 1e-3, "northing at the origin should be 0, got {n}");
    }

    #[test]
    fn east_of_central_meridian_has_positive_easting() {
        let proj = canada();
        let (e_ottawa, _) = proj.forward(45.43433, -75.676);
        let (e_victoria, _) = proj.forward(48.44, -123.416);
        assert!(e_ottawa > 0.0);
        assert!(e_victoria < 0.0);
    }

    #[test]
    fn round_trips_across_the_domain() {
        let proj = canada();
        let points = [
            (45.43433, -75.676),    // Ottawa
            (46.8139, -71.2080),    // Quebec City
            (43.65, -79.38),        // Toronto
            (49.2827, -123.1207),   // Vancouver
            (53.5461, -113.4938),   // Edmonton
            (82.45, -62.5),         // Alert
            (62.45, -114.38),       // Yellowknife
        ];
        for (lat, lon) in points {
            let (e, n) = proj.forward(lat, lon);
            let (lat2, lon2) = proj.inverse(e, n);
            assert!(
                (lat - lat2).abs() < 1e-7,
                "lat round trip {lat} -> {lat2}"
            );
            assert!(
                (lon - lon2).abs() < 1e-7,
                "lon round trip {lon} -> {lon2}"
            );
        }
    }

    #[test]
    fn longitude_normalizes_across_the_antimeridian() {
        let proj = canada();
        let (e1, n1) = proj.forward(60.0, -170.0);
        let (e2, n2) = proj.forward(60.0, 190.0);
        assert!((e1 - e2).abs() < 1e-6);
        assert!((n1 - n2).abs() < 1e-6);
    }
}
