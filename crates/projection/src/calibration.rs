//! Affine calibration between projected metres and basemap pixels.
//!
//! The basemap raster has no embedded georeferencing, so its pixel grid is
//! tied to the projection plane through three surveyed control points. Three
//! points determine an affine map exactly; solving for it at startup absorbs
//! the raster's unknown scale, rotation, and offset in one step.

use nalgebra::{Matrix3, Vector3};

use crate::lambert::LambertConformal;
use crate::ProjectionError;

/// One surveyed tie between a geographic location and a basemap pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

/// Control points for the Canada basemap: Ottawa, Alert, and Victoria.
/// Well spread across the raster, so the affine solve is far from singular.
pub fn canada_base_map_control_points() -> [ControlPoint; 3] {
    [
        ControlPoint {
            lat_deg: 45.43433,
            lon_deg: -75.676,
            pixel_x: 25059.0,
            pixel_y: 25960.0,
        },
        ControlPoint {
            lat_deg: 82.45,
            lon_deg: -62.5,
            pixel_x: 18398.0,
            pixel_y: 399.0,
        },
        ControlPoint {
            lat_deg: 48.44,
            lon_deg: -123.416,
            pixel_x: 2245.0,
            pixel_y: 22295.0,
        },
    ]
}

/// The solved affine map and its inverse.
///
/// Forward: `px = a0 + a1*x + a2*y`, `py = b0 + b1*x + b2*y` where (x, y)
/// are projected metres. The inverse of the 2x2 linear part is precomputed
/// since the reverse direction runs once per rendered pixel.
#[derive(Debug, Clone)]
pub struct AffineCalibration {
    a: [f64; 3],
    b: [f64; 3],
    inv: [f64; 4],
}

impl AffineCalibration {
    /// Solve the affine coefficients from three control points.
    ///
    /// Fails with [`ProjectionError::SingularCalibration`] when the points
    /// are collinear in the projection plane, which would leave the pixel
    /// grid underdetermined.
    pub fn solve(
        projection: &LambertConformal,
        points: &[ControlPoint; 3],
    ) -> Result<Self, ProjectionError> {
        let mut design = Matrix3::zeros();
        let mut px = Vector3::zeros();
        let mut py = Vector3::zeros();
        for (row, p) in points.iter().enumerate() {
            let (x, y) = projection.forward(p.lat_deg, p.lon_deg);
            design[(row, 0)] = 1.0;
            design[(row, 1)] = x;
            design[(row, 2)] = y;
            px[row] = p.pixel_x;
            py[row] = p.pixel_y;
        }

        let inverse = design
            .try_inverse()
            .ok_or(ProjectionError::SingularCalibration)?;
        let a_vec = inverse * px;
        let b_vec = inverse * py;
        let a = [a_vec[0], a_vec[1], a_vec[2]];
        let b = [b_vec[0], b_vec[1], b_vec[2]];

        // Invert the 2x2 linear part for the pixel-to-metres direction.
        let det = a[1] * b[2] - a[2] * b[1];
        if det.abs() < f64::EPSILON {
            return Err(ProjectionError::SingularCalibration);
        }
        let inv = [b[2] / det, -a[2] / det, -b[1] / det, a[1] / det];

        Ok(Self { a, b, inv })
    }

    /// Projected metres to fractional basemap pixels.
    pub fn project_to_pixel(&self, x_m: f64, y_m: f64) -> (f64, f64) {
        (
            self.a[0] + self.a[1] * x_m + self.a[2] * y_m,
            self.b[0] + self.b[1] * x_m + self.b[2] * y_m,
        )
    }

    /// Fractional basemap pixels to projected metres.
    pub fn pixel_to_project(&self, pixel_x: f64, pixel_y: f64) -> (f64, f64) {
        let dx = pixel_x - self.a[0];
        let dy = pixel_y - self.b[0];
        (
            self.inv[0] * dx + self.inv[1] * dy,
            self.inv[2] * dx + self.inv[3] * dy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lambert::LambertParams;

    fn solved() -> (LambertConformal, AffineCalibration) {
        let proj = LambertConformal::new(LambertParams::default());
        let cal = AffineCalibration::solve(&proj, &canada_base_map_control_points()).unwrap();
        (proj, cal)
    }

    #[test]
    fn reproduces_the_control_points_exactly() {
        let (proj, cal) = solved();
        for p in canada_base_map_control_points() {
            let (x, y) = proj.forward(p.lat_deg, p.lon_deg);
            let (px, py) = cal.project_to_pixel(x, y);
            assert!((px - p.pixel_x).abs() < 1e-6, "px for {p:?}: {px}");
            assert!((py - p.pixel_y).abs() < 1e-6, "py for {p:?}: {py}");
        }
    }

    #[test]
    fn pixel_round_trip_is_exact() {
        let (_, cal) = solved();
        let (x, y) = cal.pixel_to_project(12_000.0, 9_500.0);
        let (px, py) = cal.project_to_pixel(x, y);
        assert!((px - 12_000.0).abs() < 1e-6);
        assert!((py - 9_500.0).abs() < 1e-6);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let proj = LambertConformal::new(LambertParams::default());
        // Three points on the central meridian project onto one line.
        let points = [
            ControlPoint {
                lat_deg: 45.0,
                lon_deg: -95.0,
                pixel_x: 0.0,
                pixel_y: 0.0,
            },
            ControlPoint {
                lat_deg: 55.0,
                lon_deg: -95.0,
                pixel_x: 0.0,
                pixel_y: 100.0,
            },
            ControlPoint {
                lat_deg: 65.0,
                lon_deg: -95.0,
                pixel_x: 0.0,
                pixel_y: 200.0,
            },
        ];
        let err = AffineCalibration::solve(&proj, &points).unwrap_err();
        assert!(matches!(err, ProjectionError::SingularCalibration));
    }
}
