//! Geographic-to-basemap coordinate transformations.
//!
//! Two stages compose here: the ellipsoidal Lambert Conformal Conic
//! projection takes latitude/longitude to projected metres, and an affine
//! calibration solved from three control points takes projected metres to
//! basemap pixels. [`MapTransformer`] bundles both directions.

pub mod calibration;
pub mod lambert;

pub use calibration::{canada_base_map_control_points, AffineCalibration, ControlPoint};
pub use lambert::{LambertConformal, LambertParams};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The calibration control points are collinear in the projection
    /// plane. This is a configuration defect and fatal at startup.
    #[error("calibration control points are collinear; affine solve is singular")]
    SingularCalibration,
}

/// Bidirectional transform between geographic coordinates and basemap
/// pixels. Cheap to clone and safe to share across render threads.
#[derive(Debug, Clone)]
pub struct MapTransformer {
    projection: LambertConformal,
    calibration: AffineCalibration,
}

impl MapTransformer {
    pub fn new(
        params: LambertParams,
        points: &[ControlPoint; 3],
    ) -> Result<Self, ProjectionError> {
        let projection = LambertConformal::new(params);
        let calibration = AffineCalibration::solve(&projection, points)?;
        Ok(Self {
            projection,
            calibration,
        })
    }

    /// The Canada basemap transform: EPSG:3978 with the standard three
    /// control points.
    pub fn canada_base_map() -> Result<Self, ProjectionError> {
        Self::new(
            LambertParams::default(),
            &canada_base_map_control_points(),
        )
    }

    /// Geographic coordinates to the nearest basemap pixel.
    pub fn lat_lon_to_pixel(&self, lat_deg: f64, lon_deg: f64) -> (i32, i32) {
        let (x, y) = self.projection.forward(lat_deg, lon_deg);
        let (px, py) = self.calibration.project_to_pixel(x, y);
        (px.round() as i32, py.round() as i32)
    }

    /// Basemap pixel (fractional) to geographic coordinates.
    pub fn pixel_to_lat_lon(&self, pixel_x: f64, pixel_y: f64) -> (f64, f64) {
        let (x, y) = self.calibration.pixel_to_project(pixel_x, pixel_y);
        self.projection.inverse(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_cities_land_on_their_pixels() {
        let t = MapTransformer::canada_base_map().unwrap();
        assert_eq!(t.lat_lon_to_pixel(45.43433, -75.676), (25059, 25960));
        assert_eq!(t.lat_lon_to_pixel(82.45, -62.5), (18398, 399));
        assert_eq!(t.lat_lon_to_pixel(48.44, -123.416), (2245, 22295));
    }

    #[test]
    fn pixel_round_trip_stays_within_a_hundredth_of_a_degree() {
        let t = MapTransformer::canada_base_map().unwrap();
        let cities = [
            (45.43433, -75.676),    // Ottawa
            (46.8139, -71.2080),    // Quebec City
            (43.65, -79.38),        // Toronto
            (49.2827, -123.1207),   // Vancouver
            (53.5461, -113.4938),   // Edmonton
            (82.45, -62.5),         // Alert
            (62.45, -114.38),       // Yellowknife
        ];
        for (lat, lon) in cities {
            let (px, py) = t.lat_lon_to_pixel(lat, lon);
            let (lat2, lon2) = t.pixel_to_lat_lon(px as f64, py as f64);
            assert!((lat - lat2).abs() < 0.01, "{lat} -> {lat2}");
            assert!((lon - lon2).abs() < 0.01, "{lon} -> {lon2}");
        }
    }

    #[test]
    fn interior_points_fall_between_the_control_pixels() {
        let t = MapTransformer::canada_base_map().unwrap();
        // Winnipeg sits between Victoria and Ottawa in x.
        let (px, _) = t.lat_lon_to_pixel(49.9, -97.14);
        assert!(px > 2245 && px < 25059, "Winnipeg x pixel: {px}");
    }
}
