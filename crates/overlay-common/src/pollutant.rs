//! Pollutant series registry.
//!
//! One row per published surface pollutant, holding the display metadata,
//! the linear scaling applied when decoding the raw raster (e.g. kg/m³ to
//! µg/m³), the physical bounds mapped to the overlay alpha range, and the
//! two file-naming conventions used by the remote source (forecast model vs
//! hourly observation analysis).

use serde::{Deserialize, Serialize};

/// A pollutant series published by the remote air-quality models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    Pm25,
    Pm25Smoke,
    Pm10,
    Pm10Smoke,
    So2,
    No2,
    No,
    O3,
}

/// Static metadata for one pollutant series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSpec {
    pub display_name: &'static str,
    pub units: &'static str,
    /// Linear factor from the raw model units to `units`
    pub unit_scale: f32,
    /// Physical value mapped to zero overlay alpha
    pub overlay_min: f32,
    /// Physical value mapped to full overlay alpha
    pub overlay_max: f32,
    /// File-name fragment used by the forecast model products
    pub forecast_name: &'static str,
    /// File-name fragment used by the observation analysis products
    pub observation_name: &'static str,
    /// Wildfire-smoke plume variant of a base series
    pub smoke: bool,
}

impl Pollutant {
    pub const ALL: [Pollutant; 8] = [
        Pollutant::Pm25,
        Pollutant::Pm25Smoke,
        Pollutant::Pm10,
        Pollutant::Pm10Smoke,
        Pollutant::So2,
        Pollutant::No2,
        Pollutant::No,
        Pollutant::O3,
    ];

    pub fn spec(self) -> &'static SeriesSpec {
        match self {
            // Raw particulate data is in kg/m³, displayed as µg/m³
            Pollutant::Pm25 => &SeriesSpec {
                display_name: "PM 2.5",
                units: "µg/m³",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 40.0,
                forecast_name: "_PM2.5_Sfc",
                observation_name: "_PM2.5_Sfc",
                smoke: false,
            },
            Pollutant::Pm25Smoke => &SeriesSpec {
                display_name: "PM 2.5/Smoke",
                units: "µg/m³",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 40.0,
                forecast_name: "_PM2.5-WildfireSmokePlume_Sfc",
                observation_name: "-FW_PM2.5_Sfc",
                smoke: true,
            },
            Pollutant::Pm10 => &SeriesSpec {
                display_name: "PM 10",
                units: "µg/m³",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 50.0,
                forecast_name: "_PM10_Sfc",
                observation_name: "_PM10_Sfc",
                smoke: false,
            },
            Pollutant::Pm10Smoke => &SeriesSpec {
                display_name: "PM 10/Smoke",
                units: "µg/m³",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 50.0,
                forecast_name: "_PM10-WildfireSmokePlume_Sfc",
                observation_name: "-FW_PM10_Sfc",
                smoke: true,
            },
            // Gases are published as volume mixing ratios, displayed as ppb
            Pollutant::So2 => &SeriesSpec {
                display_name: "SO2",
                units: "ppb",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 30.0,
                forecast_name: "_SO2_Sfc",
                observation_name: "_SO2_Sfc",
                smoke: false,
            },
            Pollutant::No2 => &SeriesSpec {
                display_name: "NO2",
                units: "ppb",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 30.0,
                forecast_name: "_NO2_Sfc",
                observation_name: "_NO2_Sfc",
                smoke: false,
            },
            Pollutant::No => &SeriesSpec {
                display_name: "NO",
                units: "ppb",
                unit_scale: 1_000_000_000.0,
                overlay_min: 0.0,
                overlay_max: 40.0,
                forecast_name: "_NO_Sfc",
                observation_name: "_NO_Sfc",
                smoke: false,
            },
            Pollutant::O3 => &SeriesSpec {
                display_name: "O3",
                units: "ppb",
                unit_scale: 1_000_000_000.0,
                overlay_min: 20.0,
                overlay_max: 100.0,
                forecast_name: "_O3_Sfc",
                observation_name: "_O3_Sfc",
                smoke: false,
            },
        }
    }

    pub fn from_display_name(name: &str) -> Option<Pollutant> {
        Self::ALL
            .into_iter()
            .find(|p| p.spec().display_name.eq_ignore_ascii_case(name))
    }
}
