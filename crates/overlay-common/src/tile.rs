//! Tile addressing for the composite map view.

use serde::{Deserialize, Serialize};

/// A tile coordinate (row/col/zoom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Row (y), counted from the top of the base map
    pub row: u32,
    /// Column (x), counted from the left of the base map
    pub col: u32,
    /// Zoom level, 0 = most zoomed out
    pub zoom: u32,
}

impl TileCoord {
    pub fn new(row: u32, col: u32, zoom: u32) -> Self {
        Self { row, col, zoom }
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.zoom, self.col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality_and_key() {
        let a = TileCoord::new(3, 7, 5);
        let b = TileCoord::new(3, 7, 5);
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), "5/7/3");
        assert_ne!(a, TileCoord::new(7, 3, 5));
    }
}
