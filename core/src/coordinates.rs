//! Conversion between grid coordinates and rendering space.

use glam::Vec2;
use thiserror::Error;

use crate::GridCoordinate;

/// Fixed tile dimensions used to map grid coordinates into rendering space.
///
/// Rendering space grows to the right and downwards. A grid coordinate maps
/// to the centre of its tile, so converting back by flooring always lands on
/// the original tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMetrics {
    tile_width: f32,
    tile_height: f32,
}

impl TileMetrics {
    /// Creates new tile metrics.
    ///
    /// Returns an error when either dimension is not a positive finite value.
    pub fn new(tile_width: f32, tile_height: f32) -> Result<Self, MetricsError> {
        if !(tile_width.is_finite() && tile_width > 0.0) {
            return Err(MetricsError::InvalidTileWidth(tile_width));
        }
        if !(tile_height.is_finite() && tile_height > 0.0) {
            return Err(MetricsError::InvalidTileHeight(tile_height));
        }

        Ok(Self {
            tile_width,
            tile_height,
        })
    }

    /// Width of a single tile in rendering units.
    #[must_use]
    pub const fn tile_width(&self) -> f32 {
        self.tile_width
    }

    /// Height of a single tile in rendering units.
    #[must_use]
    pub const fn tile_height(&self) -> f32 {
        self.tile_height
    }

    /// Converts a grid coordinate to the centre of its tile in rendering space.
    #[must_use]
    pub fn to_render_space(&self, coordinate: GridCoordinate) -> Vec2 {
        Vec2::new(
            (coordinate.column() as f32 + 0.5) * self.tile_width,
            (coordinate.row() as f32 + 0.5) * self.tile_height,
        )
    }

    /// Converts a rendering-space point to the tile containing it.
    ///
    /// Returns `None` for negative or non-finite points. Bounds checks against a
    /// concrete map are left to the caller.
    #[must_use]
    pub fn to_grid(&self, point: Vec2) -> Option<GridCoordinate> {
        let column = axis_to_index(point.x, self.tile_width)?;
        let row = axis_to_index(point.y, self.tile_height)?;
        Some(GridCoordinate::new(column, row))
    }
}

fn axis_to_index(value: f32, length: f32) -> Option<u32> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let index = (value / length).floor();
    if index > u32::MAX as f32 {
        return None;
    }
    Some(index as u32)
}

/// Errors raised when constructing [`TileMetrics`].
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum MetricsError {
    /// Tile width must be positive and finite.
    #[error("tile width must be positive (received {0})")]
    InvalidTileWidth(f32),
    /// Tile height must be positive and finite.
    #[error("tile height must be positive (received {0})")]
    InvalidTileHeight(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_space_round_trips_every_coordinate() {
        let metrics = TileMetrics::new(32.0, 24.0).expect("valid metrics");
        for row in 0..64 {
            for column in 0..64 {
                let coordinate = GridCoordinate::new(column, row);
                let point = metrics.to_render_space(coordinate);
                assert_eq!(metrics.to_grid(point), Some(coordinate));
            }
        }
    }

    #[test]
    fn render_space_points_at_tile_centre() {
        let metrics = TileMetrics::new(32.0, 32.0).expect("valid metrics");
        let point = metrics.to_render_space(GridCoordinate::new(2, 1));
        assert_eq!(point, Vec2::new(80.0, 48.0));
    }

    #[test]
    fn tile_edges_resolve_to_the_tile_they_start() {
        let metrics = TileMetrics::new(16.0, 16.0).expect("valid metrics");
        assert_eq!(
            metrics.to_grid(Vec2::new(16.0, 0.0)),
            Some(GridCoordinate::new(1, 0))
        );
        assert_eq!(
            metrics.to_grid(Vec2::new(15.99, 31.99)),
            Some(GridCoordinate::new(0, 1))
        );
    }

    #[test]
    fn negative_and_non_finite_points_have_no_tile() {
        let metrics = TileMetrics::new(16.0, 16.0).expect("valid metrics");
        assert_eq!(metrics.to_grid(Vec2::new(-1.0, 4.0)), None);
        assert_eq!(metrics.to_grid(Vec2::new(4.0, f32::NAN)), None);
        assert_eq!(metrics.to_grid(Vec2::new(f32::INFINITY, 4.0)), None);
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        assert_eq!(
            TileMetrics::new(0.0, 16.0),
            Err(MetricsError::InvalidTileWidth(0.0))
        );
        assert!(matches!(
            TileMetrics::new(16.0, f32::NAN),
            Err(MetricsError::InvalidTileHeight(_))
        ));
    }
}
