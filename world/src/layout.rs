//! Validated map layouts handed to the world by an external provider.

use std::collections::BTreeSet;

use thiserror::Error;
use tile_rpg_core::{
    AttachedChain, GridCoordinate, ListenerId, ObjectBlueprint, TerrainKind, TileMetrics,
};

/// Source of map layouts, such as a map file parser.
///
/// Implementations either return a complete layout or fail; the world never
/// initializes from a partial layout.
pub trait LayoutProvider {
    /// Produces the layout identified by `map_id`.
    fn provide(&self, map_id: &str) -> Result<MapLayout, MapLoadError>;
}

/// Reasons a map could not be constructed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MapLoadError {
    /// The provider could not locate the requested map.
    #[error("map source `{0}` was not found")]
    SourceNotFound(String),
    /// The layout structure is malformed or incomplete.
    #[error("malformed map layout: {0}")]
    MalformedLayout(String),
    /// A property carried a value the engine cannot accept.
    #[error("invalid map property value: {0}")]
    InvalidPropertyValue(String),
}

/// Terrain, collision and optional touch chain of one tile in a layout.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayout {
    /// Tile-set entry used to draw the tile.
    pub terrain: TerrainKind,
    /// Indicates whether the tile blocks movement.
    pub collision: bool,
    /// Chain fired when the tile is touched.
    pub chain: Option<AttachedChain>,
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            terrain: TerrainKind::new(0),
            collision: false,
            chain: None,
        }
    }
}

/// Object placement captured in a layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectLayout {
    /// Description of the object.
    pub blueprint: ObjectBlueprint,
    /// Tile the object occupies when the map loads.
    pub coordinate: GridCoordinate,
}

/// Complete description of a map as delivered by a [`LayoutProvider`].
#[derive(Clone, Debug, PartialEq)]
pub struct MapLayout {
    /// Number of tile columns.
    pub columns: u32,
    /// Number of tile rows.
    pub rows: u32,
    /// Width of a tile in rendering units.
    pub tile_width: f32,
    /// Height of a tile in rendering units.
    pub tile_height: f32,
    /// Row-major tiles; must contain `columns * rows` entries.
    pub tiles: Vec<TileLayout>,
    /// Objects placed when the map loads.
    pub objects: Vec<ObjectLayout>,
    /// Name of the object controlled by the player.
    pub player: Option<String>,
}

impl MapLayout {
    /// Creates a layout filled with passable default tiles and no objects.
    #[must_use]
    pub fn filled(columns: u32, rows: u32, tile_width: f32, tile_height: f32) -> Self {
        let count = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0);
        Self {
            columns,
            rows,
            tile_width,
            tile_height,
            tiles: vec![TileLayout::default(); count],
            objects: Vec::new(),
            player: None,
        }
    }

    /// Marks the tile at `coordinate` as blocking.
    #[must_use]
    pub fn with_collision(mut self, coordinate: GridCoordinate) -> Self {
        if let Some(tile) = self.tile_mut(coordinate) {
            tile.collision = true;
        }
        self
    }

    /// Attaches a touch chain to the tile at `coordinate`.
    #[must_use]
    pub fn with_tile_chain(mut self, coordinate: GridCoordinate, chain: AttachedChain) -> Self {
        if let Some(tile) = self.tile_mut(coordinate) {
            tile.chain = Some(chain);
        }
        self
    }

    /// Places an object.
    #[must_use]
    pub fn with_object(mut self, blueprint: ObjectBlueprint, coordinate: GridCoordinate) -> Self {
        self.objects.push(ObjectLayout {
            blueprint,
            coordinate,
        });
        self
    }

    /// Names the object controlled by the player.
    #[must_use]
    pub fn with_player(mut self, name: impl Into<String>) -> Self {
        self.player = Some(name.into());
        self
    }

    fn tile_mut(&mut self, coordinate: GridCoordinate) -> Option<&mut TileLayout> {
        if coordinate.column() >= self.columns || coordinate.row() >= self.rows {
            return None;
        }
        let index = usize::try_from(coordinate.row())
            .ok()?
            .checked_mul(usize::try_from(self.columns).ok()?)?
            .checked_add(usize::try_from(coordinate.column()).ok()?)?;
        self.tiles.get_mut(index)
    }

    /// Checks internal consistency and derives the tile metrics.
    pub(crate) fn validate(&self) -> Result<TileMetrics, MapLoadError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(MapLoadError::MalformedLayout(format!(
                "grid dimensions {}x{} have no area",
                self.columns, self.rows
            )));
        }

        let expected = u64::from(self.columns) * u64::from(self.rows);
        if self.tiles.len() as u64 != expected {
            return Err(MapLoadError::MalformedLayout(format!(
                "expected {expected} tiles for a {}x{} grid, found {}",
                self.columns,
                self.rows,
                self.tiles.len()
            )));
        }

        let metrics = TileMetrics::new(self.tile_width, self.tile_height)
            .map_err(|error| MapLoadError::InvalidPropertyValue(error.to_string()))?;

        let mut object_ids = BTreeSet::new();
        let mut names = BTreeSet::new();
        let mut listener_ids = BTreeSet::new();
        let mut claim = |chain: Option<&AttachedChain>| -> Result<(), MapLoadError> {
            if let Some(chain) = chain {
                if !listener_ids.insert(chain.id()) {
                    return Err(duplicate_listener(chain.id()));
                }
            }
            Ok(())
        };

        for tile in &self.tiles {
            claim(tile.chain.as_ref())?;
        }

        for object in &self.objects {
            let coordinate = object.coordinate;
            if coordinate.column() >= self.columns || coordinate.row() >= self.rows {
                return Err(MapLoadError::InvalidPropertyValue(format!(
                    "object `{}` placed outside the map at {coordinate}",
                    object.blueprint.name
                )));
            }
            if !object_ids.insert(object.blueprint.id) {
                return Err(MapLoadError::InvalidPropertyValue(format!(
                    "object id {} is used more than once",
                    object.blueprint.id.get()
                )));
            }
            let _ = names.insert(object.blueprint.name.as_str());
            claim(object.blueprint.interaction.as_ref())?;
            claim(object.blueprint.behavior.as_ref())?;
        }

        if let Some(player) = &self.player {
            if !names.contains(player.as_str()) {
                return Err(MapLoadError::InvalidPropertyValue(format!(
                    "player object `{player}` is not placed on the map"
                )));
            }
        }

        Ok(metrics)
    }
}

fn duplicate_listener(id: ListenerId) -> MapLoadError {
    MapLoadError::InvalidPropertyValue(format!(
        "listener id {} is attached more than once",
        id.get()
    ))
}
