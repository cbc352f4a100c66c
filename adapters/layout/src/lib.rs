#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! JSON map layouts for the tile RPG engine.
//!
//! A map document lists its grid dimensions, tile metrics, one entry per
//! tile in row-major order and the objects placed at load time. Tiles and
//! objects may carry attached listener chains. The provider turns documents
//! into [`MapLayout`]s; structural consistency is checked again by the world
//! when it is built.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use tile_rpg_core::{AttachedChain, GridCoordinate, ObjectBlueprint, ObjectId, TerrainKind};
use tile_rpg_world::{LayoutProvider, MapLayout, MapLoadError, ObjectLayout, TileLayout};

/// Document version understood by [`parse_layout`].
pub const SUPPORTED_LAYOUT_VERSION: u32 = 1;

const LAYOUT_EXTENSION: &str = "json";

/// Reads map documents named `<map_id>.json` from a directory.
#[derive(Clone, Debug)]
pub struct JsonLayoutProvider {
    root: PathBuf,
}

impl JsonLayoutProvider {
    /// Creates a provider reading documents from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the provider reads from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document describing `map_id`.
    ///
    /// Identifiers that could escape the root directory are rejected.
    pub fn document_path(&self, map_id: &str) -> Result<PathBuf, MapLoadError> {
        let escapes = map_id.is_empty()
            || map_id.contains(['/', '\\'])
            || map_id.split('.').any(str::is_empty);
        if escapes {
            return Err(MapLoadError::SourceNotFound(map_id.to_owned()));
        }
        Ok(self.root.join(format!("{map_id}.{LAYOUT_EXTENSION}")))
    }
}

impl LayoutProvider for JsonLayoutProvider {
    fn provide(&self, map_id: &str) -> Result<MapLayout, MapLoadError> {
        let path = self.document_path(map_id)?;
        debug!("reading map `{map_id}` from {}", path.display());

        let contents = fs::read_to_string(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => MapLoadError::SourceNotFound(path.display().to_string()),
            _ => MapLoadError::MalformedLayout(format!(
                "failed to read {}: {error}",
                path.display()
            )),
        })?;
        parse_layout(&contents)
    }
}

/// Parses a JSON map document.
pub fn parse_layout(contents: &str) -> Result<MapLayout, MapLoadError> {
    let document: LayoutDocument = serde_json::from_str(contents)
        .map_err(|error| MapLoadError::MalformedLayout(error.to_string()))?;
    document.into_layout()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutDocument {
    version: u32,
    columns: u32,
    rows: u32,
    tile_width: f32,
    tile_height: f32,
    #[serde(default)]
    player: Option<String>,
    tiles: Vec<TileEntry>,
    #[serde(default)]
    objects: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct TileEntry {
    terrain: u32,
    collision: bool,
    #[serde(default)]
    event: Option<AttachedChain>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    id: u32,
    name: String,
    column: u32,
    row: u32,
    #[serde(default)]
    collision: bool,
    #[serde(default)]
    interaction: Option<AttachedChain>,
    #[serde(default)]
    behavior: Option<AttachedChain>,
}

impl LayoutDocument {
    fn into_layout(self) -> Result<MapLayout, MapLoadError> {
        if self.version != SUPPORTED_LAYOUT_VERSION {
            return Err(MapLoadError::InvalidPropertyValue(format!(
                "unsupported layout version {}; expected {SUPPORTED_LAYOUT_VERSION}",
                self.version
            )));
        }

        let tiles = self
            .tiles
            .into_iter()
            .map(|tile| TileLayout {
                terrain: TerrainKind::new(tile.terrain),
                collision: tile.collision,
                chain: tile.event,
            })
            .collect();

        let objects = self
            .objects
            .into_iter()
            .map(|object| {
                let mut blueprint =
                    ObjectBlueprint::new(ObjectId::new(object.id), object.name, object.collision);
                blueprint.interaction = object.interaction;
                blueprint.behavior = object.behavior;
                ObjectLayout {
                    blueprint,
                    coordinate: GridCoordinate::new(object.column, object.row),
                }
            })
            .collect();

        Ok(MapLayout {
            columns: self.columns,
            rows: self.rows,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            tiles,
            objects,
            player: self.player,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_rpg_core::{ExecutionKind, ListenerId, ListenerKind};

    const TWO_BY_ONE: &str = r#"{
        "version": 1,
        "columns": 2,
        "rows": 1,
        "tile_width": 32.0,
        "tile_height": 32.0,
        "player": "hero",
        "tiles": [
            { "terrain": 0, "collision": false },
            {
                "terrain": 3,
                "collision": true,
                "event": {
                    "id": 4,
                    "trigger": "touch",
                    "listeners": [
                        { "kind": "show_dialog", "params": { "text": "A wall." } },
                        { "kind": "hide_dialog" }
                    ]
                }
            }
        ],
        "objects": [
            { "id": 1, "name": "hero", "column": 0, "row": 0, "collision": true }
        ]
    }"#;

    #[test]
    fn parses_tiles_objects_and_chains() {
        let layout = parse_layout(TWO_BY_ONE).expect("valid document");

        assert_eq!((layout.columns, layout.rows), (2, 1));
        assert_eq!(layout.player.as_deref(), Some("hero"));
        assert!(layout.tiles[1].collision);
        assert_eq!(layout.tiles[1].terrain, TerrainKind::new(3));

        let chain = layout.tiles[1].chain.as_ref().expect("tile chain");
        assert_eq!(chain.id(), ListenerId::new(4));
        assert_eq!(chain.execution(), ExecutionKind::Once);
        let kinds: Vec<ListenerKind> = chain.chain().iter().map(|step| step.kind()).collect();
        assert_eq!(kinds, vec![ListenerKind::ShowDialog, ListenerKind::HideDialog]);

        assert_eq!(layout.objects.len(), 1);
        assert_eq!(layout.objects[0].coordinate, GridCoordinate::new(0, 0));
        assert!(layout.objects[0].blueprint.collision);
    }

    #[test]
    fn unsupported_versions_are_invalid_properties() {
        let document = TWO_BY_ONE.replace("\"version\": 1", "\"version\": 7");
        assert!(matches!(
            parse_layout(&document),
            Err(MapLoadError::InvalidPropertyValue(message)) if message.contains('7')
        ));
    }

    #[test]
    fn syntax_errors_are_malformed() {
        assert!(matches!(
            parse_layout("{ \"version\": 1,"),
            Err(MapLoadError::MalformedLayout(_))
        ));
    }

    #[test]
    fn map_ids_cannot_escape_the_root() {
        let provider = JsonLayoutProvider::new("maps");
        assert!(provider.document_path("../secrets").is_err());
        assert!(provider.document_path("nested/map").is_err());
        assert!(provider.document_path("").is_err());
        assert_eq!(
            provider.document_path("town").ok(),
            Some(PathBuf::from("maps").join("town.json"))
        );
    }
}
