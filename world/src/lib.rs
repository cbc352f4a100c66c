#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative map state for the tile RPG engine.
//!
//! The [`World`] is the map facade: it owns the tile and object store, is
//! constructed only from a fully validated [`MapLayout`], and changes only
//! through [`apply`]. Read access goes through the [`query`] module.

mod layout;
mod store;

use log::debug;
use tile_rpg_core::{Command, Event, GridCoordinate, ObjectId, PlacementError, TileMetrics};

pub use layout::{LayoutProvider, MapLayout, MapLoadError, ObjectLayout, TileLayout};
pub use store::{MapObject, Tile};

use store::ObjectStore;

/// Represents the authoritative map state.
#[derive(Debug)]
pub struct World {
    metrics: TileMetrics,
    store: ObjectStore,
    player: Option<String>,
    tick_index: u64,
}

impl World {
    /// Loads the map identified by `map_id` from the provider.
    ///
    /// Any provider or validation failure yields an error; no partially
    /// initialized world is ever returned.
    pub fn load<P>(provider: &P, map_id: &str) -> Result<Self, MapLoadError>
    where
        P: LayoutProvider + ?Sized,
    {
        let layout = provider.provide(map_id)?;
        let world = Self::from_layout(layout)?;
        debug!("loaded map `{map_id}`");
        Ok(world)
    }

    /// Builds a world from an already parsed layout.
    pub fn from_layout(layout: MapLayout) -> Result<Self, MapLoadError> {
        let metrics = layout.validate()?;
        let MapLayout {
            columns,
            rows,
            tiles,
            objects,
            player,
            ..
        } = layout;

        let tiles = tiles
            .into_iter()
            .map(|tile| Tile::new(tile.terrain, tile.collision, tile.chain))
            .collect();
        let mut store = ObjectStore::new(columns, rows, tiles);

        for object in objects {
            store
                .insert_object(object.blueprint, object.coordinate)
                .map_err(|error| MapLoadError::InvalidPropertyValue(error.to_string()))?;
        }
        let _ = store.recompute_z_order();

        debug!(
            "built {columns}x{rows} map with {} objects",
            store.objects().count()
        );

        Ok(Self {
            metrics,
            store,
            player,
            tick_index: 0,
        })
    }

    fn update_placement(
        &mut self,
        object: ObjectId,
        destination: GridCoordinate,
    ) -> Result<GridCoordinate, PlacementError> {
        let from = self
            .store
            .object(object)
            .map(MapObject::coordinate)
            .ok_or(PlacementError::ObjectNotFound(object))?;
        self.store.move_object(object, from, destination)?;
        Ok(from)
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Rejected commands leave the world untouched and emit
/// [`Event::PlacementRejected`].
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetCollision {
            coordinate,
            enabled,
        } => match world.store.set_collision(coordinate, enabled) {
            Ok(()) => out_events.push(Event::CollisionChanged {
                coordinate,
                enabled,
            }),
            Err(reason) => out_events.push(Event::PlacementRejected { reason }),
        },
        Command::PlaceObject {
            blueprint,
            coordinate,
        } => {
            let object = blueprint.id;
            match world.store.insert_object(blueprint, coordinate) {
                Ok(()) => out_events.push(Event::ObjectPlaced { object, coordinate }),
                Err(reason) => out_events.push(Event::PlacementRejected { reason }),
            }
        }
        Command::RemoveObject { object } => match world.store.remove_object(object) {
            Ok(removed) => out_events.push(Event::ObjectRemoved {
                object,
                coordinate: removed.coordinate(),
            }),
            Err(reason) => out_events.push(Event::PlacementRejected { reason }),
        },
        Command::UpdatePlacement {
            object,
            destination,
        } => match world.update_placement(object, destination) {
            Ok(from) => out_events.push(Event::ObjectMoved {
                object,
                from,
                to: destination,
            }),
            Err(reason) => out_events.push(Event::PlacementRejected { reason }),
        },
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            if world.store.is_z_order_dirty() {
                let order = world.store.recompute_z_order().to_vec();
                debug!(
                    "recomputed z-order of {} objects on tick {}",
                    order.len(),
                    world.tick_index
                );
                out_events.push(Event::ZOrderRecomputed { order });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use tile_rpg_core::{AttachedChain, GridCoordinate, ListenerId, ObjectId, TileMetrics};

    use super::{MapObject, Tile, World};

    /// Owner of an attached chain.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum ChainOwner {
        /// The chain belongs to an object.
        Object(ObjectId),
        /// The chain belongs to a tile.
        Tile(GridCoordinate),
    }

    impl ChainOwner {
        /// Object owning the chain, if the owner is an object.
        #[must_use]
        pub const fn object(&self) -> Option<ObjectId> {
            match self {
                Self::Object(id) => Some(*id),
                Self::Tile(_) => None,
            }
        }
    }

    /// Attached chain paired with its owner.
    #[derive(Clone, Copy, Debug)]
    pub struct ChainRef<'a> {
        /// Tile or object the chain is attached to.
        pub owner: ChainOwner,
        /// The attachment itself.
        pub attached: &'a AttachedChain,
    }

    /// Tile metrics used to convert between grid and rendering space.
    #[must_use]
    pub fn metrics(world: &World) -> TileMetrics {
        world.metrics
    }

    /// Number of columns and rows in the map.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        world.store.dimensions()
    }

    /// Reports whether the coordinate lies inside the map.
    #[must_use]
    pub fn contains(world: &World, coordinate: GridCoordinate) -> bool {
        world.store.contains(coordinate)
    }

    /// Number of ticks the world has processed.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Tile stored at the coordinate.
    #[must_use]
    pub fn tile_at(world: &World, coordinate: GridCoordinate) -> Option<&Tile> {
        world.store.tile_at(coordinate)
    }

    /// Every tile paired with its coordinate, in row-major order.
    pub fn tiles(world: &World) -> impl Iterator<Item = (GridCoordinate, &Tile)> {
        world.store.tiles()
    }

    /// Object stored under the identifier.
    #[must_use]
    pub fn object(world: &World, id: ObjectId) -> Option<&MapObject> {
        world.store.object(id)
    }

    /// First object created with the provided name, by identifier order.
    #[must_use]
    pub fn object_by_name<'a>(world: &'a World, name: &str) -> Option<&'a MapObject> {
        world.store.objects().find(|object| object.name() == name)
    }

    /// Object controlled by the player.
    ///
    /// The player is the object carrying the layout's player name, so an
    /// object placed under that name after removal becomes the player again.
    #[must_use]
    pub fn player(world: &World) -> Option<&MapObject> {
        world
            .player
            .as_deref()
            .and_then(|name| object_by_name(world, name))
    }

    /// Every object in identifier order.
    pub fn objects(world: &World) -> impl Iterator<Item = &MapObject> {
        world.store.objects()
    }

    /// Objects occupying the coordinate in insertion order.
    pub fn objects_at(world: &World, coordinate: GridCoordinate) -> impl Iterator<Item = &MapObject> {
        world.store.objects_at(coordinate)
    }

    /// Objects ordered back to front as of the last recomputation.
    #[must_use]
    pub fn draw_order(world: &World) -> &[ObjectId] {
        world.store.draw_order()
    }

    /// Reports whether an object may move onto the coordinate.
    ///
    /// False iff the tile or any object on it has its collision flag set.
    /// Coordinates outside the map can never be entered.
    #[must_use]
    pub fn can_enter(world: &World, coordinate: GridCoordinate) -> bool {
        let Some(tile) = world.store.tile_at(coordinate) else {
            return false;
        };
        !tile.has_collision()
            && !world
                .store
                .objects_at(coordinate)
                .any(MapObject::has_collision)
    }

    /// Chains fired by touching the coordinate.
    ///
    /// Interaction chains of the occupying objects come first, in insertion
    /// order, followed by the tile's own chain.
    #[must_use]
    pub fn events_at(world: &World, coordinate: GridCoordinate) -> Vec<ChainRef<'_>> {
        let mut chains: Vec<ChainRef<'_>> = world
            .store
            .objects_at(coordinate)
            .filter_map(|object| {
                object.interaction().map(|attached| ChainRef {
                    owner: ChainOwner::Object(object.id()),
                    attached,
                })
            })
            .collect();

        if let Some(attached) = world.store.tile_at(coordinate).and_then(Tile::chain) {
            chains.push(ChainRef {
                owner: ChainOwner::Tile(coordinate),
                attached,
            });
        }
        chains
    }

    /// Autonomous behavior chains of every object, in identifier order.
    #[must_use]
    pub fn behaviors(world: &World) -> Vec<ChainRef<'_>> {
        world
            .store
            .objects()
            .filter_map(|object| {
                object.behavior().map(|attached| ChainRef {
                    owner: ChainOwner::Object(object.id()),
                    attached,
                })
            })
            .collect()
    }

    /// Reports whether the listener identifier was ever attached on this map.
    ///
    /// Identifiers of removed objects stay in use.
    #[must_use]
    pub fn listener_in_use(world: &World, id: ListenerId) -> bool {
        world.store.has_listener(id)
    }
}
