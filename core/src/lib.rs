#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tile RPG engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative map, and the listener systems. Listener systems submit
//! [`Command`] values describing desired map mutations, the world executes
//! those commands via its `apply` entry point and broadcasts [`Event`] values,
//! while presentation work is requested through [`SceneRequest`] values that
//! the presentation adapter acknowledges asynchronously.

mod chain;
mod coordinates;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chain::{
    AttachedChain, ExecutionKind, ListenerChain, ListenerDescriptor, ListenerKind, TriggerKind,
};
pub use coordinates::{MetricsError, TileMetrics};
pub use glam::Vec2;

/// Location of a single map tile expressed as column and row indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate {
    column: u32,
    row: u32,
}

impl GridCoordinate {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

impl std::fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Unique identifier assigned to a map object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Creates a new object identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identity of a logical event: one attached chain and every listener instantiated from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Creates a new listener identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Handle identifying one presentation-side animation awaiting acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationTicket(u64);

impl AnimationTicket {
    /// Creates a new ticket with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the ticket.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Tile-set entry used to draw a tile's terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerrainKind(u32);

impl TerrainKind {
    /// Creates a terrain kind from a tile-set index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Tile-set index of the terrain.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Complete description of an object that can be placed onto the map.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectBlueprint {
    /// Identifier the object will be stored under.
    pub id: ObjectId,
    /// Human readable name used for lookups such as the player object.
    pub name: String,
    /// Indicates whether the object blocks movement onto its tile.
    pub collision: bool,
    /// Chain fired when the player interacts with the object.
    pub interaction: Option<AttachedChain>,
    /// Autonomous chain driven by simulation ticks.
    pub behavior: Option<AttachedChain>,
}

impl ObjectBlueprint {
    /// Creates a blueprint without any attached chains.
    #[must_use]
    pub fn new(id: ObjectId, name: impl Into<String>, collision: bool) -> Self {
        Self {
            id,
            name: name.into(),
            collision,
            interaction: None,
            behavior: None,
        }
    }

    /// Attaches the interaction chain to the blueprint.
    #[must_use]
    pub fn with_interaction(mut self, chain: AttachedChain) -> Self {
        self.interaction = Some(chain);
        self
    }

    /// Attaches the autonomous behavior chain to the blueprint.
    #[must_use]
    pub fn with_behavior(mut self, chain: AttachedChain) -> Self {
        self.behavior = Some(chain);
        self
    }
}

/// Commands that express all permissible map mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Sets or clears the collision flag of a tile.
    SetCollision {
        /// Tile whose collision flag changes.
        coordinate: GridCoordinate,
        /// New value of the collision flag.
        enabled: bool,
    },
    /// Places a new object onto the map.
    PlaceObject {
        /// Description of the object to create.
        blueprint: ObjectBlueprint,
        /// Tile the object initially occupies.
        coordinate: GridCoordinate,
    },
    /// Deletes an object from the map.
    RemoveObject {
        /// Identifier of the object to delete.
        object: ObjectId,
    },
    /// Relocates an object after its movement animation completed.
    UpdatePlacement {
        /// Identifier of the object to relocate.
        object: ObjectId,
        /// Tile the object occupies after the move.
        destination: GridCoordinate,
    },
    /// Advances the simulation clock and settles per-tick bookkeeping.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a tile's collision flag changed.
    CollisionChanged {
        /// Tile whose flag changed.
        coordinate: GridCoordinate,
        /// Value of the flag after the change.
        enabled: bool,
    },
    /// Confirms that an object was placed onto the map.
    ObjectPlaced {
        /// Identifier of the placed object.
        object: ObjectId,
        /// Tile occupied by the object.
        coordinate: GridCoordinate,
    },
    /// Confirms that an object was deleted.
    ObjectRemoved {
        /// Identifier of the deleted object.
        object: ObjectId,
        /// Tile the object occupied before removal.
        coordinate: GridCoordinate,
    },
    /// Confirms that an object moved between two tiles.
    ObjectMoved {
        /// Identifier of the object that moved.
        object: ObjectId,
        /// Tile occupied before the move.
        from: GridCoordinate,
        /// Tile occupied after the move.
        to: GridCoordinate,
    },
    /// Announces the draw order of every object after it was recomputed.
    ZOrderRecomputed {
        /// Objects ordered back to front.
        order: Vec<ObjectId>,
    },
    /// Reports that a mutation was rejected without touching the map.
    PlacementRejected {
        /// Specific reason the mutation failed.
        reason: PlacementError,
    },
}

/// Reasons a placement mutation may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PlacementError {
    /// No object with the provided identifier exists.
    #[error("object {} does not exist", .0.get())]
    ObjectNotFound(ObjectId),
    /// The coordinate lies outside the map bounds.
    #[error("coordinate {0} lies outside the map")]
    OutOfBounds(GridCoordinate),
    /// An object with the provided identifier already exists.
    #[error("object {} already exists", .0.get())]
    DuplicateObject(ObjectId),
    /// A listener identifier is already attached somewhere on the map.
    #[error("listener id {} is already attached", .0.get())]
    DuplicateListener(ListenerId),
}

/// Relocation the presentation layer should animate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    path: Vec<GridCoordinate>,
}

impl Animation {
    /// Creates an animation that walks the provided waypoints in order.
    ///
    /// Returns `None` when the path is empty.
    #[must_use]
    pub fn along(path: Vec<GridCoordinate>) -> Option<Self> {
        if path.is_empty() {
            None
        } else {
            Some(Self { path })
        }
    }

    /// Waypoints visited by the animation, ending at the destination.
    #[must_use]
    pub fn path(&self) -> &[GridCoordinate] {
        &self.path
    }

    /// Final tile reached by the animation.
    #[must_use]
    pub fn destination(&self) -> GridCoordinate {
        self.path[self.path.len() - 1]
    }
}

/// Presentation work requested by listeners.
///
/// Requests carrying an [`AnimationTicket`] stay pending until the adapter
/// acknowledges the ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneRequest {
    /// Displays the event dialog with the provided text.
    ShowDialog {
        /// Text shown inside the dialog.
        text: String,
    },
    /// Hides the event dialog.
    HideDialog,
    /// Displays the action button with the provided title.
    ShowButton {
        /// Title rendered on the button.
        title: String,
    },
    /// Hides the action button.
    HideButton,
    /// Animates an object along a path.
    Animate {
        /// Ticket the adapter acknowledges once the animation finished.
        ticket: AnimationTicket,
        /// Object being animated.
        object: ObjectId,
        /// Relocation to animate.
        animation: Animation,
    },
    /// Scrolls the background so the view follows a moving object.
    ScrollView {
        /// Ticket the adapter acknowledges once the scroll finished.
        ticket: AnimationTicket,
        /// Relocation the view follows.
        animation: Animation,
    },
    /// Snaps an object back to the tile it occupies in the map.
    RestorePlacement {
        /// Object to restore.
        object: ObjectId,
        /// Tile recorded for the object in the map.
        at: GridCoordinate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_coordinate_survives_bincode() {
        let coordinate = GridCoordinate::new(5, 7);
        let bytes = bincode::serialize(&coordinate).expect("serialize");
        let restored: GridCoordinate = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, coordinate);
    }

    #[test]
    fn animation_requires_waypoints() {
        assert!(Animation::along(Vec::new()).is_none());
        let animation = Animation::along(vec![GridCoordinate::new(1, 0), GridCoordinate::new(2, 0)])
            .expect("non-empty path");
        assert_eq!(animation.destination(), GridCoordinate::new(2, 0));
    }

    #[test]
    fn placement_error_messages_name_the_subject() {
        assert_eq!(
            PlacementError::ObjectNotFound(ObjectId::new(4)).to_string(),
            "object 4 does not exist"
        );
        assert_eq!(
            PlacementError::OutOfBounds(GridCoordinate::new(9, 2)).to_string(),
            "coordinate (9, 2) lies outside the map"
        );
    }
}
