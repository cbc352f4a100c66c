//! Per-kind parameter schemas.
//!
//! Every listener kind owns a `serde` struct describing its parameter bundle.
//! Required fields are plain fields, optional ones carry defaults; additional
//! properties are ignored.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tile_rpg_core::{
    AttachedChain, GridCoordinate, ListenerDescriptor, ListenerId, ListenerKind, ObjectBlueprint,
    ObjectId, TriggerKind,
};

use crate::ListenerError;

/// Validated behavior of a listener together with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    /// Shows the action button; pressing it advances the chain.
    ButtonPrompt(PromptParams),
    /// Shows the event dialog.
    ShowDialog(DialogParams),
    /// Hides the event dialog.
    HideDialog,
    /// Moves the player object.
    MovePlayer(PlayerMoveParams),
    /// Moves an arbitrary object.
    MoveObject(ObjectMoveParams),
    /// Advances without an observable effect, optionally dismissing the prompt.
    PassThrough(PassThroughParams),
    /// Completes after a number of ticks.
    Wait(WaitParams),
    /// Sets or clears a tile's collision flag.
    SetCollision(CollisionParams),
    /// Deletes an object.
    RemoveObject(RemoveParams),
    /// Creates an object.
    PlaceObject(PlaceParams),
}

impl Variant {
    /// Kind tag the variant was instantiated from.
    #[must_use]
    pub const fn kind(&self) -> ListenerKind {
        match self {
            Self::ButtonPrompt(_) => ListenerKind::ButtonPrompt,
            Self::ShowDialog(_) => ListenerKind::ShowDialog,
            Self::HideDialog => ListenerKind::HideDialog,
            Self::MovePlayer(_) => ListenerKind::MovePlayer,
            Self::MoveObject(_) => ListenerKind::MoveObject,
            Self::PassThrough(_) => ListenerKind::PassThrough,
            Self::Wait(_) => ListenerKind::Wait,
            Self::SetCollision(_) => ListenerKind::SetCollision,
            Self::RemoveObject(_) => ListenerKind::RemoveObject,
            Self::PlaceObject(_) => ListenerKind::PlaceObject,
        }
    }
}

/// Parameters of a button prompt.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PromptParams {
    /// Title shown on the action button.
    pub text: String,
}

/// Parameters of a dialog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DialogParams {
    /// Text shown inside the dialog.
    pub text: String,
}

/// Parameters of a player move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerMoveParams {
    /// Waypoints ending at the destination.
    pub path: Vec<GridCoordinate>,
    /// Whether the background scrolls along with the player.
    pub scroll: bool,
}

/// Parameters of an object move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMoveParams {
    /// Object to move.
    pub object: ObjectId,
    /// Tile the object is expected to occupy when the move starts.
    pub departure: Option<GridCoordinate>,
    /// Waypoints ending at the destination.
    pub path: Vec<GridCoordinate>,
}

/// Parameters of a pass-through step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PassThroughParams {
    /// Hides the action button when the step runs.
    #[serde(default)]
    pub dismiss_prompt: bool,
}

/// Parameters of a wait.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WaitParams {
    /// Number of ticks to wait.
    pub ticks: u32,
}

/// Parameters of a collision change.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CollisionParams {
    /// Tile whose flag changes.
    pub coordinate: GridCoordinate,
    /// New value of the flag.
    pub enabled: bool,
}

/// Parameters of an object removal.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoveParams {
    /// Object to delete.
    pub object: ObjectId,
}

/// Parameters of an object placement.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlaceParams {
    /// Identifier of the new object.
    pub object: ObjectId,
    /// Name of the new object.
    pub name: String,
    /// Tile the object is placed on.
    pub coordinate: GridCoordinate,
    /// Whether the object blocks movement.
    #[serde(default)]
    pub collision: bool,
    /// Chain fired when the player interacts with the object.
    #[serde(default)]
    pub interaction: Option<AttachedChain>,
    /// Autonomous chain driven by simulation ticks.
    #[serde(default)]
    pub behavior: Option<AttachedChain>,
}

impl PlaceParams {
    /// Listener ids the new object attaches.
    pub fn listener_ids(&self) -> impl Iterator<Item = ListenerId> + '_ {
        [&self.interaction, &self.behavior]
            .into_iter()
            .flatten()
            .map(AttachedChain::id)
    }

    /// Blueprint describing the object to create.
    #[must_use]
    pub fn blueprint(&self) -> ObjectBlueprint {
        ObjectBlueprint {
            id: self.object,
            name: self.name.clone(),
            collision: self.collision,
            interaction: self.interaction.clone(),
            behavior: self.behavior.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CommonParams {
    #[serde(default)]
    trigger: TriggerKind,
}

#[derive(Deserialize)]
struct RawPlayerMove {
    destination: Option<GridCoordinate>,
    #[serde(default)]
    path: Vec<GridCoordinate>,
    #[serde(default)]
    scroll: bool,
}

#[derive(Deserialize)]
struct RawObjectMove {
    object: ObjectId,
    departure: Option<GridCoordinate>,
    destination: Option<GridCoordinate>,
    #[serde(default)]
    path: Vec<GridCoordinate>,
}

/// Validates a descriptor's parameters, yielding its variant and step trigger.
pub(crate) fn parse(
    descriptor: &ListenerDescriptor,
) -> Result<(Variant, TriggerKind), ListenerError> {
    let kind = descriptor.kind();
    let params = normalized(kind, descriptor.params())?;

    let common: CommonParams = decode(kind, &params)?;
    if common.trigger == TriggerKind::Touch {
        return Err(illegal(
            kind,
            "touch triggers are only valid on attached chains",
        ));
    }

    let variant = match kind {
        ListenerKind::ButtonPrompt => Variant::ButtonPrompt(decode(kind, &params)?),
        ListenerKind::ShowDialog => Variant::ShowDialog(decode(kind, &params)?),
        ListenerKind::HideDialog => Variant::HideDialog,
        ListenerKind::MovePlayer => {
            let raw: RawPlayerMove = decode(kind, &params)?;
            Variant::MovePlayer(PlayerMoveParams {
                path: resolve_path(kind, raw.destination, raw.path)?,
                scroll: raw.scroll,
            })
        }
        ListenerKind::MoveObject => {
            let raw: RawObjectMove = decode(kind, &params)?;
            Variant::MoveObject(ObjectMoveParams {
                object: raw.object,
                departure: raw.departure,
                path: resolve_path(kind, raw.destination, raw.path)?,
            })
        }
        ListenerKind::PassThrough => Variant::PassThrough(decode(kind, &params)?),
        ListenerKind::Wait => Variant::Wait(decode(kind, &params)?),
        ListenerKind::SetCollision => Variant::SetCollision(decode(kind, &params)?),
        ListenerKind::RemoveObject => Variant::RemoveObject(decode(kind, &params)?),
        ListenerKind::PlaceObject => Variant::PlaceObject(decode(kind, &params)?),
    };

    Ok((variant, common.trigger))
}

fn normalized(kind: ListenerKind, params: &Value) -> Result<Value, ListenerError> {
    match params {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(params.clone()),
        other => Err(illegal(
            kind,
            format!("parameters must be an object, found {other}"),
        )),
    }
}

fn decode<T: DeserializeOwned>(kind: ListenerKind, params: &Value) -> Result<T, ListenerError> {
    T::deserialize(params).map_err(|error| illegal(kind, error.to_string()))
}

fn resolve_path(
    kind: ListenerKind,
    destination: Option<GridCoordinate>,
    path: Vec<GridCoordinate>,
) -> Result<Vec<GridCoordinate>, ListenerError> {
    match (destination, path.last().copied()) {
        (None, None) => Err(illegal(kind, "missing field `destination`")),
        (Some(destination), None) => Ok(vec![destination]),
        (None, Some(_)) => Ok(path),
        (Some(destination), Some(last)) if destination == last => Ok(path),
        (Some(destination), Some(last)) => Err(illegal(
            kind,
            format!("path ends at {last} but destination is {destination}"),
        )),
    }
}

fn illegal(kind: ListenerKind, details: impl Into<String>) -> ListenerError {
    ListenerError::IllegalParameterFormat {
        kind,
        details: details.into(),
    }
}
