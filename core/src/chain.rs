//! Listener descriptors and the chains they form.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ListenerId;

/// Describes how a listener becomes eligible to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fires as soon as the listener is instantiated.
    #[default]
    Immediate,
    /// Fires when the player touches the coordinate the chain is attached to.
    Touch,
    /// Fires when the player confirms the action button.
    Action,
    /// Fires on the next simulation tick.
    Tick,
}

/// Describes whether a listener retires after running or rearms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// The listener id is retired after the first invocation.
    #[default]
    Once,
    /// The listener id becomes eligible again once its chain completes.
    Repeatable,
}

/// Tag naming the listener variant a descriptor instantiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    /// Shows the action button and waits for the player to press it.
    ButtonPrompt,
    /// Shows the event dialog.
    ShowDialog,
    /// Hides the event dialog.
    HideDialog,
    /// Moves the player object.
    MovePlayer,
    /// Moves an arbitrary object.
    MoveObject,
    /// Advances to the next descriptor without an effect of its own.
    PassThrough,
    /// Waits for a number of simulation ticks.
    Wait,
    /// Sets or clears a tile's collision flag.
    SetCollision,
    /// Deletes an object from the map.
    RemoveObject,
    /// Creates an object on the map.
    PlaceObject,
}

impl ListenerKind {
    /// Stable name of the kind, matching its serialized tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ButtonPrompt => "button_prompt",
            Self::ShowDialog => "show_dialog",
            Self::HideDialog => "hide_dialog",
            Self::MovePlayer => "move_player",
            Self::MoveObject => "move_object",
            Self::PassThrough => "pass_through",
            Self::Wait => "wait",
            Self::SetCollision => "set_collision",
            Self::RemoveObject => "remove_object",
            Self::PlaceObject => "place_object",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated listener kind and parameter bundle awaiting instantiation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListenerDescriptor {
    kind: ListenerKind,
    #[serde(default)]
    params: Value,
}

impl ListenerDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(kind: ListenerKind, params: Value) -> Self {
        Self { kind, params }
    }

    /// Kind of listener the descriptor instantiates.
    #[must_use]
    pub const fn kind(&self) -> ListenerKind {
        self.kind
    }

    /// Parameter bundle validated during instantiation.
    #[must_use]
    pub const fn params(&self) -> &Value {
        &self.params
    }
}

/// Ordered sequence of descriptors; order is execution order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerChain {
    descriptors: Vec<ListenerDescriptor>,
}

impl ListenerChain {
    /// Creates a chain from descriptors in execution order.
    #[must_use]
    pub fn new(descriptors: Vec<ListenerDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Descriptor executed first, if any.
    #[must_use]
    pub fn head(&self) -> Option<&ListenerDescriptor> {
        self.descriptors.first()
    }

    /// Separates the head descriptor from the remaining chain.
    #[must_use]
    pub fn split_head(mut self) -> Option<(ListenerDescriptor, ListenerChain)> {
        if self.descriptors.is_empty() {
            return None;
        }
        let head = self.descriptors.remove(0);
        Some((head, self))
    }

    /// Returns a chain that runs `descriptor` before the current descriptors.
    #[must_use]
    pub fn prepend(mut self, descriptor: ListenerDescriptor) -> Self {
        self.descriptors.insert(0, descriptor);
        self
    }

    /// Number of descriptors in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Reports whether the chain holds no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterator over the descriptors in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &ListenerDescriptor> {
        self.descriptors.iter()
    }
}

impl FromIterator<ListenerDescriptor> for ListenerChain {
    fn from_iter<I: IntoIterator<Item = ListenerDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Chain attached to a tile or object together with its activation policy.
///
/// Serialized with the descriptors under `listeners`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachedChain {
    id: ListenerId,
    trigger: TriggerKind,
    #[serde(default)]
    execution: ExecutionKind,
    #[serde(default, rename = "listeners")]
    chain: ListenerChain,
}

impl AttachedChain {
    /// Creates a new attachment.
    #[must_use]
    pub fn new(
        id: ListenerId,
        trigger: TriggerKind,
        execution: ExecutionKind,
        chain: ListenerChain,
    ) -> Self {
        Self {
            id,
            trigger,
            execution,
            chain,
        }
    }

    /// Identity shared by every listener instantiated from the chain.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Trigger that activates the chain's head.
    #[must_use]
    pub const fn trigger(&self) -> TriggerKind {
        self.trigger
    }

    /// Whether the chain retires or rearms after running.
    #[must_use]
    pub const fn execution(&self) -> ExecutionKind {
        self.execution
    }

    /// Descriptors executed when the chain activates.
    #[must_use]
    pub const fn chain(&self) -> &ListenerChain {
        &self.chain
    }
}
