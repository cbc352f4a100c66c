//! Cyclic-execution guard owned by the coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tile_rpg_core::{ExecutionKind, ListenerId, ObjectId};
use tile_rpg_system_listeners::Activation;

/// Reason a chain was not started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unavailable {
    /// Every listener is disabled until the coordinator resumes.
    Suspended,
    /// The chain is running or was retired after running once.
    Guarded,
    /// Another chain owned by the same object is running.
    OwnerBusy(ObjectId),
    /// Another chain is relocating the object.
    Moving(ObjectId),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => f.write_str("listeners are suspended"),
            Self::Guarded => f.write_str("chain is guarded"),
            Self::OwnerBusy(object) => write!(f, "object {} is busy", object.get()),
            Self::Moving(object) => write!(f, "object {} is already moving", object.get()),
        }
    }
}

/// Registry of listener identifiers that are currently ineligible to run.
///
/// An identifier is guarded from the moment its chain starts. Repeatable
/// chains are released when they end; once chains stay retired. Chains owned
/// by the same object are serialized: while one runs, the object is busy.
/// An object being relocated is locked to the moving chain until the move
/// completes, wherever that chain is attached.
#[derive(Clone, Debug, Default)]
pub struct GuardRegistry {
    guarded: BTreeSet<ListenerId>,
    busy: BTreeMap<ObjectId, ListenerId>,
    moving: BTreeMap<ObjectId, ListenerId>,
    cancelled: Vec<Activation>,
    suspended: bool,
}

impl GuardRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether the identifier is running or retired.
    #[must_use]
    pub fn is_guarded(&self, id: ListenerId) -> bool {
        self.guarded.contains(&id)
    }

    /// Reports whether a chain owned by the object is running.
    #[must_use]
    pub fn is_busy(&self, object: ObjectId) -> bool {
        self.busy.contains_key(&object)
    }

    /// Reports whether a chain is relocating the object.
    #[must_use]
    pub fn is_moving(&self, object: ObjectId) -> bool {
        self.moving.contains_key(&object)
    }

    /// Reports whether every listener is disabled.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of identifiers currently guarded.
    #[must_use]
    pub fn guarded_count(&self) -> usize {
        self.guarded.len()
    }

    pub(crate) fn check(&self, activation: &Activation) -> Result<(), Unavailable> {
        if self.suspended {
            return Err(Unavailable::Suspended);
        }
        if self.guarded.contains(&activation.id) {
            return Err(Unavailable::Guarded);
        }
        match activation.owner {
            Some(owner) if self.busy.contains_key(&owner) => Err(Unavailable::OwnerBusy(owner)),
            _ => Ok(()),
        }
    }

    /// Guards the chain before its first listener is invoked.
    pub(crate) fn mark(&mut self, activation: &Activation) {
        let _ = self.guarded.insert(activation.id);
        if let Some(owner) = activation.owner {
            let _ = self.busy.insert(owner, activation.id);
        }
    }

    /// Locks `object` to the chain before a move is invoked.
    pub(crate) fn claim_target(
        &mut self,
        object: ObjectId,
        id: ListenerId,
    ) -> Result<(), Unavailable> {
        match self.moving.get(&object) {
            Some(holder) if *holder != id => Err(Unavailable::Moving(object)),
            _ => {
                let _ = self.moving.insert(object, id);
                Ok(())
            }
        }
    }

    /// Unlocks every object the chain is moving.
    pub(crate) fn release_targets(&mut self, id: ListenerId) {
        self.moving.retain(|_, holder| *holder != id);
    }

    /// Releases a chain that ended; once identifiers stay retired.
    pub(crate) fn release(&mut self, activation: &Activation) {
        self.release_targets(activation.id);
        if let Some(owner) = activation.owner {
            if self.busy.get(&owner) == Some(&activation.id) {
                let _ = self.busy.remove(&owner);
            }
        }
        if activation.execution == ExecutionKind::Repeatable {
            let _ = self.guarded.remove(&activation.id);
        }
    }

    /// Releases an abandoned chain, deferring the release while suspended.
    ///
    /// Move targets are unlocked at once since the move can no longer commit.
    pub(crate) fn cancel(&mut self, activation: Activation) {
        self.release_targets(activation.id);
        if self.suspended {
            self.cancelled.push(activation);
        } else {
            self.release(&activation);
        }
    }

    pub(crate) fn suspend(&mut self) {
        self.suspended = true;
    }

    pub(crate) fn resume(&mut self) {
        self.suspended = false;
        for activation in std::mem::take(&mut self.cancelled) {
            self.release(&activation);
        }
    }
}
