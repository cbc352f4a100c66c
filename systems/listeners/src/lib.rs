#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Event listener state machine and lazy chain instantiation.
//!
//! A [`ListenerChain`] stays inert data until its head descriptor is
//! instantiated into an [`EventListener`]. Instantiation validates the
//! descriptor's parameters and is otherwise free of side effects. A live
//! listener moves through `Ready -> Invoking -> Completed | Failed`; its
//! [`EventListener::invoke`] either finishes synchronously or hands back a
//! [`PendingOperation`] that the caller settles later, after which
//! [`EventListener::complete`] commits deferred effects and produces the
//! next listener of the chain.

mod params;
mod pending;

use thiserror::Error;
use tile_rpg_core::{
    Animation, Command, ExecutionKind, GridCoordinate, ListenerChain, ListenerDescriptor,
    ListenerId, ListenerKind, ObjectId, SceneRequest, TriggerKind,
};
use tile_rpg_world::{query, World};

pub use params::{
    CollisionParams, DialogParams, ObjectMoveParams, PassThroughParams, PlaceParams,
    PlayerMoveParams, PromptParams, RemoveParams, Variant, WaitParams,
};
pub use pending::{PendingOperation, TicketSource};

/// Errors raised while instantiating or running a listener.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The descriptor's parameters do not match the kind's schema.
    #[error("illegal parameters for `{kind}`: {details}")]
    IllegalParameterFormat {
        /// Kind whose schema rejected the parameters.
        kind: ListenerKind,
        /// Description of the mismatch.
        details: String,
    },
    /// The listener refers to an object that does not exist.
    #[error("object {} does not exist", .0.get())]
    UnknownObject(ObjectId),
    /// A placement would reuse the identifier of an existing object.
    #[error("object {} already exists", .0.get())]
    ObjectExists(ObjectId),
    /// A placement would attach a listener id already used on the map.
    #[error("listener id {} is already attached", .0.get())]
    DuplicateListener(ListenerId),
    /// Another chain is already moving the object.
    #[error("object {} is already moving", .0.get())]
    ObjectBusy(ObjectId),
    /// The listener refers to a coordinate outside the map.
    #[error("coordinate {0} lies outside the map")]
    OutOfBounds(GridCoordinate),
    /// A move would enter a blocked coordinate.
    #[error("coordinate {0} is blocked")]
    Blocked(GridCoordinate),
    /// A move expected its object elsewhere.
    #[error("object {} is at {actual}, expected {expected}", .object.get())]
    DepartureMismatch {
        /// Object being moved.
        object: ObjectId,
        /// Departure recorded in the parameters.
        expected: GridCoordinate,
        /// Coordinate recorded in the map.
        actual: GridCoordinate,
    },
    /// A player move ran on a map without a player object.
    #[error("the map has no player object")]
    NoPlayer,
    /// The listener was driven out of order.
    #[error("listener in state {state:?} cannot {operation}")]
    InvalidState {
        /// State the listener was in.
        state: ListenerState,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Execution-scoped identity a listener inherits from the chain it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Activation {
    /// Identity of the logical event.
    pub id: ListenerId,
    /// Object the chain belongs to, if any.
    pub owner: Option<ObjectId>,
    /// Whether the chain retires or rearms after running.
    pub execution: ExecutionKind,
}

/// Lifecycle state of an instantiated listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Parameters validated; waiting to be invoked.
    Ready,
    /// Invoked and waiting for completion.
    Invoking,
    /// Completed and advanced.
    Completed,
    /// Invocation failed.
    Failed,
    /// Rolled back while invoking.
    RolledBack,
}

/// Result of invoking a listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    /// The effect finished; the listener may complete immediately.
    Completed,
    /// The effect continues until the pending operation settles.
    Pending(PendingOperation),
}

/// Read access to the map plus the sinks a listener writes its effects to.
#[derive(Debug)]
pub struct ListenerContext<'a> {
    /// Map the listener inspects.
    pub world: &'a World,
    /// Source of animation tickets.
    pub tickets: &'a mut TicketSource,
    /// Map mutations to apply once the call returns.
    pub commands: &'a mut Vec<Command>,
    /// Presentation work for the adapter.
    pub scene: &'a mut Vec<SceneRequest>,
}

/// Relocation started by a move listener and committed on completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Relocation {
    object: ObjectId,
    departure: GridCoordinate,
    destination: GridCoordinate,
}

/// Live, stateful listener instantiated from a chain's head descriptor.
#[derive(Clone, Debug)]
pub struct EventListener {
    activation: Activation,
    trigger: TriggerKind,
    variant: Variant,
    remaining: ListenerChain,
    state: ListenerState,
    relocation: Option<Relocation>,
}

/// Validates `descriptor` and builds a listener whose remaining chain is `remaining`.
pub fn instantiate(
    descriptor: &ListenerDescriptor,
    remaining: ListenerChain,
    activation: Activation,
) -> Result<EventListener, ListenerError> {
    let (variant, trigger) = params::parse(descriptor)?;
    Ok(EventListener {
        activation,
        trigger,
        variant,
        remaining,
        state: ListenerState::Ready,
        relocation: None,
    })
}

/// Instantiates the head of `chain`; the listener keeps the chain minus its head.
///
/// Returns `Ok(None)` for an empty chain.
pub fn instantiate_head(
    chain: ListenerChain,
    activation: Activation,
) -> Result<Option<EventListener>, ListenerError> {
    match chain.split_head() {
        Some((head, remaining)) => instantiate(&head, remaining, activation).map(Some),
        None => Ok(None),
    }
}

impl EventListener {
    /// Identity of the logical event the listener belongs to.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.activation.id
    }

    /// Execution-scoped identity inherited from the chain.
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Object owning the chain, if any.
    #[must_use]
    pub const fn owner(&self) -> Option<ObjectId> {
        self.activation.owner
    }

    /// Trigger that makes the listener run.
    #[must_use]
    pub const fn trigger(&self) -> TriggerKind {
        self.trigger
    }

    /// Whether the chain retires or rearms after running.
    #[must_use]
    pub const fn execution(&self) -> ExecutionKind {
        self.activation.execution
    }

    /// Kind tag of the listener.
    #[must_use]
    pub const fn kind(&self) -> ListenerKind {
        self.variant.kind()
    }

    /// Validated behavior and parameters.
    #[must_use]
    pub const fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Descriptors that follow this listener.
    #[must_use]
    pub const fn remaining(&self) -> &ListenerChain {
        &self.remaining
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    /// Object the listener relocates when invoked, if it is a move.
    #[must_use]
    pub fn moved_object(&self, world: &World) -> Option<ObjectId> {
        match &self.variant {
            Variant::MovePlayer(_) => query::player(world).map(|player| player.id()),
            Variant::MoveObject(params) => Some(params.object),
            _ => None,
        }
    }

    /// Reports whether the listener is invoking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ListenerState::Invoking
    }

    /// Performs the listener's effect.
    ///
    /// On error the listener enters [`ListenerState::Failed`] and nothing was
    /// written to the context.
    pub fn invoke(&mut self, context: &mut ListenerContext<'_>) -> Result<Invocation, ListenerError> {
        self.expect_state(ListenerState::Ready, "invoke")?;

        match self.run(context) {
            Ok(invocation) => {
                self.state = ListenerState::Invoking;
                Ok(invocation)
            }
            Err(error) => {
                self.state = ListenerState::Failed;
                Err(error)
            }
        }
    }

    /// Commits deferred effects and instantiates the next listener of the chain.
    ///
    /// Returns `Ok(None)` when the chain ends. A validation failure of the
    /// next descriptor is returned as an error after this listener completed.
    pub fn complete(
        mut self,
        context: &mut ListenerContext<'_>,
    ) -> Result<Option<EventListener>, ListenerError> {
        self.expect_state(ListenerState::Invoking, "complete")?;

        if let Some(relocation) = self.relocation.take() {
            context.commands.push(Command::UpdatePlacement {
                object: relocation.object,
                destination: relocation.destination,
            });
        }
        self.state = ListenerState::Completed;

        let activation = self.activation;
        let next = match self.variant {
            Variant::ButtonPrompt(_) => self.remaining.prepend(ListenerDescriptor::new(
                ListenerKind::PassThrough,
                serde_json::json!({ "trigger": "action", "dismiss_prompt": true }),
            )),
            Variant::ShowDialog(_) => {
                let hides_next = self
                    .remaining
                    .head()
                    .is_some_and(|head| head.kind() == ListenerKind::HideDialog);
                if hides_next {
                    self.remaining
                } else {
                    self.remaining.prepend(ListenerDescriptor::new(
                        ListenerKind::HideDialog,
                        serde_json::json!({ "trigger": "action" }),
                    ))
                }
            }
            _ => self.remaining,
        };

        instantiate_head(next, activation)
    }

    /// Undoes the visible effect of an invoking listener.
    ///
    /// Returns `false` when the listener is not invoking or its kind has no
    /// rollback. Placement is never committed before completion, so rolling
    /// back a move only restores the presentation.
    pub fn rollback(&mut self, context: &mut ListenerContext<'_>) -> bool {
        if self.state != ListenerState::Invoking {
            return false;
        }

        let request = match &self.variant {
            Variant::ButtonPrompt(_) => Some(SceneRequest::HideButton),
            Variant::ShowDialog(_) => Some(SceneRequest::HideDialog),
            Variant::MovePlayer(_) | Variant::MoveObject(_) => {
                self.relocation.take().map(|relocation| SceneRequest::RestorePlacement {
                    object: relocation.object,
                    at: relocation.departure,
                })
            }
            _ => None,
        };

        match request {
            Some(request) => {
                context.scene.push(request);
                self.state = ListenerState::RolledBack;
                true
            }
            None => false,
        }
    }

    fn expect_state(
        &self,
        expected: ListenerState,
        operation: &'static str,
    ) -> Result<(), ListenerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ListenerError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    fn run(&mut self, context: &mut ListenerContext<'_>) -> Result<Invocation, ListenerError> {
        match &self.variant {
            Variant::ButtonPrompt(params) => {
                context.scene.push(SceneRequest::ShowButton {
                    title: params.text.clone(),
                });
                Ok(Invocation::Completed)
            }
            Variant::ShowDialog(params) => {
                context.scene.push(SceneRequest::ShowDialog {
                    text: params.text.clone(),
                });
                Ok(Invocation::Completed)
            }
            Variant::HideDialog => {
                context.scene.push(SceneRequest::HideDialog);
                Ok(Invocation::Completed)
            }
            Variant::PassThrough(params) => {
                if params.dismiss_prompt {
                    context.scene.push(SceneRequest::HideButton);
                }
                Ok(Invocation::Completed)
            }
            Variant::Wait(params) => {
                if params.ticks == 0 {
                    Ok(Invocation::Completed)
                } else {
                    Ok(Invocation::Pending(PendingOperation::ticks(params.ticks)))
                }
            }
            Variant::SetCollision(params) => {
                if !query::contains(context.world, params.coordinate) {
                    return Err(ListenerError::OutOfBounds(params.coordinate));
                }
                context.commands.push(Command::SetCollision {
                    coordinate: params.coordinate,
                    enabled: params.enabled,
                });
                Ok(Invocation::Completed)
            }
            Variant::RemoveObject(params) => {
                if query::object(context.world, params.object).is_none() {
                    return Err(ListenerError::UnknownObject(params.object));
                }
                context.commands.push(Command::RemoveObject {
                    object: params.object,
                });
                Ok(Invocation::Completed)
            }
            Variant::PlaceObject(params) => {
                if query::object(context.world, params.object).is_some() {
                    return Err(ListenerError::ObjectExists(params.object));
                }
                if !query::contains(context.world, params.coordinate) {
                    return Err(ListenerError::OutOfBounds(params.coordinate));
                }
                let mut attached = Vec::new();
                for id in params.listener_ids() {
                    if query::listener_in_use(context.world, id) || attached.contains(&id) {
                        return Err(ListenerError::DuplicateListener(id));
                    }
                    attached.push(id);
                }
                context.commands.push(Command::PlaceObject {
                    blueprint: params.blueprint(),
                    coordinate: params.coordinate,
                });
                Ok(Invocation::Completed)
            }
            Variant::MovePlayer(params) => {
                let player = query::player(context.world).ok_or(ListenerError::NoPlayer)?;
                let relocation = plan_relocation(context.world, player.id(), None, &params.path)?;
                let animation = animation_for(ListenerKind::MovePlayer, &params.path)?;

                context.scene.push(SceneRequest::HideDialog);
                context.scene.push(SceneRequest::HideButton);
                let mut tickets = vec![context.tickets.issue()];
                context.scene.push(SceneRequest::Animate {
                    ticket: tickets[0],
                    object: relocation.object,
                    animation: animation.clone(),
                });
                if params.scroll {
                    let ticket = context.tickets.issue();
                    tickets.push(ticket);
                    context
                        .scene
                        .push(SceneRequest::ScrollView { ticket, animation });
                }

                self.relocation = Some(relocation);
                Ok(Invocation::Pending(PendingOperation::join(tickets)))
            }
            Variant::MoveObject(params) => {
                let relocation =
                    plan_relocation(context.world, params.object, params.departure, &params.path)?;
                let animation = animation_for(ListenerKind::MoveObject, &params.path)?;

                let ticket = context.tickets.issue();
                context.scene.push(SceneRequest::Animate {
                    ticket,
                    object: relocation.object,
                    animation,
                });

                self.relocation = Some(relocation);
                Ok(Invocation::Pending(PendingOperation::join([ticket])))
            }
        }
    }
}

fn plan_relocation(
    world: &World,
    object: ObjectId,
    expected_departure: Option<GridCoordinate>,
    path: &[GridCoordinate],
) -> Result<Relocation, ListenerError> {
    let departure = query::object(world, object)
        .map(|found| found.coordinate())
        .ok_or(ListenerError::UnknownObject(object))?;

    if let Some(expected) = expected_departure {
        if expected != departure {
            return Err(ListenerError::DepartureMismatch {
                object,
                expected,
                actual: departure,
            });
        }
    }

    for waypoint in path {
        if !query::contains(world, *waypoint) {
            return Err(ListenerError::OutOfBounds(*waypoint));
        }
        if *waypoint != departure && !query::can_enter(world, *waypoint) {
            return Err(ListenerError::Blocked(*waypoint));
        }
    }

    let destination = path.last().copied().unwrap_or(departure);
    Ok(Relocation {
        object,
        departure,
        destination,
    })
}

fn animation_for(kind: ListenerKind, path: &[GridCoordinate]) -> Result<Animation, ListenerError> {
    Animation::along(path.to_vec()).ok_or_else(|| ListenerError::IllegalParameterFormat {
        kind,
        details: "movement path is empty".to_owned(),
    })
}
