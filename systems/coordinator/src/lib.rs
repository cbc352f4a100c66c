#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Event coordinator that sequences listener chains over the world.
//!
//! The coordinator reacts to [`Trigger`]s delivered by the presentation
//! adapter. It looks up candidate chains through the world queries, guards
//! them before their first listener runs, drives every listener through its
//! invocation and completion, and applies the commands listeners emit to the
//! world. Asynchronous work is tracked through animation tickets that the
//! adapter acknowledges; each in-flight chain waits on exactly one listener.

mod guard;

use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info, warn};
use tile_rpg_core::{
    AnimationTicket, AttachedChain, Command, Event, GridCoordinate, ListenerChain, ListenerId,
    ListenerKind, ObjectId, SceneRequest, TriggerKind,
};
use tile_rpg_system_listeners::{
    instantiate_head, Activation, EventListener, Invocation, ListenerContext, ListenerError,
    PendingOperation, TicketSource,
};
use tile_rpg_world::{apply, query, World};

pub use guard::{GuardRegistry, Unavailable};

/// Input delivered to the coordinator by the presentation adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The player touched a coordinate.
    Touch(GridCoordinate),
    /// The player confirmed the action button.
    Action,
    /// One simulation tick elapsed.
    Tick(Duration),
    /// The adapter finished the animation issued under the ticket.
    AnimationComplete(AnimationTicket),
}

/// Notable transitions of chain execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    /// A listener of the chain was invoked.
    Invoked {
        /// Chain the listener belongs to.
        id: ListenerId,
        /// Kind of the invoked listener.
        kind: ListenerKind,
    },
    /// The chain ran its last listener.
    Finished {
        /// Chain that ended.
        id: ListenerId,
    },
    /// The chain aborted because a listener failed.
    Failed {
        /// Chain that aborted.
        id: ListenerId,
        /// Failure raised by the listener.
        error: ListenerError,
    },
    /// The invoking listener of the chain was rolled back.
    RolledBack {
        /// Chain that was interrupted.
        id: ListenerId,
        /// Kind of the rolled back listener.
        kind: ListenerKind,
    },
}

/// Everything produced while handling one trigger.
///
/// The three buffers can be read on their own; [`Outbox::entries`] merges
/// them back into the order the coordinator produced them in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outbox {
    /// Events broadcast by the world while applying listener commands.
    pub events: Vec<Event>,
    /// Presentation work for the adapter.
    pub scene: Vec<SceneRequest>,
    /// Chain lifecycle reports.
    pub reports: Vec<Report>,
    order: Vec<Channel>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Scene = 0,
    Event = 1,
    Report = 2,
}

/// One item of an [`Outbox`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Entry<'a> {
    /// Presentation work.
    Scene(&'a SceneRequest),
    /// World event.
    Event(&'a Event),
    /// Chain lifecycle report.
    Report(&'a Report),
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards all buffered output.
    pub fn clear(&mut self) {
        self.events.clear();
        self.scene.clear();
        self.reports.clear();
        self.order.clear();
    }

    /// Every item in production order.
    ///
    /// Items pushed straight into the public buffers follow the recorded
    /// ones, grouped as scene requests, events, then reports.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry<'_>> {
        let mut next = [0_usize; 3];
        let mut entries: Vec<Entry<'_>> = Vec::with_capacity(self.order.len());
        for channel in &self.order {
            let slot = &mut next[*channel as usize];
            let index = *slot;
            *slot += 1;
            let entry = match channel {
                Channel::Scene => self.scene.get(index).map(Entry::Scene),
                Channel::Event => self.events.get(index).map(Entry::Event),
                Channel::Report => self.reports.get(index).map(Entry::Report),
            };
            entries.extend(entry);
        }

        entries.extend(self.scene.iter().skip(next[0]).map(Entry::Scene));
        entries.extend(self.events.iter().skip(next[1]).map(Entry::Event));
        entries.extend(self.reports.iter().skip(next[2]).map(Entry::Report));
        entries
    }

    /// Sequences items added to the buffers since the last call.
    pub(crate) fn record(&mut self) {
        let mut seen = [0_usize; 3];
        for channel in &self.order {
            seen[*channel as usize] += 1;
        }
        for (channel, len) in [
            (Channel::Scene, self.scene.len()),
            (Channel::Event, self.events.len()),
            (Channel::Report, self.reports.len()),
        ] {
            let fresh = len.saturating_sub(seen[channel as usize]);
            self.order.extend(std::iter::repeat(channel).take(fresh));
        }
    }

    fn report(&mut self, report: Report) {
        self.record();
        self.reports.push(report);
        self.record();
    }
}

#[derive(Debug)]
enum Stage {
    Parked,
    Awaiting(PendingOperation),
}

#[derive(Debug)]
struct InFlight {
    listener: EventListener,
    stage: Stage,
}

struct Candidate {
    activation: Activation,
    chain: ListenerChain,
}

/// Tracks in-flight chains and dispatches their listeners.
#[derive(Debug, Default)]
pub struct Coordinator {
    guard: GuardRegistry,
    tickets: TicketSource,
    in_flight: BTreeMap<ListenerId, InFlight>,
    ticket_owners: BTreeMap<AnimationTicket, ListenerId>,
    parked_actions: Vec<ListenerId>,
}

impl Coordinator {
    /// Creates a coordinator without any in-flight chains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard registry consulted before any chain starts.
    #[must_use]
    pub const fn guard(&self) -> &GuardRegistry {
        &self.guard
    }

    /// Reports whether the chain is waiting on a trigger or on pending work.
    #[must_use]
    pub fn is_in_flight(&self, id: ListenerId) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Number of chains waiting on a trigger or on pending work.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Reacts to a trigger, mutating the world and collecting output.
    pub fn handle(&mut self, world: &mut World, trigger: Trigger, out: &mut Outbox) {
        match trigger {
            Trigger::Touch(coordinate) => self.touch(world, coordinate, out),
            Trigger::Action => self.action(world, out),
            Trigger::Tick(dt) => self.tick(world, dt, out),
            Trigger::AnimationComplete(ticket) => self.acknowledge(world, ticket, out),
        }
    }

    /// Disables every listener, abandoning in-flight chains.
    ///
    /// Animations already handed to the adapter may still finish; their
    /// acknowledgements are ignored.
    pub fn disable_all(&mut self) {
        info!("suspending {} in-flight chains", self.in_flight.len());
        self.guard.suspend();
        let ids: Vec<ListenerId> = self.in_flight.keys().copied().collect();
        for id in ids {
            let _ = self.abandon(id);
        }
    }

    /// Re-enables listeners; abandoned repeatable chains become eligible again.
    pub fn resume(&mut self) {
        info!("resuming listeners");
        self.guard.resume();
    }

    /// Rolls back every invoking listener and abandons all in-flight chains.
    ///
    /// Steps that already completed keep their effects.
    pub fn rollback_in_flight(&mut self, world: &World, out: &mut Outbox) {
        let ids: Vec<ListenerId> = self.in_flight.keys().copied().collect();
        for id in ids {
            let Some(mut entry) = self.abandon(id) else {
                continue;
            };
            let mut commands = Vec::new();
            let rolled_back = entry.listener.rollback(&mut ListenerContext {
                world,
                tickets: &mut self.tickets,
                commands: &mut commands,
                scene: &mut out.scene,
            });
            out.record();
            if rolled_back {
                debug!("rolled back {} of chain {}", entry.listener.kind(), id.get());
                out.report(Report::RolledBack {
                    id,
                    kind: entry.listener.kind(),
                });
            }
        }
    }

    fn touch(&mut self, world: &mut World, coordinate: GridCoordinate, out: &mut Outbox) {
        let candidates: Vec<Candidate> = query::events_at(world, coordinate)
            .into_iter()
            .filter(|found| {
                matches!(
                    found.attached.trigger(),
                    TriggerKind::Touch | TriggerKind::Immediate
                )
            })
            .map(|found| candidate(found.owner.object(), found.attached))
            .collect();

        debug!(
            "touch at {coordinate} found {} candidate chains",
            candidates.len()
        );
        self.start_all(world, candidates, out);
    }

    fn action(&mut self, world: &mut World, out: &mut Outbox) {
        if self.guard.is_suspended() {
            debug!("action ignored: listeners are suspended");
            return;
        }

        while let Some(id) = self.parked_actions.pop() {
            let waiting = matches!(
                self.in_flight.get(&id),
                Some(InFlight { listener, stage: Stage::Parked })
                    if listener.trigger() == TriggerKind::Action
            );
            if !waiting {
                continue;
            }
            if let Some(entry) = self.in_flight.remove(&id) {
                debug!("action resumes chain {}", id.get());
                self.advance(world, entry.listener, true, out);
            }
            return;
        }

        let Some(position) = query::player(world).map(|player| player.coordinate()) else {
            return;
        };
        let candidates: Vec<Candidate> = query::events_at(world, position)
            .into_iter()
            .filter(|found| found.attached.trigger() == TriggerKind::Action)
            .map(|found| candidate(found.owner.object(), found.attached))
            .collect();
        self.start_all(world, candidates, out);
    }

    fn tick(&mut self, world: &mut World, dt: Duration, out: &mut Outbox) {
        apply(world, Command::Tick { dt }, &mut out.events);
        out.record();
        if self.guard.is_suspended() {
            return;
        }

        let parked = self.take_parked(TriggerKind::Tick);

        let mut settled = Vec::new();
        for (id, entry) in &mut self.in_flight {
            if let Stage::Awaiting(pending) = &mut entry.stage {
                pending.tick();
                if pending.is_settled() {
                    settled.push(*id);
                }
            }
        }
        for id in settled {
            if let Some(entry) = self.in_flight.remove(&id) {
                self.finish_step(world, entry.listener, out);
            }
        }

        for listener in parked {
            self.advance(world, listener, true, out);
        }

        let candidates: Vec<Candidate> = query::behaviors(world)
            .into_iter()
            .filter(|found| found.attached.trigger() == TriggerKind::Tick)
            .map(|found| candidate(found.owner.object(), found.attached))
            .collect();
        self.start_all(world, candidates, out);
    }

    fn acknowledge(&mut self, world: &mut World, ticket: AnimationTicket, out: &mut Outbox) {
        let Some(id) = self.ticket_owners.remove(&ticket) else {
            warn!("ignoring stale acknowledgement of ticket {}", ticket.get());
            return;
        };

        let settled = match self.in_flight.get_mut(&id) {
            Some(InFlight {
                stage: Stage::Awaiting(pending),
                ..
            }) => {
                let _ = pending.acknowledge(ticket);
                pending.is_settled()
            }
            _ => false,
        };
        if !settled {
            return;
        }

        if let Some(entry) = self.in_flight.remove(&id) {
            self.finish_step(world, entry.listener, out);
        }
    }

    fn take_parked(&mut self, trigger: TriggerKind) -> Vec<EventListener> {
        let ids: Vec<ListenerId> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| {
                matches!(entry.stage, Stage::Parked) && entry.listener.trigger() == trigger
            })
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.in_flight.remove(&id))
            .map(|entry| entry.listener)
            .collect()
    }

    fn start_all(&mut self, world: &mut World, candidates: Vec<Candidate>, out: &mut Outbox) {
        for candidate in candidates {
            self.start(world, candidate, out);
        }
    }

    fn start(&mut self, world: &mut World, candidate: Candidate, out: &mut Outbox) {
        let Candidate { activation, chain } = candidate;
        if let Err(reason) = self.guard.check(&activation) {
            debug!("chain {} skipped: {reason}", activation.id.get());
            return;
        }
        let head = instantiate_head(chain, activation);
        if let Ok(Some(listener)) = &head {
            let moving = listener
                .moved_object(world)
                .filter(|object| self.guard.is_moving(*object));
            if let (TriggerKind::Immediate, Some(object)) = (listener.trigger(), moving) {
                debug!(
                    "chain {} skipped: {}",
                    activation.id.get(),
                    Unavailable::Moving(object)
                );
                return;
            }
        }
        self.guard.mark(&activation);

        match head {
            Ok(Some(listener)) => self.advance(world, listener, false, out),
            Ok(None) => self.finish(activation, out),
            Err(error) => self.fail(activation, error, out),
        }
    }

    /// Invokes listeners of one chain until it parks, awaits, or ends.
    fn advance(
        &mut self,
        world: &mut World,
        mut listener: EventListener,
        mut triggered: bool,
        out: &mut Outbox,
    ) {
        loop {
            let id = listener.id();
            if !triggered && listener.trigger() != TriggerKind::Immediate {
                debug!(
                    "parking {} of chain {} until {:?}",
                    listener.kind(),
                    id.get(),
                    listener.trigger()
                );
                if listener.trigger() == TriggerKind::Action {
                    self.parked_actions.retain(|parked| *parked != id);
                    self.parked_actions.push(id);
                }
                let _ = self.in_flight.insert(
                    id,
                    InFlight {
                        listener,
                        stage: Stage::Parked,
                    },
                );
                return;
            }
            triggered = false;

            if let Some(object) = listener.moved_object(world) {
                if let Err(reason) = self.guard.claim_target(object, id) {
                    debug!("{} of chain {} refused: {reason}", listener.kind(), id.get());
                    self.fail(listener.activation(), ListenerError::ObjectBusy(object), out);
                    return;
                }
            }

            debug!("invoking {} of chain {}", listener.kind(), id.get());
            out.report(Report::Invoked {
                id,
                kind: listener.kind(),
            });

            let mut commands = Vec::new();
            let invocation = listener.invoke(&mut ListenerContext {
                world,
                tickets: &mut self.tickets,
                commands: &mut commands,
                scene: &mut out.scene,
            });
            out.record();
            self.apply_commands(world, commands, out);

            match invocation {
                Err(error) => {
                    self.fail(listener.activation(), error, out);
                    return;
                }
                Ok(Invocation::Pending(pending)) if !pending.is_settled() => {
                    for ticket in pending.tickets() {
                        let _ = self.ticket_owners.insert(ticket, id);
                    }
                    let _ = self.in_flight.insert(
                        id,
                        InFlight {
                            listener,
                            stage: Stage::Awaiting(pending),
                        },
                    );
                    return;
                }
                Ok(_) => {}
            }

            match self.complete(world, listener, out) {
                Some(next) => listener = next,
                None => return,
            }
        }
    }

    /// Completes a listener whose pending work settled and resumes its chain.
    fn finish_step(&mut self, world: &mut World, listener: EventListener, out: &mut Outbox) {
        if let Some(next) = self.complete(world, listener, out) {
            self.advance(world, next, false, out);
        }
    }

    fn complete(
        &mut self,
        world: &mut World,
        listener: EventListener,
        out: &mut Outbox,
    ) -> Option<EventListener> {
        let activation = listener.activation();
        let mut commands = Vec::new();
        let next = listener.complete(&mut ListenerContext {
            world,
            tickets: &mut self.tickets,
            commands: &mut commands,
            scene: &mut out.scene,
        });
        out.record();
        self.guard.release_targets(activation.id);
        self.apply_commands(world, commands, out);

        match next {
            Ok(Some(next)) => {
                debug!("chain {} advances to {}", activation.id.get(), next.kind());
                Some(next)
            }
            Ok(None) => {
                self.finish(activation, out);
                None
            }
            Err(error) => {
                self.fail(activation, error, out);
                None
            }
        }
    }

    fn apply_commands(&mut self, world: &mut World, commands: Vec<Command>, out: &mut Outbox) {
        for command in commands {
            let first_new = out.events.len();
            apply(world, command, &mut out.events);
            out.record();

            let mut removed = Vec::new();
            for event in &out.events[first_new..] {
                match event {
                    Event::ObjectRemoved { object, .. } => removed.push(*object),
                    Event::PlacementRejected { reason } => {
                        warn!("listener command rejected: {reason}");
                    }
                    _ => {}
                }
            }
            for object in removed {
                self.abandon_owned_by(object);
            }
        }
    }

    /// Abandons in-flight chains attached to an object that left the map.
    fn abandon_owned_by(&mut self, object: ObjectId) {
        let ids: Vec<ListenerId> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.listener.owner() == Some(object))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            debug!("chain {} abandoned: object {} removed", id.get(), object.get());
            let _ = self.abandon(id);
        }
    }

    /// Drops interest in an in-flight chain; its tickets become stale.
    fn abandon(&mut self, id: ListenerId) -> Option<InFlight> {
        let entry = self.in_flight.remove(&id)?;
        self.parked_actions.retain(|parked| *parked != id);
        if let Stage::Awaiting(pending) = &entry.stage {
            for ticket in pending.tickets() {
                let _ = self.ticket_owners.remove(&ticket);
            }
        }
        self.guard.cancel(entry.listener.activation());
        Some(entry)
    }

    fn finish(&mut self, activation: Activation, out: &mut Outbox) {
        debug!("chain {} finished", activation.id.get());
        self.guard.release(&activation);
        out.report(Report::Finished { id: activation.id });
    }

    fn fail(&mut self, activation: Activation, error: ListenerError, out: &mut Outbox) {
        warn!("chain {} failed: {error}", activation.id.get());
        self.guard.release(&activation);
        out.report(Report::Failed {
            id: activation.id,
            error,
        });
    }
}

fn candidate(owner: Option<ObjectId>, attached: &AttachedChain) -> Candidate {
    Candidate {
        activation: Activation {
            id: attached.id(),
            owner,
            execution: attached.execution(),
        },
        chain: attached.chain().clone(),
    }
}
