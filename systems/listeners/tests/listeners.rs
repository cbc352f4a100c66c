use serde_json::{json, Value};
use tile_rpg_core::{
    Command, ExecutionKind, GridCoordinate, ListenerChain, ListenerDescriptor, ListenerId,
    ListenerKind, ObjectBlueprint, ObjectId, SceneRequest, TriggerKind,
};
use tile_rpg_system_listeners::{
    instantiate_head, Activation, EventListener, Invocation, ListenerContext, ListenerError,
    ListenerState, TicketSource,
};
use tile_rpg_world::{apply, query, MapLayout, World};

const HERO: ObjectId = ObjectId::new(1);
const CRATE: ObjectId = ObjectId::new(2);

fn activation() -> Activation {
    Activation {
        id: ListenerId::new(7),
        owner: Some(CRATE),
        execution: ExecutionKind::Once,
    }
}

fn descriptor(kind: ListenerKind, params: Value) -> ListenerDescriptor {
    ListenerDescriptor::new(kind, params)
}

fn head_of(descriptors: Vec<ListenerDescriptor>) -> EventListener {
    instantiate_head(ListenerChain::new(descriptors), activation())
        .expect("valid head")
        .expect("non-empty chain")
}

fn sample_world() -> World {
    let layout = MapLayout::filled(6, 6, 32.0, 32.0)
        .with_collision(GridCoordinate::new(4, 4))
        .with_object(
            ObjectBlueprint::new(HERO, "hero", true),
            GridCoordinate::new(0, 0),
        )
        .with_object(
            ObjectBlueprint::new(CRATE, "crate", true),
            GridCoordinate::new(2, 2),
        )
        .with_player("hero");
    World::from_layout(layout).expect("valid layout")
}

#[derive(Default)]
struct Sinks {
    tickets: TicketSource,
    commands: Vec<Command>,
    scene: Vec<SceneRequest>,
}

impl Sinks {
    fn context<'a>(&'a mut self, world: &'a World) -> ListenerContext<'a> {
        ListenerContext {
            world,
            tickets: &mut self.tickets,
            commands: &mut self.commands,
            scene: &mut self.scene,
        }
    }
}

#[test]
fn dialog_chain_shows_then_hides() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut show = head_of(vec![
        descriptor(ListenerKind::ShowDialog, json!({ "text": "Hello" })),
        descriptor(ListenerKind::HideDialog, Value::Null),
    ]);
    assert_eq!(show.state(), ListenerState::Ready);

    let invocation = show.invoke(&mut sinks.context(&world)).expect("show");
    assert_eq!(invocation, Invocation::Completed);
    assert!(show.is_running());

    let mut hide = show
        .complete(&mut sinks.context(&world))
        .expect("advance")
        .expect("hide follows");
    assert_eq!(hide.kind(), ListenerKind::HideDialog);
    assert_eq!(hide.trigger(), TriggerKind::Immediate);
    assert_eq!(hide.id(), ListenerId::new(7), "steps share the chain identity");

    let _ = hide.invoke(&mut sinks.context(&world)).expect("hide");
    let end = hide.complete(&mut sinks.context(&world)).expect("finish");
    assert!(end.is_none());

    assert_eq!(
        sinks.scene,
        vec![
            SceneRequest::ShowDialog {
                text: "Hello".to_owned()
            },
            SceneRequest::HideDialog,
        ]
    );
}

#[test]
fn lone_dialog_waits_for_action_before_hiding() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut show = head_of(vec![
        descriptor(ListenerKind::ShowDialog, json!({ "text": "Beware" })),
        descriptor(ListenerKind::Wait, json!({ "ticks": 1 })),
    ]);

    let _ = show.invoke(&mut sinks.context(&world)).expect("show");
    let hide = show
        .complete(&mut sinks.context(&world))
        .expect("advance")
        .expect("implicit hide");

    assert_eq!(hide.kind(), ListenerKind::HideDialog);
    assert_eq!(hide.trigger(), TriggerKind::Action);
    assert_eq!(
        hide.remaining().head().map(ListenerDescriptor::kind),
        Some(ListenerKind::Wait)
    );
}

#[test]
fn button_prompt_splices_an_action_triggered_pass_through() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut prompt = head_of(vec![
        descriptor(ListenerKind::ButtonPrompt, json!({ "text": "TALK" })),
        descriptor(ListenerKind::ShowDialog, json!({ "text": "Hi there" })),
    ]);

    let _ = prompt.invoke(&mut sinks.context(&world)).expect("prompt");
    let mut pass = prompt
        .complete(&mut sinks.context(&world))
        .expect("advance")
        .expect("pass-through");
    assert_eq!(pass.kind(), ListenerKind::PassThrough);
    assert_eq!(pass.trigger(), TriggerKind::Action);

    let _ = pass.invoke(&mut sinks.context(&world)).expect("press");
    let dialog = pass
        .complete(&mut sinks.context(&world))
        .expect("advance")
        .expect("dialog");
    assert_eq!(dialog.kind(), ListenerKind::ShowDialog);

    assert_eq!(
        sinks.scene,
        vec![
            SceneRequest::ShowButton {
                title: "TALK".to_owned()
            },
            SceneRequest::HideButton,
        ]
    );
}

#[test]
fn move_object_commits_placement_only_on_completion() {
    let mut world = sample_world();
    let mut sinks = Sinks::default();
    let mut mover = head_of(vec![descriptor(
        ListenerKind::MoveObject,
        json!({
            "object": CRATE.get(),
            "departure": { "column": 2, "row": 2 },
            "destination": { "column": 3, "row": 2 }
        }),
    )]);

    let invocation = mover.invoke(&mut sinks.context(&world)).expect("move");
    let Invocation::Pending(mut pending) = invocation else {
        panic!("moves wait for their animation");
    };
    assert!(sinks.commands.is_empty(), "nothing commits before the animation ends");

    let tickets: Vec<_> = pending.tickets().collect();
    assert_eq!(tickets.len(), 1);
    assert!(matches!(
        sinks.scene.as_slice(),
        [SceneRequest::Animate { object, .. }] if *object == CRATE
    ));

    assert!(pending.acknowledge(tickets[0]));
    assert!(pending.is_settled());
    let next = mover.complete(&mut sinks.context(&world)).expect("complete");
    assert!(next.is_none());

    let mut events = Vec::new();
    for command in sinks.commands.drain(..) {
        apply(&mut world, command, &mut events);
    }
    assert_eq!(
        query::object(&world, CRATE).map(|object| object.coordinate()),
        Some(GridCoordinate::new(3, 2))
    );
}

#[test]
fn blocked_move_fails_without_effects() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut mover = head_of(vec![descriptor(
        ListenerKind::MoveObject,
        json!({ "object": CRATE.get(), "destination": { "column": 4, "row": 4 } }),
    )]);

    let error = mover.invoke(&mut sinks.context(&world)).expect_err("blocked");
    assert_eq!(error, ListenerError::Blocked(GridCoordinate::new(4, 4)));
    assert_eq!(mover.state(), ListenerState::Failed);
    assert!(sinks.scene.is_empty());
    assert!(sinks.commands.is_empty());
}

#[test]
fn move_with_stale_departure_is_rejected() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut mover = head_of(vec![descriptor(
        ListenerKind::MoveObject,
        json!({
            "object": CRATE.get(),
            "departure": { "column": 1, "row": 1 },
            "destination": { "column": 3, "row": 2 }
        }),
    )]);

    let error = mover.invoke(&mut sinks.context(&world)).expect_err("stale departure");
    assert_eq!(
        error,
        ListenerError::DepartureMismatch {
            object: CRATE,
            expected: GridCoordinate::new(1, 1),
            actual: GridCoordinate::new(2, 2),
        }
    );
}

#[test]
fn scrolling_player_move_joins_two_animations() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut mover = head_of(vec![descriptor(
        ListenerKind::MovePlayer,
        json!({
            "path": [{ "column": 1, "row": 0 }, { "column": 1, "row": 1 }],
            "scroll": true
        }),
    )]);

    let Invocation::Pending(mut pending) = mover.invoke(&mut sinks.context(&world)).expect("move")
    else {
        panic!("player moves wait for their animations");
    };
    let tickets: Vec<_> = pending.tickets().collect();
    assert_eq!(tickets.len(), 2);
    assert!(sinks.scene.contains(&SceneRequest::HideButton));
    assert!(sinks
        .scene
        .iter()
        .any(|request| matches!(request, SceneRequest::ScrollView { .. })));

    assert!(pending.acknowledge(tickets[0]));
    assert!(!pending.is_settled(), "background scroll still running");
    assert!(pending.acknowledge(tickets[1]));
    assert!(pending.is_settled());
}

#[test]
fn rollback_restores_presentation_without_commands() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut mover = head_of(vec![descriptor(
        ListenerKind::MovePlayer,
        json!({ "destination": { "column": 0, "row": 1 } }),
    )]);

    let _ = mover.invoke(&mut sinks.context(&world)).expect("move");
    sinks.scene.clear();

    assert!(mover.rollback(&mut sinks.context(&world)));
    assert_eq!(mover.state(), ListenerState::RolledBack);
    assert_eq!(
        sinks.scene,
        vec![SceneRequest::RestorePlacement {
            object: HERO,
            at: GridCoordinate::new(0, 0),
        }]
    );
    assert!(sinks.commands.is_empty());
    assert!(!mover.rollback(&mut sinks.context(&world)));
}

#[test]
fn listeners_cannot_be_invoked_twice() {
    let world = sample_world();
    let mut sinks = Sinks::default();
    let mut wait = head_of(vec![descriptor(ListenerKind::Wait, json!({ "ticks": 2 }))]);

    assert_eq!(
        wait.invoke(&mut sinks.context(&world)),
        Ok(Invocation::Pending(tile_rpg_system_listeners::PendingOperation::ticks(2)))
    );
    assert!(matches!(
        wait.invoke(&mut sinks.context(&world)),
        Err(ListenerError::InvalidState {
            state: ListenerState::Invoking,
            ..
        })
    ));
}

#[test]
fn illegal_head_parameters_abort_instantiation() {
    let result = instantiate_head(
        ListenerChain::new(vec![
            descriptor(ListenerKind::ButtonPrompt, json!({ "label": "TALK" })),
            descriptor(ListenerKind::HideDialog, Value::Null),
        ]),
        activation(),
    );
    assert!(matches!(
        result,
        Err(ListenerError::IllegalParameterFormat {
            kind: ListenerKind::ButtonPrompt,
            ..
        })
    ));
}

#[test]
fn collision_and_removal_emit_world_commands() {
    let world = sample_world();
    let mut sinks = Sinks::default();

    let mut collision = head_of(vec![descriptor(
        ListenerKind::SetCollision,
        json!({ "coordinate": { "column": 5, "row": 0 }, "enabled": true }),
    )]);
    let mut removal = head_of(vec![descriptor(
        ListenerKind::RemoveObject,
        json!({ "object": CRATE.get() }),
    )]);
    let mut missing = head_of(vec![descriptor(
        ListenerKind::RemoveObject,
        json!({ "object": 99 }),
    )]);

    let _ = collision.invoke(&mut sinks.context(&world)).expect("collision");
    let _ = removal.invoke(&mut sinks.context(&world)).expect("removal");
    assert_eq!(
        missing.invoke(&mut sinks.context(&world)),
        Err(ListenerError::UnknownObject(ObjectId::new(99)))
    );

    assert_eq!(
        sinks.commands,
        vec![
            Command::SetCollision {
                coordinate: GridCoordinate::new(5, 0),
                enabled: true,
            },
            Command::RemoveObject { object: CRATE },
        ]
    );
}

fn placement(object: u32, listener: u32) -> EventListener {
    head_of(vec![descriptor(
        ListenerKind::PlaceObject,
        json!({
            "object": object,
            "name": "chest",
            "coordinate": { "column": 3, "row": 1 },
            "collision": true,
            "interaction": { "id": listener, "trigger": "touch" }
        }),
    )])
}

#[test]
fn placement_creates_the_object_through_the_world() {
    let mut world = sample_world();
    let mut sinks = Sinks::default();

    let mut place = placement(8, 40);
    assert_eq!(
        place.invoke(&mut sinks.context(&world)),
        Ok(Invocation::Completed)
    );
    assert!(place.complete(&mut sinks.context(&world)).expect("finish").is_none());

    let mut events = Vec::new();
    for command in sinks.commands.drain(..) {
        apply(&mut world, command, &mut events);
    }
    assert_eq!(
        events,
        vec![tile_rpg_core::Event::ObjectPlaced {
            object: ObjectId::new(8),
            coordinate: GridCoordinate::new(3, 1),
        }]
    );
    assert!(!query::can_enter(&world, GridCoordinate::new(3, 1)));
    assert!(query::listener_in_use(&world, ListenerId::new(40)));
}

#[test]
fn placement_rejects_existing_objects_and_listener_ids() {
    let mut world = sample_world();
    let mut sinks = Sinks::default();

    let mut first = placement(8, 40);
    let _ = first.invoke(&mut sinks.context(&world)).expect("place");
    let mut events = Vec::new();
    for command in sinks.commands.drain(..) {
        apply(&mut world, command, &mut events);
    }

    let mut same_object = placement(CRATE.get(), 41);
    assert_eq!(
        same_object.invoke(&mut sinks.context(&world)),
        Err(ListenerError::ObjectExists(CRATE))
    );
    assert_eq!(same_object.state(), ListenerState::Failed);

    let mut same_listener = placement(9, 40);
    assert_eq!(
        same_listener.invoke(&mut sinks.context(&world)),
        Err(ListenerError::DuplicateListener(ListenerId::new(40)))
    );
    assert!(sinks.commands.is_empty());
    assert!(query::object(&world, ObjectId::new(9)).is_none());
}
