use std::io::Write;

use anyhow::{bail, Result};
use log::debug;
use tile_rpg_system_coordinator::{Coordinator, Outbox, Trigger};
use tile_rpg_world::{query, World};

use crate::{config::EngineConfig, presenter::TextPresenter, script::ScriptStep};

/// Drives a loaded world with scripted input and writes what happens.
pub(crate) struct Session<W> {
    world: World,
    coordinator: Coordinator,
    presenter: TextPresenter,
    config: EngineConfig,
    ticks: u32,
    out: W,
}

impl<W: Write> Session<W> {
    pub(crate) fn new(world: World, config: EngineConfig, out: W) -> Self {
        let presenter = TextPresenter::new(query::metrics(&world), config.animation_ticks);
        Self {
            world,
            coordinator: Coordinator::new(),
            presenter,
            config,
            ticks: 0,
            out,
        }
    }

    /// Runs every step, then lets outstanding animations finish.
    pub(crate) fn run(&mut self, steps: &[ScriptStep]) -> Result<()> {
        for step in steps {
            debug!("script step {step:?}");
            match *step {
                ScriptStep::Touch(coordinate) => self.dispatch(Trigger::Touch(coordinate))?,
                ScriptStep::Action => self.dispatch(Trigger::Action)?,
                ScriptStep::Tick(count) => {
                    for _ in 0..count {
                        self.tick()?;
                    }
                }
            }
        }

        while self.presenter.is_animating() {
            self.tick()?;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if self.ticks >= self.config.max_ticks {
            bail!("session exceeded {} ticks", self.config.max_ticks);
        }
        self.ticks += 1;

        self.dispatch(Trigger::Tick(self.config.tick_duration()))?;
        for ticket in self.presenter.advance() {
            self.dispatch(Trigger::AnimationComplete(ticket))?;
        }
        Ok(())
    }

    fn dispatch(&mut self, trigger: Trigger) -> Result<()> {
        let mut outbox = Outbox::new();
        self.coordinator.handle(&mut self.world, trigger, &mut outbox);
        for line in self.presenter.present(&outbox) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tile_rpg_core::{
        AttachedChain, ExecutionKind, GridCoordinate, ListenerChain, ListenerDescriptor,
        ListenerId, ListenerKind, ObjectBlueprint, ObjectId, TriggerKind,
    };
    use tile_rpg_world::MapLayout;

    fn run(layout: MapLayout, config: EngineConfig, steps: &[ScriptStep]) -> Result<String> {
        let world = World::from_layout(layout).expect("valid layout");
        let mut output = Vec::new();
        Session::new(world, config, &mut output).run(steps)?;
        Ok(String::from_utf8(output).expect("utf-8 output"))
    }

    fn walk_chain() -> AttachedChain {
        AttachedChain::new(
            ListenerId::new(1),
            TriggerKind::Touch,
            ExecutionKind::Repeatable,
            ListenerChain::new(vec![
                ListenerDescriptor::new(
                    ListenerKind::MovePlayer,
                    json!({ "destination": { "column": 1, "row": 0 } }),
                ),
                ListenerDescriptor::new(ListenerKind::ShowDialog, json!({ "text": "Arrived" })),
                ListenerDescriptor::new(ListenerKind::HideDialog, json!(null)),
            ]),
        )
    }

    fn layout() -> MapLayout {
        MapLayout::filled(3, 1, 32.0, 32.0)
            .with_object(
                ObjectBlueprint::new(ObjectId::new(7), "hero", true),
                GridCoordinate::new(0, 0),
            )
            .with_player("hero")
            .with_tile_chain(GridCoordinate::new(2, 0), walk_chain())
    }

    #[test]
    fn touch_plays_the_move_before_the_dialog() {
        let output = run(
            layout(),
            EngineConfig::default(),
            &[ScriptStep::Touch(GridCoordinate::new(2, 0))],
        )
        .expect("session runs");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "animate object 7 to (1, 0) at (48.0, 16.0)",
                "object 7 moved (0, 0) -> (1, 0)",
                "dialog: Arrived",
                "dialog hidden",
                "chain 1 finished",
            ]
        );
    }

    #[test]
    fn sessions_stop_at_the_tick_limit() {
        let config = EngineConfig {
            max_ticks: 2,
            ..EngineConfig::default()
        };
        let error = run(layout(), config, &[ScriptStep::Tick(3)]).expect_err("limit reached");
        assert!(error.to_string().contains("2 ticks"));
    }
}
