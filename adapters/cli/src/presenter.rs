use tile_rpg_core::{AnimationTicket, Event, SceneRequest, TileMetrics};
use tile_rpg_system_coordinator::{Entry, Outbox, Report};

/// Renders coordinator output as text and plays animations for a fixed number of ticks.
#[derive(Debug)]
pub(crate) struct TextPresenter {
    metrics: TileMetrics,
    animation_ticks: u32,
    dialog_visible: bool,
    button_visible: bool,
    animations: Vec<(AnimationTicket, u32)>,
}

impl TextPresenter {
    pub(crate) fn new(metrics: TileMetrics, animation_ticks: u32) -> Self {
        Self {
            metrics,
            animation_ticks,
            dialog_visible: false,
            button_visible: false,
            animations: Vec::new(),
        }
    }

    /// Reports whether any animation is still playing.
    pub(crate) fn is_animating(&self) -> bool {
        !self.animations.is_empty()
    }

    /// Describes the outbox in production order, starting every requested animation.
    pub(crate) fn present(&mut self, outbox: &Outbox) -> Vec<String> {
        outbox
            .entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Scene(request) => self.scene_line(request),
                Entry::Event(event) => event_line(event),
                Entry::Report(report) => report_line(report),
            })
            .collect()
    }

    /// Advances animations by one tick, returning the tickets that finished.
    pub(crate) fn advance(&mut self) -> Vec<AnimationTicket> {
        let mut finished = Vec::new();
        self.animations.retain_mut(|(ticket, remaining)| {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                finished.push(*ticket);
                false
            } else {
                true
            }
        });
        finished
    }

    fn scene_line(&mut self, request: &SceneRequest) -> Option<String> {
        match request {
            SceneRequest::ShowDialog { text } => {
                self.dialog_visible = true;
                Some(format!("dialog: {text}"))
            }
            SceneRequest::HideDialog => {
                std::mem::take(&mut self.dialog_visible).then(|| "dialog hidden".to_owned())
            }
            SceneRequest::ShowButton { title } => {
                self.button_visible = true;
                Some(format!("button: {title}"))
            }
            SceneRequest::HideButton => {
                std::mem::take(&mut self.button_visible).then(|| "button hidden".to_owned())
            }
            SceneRequest::Animate {
                ticket,
                object,
                animation,
            } => {
                self.animations.push((*ticket, self.animation_ticks));
                let destination = animation.destination();
                let point = self.metrics.to_render_space(destination);
                Some(format!(
                    "animate object {} to {destination} at ({:.1}, {:.1})",
                    object.get(),
                    point.x,
                    point.y
                ))
            }
            SceneRequest::ScrollView { ticket, animation } => {
                self.animations.push((*ticket, self.animation_ticks));
                Some(format!("scroll view towards {}", animation.destination()))
            }
            SceneRequest::RestorePlacement { object, at } => {
                Some(format!("restore object {} at {at}", object.get()))
            }
        }
    }
}

fn event_line(event: &Event) -> Option<String> {
    match event {
        Event::ObjectMoved { object, from, to } => {
            Some(format!("object {} moved {from} -> {to}", object.get()))
        }
        Event::ObjectPlaced { object, coordinate } => {
            Some(format!("object {} placed at {coordinate}", object.get()))
        }
        Event::ObjectRemoved { object, coordinate } => {
            Some(format!("object {} removed from {coordinate}", object.get()))
        }
        Event::CollisionChanged {
            coordinate,
            enabled,
        } => Some(format!(
            "collision at {coordinate} {}",
            if *enabled { "enabled" } else { "cleared" }
        )),
        Event::PlacementRejected { reason } => Some(format!("rejected: {reason}")),
        Event::TimeAdvanced { .. } | Event::ZOrderRecomputed { .. } => None,
    }
}

fn report_line(report: &Report) -> Option<String> {
    match report {
        Report::Finished { id } => Some(format!("chain {} finished", id.get())),
        Report::Failed { id, error } => Some(format!("chain {} failed: {error}", id.get())),
        Report::RolledBack { id, kind } => {
            Some(format!("chain {} rolled back {kind}", id.get()))
        }
        Report::Invoked { .. } => None,
    }
}
