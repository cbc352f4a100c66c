//! Handles for listener work that completes asynchronously.

use std::collections::BTreeSet;

use tile_rpg_core::AnimationTicket;

/// Issues unique animation tickets for one coordinator.
#[derive(Debug, Default)]
pub struct TicketSource {
    next: u64,
}

impl TicketSource {
    /// Creates a source starting at ticket zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Issues the next unused ticket.
    pub fn issue(&mut self) -> AnimationTicket {
        let ticket = AnimationTicket::new(self.next);
        self.next = self.next.saturating_add(1);
        ticket
    }
}

/// Outstanding work a listener waits on before it can complete.
///
/// A pending operation joins every ticket it holds: it settles only once all
/// of them were acknowledged and the tick countdown reached zero. Dropping the
/// handle abandons interest in the work without cancelling it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingOperation {
    tickets: BTreeSet<AnimationTicket>,
    ticks_remaining: u32,
}

impl PendingOperation {
    /// Waits for every provided ticket.
    #[must_use]
    pub fn join<I>(tickets: I) -> Self
    where
        I: IntoIterator<Item = AnimationTicket>,
    {
        Self {
            tickets: tickets.into_iter().collect(),
            ticks_remaining: 0,
        }
    }

    /// Waits for the provided number of simulation ticks.
    #[must_use]
    pub fn ticks(count: u32) -> Self {
        Self {
            tickets: BTreeSet::new(),
            ticks_remaining: count,
        }
    }

    /// Tickets still awaiting acknowledgement.
    pub fn tickets(&self) -> impl Iterator<Item = AnimationTicket> + '_ {
        self.tickets.iter().copied()
    }

    /// Records an acknowledgement; returns whether the ticket belonged to this operation.
    pub fn acknowledge(&mut self, ticket: AnimationTicket) -> bool {
        self.tickets.remove(&ticket)
    }

    /// Counts down one simulation tick.
    pub fn tick(&mut self) {
        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
    }

    /// Reports whether every awaited piece of work finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tickets.is_empty() && self.ticks_remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_settles_only_after_every_ticket() {
        let mut source = TicketSource::new();
        let player = source.issue();
        let background = source.issue();
        let mut pending = PendingOperation::join([player, background]);

        assert!(pending.acknowledge(background));
        assert!(!pending.is_settled());
        assert!(!pending.acknowledge(background), "tickets are consumed once");
        assert!(pending.acknowledge(player));
        assert!(pending.is_settled());
    }

    #[test]
    fn foreign_tickets_are_not_acknowledged() {
        let mut pending = PendingOperation::join([AnimationTicket::new(1)]);
        assert!(!pending.acknowledge(AnimationTicket::new(2)));
        assert!(!pending.is_settled());
    }

    #[test]
    fn tick_countdown_settles_at_zero() {
        let mut pending = PendingOperation::ticks(2);
        pending.tick();
        assert!(!pending.is_settled());
        pending.tick();
        assert!(pending.is_settled());
        pending.tick();
        assert!(pending.is_settled());
    }

    #[test]
    fn tickets_are_unique() {
        let mut source = TicketSource::new();
        let first = source.issue();
        let second = source.issue();
        assert_ne!(first, second);
    }
}
