//! Client-side record of a pooled session.
//!
//! A [`Session`] is an arena of [`SlotState`] indexed by slot position; slot
//! `i` belongs to seed `i` for the life of the session. Slot status moves
//! through a two-state machine:
//!
//! ```text
//! Live --(done=false)--> Live
//! Live --(done=true)---> Terminated
//! Terminated --(any)---> Terminated
//! ```
//!
//! Only a server-reported `done` can terminate a slot, and nothing but a
//! fresh reset brings it back.

use snakepool_core::types::{ObsKind, StepOutcome};

/// Lifecycle of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    Live,
    Terminated,
}

impl SlotStatus {
    /// Apply one server outcome.
    #[must_use]
    pub const fn after(self, done: bool) -> Self {
        match (self, done) {
            (Self::Live, false) => Self::Live,
            (Self::Live, true) | (Self::Terminated, _) => Self::Terminated,
        }
    }
}

/// Latest server truth for one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotState {
    last_outcome: StepOutcome,
    status: SlotStatus,
    terminal: Option<StepOutcome>,
}

impl SlotState {
    pub(crate) fn new(outcome: StepOutcome) -> Self {
        let status = SlotStatus::Live.after(outcome.done);
        Self {
            terminal: outcome.done.then(|| outcome.clone()),
            last_outcome: outcome,
            status,
        }
    }

    pub const fn last_outcome(&self) -> &StepOutcome {
        &self.last_outcome
    }

    pub const fn status(&self) -> SlotStatus {
        self.status
    }

    pub const fn terminated(&self) -> bool {
        matches!(self.status, SlotStatus::Terminated)
    }

    /// The outcome that terminated this slot, kept as the reference for
    /// later echoes.
    pub const fn terminal_outcome(&self) -> Option<&StepOutcome> {
        self.terminal.as_ref()
    }

    /// Store `outcome` verbatim. Returns `true` if this outcome terminated a
    /// previously live slot.
    pub(crate) fn record(&mut self, outcome: StepOutcome) -> bool {
        let was_live = !self.terminated();
        self.status = self.status.after(outcome.done);
        let newly_terminated = was_live && self.terminated();
        if newly_terminated {
            self.terminal = Some(outcome.clone());
        }
        self.last_outcome = outcome;
        newly_terminated
    }
}

/// A pool of environments created by one `reset_many`.
///
/// Not internally synchronized: stepping takes `&mut Session`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    obs_kind: ObsKind,
    seeds: Vec<u64>,
    slots: Vec<SlotState>,
    ticks: u64,
}

impl Session {
    pub(crate) fn new(
        id: String,
        obs_kind: ObsKind,
        seeds: Vec<u64>,
        outcomes: Vec<StepOutcome>,
    ) -> Self {
        Self {
            id,
            obs_kind,
            seeds,
            slots: outcomes.into_iter().map(SlotState::new).collect(),
            ticks: 0,
        }
    }

    /// Server-assigned session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn obs_kind(&self) -> ObsKind {
        self.obs_kind
    }

    /// Seeds of the most recent reset, in slot order.
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&SlotState> {
        self.slots.get(index)
    }

    /// Number of `step_many` calls since the last reset.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.terminated()).count()
    }

    pub fn terminated_count(&self) -> usize {
        self.len() - self.live_count()
    }

    pub fn all_terminated(&self) -> bool {
        self.slots.iter().all(SlotState::terminated)
    }

    /// Indices of terminated slots, ascending.
    pub fn terminated_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.terminated().then_some(i))
            .collect()
    }

    /// Latest outcome of every slot, in slot order.
    pub fn outcomes(&self) -> impl Iterator<Item = &StepOutcome> {
        self.slots.iter().map(SlotState::last_outcome)
    }

    /// Replace every slot with the outcomes of a reset and restart the tick
    /// counter.
    pub(crate) fn reset_slots(&mut self, seeds: Vec<u64>, outcomes: Vec<StepOutcome>) {
        self.seeds = seeds;
        self.slots = outcomes.into_iter().map(SlotState::new).collect();
        self.ticks = 0;
    }

    /// Record one tick's outcomes, which must be one per slot. Returns the
    /// indices of slots that terminated on this tick.
    pub(crate) fn apply_tick(&mut self, outcomes: Vec<StepOutcome>) -> Vec<usize> {
        debug_assert_eq!(outcomes.len(), self.slots.len());
        self.ticks += 1;
        self.slots
            .iter_mut()
            .zip(outcomes)
            .enumerate()
            .filter_map(|(i, (slot, outcome))| slot.record(outcome).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use snakepool_core::types::{DeathCause, ObsVariant, Signals};

    use super::*;

    fn outcome(done: bool) -> StepOutcome {
        StepOutcome {
            obs: ObsVariant::Dense(vec![0.0; 11]),
            signals: Signals::ZERO,
            done,
            score: 0,
            length: 3,
            death: if done { DeathCause::Wall } else { DeathCause::None },
            steps: 0,
            render: None,
        }
    }

    #[test]
    fn terminated_is_absorbing() {
        assert_eq!(SlotStatus::Live.after(false), SlotStatus::Live);
        assert_eq!(SlotStatus::Live.after(true), SlotStatus::Terminated);
        assert_eq!(SlotStatus::Terminated.after(false), SlotStatus::Terminated);
        assert_eq!(SlotStatus::Terminated.after(true), SlotStatus::Terminated);
    }

    #[test]
    fn record_reports_only_the_terminating_tick() {
        let mut slot = SlotState::new(outcome(false));
        assert!(!slot.record(outcome(false)));
        assert!(slot.record(outcome(true)));
        assert!(!slot.record(outcome(true)));
        assert!(slot.terminated());
    }

    #[test]
    fn first_terminal_outcome_is_kept() {
        let mut slot = SlotState::new(outcome(false));
        assert!(slot.terminal_outcome().is_none());

        let mut terminal = outcome(true);
        terminal.score = 4;
        slot.record(terminal.clone());

        let mut echo = outcome(true);
        echo.score = 9;
        slot.record(echo);
        assert_eq!(slot.terminal_outcome(), Some(&terminal));
        assert_eq!(slot.last_outcome().score, 9);
    }

    #[test]
    fn terminated_slot_stays_terminated_on_bogus_live_outcome() {
        let mut slot = SlotState::new(outcome(true));
        assert!(slot.terminated());
        slot.record(outcome(false));
        assert!(slot.terminated());
        assert!(!slot.last_outcome().done);
    }

    #[test]
    fn apply_tick_tracks_counts() {
        let mut session = Session::new(
            "s".into(),
            ObsKind::Dense11,
            vec![1, 2, 3],
            vec![outcome(false), outcome(false), outcome(false)],
        );
        assert_eq!(session.live_count(), 3);

        let newly = session.apply_tick(vec![outcome(false), outcome(true), outcome(false)]);
        assert_eq!(newly, vec![1]);
        assert_eq!(session.ticks(), 1);

        let newly = session.apply_tick(vec![outcome(true), outcome(true), outcome(false)]);
        assert_eq!(newly, vec![0]);
        assert_eq!(session.terminated_slots(), vec![0, 1]);
        assert_eq!(session.terminated_count(), 2);
        assert!(!session.all_terminated());
    }

    #[test]
    fn reset_slots_restarts_everything() {
        let mut session = Session::new("s".into(), ObsKind::Dense11, vec![1], vec![outcome(false)]);
        session.apply_tick(vec![outcome(true)]);
        assert!(session.all_terminated());

        session.reset_slots(vec![9], vec![outcome(false)]);
        assert_eq!(session.ticks(), 0);
        assert_eq!(session.seeds(), &[9]);
        assert_eq!(session.live_count(), 1);
        assert_eq!(session.id(), "s");
    }
}
