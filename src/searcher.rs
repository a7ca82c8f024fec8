use rand::rngs::StdRng;
use rand::Rng;

use crate::state::StateId;

/// Chooses which live state steps next. The executor reports membership
/// changes through [`Searcher::update`]; selection must only return states
/// it currently holds.
pub trait Searcher {
    fn select_state(&mut self) -> Option<StateId>;

    /// Apply deltas: states added to and removed from the live set.
    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]);

    /// Pause/continue deltas; paused states stay alive but unselectable.
    fn update_paused(&mut self, paused: &[StateId], continued: &[StateId]) {
        self.update(None, continued, paused);
    }

    fn is_empty(&self) -> bool;
}

/// Depth-first search: always steps the most recently forked state.
#[derive(Debug, Default)]
pub struct DfsSearcher {
    stack: Vec<StateId>,
}

impl DfsSearcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Searcher for DfsSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        self.stack.last().copied()
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if !removed.is_empty() {
            self.stack.retain(|id| !removed.contains(id));
        }
        self.stack.extend_from_slice(added);
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Uniform random selection among the live states.
pub struct RandomSearcher {
    states: Vec<StateId>,
    rng: StdRng,
}

impl RandomSearcher {
    pub fn new(rng: StdRng) -> Self {
        RandomSearcher {
            states: Vec::new(),
            rng,
        }
    }
}

impl Searcher for RandomSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        if self.states.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.states.len());
        Some(self.states[index])
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if !removed.is_empty() {
            self.states.retain(|id| !removed.contains(id));
        }
        self.states.extend_from_slice(added);
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
