//! A* over the implicit graph of world configurations.
//!
//! Nodes are whole configurations; edges are the four primitive actions at
//! unit cost. The frontier orders by `g + h` with insertion order breaking
//! ties, so runs are reproducible. The closed set and best-cost map key on
//! structural state equality. With the admissible heuristic, the first goal
//! popped is optimal.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering::Relaxed},
    time::{Duration, Instant},
};

use enum_iterator::all;
use enum_map::EnumMap;
use log::{debug, info};
use static_assertions::assert_impl_all;
use thiserror::Error;

use crate::{
    goal::Goal,
    heuristic,
    world::{Action, State, World},
};

// The closed set clones and hashes configurations wholesale.
assert_impl_all!(State: Clone, Eq, std::hash::Hash);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("the search space was exhausted without reaching the goal")]
    Exhausted,
    #[error("the time budget ran out")]
    OutOfTime,
    #[error("the search was interrupted")]
    Interrupted,
}

/// Frontier entry: smallest `f` first, then first-in first-out.
struct Open {
    f: usize,
    seq: u64,
    state: State,
}

impl PartialEq for Open {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for Open {}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Open {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for a min-heap.
        (other.f, other.seq).cmp(&(self.f, self.seq))
    }
}

/// Shortest action sequence from `start` to a state satisfying `goal`.
pub fn search(
    world: &World,
    start: &State,
    goal: &Goal,
    budget: Duration,
    interrupt: &AtomicBool,
) -> Result<Vec<Action>, SearchError> {
    let t0 = Instant::now();
    let mut open: BinaryHeap<Open> = BinaryHeap::new();
    let mut came_from: HashMap<State, (Action, State)> = HashMap::new();
    let mut best_g: HashMap<State, usize> = HashMap::from([(start.clone(), 0)]);
    let mut closed: HashSet<State> = HashSet::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    open.push(Open { f: heuristic::estimate(goal, start, world), seq, state: start.clone() });

    while let Some(Open { state, .. }) = open.pop() {
        if interrupt.swap(false, Relaxed) {
            info!(target: "search", "interrupted after {expanded} expansions");
            return Err(SearchError::Interrupted);
        }
        if t0.elapsed() > budget {
            info!(target: "search", "budget of {budget:?} spent after {expanded} expansions");
            return Err(SearchError::OutOfTime);
        }

        if goal.satisfied(&state, world) {
            let plan = reconstruct(&came_from, state, start);
            info!(
                target: "search",
                "plan of {} actions found, {expanded} nodes expanded in {:?}",
                plan.len(),
                t0.elapsed(),
            );
            return Ok(plan);
        }

        if !closed.insert(state.clone()) {
            continue;
        }
        let g = best_g[&state];
        expanded += 1;

        for action in all::<Action>() {
            let Some(next) = state.successor(action, world) else {
                continue;
            };
            let tentative = g + 1;
            if best_g.get(&next).is_none_or(|&known| tentative < known) {
                best_g.insert(next.clone(), tentative);
                came_from.insert(next.clone(), (action, state.clone()));
                seq += 1;
                let f = tentative + heuristic::estimate(goal, &next, world);
                open.push(Open { f, seq, state: next });
            }
        }
    }

    debug!(target: "search", "search space exhausted after {expanded} expansions");
    Err(SearchError::Exhausted)
}

fn reconstruct(
    came_from: &HashMap<State, (Action, State)>,
    mut state: State,
    start: &State,
) -> Vec<Action> {
    let mut actions = Vec::new();
    while &state != start {
        let (action, parent) =
            came_from.get(&state).expect("every expanded state has a recorded parent");
        actions.push(*action);
        state = parent.clone();
    }
    actions.reverse();
    actions
}

/// How often each action occurs in a plan.
pub fn action_stats(plan: &[Action]) -> EnumMap<Action, usize> {
    let mut stats: EnumMap<Action, usize> = EnumMap::default();
    for &action in plan {
        stats[action] += 1;
    }
    stats
}
