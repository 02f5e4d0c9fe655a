//! Admissible cost estimation for the search.
//!
//! Costs are built from four primitive estimates: moving the arm over a
//! label, clearing everything stacked above it, the cheapest column to reach
//! floor level, and the column distance between two labels. Each relation
//! combines them so the result never exceeds the true number of actions
//! still needed; a conjunction takes the maximum of its literals (each is a
//! lower bound for the whole), and a goal takes the minimum over its
//! disjuncts (the planner satisfies the cheapest).

use crate::{
    goal::{Conjunction, Goal, Literal, Pred},
    physics::Relation,
    world::{FLOOR, State, World},
};

/// Estimated actions to satisfy the goal from `state`. Zero iff satisfied.
pub fn estimate(goal: &Goal, state: &State, world: &World) -> usize {
    goal.iter().map(|conj| conjunction(conj, state, world)).min().unwrap_or(0)
}

pub fn conjunction(conj: &Conjunction, state: &State, world: &World) -> usize {
    conj.iter().map(|lit| literal(lit, state, world)).max().unwrap_or(0)
}

pub fn literal(lit: &Literal, state: &State, world: &World) -> usize {
    if lit.holds(state, world) {
        return 0;
    }
    match &lit.pred {
        Pred::Holding(x) => expose(state, x) + move_to(state, x) + 1,
        Pred::Spatial { relation, a, b } => match relation {
            Relation::LeftOf | Relation::RightOf => {
                let clear_a = expose(state, a) + move_to(state, a);
                let clear_b = expose(state, b) + move_to(state, b);
                steps_between(state, a, b) + 1 + clear_a.min(clear_b)
            }
            Relation::Inside | Relation::OnTop => {
                let reach = move_to(state, a).min(move_to(state, b));
                let clearing = if cost_column(state, a) == cost_column(state, b) {
                    expose(state, a).max(expose(state, b))
                } else {
                    expose(state, a) + expose(state, b)
                };
                reach + steps_between(state, a, b) + 1 + clearing
            }
            Relation::Beside => {
                let via_a = move_to(state, a) + expose(state, a);
                let via_b = move_to(state, b) + expose(state, b);
                (via_a.min(via_b) + steps_between(state, a, b)).saturating_sub(1)
            }
            Relation::Under => move_to(state, b) + expose(state, b) + steps_between(state, b, a),
            Relation::Above => move_to(state, a) + expose(state, a) + steps_between(state, a, b),
        },
    }
}

/// The column a label is costed at: held objects ride with the arm, the
/// floor means the cheapest column to clear.
fn cost_column(state: &State, label: &str) -> usize {
    if state.holding.as_deref() == Some(label) {
        return state.arm;
    }
    if label == FLOOR {
        return floor_column(state);
    }
    match state.find(label) {
        Some((col, _)) => col,
        None => state.arm,
    }
}

/// Arm travel to reach the label's column; free if it is already held.
fn move_to(state: &State, label: &str) -> usize {
    if state.holding.as_deref() == Some(label) {
        return 0;
    }
    state.arm.abs_diff(cost_column(state, label))
}

/// Actions to uncover a label: everything above it must be picked, carried
/// away, dropped, and (except the last time) returned from; holding
/// something costs one extra put-down first. For the floor this clears the
/// cheapest column.
fn expose(state: &State, label: &str) -> usize {
    let blocking = if label == FLOOR {
        state.stacks[floor_column(state)].len()
    } else if state.holding.as_deref() == Some(label) {
        0
    } else {
        match state.find(label) {
            Some((col, height)) => state.stacks[col].len() - height - 1,
            None => 0,
        }
    };
    if blocking == 0 {
        0
    } else {
        4 * blocking - 1 + usize::from(state.holding.is_some())
    }
}

/// The column where reaching floor level is cheapest from the arm's spot.
fn floor_column(state: &State) -> usize {
    state
        .stacks
        .iter()
        .enumerate()
        .min_by_key(|(col, stack)| (state.arm.abs_diff(*col) + 4 * stack.len(), *col))
        .map(|(col, _)| col)
        .expect("a world has at least one column")
}

fn steps_between(state: &State, a: &str, b: &str) -> usize {
    cost_column(state, a).abs_diff(cost_column(state, b))
}
