//! Plan narration.
//!
//! A finished plan is annotated for playback: before every pickup comes a
//! "Moving the …" line describing the object about to be lifted, minimally
//! distinguished against every label present in the *starting* state (the
//! narration precedes the action). An empty plan becomes the single line
//! "That is already true!".

use std::fmt::{Display, Formatter};

use crate::{
    describe,
    world::{Action, Label, State, World},
};

/// One element of an executable plan: an action token or a narration line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanItem {
    Act(Action),
    Say(String),
}

impl Display for PlanItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanItem::Act(action) => write!(f, "{action}"),
            PlanItem::Say(line) => write!(f, "{line}"),
        }
    }
}

pub fn narrate(plan: &[Action], start: &State, world: &World) -> Vec<PlanItem> {
    if plan.is_empty() {
        return vec![PlanItem::Say("That is already true!".to_owned())];
    }

    let pool: Vec<Label> = start.labels().map(str::to_owned).collect();
    let mut items = Vec::with_capacity(plan.len());
    let mut sim = start.clone();
    for &action in plan {
        if action == Action::Pick {
            let target = sim.top(sim.arm).expect("a planned pickup has something under the arm");
            items.push(PlanItem::Say(format!(
                "Moving the {}",
                describe::minimal(target, &pool, world)
            )));
        }
        items.push(PlanItem::Act(action));
        sim.apply(action, world).expect("a planned action is legal in sequence");
    }
    items
}
