//! Goal formulas and their compilation.
//!
//! A goal is a disjunction of conjunctions of positive literals over the
//! spatial relations plus `holding`. The compiler takes the resolved label
//! sets of a command, applies the quantifier feasibility pre-filters, and
//! builds the formula for the quantifier combination at hand, consulting the
//! physics rulebook pair by pair so impossible literals never enter a goal.

use std::{
    cell::Cell,
    fmt::{Display, Formatter},
};

use derive_more::{Deref, DerefMut};
use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::{
    grammar::Quantifier,
    physics::{Law, Relation},
    world::{FLOOR, Form, Label, ObjectDef, State, World},
};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Pred {
    Holding(Label),
    Spatial { relation: Relation, a: Label, b: Label },
}

/// A relation claim with a polarity. Compiled goals only ever contain
/// positive literals, but satisfaction honors the flag.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Literal {
    pub polarity: bool,
    pub pred: Pred,
}

impl Literal {
    pub fn holding(label: impl Into<Label>) -> Self {
        Literal { polarity: true, pred: Pred::Holding(label.into()) }
    }

    pub fn spatial(relation: Relation, a: impl Into<Label>, b: impl Into<Label>) -> Self {
        Literal { polarity: true, pred: Pred::Spatial { relation, a: a.into(), b: b.into() } }
    }

    pub fn holds(&self, state: &State, world: &World) -> bool {
        let raw = match &self.pred {
            Pred::Holding(label) => state.holding.as_deref() == Some(label.as_str()),
            Pred::Spatial { relation, a, b } => spatial_holds(*relation, a, b, state, world),
        };
        raw == self.polarity
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.polarity {
            write!(f, "~")?;
        }
        match &self.pred {
            Pred::Holding(label) => write!(f, "holding({label})"),
            Pred::Spatial { relation, a, b } => write!(f, "{relation}({a},{b})"),
        }
    }
}

fn spatial_holds(relation: Relation, a: &str, b: &str, state: &State, world: &World) -> bool {
    if a == b {
        return false;
    }
    if a == FLOOR {
        // The floor stands under everything placed; no other claim about it
        // can hold.
        return relation == Relation::Under && state.find(b).is_some();
    }
    let Some((col_a, height_a)) = state.find(a) else {
        return false;
    };
    if b == FLOOR {
        return match relation {
            Relation::OnTop => height_a == 0,
            Relation::Above => true,
            _ => false,
        };
    }
    let Some((col_b, height_b)) = state.find(b) else {
        return false;
    };

    match relation {
        Relation::LeftOf => col_a < col_b,
        Relation::RightOf => col_a > col_b,
        Relation::Beside => col_a.abs_diff(col_b) == 1,
        Relation::Above => col_a == col_b && height_a > height_b,
        Relation::Under => col_a == col_b && height_a < height_b,
        Relation::OnTop => col_a == col_b && height_a == height_b + 1,
        Relation::Inside => {
            col_a == col_b
                && height_a == height_b + 1
                && world.def(b).is_some_and(|d| d.form == Form::Box)
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deref, DerefMut)]
pub struct Conjunction(pub Vec<Literal>);

impl Conjunction {
    pub fn holds(&self, state: &State, world: &World) -> bool {
        self.iter().all(|lit| lit.holds(state, world))
    }
}

impl Display for Conjunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter().join(" & "))
    }
}

/// A goal in disjunctive normal form. Never empty when compiled.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deref, DerefMut)]
pub struct Goal(pub Vec<Conjunction>);

impl Goal {
    pub fn satisfied(&self, state: &State, world: &World) -> bool {
        self.iter().any(|conj| conj.holds(state, world))
    }
}

impl Display for Goal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter().map(|c| format!("({c})")).join(" | "))
    }
}

/// The resolved inputs of one command, ready for compilation.
#[derive(Clone, Debug)]
pub struct Request {
    pub movables: Vec<Label>,
    pub q_movable: Quantifier,
    pub movable_desc: ObjectDef,
    /// `None` means the command only wants something held.
    pub target: Option<Target>,
}

#[derive(Clone, Debug)]
pub struct Target {
    pub relation: Relation,
    pub relatables: Vec<Label>,
    pub q_relatable: Quantifier,
    pub desc: ObjectDef,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoalError {
    #[error(transparent)]
    Law(#[from] Law),
    #[error("I cannot move the floor.")]
    FloorNotMovable,
    #[error("I can only hold one object at a time.")]
    HoldSeveral,
    #[error("That would require an object to be {0} itself.")]
    SelfRelated(Relation),
    #[error("A box can only fit one object.")]
    SingleContainer,
    #[error("An object can only support one other object.")]
    SingleSupport,
    #[error("I cannot put every object {0} every other one.")]
    AllOnAll(Relation),
    #[error("There are not enough places to put them all.")]
    TooFewTargets,
    #[error("There are not enough objects to do that.")]
    TooFewMovables,
    #[error("I cannot do that.")]
    Unsatisfiable,
}

/// Which literal argument must stay distinct across a conjunction when the
/// relation is exclusive (one supporter, one occupant).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Slot {
    First,
    Second,
}

pub fn compile(request: &Request, world: &World) -> Result<Goal, GoalError> {
    let movables: Vec<&str> =
        request.movables.iter().map(Label::as_str).filter(|l| *l != FLOOR).collect();
    if movables.is_empty() {
        return Err(GoalError::FloorNotMovable);
    }

    let Some(target) = &request.target else {
        if request.q_movable == Quantifier::All && movables.len() > 1 {
            return Err(GoalError::HoldSeveral);
        }
        let goal =
            Goal(movables.iter().map(|m| Conjunction(vec![Literal::holding(*m)])).collect());
        debug!(target: "interpret", "compiled goal: {goal}");
        return Ok(goal);
    };

    let relation = target.relation;
    let (qm, qr) = (request.q_movable, target.q_relatable);
    let relatables: Vec<&str> = target.relatables.iter().map(Label::as_str).collect();

    // Containment is impossible outside boxes; say so up front.
    if relation == Relation::Inside {
        if !matches!(target.desc.form, Form::Box | Form::Any) {
            return Err(Law::InsideNonBox.into());
        }
        if !relatables.iter().any(|r| world.def(r).is_some_and(|d| d.form == Form::Box)) {
            return Err(Law::InsideNonBox.into());
        }
    }

    // Universal quantifiers over overlapping descriptions would demand an
    // object be related to itself.
    let universal_pair = matches!(
        (qm, qr),
        (Quantifier::All, Quantifier::All)
            | (Quantifier::All, Quantifier::The)
            | (Quantifier::The, Quantifier::All)
    );
    if universal_pair && request.movable_desc.shares_defined_attribute(&target.desc) {
        return Err(GoalError::SelfRelated(relation));
    }

    let floor_destination = relatables.iter().all(|r| *r == FLOOR);
    if qm == Quantifier::All && relation.is_exclusive() && !floor_destination {
        match qr {
            Quantifier::All => return Err(GoalError::AllOnAll(relation)),
            Quantifier::The if movables.len() > 1 => {
                return Err(if relation == Relation::Inside {
                    GoalError::SingleContainer
                } else {
                    GoalError::SingleSupport
                });
            }
            Quantifier::Any if relatables.len() < movables.len() => {
                return Err(GoalError::TooFewTargets);
            }
            _ => {}
        }
    }
    if qr == Quantifier::All && relation.is_exclusive() && movables.len() < relatables.len() {
        return Err(GoalError::TooFewMovables);
    }

    let first_law: Cell<Option<Law>> = Cell::new(None);
    let permitted = |m: &str, r: &str| match world.check(m, r, relation) {
        Ok(()) => true,
        Err(law) => {
            if first_law.get().is_none() {
                first_law.set(Some(law));
            }
            false
        }
    };
    let rejected = || first_law.get().map(GoalError::from).unwrap_or(GoalError::Unsatisfiable);

    let distinct = relation.is_exclusive();
    let goal = match (qm, qr) {
        // Each movable somewhere: a conjunct per movable, expanded so no two
        // movables claim the same exclusive destination.
        (Quantifier::All, Quantifier::Any) => {
            let mut conjuncts: Vec<Vec<Literal>> = Vec::with_capacity(movables.len());
            for m in &movables {
                let options: Vec<Literal> = relatables
                    .iter()
                    .filter(|r| permitted(m, r))
                    .map(|r| Literal::spatial(relation, *m, *r))
                    .collect();
                if options.is_empty() {
                    return Err(rejected());
                }
                conjuncts.push(options);
            }
            Goal(expand(&conjuncts, distinct.then_some(Slot::Second)))
        }
        // One big conjunction over every permitted pair.
        (Quantifier::All, Quantifier::The | Quantifier::All) => {
            let literals: Vec<Literal> = movables
                .iter()
                .cartesian_product(&relatables)
                .filter(|(m, r)| permitted(m, r))
                .map(|(m, r)| Literal::spatial(relation, *m, *r))
                .collect();
            if literals.is_empty() {
                return Err(rejected());
            }
            Goal(vec![Conjunction(literals)])
        }
        // Every relatable served: the dual construction.
        (Quantifier::Any | Quantifier::The, Quantifier::All) => {
            let mut conjuncts: Vec<Vec<Literal>> = Vec::with_capacity(relatables.len());
            for r in &relatables {
                let options: Vec<Literal> = movables
                    .iter()
                    .filter(|m| permitted(m, r))
                    .map(|m| Literal::spatial(relation, *m, *r))
                    .collect();
                if options.is_empty() {
                    return Err(rejected());
                }
                conjuncts.push(options);
            }
            Goal(expand(&conjuncts, distinct.then_some(Slot::First)))
        }
        // Existential on both sides: a flat disjunction of single pairs.
        (Quantifier::Any | Quantifier::The, Quantifier::Any | Quantifier::The) => {
            let disjuncts: Vec<Conjunction> = movables
                .iter()
                .cartesian_product(&relatables)
                .filter(|(m, r)| permitted(m, r))
                .map(|(m, r)| Conjunction(vec![Literal::spatial(relation, *m, *r)]))
                .collect();
            Goal(disjuncts)
        }
    };

    if goal.is_empty() {
        return Err(rejected());
    }
    debug!(target: "interpret", "compiled goal: {goal}");
    Ok(goal)
}

/// Depth-first expansion of a conjunction of disjunctions into DNF.
///
/// Each complete assignment becomes one conjunction; with a `distinct` slot,
/// assignments where two literals share that argument are discarded at leaf
/// time (two objects cannot occupy one exclusive destination, nor one object
/// two of them).
fn expand(conjuncts: &[Vec<Literal>], distinct: Option<Slot>) -> Vec<Conjunction> {
    fn descend(
        conjuncts: &[Vec<Literal>],
        distinct: Option<Slot>,
        chosen: &mut Vec<Literal>,
        out: &mut Vec<Conjunction>,
    ) {
        let Some((options, rest)) = conjuncts.split_first() else {
            if distinct_ok(chosen, distinct) {
                out.push(Conjunction(chosen.clone()));
            }
            return;
        };
        for literal in options {
            chosen.push(literal.clone());
            descend(rest, distinct, chosen, out);
            chosen.pop();
        }
    }

    let mut out = Vec::new();
    descend(conjuncts, distinct, &mut Vec::with_capacity(conjuncts.len()), &mut out);
    out
}

fn distinct_ok(chosen: &[Literal], distinct: Option<Slot>) -> bool {
    let Some(slot) = distinct else {
        return true;
    };
    chosen
        .iter()
        .filter_map(|lit| match &lit.pred {
            Pred::Spatial { a, b, .. } => Some(match slot {
                Slot::First => a.as_str(),
                Slot::Second => b.as_str(),
            }),
            Pred::Holding(_) => None,
        })
        .all_unique()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::world::{Color, Size};

    /// Two balls (e large white, f small black), two boxes (k large yellow,
    /// l small blue), one table (g).
    fn world() -> World {
        let objects: HashMap<Label, ObjectDef> = [
            ("e", ObjectDef::new(Form::Ball, Size::Large, Color::White)),
            ("f", ObjectDef::new(Form::Ball, Size::Small, Color::Black)),
            ("g", ObjectDef::new(Form::Table, Size::Large, Color::Blue)),
            ("k", ObjectDef::new(Form::Box, Size::Large, Color::Yellow)),
            ("l", ObjectDef::new(Form::Box, Size::Small, Color::Blue)),
        ]
        .into_iter()
        .map(|(l, d)| (l.to_owned(), d))
        .collect();
        World::new(3, objects)
    }

    fn labels(ls: &[&str]) -> Vec<Label> {
        ls.iter().map(|l| (*l).to_owned()).collect()
    }

    fn request(
        movables: &[&str],
        qm: Quantifier,
        m_desc: ObjectDef,
        target: Option<(Relation, &[&str], Quantifier, ObjectDef)>,
    ) -> Request {
        Request {
            movables: labels(movables),
            q_movable: qm,
            movable_desc: m_desc,
            target: target.map(|(relation, rs, qr, desc)| Target {
                relation,
                relatables: labels(rs),
                q_relatable: qr,
                desc,
            }),
        }
    }

    #[test]
    fn take_compiles_to_holding_disjuncts() {
        let world = world();
        let req =
            request(&["e", "f"], Quantifier::Any, ObjectDef::of_form(Form::Ball), None);
        let goal = compile(&req, &world).unwrap();
        assert_eq!(goal.to_string(), "(holding(e)) | (holding(f))");
    }

    #[test]
    fn taking_all_of_several_is_rejected() {
        let world = world();
        let req = request(&["e", "f"], Quantifier::All, ObjectDef::of_form(Form::Ball), None);
        assert_eq!(compile(&req, &world), Err(GoalError::HoldSeveral));
    }

    #[test]
    fn the_floor_is_not_movable() {
        let world = world();
        let req = request(&[FLOOR], Quantifier::The, ObjectDef::of_form(Form::Floor), None);
        assert_eq!(compile(&req, &world), Err(GoalError::FloorNotMovable));
    }

    #[test]
    fn flat_pairs_filter_by_physics() {
        let world = world();
        // "put a ball in a box": the large ball fits only the large box.
        let req = request(
            &["e", "f"],
            Quantifier::Any,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["k", "l"], Quantifier::Any, ObjectDef::of_form(Form::Box))),
        );
        let goal = compile(&req, &world).unwrap();
        assert_eq!(
            goal.to_string(),
            "(inside(e,k)) | (inside(f,k)) | (inside(f,l))"
        );
    }

    #[test]
    fn impossible_pairs_surface_the_violated_law() {
        let world = world();
        // "put the box on the ball"
        let req = request(
            &["k"],
            Quantifier::The,
            ObjectDef::of_form(Form::Box),
            Some((Relation::OnTop, &["e"], Quantifier::The, ObjectDef::of_form(Form::Ball))),
        );
        assert_eq!(compile(&req, &world), Err(GoalError::Law(Law::BallSupport)));
    }

    #[test]
    fn inside_requires_a_box_destination() {
        let world = world();
        let req = request(
            &["e"],
            Quantifier::The,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["g"], Quantifier::The, ObjectDef::of_form(Form::Table))),
        );
        assert_eq!(compile(&req, &world), Err(GoalError::Law(Law::InsideNonBox)));
    }

    #[test]
    fn all_into_one_box_is_rejected() {
        let world = world();
        // "put all balls in the yellow box"
        let req = request(
            &["e", "f"],
            Quantifier::All,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["k"], Quantifier::The, ObjectDef::of_form(Form::Box))),
        );
        assert_eq!(compile(&req, &world), Err(GoalError::SingleContainer));
    }

    #[test]
    fn all_onto_the_floor_is_one_conjunction() {
        let world = world();
        let req = request(
            &["e", "f"],
            Quantifier::All,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::OnTop, &[FLOOR], Quantifier::The, ObjectDef::of_form(Form::Floor))),
        );
        let goal = compile(&req, &world).unwrap();
        assert_eq!(goal.to_string(), "(ontop(e,floor) & ontop(f,floor))");
    }

    #[test]
    fn universal_expansion_guards_duplicate_destinations() {
        let world = world();
        // "put all balls in a box": f fits either box, e only the large one,
        // and they may not share.
        let req = request(
            &["e", "f"],
            Quantifier::All,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["k", "l"], Quantifier::Any, ObjectDef::of_form(Form::Box))),
        );
        let goal = compile(&req, &world).unwrap();
        assert_eq!(goal.to_string(), "(inside(e,k) & inside(f,l))");
    }

    #[test]
    fn universal_referent_uses_the_dual_form() {
        let world = world();
        // "put a ball in all boxes" with two balls and two boxes: each box
        // gets a distinct ball, and e does not fit l.
        let req = request(
            &["e", "f"],
            Quantifier::Any,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["k", "l"], Quantifier::All, ObjectDef::of_form(Form::Box))),
        );
        let goal = compile(&req, &world).unwrap();
        assert_eq!(goal.to_string(), "(inside(e,k) & inside(f,l))");
    }

    #[test]
    fn too_few_movables_for_a_universal_referent() {
        let world = world();
        let req = request(
            &["f"],
            Quantifier::Any,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::Inside, &["k", "l"], Quantifier::All, ObjectDef::of_form(Form::Box))),
        );
        assert_eq!(compile(&req, &world), Err(GoalError::TooFewMovables));
    }

    #[test]
    fn overlapping_universal_descriptions_are_self_related() {
        let world = world();
        let req = request(
            &["e", "f"],
            Quantifier::All,
            ObjectDef::of_form(Form::Ball),
            Some((Relation::LeftOf, &["e", "f"], Quantifier::All, ObjectDef::of_form(Form::Ball))),
        );
        assert_eq!(compile(&req, &world), Err(GoalError::SelfRelated(Relation::LeftOf)));
    }

    #[test]
    fn literal_satisfaction() {
        let world = world();
        let state = State::new(
            vec![vec!["k".into(), "f".into()], vec!["g".into()], vec!["e".into()]],
            0,
            None,
        );
        assert!(Literal::spatial(Relation::Inside, "f", "k").holds(&state, &world));
        assert!(Literal::spatial(Relation::OnTop, "k", FLOOR).holds(&state, &world));
        assert!(Literal::spatial(Relation::Above, "f", FLOOR).holds(&state, &world));
        assert!(Literal::spatial(Relation::LeftOf, "f", "e").holds(&state, &world));
        assert!(Literal::spatial(Relation::Beside, "g", "e").holds(&state, &world));
        assert!(Literal::spatial(Relation::Under, "k", "f").holds(&state, &world));
        assert!(!Literal::spatial(Relation::OnTop, "f", "g").holds(&state, &world));
        assert!(!Literal::holding("e").holds(&state, &world));

        // Polarity flips the verdict.
        let mut negated = Literal::spatial(Relation::OnTop, "f", "g");
        negated.polarity = false;
        assert!(negated.holds(&state, &world));
    }
}
