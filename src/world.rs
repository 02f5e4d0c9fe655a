//! World model: object definitions, the mutable stack configuration, and the
//! primitive arm actions.
//!
//! A session owns one immutable [`World`] (object definitions and the column
//! count) and one live [`State`]. Planning never touches the live state; the
//! search clones configurations per node and the clones carry no reference to
//! the definitions, so structural equality and hashing stay cheap.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use anyhow::{Context, bail, ensure};
use enum_iterator::Sequence;
use enum_map::Enum;
use serde::{Deserialize, Serialize};

use crate::physics::{self, Relation};

/// Opaque object identifier. The ground is the reserved label [`FLOOR`],
/// which is never stored in a stack.
pub type Label = String;

pub const FLOOR: &str = "floor";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(Sequence)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    Ball,
    Box,
    Brick,
    Pyramid,
    Plank,
    Table,
    Floor,
    /// Wildcard used by descriptors ("the thing"); never a concrete object.
    #[serde(rename = "anyform")]
    Any,
}

impl Form {
    /// Canonical surface word; the wildcard reads as "object".
    pub const fn word(self, plural: bool) -> &'static str {
        match (self, plural) {
            (Form::Ball, false) => "ball",
            (Form::Ball, true) => "balls",
            (Form::Box, false) => "box",
            (Form::Box, true) => "boxes",
            (Form::Brick, false) => "brick",
            (Form::Brick, true) => "bricks",
            (Form::Pyramid, false) => "pyramid",
            (Form::Pyramid, true) => "pyramids",
            (Form::Plank, false) => "plank",
            (Form::Plank, true) => "planks",
            (Form::Table, false) => "table",
            (Form::Table, true) => "tables",
            (Form::Floor, _) => "floor",
            (Form::Any, false) => "object",
            (Form::Any, true) => "objects",
        }
    }

    /// Does a descriptor with this form accept an object of form `other`?
    ///
    /// The floor only matches when asked for explicitly; the wildcard matches
    /// everything else.
    pub fn admits(self, other: Form) -> bool {
        if other == Form::Floor {
            return self == Form::Floor;
        }
        self == Form::Any || self == other
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(Sequence)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Large,
    #[default]
    Unspecified,
}

impl Size {
    pub fn admits(self, other: Size) -> bool {
        self == Size::Unspecified || self == other
    }

    pub const fn word(self) -> Option<&'static str> {
        match self {
            Size::Small => Some("small"),
            Size::Large => Some("large"),
            Size::Unspecified => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(Sequence)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    #[default]
    Unspecified,
}

impl Color {
    pub fn admits(self, other: Color) -> bool {
        self == Color::Unspecified || self == other
    }

    pub const fn word(self) -> Option<&'static str> {
        match self {
            Color::White => Some("white"),
            Color::Black => Some("black"),
            Color::Red => Some("red"),
            Color::Green => Some("green"),
            Color::Blue => Some("blue"),
            Color::Yellow => Some("yellow"),
            Color::Unspecified => None,
        }
    }
}

/// An object definition, or a descriptor pattern over one.
///
/// Concrete world objects carry a definite form and (for everything but the
/// floor) a definite size and color. Parsed noun phrases reuse the same shape
/// with `Unspecified`/`Any` standing in for omitted attributes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct ObjectDef {
    pub form: Form,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub color: Color,
}

pub const FLOOR_DEF: ObjectDef =
    ObjectDef { form: Form::Floor, size: Size::Unspecified, color: Color::Unspecified };

impl ObjectDef {
    pub const fn new(form: Form, size: Size, color: Color) -> Self {
        ObjectDef { form, size, color }
    }

    pub const fn of_form(form: Form) -> Self {
        ObjectDef { form, size: Size::Unspecified, color: Color::Unspecified }
    }

    /// Does this descriptor accept the concrete definition `other`?
    pub fn admits(&self, other: &ObjectDef) -> bool {
        self.form.admits(other.form)
            && self.size.admits(other.size)
            && self.color.admits(other.color)
    }

    /// True when both descriptors pin down the same value for at least one
    /// attribute. Wildcards and `Unspecified` never count as defined.
    pub fn shares_defined_attribute(&self, other: &ObjectDef) -> bool {
        let form = self.form != Form::Any && other.form != Form::Any && self.form == other.form;
        let size = self.size != Size::Unspecified && self.size == other.size;
        let color = self.color != Color::Unspecified && self.color == other.color;
        form || size || color
    }
}

/// Immutable session data: the object definitions and the column count.
#[derive(Clone, Debug)]
pub struct World {
    objects: HashMap<Label, ObjectDef>,
    columns: usize,
}

impl World {
    pub fn new(columns: usize, objects: HashMap<Label, ObjectDef>) -> Self {
        World { objects, columns }
    }

    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Definition for a label; the floor resolves to its fixed definition.
    pub fn def(&self, label: &str) -> Option<&ObjectDef> {
        if label == FLOOR { Some(&FLOOR_DEF) } else { self.objects.get(label) }
    }

    pub fn matches(&self, label: &str, descriptor: &ObjectDef) -> bool {
        self.def(label).is_some_and(|def| descriptor.admits(def))
    }

    /// All object labels (the floor is not included).
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(Label::as_str)
    }

    /// Is `a` permitted in relation `rel` to `b`? See [`physics::check`].
    pub fn permits(&self, a: &str, b: &str, rel: Relation) -> bool {
        self.check(a, b, rel).is_ok()
    }

    /// As [`World::permits`], but reporting the violated rule on rejection.
    pub fn check(&self, a: &str, b: &str, rel: Relation) -> Result<(), physics::Law> {
        if a == b {
            return Err(physics::Law::SelfRelation);
        }
        let (Some(a), Some(b)) = (self.def(a), self.def(b)) else {
            return Err(physics::Law::SelfRelation);
        };
        physics::check(a, b, rel)
    }
}

/// Primitive arm actions, in the order the successor function tries them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(Sequence, Enum)]
pub enum Action {
    Left,
    Right,
    Pick,
    Drop,
}

impl Action {
    pub const fn token(self) -> char {
        match self {
            Action::Left => 'l',
            Action::Right => 'r',
            Action::Pick => 'p',
            Action::Drop => 'd',
        }
    }

    pub const fn from_token(c: char) -> Option<Action> {
        match c {
            'l' => Some(Action::Left),
            'r' => Some(Action::Right),
            'p' => Some(Action::Pick),
            'd' => Some(Action::Drop),
            _ => None,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// The mutable part of the world: stacks, arm column, held object.
///
/// Equality and hashing are structural over all three fields; the search's
/// closed set relies on this.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct State {
    /// Columns of labels, bottom to top.
    pub stacks: Vec<Vec<Label>>,
    pub arm: usize,
    pub holding: Option<Label>,
}

impl State {
    pub fn new(stacks: Vec<Vec<Label>>, arm: usize, holding: Option<Label>) -> Self {
        State { stacks, arm, holding }
    }

    pub fn top(&self, column: usize) -> Option<&str> {
        self.stacks.get(column)?.last().map(Label::as_str)
    }

    /// `(column, height)` of a stacked label. Held objects and the floor have
    /// no position.
    pub fn find(&self, label: &str) -> Option<(usize, usize)> {
        self.stacks.iter().enumerate().find_map(|(col, stack)| {
            stack.iter().position(|l| l == label).map(|height| (col, height))
        })
    }

    /// Every label present: all stacked objects plus the held one.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stacks.iter().flatten().map(Label::as_str).chain(self.holding.as_deref())
    }

    pub fn is_legal(&self, action: Action, world: &World) -> bool {
        match action {
            Action::Left => self.arm > 0,
            Action::Right => self.arm + 1 < self.stacks.len(),
            Action::Pick => self.holding.is_none() && self.top(self.arm).is_some(),
            Action::Drop => match &self.holding {
                None => false,
                Some(held) => match self.top(self.arm) {
                    None => world.permits(held, FLOOR, Relation::OnTop),
                    Some(top) => {
                        world.permits(held, top, Relation::OnTop)
                            || world.permits(held, top, Relation::Inside)
                    }
                },
            },
        }
    }

    /// Applies a legal action in place.
    pub fn apply(&mut self, action: Action, world: &World) -> anyhow::Result<()> {
        ensure!(self.is_legal(action, world), "illegal action '{action}' (arm at {})", self.arm);
        match action {
            Action::Left => self.arm -= 1,
            Action::Right => self.arm += 1,
            Action::Pick => {
                self.holding = self.stacks[self.arm].pop();
            }
            Action::Drop => {
                let held = self.holding.take().expect("drop is legal, so something is held");
                self.stacks[self.arm].push(held);
            }
        }
        Ok(())
    }

    /// The state one legal action away, or `None` when the action is illegal.
    pub fn successor(&self, action: Action, world: &World) -> Option<State> {
        self.is_legal(action, world).then(|| {
            let mut next = self.clone();
            next.apply(action, world).expect("legality was just checked");
            next
        })
    }

    /// Checks the configuration invariants: arm bounds, label uniqueness,
    /// known labels, holding/stack exclusivity, and the stacking laws for
    /// every adjacency (permitted as ontop or as box containment).
    pub fn validate(&self, world: &World) -> anyhow::Result<()> {
        ensure!(
            self.stacks.len() == world.columns(),
            "state has {} columns, world expects {}",
            self.stacks.len(),
            world.columns()
        );
        ensure!(self.arm < self.stacks.len(), "arm at {} is out of range", self.arm);

        let mut seen: HashMap<&str, (usize, usize)> = HashMap::new();
        for (col, stack) in self.stacks.iter().enumerate() {
            for (height, label) in stack.iter().enumerate() {
                ensure!(label != FLOOR, "the floor cannot be stacked");
                world.def(label).with_context(|| format!("unknown label '{label}'"))?;
                if let Some((c, h)) = seen.insert(label, (col, height)) {
                    bail!("label '{label}' appears at {col}:{height} and {c}:{h}");
                }
            }
        }
        if let Some(held) = &self.holding {
            ensure!(held != FLOOR, "the floor cannot be held");
            world.def(held).with_context(|| format!("unknown held label '{held}'"))?;
            ensure!(!seen.contains_key(held.as_str()), "held label '{held}' is also stacked");
        }

        for stack in &self.stacks {
            for pair in stack.windows(2) {
                let (lower, upper) = (&pair[0], &pair[1]);
                if !world.permits(upper, lower, Relation::OnTop)
                    && !world.permits(upper, lower, Relation::Inside)
                {
                    bail!("'{upper}' cannot rest on '{lower}'");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assertables::{assert_all, assert_contains};
    use enum_iterator::all;
    use itertools::Itertools;

    use super::*;

    fn demo() -> (World, State) {
        let objects = [
            ("a", ObjectDef::new(Form::Ball, Size::Small, Color::White)),
            ("e", ObjectDef::new(Form::Box, Size::Large, Color::Yellow)),
        ]
        .into_iter()
        .map(|(l, d)| (l.to_owned(), d))
        .collect();
        let world = World::new(3, objects);
        let state = State::new(vec![vec!["e".to_owned()], vec![], vec!["a".to_owned()]], 0, None);
        (world, state)
    }

    #[test]
    fn descriptor_matching() {
        let (world, _) = demo();
        let any = ObjectDef::of_form(Form::Any);
        assert!(world.matches("a", &any));
        assert!(world.matches("e", &any));
        // The floor only matches an explicit floor descriptor.
        assert!(!world.matches(FLOOR, &any));
        assert!(world.matches(FLOOR, &ObjectDef::of_form(Form::Floor)));

        let white = ObjectDef::new(Form::Any, Size::Unspecified, Color::White);
        assert!(world.matches("a", &white));
        assert!(!world.matches("e", &white));
    }

    #[test]
    fn shared_attributes() {
        let ball = ObjectDef::of_form(Form::Ball);
        let large_ball = ObjectDef::new(Form::Ball, Size::Large, Color::Unspecified);
        let large_box = ObjectDef::new(Form::Box, Size::Large, Color::Unspecified);
        assert!(ball.shares_defined_attribute(&large_ball));
        assert!(large_ball.shares_defined_attribute(&large_box));
        assert!(!ball.shares_defined_attribute(&large_box));
        // Wildcards never collide.
        let any = ObjectDef::of_form(Form::Any);
        assert!(!any.shares_defined_attribute(&any));
    }

    #[test]
    fn legal_actions_at_start() {
        let (world, state) = demo();
        let legal = all::<Action>().filter(|&a| state.is_legal(a, &world)).collect_vec();
        // Arm at the left edge over a stack, holding nothing.
        assert_eq!(legal, vec![Action::Right, Action::Pick]);
    }

    #[test]
    fn pick_and_drop_preserve_labels() {
        let (world, mut state) = demo();
        let before = state.labels().map(str::to_owned).sorted().collect_vec();

        state.apply(Action::Right, &world).unwrap();
        state.apply(Action::Right, &world).unwrap();
        state.apply(Action::Pick, &world).unwrap();
        assert_eq!(state.holding.as_deref(), Some("a"));
        assert_contains!(before, &"a".to_owned());

        state.apply(Action::Left, &world).unwrap();
        state.apply(Action::Left, &world).unwrap();
        state.apply(Action::Drop, &world).unwrap();
        assert_eq!(state.stacks[0], vec!["e".to_owned(), "a".to_owned()]);

        let after = state.labels().map(str::to_owned).sorted().collect_vec();
        assert_eq!(before, after);
        state.validate(&world).unwrap();
    }

    #[test]
    fn drop_respects_the_laws() {
        let (world, state) = demo();
        // Pick up the box and try to drop it onto the ball.
        let mut state = State::new(state.stacks, 2, Some("e".to_owned()));
        state.stacks[0].clear();
        assert!(!state.is_legal(Action::Drop, &world));
        // Over the empty column it may go to the floor.
        state.arm = 1;
        assert!(state.is_legal(Action::Drop, &world));
    }

    #[test]
    fn successors_leave_the_source_untouched() {
        let (world, state) = demo();
        let copy = state.clone();
        let succs = all::<Action>().filter_map(|a| state.successor(a, &world)).collect_vec();
        assert_eq!(state, copy);
        assert_all!(succs.iter(), |s: &State| s.validate(&world).is_ok());
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_stacking() {
        let (world, _) = demo();
        let dup = State::new(vec![vec!["a".into()], vec!["a".into()], vec![]], 0, None);
        assert!(dup.validate(&world).is_err());

        // A box resting on a ball violates the support laws.
        let bad = State::new(vec![vec!["a".into(), "e".into()], vec![], vec![]], 0, None);
        assert!(bad.validate(&world).is_err());

        // A ball inside a box is a legal adjacency.
        let ok = State::new(vec![vec!["e".into(), "a".into()], vec![], vec![]], 0, None);
        ok.validate(&world).unwrap();
    }
}
