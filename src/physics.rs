//! The stacking and containment rulebook.
//!
//! [`check`] is a pure predicate over a pair of object definitions and a
//! spatial relation. The goal compiler consults it to filter impossible goal
//! literals (keeping the violated [`Law`] for its error message), and drop
//! legality consults it through [`crate::world::World::permits`].

use std::fmt::{Display, Formatter};

use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{Form, ObjectDef, Size};

/// The spatial relation vocabulary. `Display` renders the verbatim relation
/// names used in literals and error messages; [`Relation::phrase`] renders
/// the English surface form.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(Sequence)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    LeftOf,
    RightOf,
    Inside,
    OnTop,
    Under,
    Beside,
    Above,
}

impl Relation {
    pub const fn name(self) -> &'static str {
        match self {
            Relation::LeftOf => "leftof",
            Relation::RightOf => "rightof",
            Relation::Inside => "inside",
            Relation::OnTop => "ontop",
            Relation::Under => "under",
            Relation::Beside => "beside",
            Relation::Above => "above",
        }
    }

    pub const fn phrase(self) -> &'static str {
        match self {
            Relation::LeftOf => "left of",
            Relation::RightOf => "right of",
            Relation::Inside => "inside",
            Relation::OnTop => "on top of",
            Relation::Under => "under",
            Relation::Beside => "beside",
            Relation::Above => "above",
        }
    }

    /// Relations where one supporter can serve only one object at a time.
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Relation::OnTop | Relation::Inside)
    }

    /// Surface phrases the lexer accepts, longest first.
    pub const fn phrases(self) -> &'static [&'static str] {
        match self {
            Relation::LeftOf => &["to the left of", "left of"],
            Relation::RightOf => &["to the right of", "right of"],
            Relation::Inside => &["inside", "into", "in"],
            Relation::OnTop => &["on top of", "onto", "upon", "on"],
            Relation::Under => &["under", "below"],
            Relation::Beside => &["beside", "next to"],
            Relation::Above => &["above"],
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A violated stacking law. The display strings are the user-facing
/// explanations surfaced when a command is physically impossible.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Law {
    #[error("An object cannot be related to itself.")]
    SelfRelation,
    #[error("Objects can only be inside of boxes.")]
    InsideNonBox,
    #[error("It does not fit inside that box.")]
    InsideTooBig,
    #[error("Objects go inside boxes, not on top of them.")]
    OnTopOfBox,
    #[error("Balls cannot support other objects.")]
    BallSupport,
    #[error("A ball can only rest in a box or on the floor.")]
    BallNeedsContainer,
    #[error("A small object cannot support a large one.")]
    SmallSupportingLarge,
    #[error("A small box cannot rest on a small brick or pyramid.")]
    BoxOnBrittleBase,
    #[error("A large box cannot rest on a large pyramid.")]
    LargeBoxOnPyramid,
    #[error("Nothing can be under a ball.")]
    UnderBall,
}

/// Is an object `a` permitted in relation `rel` to an object `b`?
///
/// Arguments are positional, matching the literal `rel(a, b)`: for `ontop`,
/// `inside` and `above` the first argument is the one resting higher; for
/// `under` it is the one buried lower. Self-relation is rejected by the
/// label-aware wrapper, not here.
pub fn check(a: &ObjectDef, b: &ObjectDef, rel: Relation) -> Result<(), Law> {
    match rel {
        Relation::Inside => {
            if b.form != Form::Box {
                return Err(Law::InsideNonBox);
            }
            if a.size == Size::Large && b.size == Size::Small {
                return Err(Law::InsideTooBig);
            }
            // Same-size boxes, pyramids and planks fill the box exactly and
            // leave no room to get them in.
            if a.size == b.size && matches!(a.form, Form::Box | Form::Pyramid | Form::Plank) {
                return Err(Law::InsideTooBig);
            }
            Ok(())
        }
        Relation::OnTop => {
            if b.form == Form::Box {
                return Err(Law::OnTopOfBox);
            }
            if b.form == Form::Ball {
                return Err(Law::BallSupport);
            }
            if a.form == Form::Ball && b.form != Form::Floor {
                return Err(Law::BallNeedsContainer);
            }
            if a.size == Size::Large && b.size == Size::Small {
                return Err(Law::SmallSupportingLarge);
            }
            if a.form == Form::Box
                && a.size == Size::Small
                && b.size == Size::Small
                && matches!(b.form, Form::Brick | Form::Pyramid)
            {
                return Err(Law::BoxOnBrittleBase);
            }
            if a.form == Form::Box
                && a.size == Size::Large
                && b.form == Form::Pyramid
                && b.size == Size::Large
            {
                return Err(Law::LargeBoxOnPyramid);
            }
            Ok(())
        }
        Relation::Above => {
            if b.form == Form::Ball {
                return Err(Law::BallSupport);
            }
            if a.size == Size::Large && b.size == Size::Small {
                return Err(Law::SmallSupportingLarge);
            }
            Ok(())
        }
        Relation::Under => {
            if a.form == Form::Ball {
                return Err(Law::UnderBall);
            }
            Ok(())
        }
        // Satisfaction is positional, not physical.
        Relation::LeftOf | Relation::RightOf | Relation::Beside => Ok(()),
    }
}
