//! The command language: parse tree types, tokenization and parsing.
//!
//! The tree mirrors what the surface grammar can express, nothing more: a
//! command verb with an entity and/or a location, entities as quantified
//! objects, and objects as either a bare descriptor or a descriptor
//! restricted by a relative clause. `Display` renders a tree back to English
//! with an explicit "that is" before every relative clause, which is the
//! canonical form shown when several parses compete.

pub mod lexer;
pub mod parser;

use std::fmt::{Display, Formatter};

use derive_more::IsVariant;

use crate::{describe, physics::Relation, world::ObjectDef};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(IsVariant)]
pub enum Quantifier {
    The,
    Any,
    All,
}

impl Quantifier {
    pub const fn word(self) -> &'static str {
        match self {
            Quantifier::The => "the",
            Quantifier::Any => "any",
            Quantifier::All => "all",
        }
    }
}

impl Display for Quantifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.word())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// "take the ball"
    Take(Entity),
    /// "put it on the floor" (acts on the held object)
    PutHeld(Location),
    /// "move the ball into the box"
    Move(Entity, Location),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entity {
    pub quantifier: Quantifier,
    pub object: ObjectNode,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObjectNode {
    Leaf(ObjectDef),
    Qualified { head: Box<ObjectNode>, location: Box<Location> },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    pub relation: Relation,
    pub entity: Entity,
}

impl ObjectNode {
    /// The descriptor at the head of the phrase, relative clauses stripped.
    pub fn descriptor(&self) -> &ObjectDef {
        match self {
            ObjectNode::Leaf(desc) => desc,
            ObjectNode::Qualified { head, .. } => head.descriptor(),
        }
    }

    pub fn render(&self, plural: bool) -> String {
        match self {
            ObjectNode::Leaf(desc) => describe::phrase(desc, plural),
            ObjectNode::Qualified { head, location } => {
                let glue = if plural { "that are" } else { "that is" };
                format!("{} {glue} {location}", head.render(plural))
            }
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.quantifier, self.object.render(self.quantifier.is_all()))
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.relation.phrase(), self.entity)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Take(entity) => write!(f, "take {entity}"),
            Command::PutHeld(location) => write!(f, "put it {location}"),
            Command::Move(entity, location) => write!(f, "move {entity} {location}"),
        }
    }
}
