//! All-parses recursive descent over the token stream.
//!
//! Attachment of relative clauses is genuinely ambiguous ("put the white
//! ball in a box on the floor"), so every production returns *all* ways to
//! read a span. A command counts only when it consumes the whole utterance;
//! the caller receives the distinct complete parses in discovery order.

use crate::{
    grammar::{
        Command, Entity, Location, ObjectNode,
        lexer::{Token, Verb},
    },
    world::ObjectDef,
};

/// Every distinct complete parse of the token stream.
pub fn parse(tokens: &[Token]) -> Vec<Command> {
    let parser = Parser { tokens };
    let mut commands = Vec::new();
    let end = tokens.len();

    match parser.at(0) {
        Some(Token::Verb(Verb::Take)) => {
            for (entity, pos) in parser.entity(1) {
                if pos == end {
                    commands.push(Command::Take(entity));
                }
            }
        }
        Some(Token::Verb(Verb::Put | Verb::Move)) => {
            if parser.at(1) == Some(Token::It) {
                for (location, pos) in parser.location(2) {
                    if pos == end {
                        commands.push(Command::PutHeld(location));
                    }
                }
            } else {
                for (entity, pos) in parser.entity(1) {
                    for (location, loc_end) in parser.location(pos) {
                        if loc_end == end {
                            commands.push(Command::Move(entity.clone(), location));
                        }
                    }
                }
            }
        }
        _ => {}
    }

    dedup(commands)
}

/// Parses a clarification answer: a bare (optionally quantified) noun
/// phrase such as "the black one" or "the ball that is in a box".
pub fn parse_answer(tokens: &[Token]) -> Vec<ObjectNode> {
    let parser = Parser { tokens };
    let start = usize::from(matches!(parser.at(0), Some(Token::Quant(_))));
    let nodes = parser
        .object(start)
        .into_iter()
        .filter_map(|(node, pos)| (pos == tokens.len()).then_some(node))
        .collect();
    dedup(nodes)
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

struct Parser<'a> {
    tokens: &'a [Token],
}

impl Parser<'_> {
    fn at(&self, pos: usize) -> Option<Token> {
        self.tokens.get(pos).copied()
    }

    fn entity(&self, pos: usize) -> Vec<(Entity, usize)> {
        let Some(Token::Quant(quantifier)) = self.at(pos) else {
            return Vec::new();
        };
        self.object(pos + 1)
            .into_iter()
            .map(|(object, end)| (Entity { quantifier, object }, end))
            .collect()
    }

    fn object(&self, pos: usize) -> Vec<(ObjectNode, usize)> {
        match self.atom(pos) {
            Some((descriptor, end)) => self.suffixes(ObjectNode::Leaf(descriptor), end),
            None => Vec::new(),
        }
    }

    /// `node` parsed up to `pos`; returns it as-is plus every extension by
    /// relative clauses (each clause may itself end at several positions).
    fn suffixes(&self, node: ObjectNode, pos: usize) -> Vec<(ObjectNode, usize)> {
        let mut out = vec![(node.clone(), pos)];
        let clause_start = if self.at(pos) == Some(Token::Glue) { pos + 1 } else { pos };
        for (location, end) in self.location(clause_start) {
            let qualified = ObjectNode::Qualified {
                head: Box::new(node.clone()),
                location: Box::new(location),
            };
            out.extend(self.suffixes(qualified, end));
        }
        out
    }

    /// `SIZE? COLOR? FORM`, attributes in either order, at most one of each.
    fn atom(&self, pos: usize) -> Option<(ObjectDef, usize)> {
        let mut size = None;
        let mut color = None;
        let mut i = pos;
        loop {
            match self.at(i) {
                Some(Token::Size(s)) if size.is_none() => {
                    size = Some(s);
                    i += 1;
                }
                Some(Token::Color(c)) if color.is_none() => {
                    color = Some(c);
                    i += 1;
                }
                Some(Token::Form(form)) => {
                    let descriptor =
                        ObjectDef::new(form, size.unwrap_or_default(), color.unwrap_or_default());
                    return Some((descriptor, i + 1));
                }
                _ => return None,
            }
        }
    }

    fn location(&self, pos: usize) -> Vec<(Location, usize)> {
        let Some(Token::Rel(relation)) = self.at(pos) else {
            return Vec::new();
        };
        self.entity(pos + 1)
            .into_iter()
            .map(|(entity, end)| (Location { relation, entity }, end))
            .collect()
    }
}
