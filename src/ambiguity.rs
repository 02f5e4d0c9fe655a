//! Clarification dialogue state.
//!
//! Two things can stall a command: the grammar may return several readings
//! (attachment ambiguity), or a "the" phrase may match several objects.
//! Either way a question goes out and the pipeline returns to the host; the
//! pending context lives in exactly three slots until the next utterance
//! either answers the question or starts something new.

use crate::{
    describe,
    grammar::{Command, ObjectNode, Quantifier},
    physics::Relation,
    resolve::{self, ResolveError},
    world::{Label, ObjectDef, State, World},
};

/// The three persistent slots between utterances. A successful plan, an
/// error, or a fresh command clears them.
#[derive(Debug, Default)]
pub struct PendingSlots {
    pub parses: Option<Vec<Command>>,
    pub resolution: Option<PendingResolution>,
    pub prompt: Option<String>,
}

impl PendingSlots {
    pub fn clear(&mut self) {
        *self = PendingSlots::default();
    }

    pub fn is_empty(&self) -> bool {
        self.parses.is_none() && self.resolution.is_none() && self.prompt.is_none()
    }
}

/// Which side of a command had the ambiguous "the" phrase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    Movable,
    Relatable,
}

/// A command suspended on a referent question: the preselected label sets,
/// their quantifiers and descriptors, and which side needs narrowing.
#[derive(Clone, Debug)]
pub struct PendingResolution {
    pub movables: Vec<Label>,
    pub q_movable: Quantifier,
    pub movable_desc: ObjectDef,
    pub target: Option<PendingTarget>,
    pub side: Side,
}

#[derive(Clone, Debug)]
pub struct PendingTarget {
    pub relation: Relation,
    pub relatables: Vec<Label>,
    pub q_relatable: Quantifier,
    pub desc: ObjectDef,
}

impl PendingResolution {
    pub fn ambiguous_set(&self) -> &[Label] {
        match self.side {
            Side::Movable => &self.movables,
            Side::Relatable => {
                &self.target.as_ref().expect("a relatable question implies a target").relatables
            }
        }
    }

    fn with_ambiguous_set(&self, labels: Vec<Label>) -> PendingResolution {
        let mut narrowed = self.clone();
        match narrowed.side {
            Side::Movable => narrowed.movables = labels,
            Side::Relatable => {
                narrowed
                    .target
                    .as_mut()
                    .expect("a relatable question implies a target")
                    .relatables = labels;
            }
        }
        narrowed
    }

    pub fn question(&self, world: &World) -> String {
        describe::referent_prompt(self.ambiguous_set(), world)
    }
}

/// What a clarification answer did to a pending resolution.
#[derive(Debug)]
pub enum Clarified {
    /// Narrowed to a single referent; the command can proceed.
    Settled(PendingResolution),
    /// Narrowed, but still several candidates; ask again.
    StillAmbiguous(PendingResolution),
    /// The answer matched none of the offered candidates.
    NotAnOption,
}

/// Interprets an answer phrase against the pending candidate set.
///
/// The phrase is resolved against the full pool (so "the ball in the box"
/// can mention objects outside the candidates), then intersected with the
/// candidates on offer.
pub fn clarify(
    pending: &PendingResolution,
    answers: &[ObjectNode],
    state: &State,
    world: &World,
) -> Clarified {
    let pool = resolve::pool(state);
    for node in answers {
        let matches = match resolve::resolve(node, &pool, state, world) {
            Ok(matches) => matches,
            Err(ResolveError::NoMatch(_)) => continue,
        };
        let narrowed: Vec<Label> =
            pending.ambiguous_set().iter().filter(|l| matches.contains(l)).cloned().collect();
        match narrowed.len() {
            0 => continue,
            1 => return Clarified::Settled(pending.with_ambiguous_set(narrowed)),
            _ => return Clarified::StillAmbiguous(pending.with_ambiguous_set(narrowed)),
        }
    }
    Clarified::NotAnOption
}

/// The numbered prompt offered when the grammar finds several readings.
pub fn parse_prompt(parses: &[Command]) -> String {
    let mut lines = vec!["I can read that in more than one way:".to_owned()];
    for (i, parse) in parses.iter().enumerate() {
        lines.push(format!("  {}: {parse}", i + 1));
    }
    lines.push(format!("Answer with a number between 1 and {}.", parses.len()));
    lines.join("\n")
}

/// A reply selects a pending parse when its first whitespace-delimited token
/// is a positive integer within range.
pub fn selection(utterance: &str, count: usize) -> Option<usize> {
    let first = utterance.split_whitespace().next()?;
    let n: usize = first.parse().ok()?;
    (1..=count).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{lexer::lex, parser},
        world::{Color, Form, Size},
    };

    fn fixture() -> (World, State) {
        let objects = [
            ("e", ObjectDef::new(Form::Ball, Size::Large, Color::White)),
            ("f", ObjectDef::new(Form::Ball, Size::Small, Color::Black)),
            ("k", ObjectDef::new(Form::Box, Size::Large, Color::Yellow)),
        ]
        .into_iter()
        .map(|(l, d)| (l.to_owned(), d))
        .collect();
        let world = World::new(3, objects);
        let state = State::new(
            vec![vec!["e".into()], vec!["k".into()], vec!["f".into()]],
            0,
            None,
        );
        (world, state)
    }

    fn pending() -> PendingResolution {
        PendingResolution {
            movables: vec!["e".to_owned(), "f".to_owned()],
            q_movable: Quantifier::The,
            movable_desc: ObjectDef::of_form(Form::Ball),
            target: None,
            side: Side::Movable,
        }
    }

    fn answers(words: &str) -> Vec<ObjectNode> {
        parser::parse_answer(&lex(words).unwrap())
    }

    #[test]
    fn a_description_settles_the_question() {
        let (world, state) = fixture();
        let pending = pending();
        match clarify(&pending, &answers("the black one"), &state, &world) {
            Clarified::Settled(settled) => {
                assert_eq!(settled.movables, vec!["f".to_owned()]);
                assert_eq!(settled.side, Side::Movable);
            }
            other => panic!("expected a settled clarification, got {other:?}"),
        }
    }

    #[test]
    fn unoffered_objects_are_not_options() {
        let (world, state) = fixture();
        let pending = pending();
        // The box exists, but was never offered.
        assert!(matches!(
            clarify(&pending, &answers("the yellow box"), &state, &world),
            Clarified::NotAnOption
        ));
        assert!(matches!(
            clarify(&pending, &answers("the green pyramid"), &state, &world),
            Clarified::NotAnOption
        ));
    }

    #[test]
    fn an_ambiguous_answer_narrows_and_reasks() {
        let (world, state) = fixture();
        let mut pending = pending();
        pending.movables.push("k".to_owned());
        // "the ball" still leaves two of the three.
        match clarify(&pending, &answers("the ball"), &state, &world) {
            Clarified::StillAmbiguous(narrowed) => {
                assert_eq!(narrowed.movables, vec!["e".to_owned(), "f".to_owned()]);
            }
            other => panic!("expected a narrowed question, got {other:?}"),
        }
    }

    #[test]
    fn clarification_can_use_spatial_clauses() {
        let (world, state) = fixture();
        let pending = pending();
        match clarify(&pending, &answers("the ball left of the box"), &state, &world) {
            Clarified::Settled(settled) => assert_eq!(settled.movables, vec!["e".to_owned()]),
            other => panic!("expected a settled clarification, got {other:?}"),
        }
    }

    #[test]
    fn questions_describe_the_candidates() {
        let (world, _) = fixture();
        let pending = pending();
        assert_eq!(pending.question(&world), "Do you mean the white ball or the black ball?");
    }

    #[test]
    fn numbered_selection() {
        assert_eq!(selection("2", 3), Some(2));
        assert_eq!(selection("1 please", 2), Some(1));
        assert_eq!(selection("0", 2), None);
        assert_eq!(selection("4", 3), None);
        assert_eq!(selection("two", 3), None);
        assert_eq!(selection("", 3), None);
    }

    #[test]
    fn parse_prompts_are_numbered() {
        let parses = parser::parse(&lex("put the white ball in a box on the floor").unwrap());
        let prompt = parse_prompt(&parses);
        assert!(prompt.contains("  1: "));
        assert!(prompt.contains("  2: "));
        assert!(prompt.ends_with("Answer with a number between 1 and 2."));
    }
}
