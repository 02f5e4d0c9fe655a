//! Reference resolution: from a noun-phrase tree to the labels matching it
//! in the current configuration.
//!
//! A leaf filters the candidate pool by its descriptor. A relative clause
//! first resolves its head, then keeps each candidate whose spatial
//! neighborhood (per relation, from the candidate's column and height)
//! contains a referent. An `all`-quantified referent additionally requires
//! that *every* matching label lies in the neighborhood, which is the
//! exclusion-region rule expressed positively.
//!
//! Results are sorted, so they never depend on pool ordering.

use thiserror::Error;

use crate::{
    grammar::{ObjectNode, Quantifier},
    physics::Relation,
    world::{FLOOR, Form, Label, State, World},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("There is no {0}.")]
    NoMatch(String),
}

/// The standard candidate pool: everything in play, plus the floor.
pub fn pool(state: &State) -> Vec<Label> {
    state.labels().map(str::to_owned).chain([FLOOR.to_owned()]).collect()
}

/// All labels from `pool` matching the phrase, sorted.
pub fn resolve(
    node: &ObjectNode,
    pool: &[Label],
    state: &State,
    world: &World,
) -> Result<Vec<Label>, ResolveError> {
    let matches = match node {
        ObjectNode::Leaf(descriptor) => {
            let mut matches: Vec<Label> =
                pool.iter().filter(|l| world.matches(l, descriptor)).cloned().collect();
            matches.sort();
            matches.dedup();
            matches
        }
        ObjectNode::Qualified { head, location } => {
            let candidates = resolve(head, pool, state, world)?;
            let referents = resolve(&location.entity.object, pool, state, world)?;
            let relation = location.relation;
            let universal = location.entity.quantifier == Quantifier::All;
            candidates
                .into_iter()
                .filter(|candidate| {
                    let hood = neighborhood(candidate, relation, state, world);
                    if universal {
                        referents.iter().all(|r| hood.contains(r))
                    } else {
                        referents.iter().any(|r| hood.contains(r))
                    }
                })
                .collect()
        }
    };

    if matches.is_empty() {
        return Err(ResolveError::NoMatch(node.render(false)));
    }
    Ok(matches)
}

/// The labels a candidate could be `relation` of, given where it stands.
///
/// Held objects stand nowhere and relate to nothing; the floor shows up as a
/// possible referent for `ontop` (at height zero) and `above`.
fn neighborhood(label: &str, relation: Relation, state: &State, world: &World) -> Vec<Label> {
    if label == FLOOR {
        // The floor is under everything that stands somewhere.
        return match relation {
            Relation::Under => state.stacks.iter().flatten().cloned().collect(),
            _ => Vec::new(),
        };
    }
    let Some((col, height)) = state.find(label) else {
        return Vec::new();
    };

    match relation {
        Relation::LeftOf => in_columns(state, |c| c > col),
        Relation::RightOf => in_columns(state, |c| c < col),
        Relation::Beside => in_columns(state, |c| c + 1 == col || c == col + 1),
        Relation::Above => {
            // Everything strictly below in the same column, and the ground.
            let mut below: Vec<Label> = state.stacks[col][..height].to_vec();
            below.push(FLOOR.to_owned());
            below
        }
        Relation::Under => state.stacks[col][height + 1..].to_vec(),
        Relation::Inside => match height.checked_sub(1).map(|h| &state.stacks[col][h]) {
            Some(beneath) if world.def(beneath).is_some_and(|d| d.form == Form::Box) => {
                vec![beneath.clone()]
            }
            _ => Vec::new(),
        },
        Relation::OnTop => match height.checked_sub(1) {
            Some(h) => vec![state.stacks[col][h].clone()],
            None => vec![FLOOR.to_owned()],
        },
    }
}

fn in_columns(state: &State, keep: impl Fn(usize) -> bool) -> Vec<Label> {
    state
        .stacks
        .iter()
        .enumerate()
        .filter(|(c, _)| keep(*c))
        .flat_map(|(_, stack)| stack.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::{
        grammar::{lexer::lex, parser::parse_answer},
        world::{Color, ObjectDef, Size},
    };

    /// Five columns:
    ///   0: e (large white ball)
    ///   1: g (large blue table), l (large red box)
    ///   2: (empty)
    ///   3: k (large yellow box), m (small blue box), f (small black ball)
    ///   4: (empty)
    fn fixture() -> (World, State) {
        let objects = [
            ("e", ObjectDef::new(Form::Ball, Size::Large, Color::White)),
            ("f", ObjectDef::new(Form::Ball, Size::Small, Color::Black)),
            ("g", ObjectDef::new(Form::Table, Size::Large, Color::Blue)),
            ("k", ObjectDef::new(Form::Box, Size::Large, Color::Yellow)),
            ("l", ObjectDef::new(Form::Box, Size::Large, Color::Red)),
            ("m", ObjectDef::new(Form::Box, Size::Small, Color::Blue)),
        ]
        .into_iter()
        .map(|(l, d)| (l.to_owned(), d))
        .collect();
        let world = World::new(5, objects);
        let state = State::new(
            vec![
                vec!["e".into()],
                vec!["g".into(), "l".into()],
                vec![],
                vec!["k".into(), "m".into(), "f".into()],
                vec![],
            ],
            0,
            None,
        );
        (world, state)
    }

    fn phrase(words: &str) -> ObjectNode {
        let nodes = parse_answer(&lex(words).unwrap());
        assert!(!nodes.is_empty(), "unparseable test phrase: {words}");
        nodes.into_iter().next().unwrap()
    }

    fn names(r: Result<Vec<Label>, ResolveError>) -> Vec<Label> {
        r.unwrap()
    }

    #[test]
    fn leaf_filters_by_attributes() {
        let (world, state) = fixture();
        let pool = pool(&state);
        assert_eq!(names(resolve(&phrase("a ball"), &pool, &state, &world)), vec!["e", "f"]);
        assert_eq!(names(resolve(&phrase("a blue object"), &pool, &state, &world)), vec!["g", "m"]);
        // The floor never matches a wildcard.
        let everything = names(resolve(&phrase("an object"), &pool, &state, &world));
        assert_eq!(everything, vec!["e", "f", "g", "k", "l", "m"]);
        assert_eq!(names(resolve(&phrase("the floor"), &pool, &state, &world)), vec![FLOOR]);
    }

    #[test]
    fn relative_clauses_constrain_by_position() {
        let (world, state) = fixture();
        let pool = pool(&state);
        // Boxes on the floor: k stands at height zero; l is on a table,
        // m is inside k.
        assert_eq!(
            names(resolve(&phrase("a box that is on the floor"), &pool, &state, &world)),
            vec!["k"]
        );
        // Containment goes through the `inside` neighborhood.
        assert_eq!(
            names(resolve(&phrase("a ball that is in a box"), &pool, &state, &world)),
            vec!["f"]
        );
        // Nested clauses recurse.
        assert_eq!(
            names(resolve(
                &phrase("a ball that is in a box that is in a box"),
                &pool,
                &state,
                &world
            )),
            vec!["f"]
        );
    }

    #[test]
    fn directional_neighborhoods() {
        let (world, state) = fixture();
        let pool = pool(&state);
        assert_eq!(
            names(resolve(&phrase("a box left of a ball"), &pool, &state, &world)),
            vec!["l"]
        );
        assert_eq!(
            names(resolve(&phrase("a ball right of a table"), &pool, &state, &world)),
            vec!["f"]
        );
        assert_eq!(
            names(resolve(&phrase("a box beside a ball"), &pool, &state, &world)),
            vec!["l"]
        );
        // Above/under work within a column; the floor counts for above.
        assert_eq!(
            names(resolve(&phrase("an object above a box"), &pool, &state, &world)),
            vec!["f", "m"]
        );
        assert_eq!(
            names(resolve(&phrase("a box under a ball"), &pool, &state, &world)),
            vec!["k", "m"]
        );
        assert_eq!(
            names(resolve(&phrase("an object above the floor"), &pool, &state, &world)),
            vec!["e", "f", "g", "k", "l", "m"]
        );
    }

    #[test]
    fn universal_referents_use_the_exclusion_region() {
        let (world, state) = fixture();
        let pool = pool(&state);
        // e (column 0) is left of every box; l (column 1) has none to its
        // left but is not left of m and k either.
        assert_eq!(
            names(resolve(&phrase("an object left of all boxes"), &pool, &state, &world)),
            vec!["e"]
        );
        // Under all balls: nothing is under both balls at once.
        let err = resolve(&phrase("a box under all balls"), &pool, &state, &world);
        assert_eq!(
            err,
            Err(ResolveError::NoMatch("box that is under all balls".to_owned()))
        );
    }

    #[test]
    fn empty_results_name_the_missing_thing() {
        let (world, state) = fixture();
        let pool = pool(&state);
        let err = resolve(&phrase("a green pyramid"), &pool, &state, &world);
        assert_eq!(err, Err(ResolveError::NoMatch("green pyramid".to_owned())));
    }

    #[test]
    fn results_do_not_depend_on_pool_order() {
        let (world, state) = fixture();
        let forward = pool(&state);
        let backward = forward.iter().rev().cloned().collect_vec();
        for words in ["a ball", "a box that is on the floor", "an object left of all boxes"] {
            let node = phrase(words);
            assert_eq!(
                resolve(&node, &forward, &state, &world),
                resolve(&node, &backward, &state, &world),
                "ordering changed the result for: {words}"
            );
        }
    }

    #[test]
    fn held_objects_relate_to_nothing() {
        let (world, mut state) = fixture();
        state.stacks[0].clear();
        state.holding = Some("e".to_owned());
        let pool = pool(&state);
        // f is right of every box, and the held e stands nowhere.
        let err = resolve(&phrase("a ball that is left of a box"), &pool, &state, &world);
        assert!(err.is_err());
    }
}
