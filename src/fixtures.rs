//! World sources: built-in demo worlds and TOML world files.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, ensure};
use serde::Deserialize;

use crate::world::{Color, FLOOR, Form, Label, ObjectDef, Size, State, World};

/// Names accepted by [`builtin`].
pub const DEMOS: &[&str] = &["small", "stacked"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldFile {
    #[serde(default)]
    columns: Option<usize>,
    arm: usize,
    #[serde(default)]
    holding: Option<Label>,
    stacks: Vec<Vec<Label>>,
    objects: HashMap<Label, ObjectDef>,
}

pub fn load(path: &Path) -> anyhow::Result<(World, State)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid world file {}", path.display()))
}

fn parse(text: &str) -> anyhow::Result<(World, State)> {
    let file: WorldFile = toml::from_str(text).context("not valid TOML")?;

    let columns = file.columns.unwrap_or(file.stacks.len());
    ensure!(columns > 0, "a world needs at least one column");
    ensure!(
        columns == file.stacks.len(),
        "columns is {columns} but {} stacks are given",
        file.stacks.len()
    );
    for (label, def) in &file.objects {
        ensure!(label != FLOOR, "'{FLOOR}' is a reserved label");
        ensure!(
            !matches!(def.form, Form::Floor | Form::Any),
            "object '{label}' needs a concrete form"
        );
        ensure!(def.size != Size::Unspecified, "object '{label}' needs a size");
        ensure!(def.color != Color::Unspecified, "object '{label}' needs a color");
    }

    let world = World::new(columns, file.objects);
    let state = State::new(file.stacks, file.arm, file.holding);
    state.validate(&world)?;
    for label in world.labels() {
        ensure!(
            state.find(label).is_some() || state.holding.as_deref() == Some(label),
            "object '{label}' is defined but placed nowhere"
        );
    }
    Ok((world, state))
}

/// A built-in demo world, or `None` for an unknown name.
pub fn builtin(name: &str) -> Option<(World, State)> {
    match name {
        "small" => Some(small()),
        "stacked" => Some(stacked()),
        _ => None,
    }
}

fn objects(defs: &[(&str, Form, Size, Color)]) -> HashMap<Label, ObjectDef> {
    defs.iter()
        .map(|&(label, form, size, color)| (label.to_owned(), ObjectDef::new(form, size, color)))
        .collect()
}

fn stacks(columns: &[&[&str]]) -> Vec<Vec<Label>> {
    columns.iter().map(|col| col.iter().map(|l| (*l).to_owned()).collect()).collect()
}

/// Three columns, one ball, one box; the end-to-end scenario world.
fn small() -> (World, State) {
    let world = World::new(
        3,
        objects(&[
            ("a", Form::Ball, Size::Small, Color::White),
            ("e", Form::Box, Size::Large, Color::Yellow),
        ]),
    );
    let state = State::new(stacks(&[&["e"], &[], &["a"]]), 0, None);
    (world, state)
}

/// Five columns with nested boxes, a table and two balls.
fn stacked() -> (World, State) {
    let world = World::new(
        5,
        objects(&[
            ("e", Form::Ball, Size::Large, Color::White),
            ("f", Form::Ball, Size::Small, Color::Black),
            ("g", Form::Table, Size::Large, Color::Blue),
            ("k", Form::Box, Size::Large, Color::Yellow),
            ("l", Form::Box, Size::Large, Color::Red),
            ("m", Form::Box, Size::Small, Color::Blue),
        ]),
    );
    let state = State::new(
        stacks(&[&["e"], &["g", "l"], &[], &["k", "m", "f"], &[]]),
        0,
        None,
    );
    (world, state)
}

#[cfg(test)]
mod tests {
    use assertables::assert_all;

    use super::*;

    #[test]
    fn builtins_are_valid_worlds() {
        assert_all!(DEMOS.iter(), |name: &&str| {
            let (world, state) = builtin(name).expect("demo exists");
            state.validate(&world).is_ok()
        });
        assert!(builtin("nonesuch").is_none());
    }

    const GOOD: &str = r#"
        arm = 0
        stacks = [["e"], [], ["a"]]

        [objects.a]
        form = "ball"
        size = "small"
        color = "white"

        [objects.e]
        form = "box"
        size = "large"
        color = "yellow"
    "#;

    #[test]
    fn toml_worlds_load() {
        let (world, state) = parse(GOOD).unwrap();
        assert_eq!(world.columns(), 3);
        assert_eq!(state.stacks[2], vec!["a".to_owned()]);
        assert_eq!(state.arm, 0);
        assert!(state.holding.is_none());
    }

    #[test]
    fn unknown_stack_labels_are_rejected() {
        let bad = GOOD.replace("[\"e\"]", "[\"zz\"]");
        let err = parse(&bad).unwrap_err();
        assert!(err.to_string().contains("zz") || format!("{err:?}").contains("zz"));
    }

    #[test]
    fn unplaced_objects_are_rejected() {
        let bad = GOOD.replace("[[\"e\"], [], [\"a\"]]", "[[\"e\"], [], []]");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn bad_stacking_is_rejected() {
        // A box on a ball.
        let bad = GOOD.replace("[[\"e\"], [], [\"a\"]]", "[[\"a\", \"e\"], [], []]");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn wildcard_forms_are_rejected() {
        let bad = GOOD.replace("form = \"box\"", "form = \"anyform\"");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn arm_out_of_range_is_rejected() {
        let bad = GOOD.replace("arm = 0", "arm = 7");
        assert!(parse(&bad).is_err());
    }
}
