//! Human-readable object descriptions.
//!
//! Prompts and narration never use raw labels; they describe objects by the
//! shortest attribute combination that singles the object out among a
//! candidate set, trying `(form)`, `(color, form)`, `(size, form)` and
//! finally the full `(size, color, form)` tuple.

use std::{collections::HashMap, num::NonZero};

use itertools::Itertools;
use new_zealand::nz;

use crate::world::{Color, Form, Label, ObjectDef, Size, World};

/// Renders a descriptor as an English noun phrase ("large yellow box").
pub fn phrase(desc: &ObjectDef, plural: bool) -> String {
    let mut words: Vec<&str> = Vec::with_capacity(3);
    words.extend(desc.size.word());
    words.extend(desc.color.word());
    words.push(desc.form.word(plural));
    words.join(" ")
}

/// The four attribute masks, shortest first.
const MASKS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

fn masked(def: &ObjectDef, use_size: bool, use_color: bool) -> ObjectDef {
    ObjectDef {
        form: def.form,
        size: if use_size { def.size } else { Size::Unspecified },
        color: if use_color { def.color } else { Color::Unspecified },
    }
}

/// The minimal distinguishing description of `label` among `pool`.
///
/// Falls back to the full attribute tuple when even that is shared (two
/// indistinguishable objects in the pool).
pub fn minimal(label: &str, pool: &[Label], world: &World) -> String {
    let def = *world.def(label).expect("described label must be defined");
    for (use_size, use_color) in MASKS {
        let pattern = masked(&def, use_size, use_color);
        let unique =
            pool.iter().all(|other| other.as_str() == label || !world.matches(other, &pattern));
        if unique {
            return phrase(&pattern, false);
        }
    }
    phrase(&def, false)
}

/// The clarification question for a "the" phrase matching several objects.
///
/// Two candidates are offered by their minimal descriptions; larger sets get
/// the grouped form, headlined by the attributes all candidates share and
/// broken down by full description.
pub fn referent_prompt(candidates: &[Label], world: &World) -> String {
    debug_assert!(candidates.len() > 1, "a unique referent needs no prompt");

    if candidates.len() == 2 {
        let a = minimal(&candidates[0], candidates, world);
        let b = minimal(&candidates[1], candidates, world);
        return format!("Do you mean the {a} or the {b}?");
    }

    let defs: Vec<ObjectDef> =
        candidates.iter().map(|l| *world.def(l).expect("candidate must be defined")).collect();
    let shared = ObjectDef {
        form: defs.iter().map(|d| d.form).all_equal_value().unwrap_or(Form::Any),
        size: defs.iter().map(|d| d.size).all_equal_value().unwrap_or(Size::Unspecified),
        color: defs.iter().map(|d| d.color).all_equal_value().unwrap_or(Color::Unspecified),
    };

    fn increment(n: &mut NonZero<usize>) {
        *n = n.checked_add(1).unwrap();
    }
    let counts: HashMap<ObjectDef, NonZero<usize>> = defs.iter().fold(HashMap::new(), |mut map, def| {
        map.entry(*def).and_modify(increment).or_insert(nz!(1));
        map
    });
    let breakdown = counts
        .iter()
        .map(|(def, &n)| (phrase(def, n.get() > 1), n.get()))
        .sorted()
        .map(|(p, n)| format!("{n} {p}"))
        .join(", ");

    format!(
        "There are {} {} ({breakdown}). Which one do you mean?",
        candidates.len(),
        phrase(&shared, true),
    )
}
