//! Tokenization of user utterances.
//!
//! Lowercases, strips punctuation, and matches fixed phrases longest first,
//! so "on top of" becomes one relation token before the bare "on" can fire.

use std::cmp::Reverse;

use derive_more::From;
use enum_iterator::all;
use thiserror::Error;

use crate::{
    grammar::Quantifier,
    physics::Relation,
    world::{Color, Form, Size},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verb {
    Take,
    Put,
    Move,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(From)]
pub enum Token {
    Verb(Verb),
    It,
    /// "that is" and friends, introducing a relative clause.
    Glue,
    Quant(Quantifier),
    Size(Size),
    Color(Color),
    Form(Form),
    Rel(Relation),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unknown word '{0}'")]
    Unknown(String),
    #[error("empty utterance")]
    Empty,
}

type Entry = (Vec<&'static str>, Token);

fn lexicon() -> Vec<Entry> {
    let mut entries: Vec<Entry> = vec![
        (vec!["pick", "up"], Verb::Take.into()),
        (vec!["take"], Verb::Take.into()),
        (vec!["grasp"], Verb::Take.into()),
        (vec!["put"], Verb::Put.into()),
        (vec!["drop"], Verb::Put.into()),
        (vec!["move"], Verb::Move.into()),
        (vec!["it"], Token::It),
        (vec!["that", "is"], Token::Glue),
        (vec!["that", "are"], Token::Glue),
        (vec!["which", "is"], Token::Glue),
        (vec!["which", "are"], Token::Glue),
        (vec!["the"], Quantifier::The.into()),
        (vec!["a"], Quantifier::Any.into()),
        (vec!["an"], Quantifier::Any.into()),
        (vec!["any"], Quantifier::Any.into()),
        (vec!["all"], Quantifier::All.into()),
        (vec!["every"], Quantifier::All.into()),
        (vec!["tiny"], Size::Small.into()),
        (vec!["big"], Size::Large.into()),
    ];

    for size in all::<Size>() {
        if let Some(word) = size.word() {
            entries.push((vec![word], size.into()));
        }
    }
    for color in all::<Color>() {
        if let Some(word) = color.word() {
            entries.push((vec![word], color.into()));
        }
    }
    for form in all::<Form>() {
        if form == Form::Floor {
            entries.push((vec!["floor"], form.into()));
            continue;
        }
        entries.push((vec![form.word(false)], form.into()));
        entries.push((vec![form.word(true)], form.into()));
    }
    // Extra anyform synonyms beyond "object(s)".
    for word in ["thing", "things", "one", "ones"] {
        entries.push((vec![word], Form::Any.into()));
    }
    for rel in all::<Relation>() {
        for phrase in rel.phrases() {
            entries.push((phrase.split_whitespace().collect(), rel.into()));
        }
    }

    entries.sort_by_key(|(words, _)| Reverse(words.len()));
    entries
}

pub fn lex(utterance: &str) -> Result<Vec<Token>, LexError> {
    let lowered = utterance.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Err(LexError::Empty);
    }

    let lexicon = lexicon();
    let mut tokens = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let hit = lexicon.iter().find(|(phrase, _)| {
            phrase.len() <= words.len() - i
                && phrase.iter().zip(&words[i..]).all(|(a, b)| a == b)
        });
        let Some((phrase, token)) = hit else {
            return Err(LexError::Unknown(words[i].to_owned()));
        };
        tokens.push(*token);
        i += phrase.len();
    }
    log::trace!(target: "parser", "lexed {:?} as {tokens:?}", utterance);
    Ok(tokens)
}
