//! The per-utterance pipeline.
//!
//! One utterance runs to completion before the next is read: parse every
//! reading, interpret them in order (resolve references, detect referent
//! ambiguity, compile the goal), then search, narrate, execute against the
//! live state, and re-check the world invariants. The only suspension point
//! is a clarification question, which stores its context in the pending
//! slots and returns control to the host.

use std::{
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    ambiguity::{self, Clarified, PendingResolution, PendingSlots, PendingTarget, Side},
    goal::{self, GoalError, Request, Target},
    grammar::{Command, Quantifier, lexer, parser},
    narrate::{self, PlanItem},
    planner,
    resolve::{self, ResolveError},
    world::{Action, State, World},
};

pub const DEFAULT_BUDGET: Duration = Duration::from_secs(5);

const PARSE_FAILURE: &str = "Sorry I cannot understand this, please try again.";
const PLANNER_FAILURE: &str = "I cannot figure this out in the time I have.";

/// Host-provided output callbacks: informational lines, system replies
/// (errors and questions), and plan playback.
pub trait Render {
    fn info(&mut self, line: &str);
    fn system(&mut self, line: &str);
    fn animate(&mut self, items: &[PlanItem]);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
enum InterpretError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error("I am not holding anything.")]
    NotHolding,
}

/// What interpreting one parse produced: a ready goal, or a question.
#[derive(Debug)]
enum Interpreted {
    Goal(goal::Goal),
    Ask(PendingResolution),
}

pub struct Session {
    world: World,
    state: State,
    slots: PendingSlots,
    budget: Duration,
    interrupt: Arc<AtomicBool>,
}

impl Session {
    pub fn new(world: World, state: State, budget: Duration) -> anyhow::Result<Self> {
        state.validate(&world)?;
        Ok(Session {
            world,
            state,
            slots: PendingSlots::default(),
            budget,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Shared flag a host interrupt handler may set to abort a search.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Runs one utterance through the pipeline.
    pub fn handle(&mut self, utterance: &str, out: &mut dyn Render) {
        debug!(target: "interpret", "utterance: {utterance:?}");

        if let Some(parses) = self.slots.parses.take() {
            self.slots.clear();
            if let Some(n) = ambiguity::selection(utterance, parses.len()) {
                self.run_commands(vec![parses[n - 1].clone()], out);
                return;
            }
            // Anything but a number starts over as a fresh command.
        } else if let Some(pending) = self.slots.resolution.take() {
            let prompt = self.slots.prompt.take().unwrap_or_default();
            self.slots.clear();
            self.answer_question(pending, prompt, utterance, out);
            return;
        }

        let Ok(tokens) = lexer::lex(utterance) else {
            out.system(PARSE_FAILURE);
            return;
        };
        let commands = parser::parse(&tokens);
        if commands.is_empty() {
            out.system(PARSE_FAILURE);
            return;
        }
        self.run_commands(commands, out);
    }

    /// An utterance arriving while a referent question stands: either a
    /// fresh command (discarding the question) or an answer.
    fn answer_question(
        &mut self,
        pending: PendingResolution,
        prompt: String,
        utterance: &str,
        out: &mut dyn Render,
    ) {
        let answers = match lexer::lex(utterance) {
            Ok(tokens) => {
                let commands = parser::parse(&tokens);
                if !commands.is_empty() {
                    self.run_commands(commands, out);
                    return;
                }
                parser::parse_answer(&tokens)
            }
            Err(_) => Vec::new(),
        };

        match ambiguity::clarify(&pending, &answers, &self.state, &self.world) {
            Clarified::Settled(settled) => self.run_request(request_of(settled), out),
            Clarified::StillAmbiguous(narrowed) => {
                let question = narrowed.question(&self.world);
                self.suspend(narrowed, question, out);
            }
            Clarified::NotAnOption => {
                out.system(&format!("That was not one of the options I asked for. {prompt}"));
                self.slots.resolution = Some(pending);
                self.slots.prompt = Some(prompt);
            }
        }
    }

    /// Interprets the readings in order; one viable reading proceeds, none
    /// reports the first failure, several ask which was meant.
    fn run_commands(&mut self, commands: Vec<Command>, out: &mut dyn Render) {
        let outcomes: Vec<(Command, Result<Interpreted, InterpretError>)> = commands
            .into_iter()
            .map(|command| {
                let outcome = self.interpret(&command);
                (command, outcome)
            })
            .collect();

        let viable = outcomes.iter().filter(|(_, o)| o.is_ok()).count();
        match viable {
            0 => {
                let (_, first_error) = &outcomes[0];
                let message = first_error.as_ref().expect_err("no outcome was viable").to_string();
                out.system(&message);
            }
            1 => {
                let interpreted = outcomes
                    .into_iter()
                    .find_map(|(_, o)| o.ok())
                    .expect("exactly one outcome is viable");
                match interpreted {
                    Interpreted::Goal(goal) => self.plan_and_execute(&goal, out),
                    Interpreted::Ask(pending) => {
                        let question = pending.question(&self.world);
                        self.suspend(pending, question, out);
                    }
                }
            }
            _ => {
                let readings: Vec<Command> =
                    outcomes.into_iter().filter(|(_, o)| o.is_ok()).map(|(c, _)| c).collect();
                let prompt = ambiguity::parse_prompt(&readings);
                out.system(&prompt);
                self.slots.parses = Some(readings);
                self.slots.prompt = Some(prompt);
            }
        }
    }

    fn interpret(&self, command: &Command) -> Result<Interpreted, InterpretError> {
        let pool = resolve::pool(&self.state);
        let pending = match command {
            Command::Take(entity) => {
                let movables = resolve::resolve(&entity.object, &pool, &self.state, &self.world)?;
                PendingResolution {
                    movables,
                    q_movable: entity.quantifier,
                    movable_desc: *entity.object.descriptor(),
                    target: None,
                    side: Side::Movable,
                }
            }
            Command::PutHeld(location) => {
                let held = self.state.holding.clone().ok_or(InterpretError::NotHolding)?;
                let movable_desc =
                    *self.world.def(&held).expect("the held label is defined in this world");
                let relatables =
                    resolve::resolve(&location.entity.object, &pool, &self.state, &self.world)?;
                PendingResolution {
                    movables: vec![held],
                    q_movable: Quantifier::The,
                    movable_desc,
                    target: Some(PendingTarget {
                        relation: location.relation,
                        relatables,
                        q_relatable: location.entity.quantifier,
                        desc: *location.entity.object.descriptor(),
                    }),
                    side: Side::Relatable,
                }
            }
            Command::Move(entity, location) => {
                let movables = resolve::resolve(&entity.object, &pool, &self.state, &self.world)?;
                let relatables =
                    resolve::resolve(&location.entity.object, &pool, &self.state, &self.world)?;
                PendingResolution {
                    movables,
                    q_movable: entity.quantifier,
                    movable_desc: *entity.object.descriptor(),
                    target: Some(PendingTarget {
                        relation: location.relation,
                        relatables,
                        q_relatable: location.entity.quantifier,
                        desc: *location.entity.object.descriptor(),
                    }),
                    side: Side::Movable,
                }
            }
        };
        self.ask_or_compile(pending)
    }

    /// A "the" phrase matching several objects suspends; otherwise the goal
    /// compiles right away. The movable side is asked about first.
    fn ask_or_compile(
        &self,
        mut pending: PendingResolution,
    ) -> Result<Interpreted, InterpretError> {
        if pending.q_movable.is_the() && pending.movables.len() > 1 {
            pending.side = Side::Movable;
            return Ok(Interpreted::Ask(pending));
        }
        if let Some(target) = &pending.target
            && target.q_relatable.is_the()
            && target.relatables.len() > 1
        {
            pending.side = Side::Relatable;
            return Ok(Interpreted::Ask(pending));
        }
        let goal = goal::compile(&request_of(pending), &self.world)?;
        Ok(Interpreted::Goal(goal))
    }

    fn run_request(&mut self, request: Request, out: &mut dyn Render) {
        match goal::compile(&request, &self.world) {
            Ok(goal) => self.plan_and_execute(&goal, out),
            Err(err) => out.system(&err.to_string()),
        }
    }

    fn suspend(&mut self, pending: PendingResolution, question: String, out: &mut dyn Render) {
        out.system(&question);
        self.slots.resolution = Some(pending);
        self.slots.prompt = Some(question);
    }

    fn plan_and_execute(&mut self, goal: &goal::Goal, out: &mut dyn Render) {
        let search = planner::search(&self.world, &self.state, goal, self.budget, &self.interrupt);
        let plan = match search {
            Ok(plan) => plan,
            Err(err) => {
                warn!(target: "planner", "no plan: {err}");
                out.system(PLANNER_FAILURE);
                return;
            }
        };

        let items = narrate::narrate(&plan, &self.state, &self.world);
        let stats = planner::action_stats(&plan);
        info!(
            target: "planner",
            "executing {} actions ({} arm moves, {} pickups, {} drops)",
            plan.len(),
            stats[Action::Left] + stats[Action::Right],
            stats[Action::Pick],
            stats[Action::Drop],
        );

        let before: Vec<String> = self.state.labels().map(str::to_owned).sorted().collect();
        self.execute(&plan);
        let after: Vec<String> = self.state.labels().map(str::to_owned).sorted().collect();

        if before != after {
            error!(target: "validation", "labels changed: {before:?} -> {after:?}");
            panic!(
                r"Executing a plan changed the set of objects in play!
                  This is a bug and should not occur."
            );
        }
        if let Err(err) = self.state.validate(&self.world) {
            error!(target: "validation", "invariant violated after execution: {err:?}");
            panic!(
                r"The world failed to validate after executing a plan!
                  This is a bug and should not occur.
                  Details:
                  {err}"
            );
        }

        out.animate(&items);
    }

    fn execute(&mut self, plan: &[Action]) {
        for &action in plan {
            if let Err(err) = self.state.apply(action, &self.world) {
                error!(target: "validation", "planned action was illegal: {err:?}");
                panic!(
                    r"A planned action was illegal against the live state!
                      This is a bug and should not occur."
                );
            }
        }
    }
}

fn request_of(pending: PendingResolution) -> Request {
    Request {
        movables: pending.movables,
        q_movable: pending.q_movable,
        movable_desc: pending.movable_desc,
        target: pending.target.map(|t| Target {
            relation: t.relation,
            relatables: t.relatables,
            q_relatable: t.q_relatable,
            desc: t.desc,
        }),
    }
}
