use std::{
    fs::File,
    io::Write,
    path::PathBuf,
    sync::atomic::Ordering::Relaxed,
    time::Duration,
};

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use gantry_planner::{PlanItem, Render, Session, describe, fixtures, world::State};
use log::{info, warn};
use owo_colors::OwoColorize;

#[derive(Parser)]
struct Cli {
    /// Wall-clock budget for a single search, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    budget_ms: u64,
    /// Write everything said to a timestamped transcript file.
    #[arg(long)]
    transcript: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts in a built-in demo world.
    Demo {
        #[arg(default_value = "small")]
        name: String,
    },
    /// Loads a world from a TOML file.
    File { path: PathBuf },
}

fn parse_or_readline() -> anyhow::Result<Cli> {
    // Args were provided (try to parse, exit on fail)
    if std::env::args_os().len() > 1 {
        return Ok(Cli::parse());
    }

    let mut cmd = Cli::command().no_binary_name(true);

    println!("No CLI arguments were provided");
    println!("Specify arguments via stdin:");
    println!("{}", cmd.render_long_help());

    std::io::stdout().flush().context("could not write to stdout")?;
    let mut buffer = String::new();
    std::io::stdin().read_line(&mut buffer).context("could not read stdin")?;

    let args = shlex::split(buffer.trim()).context("invalid quoting")?;
    let matches = cmd.try_get_matches_from(args).context("failed to parse args")?;

    Cli::from_arg_matches(&matches).context("failed to parse args")
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = parse_or_readline()?;
    let (world, state) = match &args.cmd {
        Command::Demo { name } => fixtures::builtin(name).with_context(|| {
            format!("unknown demo '{name}' (available: {})", fixtures::DEMOS.join(", "))
        })?,
        Command::File { path } => fixtures::load(path)?,
    };
    let mut session = Session::new(world, state, Duration::from_millis(args.budget_ms))?;

    // Ctrl-C interrupts a running search; a second one exits.
    let interrupt = session.interrupt_handle();
    if let Err(err) = ctrlc::set_handler({
        let mut is_repeat = false;
        move || {
            if is_repeat {
                warn!("Aborting immediately");
                std::process::exit(-1);
            }
            is_repeat = true;
            warn!("Stopping...");
            interrupt.store(true, Relaxed);
        }
    }) {
        warn!("Failed to set interrupt handler! {}", err);
    }

    let mut terminal = Terminal::new(args.transcript)?;
    terminal.info("Tell the arm what to do ('quit' leaves, 'world' reprints the world).");
    print_world(&session, &mut terminal);

    let stdin = std::io::stdin();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush().context("could not write to stdout")?;

        let mut line = String::new();
        if stdin.read_line(&mut line).context("could not read stdin")? == 0 {
            break;
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        match utterance {
            "quit" | "exit" => break,
            "world" => {
                print_world(&session, &mut terminal);
                continue;
            }
            _ => {}
        }

        terminal.log(&format!("> {utterance}"));
        let before: State = session.state().clone();
        session.handle(utterance, &mut terminal);
        if session.state() != &before {
            print_world(&session, &mut terminal);
        }
    }

    Ok(())
}

struct Terminal {
    transcript: Option<File>,
}

impl Terminal {
    fn new(transcript: bool) -> anyhow::Result<Self> {
        let transcript = if transcript {
            let run_timestamp = chrono::Local::now().format(r"%y%m%d_%H%M%S");
            let path = format!("{run_timestamp}_session.log");
            info!("Writing transcript to {path}");
            Some(File::create_new(&path).with_context(|| format!("could not create {path}"))?)
        } else {
            None
        };
        Ok(Terminal { transcript })
    }

    fn log(&mut self, line: &str) {
        if let Some(file) = &mut self.transcript
            && let Err(err) = writeln!(file, "{line}")
        {
            warn!("transcript write failed: {err}");
        }
    }

    fn flush_tokens(&mut self, tokens: &mut String) {
        if !tokens.is_empty() {
            println!("  {}", tokens.bold());
            self.log(&format!("  {tokens}"));
            tokens.clear();
        }
    }
}

impl Render for Terminal {
    fn info(&mut self, line: &str) {
        println!("{}", line.dimmed());
        self.log(line);
    }

    fn system(&mut self, line: &str) {
        println!("{}", line.yellow());
        self.log(line);
    }

    fn animate(&mut self, items: &[PlanItem]) {
        let mut tokens = String::new();
        for item in items {
            match item {
                PlanItem::Act(action) => tokens.push(action.token()),
                PlanItem::Say(line) => {
                    self.flush_tokens(&mut tokens);
                    println!("{}", line.green());
                    self.log(line);
                }
            }
        }
        self.flush_tokens(&mut tokens);
    }
}

fn print_world(session: &Session, terminal: &mut Terminal) {
    let state = session.state();
    let world = session.world();

    let width = state.labels().map(str::len).max().unwrap_or(1).max(1);
    let height = state.stacks.iter().map(Vec::len).max().unwrap_or(0).max(1);

    for row in (0..height).rev() {
        let line: String = state
            .stacks
            .iter()
            .map(|stack| {
                format!(" {:>width$}", stack.get(row).map(String::as_str).unwrap_or("."))
            })
            .collect();
        terminal.info(&line);
    }
    terminal.info(&"-".repeat((width + 1) * state.stacks.len() + 1));

    let mut arm_line = " ".repeat((width + 1) * state.arm + width);
    arm_line.push('^');
    match &state.holding {
        Some(held) => terminal.info(&format!("{arm_line} (holding '{held}')")),
        None => terminal.info(&arm_line),
    }

    let mut labels: Vec<&str> = state.labels().collect();
    labels.sort_unstable();
    for label in labels {
        let def = world.def(label).expect("all labels in play are defined");
        terminal.info(&format!("  {label}: {}", describe::phrase(def, false)));
    }
}
