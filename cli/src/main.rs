mod error;
mod logger;

use clap::{AppSettings, ArgEnum, Args, Parser, Subcommand};
use condsimp::{
    round_trip_trace, simplify_trace,
    solver::{self, NativeSolver, ProcessOptions, SmtProcessSolver, Solver, TacticKind},
};
#[cfg(feature = "z3")]
use condsimp::solver::Z3Solver;
use const_format::{formatcp, str_index};
use error::{CliError, CliResult};
use git_version::git_version;
use std::{
    fs::{self, File},
    io::{self, BufRead, IsTerminal, Write},
    path::Path,
    thread,
    time::Duration,
};

// `git describe --all` will try to find any ref (including tags) that describes the current commit.
// Release tags look like `condsimp-0.1.0`, so we exclude them to get the branch name instead.
const GIT_BRANCH_NAME: &str = git_version!(
    args = ["--all", "--exclude", "condsimp-*"],
    fallback = "heads/none",
);
const GIT_COMMIT_HASH: &str = git_version!(fallback = "unknown");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const VERSION_STRING: &str = formatcp!(
    "{} [git {} {}]",
    APP_VERSION,
    // By default, `git describe` returns something like "heads/main". We ignore the "heads/" part
    // to get only the branch name
    str_index!(GIT_BRANCH_NAME, 6..),
    GIT_COMMIT_HASH,
);

/// The default stack size of the worker thread. Conditions are often long left-nested chains,
/// and every tree traversal is recursive.
const DEFAULT_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[clap(
    name = "condsimp",
    version = VERSION_STRING,
    setting = AppSettings::DeriveDisplayOrder
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Sets the maximum logging level.
    #[clap(arg_enum, global = true, long = "log", default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Disables output coloring.
    #[clap(global = true, long)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Simplifies the conditions of a trace file, proving each one equivalent to the original.
    Simplify(SimplifyCommandOptions),

    /// Parses a trace file and prints it back, without simplifying.
    Parse(ParseCommandOptions),
}

#[derive(Args)]
struct Input {
    /// The trace file. Use `-` to read from stdin.
    input: String,
}

#[derive(Args)]
struct Output {
    /// Writes the output to this file instead of stdout.
    #[clap(short, long)]
    output: Option<String>,
}

#[derive(Args)]
struct StatsOptions {
    /// Prints statistics about the run to stderr when it finishes.
    #[clap(long)]
    stats: bool,
}

#[derive(Args)]
struct StackOptions {
    /// Defines the stack size of the thread that processes the trace, in bytes.
    #[clap(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,
}

#[derive(Args, Clone)]
struct TacticOptions {
    /// The engine that simplifies conditions and proves them equivalent to the originals.
    #[clap(arg_enum, long, default_value_t = DEFAULT_ENGINE)]
    engine: Engine,

    /// The tactics applied, in order, in each iteration of the simplification loop. Valid names
    /// are `simplify`, `ctx-simplify`, `dom-simplify` and `ctx-solver-simplify`.
    #[clap(
        long,
        use_value_delimiter = true,
        default_value = "ctx-solver-simplify,ctx-simplify,dom-simplify,simplify"
    )]
    tactics: Vec<String>,

    /// The maximum number of iterations of the simplification loop.
    #[clap(long, default_value_t = 32)]
    max_iterations: usize,

    /// Conditions larger than this are not simplified by `ctx-solver-simplify`. Only used by the
    /// native engine.
    #[clap(long, default_value_t = 2000)]
    solver_simplify_limit: usize,

    /// The maximum number of conflicts of the SAT search when proving equivalences. If this is
    /// reached, the run fails. Only used by the native engine.
    #[clap(long, default_value_t = solver::DEFAULT_CONFLICT_LIMIT)]
    conflict_limit: u64,

    /// The time limit of each call to Z3, in seconds. If this is reached, the run fails.
    #[clap(long)]
    timeout: Option<u64>,
}

#[derive(Args, Clone)]
struct ProverOptions {
    /// Proves equivalences by calling the given SMT solver binary, instead of the engine.
    #[clap(long)]
    prover: Option<String>,

    /// The arguments to pass to the prover. This should be a single string where multiple
    /// arguments are separated by spaces. If absent, defaults are used for z3 and cvc5.
    #[clap(long, requires = "prover", allow_hyphen_values = true)]
    prover_args: Option<String>,
}

#[derive(Args)]
struct SimplifyCommandOptions {
    #[clap(flatten)]
    input: Input,

    #[clap(flatten)]
    output: Output,

    #[clap(flatten)]
    tactics: TacticOptions,

    #[clap(flatten)]
    prover: ProverOptions,

    #[clap(flatten)]
    stats: StatsOptions,

    #[clap(flatten)]
    stack: StackOptions,
}

#[derive(Args)]
struct ParseCommandOptions {
    #[clap(flatten)]
    input: Input,

    #[clap(flatten)]
    output: Output,

    /// Also prints the size of every condition to stderr.
    #[clap(long)]
    sizes: bool,

    #[clap(flatten)]
    stack: StackOptions,
}

#[derive(ArgEnum, Clone, Copy)]
enum Engine {
    Z3,
    Native,
}

const DEFAULT_ENGINE: Engine = if cfg!(feature = "z3") {
    Engine::Z3
} else {
    Engine::Native
};

#[derive(ArgEnum, Clone)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let colors_enabled = !cli.no_color && std::io::stderr().is_terminal();
    logger::init(cli.log_level.into(), colors_enabled);

    let result = match cli.command {
        Command::Simplify(options) => {
            let stack_size = options.stack.stack_size;
            run_on_worker(stack_size, move || simplify_command(options))
        }
        Command::Parse(options) => {
            let stack_size = options.stack.stack_size;
            run_on_worker(stack_size, move || parse_command(options))
        }
    };
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Runs `f` on a new thread with the given stack size, and waits for it to finish.
fn run_on_worker<F>(stack_size: usize, f: F) -> CliResult<()>
where
    F: FnOnce() -> CliResult<()> + Send + 'static,
{
    thread::Builder::new()
        .name("worker".to_owned())
        .stack_size(stack_size)
        .spawn(f)
        .map_err(CliError::FailedSpawnWorker)?
        .join()
        .map_err(|_| CliError::WorkerPanicked)?
}

fn get_input(options: &Input) -> CliResult<Box<dyn BufRead>> {
    if options.input == "-" {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(io::BufReader::new(File::open(&options.input)?)))
    }
}

fn get_output(options: &Output, input: &Input) -> CliResult<Box<dyn Write>> {
    match options.output.as_deref() {
        None | Some("-") => Ok(Box::new(io::BufWriter::new(io::stdout().lock()))),
        Some(path) => {
            // Creating the output file would truncate the input before it is read
            if input.input != "-" && is_same_file(path, &input.input) {
                return Err(CliError::SameInputAndOutput(path.to_owned()));
            }
            Ok(Box::new(io::BufWriter::new(File::create(path)?)))
        }
    }
}

/// Checks if two paths refer to the same file. Paths that cannot be resolved, for example because
/// the file does not exist yet, are compared as written.
fn is_same_file(a: &str, b: &str) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => Path::new(a) == Path::new(b),
    }
}

fn build_solver(tactics: TacticOptions, prover: ProverOptions) -> CliResult<Box<dyn Solver>> {
    let tactic_kinds = tactics
        .tactics
        .iter()
        .map(|name| TacticKind::from_name(name.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    let config = solver::Config::new()
        .tactics(tactic_kinds)
        .max_iterations(tactics.max_iterations)
        .solver_simplify_limit(tactics.solver_simplify_limit)
        .conflict_limit(tactics.conflict_limit)
        .timeout(tactics.timeout.map(Duration::from_secs));
    let engine: Box<dyn Solver> = match tactics.engine {
        Engine::Native => Box::new(NativeSolver::new(&config)),
        #[cfg(feature = "z3")]
        Engine::Z3 => Box::new(Z3Solver::new(&config)),
        #[cfg(not(feature = "z3"))]
        Engine::Z3 => return Err(CliError::Z3Unavailable),
    };

    Ok(match prover.prover {
        Some(solver) => {
            let arguments = match prover.prover_args {
                Some(args) => args.split_whitespace().map(Into::into).collect(),
                None => ProcessOptions::default_arguments(&solver)
                    .iter()
                    .map(|&a| a.into())
                    .collect(),
            };
            let options = ProcessOptions {
                solver: solver.into(),
                arguments,
            };
            Box::new(SmtProcessSolver::new(options, engine))
        }
        None => engine,
    })
}

fn simplify_command(options: SimplifyCommandOptions) -> CliResult<()> {
    let mut solver = build_solver(options.tactics, options.prover)?;
    let input = get_input(&options.input)?;
    let mut output = get_output(&options.output, &options.input)?;

    let stats = simplify_trace(input, &mut output, solver.as_mut())?;
    log::info!(
        "simplified {} conditions, total size {} -> {}",
        stats.lines,
        stats.size_before.total(),
        stats.size_after.total()
    );
    if options.stats.stats {
        eprint!("{}", stats);
    }
    Ok(())
}

fn parse_command(options: ParseCommandOptions) -> CliResult<()> {
    let input = get_input(&options.input)?;
    let mut output = get_output(&options.output, &options.input)?;

    let print_sizes = options.sizes;
    let count = round_trip_trace(input, &mut output, |line, parsed| {
        if print_sizes {
            eprintln!(
                "line {}: {} tokens, size {}",
                line,
                parsed.num_tokens,
                parsed.condition.size()
            );
        }
    })?;
    log::info!("parsed {} conditions", count);
    Ok(())
}
