use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("SAT search gave up after {0} conflicts")]
    ResourceLimit(u64),

    #[error("unknown tactic: '{0}'")]
    UnknownTactic(String),

    #[error("tactic failed: {0}")]
    TacticFailed(String),

    #[error("solver could not decide the query: {0}")]
    SolverUnknown(String),

    #[error("solver produced a term that is not a boolean condition: '{0}'")]
    UnsupportedTerm(String),

    #[error("failed to write solver query: {0}")]
    FailedWriteQuery(io::Error),

    #[error("failed to spawn solver process: {0}")]
    FailedSpawnSolver(io::Error),

    #[error("failed to write to solver stdin: {0}")]
    FailedWriteToSolverStdin(io::Error),

    #[error("error while waiting for solver to exit: {0}")]
    FailedWaitForSolver(io::Error),

    #[error("solver gave invalid output: '{0}'")]
    SolverGaveInvalidOutput(String),

    #[error("solver timed out when solving problem")]
    SolverTimeout,

    #[error(
        "solver returned non-zero exit code: {}",
        if let Some(i) = .0 { format!("{}", i) } else { "none".to_owned() }
    )]
    NonZeroExitCode(Option<i32>),
}
