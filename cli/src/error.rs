use condsimp::solver::SolverError;
use std::io;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Condsimp(#[from] condsimp::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Solver(#[from] SolverError),

    #[error("input and output cannot be the same file: '{0}'")]
    SameInputAndOutput(String),

    #[error("failed to spawn worker thread: {0}")]
    FailedSpawnWorker(io::Error),

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[cfg(not(feature = "z3"))]
    #[error("this build does not include z3, use `--engine native`")]
    Z3Unavailable,
}
