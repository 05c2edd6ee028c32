use thiserror::Error;

/// Result type returned by task actions. Actions are userland-adjacent code
/// (they shell out, copy files, write manifests), so they report through
/// `anyhow` and get wrapped with the task key by the runner.
pub type TaskResult<T> = anyhow::Result<T, anyhow::Error>;

/// Errors raised while defining the task graph, before anything runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("extension name is required before the task graph can be defined")]
    MissingName,

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors raised while executing the task graph.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("don't know how to build task '{0}'")]
    UnknownTask(Box<str>),

    #[error("dependency cycle detected in the task graph")]
    Cycle,

    #[error("Task '{0}':\n{1}")]
    Task(Box<str>, anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
