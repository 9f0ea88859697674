use thiserror::Error;

/// Failures raised locally, before any remote call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("AWS credentials are not configured")]
    NotConfigured,
    #[error("Please enter a log group name")]
    MissingLogGroup,
    #[error("task {0} is not running and cannot be restarted")]
    TaskNotRunning(String),
    #[error("task {0} is not in the current task list")]
    NoSuchTask(String),
    #[error("task {0} is already being restarted")]
    RestartInFlight(String),
}
