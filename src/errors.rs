use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to discover topics: {0}")]
    Discovery(String),
    #[error("no topics available to record")]
    NoTopics,
    #[error("recorder for process {index} failed to start: {message}")]
    Launch { index: u32, message: String },
    #[error("interactive topic selection requires a terminal")]
    NoTerminal,
    #[error("interrupted while starting recorders")]
    LaunchInterrupted,
    #[error("recorder for process {index} exited with {status}")]
    RecorderExited { index: u32, status: String },
}
