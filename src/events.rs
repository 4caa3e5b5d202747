use std::path::PathBuf;

/// Work for the frame task. The frame task is the only writer to the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A raw image settled in the inbox.
    Arrived(PathBuf),
    /// Rotate now (button or SIGUSR1).
    ShowNext,
    /// Delete what is on screen, then rotate (button or SIGUSR2).
    DeleteCurrent,
}
