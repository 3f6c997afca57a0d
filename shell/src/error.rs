use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Everything that can go wrong while building or running a pipeline.
///
/// All of these are local to one line (or one stage of it): none of them
/// terminates the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The line could not be split into commands, e.g. `echo a |`.
    #[error("parse error: {0}")]
    Parse(String),

    /// An external program could not be found or launched.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// A built-in received a value it cannot interpret.
    #[error("{command}: {message}")]
    InvalidArgument { command: String, message: String },

    /// A built-in that needs at least one argument got none.
    #[error("{command}: not enough arguments")]
    MissingArgument { command: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// An OS call failed; `context` names what was attempted.
    #[error("{context}: {source}")]
    Os {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The OS refused to hand out a pipe.
    #[error("cannot allocate pipe: {0}")]
    Resource(#[source] io::Error),

    /// An external program exited unsuccessfully.
    #[error("{command}: {status}")]
    Process { command: String, status: ExitStatus },

    /// A stage was started before its streams were connected.
    #[error("{command}: {stream} is not bound")]
    Unbound {
        command: String,
        stream: &'static str,
    },

    /// The thread running a stage panicked.
    #[error("{command}: stage panicked")]
    Panicked { command: String },
}

impl ShellError {
    pub(crate) fn os(context: impl Into<String>, source: io::Error) -> Self {
        Self::Os {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn invalid_argument(command: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            command: command.to_owned(),
            message: message.into(),
        }
    }

    /// True when the failure is the reader of our output going away: a write
    /// that hit a closed pipe, or a program killed by `SIGPIPE`.
    ///
    /// Such failures are still reported; this only tells them apart.
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            Self::Io(e) | Self::Os { source: e, .. } => e.kind() == io::ErrorKind::BrokenPipe,
            Self::Process { status, .. } => killed_by_sigpipe(*status),
            _ => false,
        }
    }
}

#[cfg(unix)]
fn killed_by_sigpipe(status: ExitStatus) -> bool {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(Signal::SIGPIPE as i32)
}

#[cfg(not(unix))]
fn killed_by_sigpipe(_status: ExitStatus) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_detection() {
        let err = ShellError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.is_broken_pipe());

        let err = ShellError::os("write", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.is_broken_pipe());

        let err = ShellError::os("cd: /nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(!err.is_broken_pipe());
    }

    #[test]
    #[cfg(unix)]
    fn test_sigpipe_exit_is_a_broken_pipe() {
        use std::os::unix::process::ExitStatusExt;

        let err = ShellError::Process {
            command: "yes".into(),
            status: ExitStatus::from_raw(13),
        };
        assert!(err.is_broken_pipe());

        let err = ShellError::Process {
            command: "false".into(),
            status: ExitStatus::from_raw(1 << 8),
        };
        assert!(!err.is_broken_pipe());
    }

    #[test]
    fn test_messages_name_the_command() {
        let err = ShellError::invalid_argument("kill", "illegal pid: abc");
        assert_eq!(err.to_string(), "kill: illegal pid: abc");

        let err = ShellError::CommandNotFound("nonexistent_binary_xyz".into());
        assert_eq!(err.to_string(), "nonexistent_binary_xyz: command not found");
    }
}
