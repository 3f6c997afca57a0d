use crate::command::Stdin;
use crate::error::ShellError;
use crate::executable::{Bindings, anonymous_pipe};
use std::io::{self, ErrorKind, PipeReader, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Command that is not a builtin: an OS program looked up through `PATH` when run.
pub struct ExternalCommand {
    name: String,
    args: Vec<String>,
    bindings: Bindings,
}

impl ExternalCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            bindings: Bindings::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    /// The write end goes to the child; our copy is dropped with the `Command`
    /// right after spawning, so the reader sees EOF when the child exits.
    pub(crate) fn output_pipe(&mut self) -> Result<PipeReader, ShellError> {
        let (reader, writer) = anonymous_pipe()?;
        self.bindings.bind_output(Box::new(writer));
        Ok(reader)
    }

    /// Spawn the program with the bound streams as its stdin/stdout and wait for it.
    ///
    /// In-memory streams cannot be handed to a child directly; they are pumped
    /// through a pipe instead, input on a helper thread and output on this one.
    pub(crate) fn run(mut self) -> Result<(), ShellError> {
        let (input, output) = self.bindings.take(&self.name)?;
        let (stdin, feed) = match input.into_stdio() {
            Ok(stdio) => (stdio, None),
            Err(source) => (Stdio::piped(), Some(source)),
        };
        let (stdout, drain) = match output.into_stdio() {
            Ok(stdio) => (stdio, None),
            Err(sink) => (Stdio::piped(), Some(sink)),
        };

        let mut child = Command::new(&self.name)
            .args(&self.args)
            .stdin(stdin)
            .stdout(stdout)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ShellError::CommandNotFound(self.name.clone()),
                _ => ShellError::os(self.name.clone(), e),
            })?;
        tracing::trace!(command = %self.name, pid = child.id(), "spawned");

        let feeder = match (feed, child.stdin.take()) {
            (Some(source), Some(sink)) => Some(thread::spawn(move || pump(source, sink))),
            _ => None,
        };
        let drained = match (drain, child.stdout.take()) {
            (Some(mut sink), Some(mut source)) => io::copy(&mut source, &mut sink)
                .and_then(|_| sink.flush())
                .map_err(|e| ShellError::os(self.name.clone(), e)),
            _ => Ok(()),
        };

        let status = child
            .wait()
            .map_err(|e| ShellError::os(format!("{}: wait", self.name), e))?;
        if let Some(feeder) = feeder {
            // the child may exit without reading all of its input; that is fine
            if let Ok(Err(e)) = feeder.join() {
                tracing::debug!(command = %self.name, error = %e, "input not fully consumed");
            }
        }
        drained?;

        if status.success() {
            Ok(())
        } else {
            Err(ShellError::Process {
                command: self.name,
                status,
            })
        }
    }
}

fn pump(mut source: Box<dyn Stdin>, mut sink: std::process::ChildStdin) -> io::Result<u64> {
    io::copy(&mut source, &mut sink)
}
