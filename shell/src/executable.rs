use crate::command::{Handler, Stdin, Stdout};
use crate::error::ShellError;
use crate::external::ExternalCommand;
use std::io::{self, PipeReader, Write};

/// Which flavour of unit a pipeline stage resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Internal,
    External,
}

/// The streams a unit reads from and writes to. Both must be set before it runs.
#[derive(Default)]
pub(crate) struct Bindings {
    input: Option<Box<dyn Stdin>>,
    output: Option<Box<dyn Stdout>>,
}

impl Bindings {
    pub(crate) fn bind_input(&mut self, source: Box<dyn Stdin>) {
        self.input = Some(source);
    }

    pub(crate) fn bind_output(&mut self, sink: Box<dyn Stdout>) {
        self.output = Some(sink);
    }

    pub(crate) fn take(
        &mut self,
        command: &str,
    ) -> Result<(Box<dyn Stdin>, Box<dyn Stdout>), ShellError> {
        let unbound = |stream| ShellError::Unbound {
            command: command.to_owned(),
            stream,
        };
        let input = self.input.take().ok_or_else(|| unbound("input"))?;
        let output = self.output.take().ok_or_else(|| unbound("output"))?;
        Ok((input, output))
    }
}

pub(crate) fn anonymous_pipe() -> Result<(PipeReader, io::PipeWriter), ShellError> {
    io::pipe().map_err(ShellError::Resource)
}

/// A built-in bound to its arguments and streams.
pub struct InternalCommand {
    name: String,
    handler: Handler,
    args: Vec<String>,
    bindings: Bindings,
    /// Set when the output is a pipe this unit created and must close once done.
    close_output: bool,
}

impl InternalCommand {
    pub fn new(name: impl Into<String>, handler: Handler, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            handler,
            args,
            bindings: Bindings::default(),
            close_output: false,
        }
    }

    fn output_pipe(&mut self) -> Result<PipeReader, ShellError> {
        let (reader, writer) = anonymous_pipe()?;
        self.bindings.bind_output(Box::new(writer));
        self.close_output = true;
        Ok(reader)
    }

    fn run(mut self) -> Result<(), ShellError> {
        let (mut input, mut output) = self.bindings.take(&self.name)?;
        let result = (self.handler)(&self.args, &mut input, &mut output);
        let flushed = output.flush();
        if self.close_output {
            // the next stage sees end of input only once every write end is gone,
            // so close ours before waiting on anything else
            drop(output);
        }
        drop(input);
        result
            .and(flushed.map_err(ShellError::from))
            .map_err(|e| match e {
                ShellError::Io(source) => ShellError::os(self.name.clone(), source),
                other => other,
            })
    }
}

/// One stage of a pipeline: either a built-in or an external program.
///
/// The variant is chosen once, when the stage is resolved, and never changes.
pub enum Executable {
    Internal(InternalCommand),
    External(ExternalCommand),
}

impl Executable {
    pub fn kind(&self) -> UnitKind {
        match self {
            Self::Internal(_) => UnitKind::Internal,
            Self::External(_) => UnitKind::External,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Internal(cmd) => &cmd.name,
            Self::External(cmd) => cmd.name(),
        }
    }

    /// Set the stream this unit reads from.
    pub fn bind_input(&mut self, source: Box<dyn Stdin>) {
        match self {
            Self::Internal(cmd) => cmd.bindings.bind_input(source),
            Self::External(cmd) => cmd.bindings_mut().bind_input(source),
        }
    }

    /// Set the stream this unit writes to.
    pub fn bind_output(&mut self, sink: Box<dyn Stdout>) {
        match self {
            Self::Internal(cmd) => {
                cmd.bindings.bind_output(sink);
                cmd.close_output = false;
            }
            Self::External(cmd) => cmd.bindings_mut().bind_output(sink),
        }
    }

    /// Point this unit's output at a fresh pipe and return the pipe's read end.
    ///
    /// Fails with [`ShellError::Resource`] when the OS has no descriptors left.
    pub fn output_pipe(&mut self) -> Result<PipeReader, ShellError> {
        match self {
            Self::Internal(cmd) => cmd.output_pipe(),
            Self::External(cmd) => cmd.output_pipe(),
        }
    }

    /// Run the unit to completion. Consumes it, so a unit runs at most once.
    pub fn run(self) -> Result<(), ShellError> {
        match self {
            Self::Internal(cmd) => cmd.run(),
            Self::External(cmd) => cmd.run(),
        }
    }
}
