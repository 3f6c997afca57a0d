use crate::error::ShellError;
use std::fs::File;
use std::io::{self, PipeReader, PipeWriter, Read, Write};
use std::process::Stdio;
use std::sync::Arc;

/// Abstraction over a readable stream a pipeline stage can consume.
///
/// Built-ins read from it directly. External programs need an OS handle instead,
/// so the stream is offered to [`Stdin::into_stdio`] first: OS-backed streams
/// (pipes, files, the terminal) convert into a [`Stdio`], in-memory streams hand
/// themselves back and are pumped through a child pipe by the caller.
pub trait Stdin: Read + Send {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn Stdin>>;
}

/// Abstraction over a writable stream a pipeline stage can produce into.
///
/// See [`Stdin`] for how the conversion to [`Stdio`] works.
pub trait Stdout: Write + Send {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn Stdout>>;
}

macro_rules! os_backed {
    ($trait:ident: $($ty:ty),+) => {
        $(
            impl $trait for $ty {
                fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn $trait>> {
                    Ok((*self).into())
                }
            }
        )+
    };
}

os_backed!(Stdin: PipeReader, File);
os_backed!(Stdout: PipeWriter, File, io::Stdout, io::Stderr);

/// Signature of a built-in command body: `(arguments, input, output) -> outcome`.
///
/// Handlers are shared between the registry and the stages that run them, possibly
/// on several threads at once, hence `Send + Sync`.
pub type Handler =
    Arc<dyn Fn(&[String], &mut dyn Read, &mut dyn Write) -> Result<(), ShellError> + Send + Sync>;
