//! A tiny shell that runs pipelines of built-in and external commands.
//!
//! A line such as `cat notes.txt | grep -i todo | wc` is split on `|`, every
//! segment is resolved against a [`Registry`] of built-ins (falling back to an
//! OS program of that name), adjacent stages are connected with anonymous pipes
//! and then all stages run at once, each on its own thread. The line is done
//! when every stage is done; failures are collected per stage and never stop
//! the other stages.
//!
//! The main entry point is [`Interpreter`], which runs single lines
//! ([`Interpreter::execute_line`]) or a whole read-eval-print loop
//! ([`Interpreter::run`]). The public modules [`command`] and [`io_adapters`]
//! expose the stream traits stages are wired with and ready-made terminals.

mod builtin;
pub mod command;
mod error;
mod executable;
mod executor;
mod external;
mod interpreter;
pub mod io_adapters;
mod parser;
mod pipeline;
mod registry;

pub use error::ShellError;
pub use executable::{Executable, InternalCommand, UnitKind};
pub use executor::{PipelineOutcome, StageFailure};
pub use external::ExternalCommand;
pub use interpreter::{DEFAULT_PROMPT, Editor, Interpreter, LineSource, ScriptLines, StdinLines};
pub use io_adapters::{MemTerminal, StdTerminal, Terminal};
pub use parser::{Segment, parse_line};
pub use pipeline::Pipeline;
pub use registry::Registry;
