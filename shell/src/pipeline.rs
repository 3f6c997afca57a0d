use crate::command::{Stdin, Stdout};
use crate::error::ShellError;
use crate::executable::{Executable, UnitKind};
use crate::executor::{self, PipelineOutcome};
use crate::parser;
use crate::registry::Registry;

/// A wired chain of executable units built from one input line.
///
/// Unit 0 reads the caller's input, the last unit writes the caller's output,
/// and every adjacent pair is connected by exactly one anonymous pipe. All of
/// that is in place before anything runs.
pub struct Pipeline {
    stages: Vec<Executable>,
    pipes: usize,
}

impl Pipeline {
    /// Parse, resolve and wire `line`.
    ///
    /// Returns `Ok(None)` for a blank line. If a pipe cannot be allocated the
    /// partially wired stages are dropped; nothing has been started yet.
    pub fn build(
        line: &str,
        registry: &Registry,
        input: Box<dyn Stdin>,
        output: Box<dyn Stdout>,
    ) -> Result<Option<Self>, ShellError> {
        let mut stages: Vec<Executable> = parser::parse_line(line)?
            .into_iter()
            .map(|segment| registry.resolve(&segment.name, segment.args))
            .collect();
        if stages.is_empty() {
            return Ok(None);
        }
        let n = stages.len();
        stages[0].bind_input(input);
        stages[n - 1].bind_output(output);

        let mut pipes = 0;
        for i in 1..n {
            let reader = stages[i - 1].output_pipe()?;
            stages[i].bind_input(Box::new(reader));
            pipes += 1;
        }

        tracing::debug!(stages = n, pipes, "pipeline built");
        Ok(Some(Self { stages, pipes }))
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of pipes created between stages.
    pub fn pipe_count(&self) -> usize {
        self.pipes
    }

    /// What each stage resolved to, in order.
    pub fn kinds(&self) -> Vec<UnitKind> {
        self.stages.iter().map(Executable::kind).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(Executable::name).collect()
    }

    /// Run every stage concurrently and wait for all of them.
    pub fn execute(self) -> PipelineOutcome {
        executor::execute(self.stages)
    }
}
