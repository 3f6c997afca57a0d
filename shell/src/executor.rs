use crate::error::ShellError;
use crate::executable::Executable;
use std::fmt;
use std::sync::mpsc;
use std::thread;

/// One stage that did not complete cleanly.
#[derive(Debug)]
pub struct StageFailure {
    /// Position of the stage in its pipeline, starting at 0.
    pub position: usize,
    pub command: String,
    pub error: ShellError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// What happened to a pipeline once every stage finished.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    stages: usize,
    failures: Vec<StageFailure>,
}

impl PipelineOutcome {
    /// Number of stages that were run.
    pub fn stages(&self) -> usize {
        self.stages
    }

    /// Per-stage failures, in the order the stages finished.
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Launch every stage on its own thread and wait until all of them are done.
///
/// A failing stage never cancels its siblings; whatever it was connected to
/// simply sees its end of the pipe close.
pub fn execute(stages: Vec<Executable>) -> PipelineOutcome {
    let total = stages.len();
    let mut failures = Vec::new();
    let mut handles = Vec::with_capacity(total);
    let (done_tx, done_rx) = mpsc::channel();

    for (position, stage) in stages.into_iter().enumerate() {
        let command = stage.name().to_owned();
        let done_tx = done_tx.clone();
        let task_command = command.clone();
        let spawned = thread::Builder::new()
            .name(format!("stage-{position}"))
            .spawn(move || {
                tracing::debug!(position, command = %task_command, "stage started");
                let result = stage.run();
                // the receiver outlives every stage, so this cannot fail
                let _ = done_tx.send((position, task_command, result));
            });
        match spawned {
            Ok(handle) => handles.push((position, command, handle)),
            // the stage is dropped with the closure, closing its pipe ends
            Err(e) => failures.push(StageFailure {
                position,
                command: command.clone(),
                error: ShellError::os(format!("{command}: cannot start stage"), e),
            }),
        }
    }
    drop(done_tx);

    // ends once every stage has dropped its sender, i.e. every stage is done
    for (position, command, result) in done_rx {
        match result {
            Ok(()) => tracing::trace!(position, %command, "stage finished"),
            Err(error) => {
                tracing::warn!(position, %command, %error, "stage failed");
                failures.push(StageFailure {
                    position,
                    command,
                    error,
                });
            }
        }
    }

    for (position, command, handle) in handles {
        if handle.join().is_err() {
            tracing::warn!(position, %command, "stage panicked");
            failures.push(StageFailure {
                position,
                error: ShellError::Panicked {
                    command: command.clone(),
                },
                command,
            });
        }
    }

    PipelineOutcome {
        stages: total,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{MemReader, MemWriter};
    use crate::pipeline::Pipeline;
    use crate::registry::Registry;
    use std::io::{self, Read, Write};

    fn identity(_args: &[String], stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        io::copy(stdin, stdout)?;
        Ok(())
    }

    fn run(registry: &Registry, line: &str, input: impl Into<Vec<u8>>) -> (PipelineOutcome, Vec<u8>) {
        let out = MemWriter::new();
        let pipeline = Pipeline::build(
            line,
            registry,
            Box::new(MemReader::new(input)),
            Box::new(out.clone()),
        )
        .unwrap()
        .unwrap();
        (pipeline.execute(), out.contents())
    }

    #[test]
    fn test_pass_through_chain_preserves_bytes() {
        let mut registry = Registry::new();
        registry.register("id", identity);

        // larger than a pipe buffer, so the stages must run concurrently
        let input: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
        let (outcome, out) = run(&registry, "id | id | id", input.clone());

        assert!(outcome.is_success(), "{:?}", outcome.failures());
        assert_eq!(outcome.stages(), 3);
        assert_eq!(out, input);
    }

    #[test]
    fn test_middle_failure_does_not_cancel_siblings() {
        let mut registry = Registry::with_builtins();
        registry.register("id", identity);
        registry.register("reject", |_args, _stdin, _stdout| {
            Err(ShellError::invalid_argument("reject", "no"))
        });

        let (outcome, out) = run(&registry, "id | reject | echo done", "some input\n");

        assert_eq!(outcome.stages(), 3);
        let invalid: Vec<_> = outcome
            .failures()
            .iter()
            .filter(|f| matches!(f.error, ShellError::InvalidArgument { .. }))
            .collect();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].position, 1);
        assert_eq!(invalid[0].command, "reject");
        // `id` may or may not still be writing when `reject` drops its input
        assert!(
            outcome
                .failures()
                .iter()
                .filter(|f| f.position != 1)
                .all(|f| f.position == 0 && f.error.is_broken_pipe())
        );
        assert_eq!(out, b"done\n");
    }

    #[test]
    fn test_every_failure_is_reported() {
        let mut registry = Registry::new();
        registry.register("bad", |args, _stdin, _stdout| {
            Err(ShellError::invalid_argument("bad", args.join(" ")))
        });

        let (outcome, _) = run(&registry, "bad 1 | bad 2 | bad 3", "");

        let mut positions: Vec<usize> = outcome.failures().iter().map(|f| f.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_echo_into_echo_shows_only_last() {
        let (outcome, out) = run(&Registry::with_builtins(), "echo a | echo b", "");
        assert_eq!(out, b"b\n");
        // the first echo only fails if the second one has already exited
        for failure in outcome.failures() {
            assert_eq!(failure.position, 0);
            assert!(failure.error.is_broken_pipe(), "{failure}");
        }
    }

    #[test]
    fn test_missing_binary_fails_its_stage_only() {
        let (outcome, out) = run(
            &Registry::with_builtins(),
            "echo hi | nonexistent_binary_xyz | echo after",
            "",
        );
        let hard: Vec<_> = outcome
            .failures()
            .iter()
            .filter(|f| !f.error.is_broken_pipe())
            .collect();
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].position, 1);
        assert!(matches!(hard[0].error, ShellError::CommandNotFound(_)));
        assert_eq!(out, b"after\n");
    }

    #[test]
    fn test_panicking_stage_is_reported() {
        let mut registry = Registry::with_builtins();
        registry.register("boom", |_args, _stdin, _stdout| panic!("boom"));

        let (outcome, out) = run(&registry, "boom | echo still here", "");

        assert_eq!(outcome.failures().len(), 1);
        assert!(matches!(
            outcome.failures()[0].error,
            ShellError::Panicked { .. }
        ));
        assert_eq!(out, b"still here\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_builtins_and_programs_share_pipes() {
        let (outcome, out) = run(
            &Registry::with_builtins(),
            "cat | tr a-z A-Z | grep -v SKIP | wc",
            "one two\nskip me\nthree\n",
        );
        assert!(outcome.is_success(), "{:?}", outcome.failures());
        assert_eq!(out, b"2 3 14\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_early_exit_downstream_fails_the_writer() {
        // `head` stops reading long before `cat` is done writing
        let input = "line\n".repeat(100_000);
        let (outcome, out) = run(&Registry::with_builtins(), "cat | head -n 1", input);
        assert_eq!(out, b"line\n");
        assert_eq!(outcome.failures().len(), 1, "{:?}", outcome.failures());
        let failure = &outcome.failures()[0];
        assert_eq!((failure.position, failure.command.as_str()), (0, "cat"));
        assert!(matches!(failure.error, ShellError::Os { .. }));
        assert!(failure.error.is_broken_pipe());
    }

    #[test]
    #[cfg(unix)]
    fn test_program_killed_by_sigpipe_is_reported() {
        let (outcome, out) = run(&Registry::with_builtins(), "yes | head -n 2", "");
        assert_eq!(out, b"y\ny\n");
        assert_eq!(outcome.failures().len(), 1, "{:?}", outcome.failures());
        let failure = &outcome.failures()[0];
        assert_eq!(failure.command, "yes");
        assert!(matches!(failure.error, ShellError::Process { .. }));
        assert!(failure.error.is_broken_pipe());
    }
}
