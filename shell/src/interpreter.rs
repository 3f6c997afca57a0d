use crate::error::ShellError;
use crate::executor::PipelineOutcome;
use crate::io_adapters::Terminal;
use crate::pipeline::Pipeline;
use crate::registry::Registry;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "> ";

/// Something the shell can pull input lines from.
pub trait LineSource {
    /// Show `prompt` and return the next line without its terminator,
    /// or `None` once input has ended.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

fn strip_newline(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Lines from any buffered reader; the prompt is written to `prompt_out`.
pub struct ScriptLines<R, W> {
    reader: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> ScriptLines<R, W> {
    pub fn new(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for ScriptLines<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }
}

/// Lines from the process's stdin when it is not a terminal.
///
/// The stdin lock is only held while a line is being read, so the first stage
/// of a pipeline can read the same stream.
#[derive(Debug, Default)]
pub struct StdinLines;

impl LineSource for StdinLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }
}

/// Interactive line editing with history, backed by rustyline.
pub struct Editor {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl Editor {
    pub fn new(history: Option<PathBuf>) -> rustyline::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history {
            // a missing history file is normal on first start
            if let Err(e) = editor.load_history(path) {
                tracing::debug!(path = %path.display(), error = %e, "no history loaded");
            }
        }
        Ok(Self { editor, history })
    }

    pub fn save_history(&mut self) -> rustyline::Result<()> {
        match &self.history {
            Some(path) => self.editor.save_history(path),
            None => Ok(()),
        }
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor
                        .add_history_entry(line.as_str())
                        .map_err(io::Error::other)?;
                }
                Ok(Some(line))
            }
            // Ctrl-C drops the current line, like an ordinary shell
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

/// A minimal shell: reads lines, runs each one as a pipeline, reports failures.
///
/// Example
/// ```
/// use pipeshell::{Interpreter, MemTerminal};
/// let sh = Interpreter::default();
/// let term = MemTerminal::new("");
/// let outcome = sh.execute_line("echo hello world", &term).unwrap();
/// assert!(outcome.is_success());
/// assert_eq!(term.output_string(), "hello world\n");
/// ```
pub struct Interpreter {
    registry: Registry,
    prompt: String,
}

impl Interpreter {
    /// Create a new interpreter over a fixed set of built-ins.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            prompt: DEFAULT_PROMPT.to_owned(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Build and run the pipeline for one line.
    ///
    /// `Err` means nothing was started (bad syntax, no pipes left). Stage
    /// failures are in the returned outcome.
    pub fn execute_line(
        &self,
        line: &str,
        terminal: &dyn Terminal,
    ) -> Result<PipelineOutcome, ShellError> {
        let pipeline = Pipeline::build(line, &self.registry, terminal.input()?, terminal.output()?)?;
        Ok(pipeline.map(Pipeline::execute).unwrap_or_default())
    }

    /// Read-eval-print until input ends or the user types `exit`.
    ///
    /// Every failure gets its own `error: ...` line on the terminal; none of
    /// them stops the loop.
    pub fn run(&self, lines: &mut dyn LineSource, terminal: &dyn Terminal) -> anyhow::Result<()> {
        while let Some(line) = lines.read_line(&self.prompt).context("reading input")? {
            if line.trim() == "exit" {
                break;
            }
            let mut out = terminal.output().context("opening terminal output")?;
            match self.execute_line(&line, terminal) {
                Ok(outcome) => {
                    for failure in outcome.failures() {
                        writeln!(out, "error: {failure}")?;
                    }
                }
                Err(e) => {
                    tracing::debug!(%line, error = %e, "line rejected");
                    writeln!(out, "error: {e}")?;
                }
            }
            out.flush()?;
        }
        tracing::debug!("input ended");
        Ok(())
    }
}

impl Default for Interpreter {
    /// An interpreter with [`Registry::with_builtins`] and the default prompt.
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::MemTerminal;
    use crate::test_support::lock_current_dir;
    use std::env;
    use std::fs;
    use std::io::Cursor;

    fn session(script: &str, terminal: &MemTerminal) -> String {
        let sh = Interpreter::default();
        let mut lines = ScriptLines::new(Cursor::new(script.to_owned()), terminal.output().unwrap());
        sh.run(&mut lines, terminal).unwrap();
        terminal.output_string()
    }

    #[test]
    fn test_echo_line() {
        let out = session("echo hello world\n", &MemTerminal::new(""));
        assert_eq!(out, "> hello world\n> ");
    }

    #[test]
    fn test_failures_are_reported_and_loop_continues() {
        let out = session(
            "kill abc\necho a |\nnonexistent_binary_xyz\necho back\n",
            &MemTerminal::new(""),
        );
        assert_eq!(
            out,
            "> error: kill: illegal pid: abc\n\
             > error: parse error: no command in segment 2\n\
             > error: nonexistent_binary_xyz: command not found\n\
             > back\n\
             > "
        );
    }

    #[test]
    fn test_blank_lines_do_nothing() {
        let out = session("\n   \necho x\n", &MemTerminal::new(""));
        assert_eq!(out, "> > > x\n> ");
    }

    #[test]
    fn test_exit_stops_reading() {
        let out = session("echo one\nexit\necho two\n", &MemTerminal::new(""));
        assert_eq!(out, "> one\n> ");
    }

    #[test]
    fn test_first_stage_reads_terminal_input() {
        let term = MemTerminal::new("piped data\n");
        let sh = Interpreter::default();
        let outcome = sh.execute_line("cat | wc", &term).unwrap();
        assert!(outcome.is_success());
        assert_eq!(term.output_string(), "1 2 11\n");
    }

    #[test]
    fn test_cd_persists_between_lines() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let expected = fs::canonicalize(tmp.path()).unwrap();

        let script = format!("cd {}\npwd\n", tmp.path().display());
        let out = session(&script, &MemTerminal::new(""));
        env::set_current_dir(&orig).unwrap();

        assert_eq!(out, format!("> > {}\n> ", expected.display()));
    }

    #[test]
    fn test_custom_prompt() {
        let term = MemTerminal::new("");
        let sh = Interpreter::default().with_prompt("$ ");
        let mut lines = ScriptLines::new(Cursor::new("echo hi\n"), term.output().unwrap());
        sh.run(&mut lines, &term).unwrap();
        assert_eq!(term.output_string(), "$ hi\n$ ");
    }

    #[test]
    fn test_crlf_is_stripped() {
        assert_eq!(strip_newline("echo a\r\n".into()), "echo a");
        assert_eq!(strip_newline("echo a\n".into()), "echo a");
        assert_eq!(strip_newline("echo a".into()), "echo a");
    }
}
