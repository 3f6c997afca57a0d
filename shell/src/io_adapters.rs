use crate::command::{Stdin, Stdout};
use std::io::{self, Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a pipeline's first stage reads from and its last stage writes to.
///
/// The shell asks for fresh handles for every line, so the terminal itself is
/// never moved into a pipeline.
pub trait Terminal {
    fn input(&self) -> IoResult<Box<dyn Stdin>>;
    fn output(&self) -> IoResult<Box<dyn Stdout>>;
}

/// The process's own stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn input(&self) -> IoResult<Box<dyn Stdin>> {
        Ok(Box::new(InheritedStdin(io::stdin())))
    }

    fn output(&self) -> IoResult<Box<dyn Stdout>> {
        Ok(Box::new(io::stdout()))
    }
}

/// Process stdin as a stage input. Child processes inherit the descriptor directly.
pub struct InheritedStdin(io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn Stdin>> {
        Ok(Stdio::inherit())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memory-backed reader. Clones share one cursor, so bytes consumed through one
/// clone are gone for the others.
#[derive(Clone)]
pub struct MemReader {
    cursor: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: Arc::new(Mutex::new(Cursor::new(buf.into()))),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        lock(&self.cursor).read(out)
    }
}

impl Stdin for MemReader {
    fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn Stdin>> {
        Err(self)
    }
}

/// Memory-backed writer. Clones append to the same buffer.
#[derive(Clone, Default)]
pub struct MemWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.buf).clone()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        lock(&self.buf).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn into_stdio(self: Box<Self>) -> Result<Stdio, Box<dyn Stdout>> {
        Err(self)
    }
}

/// A scripted terminal: input is a fixed byte string, output is captured.
///
/// Mostly useful for driving the shell in tests.
#[derive(Clone, Default)]
pub struct MemTerminal {
    input: MemReader,
    output: MemWriter,
}

impl Default for MemReader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemTerminal {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: MemReader::new(input),
            output: MemWriter::new(),
        }
    }

    /// Everything written to the terminal so far, lossily decoded.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output.contents()).into_owned()
    }
}

impl Terminal for MemTerminal {
    fn input(&self) -> IoResult<Box<dyn Stdin>> {
        Ok(Box::new(self.input.clone()))
    }

    fn output(&self) -> IoResult<Box<dyn Stdout>> {
        Ok(Box::new(self.output.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_reader_clones_share_position() {
        let mut a = MemReader::new("abcdef");
        let mut b = a.clone();

        let mut buf = [0u8; 3];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        let mut rest = String::new();
        b.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "def");
    }

    #[test]
    fn test_mem_terminal_collects_output_from_every_handle() {
        let term = MemTerminal::new("");
        term.output().unwrap().write_all(b"one ").unwrap();
        term.output().unwrap().write_all(b"two").unwrap();
        assert_eq!(term.output_string(), "one two");
    }

    #[test]
    fn test_in_memory_streams_are_not_os_backed() {
        let input: Box<dyn Stdin> = Box::new(MemReader::new("x"));
        assert!(input.into_stdio().is_err());
        let output: Box<dyn Stdout> = Box::new(MemWriter::new());
        assert!(output.into_stdio().is_err());
    }
}
