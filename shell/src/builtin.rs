use crate::error::ShellError;
use argh::{EarlyExit, FromArgs};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use regex::RegexBuilder;
use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::iter;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process, on the thread of the pipeline stage they occupy.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Flags accepted before the first operand, or `None` to let argh see every
    /// argument. With `Some`, everything after the leading flags is an operand,
    /// including `help` and words that start with `-`.
    const LEADING_FLAGS: Option<&'static [&'static str]> = None;

    /// Executes the command using provided IO streams.
    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError>;
}

/// Parse `args` as `T` and run it. This is what the registry stores for every builtin.
///
/// `--help` prints usage and succeeds; any other parse failure is an invalid argument.
/// Commands that set [`BuiltinCommand::LEADING_FLAGS`] take `--help` and
/// unknown dashed words as operands instead.
pub(crate) fn invoke<T: BuiltinCommand>(
    args: &[String],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    let args = argv::<T>(args);
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => cmd.execute(stdin, stdout),
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            stdout.write_all(output.as_bytes())?;
            Ok(())
        }
        Err(EarlyExit { output, .. }) => Err(ShellError::invalid_argument(
            T::name(),
            output.trim_end().to_owned(),
        )),
    }
}

fn argv<T: BuiltinCommand>(args: &[String]) -> Vec<&str> {
    let Some(flags) = T::LEADING_FLAGS else {
        return args.iter().map(String::as_str).collect();
    };
    let split = args
        .iter()
        .take_while(|arg| flags.contains(&arg.as_str()))
        .count();
    let (leading, operands) = args.split_at(split);
    leading
        .iter()
        .map(String::as_str)
        .chain(iter::once("--"))
        .chain(operands.iter().map(String::as_str))
        .collect()
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    const LEADING_FLAGS: Option<&'static [&'static str]> = Some(&[]);

    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let dir = env::current_dir().map_err(|e| ShellError::os("pwd", e))?;
        writeln!(stdout, "{}", dir.display())?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Change the current working directory of the shell process.
/// Without arguments nothing happens.
pub struct Cd {
    #[argh(positional, greedy)]
    /// path to switch to; several words are joined with single spaces.
    pub target: Vec<String>,
}

impl BuiltinCommand for Cd {
    const LEADING_FLAGS: Option<&'static [&'static str]> = Some(&[]);

    fn name() -> &'static str {
        "cd"
    }

    /// The working directory is process-wide. Pipelines run one at a time, so
    /// there is a single writer; running lines concurrently would need a lock here.
    fn execute(self, _stdin: &mut dyn Read, _stdout: &mut dyn Write) -> Result<(), ShellError> {
        if self.target.is_empty() {
            return Ok(());
        }
        let target = self.target.join(" ");
        env::set_current_dir(&target).map_err(|e| ShellError::os(format!("cd: {target}"), e))
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    const LEADING_FLAGS: Option<&'static [&'static str]> = Some(&["-n"]);

    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{s}")?;
        } else {
            writeln!(stdout, "{s}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Send SIGKILL to every listed process.
pub struct Kill {
    #[argh(positional, greedy)]
    /// process ids to terminate.
    pub pids: Vec<String>,
}

impl Kill {
    /// Any integer is a pid here; negative values address process groups.
    fn parse_pids(&self) -> Result<Vec<i32>, ShellError> {
        self.pids
            .iter()
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|_| ShellError::invalid_argument(Self::name(), format!("illegal pid: {raw}")))
            })
            .collect()
    }
}

impl BuiltinCommand for Kill {
    const LEADING_FLAGS: Option<&'static [&'static str]> = Some(&[]);

    fn name() -> &'static str {
        "kill"
    }

    /// Every pid is validated before any signal is sent. Delivery failures are
    /// reported on `stdout` and do not stop the remaining pids.
    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        if self.pids.is_empty() {
            return Err(ShellError::MissingArgument {
                command: Self::name().to_owned(),
            });
        }
        let pids = self.parse_pids()?;
        for pid in pids {
            if let Err(errno) = signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
                writeln!(stdout, "kill {pid}: {}", errno.desc())?;
            }
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout, or copy stdin when no file is given
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        if self.files.is_empty() {
            io::copy(stdin, stdout)?;
            return Ok(());
        }
        for fname in &self.files {
            let mut f = fs::File::open(fname).map_err(|e| ShellError::os(format!("cat: {fname}"), e))?;
            io::copy(&mut f, stdout)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct Wc {
    #[argh(positional, greedy)]
    /// files to count; stdin when none.
    pub files: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    lines: usize,
    words: usize,
    bytes: usize,
}

impl Counts {
    fn of(reader: &mut dyn Read) -> io::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf);
        Ok(Self {
            lines: buf.iter().filter(|&&b| b == b'\n').count(),
            words: text.split_whitespace().count(),
            bytes: buf.len(),
        })
    }
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        if self.files.is_empty() {
            let c = Counts::of(stdin)?;
            writeln!(stdout, "{} {} {}", c.lines, c.words, c.bytes)?;
            return Ok(());
        }
        for fname in &self.files {
            let mut f = fs::File::open(fname).map_err(|e| ShellError::os(format!("wc: {fname}"), e))?;
            let c = Counts::of(&mut f)?;
            writeln!(stdout, "{} {} {} {}", c.lines, c.words, c.bytes, fname)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(switch, short = 'v')]
    /// print the lines that do not match
    pub invert_match: bool,

    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,
}

impl Grep {
    fn filter(
        &self,
        re: &regex::Regex,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        prefix: &str,
    ) -> Result<(), ShellError> {
        for line in BufReader::new(reader).lines() {
            let line = line?;
            if re.is_match(&line) != self.invert_match {
                writeln!(stdout, "{prefix}{line}")?;
            }
        }
        Ok(())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let re = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map_err(|e| ShellError::invalid_argument(Self::name(), e.to_string()))?;

        if self.files.is_empty() {
            return self.filter(&re, stdin, stdout, "");
        }
        let many = self.files.len() > 1;
        for fname in &self.files {
            let mut f = fs::File::open(fname).map_err(|e| ShellError::os(format!("grep: {fname}"), e))?;
            let prefix = if many { format!("{fname}:") } else { String::new() };
            self.filter(&re, &mut f, stdout, &prefix)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// list running processes
pub struct Ps {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Ps {
    fn name() -> &'static str {
        "ps"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let entries = fs::read_dir("/proc").map_err(|e| ShellError::os("ps: /proc", e))?;
        let mut pids: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();

        writeln!(stdout, "{:>7} CMD", "PID")?;
        for pid in pids {
            // processes may exit between listing and reading
            let Ok(comm) = fs::read_to_string(format!("/proc/{pid}/comm")) else {
                continue;
            };
            writeln!(stdout, "{pid:>7} {}", comm.trim_end())?;
        }
        Ok(())
    }
}
