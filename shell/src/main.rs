use anyhow::Context;
use argh::FromArgs;
use pipeshell::{DEFAULT_PROMPT, Editor, Interpreter, StdTerminal, StdinLines};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small interactive shell with built-ins and `|` pipelines.
struct Args {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt shown before every line
    prompt: String,

    #[argh(switch)]
    /// read plain lines from stdin even when it is a terminal
    plain: bool,

    #[argh(option)]
    /// file to load line-editor history from and save it to
    history: Option<PathBuf>,

    #[argh(option, default = "String::from(\"warn\")")]
    /// log filter used when RUST_LOG is not set
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid --log-level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let shell = Interpreter::default().with_prompt(args.prompt);

    // every stage of a line is waited for before the next line is read,
    // so nothing is left running when input ends
    if std::io::stdin().is_terminal() && !args.plain {
        let mut editor = Editor::new(args.history).context("starting line editor")?;
        shell.run(&mut editor, &StdTerminal)?;
        editor.save_history().context("saving history")?;
    } else {
        shell.run(&mut StdinLines, &StdTerminal)?;
    }
    Ok(())
}
