use anyhow::{Context, Result};
use argh::FromArgs;
use script_shell::{DispatchError, ExecutionMode, Interpreter, LineSource, Readline};
use std::io::{self, IsTerminal, Write};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(FromArgs)]
/// Run commands typed at the prompt, or run the given scripts.
/// Inside any script, `SERIAL <file-or-url>` and `PARALLEL <file-or-url>` run a nested script.
struct Args {
    #[argh(option, default = "String::from(\"> \")")]
    /// prompt shown before each interactive line
    prompt: String,

    #[argh(switch)]
    /// run top-level commands in parallel instead of one after another
    parallel: bool,

    #[argh(option)]
    /// tracing filter, e.g. `debug`; overrides RUST_LOG
    log: Option<String>,

    #[argh(switch)]
    /// read plain stdin instead of using the line editor
    no_editor: bool,

    #[argh(positional, greedy)]
    /// scripts (paths or http:// URLs) to run instead of an interactive session
    scripts: Vec<String>,
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "warn".to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_tracing(args.log.as_deref());

    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Serial
    };
    let mut interpreter = Interpreter::default();
    let mut out = io::stdout();

    if !args.scripts.is_empty() {
        for script in &args.scripts {
            match interpreter.run_script(script, mode, &mut out) {
                Ok(()) => {}
                Err(DispatchError::Output(err)) => {
                    return Err(err).context("writing to stdout");
                }
                Err(err) => {
                    tracing::error!(%err, %script, "script failed");
                    writeln!(out, "Error: {}", err)?;
                }
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut source: Box<dyn LineSource> = if !args.no_editor && stdin.is_terminal() {
        Box::new(
            Readline::new().map_err(|err| anyhow::anyhow!("starting line editor: {}", err))?,
        )
    } else {
        Box::new(stdin.lock())
    };

    tracing::debug!(?mode, "interactive session started");
    interpreter
        .process(&mut *source, &args.prompt, mode, &mut out)
        .context("interactive session")?;
    Ok(())
}
