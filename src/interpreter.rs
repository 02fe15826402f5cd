use crate::error::{DispatchError, ScriptError};
use crate::input::LineSource;
use crate::lexer;
use crate::process::{self, ExitCode, ProcessGroup, ProcessHandle};
use crate::script;
use std::io::{self, Write};

/// Line that ends the current script (or the interactive session at top level).
pub const EXIT_COMMAND: &str = "exit";

/// Verb that runs a nested script one command at a time.
pub const SERIAL_VERB: &str = "SERIAL";

/// Verb that runs a nested script with all its commands at once.
pub const PARALLEL_VERB: &str = "PARALLEL";

/// How the commands of one script are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Wait for each command before reading the next line.
    #[default]
    Serial,
    /// Start every command right away and wait for all of them once the script ends.
    Parallel,
}

impl ExecutionMode {
    /// Mode selected by a composite verb, or `None` for an ordinary command name.
    pub fn for_verb(word: &str) -> Option<Self> {
        match word {
            SERIAL_VERB => Some(ExecutionMode::Serial),
            PARALLEL_VERB => Some(ExecutionMode::Parallel),
            _ => None,
        }
    }
}

/// Why a loop over one line source stopped early.
enum Halt {
    /// The line source failed. Local to the script being read.
    Read(io::Error),
    /// Writing to `out` failed. Ends every enclosing loop.
    Write(io::Error),
}

/// Reads lines, runs them as external commands and recurses into nested scripts.
///
/// Example
/// ```no_run
/// use script_shell::{ExecutionMode, Interpreter};
/// let mut sh = Interpreter::default();
/// let mut script = std::io::Cursor::new("true\nfalse\n");
/// sh.process(&mut script, "", ExecutionMode::Parallel, &mut std::io::stdout()).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Interpreter;

impl Interpreter {
    /// Run every line of `input` under `mode`, writing the protocol to `out`.
    ///
    /// The loop stops at end of input or at an `exit` line. In parallel mode the
    /// exit codes of all started commands are then reported in start order, also
    /// when `input` failed part way through. Bad lines are reported to `out` and
    /// skipped; only I/O failures on `input` or `out` are returned.
    pub fn process(
        &mut self,
        input: &mut dyn LineSource,
        prompt: &str,
        mode: ExecutionMode,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        self.run_lines(input, prompt, mode, out).map_err(|halt| match halt {
            Halt::Read(err) | Halt::Write(err) => err,
        })
    }

    /// Run the script named by `reference` to completion under `mode`.
    ///
    /// This is what `SERIAL <ref>` and `PARALLEL <ref>` do. A script that cannot be
    /// opened or read is a [`ScriptError`]; only output failures are
    /// [`DispatchError::Output`].
    pub fn run_script(
        &mut self,
        reference: &str,
        mode: ExecutionMode,
        out: &mut dyn Write,
    ) -> Result<(), DispatchError> {
        tracing::debug!(reference, ?mode, "running nested script");
        let mut lines = script::open_script(reference)?;
        match self.run_lines(&mut lines, "", mode, out) {
            Ok(()) => Ok(()),
            Err(Halt::Read(source)) => Err(ScriptError::Read {
                reference: reference.to_string(),
                source,
            }
            .into()),
            Err(Halt::Write(err)) => Err(DispatchError::Output(err)),
        }
    }

    fn run_lines(
        &mut self,
        input: &mut dyn LineSource,
        prompt: &str,
        mode: ExecutionMode,
        out: &mut dyn Write,
    ) -> Result<(), Halt> {
        let mut group = ProcessGroup::new();
        let mut outcome = self.dispatch_lines(input, prompt, mode, out, &mut group);

        if !group.is_empty() {
            tracing::debug!(pending = group.len(), "waiting for parallel commands");
        }
        for (_, code) in group.drain() {
            // Keep waiting after an output failure so no child is left unreaped.
            if matches!(outcome, Err(Halt::Write(_))) {
                continue;
            }
            if let Err(err) = report_exit(out, code) {
                outcome = Err(Halt::Write(err));
            }
        }
        outcome
    }

    fn dispatch_lines(
        &mut self,
        input: &mut dyn LineSource,
        prompt: &str,
        mode: ExecutionMode,
        out: &mut dyn Write,
        group: &mut ProcessGroup,
    ) -> Result<(), Halt> {
        while let Some(line) = input.next_line(prompt, out).map_err(Halt::Read)? {
            if line == EXIT_COMMAND {
                break;
            }
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let words = lexer::lex(&line);
            if words.unterminated_quote {
                tracing::warn!(%line, "unterminated quote, keeping the partial word");
            }
            let words = words.words;
            let Some(first) = words.first() else {
                continue;
            };
            tracing::debug!(?words, ?mode, "dispatching");

            match ExecutionMode::for_verb(first) {
                Some(nested) => match self.include(&words, nested, out) {
                    Ok(()) => {}
                    Err(DispatchError::Output(err)) => return Err(Halt::Write(err)),
                    Err(err) => report(out, &err).map_err(Halt::Write)?,
                },
                None => {
                    let handle = start(words, out).map_err(Halt::Write)?;
                    match mode {
                        ExecutionMode::Serial => {
                            report_exit(out, handle.wait()).map_err(Halt::Write)?
                        }
                        ExecutionMode::Parallel => group.push(handle),
                    }
                }
            }
        }
        Ok(())
    }

    fn include(
        &mut self,
        words: &[String],
        mode: ExecutionMode,
        out: &mut dyn Write,
    ) -> Result<(), DispatchError> {
        let reference = words
            .get(1)
            .ok_or_else(|| DispatchError::MissingScriptReference {
                verb: words[0].clone(),
            })?;
        if words.len() > 2 {
            tracing::warn!(ignored = ?&words[2..], "extra words after script reference");
        }
        self.run_script(reference, mode, out)
    }
}

fn start(args: Vec<String>, out: &mut dyn Write) -> io::Result<ProcessHandle> {
    write!(out, "Running:")?;
    for arg in &args {
        write!(out, " {}", arg)?;
    }
    writeln!(out)?;
    // The child shares our stdout; make sure the echo lands first.
    out.flush()?;
    Ok(process::spawn(args))
}

fn report_exit(out: &mut dyn Write, code: ExitCode) -> io::Result<()> {
    writeln!(out, "Exit code: {}", code)?;
    out.flush()
}

fn report(out: &mut dyn Write, err: &DispatchError) -> io::Result<()> {
    tracing::error!(%err, "line skipped");
    writeln!(out, "Error: {}", err)?;
    out.flush()
}
