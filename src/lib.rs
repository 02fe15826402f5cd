//! A tiny line-oriented command runner with serial and parallel script inclusion.
//!
//! Every input line is split into words and started as an external program. Two
//! composite verbs pull in another script, from a local file or a plain `http://`
//! URL, and run it either one command at a time (`SERIAL <ref>`) or with all of its
//! commands running at once (`PARALLEL <ref>`).
//!
//! The main entry point is [`Interpreter::process`]. Output is always written to an
//! explicit [`std::io::Write`] so the whole protocol can be captured in tests.

pub mod error;
pub mod input;
mod interpreter;
pub mod lexer;
pub mod process;
pub mod script;

pub use error::{DispatchError, ScriptError};
pub use input::{LineSource, Readline};
pub use interpreter::{EXIT_COMMAND, ExecutionMode, Interpreter, PARALLEL_VERB, SERIAL_VERB};
pub use process::{ExitCode, ProcessGroup, ProcessHandle, spawn};
