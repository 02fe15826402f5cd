use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};

/// Something the interpreter can pull lines from.
///
/// A blanket implementation exists for every [`BufRead`] (files, sockets, stdin,
/// in-memory cursors); [`Readline`] provides an interactive line editor.
pub trait LineSource {
    /// Show `prompt` (when non-empty) and read the next line without its line ending.
    ///
    /// Returns `Ok(None)` at end of input.
    fn next_line(&mut self, prompt: &str, out: &mut dyn Write) -> io::Result<Option<String>>;
}

impl<T: BufRead + ?Sized> LineSource for T {
    fn next_line(&mut self, prompt: &str, out: &mut dyn Write) -> io::Result<Option<String>> {
        if !prompt.is_empty() {
            write!(out, "{}", prompt)?;
            out.flush()?;
        }
        let mut line = String::new();
        if self.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}

/// Interactive source backed by `rustyline`, with history.
///
/// The editor renders the prompt itself; Ctrl-C and Ctrl-D both end the session.
pub struct Readline {
    editor: DefaultEditor,
}

impl Readline {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for Readline {
    fn next_line(&mut self, prompt: &str, _out: &mut dyn Write) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        tracing::debug!(%err, "history entry not recorded");
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                tracing::info!("interrupted");
                Ok(None)
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_lines_without_endings() {
        let mut input = Cursor::new("first\r\nsecond\nlast");
        let mut out = Vec::new();
        assert_eq!(input.next_line("", &mut out).unwrap().as_deref(), Some("first"));
        assert_eq!(input.next_line("", &mut out).unwrap().as_deref(), Some("second"));
        assert_eq!(input.next_line("", &mut out).unwrap().as_deref(), Some("last"));
        assert_eq!(input.next_line("", &mut out).unwrap(), None);
        assert!(out.is_empty());
    }

    #[test]
    fn prompt_is_written_before_each_read() {
        let mut input = Cursor::new("a\n");
        let mut out = Vec::new();
        input.next_line("> ", &mut out).unwrap();
        input.next_line("> ", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "> > ");
    }
}
