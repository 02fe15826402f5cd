//! A module implementing word splitting for script and interactive lines.
//!
//! The grammar is deliberately flat: words are separated by whitespace, and a word
//! that starts with a double quote runs to the matching closing quote, whitespace
//! included. There are no escapes, variables, pipes or redirections.

/// Result of splitting one line into words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Words {
    /// The words in left-to-right order. The first one is the command name.
    pub words: Vec<String>,
    /// Set when the line ended inside a quoted run. The partial word is still
    /// present as the last element of `words`.
    pub unterminated_quote: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    /// Creates a new instance of the word splitting Finite State Machine.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    fn make_words(mut self) -> Words {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingQuote => self.handle_quote(ch, &mut out),
            }
        }

        let unterminated_quote = self.state == LexingState::ReadingQuote;
        if self.state != LexingState::Start {
            out.push(std::mem::take(&mut self.buffer));
        }

        Words {
            words: out,
            unterminated_quote,
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => {}
            '"' => self.state = LexingState::ReadingQuote,
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if c.is_whitespace() => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            // Quotes only open a quoted word at the start of a word.
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            // The closing quote also ends the word: `"bar"baz` is `bar` then `baz`.
            '"' => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            c => self.buffer.push(c),
        }
    }
}

/// Split a line into words, keeping track of an unterminated quote.
pub fn lex(line: &str) -> Words {
    LexingFSM::new(line).make_words()
}

/// Split a line into its argument list.
///
/// Whitespace separates words. A word that starts with `"` ends at the next `"` and
/// may contain whitespace; the quotes are removed. A `"` inside an unquoted word is
/// an ordinary character. An unterminated quote is accepted and extends to the end
/// of the line.
///
/// ```
/// use script_shell::lexer::split_into_words;
/// assert_eq!(split_into_words(r#"foo "bar baz" qux"#), vec!["foo", "bar baz", "qux"]);
/// ```
pub fn split_into_words(line: &str) -> Vec<String> {
    lex(line).words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_run_is_one_word() {
        assert_eq!(
            split_into_words(r#"foo "bar baz" qux"#),
            vec!["foo", "bar baz", "qux"]
        );
    }

    #[test]
    fn empty_and_blank_lines_have_no_words() {
        assert!(split_into_words("").is_empty());
        assert!(split_into_words("   \t ").is_empty());
    }

    #[test]
    fn repeated_whitespace_and_carriage_return() {
        assert_eq!(split_into_words("  ls\t -l  /tmp\r"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn quote_inside_a_word_is_literal() {
        assert_eq!(split_into_words(r#"a"b c"d e"#), vec![r#"a"b"#, r#"c"d"#, "e"]);
    }

    #[test]
    fn closing_quote_ends_the_word() {
        assert_eq!(split_into_words(r#""bar"baz"#), vec!["bar", "baz"]);
        assert_eq!(split_into_words(r#"x "a b"c"#), vec!["x", "a b", "c"]);
    }

    #[test]
    fn empty_quotes_make_an_empty_word() {
        assert_eq!(split_into_words(r#"printf "" x"#), vec!["printf", "", "x"]);
    }

    #[test]
    fn unterminated_quote_keeps_partial_word() {
        let words = lex(r#"echo "hello world"#);
        assert!(words.unterminated_quote);
        assert_eq!(words.words, vec!["echo", "hello world"]);
    }

    #[test]
    fn terminated_quote_is_not_flagged() {
        let words = lex(r#"echo "hi""#);
        assert!(!words.unterminated_quote);
        assert_eq!(words.words, vec!["echo", "hi"]);
    }
}
