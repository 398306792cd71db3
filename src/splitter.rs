//! Statement splitter.
//!
//! Turns a byte stream into a lazy sequence of statements, splitting on a
//! delimiter that is only honoured outside quoted literals, quoted
//! identifiers and comments. Input is read one line at a time, so scripts of
//! any size are split without being loaded whole.
//!
//! Comments found outside quoted regions are dropped from the emitted text.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};

use crate::error::{PortError, Result};

/// Lexical rules the splitter follows. Each dialect supplies its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Statement delimiter, `;` by default.
    pub delimiter: String,
    /// `#` starts a line comment (MySQL).
    pub hash_comments: bool,
    /// Backslash escapes the next character inside string literals (MySQL).
    pub backslash_escapes: bool,
    /// `$tag$ ... $tag$` bodies (PostgreSQL).
    pub dollar_quotes: bool,
    /// `[name]` quoted identifiers (SQLite).
    pub bracket_identifiers: bool,
    /// Honour `DELIMITER xx` lines that switch the delimiter (MySQL client).
    pub delimiter_directive: bool,
    /// Keep `BEGIN ... END` blocks of `CREATE TRIGGER` whole (SQLite).
    pub block_keywords: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            hash_comments: false,
            backslash_escapes: false,
            dollar_quotes: false,
            bracket_identifiers: false,
            delimiter_directive: false,
            block_keywords: false,
        }
    }
}

impl SplitOptions {
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }
}

/// One delimiter-bounded unit of SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Position among the non-blank statements of the script, from 0.
    pub seq: u64,
    /// Line on which the statement starts, from 1.
    pub line: usize,
    /// Statement text, trimmed, without its delimiter.
    pub text: String,
}

impl Statement {
    pub fn new(seq: u64, line: usize, text: impl Into<String>) -> Self {
        Self {
            seq,
            line,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    Bracket,
    Dollar { tag: String, body_start: usize },
    BlockComment,
    LineComment,
}

/// Lazy, non-restartable statement iterator over a reader.
///
/// Yields `Ok(Statement)` for every non-blank statement, `Err` on an I/O
/// failure or an unterminated quote or comment, then `None` forever.
pub struct StatementSplitter<R> {
    reader: BufReader<R>,
    options: SplitOptions,
    delimiter: String,
    line: String,
    line_no: usize,
    state: State,
    state_line: usize,
    buf: String,
    start_line: usize,
    pending: VecDeque<Statement>,
    next_seq: u64,
    word: String,
    first_word: Option<String>,
    words_seen: usize,
    object_word: usize,
    in_trigger: bool,
    block_depth: usize,
    split_pending: bool,
    done: bool,
}

impl<R: Read> StatementSplitter<R> {
    pub fn new(reader: R, options: SplitOptions) -> Self {
        let delimiter = options.delimiter.clone();
        Self {
            reader: BufReader::new(reader),
            options,
            delimiter,
            line: String::new(),
            line_no: 0,
            state: State::Normal,
            state_line: 0,
            buf: String::new(),
            start_line: 0,
            pending: VecDeque::new(),
            next_seq: 0,
            word: String::new(),
            first_word: None,
            words_seen: 0,
            object_word: 1,
            in_trigger: false,
            block_depth: 0,
            split_pending: false,
            done: false,
        }
    }

    /// Splitter with default options and the given delimiter.
    pub fn with_delimiter(reader: R, delimiter: &str) -> Self {
        Self::new(reader, SplitOptions::default().with_delimiter(delimiter))
    }

    /// The delimiter currently in force (a `DELIMITER` directive may change it).
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Read the next statement, `Ok(None)` at end of input.
    pub fn read_statement(&mut self) -> Result<Option<Statement>> {
        self.next().transpose()
    }

    fn process_line(&mut self) {
        let line = std::mem::take(&mut self.line);

        if self.options.delimiter_directive
            && self.state == State::Normal
            && self.buf.trim().is_empty()
            && let Some(delimiter) = parse_delimiter_directive(&line)
        {
            self.delimiter = delimiter.to_string();
            self.reset_statement();
            self.line = line;
            return;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            self.resolve_split(Some(c));

            match &self.state {
                State::Normal => {
                    if c == '-' && next == Some('-') {
                        self.end_word();
                        self.state = State::LineComment;
                        self.buf.push(' ');
                        i += 2;
                        continue;
                    }
                    if c == '#' && self.options.hash_comments {
                        self.end_word();
                        self.state = State::LineComment;
                        self.buf.push(' ');
                        i += 1;
                        continue;
                    }
                    if c == '/' && next == Some('*') {
                        self.end_word();
                        self.state = State::BlockComment;
                        self.state_line = self.line_no;
                        self.buf.push(' ');
                        i += 2;
                        continue;
                    }
                    if c == '$'
                        && self.options.dollar_quotes
                        && let Some(tag) = dollar_tag(&chars[i..])
                    {
                        self.end_word();
                        self.push_content(&tag);
                        let body_start = self.buf.len();
                        i += tag.chars().count();
                        self.state = State::Dollar { tag, body_start };
                        self.state_line = self.line_no;
                        continue;
                    }

                    let opened = match c {
                        '\'' => Some(State::SingleQuote),
                        '"' => Some(State::DoubleQuote),
                        '`' => Some(State::Backtick),
                        '[' if self.options.bracket_identifiers => Some(State::Bracket),
                        _ => None,
                    };
                    if let Some(state) = opened {
                        self.end_word();
                        self.state = state;
                        self.state_line = self.line_no;
                        self.push_char(c);
                        i += 1;
                        continue;
                    }

                    if is_word_char(c) {
                        self.word.push(c.to_ascii_uppercase());
                    } else {
                        self.end_word();
                    }
                    self.push_char(c);
                    self.check_delimiter();
                }
                State::SingleQuote => {
                    self.buf.push(c);
                    if c == '\\' && self.options.backslash_escapes {
                        if let Some(n) = next {
                            self.buf.push(n);
                            i += 1;
                        }
                    } else if c == '\'' {
                        self.state = State::Normal;
                    }
                }
                State::DoubleQuote => {
                    self.buf.push(c);
                    if c == '"' {
                        self.state = State::Normal;
                    }
                }
                State::Backtick => {
                    self.buf.push(c);
                    if c == '`' {
                        self.state = State::Normal;
                    }
                }
                State::Bracket => {
                    self.buf.push(c);
                    if c == ']' {
                        self.state = State::Normal;
                    }
                }
                State::Dollar { tag, body_start } => {
                    self.buf.push(c);
                    if self.buf.len() >= body_start + tag.len() && self.buf.ends_with(tag.as_str()) {
                        self.state = State::Normal;
                    }
                }
                State::BlockComment => {
                    if c == '*' && next == Some('/') {
                        self.state = State::Normal;
                        i += 2;
                        continue;
                    }
                }
                State::LineComment => {
                    if c == '\n' {
                        self.state = State::Normal;
                        self.buf.push('\n');
                    }
                }
            }
            i += 1;
        }

        self.line = line;
    }

    fn push_char(&mut self, c: char) {
        if !c.is_whitespace() && self.buf.trim().is_empty() {
            self.start_line = self.line_no;
        }
        self.buf.push(c);
    }

    fn push_content(&mut self, s: &str) {
        for c in s.chars() {
            self.push_char(c);
        }
    }

    fn end_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word);
        let position = self.words_seen;
        self.words_seen += 1;
        if self.first_word.is_none() {
            self.first_word = Some(word.clone());
        }
        if !self.options.block_keywords || self.first_word.as_deref() != Some("CREATE") {
            return;
        }
        match word.as_str() {
            "TEMP" | "TEMPORARY" if position == 1 => self.object_word = 2,
            "TRIGGER" if position == self.object_word => self.in_trigger = true,
            "BEGIN" | "CASE" if self.in_trigger => self.block_depth += 1,
            "END" if self.in_trigger => self.block_depth = self.block_depth.saturating_sub(1),
            _ => {}
        }
    }

    fn check_delimiter(&mut self) {
        if self.block_depth > 0 || !self.buf.ends_with(self.delimiter.as_str()) {
            return;
        }
        let end = self.buf.len() - self.delimiter.len();
        // A word-like delimiter such as `GO` only counts as a whole word.
        if self.delimiter.starts_with(is_word_char)
            && self.buf[..end].chars().next_back().is_some_and(is_word_char)
        {
            return;
        }
        if self.delimiter.ends_with(is_word_char) {
            self.split_pending = true;
            return;
        }
        self.split_off(end);
    }

    /// Settle a delimiter match that waited for the following character.
    fn resolve_split(&mut self, next: Option<char>) {
        if !self.split_pending {
            return;
        }
        self.split_pending = false;
        if next.is_some_and(is_word_char) {
            return;
        }
        let end = self.buf.len() - self.delimiter.len();
        self.split_off(end);
    }

    fn split_off(&mut self, end: usize) {
        self.buf.truncate(end);
        self.emit();
    }

    fn emit(&mut self) {
        let text = self.buf.trim();
        if !text.is_empty() {
            self.pending
                .push_back(Statement::new(self.next_seq, self.start_line, text));
            self.next_seq += 1;
        }
        self.reset_statement();
    }

    fn reset_statement(&mut self) {
        self.buf.clear();
        self.word.clear();
        self.first_word = None;
        self.words_seen = 0;
        self.object_word = 1;
        self.in_trigger = false;
        self.block_depth = 0;
        self.split_pending = false;
    }

    fn finish(&mut self) -> Result<()> {
        let unterminated = match &self.state {
            State::SingleQuote => Some("unterminated string literal"),
            State::DoubleQuote | State::Backtick | State::Bracket => {
                Some("unterminated quoted identifier")
            }
            State::Dollar { .. } => Some("unterminated dollar-quoted string"),
            State::BlockComment => Some("unterminated block comment"),
            State::Normal | State::LineComment => None,
        };
        if let Some(message) = unterminated {
            return Err(PortError::split(self.state_line, message));
        }
        self.resolve_split(None);
        self.end_word();
        self.emit();
        Ok(())
    }
}

impl<R: Read> Iterator for StatementSplitter<R> {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(statement) = self.pending.pop_front() {
                return Some(Ok(statement));
            }
            if self.done {
                return None;
            }

            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    self.done = true;
                    if let Err(e) = self.finish() {
                        return Some(Err(e));
                    }
                }
                Ok(_) => {
                    self.line_no += 1;
                    self.process_line();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for StatementSplitter<R> {}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `DELIMITER xx` → `xx`.
fn parse_delimiter_directive(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let keyword = trimmed.get(..9)?;
    if !keyword.eq_ignore_ascii_case("DELIMITER") {
        return None;
    }
    let rest = &trimmed[9..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let delimiter = rest.trim();
    (!delimiter.is_empty()).then_some(delimiter)
}

/// Opening tag of a dollar-quoted string: `$$` or `$name$`.
fn dollar_tag(chars: &[char]) -> Option<String> {
    let mut j = 1;
    match chars.get(1) {
        Some('$') => return Some("$$".to_string()),
        Some(c) if c.is_alphabetic() || *c == '_' => {}
        _ => return None,
    }
    while let Some(c) = chars.get(j) {
        if *c == '$' {
            return Some(chars[..=j].iter().collect());
        }
        if !is_word_char(*c) {
            return None;
        }
        j += 1;
    }
    None
}
