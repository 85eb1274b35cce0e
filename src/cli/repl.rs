//! Parsing of interactive client input.

use std::collections::VecDeque;

/// Most recent commands remembered by `HISTORY`
pub const HISTORY_LIMIT: usize = 100;

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History,
    Status,
    ListServers,
    ListMessages,
    Send(String),
    Quit,
    /// Blank line
    Empty,
    Unknown(String),
}

impl Command {
    /// Parse a line of input. The command word is case-insensitive; the
    /// message of `SEND` keeps its case and inner spacing.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_start();
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (trimmed, ""),
        };

        match word.to_uppercase().as_str() {
            "" => Command::Empty,
            "HELP" => Command::Help,
            "HISTORY" => Command::History,
            "STATUS" => Command::Status,
            "LISTSERV" => Command::ListServers,
            "LSMSG" | "LISTMSG" => Command::ListMessages,
            "SEND" => Command::Send(rest.to_string()),
            "Q" | "QUIT" | "EXIT" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Bounded record of entered commands, oldest first
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: &str) {
        if self.entries.len() == HISTORY_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(line.trim_end().to_string());
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
