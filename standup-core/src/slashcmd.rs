//! Parser for `/command arg …` strings.
//!
//! Parsing rules:
//!
//! - The first character must be `/`, immediately followed by the method name
//!   (an empty method is not a command).
//! - The tail after the first space is split into args on whitespace, except
//!   that `"` toggles a quoted region (the quote itself is not emitted) and
//!   `\` escapes the next character, emitting it literally. A trailing
//!   unescaped `\` is discarded.
//! - Empty args are not emitted.
//!
//! Examples:
//!
//! ```text
//! doesnt start with slash   => None
//! /foo                      => foo, []
//! /foo bar                  => foo, ["bar"]
//! /foo "not bar"            => foo, ["not bar"]
//! /foo not\ bar             => foo, ["not bar"]
//! /foo bar \                => foo, ["bar"]
//! ```

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub method: String,
    pub args: Vec<String>,
}

impl Command {
    /// Finds `key` in the args and returns the arg right after it.
    pub fn next_after(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == key)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }
}

/// Parses a string into a [`Command`]. Returns `None` if the string is not a
/// command.
pub fn parse(source: &str) -> Option<Command> {
    let (first_word, words_after) = match source.split_once(' ') {
        Some((first, rest)) => (first, rest),
        None => (source, ""),
    };

    let method = first_word.strip_prefix('/')?;
    if method.is_empty() {
        return None;
    }

    Some(Command {
        method: method.to_string(),
        args: split_args(words_after),
    })
}

fn split_args(source: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut is_quoted = false;
    let mut is_escaped = false;

    for ch in source.chars() {
        if ch == '"' && !is_escaped {
            is_quoted = !is_quoted;
            continue;
        }

        if ch == '\\' && !is_escaped {
            is_escaped = true;
            continue;
        }

        if ch.is_whitespace() && !(is_quoted || is_escaped) {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }

        is_escaped = false;
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}
