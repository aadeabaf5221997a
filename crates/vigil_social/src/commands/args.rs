//! Argument parsing for administrator commands.
//!
//! Commands are whitespace separated words. Double quotes group words
//! (`category add "Bug Reports"`) and may appear inside a word
//! (`field="Order number"`). Channel, user and role mentions are accepted
//! wherever an ID is expected.

use std::collections::{BTreeSet, VecDeque};
use std::str::FromStr;
use vigil_error::{CommandError, CommandErrorKind, CommandResult};

/// Split `input` into words, honouring double quotes.
///
/// # Examples
///
/// ```
/// use vigil_social::tokenize;
///
/// assert_eq!(
///     tokenize(r#"category edit "Bug Reports" emoji=🐛"#),
///     vec!["category", "edit", "Bug Reports", "emoji=🐛"]
/// );
/// ```
pub fn tokenize(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

/// Parse a raw ID or a channel, user or role mention.
///
/// # Examples
///
/// ```
/// use vigil_social::parse_snowflake;
///
/// assert_eq!(parse_snowflake("<#123>"), Some(123));
/// assert_eq!(parse_snowflake("<@!42>"), Some(42));
/// assert_eq!(parse_snowflake("<@&7>"), Some(7));
/// assert_eq!(parse_snowflake("99"), Some(99));
/// assert_eq!(parse_snowflake("general"), None);
/// ```
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let inner = match raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        Some(inner) => inner
            .strip_prefix("@&")
            .or_else(|| inner.strip_prefix("@!"))
            .or_else(|| inner.strip_prefix('@'))
            .or_else(|| inner.strip_prefix('#'))?,
        None => raw,
    };
    inner.parse().ok()
}

/// Parse a comma separated list of IDs or mentions. `none` is the empty set.
pub fn parse_id_list(raw: &str) -> Option<BTreeSet<u64>> {
    if raw.eq_ignore_ascii_case("none") {
        return Some(BTreeSet::new());
    }
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_snowflake)
        .collect()
}

/// Parse an on/off style switch.
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "enable" | "enabled" | "1" => Some(true),
        "off" | "false" | "no" | "disable" | "disabled" | "0" => Some(false),
        _ => None,
    }
}

/// Remaining words of a command, consumed front to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    command: String,
    words: VecDeque<String>,
}

impl Args {
    /// Words for `command`; the name is used in error messages.
    pub fn new(command: impl Into<String>, words: impl IntoIterator<Item = String>) -> Self {
        Self {
            command: command.into(),
            words: words.into_iter().collect(),
        }
    }

    /// Command path consumed so far, such as `ticket category`.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// True when every word was consumed.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Next word, if any.
    pub fn next_word(&mut self) -> Option<String> {
        self.words.pop_front()
    }

    /// Consume the next word as a subcommand and extend the command path.
    pub fn subcommand(&mut self) -> Option<String> {
        let word = self.words.pop_front()?.to_lowercase();
        self.command = format!("{} {}", self.command, word);
        Some(word)
    }

    /// Next word, or a missing argument error naming `arg`.
    pub fn require(&mut self, arg: &str) -> CommandResult<String> {
        self.words.pop_front().ok_or_else(|| self.missing(arg))
    }

    /// Every remaining word joined by spaces, or `None` if there are none.
    pub fn rest(&mut self) -> Option<String> {
        if self.words.is_empty() {
            return None;
        }
        let words: Vec<String> = self.words.drain(..).collect();
        Some(words.join(" "))
    }

    /// Every remaining word joined by spaces, which must not be empty.
    pub fn require_rest(&mut self, arg: &str) -> CommandResult<String> {
        self.rest().ok_or_else(|| self.missing(arg))
    }

    /// Next word parsed as `T`.
    pub fn parse<T: FromStr>(&mut self, arg: &str) -> CommandResult<T> {
        let raw = self.require(arg)?;
        raw.parse()
            .map_err(|_| self.invalid(arg, format!("`{}` is not valid", raw)))
    }

    /// Next word as an ID or mention.
    pub fn snowflake(&mut self, arg: &str) -> CommandResult<u64> {
        let raw = self.require(arg)?;
        parse_snowflake(&raw).ok_or_else(|| self.invalid(arg, format!("`{}` is not an ID or mention", raw)))
    }

    /// Next word as an ID or mention, falling back to `default` when absent.
    pub fn snowflake_or(&mut self, arg: &str, default: u64) -> CommandResult<u64> {
        if self.is_empty() {
            Ok(default)
        } else {
            self.snowflake(arg)
        }
    }

    /// Remaining words as `key=value` pairs with lowercase keys.
    pub fn key_values(&mut self) -> CommandResult<Vec<(String, String)>> {
        let mut pairs = Vec::new();
        while let Some(word) = self.words.pop_front() {
            let Some((key, value)) = word.split_once('=') else {
                return Err(self.invalid("argument", format!("expected key=value, got `{}`", word)));
            };
            pairs.push((key.trim().to_lowercase(), value.trim().to_string()));
        }
        Ok(pairs)
    }

    /// Missing argument error for this command.
    #[track_caller]
    pub fn missing(&self, arg: &str) -> CommandError {
        CommandError::new(CommandErrorKind::MissingArgument {
            command: self.command.clone(),
            arg: arg.to_string(),
        })
    }

    /// Invalid argument error for this command.
    #[track_caller]
    pub fn invalid(&self, arg: &str, reason: impl Into<String>) -> CommandError {
        CommandError::new(CommandErrorKind::InvalidArgument {
            command: self.command.clone(),
            arg: arg.to_string(),
            reason: reason.into(),
        })
    }

    /// Unknown subcommand error naming the command path consumed so far.
    #[track_caller]
    pub fn unknown(&self) -> CommandError {
        CommandError::new(CommandErrorKind::UnknownCommand(self.command.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_groups_quotes_anywhere() {
        assert_eq!(
            tokenize(r#"edit  "Bug Reports"  field="Order number" x"#),
            vec!["edit", "Bug Reports", "field=Order number", "x"]
        );
        assert_eq!(tokenize(r#"add """#), vec!["add", ""]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_id_lists() {
        let ids = parse_id_list("<@&1>, 2,<@&3>").expect("ids");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("none"), Some(BTreeSet::new()));
        assert_eq!(parse_id_list("1,abc"), None);
    }

    #[test]
    fn test_args_errors_name_the_command_path() {
        let mut args = Args::new("scan", vec!["ratelimit".to_string(), "five".to_string()]);
        assert_eq!(args.subcommand().as_deref(), Some("ratelimit"));
        let err = args.parse::<u32>("per_user").expect_err("not a number");
        assert_eq!(
            err.user_message(),
            "`scan ratelimit`: invalid per_user (`five` is not valid)"
        );
        let err = args.require("window_minutes").expect_err("missing");
        assert_eq!(err.user_message(), "`scan ratelimit` needs a window_minutes argument");
    }

    #[test]
    fn test_key_values_require_equals() {
        let mut args = Args::new("ticket roles", vec!["support=<@&1>".into(), "Admin=2".into()]);
        assert_eq!(
            args.key_values().expect("pairs"),
            vec![
                ("support".to_string(), "<@&1>".to_string()),
                ("admin".to_string(), "2".to_string())
            ]
        );
        let mut bad = Args::new("ticket roles", vec!["support".into()]);
        assert!(bad.key_values().is_err());
    }
}
