//! Slash-command parsing.
//!
//! The command grammar is a Slack mention of a channel or user group, the
//! literal `to`, a task phrase, and an optional trailing frequency clause:
//!
//! ```text
//! <#C012X7LEUSV|general> to play music
//! <!subteam^S013R9HGXJ5|ops> to triage alerts every monday at 9am
//! ```
//!
//! Anything that does not match yields `None`, which callers turn into the
//! help message.

pub mod frequency;
pub mod trigger;

use std::sync::LazyLock;

use regex::Regex;

/// Lead words that signal the start of a frequency clause.
const FREQUENCY_PATTERN: &str = "(?:on|every|next|today|tomorrow) .+";

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^<(?:#|!subteam\^)(?P<target>[A-Z0-9]+)(?:\|[^>]+)?>\s+to (?P<task>.+?)\s*(?P<frequency>{FREQUENCY_PATTERN})?$"
    ))
    .unwrap()
});

static HELP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^help.*$").unwrap());
static LIST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*list\s*(all)?\s*$").unwrap());
static LIST_ALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*list\s*all\s*$").unwrap());

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Channel (`C…`) or user group (`S…`) to pick from.
    pub target: String,
    /// What the picked member is asked to do.
    pub task: String,
    /// Raw trailing frequency phrase, lead word included.
    pub frequency: Option<String>,
}

/// True if the command asks for help.
pub fn is_help_command(command: &str) -> bool {
    HELP_RE.is_match(command)
}

/// True for `list` (and `list all`), whitespace-tolerant.
pub fn is_list_command(command: &str) -> bool {
    LIST_RE.is_match(command)
}

/// True only for `list all`.
pub fn is_list_all_command(command: &str) -> bool {
    LIST_ALL_RE.is_match(command)
}

/// Parse a slash command. Returns `None` when the text does not match the
/// grammar; the caller shows the help message.
pub fn parse_command(command: &str) -> Option<Command> {
    let caps = COMMAND_RE.captures(command.trim())?;
    Some(Command {
        target: caps["target"].to_string(),
        task: caps["task"].to_string(),
        frequency: caps.name("frequency").map(|m| m.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_list_command() {
        assert!(is_list_command("list"));
        assert!(is_list_command("  list  "));
        assert!(is_list_command("list all"));
        assert!(!is_list_command("  list  stuff"));
        assert!(!is_list_command("<#C012X7LEUSV|general> to play music"));
    }

    #[test]
    fn test_is_list_all_command() {
        assert!(is_list_all_command("list all"));
        assert!(is_list_all_command(" list  all "));
        assert!(!is_list_all_command("list"));
    }

    #[test]
    fn test_parse_command_rejects_noise() {
        assert_eq!(parse_command("stuff"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("to play music"), None);
    }

    #[test]
    fn test_parse_command_channel() {
        let cmd = parse_command("<#C012X7LEUSV|general> to play music").unwrap();
        assert_eq!(cmd.target, "C012X7LEUSV");
        assert_eq!(cmd.task, "play music");
        assert_eq!(cmd.frequency, None);
    }

    #[test]
    fn test_parse_command_with_frequency() {
        let cmd = parse_command("<#C012X7LEUSV|general> to play music every day").unwrap();
        assert_eq!(cmd.task, "play music");
        assert_eq!(cmd.frequency.as_deref(), Some("every day"));

        let cmd = parse_command("<#C012X7LEUSV|general> to play music on monday").unwrap();
        assert_eq!(cmd.frequency.as_deref(), Some("on monday"));

        let cmd = parse_command("<#C012X7LEUSV|general> to play music next monday").unwrap();
        assert_eq!(cmd.frequency.as_deref(), Some("next monday"));
    }

    #[test]
    fn test_parse_command_trims_trailing_whitespace() {
        let cmd = parse_command("<#C012X7LEUSV|general> to play music                 ").unwrap();
        assert_eq!(cmd.task, "play music");
        assert_eq!(cmd.frequency, None);
    }

    #[test]
    fn test_parse_command_user_group() {
        let cmd = parse_command("<!subteam^S013R9HGXJ5|test-group> to play music").unwrap();
        assert_eq!(cmd.target, "S013R9HGXJ5");
        assert_eq!(cmd.task, "play music");
        assert_eq!(cmd.frequency, None);
    }

    #[test]
    fn test_parse_command_is_pure() {
        let text = "<#C012X7LEUSV|general> to play music every day";
        assert_eq!(parse_command(text), parse_command(text));
    }
}
