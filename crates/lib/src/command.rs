//! Command grammar: a command token anywhere in the message, an optional level right after it.
//!
//! Only the message's own text is scanned; quoted text never triggers a command.

use std::fmt;

/// Level used when none (or an invalid one) is given.
pub const DEFAULT_LEVEL: u8 = 5;

/// Which transformation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Expand,
    Condense,
    Help,
}

impl CommandKind {
    /// Registered command tokens, case-sensitive.
    pub const ALL: [CommandKind; 3] = [CommandKind::Expand, CommandKind::Condense, CommandKind::Help];

    pub fn token(self) -> &'static str {
        match self {
            CommandKind::Expand => "/e",
            CommandKind::Condense => "/c",
            CommandKind::Help => "/h",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.token() == token)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Expand => "expand",
            CommandKind::Condense => "condense",
            CommandKind::Help => "help",
        };
        f.write_str(name)
    }
}

/// Intensity level, always within 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Some(level) only for values in 1..=10.
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Parse a token as a level. Non-numeric or out-of-range tokens are not levels.
    pub fn parse(token: &str) -> Option<Self> {
        token.parse::<i64>().ok().and_then(|n| u8::try_from(n).ok()).and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Self(DEFAULT_LEVEL)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    pub level: Level,
    /// Message text without the command token and the consumed level token, single-space joined.
    pub remainder_text: String,
}

/// Scan whitespace-separated tokens for the first command token. Returns None when the
/// message carries no command.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (index, kind) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| CommandKind::from_token(t).map(|k| (i, k)))?;

    let level = tokens.get(index + 1).and_then(|t| Level::parse(t));
    let skip_to = if level.is_some() { index + 2 } else { index + 1 };

    let remainder_text = tokens[..index]
        .iter()
        .chain(tokens[skip_to..].iter())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    Some(ParsedCommand {
        kind,
        level: level.unwrap_or_default(),
        remainder_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> ParsedCommand {
        parse_command(text).unwrap()
    }

    #[test]
    fn no_command_means_none() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("just chatting about /etc files"), None);
        assert_eq!(parse_command("/E 3"), None);
        assert_eq!(parse_command("/expand"), None);
    }

    #[test]
    fn expand_with_level() {
        let p = parsed("/e 3");
        assert_eq!(p.kind, CommandKind::Expand);
        assert_eq!(p.level.get(), 3);
        assert_eq!(p.remainder_text, "");
    }

    #[test]
    fn command_anywhere_in_text() {
        let p = parsed("https://youtu.be/abc123 /c");
        assert_eq!(p.kind, CommandKind::Condense);
        assert_eq!(p.level.get(), DEFAULT_LEVEL);
        assert_eq!(p.remainder_text, "https://youtu.be/abc123");

        let p = parsed("some   long\ttext /c 8 here");
        assert_eq!(p.level.get(), 8);
        assert_eq!(p.remainder_text, "some long text here");
    }

    #[test]
    fn invalid_levels_fall_back_to_default_and_stay_in_remainder() {
        for (text, rest) in [
            ("/e 0", "0"),
            ("/e 11", "11"),
            ("/e -3", "-3"),
            ("/e 2.5", "2.5"),
            ("/e abc", "abc"),
            ("/e 99999999999999999999", "99999999999999999999"),
        ] {
            let p = parsed(text);
            assert_eq!(p.level.get(), DEFAULT_LEVEL, "{}", text);
            assert_eq!(p.remainder_text, rest, "{}", text);
        }
    }

    #[test]
    fn level_bounds_are_inclusive() {
        assert_eq!(parsed("/c 1").level.get(), 1);
        assert_eq!(parsed("/c 10").level.get(), 10);
        assert_eq!(parsed("/c +7").level.get(), 7);
    }

    #[test]
    fn first_command_wins() {
        let p = parsed("/c /e 4 text");
        assert_eq!(p.kind, CommandKind::Condense);
        assert_eq!(p.level.get(), DEFAULT_LEVEL);
        assert_eq!(p.remainder_text, "/e 4 text");
    }

    #[test]
    fn help_parses_like_any_command() {
        let p = parsed("hey /h");
        assert_eq!(p.kind, CommandKind::Help);
        assert_eq!(p.remainder_text, "hey");
    }

    #[test]
    fn level_constructor_rejects_out_of_range() {
        assert!(Level::new(0).is_none());
        assert!(Level::new(11).is_none());
        assert_eq!(Level::default().get(), 5);
    }
}
