//! Command parsing.
//!
//! A message is a command when its text starts with [`COMMAND_SIGIL`]. The
//! command token is the text up to the first whitespace, sigil included, so
//! `"/start extra"` looks up `"/start"`.

/// The character that marks a message as a command.
pub const COMMAND_SIGIL: char = '/';

/// Returns the command token of `text`, or `None` if it is not a command.
pub fn command_token(text: &str) -> Option<&str> {
    if !text.starts_with(COMMAND_SIGIL) {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some(&text[..end])
}

/// Parsed command arguments, extractable in command handlers.
///
/// ```rust,ignore
/// async fn greet(args: CommandArgs, msg: MessageEvent, bot: BoxedBot) {
///     let name = args.split().first().cloned().unwrap_or_default();
///     bot.send_message(msg.chat_id, &format!("Hi {name}"), None, None).await.ok();
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgs {
    /// The command token, sigil included.
    pub command: String,
    /// Everything after the token, with surrounding whitespace trimmed.
    pub raw: String,
}

impl CommandArgs {
    /// Parses `text` into a token and its raw arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let command = command_token(text)?;
        Some(Self {
            command: command.to_string(),
            raw: text[command.len()..].trim().to_string(),
        })
    }

    /// Returns `true` if the command was given no arguments.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Splits the raw arguments shell-style.
    pub fn split(&self) -> Vec<String> {
        shell_split(&self.raw)
    }
}

/// Simple shell-like argument splitting.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes)
/// - Escape sequences within double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escape_next = false;
    let mut quoted_empty = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match (quote, ch) {
            (Some('"'), '\\') => escape_next = true,
            (Some(q), c) if c == q => {
                quote = None;
                quoted_empty = current.is_empty();
            }
            (None, '\'' | '"') => quote = Some(ch),
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() || quoted_empty {
                    args.push(std::mem::take(&mut current));
                }
                quoted_empty = false;
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || quoted_empty {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_token() {
        assert_eq!(command_token("/start"), Some("/start"));
        assert_eq!(command_token("/start extra"), Some("/start"));
        assert_eq!(command_token("/menu\tnow"), Some("/menu"));
        assert_eq!(command_token("hello /start"), None);
        assert_eq!(command_token(""), None);
    }

    #[test]
    fn test_command_args_parse() {
        let args = CommandArgs::parse("/start  extra words ").unwrap();
        assert_eq!(args.command, "/start");
        assert_eq!(args.raw, "extra words");
        assert!(!args.is_empty());

        assert!(CommandArgs::parse("/start").unwrap().is_empty());
        assert!(CommandArgs::parse("start").is_none());
    }

    #[test]
    fn test_shell_split_quoted() {
        assert_eq!(
            shell_split(r#"lunch "Cafe Rio" 'a b' 12.50"#),
            vec!["lunch", "Cafe Rio", "a b", "12.50"]
        );
        assert_eq!(shell_split(r#""say \"hi\"""#), vec![r#"say "hi""#]);
        assert_eq!(shell_split(r#"a "" b"#), vec!["a", "", "b"]);
        assert!(shell_split("   ").is_empty());
    }
}
