//! Line-level framing for the IRC client-to-server protocol.
//!
//! A wire message is `[:prefix] <command> <params...> [ :<trailing> ]`,
//! CRLF-terminated, at most 512 bytes including the CRLF. This crate only
//! deals in that shape; it knows nothing about commands, numerics or
//! server state.

use std::fmt;

use thiserror::Error;

mod prefix;

pub use prefix::Prefix;

/// Maximum length of one message including the terminating CRLF.
pub const MAX_MESSAGE_LEN: usize = 512;

/// Maximum length of the content of one line, i.e. excluding the CRLF.
pub const MAX_CONTENT_LEN: usize = MAX_MESSAGE_LEN - 2;

/// An error that might occur while decoding a line.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    #[error("Empty message")]
    EmptyMessage,
    #[error("Message exceeds {MAX_MESSAGE_LEN} bytes")]
    MessageTooLong,
    #[error("Embedded CR or LF in message")]
    EmbeddedLineBreak,
}

/// One decoded protocol message.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl Message {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params: Vec::new(),
            trailing: None,
        }
    }

    pub fn with_prefix(prefix: Prefix, command: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix),
            command: command.into(),
            params: Vec::new(),
            trailing: None,
        }
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn trailing(mut self, trailing: impl Into<String>) -> Self {
        self.trailing = Some(trailing.into());
        self
    }

    /// Decode one line, without its CRLF terminator.
    pub fn parse(line: &str) -> Result<Self, CodecError> {
        if line.len() > MAX_CONTENT_LEN {
            return Err(CodecError::MessageTooLong);
        }
        if line.contains('\r') || line.contains('\n') {
            return Err(CodecError::EmbeddedLineBreak);
        }

        let mut rest = line.trim_start_matches(' ');

        let prefix = if let Some(after) = rest.strip_prefix(':') {
            let (word, remainder) = split_word(after);
            rest = remainder;
            Some(Prefix::parse(word))
        } else {
            None
        };

        let (command, mut rest) = split_word(rest);
        if command.is_empty() {
            return Err(CodecError::EmptyMessage);
        }

        let mut params = Vec::new();
        let mut trailing = None;
        loop {
            if rest.is_empty() {
                break;
            }
            if let Some(t) = rest.strip_prefix(':') {
                trailing = Some(t.to_string());
                break;
            }
            let (word, remainder) = split_word(rest);
            if !word.is_empty() {
                params.push(word.to_string());
            }
            rest = remainder;
        }

        Ok(Self {
            prefix,
            command: command.to_string(),
            params,
            trailing,
        })
    }
}

/// Splits off the first space-delimited word, leaving the remainder with
/// leading spaces stripped.
fn split_word(input: &str) -> (&str, &str) {
    match input.find(' ') {
        Some(offset) => (&input[..offset], input[offset + 1..].trim_start_matches(' ')),
        None => (input, ""),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{}", trailing)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_command() {
        let m = Message::parse("QUIT").unwrap();
        assert_eq!(m.command, "QUIT");
        assert!(m.prefix.is_none());
        assert!(m.params.is_empty());
        assert!(m.trailing.is_none());
    }

    #[test]
    fn parse_params_and_trailing() {
        let m = Message::parse("PRIVMSG #chan :hello there").unwrap();
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#chan"]);
        assert_eq!(m.trailing.as_deref(), Some("hello there"));
    }

    #[test]
    fn parse_with_prefix() {
        let m = Message::parse(":nick!user@host PART #chan :bye").unwrap();
        let prefix = m.prefix.unwrap();
        assert_eq!(prefix.name, "nick");
        assert_eq!(prefix.user.as_deref(), Some("user"));
        assert_eq!(prefix.host.as_deref(), Some("host"));
        assert_eq!(m.params, vec!["#chan"]);
        assert_eq!(m.trailing.as_deref(), Some("bye"));
    }

    #[test]
    fn parse_collapses_repeated_spaces() {
        let m = Message::parse("MODE  #chan   +o  nick").unwrap();
        assert_eq!(m.params, vec!["#chan", "+o", "nick"]);
    }

    #[test]
    fn parse_empty_trailing() {
        let m = Message::parse("TOPIC #chan :").unwrap();
        assert_eq!(m.trailing.as_deref(), Some(""));
    }

    #[test]
    fn parse_rejects_empty_line() {
        assert_eq!(Message::parse(""), Err(CodecError::EmptyMessage));
        assert_eq!(Message::parse("   "), Err(CodecError::EmptyMessage));
    }

    #[test]
    fn parse_rejects_overlong_line() {
        let line = format!("PRIVMSG #chan :{}", "x".repeat(MAX_MESSAGE_LEN));
        assert_eq!(Message::parse(&line), Err(CodecError::MessageTooLong));
    }

    #[test]
    fn render_round_trip() {
        let m = Message::with_prefix(Prefix::parse("nick!user@host"), "KICK")
            .param("#chan")
            .param("loser")
            .trailing("spam");
        let rendered = m.to_string();
        assert_eq!(rendered, ":nick!user@host KICK #chan loser :spam");
        assert_eq!(Message::parse(&rendered).unwrap(), m);
    }

    #[test]
    fn render_without_trailing() {
        let m = Message::new("JOIN").param("#chan");
        assert_eq!(m.to_string(), "JOIN #chan");
    }
}
