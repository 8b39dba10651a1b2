use std::fmt;

/// The source of a message: `name[!user][@host]`.
///
/// The same shape doubles as the ban/exception/invitation mask syntax, where
/// any of the three components may be a wildcard pattern.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Prefix {
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    /// A server-style prefix with only a name component.
    pub fn server(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: None,
            host: None,
        }
    }

    pub fn user(name: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: Some(user.into()),
            host: Some(host.into()),
        }
    }

    /// Parses `name[!user][@host]`. Absent components are `None`; this never
    /// fails, degenerate input just ends up entirely in `name`.
    pub fn parse(input: &str) -> Self {
        let (name_user, host) = match input.find('@') {
            Some(at) => (&input[..at], Some(input[at + 1..].to_string())),
            None => (input, None),
        };
        let (name, user) = match name_user.find('!') {
            Some(bang) => (
                &name_user[..bang],
                Some(name_user[bang + 1..].to_string()),
            ),
            None => (name_user, None),
        };
        Self {
            name: name.to_string(),
            user,
            host,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full() {
        let p = Prefix::parse("nick!user@host.example");
        assert_eq!(p.name, "nick");
        assert_eq!(p.user.as_deref(), Some("user"));
        assert_eq!(p.host.as_deref(), Some("host.example"));
    }

    #[test]
    fn parse_name_only() {
        let p = Prefix::parse("irc.example.net");
        assert_eq!(p.name, "irc.example.net");
        assert!(p.user.is_none());
        assert!(p.host.is_none());
    }

    #[test]
    fn parse_partial_forms() {
        let p = Prefix::parse("nick!user");
        assert_eq!(p.user.as_deref(), Some("user"));
        assert!(p.host.is_none());

        let p = Prefix::parse("nick@host");
        assert!(p.user.is_none());
        assert_eq!(p.host.as_deref(), Some("host"));
    }

    #[test]
    fn display_matches_parse() {
        for s in ["nick!user@host", "nick@host", "nick!user", "nick"] {
            assert_eq!(Prefix::parse(s).to_string(), s);
        }
    }
}
