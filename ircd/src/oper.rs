//! Server-operator authentication.

use std::collections::HashMap;

/// Backend consulted by the OPER command. Implementations only decide
/// whether the credentials are acceptable; the handler applies the mode
/// change and replies.
pub trait OperAuth: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Checks credentials against a static username to password map.
#[derive(Debug, Default)]
pub struct BasicOperAuth {
    entries: HashMap<String, String>,
}

impl BasicOperAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn add(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.entries.insert(username.into(), password.into());
    }

    pub fn remove(&mut self, username: &str) {
        self.entries.remove(username);
    }
}

impl OperAuth for BasicOperAuth {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        self.entries.get(username).map(String::as_str) == Some(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_matching_credentials() {
        let mut auth = BasicOperAuth::new();
        auth.add("admin", "sesame");
        assert!(auth.authenticate("admin", "sesame"));
        assert!(!auth.authenticate("admin", "wrong"));
        assert!(!auth.authenticate("nobody", "sesame"));
    }

    #[test]
    fn removed_operator_no_longer_authenticates() {
        let mut auth = BasicOperAuth::new();
        auth.add("admin", "sesame");
        auth.remove("admin");
        assert!(!auth.authenticate("admin", "sesame"));
    }
}
