//! RFC 2812 casemapping.
//!
//! Nicknames and channel names compare case-insensitively with the extended
//! ASCII mapping where `{`, `}`, `|` and `^` are the lowercase forms of `[`,
//! `]`, `\` and `~`. Directory keys are stored folded; display forms keep
//! the spelling the client chose.

pub fn casefold(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'A'..='Z' => c.to_ascii_lowercase(),
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii() {
        assert_eq!(casefold("WiZ"), "wiz");
    }

    #[test]
    fn folds_extended_set() {
        assert_eq!(casefold("[foo]\\~"), "{foo}|^");
    }

    #[test]
    fn lowercase_forms_unchanged() {
        assert_eq!(casefold("{foo}|^"), "{foo}|^");
    }

    #[test]
    fn equivalent_nicks_collide() {
        assert_eq!(casefold("Nick[1]"), casefold("nick{1}"));
    }
}
