//! User, member and channel mode sets.
//!
//! The flag-only sets are small bitmasks generated by [`mode_flags!`]; the
//! channel set wraps one of those together with the parameterised modes
//! (key, limit and the three mask lists).

use std::collections::BTreeSet;

use irc_codec::Prefix;

/// Defines a flag enum and the companion bitmask set type with a fixed
/// flag-character table. Rendering follows table order, which keeps mode
/// strings deterministic.
macro_rules! mode_flags {
    (
        $flag_name:ident, $set_name:ident => {
            $( $flag:ident => $ch:literal ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Copy, Eq, PartialEq)]
        pub enum $flag_name {
            $( $flag ),*
        }

        impl $flag_name {
            pub fn to_char(self) -> char {
                $set_name::char_for(self)
            }
        }

        #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
        pub struct $set_name(u64);

        impl $set_name {
            const ALL: &'static [($flag_name, char)] = &[
                $( ($flag_name::$flag, $ch) ),*
            ];

            pub fn new() -> Self {
                Self(0)
            }

            pub fn is_set(&self, flag: $flag_name) -> bool {
                (self.0 & (1 << flag as u64)) != 0
            }

            pub fn set(&mut self, flag: $flag_name) {
                self.0 |= 1 << flag as u64;
            }

            pub fn unset(&mut self, flag: $flag_name) {
                self.0 &= !(1 << flag as u64);
            }

            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }

            pub fn flag_for(c: char) -> Option<$flag_name> {
                Self::ALL.iter().find(|(_, ch)| *ch == c).map(|(f, _)| *f)
            }

            pub fn char_for(flag: $flag_name) -> char {
                Self::ALL
                    .iter()
                    .find(|(f, _)| *f == flag)
                    .map(|(_, ch)| *ch)
                    .unwrap_or(' ')
            }

            /// Renders the set as `+` followed by the flag characters in
            /// table order.
            pub fn format(&self) -> String {
                let mut result = String::from("+");
                for (flag, ch) in Self::ALL {
                    if self.is_set(*flag) {
                        result.push(*ch);
                    }
                }
                result
            }
        }
    };
}

mode_flags!(UserModeFlag, UserModeSet => {
    Away => 'a',
    Invisible => 'i',
    WallOps => 'w',
    Restricted => 'r',
    Oper => 'o',
    LocalOper => 'O',
    ServerNotice => 's',
});

mode_flags!(MemberModeFlag, MemberModeSet => {
    Creator => 'O',
    Op => 'o',
    Voice => 'v',
});

mode_flags!(ChannelModeFlag, ChannelFlagSet => {
    Anonymous => 'a',
    InviteOnly => 'i',
    Moderated => 'm',
    NoOutside => 'n',
    Private => 'p',
    Secret => 's',
    TopicLock => 't',
});

impl MemberModeSet {
    /// The sigil shown before a nick in NAMES replies, if any.
    pub fn name_prefix(&self) -> Option<char> {
        if self.is_set(MemberModeFlag::Op) {
            Some('@')
        } else if self.is_set(MemberModeFlag::Voice) {
            Some('+')
        } else {
            None
        }
    }
}

/// The full mode state of a channel: flag set plus the parameterised modes.
///
/// A parameterised mode counts as set exactly when it holds a value, so
/// `k`/`l`/`b`/`e`/`I` never appear in the flag set itself.
#[derive(Debug, Clone, Default)]
pub struct ChannelModes {
    pub flags: ChannelFlagSet,
    pub key: Option<String>,
    pub limit: Option<usize>,
    pub ban_masks: BTreeSet<String>,
    pub except_masks: BTreeSet<String>,
    pub invite_masks: BTreeSet<String>,
}

impl ChannelModes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical `+flags [params...]` rendering for RPL_CHANNELMODEIS.
    ///
    /// Mask modes contribute their flag character when their list is
    /// non-empty; the mask contents themselves are only ever shown through
    /// the dedicated list numerics.
    pub fn format(&self) -> String {
        let mut flags = self.flags.format();
        let mut params = Vec::new();
        if let Some(key) = &self.key {
            flags.push('k');
            params.push(key.clone());
        }
        if let Some(limit) = self.limit {
            flags.push('l');
            params.push(limit.to_string());
        }
        if !self.ban_masks.is_empty() {
            flags.push('b');
        }
        if !self.except_masks.is_empty() {
            flags.push('e');
        }
        if !self.invite_masks.is_empty() {
            flags.push('I');
        }
        for param in params {
            flags.push(' ');
            flags.push_str(&param);
        }
        flags
    }

    pub fn masks(&self, flag: char) -> Option<&BTreeSet<String>> {
        match flag {
            'b' => Some(&self.ban_masks),
            'e' => Some(&self.except_masks),
            'I' => Some(&self.invite_masks),
            _ => None,
        }
    }

    pub fn masks_mut(&mut self, flag: char) -> Option<&mut BTreeSet<String>> {
        match flag {
            'b' => Some(&mut self.ban_masks),
            'e' => Some(&mut self.except_masks),
            'I' => Some(&mut self.invite_masks),
            _ => None,
        }
    }
}

/// Normalises a ban/exception/invitation mask to `nick!user@host`, filling
/// absent components with `*`.
pub fn normalize_mask(input: &str) -> String {
    let prefix = Prefix::parse(input);
    let name = if prefix.name.is_empty() {
        "*"
    } else {
        &prefix.name
    };
    format!(
        "{}!{}@{}",
        name,
        prefix.user.as_deref().unwrap_or("*"),
        prefix.host.as_deref().unwrap_or("*")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_modes_render_in_table_order() {
        let mut modes = UserModeSet::new();
        modes.set(UserModeFlag::Oper);
        modes.set(UserModeFlag::Invisible);
        modes.set(UserModeFlag::Away);
        assert_eq!(modes.format(), "+aio");
    }

    #[test]
    fn unset_removes_only_the_flag() {
        let mut modes = UserModeSet::new();
        modes.set(UserModeFlag::Invisible);
        modes.set(UserModeFlag::WallOps);
        modes.unset(UserModeFlag::Invisible);
        assert!(!modes.is_set(UserModeFlag::Invisible));
        assert!(modes.is_set(UserModeFlag::WallOps));
    }

    #[test]
    fn flag_lookup_by_char() {
        assert_eq!(UserModeSet::flag_for('O'), Some(UserModeFlag::LocalOper));
        assert_eq!(UserModeSet::flag_for('x'), None);
        assert_eq!(UserModeFlag::Restricted.to_char(), 'r');
    }

    #[test]
    fn member_name_prefix_prefers_op() {
        let mut modes = MemberModeSet::new();
        modes.set(MemberModeFlag::Voice);
        assert_eq!(modes.name_prefix(), Some('+'));
        modes.set(MemberModeFlag::Op);
        assert_eq!(modes.name_prefix(), Some('@'));
    }

    #[test]
    fn channel_modes_render_params_in_order() {
        let mut modes = ChannelModes::new();
        modes.flags.set(ChannelModeFlag::TopicLock);
        modes.key = Some("sesame".to_string());
        modes.limit = Some(25);
        assert_eq!(modes.format(), "+tkl sesame 25");
    }

    #[test]
    fn channel_modes_mask_flags_appear_when_populated() {
        let mut modes = ChannelModes::new();
        modes.ban_masks.insert("*!*@spam.example".to_string());
        assert_eq!(modes.format(), "+b");
        modes.ban_masks.clear();
        assert_eq!(modes.format(), "+");
    }

    #[test]
    fn normalize_mask_fills_wildcards() {
        assert_eq!(normalize_mask("nick"), "nick!*@*");
        assert_eq!(normalize_mask("nick!user"), "nick!user@*");
        assert_eq!(normalize_mask("*@host.example"), "*!*@host.example");
        assert_eq!(normalize_mask("a!b@c"), "a!b@c");
    }
}
