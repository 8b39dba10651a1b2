//! Numeric replies.
//!
//! Each reply type renders its parameters into the text that follows the
//! target nickname on the wire; [`Numeric::format_for`] supplies the server
//! prefix, code and target when the reply is sent. Templates embed the
//! trailing colon where the reply has a trailing component.

/// A numeric reply, minus the server prefix and target which are only known
/// at send time.
#[derive(Debug, Clone)]
pub struct Numeric {
    code: &'static str,
    text: String,
}

impl Numeric {
    pub fn new(code: &'static str, text: String) -> Self {
        Self { code, text }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Renders the full line: `:<server> <code> <target> <text>`.
    pub fn format_for(&self, server_name: &str, target: &str) -> String {
        format!(":{} {} {} {}", server_name, self.code, target, self.text)
    }
}

macro_rules! define_numerics {
    (
        $( $code:literal ( $name:ident ) => { ( $( $arg:ident : $ty:ty ),* ) => $template:literal } ),* $(,)?
    ) => {
        $(
            pub struct $name;

            impl $name {
                pub fn new( $( $arg : $ty ),* ) -> Numeric {
                    Numeric::new(stringify!($code), format!($template, $( $arg = $arg ),*))
                }
            }
        )*
    };
}

define_numerics! {
    001(Welcome)            => { (prefix: &str)     => ":Welcome to the Internet Relay Network {prefix}" },
    002(YourHost)           => { (server: &str, version: &str)
                                                    => ":Your host is {server}, running version {version}" },
    003(Created)            => { (created: &str)    => ":This server was created {created}" },
    004(MyInfo)             => { (server: &str, version: &str)
                                                    => "{server} {version} aiwroOs aimnpstklbeIov" },

    221(UmodeIs)            => { (modes: &str)      => "{modes}" },

    301(Away)               => { (nick: &str, message: &str) => "{nick} :{message}" },
    305(Unaway)             => { ()                 => ":You are no longer marked as being away" },
    306(NowAway)            => { ()                 => ":You have been marked as being away" },

    315(EndOfWho)           => { (mask: &str)       => "{mask} :End of WHO list" },

    322(List)               => { (chan: &str, visible: usize, topic: &str) => "{chan} {visible} :{topic}" },
    323(ListEnd)            => { ()                 => ":End of LIST" },
    324(ChannelModeIs)      => { (chan: &str, modes: &str) => "{chan} {modes}" },

    331(NoTopic)            => { (chan: &str)       => "{chan} :No topic is set" },
    332(Topic)              => { (chan: &str, topic: &str) => "{chan} :{topic}" },

    346(InviteList)         => { (chan: &str, mask: &str) => "{chan} {mask}" },
    347(EndOfInviteList)    => { (chan: &str)       => "{chan} :End of channel invite list" },
    348(ExceptList)         => { (chan: &str, mask: &str) => "{chan} {mask}" },
    349(EndOfExceptList)    => { (chan: &str)       => "{chan} :End of channel exception list" },

    352(WhoReply)           => { (chan: &str, user: &str, host: &str, server: &str, nick: &str, flags: &str, realname: &str)
                                                    => "{chan} {user} {host} {server} {nick} {flags} :0 {realname}" },
    353(NamesReply)         => { (visibility: char, chan: &str, names: &str) => "{visibility} {chan} :{names}" },

    366(EndOfNames)         => { (chan: &str)       => "{chan} :End of NAMES list" },
    367(BanList)            => { (chan: &str, mask: &str) => "{chan} {mask}" },
    368(EndOfBanList)       => { (chan: &str)       => "{chan} :End of channel ban list" },

    372(Motd)               => { (text: &str)       => ":- {text}" },
    375(MotdStart)          => { (server: &str)     => ":- {server} Message of the day -" },
    376(EndOfMotd)          => { ()                 => ":End of MOTD command" },

    381(YoureOper)          => { ()                 => ":You are now an IRC operator" },

    401(NoSuchNick)         => { (target: &str)     => "{target} :No such nick/channel" },
    403(NoSuchChannel)      => { (chan: &str)       => "{chan} :No such channel" },
    407(TooManyTargets)     => { (target: &str)     => "{target} :Too many targets" },
    411(NoRecipient)        => { (command: &str)    => ":No recipient given ({command})" },
    412(NoTextToSend)       => { ()                 => ":No text to send" },

    421(UnknownCommand)     => { (command: &str)    => "{command} :Unknown command" },
    422(NoMotd)             => { ()                 => ":MOTD File is missing" },

    431(NoNicknameGiven)    => { ()                 => ":No nickname given" },
    433(NicknameInUse)      => { (nick: &str)       => "{nick} :Nickname is already in use" },
    441(UserNotInChannel)   => { (nick: &str, chan: &str) => "{nick} {chan} :They aren't on that channel" },
    442(NotOnChannel)       => { (chan: &str)       => "{chan} :You're not on that channel" },
    451(NotRegistered)      => { ()                 => ":You have not registered" },

    461(NeedMoreParams)     => { (command: &str)    => "{command} :Not enough parameters" },
    462(AlreadyRegistered)  => { ()                 => ":Unauthorized command (already registered)" },
    464(PasswdMismatch)     => { ()                 => ":Password incorrect" },

    471(ChannelIsFull)      => { (chan: &str)       => "{chan} :Cannot join channel (+l)" },
    472(UnknownMode)        => { (flag: char, chan: &str) => "{flag} :is unknown mode char to me for {chan}" },
    475(BadChannelKey)      => { (chan: &str)       => "{chan} :Cannot join channel (+k)" },

    482(ChanOpPrivsNeeded)  => { (chan: &str)       => "{chan} :You're not channel operator" },

    501(UmodeUnknownFlag)   => { ()                 => ":Unknown MODE flag" },
    502(UsersDontMatch)     => { ()                 => ":Cannot change mode for other users" },
}

#[macro_export]
macro_rules! make_numeric {
    ($type:ident) => {
        $crate::numeric::$type::new()
    };
    ($type:ident, $($args:expr),*) => {
        $crate::numeric::$type::new($($args),*)
    };
}

#[macro_export]
macro_rules! numeric_error {
    ($($args:tt)*) => {
        Err($crate::make_numeric!($($args)*).into())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_keep_leading_zeroes() {
        assert_eq!(Welcome::new("nick!user@host").code(), "001");
    }

    #[test]
    fn format_for_prepends_source_and_target() {
        let n = NicknameInUse::new("alice");
        assert_eq!(
            n.format_for("irc.example.net", "*"),
            ":irc.example.net 433 * alice :Nickname is already in use"
        );
    }
}
