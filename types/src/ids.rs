use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire form of a snowflake: the platform sends ids as decimal strings, but
/// hand-written relay payloads and fixtures often use bare numbers.
#[doc(hidden)]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SnowflakeRepr {
    Text(String),
    Number(u64),
}

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "SnowflakeRepr", into = "String")]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl TryFrom<SnowflakeRepr> for $name {
            type Error = ParseIntError;

            fn try_from(repr: SnowflakeRepr) -> Result<Self, Self::Error> {
                match repr {
                    SnowflakeRepr::Text(text) => text.parse(),
                    SnowflakeRepr::Number(n) => Ok(Self(n)),
                }
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

snowflake!(
    /// A space (guild) on the platform.
    GuildId
);
snowflake!(ChannelId);
snowflake!(
    /// The message a menu is posted as.
    MessageId
);
snowflake!(
    /// A member of a space; the actor of selection events.
    UserId
);
snowflake!(
    /// A group (role) granted or revoked by the engine.
    RoleId
);

/// Row id of a stored menu definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuId(i64);

impl MenuId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A channel within a space; where a menu lives before its posting exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub guild: GuildId,
    pub channel: ChannelId,
}

impl ChannelRef {
    #[must_use]
    pub const fn new(guild: GuildId, channel: ChannelId) -> Self {
        Self { guild, channel }
    }

    #[must_use]
    pub const fn posting(self, message: MessageId) -> PostingRef {
        PostingRef {
            guild: self.guild,
            channel: self.channel,
            message,
        }
    }
}

/// Full identity of a posting: space, channel, message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostingRef {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub message: MessageId,
}

impl PostingRef {
    #[must_use]
    pub const fn new(guild: GuildId, channel: ChannelId, message: MessageId) -> Self {
        Self {
            guild,
            channel,
            message,
        }
    }

    #[must_use]
    pub const fn channel_ref(self) -> ChannelRef {
        ChannelRef::new(self.guild, self.channel)
    }
}

impl fmt::Display for PostingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.guild, self.channel, self.message)
    }
}
