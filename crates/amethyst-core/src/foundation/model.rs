//! Discord data model consumed by the framework.
//!
//! Only the fields the framework itself needs are modelled. Everything else a
//! gateway delivers stays available as raw [`serde_json::Value`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{InteractionError, InteractionResult};
use crate::integration::gateway::BoxedGateway;

// ============================================================================
// Snowflake ids
// ============================================================================

macro_rules! snowflake {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw snowflake.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        // Discord sends snowflakes as strings; numbers are accepted too.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }
    };
}

struct SnowflakeVisitor;

impl Visitor<'_> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake as a string or an integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom("negative snowflake"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        v.parse().map_err(E::custom)
    }
}

snowflake!(
    /// Id of a guild (server).
    GuildId
);
snowflake!(
    /// Id of a user.
    UserId
);
snowflake!(
    /// Id of a channel.
    ChannelId
);
snowflake!(
    /// Id of a message.
    MessageId
);
snowflake!(
    /// Id of an interaction.
    InteractionId
);

// ============================================================================
// Users and messages
// ============================================================================

/// A Discord user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "username")]
    pub name: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// The global display name, or `name#discriminator` when none is set.
    pub fn display_name(&self) -> String {
        match (&self.global_name, &self.discriminator) {
            (Some(global), _) => global.clone(),
            (None, Some(discriminator)) => format!("{}#{}", self.name, discriminator),
            (None, None) => self.name.clone(),
        }
    }
}

/// The user the session is logged in as.
pub type CurrentUser = User;

/// A message posted in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

// ============================================================================
// Application commands
// ============================================================================

/// Kind of application command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CommandKind {
    /// A slash command.
    ChatInput,
    /// A context menu on a user.
    User,
    /// A context menu on a message.
    Message,
}

impl CommandKind {
    /// Numeric value used on the wire.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::ChatInput => 1,
            Self::User => 2,
            Self::Message => 3,
        }
    }
}

impl From<CommandKind> for u8 {
    fn from(kind: CommandKind) -> Self {
        kind.as_u8()
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ChatInput),
            2 => Ok(Self::User),
            3 => Ok(Self::Message),
            other => Err(format!("unknown application command type {other}")),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChatInput => "slash command",
            Self::User => "user context menu",
            Self::Message => "message context menu",
        })
    }
}

/// Type of a slash command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Number,
}

impl OptionKind {
    /// Numeric value used on the wire.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::String => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
            Self::Number => 10,
        }
    }
}

// ============================================================================
// Interactions
// ============================================================================

/// Response sent back for an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    pub content: String,
    pub ephemeral: bool,
}

impl InteractionResponse {
    /// A visible message response.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    /// A response only the invoking user can see.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// An application command or context menu invocation.
#[derive(Clone, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub name: String,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    pub user: User,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Resolved user or message for context menu invocations.
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(skip)]
    gateway: Option<BoxedGateway>,
}

impl Interaction {
    /// Attaches the gateway used to answer this interaction.
    pub fn with_gateway(mut self, gateway: BoxedGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Whether the interaction can be answered.
    pub fn is_attached(&self) -> bool {
        self.gateway.is_some()
    }

    /// Decodes the option `name` into `T`.
    ///
    /// A missing option decodes from `null`, so `Option<T>` yields `None`.
    pub fn option<T: DeserializeOwned>(&self, name: &str) -> InteractionResult<T> {
        let value = self.options.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| InteractionError::InvalidOption {
            name: name.to_string(),
            source,
        })
    }

    /// Decodes the context menu target into `T`.
    pub fn target<T: DeserializeOwned>(&self) -> InteractionResult<T> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| InteractionError::MissingTarget(self.name.clone()))?;
        serde_json::from_value(target).map_err(InteractionError::InvalidTarget)
    }

    /// Sends `response` through the attached gateway.
    pub async fn respond(&self, response: InteractionResponse) -> InteractionResult<()> {
        let gateway = self.gateway.as_ref().ok_or(InteractionError::Detached)?;
        gateway.respond(self, response).await?;
        Ok(())
    }

    /// Replies with a plain message.
    pub async fn reply(&self, content: impl Into<String>) -> InteractionResult<()> {
        self.respond(InteractionResponse::message(content)).await
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("guild_id", &self.guild_id)
            .field("user", &self.user.id)
            .field("options", &self.options)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Shared handle to an interaction, as delivered to event handlers.
pub type SharedInteraction = Arc<Interaction>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interaction() -> Interaction {
        serde_json::from_value(json!({
            "id": "900",
            "token": "tok",
            "type": 1,
            "name": "echo",
            "guild_id": "42",
            "user": { "id": "7", "username": "ferris" },
            "options": { "text": "hello", "times": 3 }
        }))
        .unwrap()
    }

    #[test]
    fn test_snowflake_from_string_and_number() {
        let from_str: GuildId = serde_json::from_value(json!("123")).unwrap();
        let from_num: GuildId = serde_json::from_value(json!(123)).unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_value(from_str).unwrap(), json!("123"));
    }

    #[test]
    fn test_display_name() {
        let mut user = User {
            id: UserId(1),
            name: "ferris".into(),
            global_name: None,
            discriminator: Some("0001".into()),
            bot: true,
        };
        assert_eq!(user.display_name(), "ferris#0001");
        user.global_name = Some("Ferris".into());
        assert_eq!(user.display_name(), "Ferris");
    }

    #[test]
    fn test_interaction_options() {
        let ix = interaction();
        assert_eq!(ix.kind, CommandKind::ChatInput);
        assert_eq!(ix.guild_id, Some(GuildId(42)));
        assert_eq!(ix.option::<String>("text").unwrap(), "hello");
        assert_eq!(ix.option::<i64>("times").unwrap(), 3);
        assert_eq!(ix.option::<Option<bool>>("silent").unwrap(), None);
        assert!(matches!(
            ix.option::<String>("missing"),
            Err(InteractionError::InvalidOption { .. })
        ));
    }

    #[tokio::test]
    async fn test_detached_interaction_cannot_respond() {
        let ix = interaction();
        assert!(!ix.is_attached());
        assert!(matches!(
            ix.reply("hi").await,
            Err(InteractionError::Detached)
        ));
    }
}
