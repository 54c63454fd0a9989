//! Slash command widgets.

use std::fmt;
use std::sync::Arc;

use amethyst_core::{
    BoxFuture, ChannelId, CommandKind, HandlerResult, Interaction, OptionKind, UserId,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{HandlerOutput, erase};
use crate::error::{WidgetError, WidgetResult};
use crate::plugin::{Plugin, PluginId};
use crate::tree::AppCommand;

/// Description used when none is given.
pub const DEFAULT_DESCRIPTION: &str = "...";

/// Maximum length of names.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum length of descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 100;

type CommandFn<P> =
    Arc<dyn Fn(Arc<P>, Interaction) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// Options
// ============================================================================

/// Rust types usable as slash command options.
///
/// `Option<T>` declares an optional option.
pub trait OptionType: DeserializeOwned + Send + 'static {
    /// Option type on the wire.
    const KIND: OptionKind;
    /// Whether the option must be supplied.
    const REQUIRED: bool = true;
}

macro_rules! impl_option_type {
    ($kind:ident => $($ty:ty),*) => {
        $(
            impl OptionType for $ty {
                const KIND: OptionKind = OptionKind::$kind;
            }
        )*
    };
}

impl_option_type!(String => String);
impl_option_type!(Integer => i8, i16, i32, i64, u8, u16, u32, u64);
impl_option_type!(Number => f32, f64);
impl_option_type!(Boolean => bool);
impl_option_type!(User => UserId);
impl_option_type!(Channel => ChannelId);

impl<T: OptionType> OptionType for Option<T> {
    const KIND: OptionKind = T::KIND;
    const REQUIRED: bool = false;
}

/// A typed slash command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOption {
    /// Option name.
    pub name: String,
    /// Option description.
    pub description: String,
    /// Option type.
    pub kind: OptionKind,
    /// Whether the option must be supplied.
    pub required: bool,
}

impl CommandOption {
    /// Declares an option decoded as `T`.
    pub fn of<T: OptionType>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            description: if description.trim().is_empty() {
                DEFAULT_DESCRIPTION.to_string()
            } else {
                shorten(&description)
            },
            kind: T::KIND,
            required: T::REQUIRED,
        }
    }

    /// Wire representation.
    pub fn to_definition(&self) -> Value {
        json!({
            "type": self.kind.as_u8(),
            "name": self.name,
            "description": self.description,
            "required": self.required,
        })
    }
}

// ============================================================================
// CommandWidget
// ============================================================================

/// A slash command declared by plugin `P`.
///
/// ```rust,ignore
/// widgets.command(
///     CommandWidget::new("roll", |this: Arc<Self>, interaction: Interaction| async move {
///         let sides: Option<i64> = interaction.option("sides")?;
///         this.roll(interaction, sides.unwrap_or(6)).await
///     })
///     .description("Rolls a die.")
///     .option(CommandOption::of::<Option<i64>>("sides", "Number of sides")),
/// )?;
/// ```
pub struct CommandWidget<P> {
    name: String,
    description: Option<String>,
    nsfw: bool,
    hybrid: bool,
    options: Vec<CommandOption>,
    callback: CommandFn<P>,
}

impl<P: Plugin> CommandWidget<P> {
    /// Declares a command named `name` handled by `callback`.
    pub fn new<F, Fut, O>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Arc<P>, Interaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        Self {
            name: name.into(),
            description: None,
            nsfw: false,
            hybrid: false,
            options: Vec::new(),
            callback: Arc::new(move |this, interaction| erase(callback(this, interaction))),
        }
    }

    /// Sets the description, shortened to 100 characters.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the command as age restricted.
    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    /// Marks the command as also usable as a prefixed message command.
    pub fn hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    /// Appends an option.
    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub(crate) fn validate(&self) -> WidgetResult<()> {
        validate_name(CommandKind::ChatInput, &self.name)?;
        if let Some(description) = &self.description
            && shorten(description).is_empty()
        {
            return Err(WidgetError::InvalidDescription(self.name.clone()));
        }
        for option in &self.options {
            validate_name(CommandKind::ChatInput, &option.name)?;
        }
        Ok(())
    }

    pub(crate) fn bind(self, this: Arc<P>, owner: PluginId) -> AppCommand {
        let callback = self.callback;
        AppCommand {
            kind: CommandKind::ChatInput,
            description: self
                .description
                .as_deref()
                .map_or_else(|| DEFAULT_DESCRIPTION.to_string(), shorten),
            name: self.name,
            nsfw: self.nsfw,
            hybrid: self.hybrid,
            options: self.options,
            owner: Some(owner),
            handler: Arc::new(move |interaction| callback(Arc::clone(&this), interaction)),
        }
    }
}

impl<P> CommandWidget<P> {
    /// Command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared options.
    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    /// Whether the command is also a prefixed message command.
    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }
}

impl<P> fmt::Debug for CommandWidget<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandWidget")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("nsfw", &self.nsfw)
            .field("hybrid", &self.hybrid)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Checks a command, option or context menu name.
///
/// Slash commands and options take 1-32 lowercase letters, digits, `-` or `_`.
/// Context menus take 1-32 characters of any kind.
pub(crate) fn validate_name(kind: CommandKind, name: &str) -> WidgetResult<()> {
    let invalid = |reason| {
        Err(WidgetError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        })
    };

    let length = name.chars().count();
    if length == 0 || name.trim().is_empty() {
        return invalid("must not be empty");
    }
    if length > MAX_NAME_LENGTH {
        return invalid("must be at most 32 characters");
    }
    if kind == CommandKind::ChatInput
        && !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_'))
    {
        return invalid("must only contain lowercase letters, digits, '-' or '_'");
    }
    Ok(())
}

/// Reduces `text` to its first non-blank paragraph with collapsed
/// whitespace, cut at a word boundary to fit in 100 characters and marked
/// with `…` when cut.
pub fn shorten(text: &str) -> String {
    let words: Vec<&str> = text
        .lines()
        .skip_while(|line| line.trim().is_empty())
        .take_while(|line| !line.trim().is_empty())
        .flat_map(str::split_whitespace)
        .collect();
    let joined = words.join(" ");
    if joined.chars().count() <= MAX_DESCRIPTION_LENGTH {
        return joined;
    }

    // Room for the trailing ellipsis.
    let budget = MAX_DESCRIPTION_LENGTH - 1;
    let mut out = String::new();
    let mut used = 0;
    for word in &words {
        let width = word.chars().count() + usize::from(used > 0);
        if used + width > budget {
            break;
        }
        if used > 0 {
            out.push(' ');
        }
        out.push_str(word);
        used += width;
    }
    if out.is_empty() {
        out = joined.chars().take(budget).collect();
    }
    out.push('…');
    out
}
