//! Context menu widgets.

use std::fmt;
use std::sync::Arc;

use amethyst_core::{BoxFuture, CommandKind, HandlerResult, Interaction, Message, User};
use futures::FutureExt;
use futures::future;
use serde::de::DeserializeOwned;

use super::command::validate_name;
use super::{HandlerOutput, erase};
use crate::error::WidgetResult;
use crate::plugin::{Plugin, PluginId};
use crate::tree::AppCommand;

type MenuFn<P> = Arc<dyn Fn(Arc<P>, Interaction) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// What a context menu is attached to.
pub trait MenuSubject: DeserializeOwned + Send + 'static {
    /// Command kind of menus on this subject.
    const KIND: CommandKind;
}

impl MenuSubject for User {
    const KIND: CommandKind = CommandKind::User;
}

impl MenuSubject for Message {
    const KIND: CommandKind = CommandKind::Message;
}

/// A user or message context menu declared by plugin `P`.
pub struct ContextMenuWidget<P> {
    name: String,
    kind: CommandKind,
    nsfw: bool,
    callback: MenuFn<P>,
}

impl<P: Plugin> ContextMenuWidget<P> {
    /// Declares a context menu on subjects of type `S`.
    ///
    /// The display name defaults to `ident` in title case
    /// (`report_user` → `Report User`).
    pub fn new<S, F, Fut, O>(ident: &str, callback: F) -> Self
    where
        S: MenuSubject,
        F: Fn(Arc<P>, Interaction, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        let callback: MenuFn<P> = Arc::new(move |this, interaction: Interaction| {
            match interaction.target::<S>() {
                Ok(subject) => erase(callback(this, interaction, subject)),
                Err(err) => future::ready(Err(err.into())).boxed(),
            }
        });
        Self {
            name: title_case(ident),
            kind: S::KIND,
            nsfw: false,
            callback,
        }
    }

    /// Overrides the display name. Unlike slash commands it may contain
    /// spaces and upper case letters.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the menu as age restricted.
    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub(crate) fn validate(&self) -> WidgetResult<()> {
        validate_name(self.kind, &self.name)
    }

    pub(crate) fn bind(self, this: Arc<P>, owner: PluginId) -> AppCommand {
        let callback = self.callback;
        AppCommand {
            kind: self.kind,
            name: self.name,
            description: String::new(),
            nsfw: self.nsfw,
            hybrid: false,
            options: Vec::new(),
            owner: Some(owner),
            handler: Arc::new(move |interaction| callback(Arc::clone(&this), interaction)),
        }
    }
}

impl<P> ContextMenuWidget<P> {
    /// Display name.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// `User` or `Message`.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }
}

impl<P> fmt::Debug for ContextMenuWidget<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMenuWidget")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nsfw", &self.nsfw)
            .finish_non_exhaustive()
    }
}

fn title_case(ident: &str) -> String {
    ident
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Moderation;

    impl Plugin for Moderation {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Moderation
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("report_user"), "Report User");
        assert_eq!(title_case("PIN"), "Pin");
        assert_eq!(title_case("_quote__message_"), "Quote Message");
    }

    #[test]
    fn test_subject_sets_kind() {
        let menu = ContextMenuWidget::<Moderation>::new(
            "report_user",
            |_, _, _user: User| async {},
        );
        assert_eq!(menu.kind(), CommandKind::User);
        assert_eq!(menu.display_name(), "Report User");

        let menu = ContextMenuWidget::<Moderation>::new("quote", |_, _, _msg: Message| async {})
            .name("Quote this");
        assert_eq!(menu.kind(), CommandKind::Message);
        assert!(menu.validate().is_ok());
    }
}
