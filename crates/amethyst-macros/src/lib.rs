//! Procedural macros for the Amethyst Discord framework.
//!
//! This crate provides:
//!
//! - `#[plugin]` - Derives `Plugin` from an `impl` block, turning annotated
//!   methods into widgets
//!
//! # Plugin Attribute
//!
//! ```rust,ignore
//! use amethyst::prelude::*;
//!
//! pub struct Dice {
//!     rng: Arc<Rng>,
//! }
//!
//! #[plugin]
//! impl Dice {
//!     fn new(rng: Arc<Rng>) -> Self {
//!         Self { rng }
//!     }
//!
//!     /// Rolls a die.
//!     #[command]
//!     #[describe(sides = "Number of sides")]
//!     async fn roll(&self, interaction: Interaction, sides: Option<u32>) -> HandlerResult {
//!         let value = self.rng.roll(sides.unwrap_or(6));
//!         interaction.reply(format!("You rolled {value}")).await?;
//!         Ok(())
//!     }
//!
//!     #[event(ON_MESSAGE)]
//!     async fn on_message(&self, message: &Message) {
//!         tracing::debug!(content = %message.content, "Message seen");
//!     }
//!
//!     #[schedule("0 0 * * *")]
//!     async fn reseed(&self) {
//!         self.rng.reseed();
//!     }
//!
//!     #[context_menu(name = "Roll for user")]
//!     async fn roll_for(&self, interaction: Interaction, user: User) -> HandlerResult {
//!         interaction.reply(format!("{} rolled {}", user.name, self.rng.roll(6))).await?;
//!         Ok(())
//!     }
//! }
//! ```

mod plugin;
mod widget;

use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

/// Derives `Plugin` for the type of an inherent `impl` block.
///
/// # Construction
///
/// A `fn new(..) -> Self` in the block becomes the plugin constructor; each
/// parameter type is resolved from the client's dependencies
/// (`Arc<T>`, `Option<Arc<T>>` or `ClientHandle`). Without `new` the type
/// must implement `Default`.
///
/// # Widgets
///
/// Methods taking `&self` can be annotated with:
///
/// - `#[command]` or `#[command(name = "…", description = "…", nsfw, hybrid)]`:
///   a slash command. The first parameter receives the `Interaction`; the
///   remaining ones become typed options, described with
///   `#[describe(param = "…")]`. Doc comments become the description.
/// - `#[event(EVENT)]` or `#[event(EVENT, name = "…")]`: an event handler. An
///   `async fn` handles asynchronous events, a plain `fn` blocking ones. The
///   optional payload parameter may be `&A`, `Arc<A>` or `A: Clone`.
/// - `#[schedule("cron")]` or `#[schedule("cron", name = "…")]`: a cron
///   schedule.
/// - `#[context_menu]` or `#[context_menu(name = "…", nsfw)]`: a user or
///   message context menu, selected by the type of the third parameter.
///
/// # Attribute arguments
///
/// - `crate = path`: path of the `amethyst` crate (default `::amethyst`)
/// - `name = "…"`: plugin name used in logs and errors
#[proc_macro_attribute]
pub fn plugin(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);

    match plugin::expand(attr.into(), item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
