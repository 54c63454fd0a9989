//! Gateway trait and the callbacks it drives.
//!
//! The framework never speaks the Discord protocol itself. A [`Gateway`]
//! implementation owns the websocket session, the REST client and rate
//! limiting; the framework only needs a handful of operations from it:
//!
//! - connect, log in and keep the session alive until closed
//! - fetch and overwrite the application command tree
//! - answer interactions
//!
//! While running, the gateway reports what happens through a
//! [`GatewayHandler`]:
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Gateway for MyGateway {
//!     async fn start(&self, token: &str, handler: Arc<dyn GatewayHandler>) -> GatewayResult<()> {
//!         let session = self.connect(token).await?;
//!         handler.on_ready(session.user.clone()).await;
//!
//!         while let Some(frame) = session.next().await {
//!             match frame.kind.as_str() {
//!                 "INTERACTION_CREATE" => {
//!                     let interaction = serde_json::from_value(frame.data)?;
//!                     handler.on_interaction(interaction).await;
//!                 }
//!                 kind if handler.wants(kind) => handler.on_dispatch(kind, frame.data).await,
//!                 _ => {}
//!             }
//!         }
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayResult;
use crate::foundation::model::{GuildId, Interaction, InteractionResponse, User};

/// A connection to Discord supplied by an external client library.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Logs in with `token` and runs the session until it is closed.
    ///
    /// Returns once the connection is closed for good, either through
    /// [`close`](Self::close) or an unrecoverable error.
    async fn start(&self, token: &str, handler: Arc<dyn GatewayHandler>) -> GatewayResult<()>;

    /// Closes the connection.
    async fn close(&self);

    /// Whether the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Websocket heartbeat latency, if known.
    fn latency(&self) -> Option<Duration> {
        None
    }

    /// Fetches the registered application commands, globally or for `guild`.
    async fn fetch_commands(&self, guild: Option<GuildId>) -> GatewayResult<Vec<Value>>;

    /// Overwrites the registered application commands with `commands`.
    async fn sync_commands(&self, guild: Option<GuildId>, commands: Vec<Value>)
    -> GatewayResult<()>;

    /// Sends the initial response to `interaction`.
    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> GatewayResult<()>;
}

/// Type alias for a shared gateway.
pub type BoxedGateway = Arc<dyn Gateway>;

/// Callbacks a running [`Gateway`] invokes.
#[async_trait]
pub trait GatewayHandler: Send + Sync {
    /// Whether anything is subscribed to the raw dispatch `kind`
    /// (e.g. `MESSAGE_CREATE`). Gateways may skip unwanted dispatches.
    fn wants(&self, kind: &str) -> bool;

    /// The session is ready and logged in as `user`.
    async fn on_ready(&self, user: User);

    /// A raw dispatch frame was received.
    async fn on_dispatch(&self, kind: &str, data: Value);

    /// An application command or context menu was invoked.
    async fn on_interaction(&self, interaction: Interaction);
}
