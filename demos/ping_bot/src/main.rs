//! Ping Bot Example
//!
//! A small Amethyst bot driven from the terminal instead of Discord, so the
//! plugin system can be tried without a token or a network connection.
//!
//! # Console Gateway
//!
//! Every line read from stdin becomes a gateway frame:
//!
//! ```text
//! /ping                 -> INTERACTION_CREATE (chat input "ping")
//! /echo text=hello      -> INTERACTION_CREATE with option text = "hello"
//! anything else         -> MESSAGE_CREATE
//! ```
//!
//! Interaction responses are printed to stdout.
//!
//! # Usage
//!
//! ```bash
//! AMETHYST_BOT_TOKEN=console cargo run --package ping-bot
//! ```

use amethyst::core::{
    Gateway, GatewayHandler, GatewayResult, Interaction, InteractionResponse, User,
};
use amethyst::prelude::*;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

mod commands;

// ============================================================================
// Console Gateway
// ============================================================================

/// A gateway that reads frames from stdin and prints responses.
struct ConsoleGateway {
    closed: watch::Sender<bool>,
    commands: Mutex<Vec<Value>>,
}

impl ConsoleGateway {
    fn new() -> Self {
        Self {
            closed: watch::Sender::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn console_user() -> Value {
        json!({ "id": "2", "username": "console" })
    }

    /// Turns `/name key=value ...` into an interaction payload.
    fn interaction(line: &str, sequence: u64) -> Value {
        let mut parts = line.trim_start_matches('/').split_whitespace();
        let name = parts.next().unwrap_or_default();
        let options: Map<String, Value> = parts
            .filter_map(|part| part.split_once('='))
            .map(|(key, value)| {
                let value = value
                    .parse::<i64>()
                    .map_or_else(|_| Value::from(value), Value::from);
                (key.to_string(), value)
            })
            .collect();

        json!({
            "id": sequence.to_string(),
            "token": format!("console-{sequence}"),
            "type": 1,
            "name": name,
            "user": Self::console_user(),
            "options": options,
        })
    }

    fn message(line: &str, sequence: u64) -> Value {
        json!({
            "id": sequence.to_string(),
            "channel_id": "1",
            "author": Self::console_user(),
            "content": line,
        })
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    async fn start(&self, _token: &str, handler: Arc<dyn GatewayHandler>) -> GatewayResult<()> {
        let user = User {
            id: UserId(1),
            name: "ping-bot".into(),
            global_name: None,
            discriminator: None,
            bot: true,
        };
        handler.on_ready(user).await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut closed = self.closed.subscribe();
        let mut sequence = 0u64;

        loop {
            let line = tokio::select! {
                () = async { let _ = closed.wait_for(|closed| *closed).await; } => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!("Failed to read stdin: {err}");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            sequence += 1;

            if line.starts_with('/') {
                match serde_json::from_value::<Interaction>(Self::interaction(line, sequence)) {
                    Ok(interaction) => handler.on_interaction(interaction).await,
                    Err(err) => warn!("Malformed command {line:?}: {err}"),
                }
            } else if handler.wants("MESSAGE_CREATE") {
                handler
                    .on_dispatch("MESSAGE_CREATE", Self::message(line, sequence))
                    .await;
            }
        }

        self.closed.send_replace(true);
        Ok(())
    }

    async fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn fetch_commands(&self, _guild: Option<GuildId>) -> GatewayResult<Vec<Value>> {
        Ok(self.commands.lock().clone())
    }

    async fn sync_commands(&self, guild: Option<GuildId>, commands: Vec<Value>) -> GatewayResult<()> {
        info!(count = commands.len(), ?guild, "Synced application commands");
        *self.commands.lock() = commands;
        Ok(())
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> GatewayResult<()> {
        let marker = if response.ephemeral { " (only you)" } else { "" };
        println!("[/{}]{marker} {}", interaction.name, response.content);
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Loads amethyst.toml, AMETHYST_* variables and .env, then sets up logging
    let runtime = AmethystRuntime::new()?;

    let mut client = Client::new(module_path!(), Arc::new(ConsoleGateway::new()))?;
    client.on_setup(|handle: ClientHandle| async move {
        info!(commands = handle.definitions().len(), "Bot is ready");
    });

    runtime.run(client).await?;
    Ok(())
}
