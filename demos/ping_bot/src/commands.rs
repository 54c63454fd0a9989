//! Commands loaded through the default `.commands` plugin module.

use amethyst::core::InteractionResponse;
use amethyst::prelude::*;
use chrono::Local;
use parking_lot::Mutex;
use tracing::info;

/// Answers `/ping` and `/echo`, and keeps count of what it has seen.
#[derive(Default)]
pub struct Ping {
    seen: Mutex<u64>,
}

#[plugin(name = "ping")]
impl Ping {
    /// Checks that the bot is alive.
    #[command]
    async fn ping(&self, interaction: Interaction) -> HandlerResult {
        interaction.reply("Pong! 🏓").await?;
        Ok(())
    }

    /// Repeats the given text.
    #[command]
    #[describe(text = "What to repeat")]
    async fn echo(&self, interaction: Interaction, text: String) -> HandlerResult {
        interaction
            .respond(InteractionResponse::ephemeral(text))
            .await?;
        Ok(())
    }

    /// Shows how many messages have been seen.
    #[command]
    async fn stats(&self, interaction: Interaction) -> HandlerResult {
        let seen = *self.seen.lock();
        interaction.reply(format!("Seen {seen} message(s)")).await?;
        Ok(())
    }

    #[event(ON_MESSAGE)]
    async fn on_message(&self, message: &Message) {
        *self.seen.lock() += 1;
        info!("[{}] {}", message.author.display_name(), message.content);
    }

    #[event(ON_APP_COMMAND_COMPLETION)]
    async fn on_completion(&self, interaction: Arc<Interaction>) {
        info!(command = %interaction.name, "Command completed");
    }

    #[schedule("* * * * *", name = "heartbeat")]
    async fn heartbeat(&self) {
        info!(
            at = %Local::now().format("%H:%M"),
            seen = *self.seen.lock(),
            "Still running"
        );
    }
}

register_plugin!(Ping);
