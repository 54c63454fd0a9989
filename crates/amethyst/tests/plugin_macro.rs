use amethyst::core::{Gateway, GatewayHandler, GatewayResult, InteractionResponse};
use amethyst::framework::{ClientError, WidgetKind};
use amethyst::prelude::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

// ============================================================================
// Fixtures
// ============================================================================

struct NullGateway;

#[async_trait]
impl Gateway for NullGateway {
    async fn start(&self, _token: &str, _handler: Arc<dyn GatewayHandler>) -> GatewayResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_closed(&self) -> bool {
        false
    }

    async fn fetch_commands(&self, _guild: Option<GuildId>) -> GatewayResult<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn sync_commands(&self, _guild: Option<GuildId>, _commands: Vec<Value>) -> GatewayResult<()> {
        Ok(())
    }

    async fn respond(
        &self,
        _interaction: &Interaction,
        _response: InteractionResponse,
    ) -> GatewayResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

const ON_TALLY: Event<u32> = Event::blocking("on_tally");

struct Dice {
    journal: Arc<Journal>,
    greeting: Option<Arc<String>>,
}

#[plugin(name = "dice")]
impl Dice {
    fn new(journal: Arc<Journal>, greeting: Option<Arc<String>>) -> Self {
        Self { journal, greeting }
    }

    /// Rolls a die.
    ///
    /// The result is written to the journal.
    #[command(hybrid)]
    #[describe(sides = "Number of sides")]
    async fn roll(
        &self,
        interaction: Interaction,
        sides: Option<u32>,
        label: &str,
    ) -> HandlerResult {
        self.journal.push(format!(
            "roll {} {} by {}",
            sides.unwrap_or(6),
            label,
            interaction.user.name
        ));
        Ok(())
    }

    #[command(name = "coin", description = "Flips a coin", nsfw)]
    fn flip(&self, _interaction: Interaction) {
        self.journal.push("flip");
    }

    #[event(ON_MESSAGE)]
    async fn on_message(&self, message: &Message) {
        self.journal.push(format!("message {}", message.content));
    }

    #[event(ON_MESSAGE, name = "echo")]
    async fn echo(&self, message: Arc<Message>) -> HandlerResult {
        let greeting = self.greeting.as_deref().map_or("", String::as_str);
        self.journal.push(format!("echo {greeting}{}", message.content));
        Ok(())
    }

    #[event(ON_TALLY)]
    fn tally(&self, count: &u32) {
        self.journal.push(format!("tally {count}"));
    }

    #[schedule("*/5 * * * *", name = "cleanup")]
    async fn cleanup(&self) {
        self.journal.push("cleanup");
    }

    #[context_menu(name = "Roll for user")]
    async fn roll_for(&self, _interaction: Interaction, user: User) -> HandlerResult {
        self.journal.push(format!("roll for {}", user.name));
        Ok(())
    }

    #[context_menu]
    async fn quote_message(&self, _interaction: Interaction, message: Message) {
        self.journal.push(format!("quote {}", message.content));
    }

    fn journal(&self) -> &Journal {
        &self.journal
    }
}

#[derive(Default)]
struct Quiet;

#[plugin]
impl Quiet {
    #[event(ON_READY)]
    async fn ready(&self) {}
}

fn client() -> (Client, Arc<Journal>) {
    let mut client = Client::new(module_path!(), Arc::new(NullGateway)).unwrap();
    let journal = Arc::new(Journal::default());
    client.add_shared_dependency(journal.clone()).unwrap();
    (client, journal)
}

fn interaction(kind: u8, name: &str, options: Value, target: Option<Value>) -> Interaction {
    serde_json::from_value(json!({
        "id": "900",
        "token": "tok",
        "type": kind,
        "name": name,
        "user": { "id": "7", "username": "ferris" },
        "options": options,
        "target": target,
    }))
    .unwrap()
}

fn message(content: &str) -> Message {
    serde_json::from_value(json!({
        "id": "10",
        "channel_id": "20",
        "author": { "id": "7", "username": "ferris" },
        "content": content,
    }))
    .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_plugin_name_and_widgets() {
    let (mut client, _) = client();
    client.register_plugin::<Dice>().unwrap();

    assert_eq!(<Dice as Plugin>::name(), "dice");
    let widgets: Vec<(WidgetKind, String)> = client
        .widgets()
        .iter()
        .map(|widget| (widget.kind, widget.name.clone()))
        .collect();
    assert_eq!(widgets.len(), 8);
    for expected in [
        (WidgetKind::Command, "roll"),
        (WidgetKind::Command, "coin"),
        (WidgetKind::Event, "on_message"),
        (WidgetKind::Event, "on_tally"),
        (WidgetKind::Schedule, "cleanup"),
        (WidgetKind::ContextMenu, "Roll for user"),
        (WidgetKind::ContextMenu, "Quote Message"),
    ] {
        assert!(
            widgets.contains(&(expected.0, expected.1.to_string())),
            "missing {expected:?}"
        );
    }
    assert_eq!(client.handle().handler_count(ON_MESSAGE.name()), 2);
    assert_eq!(client.get_plugin::<Dice>().unwrap().journal().entries().len(), 0);
}

#[test]
fn test_command_definitions() {
    let (mut client, _) = client();
    client.register_plugin::<Dice>().unwrap();
    let handle = client.handle();

    let roll = handle.command("roll", CommandKind::ChatInput).unwrap();
    assert_eq!(roll.description, "Rolls a die.");
    assert!(roll.hybrid);
    assert!(!roll.nsfw);

    let definition = roll.to_definition();
    assert_eq!(definition["options"][0]["name"], "sides");
    assert_eq!(definition["options"][0]["description"], "Number of sides");
    assert_eq!(definition["options"][0]["required"], false);
    assert_eq!(definition["options"][1]["name"], "label");
    assert_eq!(definition["options"][1]["description"], "...");
    assert_eq!(definition["options"][1]["required"], true);

    let coin = handle.command("coin", CommandKind::ChatInput).unwrap();
    assert_eq!(coin.description, "Flips a coin");
    assert!(coin.nsfw);
    assert!(handle.command("flip", CommandKind::ChatInput).is_none());
}

#[tokio::test]
async fn test_commands_receive_typed_options() {
    let (mut client, journal) = client();
    client.register_plugin::<Dice>().unwrap();
    let handle = client.handle();
    let roll = handle.command("roll", CommandKind::ChatInput).unwrap();

    roll.call(interaction(1, "roll", json!({ "sides": 20, "label": "crit" }), None))
        .await
        .unwrap();
    roll.call(interaction(1, "roll", json!({ "label": "plain" }), None))
        .await
        .unwrap();
    // A missing required option fails before the method runs.
    assert!(
        roll.call(interaction(1, "roll", json!({}), None))
            .await
            .is_err()
    );

    let coin = handle.command("coin", CommandKind::ChatInput).unwrap();
    coin.call(interaction(1, "coin", json!({}), None))
        .await
        .unwrap();

    assert_eq!(
        journal.entries(),
        vec!["roll 20 crit by ferris", "roll 6 plain by ferris", "flip"]
    );
}

#[tokio::test]
async fn test_event_handlers() {
    let (mut client, journal) = client();
    client
        .add_dependency(String::from("hello "))
        .unwrap();
    client.register_plugin::<Dice>().unwrap();

    client.invoke(&ON_MESSAGE, message("there")).await;
    client.invoke(&ON_TALLY, 3).await;

    let mut entries = journal.entries();
    entries.sort();
    assert_eq!(
        entries,
        vec!["echo hello there", "message there", "tally 3"]
    );
}

#[tokio::test]
async fn test_context_menus() {
    let (mut client, journal) = client();
    client.register_plugin::<Dice>().unwrap();
    let handle = client.handle();

    let roll_for = handle.command("Roll for user", CommandKind::User).unwrap();
    let target = json!({ "id": "8", "username": "corro" });
    roll_for
        .call(interaction(2, "Roll for user", json!({}), Some(target)))
        .await
        .unwrap();

    let quote = handle
        .command("Quote Message", CommandKind::Message)
        .unwrap();
    let target = serde_json::to_value(message("well said")).unwrap();
    quote
        .call(interaction(3, "Quote Message", json!({}), Some(target)))
        .await
        .unwrap();

    assert_eq!(journal.entries(), vec!["roll for corro", "quote well said"]);
}

#[test]
fn test_constructor_dependencies() {
    let mut client = Client::new(module_path!(), Arc::new(NullGateway)).unwrap();
    let result = client.register_plugin::<Dice>();
    assert!(matches!(result, Err(ClientError::PluginDependency { .. })));
    assert!(!client.has_plugin::<Dice>());
    assert!(client.widgets().is_empty());
}

#[test]
fn test_default_constructor() {
    let (mut client, _) = client();
    client.register_plugin::<Quiet>().unwrap();
    assert_eq!(<Quiet as Plugin>::name(), "Quiet");
    assert_eq!(client.handle().handler_count(ON_READY.name()), 1);
}
