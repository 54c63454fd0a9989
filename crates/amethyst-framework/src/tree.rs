//! Application command tree and its structural diff.
//!
//! The tree holds every slash command and context menu registered with the
//! client, keyed by `(name, kind)`. Whether it needs to be synchronised is
//! decided by comparing the local definitions against the ones the gateway
//! reports as registered: a remote command "matches" when it contains every
//! key of the local definition with an equal value, after filling in the
//! defaults Discord omits.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use amethyst_core::{BoxFuture, CommandKind, HandlerResult, Interaction};
use serde_json::{Map, Value, json};

use crate::error::{ClientError, ClientResult};
use crate::plugin::PluginId;
use crate::widget::CommandOption;

/// A bound interaction callback.
pub(crate) type InteractionFn =
    Arc<dyn Fn(Interaction) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// AppCommand
// ============================================================================

/// A slash command or context menu bound to its plugin.
#[derive(Clone)]
pub struct AppCommand {
    pub kind: CommandKind,
    pub name: String,
    pub description: String,
    pub nsfw: bool,
    pub hybrid: bool,
    pub options: Vec<CommandOption>,
    /// Owning plugin.
    pub owner: Option<PluginId>,
    pub(crate) handler: InteractionFn,
}

impl AppCommand {
    /// Wire representation, as sent when synchronising the tree.
    pub fn to_definition(&self) -> Value {
        let mut definition = json!({
            "type": self.kind.as_u8(),
            "name": self.name,
            "description": self.description,
            "nsfw": self.nsfw,
            "dm_permission": true,
            "default_member_permissions": null,
        });
        if self.kind == CommandKind::ChatInput {
            definition["options"] = self
                .options
                .iter()
                .map(CommandOption::to_definition)
                .collect();
        }
        definition
    }

    /// Runs the callback for `interaction`.
    pub fn call(&self, interaction: Interaction) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(interaction)
    }
}

impl fmt::Debug for AppCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCommand")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("options", &self.options)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CommandTree
// ============================================================================

/// The client's commands, keyed by `(name, kind)`.
#[derive(Debug, Default)]
pub struct CommandTree {
    commands: BTreeMap<(String, u8), AppCommand>,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a command `name` of `kind` is present.
    pub fn contains(&self, name: &str, kind: CommandKind) -> bool {
        self.commands.contains_key(&(name.to_string(), kind.as_u8()))
    }

    /// Adds `command`. Fails if the `(name, kind)` pair is taken.
    pub fn insert(&mut self, command: AppCommand) -> ClientResult<()> {
        let key = (command.name.clone(), command.kind.as_u8());
        if self.commands.contains_key(&key) {
            return Err(ClientError::CommandExists {
                kind: command.kind,
                name: command.name,
            });
        }
        self.commands.insert(key, command);
        Ok(())
    }

    /// Removes and returns the command `name` of `kind`.
    pub fn remove(&mut self, name: &str, kind: CommandKind) -> Option<AppCommand> {
        self.commands.remove(&(name.to_string(), kind.as_u8()))
    }

    /// Looks up the command an interaction targets.
    pub fn get(&self, name: &str, kind: CommandKind) -> Option<&AppCommand> {
        self.commands.get(&(name.to_string(), kind.as_u8()))
    }

    /// Iterates over the commands in `(name, kind)` order.
    pub fn iter(&self) -> impl Iterator<Item = &AppCommand> {
        self.commands.values()
    }

    /// Definitions of every command, in `(name, kind)` order.
    pub fn definitions(&self) -> Vec<Value> {
        self.iter().map(AppCommand::to_definition).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ============================================================================
// Structural diff
// ============================================================================

/// Returns `true` if every key of `subset` is present in `superset` with a
/// matching value.
///
/// Objects are compared recursively. Every element of a `subset` array must
/// match some element of the `superset` array, in any order. Anything else is
/// compared for equality.
pub fn is_dict_subset(superset: &Value, subset: &Value) -> bool {
    match (superset, subset) {
        (Value::Object(superset), Value::Object(subset)) => subset.iter().all(|(key, value)| {
            superset
                .get(key)
                .is_some_and(|present| is_dict_subset(present, value))
        }),
        (Value::Array(superset), Value::Array(subset)) => subset
            .iter()
            .all(|wanted| superset.iter().any(|present| is_dict_subset(present, wanted))),
        _ => superset == subset,
    }
}

/// Returns `true` if the `local` definitions differ from the `remote` ones.
pub fn tree_changed(local: &[Value], remote: &[Value]) -> bool {
    if local.len() != remote.len() {
        return true;
    }

    for definition in local {
        let name = definition.get("name");
        let kind = definition.get("type").and_then(Value::as_u64).unwrap_or(1);
        let Some(found) = remote.iter().find(|candidate| {
            candidate.get("name") == name
                && candidate.get("type").and_then(Value::as_u64).unwrap_or(1) == kind
        }) else {
            return true;
        };

        let superset = with_remote_defaults(found);
        let mut subset = definition.clone();
        // User and message commands are registered with an empty description.
        if kind != u64::from(CommandKind::ChatInput.as_u8()) {
            subset["description"] = Value::from("");
        }

        if !is_dict_subset(&superset, &subset) {
            return true;
        }
    }

    false
}

/// Fills in the fields Discord omits when they hold their default value.
fn with_remote_defaults(remote: &Value) -> Value {
    let mut merged = Map::new();
    merged.insert("default_member_permissions".into(), Value::Null);
    merged.insert("dm_permission".into(), Value::Bool(true));
    merged.insert("nsfw".into(), Value::Bool(false));
    merged.insert("options".into(), Value::Array(Vec::new()));
    if let Value::Object(fields) = remote {
        merged.extend(fields.clone());
    }

    if let Some(Value::Array(options)) = merged.get_mut("options") {
        for option in options.iter_mut() {
            if let Value::Object(option) = option {
                option.entry("required").or_insert(Value::Bool(false));
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amethyst_core::OptionKind;
    use futures::FutureExt;

    fn command(name: &str, kind: CommandKind) -> AppCommand {
        AppCommand {
            kind,
            name: name.to_string(),
            description: "Rolls a die.".to_string(),
            nsfw: false,
            hybrid: false,
            options: vec![CommandOption {
                name: "sides".into(),
                description: "Number of sides".into(),
                kind: OptionKind::Integer,
                required: false,
            }],
            owner: None,
            handler: Arc::new(|_: Interaction| async { HandlerResult::Ok(()) }.boxed()),
        }
    }

    #[test]
    fn test_is_dict_subset() {
        let superset = json!({ "a": 1, "b": { "c": [1, 2, 3], "d": "x" } });
        assert!(is_dict_subset(&superset, &json!({ "a": 1 })));
        assert!(is_dict_subset(&superset, &json!({ "b": { "c": [3, 1] } })));
        assert!(!is_dict_subset(&superset, &json!({ "b": { "c": [4] } })));
        assert!(!is_dict_subset(&superset, &json!({ "z": null })));
        assert!(!is_dict_subset(&superset, &json!({ "a": "1" })));
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let mut tree = CommandTree::new();
        tree.insert(command("roll", CommandKind::ChatInput)).unwrap();
        tree.insert(command("roll", CommandKind::User)).unwrap();
        assert!(matches!(
            tree.insert(command("roll", CommandKind::ChatInput)),
            Err(ClientError::CommandExists { .. })
        ));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_tree_in_sync_with_matching_superset() {
        let local = vec![
            command("roll", CommandKind::ChatInput).to_definition(),
            command("Quote", CommandKind::Message).to_definition(),
        ];
        // What Discord reports: extra fields, defaults omitted, no required flag.
        let remote = vec![
            json!({
                "id": "1", "application_id": "2", "version": "3",
                "type": 3, "name": "Quote", "description": ""
            }),
            json!({
                "id": "4", "application_id": "2", "version": "5",
                "type": 1, "name": "roll", "description": "Rolls a die.",
                "options": [{ "type": 4, "name": "sides", "description": "Number of sides" }]
            }),
        ];
        assert!(!tree_changed(&local, &remote));
    }

    #[test]
    fn test_tree_changed_when_command_missing_remotely() {
        let local = vec![command("roll", CommandKind::ChatInput).to_definition()];
        let remote = vec![json!({ "type": 1, "name": "flip", "description": "Rolls a die." })];
        assert!(tree_changed(&local, &remote));
        assert!(tree_changed(&local, &[]));
    }

    #[test]
    fn test_tree_changed_when_description_differs() {
        let local = vec![command("roll", CommandKind::ChatInput).to_definition()];
        let remote = vec![json!({ "type": 1, "name": "roll", "description": "Old text" })];
        assert!(tree_changed(&local, &remote));
    }
}
