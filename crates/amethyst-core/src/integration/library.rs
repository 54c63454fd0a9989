//! Built-in gateway events.
//!
//! Every constant here is an [`Event`] emitted by the client while the gateway
//! runs. Events backed by a raw dispatch (e.g. `MESSAGE_CREATE`) are decoded
//! from the dispatch payload; the rest are emitted by the client itself
//! (`on_ready`, `on_setup_hook`, `on_interaction`, ...) or need a gateway
//! cache the framework does not keep, in which case a gateway implementation
//! may emit them through [`GatewayHandler::on_dispatch`] under their own name.
//!
//! [`GatewayHandler::on_dispatch`]: crate::GatewayHandler::on_dispatch

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::foundation::event::{Event, Payload};
use crate::foundation::model::{CurrentUser, Interaction, Message};

/// Decodes a raw dispatch payload into an erased event payload.
pub type DecodeFn = fn(Value) -> Result<Payload, serde_json::Error>;

/// A row of the built-in event table.
#[derive(Debug, Clone, Copy)]
pub struct GatewayEvent {
    /// Event name, e.g. `on_message`.
    pub name: &'static str,
    /// Raw dispatch type the event is decoded from, if any.
    pub dispatch: Option<&'static str>,
    /// Payload decoder.
    pub decode: DecodeFn,
}

fn decode<T: DeserializeOwned + Send + Sync + 'static>(
    data: Value,
) -> Result<Payload, serde_json::Error> {
    let payload: T = serde_json::from_value(data)?;
    Ok(Arc::new(payload))
}

macro_rules! dispatch_kind {
    () => {
        None
    };
    ($kind:literal) => {
        Some($kind)
    };
}

macro_rules! gateway_events {
    ($( $ident:ident : $payload:ty = $name:literal $(<= $dispatch:literal)? ; )*) => {
        $(
            #[doc = concat!("The `", $name, "` event", $(" (dispatch `", $dispatch, "`)",)? ".")]
            pub const $ident: Event<$payload> = Event::gateway($name);
        )*

        /// All built-in events.
        pub static GATEWAY_EVENTS: &[GatewayEvent] = &[
            $(
                GatewayEvent {
                    name: $name,
                    dispatch: dispatch_kind!($($dispatch)?),
                    decode: decode::<$payload>,
                },
            )*
        ];
    };
}

gateway_events! {
    ON_APP_COMMAND_COMPLETION: Interaction = "on_app_command_completion";
    ON_AUDIT_LOG_ENTRY_CREATE: Value = "on_audit_log_entry_create" <= "GUILD_AUDIT_LOG_ENTRY_CREATE";
    ON_AUTOMOD_ACTION: Value = "on_automod_action" <= "AUTO_MODERATION_ACTION_EXECUTION";
    ON_AUTOMOD_RULE_CREATE: Value = "on_automod_rule_create" <= "AUTO_MODERATION_RULE_CREATE";
    ON_AUTOMOD_RULE_DELETE: Value = "on_automod_rule_delete" <= "AUTO_MODERATION_RULE_DELETE";
    ON_AUTOMOD_RULE_UPDATE: Value = "on_automod_rule_update" <= "AUTO_MODERATION_RULE_UPDATE";
    ON_BULK_MESSAGE_DELETE: Value = "on_bulk_message_delete";
    ON_CONNECT: () = "on_connect";
    ON_DISCONNECT: () = "on_disconnect";
    ON_GUILD_AVAILABLE: Value = "on_guild_available";
    ON_GUILD_CHANNEL_CREATE: Value = "on_guild_channel_create" <= "CHANNEL_CREATE";
    ON_GUILD_CHANNEL_DELETE: Value = "on_guild_channel_delete" <= "CHANNEL_DELETE";
    ON_GUILD_CHANNEL_PINS_UPDATE: Value = "on_guild_channel_pins_update" <= "CHANNEL_PINS_UPDATE";
    ON_GUILD_CHANNEL_UPDATE: Value = "on_guild_channel_update" <= "CHANNEL_UPDATE";
    ON_GUILD_EMOJIS_UPDATE: Value = "on_guild_emojis_update" <= "GUILD_EMOJIS_UPDATE";
    ON_GUILD_INTEGRATIONS_UPDATE: Value = "on_guild_integrations_update" <= "GUILD_INTEGRATIONS_UPDATE";
    ON_GUILD_JOIN: Value = "on_guild_join" <= "GUILD_CREATE";
    ON_GUILD_REMOVE: Value = "on_guild_remove" <= "GUILD_DELETE";
    ON_GUILD_ROLE_CREATE: Value = "on_guild_role_create" <= "GUILD_ROLE_CREATE";
    ON_GUILD_ROLE_DELETE: Value = "on_guild_role_delete" <= "GUILD_ROLE_DELETE";
    ON_GUILD_ROLE_UPDATE: Value = "on_guild_role_update" <= "GUILD_ROLE_UPDATE";
    ON_GUILD_STICKERS_UPDATE: Value = "on_guild_stickers_update" <= "GUILD_STICKERS_UPDATE";
    ON_GUILD_UPDATE: Value = "on_guild_update" <= "GUILD_UPDATE";
    ON_INTEGRATION_CREATE: Value = "on_integration_create" <= "INTEGRATION_CREATE";
    ON_INTEGRATION_UPDATE: Value = "on_integration_update" <= "INTEGRATION_UPDATE";
    ON_INTERACTION: Interaction = "on_interaction";
    ON_INVITE_CREATE: Value = "on_invite_create" <= "INVITE_CREATE";
    ON_INVITE_DELETE: Value = "on_invite_delete" <= "INVITE_DELETE";
    ON_MEMBER_BAN: Value = "on_member_ban" <= "GUILD_BAN_ADD";
    ON_MEMBER_JOIN: Value = "on_member_join" <= "GUILD_MEMBER_ADD";
    ON_MEMBER_REMOVE: Value = "on_member_remove";
    ON_MEMBER_UNBAN: Value = "on_member_unban" <= "GUILD_BAN_REMOVE";
    ON_MEMBER_UPDATE: Value = "on_member_update" <= "GUILD_MEMBER_UPDATE";
    ON_MESSAGE: Message = "on_message" <= "MESSAGE_CREATE";
    ON_MESSAGE_DELETE: Value = "on_message_delete";
    ON_MESSAGE_EDIT: Value = "on_message_edit";
    ON_PRESENCE_UPDATE: Value = "on_presence_update" <= "PRESENCE_UPDATE";
    ON_PRIVATE_CHANNEL_PINS_UPDATE: Value = "on_private_channel_pins_update";
    ON_PRIVATE_CHANNEL_UPDATE: Value = "on_private_channel_update";
    ON_RAW_APP_COMMAND_PERMISSIONS_UPDATE: Value = "on_raw_app_command_permissions_update" <= "APPLICATION_COMMAND_PERMISSIONS_UPDATE";
    ON_RAW_BULK_MESSAGE_DELETE: Value = "on_raw_bulk_message_delete" <= "MESSAGE_DELETE_BULK";
    ON_RAW_INTEGRATION_DELETE: Value = "on_raw_integration_delete" <= "INTEGRATION_DELETE";
    ON_RAW_MEMBER_REMOVE: Value = "on_raw_member_remove" <= "GUILD_MEMBER_REMOVE";
    ON_RAW_MESSAGE_DELETE: Value = "on_raw_message_delete" <= "MESSAGE_DELETE";
    ON_RAW_MESSAGE_EDIT: Value = "on_raw_message_edit" <= "MESSAGE_UPDATE";
    ON_RAW_REACTION_ADD: Value = "on_raw_reaction_add" <= "MESSAGE_REACTION_ADD";
    ON_RAW_REACTION_CLEAR: Value = "on_raw_reaction_clear" <= "MESSAGE_REACTION_REMOVE_ALL";
    ON_RAW_REACTION_CLEAR_EMOJI: Value = "on_raw_reaction_clear_emoji" <= "MESSAGE_REACTION_REMOVE_EMOJI";
    ON_RAW_REACTION_REMOVE: Value = "on_raw_reaction_remove" <= "MESSAGE_REACTION_REMOVE";
    ON_RAW_THREAD_DELETE: Value = "on_raw_thread_delete" <= "THREAD_DELETE";
    ON_RAW_THREAD_MEMBER_REMOVE: Value = "on_raw_thread_member_remove" <= "THREAD_MEMBERS_UPDATE";
    ON_RAW_THREAD_UPDATE: Value = "on_raw_thread_update" <= "THREAD_UPDATE";
    ON_RAW_TYPING: Value = "on_raw_typing" <= "TYPING_START";
    ON_REACTION_ADD: Value = "on_reaction_add";
    ON_REACTION_CLEAR: Value = "on_reaction_clear";
    ON_REACTION_CLEAR_EMOJI: Value = "on_reaction_clear_emoji";
    ON_REACTION_REMOVE: Value = "on_reaction_remove";
    ON_READY: CurrentUser = "on_ready";
    ON_RESUMED: Value = "on_resumed" <= "RESUMED";
    ON_SCHEDULED_EVENT_CREATE: Value = "on_scheduled_event_create" <= "GUILD_SCHEDULED_EVENT_CREATE";
    ON_SCHEDULED_EVENT_DELETE: Value = "on_scheduled_event_delete" <= "GUILD_SCHEDULED_EVENT_DELETE";
    ON_SCHEDULED_EVENT_UPDATE: Value = "on_scheduled_event_update" <= "GUILD_SCHEDULED_EVENT_UPDATE";
    ON_SCHEDULED_EVENT_USER_ADD: Value = "on_scheduled_event_user_add" <= "GUILD_SCHEDULED_EVENT_USER_ADD";
    ON_SCHEDULED_EVENT_USER_REMOVE: Value = "on_scheduled_event_user_remove" <= "GUILD_SCHEDULED_EVENT_USER_REMOVE";
    ON_SOCKET_EVENT_TYPE: String = "on_socket_event_type";
    ON_SOCKET_RAW_RECEIVE: String = "on_socket_raw_receive";
    ON_SOCKET_RAW_SEND: String = "on_socket_raw_send";
    ON_STAGE_INSTANCE_CREATE: Value = "on_stage_instance_create" <= "STAGE_INSTANCE_CREATE";
    ON_STAGE_INSTANCE_DELETE: Value = "on_stage_instance_delete" <= "STAGE_INSTANCE_DELETE";
    ON_STAGE_INSTANCE_UPDATE: Value = "on_stage_instance_update" <= "STAGE_INSTANCE_UPDATE";
    ON_THREAD_CREATE: Value = "on_thread_create" <= "THREAD_CREATE";
    ON_THREAD_DELETE: Value = "on_thread_delete";
    ON_THREAD_JOIN: Value = "on_thread_join";
    ON_THREAD_MEMBER_JOIN: Value = "on_thread_member_join";
    ON_THREAD_MEMBER_REMOVE: Value = "on_thread_member_remove";
    ON_THREAD_REMOVE: Value = "on_thread_remove";
    ON_THREAD_UPDATE: Value = "on_thread_update";
    ON_USER_UPDATE: Value = "on_user_update" <= "USER_UPDATE";
    ON_VOICE_STATE_UPDATE: Value = "on_voice_state_update" <= "VOICE_STATE_UPDATE";
    ON_WEBHOOKS_UPDATE: Value = "on_webhooks_update" <= "WEBHOOKS_UPDATE";
    ON_SETUP_HOOK: () = "on_setup_hook";
}

/// Looks up a built-in event by name.
pub fn lookup(name: &str) -> Option<&'static GatewayEvent> {
    GATEWAY_EVENTS.iter().find(|event| event.name == name)
}

/// Built-in events decoded from the raw dispatch `kind`.
pub fn from_dispatch(kind: &str) -> impl Iterator<Item = &'static GatewayEvent> + '_ {
    GATEWAY_EVENTS
        .iter()
        .filter(move |event| event.dispatch == Some(kind))
}

/// Resolves a dispatch that names a built-in event directly (`on_member_remove`)
/// or through its raw dispatch type (`MESSAGE_CREATE`).
pub fn resolve(kind: &str) -> Vec<&'static GatewayEvent> {
    match lookup(kind) {
        Some(event) => vec![event],
        None => from_dispatch(kind).collect(),
    }
}
