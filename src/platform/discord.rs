//! serenity-backed [`Gateway`] and [`Responder`].

use std::sync::Arc;

use serde_json::{json, Value};
use serenity::{
    async_trait,
    builder::{CreateApplicationCommand, CreateComponents, CreateEmbed},
    http::Http,
    model::{
        application::{
            command::{Command, CommandOptionType},
            component::ButtonStyle as SerenityButtonStyle,
            interaction::{
                application_command::ApplicationCommandInteraction,
                message_component::MessageComponentInteraction, InteractionResponseType,
            },
        },
        channel::Message,
        id::ChannelId, Timestamp,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use super::{
    ButtonStyle, ComponentPress, ComponentSpec, EventHub, Gateway, GatewayEvent, IncomingMessage,
    MessageRef, OutgoingMessage, PlatformError, Reply, Responder,
};
use crate::{
    commands::{ArgKind, ArgValue, Args, CommandDescriptor},
    dispatch::Invocation,
    embed::Embed,
};

/// Interaction callback type for "acknowledge, don't touch the message".
const DEFERRED_UPDATE_MESSAGE: u8 = 6;

pub struct DiscordGateway {
    http: Arc<Http>,
    hub: EventHub,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>, hub: EventHub) -> Self {
        Self { http, hub }
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.hub.subscribe()
    }

    async fn send(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, PlatformError> {
        let sent = channel_id
            .send_message(&self.http, |m| {
                if let Some(content) = &message.content {
                    m.content(content);
                }
                if let Some(embed) = &message.embed {
                    m.embed(|e| fill_embed(e, embed));
                }
                if !message.rows.is_empty() {
                    m.components(|c| fill_rows(c, &message.rows));
                }
                m
            })
            .await?;

        Ok(message_ref(&sent))
    }

    async fn delete(&self, message: MessageRef) -> Result<(), PlatformError> {
        message
            .channel_id
            .delete_message(&self.http, message.id)
            .await?;
        Ok(())
    }

    async fn clear_components(&self, message: MessageRef) -> Result<(), PlatformError> {
        message
            .channel_id
            .edit_message(&self.http, message.id, |m| m.components(|c| c))
            .await?;
        Ok(())
    }

    async fn acknowledge(&self, press: &ComponentPress) -> Result<(), PlatformError> {
        self.http
            .create_interaction_response(
                press.interaction_id.0,
                &press.token,
                &json!({ "type": DEFERRED_UPDATE_MESSAGE }),
            )
            .await?;
        Ok(())
    }
}

/// Answers one slash command: the first reply is the interaction response,
/// everything after it a follow-up.
pub struct InteractionResponder {
    http: Arc<Http>,
    interaction: ApplicationCommandInteraction,
    responded: Mutex<bool>,
}

impl InteractionResponder {
    pub fn new(http: Arc<Http>, interaction: ApplicationCommandInteraction) -> Self {
        Self {
            http,
            interaction,
            responded: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn reply(&self, reply: Reply) -> Result<(), PlatformError> {
        let mut responded = self.responded.lock().await;

        if *responded {
            self.interaction
                .create_followup_message(&self.http, |f| {
                    if let Some(content) = &reply.content {
                        f.content(content);
                    }
                    if let Some(embed) = &reply.embed {
                        f.embed(|e| fill_embed(e, embed));
                    }
                    if !reply.rows.is_empty() {
                        f.components(|c| fill_rows(c, &reply.rows));
                    }
                    f.ephemeral(reply.ephemeral)
                })
                .await?;
            return Ok(());
        }

        self.interaction
            .create_interaction_response(&self.http, |r| {
                r.kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|d| {
                        if let Some(content) = &reply.content {
                            d.content(content);
                        }
                        if let Some(embed) = &reply.embed {
                            d.embed(|e| fill_embed(e, embed));
                        }
                        if !reply.rows.is_empty() {
                            d.components(|c| fill_rows(c, &reply.rows));
                        }
                        d.ephemeral(reply.ephemeral)
                    })
            })
            .await?;
        *responded = true;

        Ok(())
    }

    async fn original(&self) -> Result<MessageRef, PlatformError> {
        if !*self.responded.lock().await {
            return Err(PlatformError::Rejected(
                "the interaction hasn't been answered yet".to_owned(),
            ));
        }

        let message = self.interaction.get_interaction_response(&self.http).await?;
        Ok(message_ref(&message))
    }
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef {
        channel_id: message.channel_id,
        id: message.id,
    }
}

fn fill_embed<'a>(e: &'a mut CreateEmbed, embed: &Embed) -> &'a mut CreateEmbed {
    if let Some(title) = &embed.title {
        e.title(title);
    }
    if let Some(description) = &embed.description {
        e.description(description);
    }
    if let Some(author) = &embed.author {
        e.author(|a| a.name(author));
    }
    for field in &embed.fields {
        e.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        e.footer(|f| f.text(footer));
    }
    if let Some(timestamp) = embed.timestamp {
        if let Ok(timestamp) = Timestamp::from_unix_timestamp(timestamp.timestamp()) {
            e.timestamp(timestamp);
        }
    }
    e
}

fn button_style(style: ButtonStyle) -> SerenityButtonStyle {
    match style {
        ButtonStyle::Primary => SerenityButtonStyle::Primary,
        ButtonStyle::Secondary => SerenityButtonStyle::Secondary,
        ButtonStyle::Success => SerenityButtonStyle::Success,
        ButtonStyle::Danger => SerenityButtonStyle::Danger,
    }
}

fn fill_rows<'a>(
    c: &'a mut CreateComponents,
    rows: &[Vec<ComponentSpec>],
) -> &'a mut CreateComponents {
    for row in rows {
        c.create_action_row(|r| {
            for component in row {
                match component {
                    ComponentSpec::Button(button) => {
                        r.create_button(|b| {
                            b.custom_id(&button.custom_id)
                                .label(&button.label)
                                .style(button_style(button.style))
                        });
                    }
                    ComponentSpec::Select(menu) => {
                        r.create_select_menu(|s| {
                            s.custom_id(&menu.custom_id);
                            if let Some(placeholder) = &menu.placeholder {
                                s.placeholder(placeholder);
                            }
                            s.options(|o| {
                                for option in &menu.options {
                                    o.create_option(|opt| {
                                        opt.label(&option.label).value(&option.value);
                                        if let Some(description) = &option.description {
                                            opt.description(description);
                                        }
                                        opt
                                    });
                                }
                                o
                            })
                        });
                    }
                }
            }
            r
        });
    }
    c
}

fn fill_command<'a>(
    command: &'a mut CreateApplicationCommand,
    descriptor: &CommandDescriptor,
) -> &'a mut CreateApplicationCommand {
    command
        .name(descriptor.name)
        .description(descriptor.description)
        .dm_permission(!descriptor.guild_only);

    for arg in &descriptor.args {
        command.create_option(|option| {
            option
                .name(arg.name)
                .description(arg.full_description())
                .required(arg.required)
                .kind(match arg.kind {
                    ArgKind::String => CommandOptionType::String,
                    ArgKind::Integer => CommandOptionType::Integer,
                });
            for (label, value) in &arg.choices {
                option.add_string_choice(label, value);
            }
            option
        });
    }

    command
}

/// Replaces the global slash commands with the given descriptors.
pub async fn register_commands(
    http: impl AsRef<Http>,
    descriptors: &[&CommandDescriptor],
) -> Result<usize, PlatformError> {
    let registered = Command::set_global_application_commands(http, |commands| {
        for descriptor in descriptors {
            commands.create_application_command(|command| fill_command(command, descriptor));
        }
        commands
    })
    .await?;

    info!(count = registered.len(), "registered slash commands");
    Ok(registered.len())
}

fn arg_value(value: &Value) -> Option<ArgValue> {
    match value {
        Value::String(value) => Some(ArgValue::String(value.clone())),
        Value::Number(value) => value.as_i64().map(ArgValue::Integer),
        _ => None,
    }
}

pub fn invocation(http: Arc<Http>, interaction: ApplicationCommandInteraction) -> Invocation {
    let mut args = Args::new();
    for option in &interaction.data.options {
        match option.value.as_ref().and_then(arg_value) {
            Some(value) => args.insert(&option.name, value),
            None => debug!(option = %option.name, "skipping option without a usable value"),
        }
    }

    Invocation {
        name: interaction.data.name.clone(),
        args,
        user_id: interaction.user.id,
        guild_id: interaction.guild_id,
        channel_id: interaction.channel_id,
        member_permissions: interaction
            .member
            .as_ref()
            .and_then(|member| member.permissions),
        bot_permissions: interaction.app_permissions,
        responder: Arc::new(InteractionResponder::new(http, interaction)),
    }
}

/// Messages from bots, this one included, never reach collectors.
pub fn incoming_message(message: &Message) -> Option<IncomingMessage> {
    if message.author.bot {
        return None;
    }

    Some(IncomingMessage {
        id: message.id,
        channel_id: message.channel_id,
        author_id: message.author.id,
        content: message.content.clone(),
    })
}

pub fn component_press(interaction: &MessageComponentInteraction) -> ComponentPress {
    ComponentPress {
        interaction_id: interaction.id,
        token: interaction.token.clone(),
        channel_id: interaction.channel_id,
        message_id: interaction.message.id,
        author_id: interaction.user.id,
        custom_id: interaction.data.custom_id.clone(),
        values: interaction.data.values.clone(),
    }
}
