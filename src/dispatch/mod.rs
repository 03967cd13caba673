//! Routes slash command invocations to registered commands.

use std::{collections::HashSet, sync::Arc};

use serenity::model::{
    id::{ChannelId, GuildId, UserId},
    Permissions,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    commands::{Args, CommandContext, Registry},
    platform::{Gateway, Reply, Responder},
};

pub mod cooldown;
pub mod permissions;

use permissions::PermissionInput;

const MAINTENANCE: &str = "I'm in maintenance mode right now, please try again later.";
const GUILD_ONLY: &str = "This command can only be used in a server.";
const COMMAND_FAILED: &str = "Something went wrong while running this command.";

/// A user-issued slash command, as received from the platform.
pub struct Invocation {
    pub name: String,
    pub args: Args,
    pub user_id: UserId,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub member_permissions: Option<Permissions>,
    pub bot_permissions: Option<Permissions>,
    pub responder: Arc<dyn Responder>,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    pub production: bool,
    pub operators: HashSet<UserId>,
}

pub struct Dispatcher<T: Clone + Send + Sync + 'static> {
    registry: Registry<T>,
    settings: DispatchSettings,
    services: T,
    gateway: Arc<dyn Gateway>,
}

impl<T: Clone + Send + Sync + 'static> Dispatcher<T> {
    pub fn new(
        registry: Registry<T>,
        settings: DispatchSettings,
        services: T,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            registry,
            settings,
            services,
            gateway,
        }
    }

    pub async fn handle(&self, invocation: Invocation) {
        let is_operator = self.settings.operators.contains(&invocation.user_id);

        if !self.settings.production && !is_operator {
            notify(&invocation, MAINTENANCE).await;
            return;
        }

        let Some(entry) = self.registry.find(&invocation.name) else {
            debug!(name = %invocation.name, "ignoring unknown command");
            return;
        };
        let descriptor = entry.descriptor();

        let now = Instant::now();
        if let Some(remaining) = entry.cooldowns.remaining(invocation.user_id, now) {
            let message = format!(
                "Slow down! You can use `/{}` again in {:.1}s.",
                descriptor.name,
                remaining.as_secs_f32()
            );
            notify(&invocation, message).await;
            return;
        }

        if descriptor.guild_only && invocation.guild_id.is_none() {
            notify(&invocation, GUILD_ONLY).await;
            return;
        }

        let check = entry.command.check_permissions(&PermissionInput {
            user: invocation.member_permissions,
            bot: invocation.bot_permissions,
            in_guild: invocation.guild_id.is_some(),
            is_operator,
        });

        if !check.has_admin && !is_operator {
            entry
                .cooldowns
                .start(invocation.user_id, now, descriptor.cooldown);
        }

        if check.can_run {
            info!(name = descriptor.name, user = %invocation.user_id, "running command");

            let responder = Arc::clone(&invocation.responder);
            let ctx = CommandContext {
                invocation,
                services: self.services.clone(),
                gateway: Arc::clone(&self.gateway),
            };
            if let Err(err) = entry.command.run(ctx).await {
                error!(name = descriptor.name, "error running command: {}", err);
                if let Err(err) = responder.reply(Reply::ephemeral(COMMAND_FAILED)).await {
                    warn!("couldn't report command failure: {}", err);
                }
            }
            return;
        }

        match check.reason {
            Some(ref reason) => notify(&invocation, reason.as_str()).await,
            None => notify(&invocation, permissions::diagnostic(&check)).await,
        }
    }
}

async fn notify(invocation: &Invocation, content: impl Into<String>) {
    if let Err(err) = invocation.responder.reply(Reply::ephemeral(content)).await {
        warn!(name = %invocation.name, "couldn't send notice: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use serenity::{async_trait, model::id::ChannelId};

    use super::*;
    use crate::{
        commands::{Command, CommandDescriptor},
        testing::{FakeGateway, FakeResponder},
        Error,
    };

    const CHANNEL: ChannelId = ChannelId(10);
    const GUILD: GuildId = GuildId(30);
    const USER: UserId = UserId(20);
    const OPERATOR: UserId = UserId(1);

    struct Counter {
        descriptor: CommandDescriptor,
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Command<()> for Counter {
        fn descriptor(&self) -> &CommandDescriptor {
            &self.descriptor
        }

        async fn run(&self, ctx: CommandContext<()>) -> Result<(), Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("boom".into());
            }
            ctx.say("ran").await?;
            Ok(())
        }
    }

    fn dispatcher(
        descriptor: CommandDescriptor,
        production: bool,
    ) -> (Dispatcher<()>, Arc<AtomicUsize>) {
        dispatcher_with(descriptor, production, false)
    }

    fn dispatcher_with(
        descriptor: CommandDescriptor,
        production: bool,
        fail: bool,
    ) -> (Dispatcher<()>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new().with(Counter {
            descriptor,
            runs: Arc::clone(&runs),
            fail,
        });
        let settings = DispatchSettings {
            production,
            operators: HashSet::from([OPERATOR]),
        };

        (
            Dispatcher::new(registry, settings, (), FakeGateway::new()),
            runs,
        )
    }

    fn invocation(
        name: &str,
        user_id: UserId,
        member_permissions: Option<Permissions>,
    ) -> (Invocation, Arc<FakeResponder>) {
        let responder = FakeResponder::new(CHANNEL);
        let invocation = Invocation {
            name: name.to_owned(),
            args: Args::new(),
            user_id,
            guild_id: member_permissions.map(|_| GUILD),
            channel_id: CHANNEL,
            member_permissions,
            bot_permissions: member_permissions.map(|_| Permissions::all()),
            responder: responder.clone(),
        };
        (invocation, responder)
    }

    fn ping() -> CommandDescriptor {
        CommandDescriptor::new("ping", "test command")
            .cooldown(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_blocks_second_run() {
        let (dispatcher, runs) = dispatcher(ping(), true);

        let (first, _) = invocation("ping", USER, Some(Permissions::SEND_MESSAGES));
        dispatcher.handle(first).await;

        let (second, responder) = invocation("ping", USER, Some(Permissions::SEND_MESSAGES));
        dispatcher.handle(second).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let replies = responder.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].ephemeral);
        assert!(replies[0].content.as_deref().unwrap().contains("10.0s"));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires() {
        let (dispatcher, runs) = dispatcher(ping(), true);

        let (first, _) = invocation("ping", USER, None);
        dispatcher.handle(first).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        let (second, _) = invocation("ping", USER, None);
        dispatcher.handle(second).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_notice_records_nothing() {
        let (dispatcher, _) = dispatcher(ping(), true);

        let (first, _) = invocation("ping", USER, None);
        dispatcher.handle(first).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        let (blocked, _) = invocation("ping", USER, None);
        dispatcher.handle(blocked).await;

        // the blocked attempt didn't push the deadline back
        tokio::time::advance(Duration::from_secs(4)).await;
        let (third, responder) = invocation("ping", USER, None);
        dispatcher.handle(third).await;
        assert_eq!(responder.contents(), vec!["ran".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn admins_and_operators_have_no_cooldown() {
        let (dispatcher, runs) = dispatcher(ping(), true);

        for _ in 0..3 {
            let (admin, _) = invocation("ping", USER, Some(Permissions::ADMINISTRATOR));
            dispatcher.handle(admin).await;
            let (operator, _) = invocation("ping", OPERATOR, None);
            dispatcher.handle(operator).await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_mode_admits_only_operators() {
        let (dispatcher, runs) = dispatcher(ping(), false);

        let (stranger, responder) = invocation("ping", USER, None);
        dispatcher.handle(stranger).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(responder.contents(), vec![MAINTENANCE.to_owned()]);

        let (operator, _) = invocation("ping", OPERATOR, None);
        dispatcher.handle(operator).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_commands_are_silent() {
        let (dispatcher, runs) = dispatcher(ping(), true);

        let (unknown, responder) = invocation("nope", USER, None);
        dispatcher.handle(unknown).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(responder.replies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn guild_only_rejects_direct_messages() {
        let (dispatcher, runs) = dispatcher(ping().guild_only(), true);

        let (direct, responder) = invocation("ping", USER, None);
        dispatcher.handle(direct).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(responder.contents(), vec![GUILD_ONLY.to_owned()]);

        // rejected before evaluation, so no cooldown either
        let (guild, _) = invocation("ping", USER, Some(Permissions::SEND_MESSAGES));
        dispatcher.handle(guild).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_shortfall_still_starts_cooldown() {
        let descriptor = ping().user_permissions(Permissions::MANAGE_GUILD);
        let (dispatcher, runs) = dispatcher(descriptor, true);

        let (denied, responder) = invocation("ping", USER, Some(Permissions::SEND_MESSAGES));
        dispatcher.handle(denied).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        let notice = responder.contents().remove(0);
        assert!(notice.contains("You need any of"));
        assert!(!notice.contains("I need all of"));

        let (again, responder) = invocation("ping", USER, Some(Permissions::SEND_MESSAGES));
        dispatcher.handle(again).await;
        assert!(responder.contents()[0].contains("Slow down"));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_reason_is_shown_verbatim() {
        let (dispatcher, runs) = dispatcher(ping().owner_only(), true);

        let (denied, responder) = invocation("ping", USER, Some(Permissions::ADMINISTRATOR));
        dispatcher.handle(denied).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        let replies = responder.replies();
        assert!(replies[0].ephemeral);
        assert_eq!(replies[0].content.as_deref(), Some(permissions::OWNER_ONLY));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_command_gets_generic_notice() {
        let (dispatcher, runs) = dispatcher_with(ping(), true, true);

        let (invocation, responder) = invocation("ping", USER, None);
        dispatcher.handle(invocation).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(responder.contents(), vec![COMMAND_FAILED.to_owned()]);
    }
}
