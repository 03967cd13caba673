mod cache;
mod collector;
mod commands;
mod config;
mod course;
mod dispatch;
mod embed;
mod platform;
mod source;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use cache::Cache;
use chrono::{Datelike, Utc};
use commands::Services;
use config::Config;
use dispatch::{DispatchSettings, Dispatcher};
use platform::{
    discord::{self, DiscordGateway},
    EventHub, GatewayEvent,
};
use poise::{serenity_prelude::GatewayIntents, Framework, FrameworkOptions};
use serenity::{client::Context, model::application::interaction::Interaction};
use source::HttpSource;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type Error = Box<dyn std::error::Error + Send + Sync>;

pub struct Data {
    dispatcher: Arc<Dispatcher<Services>>,
    hub: EventHub,
}

async fn event_handler(
    ctx: &Context,
    event: &poise::Event<'_>,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        poise::Event::Ready { data_about_bot } => {
            info!("{} is connected", data_about_bot.user.name);
        }
        poise::Event::Message { new_message } => {
            if let Some(message) = discord::incoming_message(new_message) {
                data.hub.publish(GatewayEvent::Message(message));
            }
        }
        poise::Event::InteractionCreate { interaction } => match interaction {
            Interaction::ApplicationCommand(command) => {
                let invocation = discord::invocation(ctx.http.clone(), command.clone());
                let dispatcher = data.dispatcher.clone();
                // commands may sit in a collector for a while
                tokio::spawn(async move { dispatcher.handle(invocation).await });
            }
            Interaction::MessageComponent(component) => {
                let press = discord::component_press(component);
                data.hub.publish(GatewayEvent::Component(press));
            }
            _ => {}
        },
        _ => {}
    }

    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        // slash commands are routed by the dispatcher, not by poise
        poise::FrameworkError::UnknownInteraction { .. } => {}
        error => {
            if let Err(err) = poise::builtins::on_error(error).await {
                error!("error while handling error: {}", err);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenvy::dotenv().map(|_| ()) {
        Err(err) if err.not_found() => warn!("no .env file found"),
        result => result.expect("failed to load .env file"),
    }

    let config = Config::from_env().expect("failed to read configuration");
    let settings = DispatchSettings {
        production: config.production().expect("invalid `PRODUCTION`"),
        operators: config.operators().expect("invalid `OPERATORS`"),
    };
    let max_age = config.cache_max_age().expect("invalid `CACHE_MAX_AGE`");
    if !settings.production {
        warn!("not in production, only operators may use commands");
    }

    let database = PgPoolOptions::new()
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&database)
        .await
        .expect("failed to migrate database");

    let source = HttpSource::new(&config.course_api_url).expect("invalid `COURSE_API_URL`");
    let services = Services {
        cache: Arc::new(Cache::new(database, Arc::new(source))),
        max_age,
    };
    let hub = EventHub::new();

    let framework = Framework::builder()
        .token(&config.discord_token)
        .intents(
            GatewayIntents::GUILDS
                | GatewayIntents::GUILD_MESSAGES
                | GatewayIntents::DIRECT_MESSAGES
                | GatewayIntents::MESSAGE_CONTENT,
        )
        .options(FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, _framework| {
            Box::pin(async move {
                let year = u16::try_from(Utc::now().year()).unwrap_or(u16::MAX - 1);
                let registry = commands::all(year);
                discord::register_commands(&ctx.http, &registry.descriptors()).await?;

                let gateway = Arc::new(DiscordGateway::new(ctx.http.clone(), hub.clone()));
                let dispatcher = Dispatcher::new(registry, settings, services, gateway);
                Ok(Data {
                    dispatcher: Arc::new(dispatcher),
                    hub,
                })
            })
        })
        .build()
        .await
        .expect("failed to build framework");

    {
        let framework = framework.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Could not register ctrl+c handler");
            framework.shard_manager().lock().await.shutdown_all().await;
        });
    }

    if let Err(why) = framework.start_autosharded().await {
        error!("Client error: {:?}", why);
    }
}
