//! Command definitions and the context they run in.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serenity::{
    async_trait,
    model::{
        id::{ChannelId, UserId},
        Permissions,
    },
};

use crate::{
    cache::CourseStore,
    collector::Collector,
    dispatch::{
        permissions::{self, PermissionCheck, PermissionInput},
        Invocation,
    },
    platform::{Gateway, PlatformError, Reply, Responder},
    Error,
};

pub mod about;
pub mod class;
pub mod registry;

pub use registry::Registry;

/// Shared state handed to every command of the bot.
#[derive(Clone)]
pub struct Services {
    pub cache: Arc<dyn CourseStore>,
    pub max_age: Duration,
}

/// Every command the bot offers. `year` seeds the semester choices.
pub fn all(year: u16) -> Registry<Services> {
    let semesters = class::semester_choices(year);

    Registry::new()
        .with(about::About::new())
        .with(class::Info::new(&semesters))
        .with(class::Sections::new(&semesters))
        .with(class::Refresh::new(&semesters))
        .with(class::Purge::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Integer,
}

/// One slash command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub examples: &'static [&'static str],
    /// `(label, value)` pairs, empty when any value goes.
    pub choices: Vec<(String, String)>,
}

impl ArgSpec {
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ArgKind::String,
            required: true,
            examples: &[],
            choices: Vec::new(),
        }
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: ArgKind::Integer,
            ..Self::string(name, description)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn examples(mut self, examples: &'static [&'static str]) -> Self {
        self.examples = examples;
        self
    }

    pub fn choices(mut self, choices: impl IntoIterator<Item = (String, String)>) -> Self {
        self.choices = choices.into_iter().collect();
        self
    }

    /// Description as shown by Discord, with examples appended.
    pub fn full_description(&self) -> String {
        if self.examples.is_empty() {
            return self.description.to_owned();
        }

        format!("{} (e.g. {})", self.description, self.examples.join(", "))
    }
}

/// Everything the dispatcher needs to know about a command.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
    /// The caller needs at least one of these.
    pub user_permissions: Permissions,
    /// The bot needs every one of these.
    pub bot_permissions: Permissions,
    pub cooldown: Duration,
    pub guild_only: bool,
    pub owner_only: bool,
}

impl CommandDescriptor {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            args: Vec::new(),
            user_permissions: Permissions::empty(),
            bot_permissions: Permissions::empty(),
            cooldown: Duration::ZERO,
            guild_only: false,
            owner_only: false,
        }
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn user_permissions(mut self, permissions: Permissions) -> Self {
        self.user_permissions = permissions;
        self
    }

    pub fn bot_permissions(mut self, permissions: Permissions) -> Self {
        self.bot_permissions = permissions;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
}

/// Named arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(HashMap<String, ArgValue>);

#[derive(Debug, thiserror::Error)]
#[error("missing argument `{0}`")]
pub struct MissingArgument(pub String);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, ArgValue::String(value.to_owned()));
        self
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ArgValue::String(value) => Some(value),
            ArgValue::Integer(_) => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            ArgValue::Integer(value) => Some(*value),
            ArgValue::String(value) => value.parse().ok(),
        }
    }

    pub fn required_str(&self, name: &str) -> Result<&str, MissingArgument> {
        self.str(name).ok_or_else(|| MissingArgument(name.to_owned()))
    }
}

/// The per-invocation bundle handed to a command body.
pub struct CommandContext<T> {
    pub invocation: Invocation,
    pub services: T,
    pub gateway: Arc<dyn Gateway>,
}

impl<T> CommandContext<T> {
    pub fn args(&self) -> &Args {
        &self.invocation.args
    }

    pub fn author_id(&self) -> UserId {
        self.invocation.user_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.invocation.channel_id
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.invocation.responder
    }

    pub async fn reply(&self, reply: Reply) -> Result<(), PlatformError> {
        self.invocation.responder.reply(reply).await
    }

    pub async fn say(&self, content: impl Into<String>) -> Result<(), PlatformError> {
        self.reply(Reply::public(content)).await
    }

    pub async fn whisper(&self, content: impl Into<String>) -> Result<(), PlatformError> {
        self.reply(Reply::ephemeral(content)).await
    }

    pub fn collector(&self) -> Collector {
        Collector::new(Arc::clone(&self.gateway))
    }
}

#[async_trait]
pub trait Command<T: Send + Sync + 'static>: Send + Sync {
    fn descriptor(&self) -> &CommandDescriptor;

    fn matches(&self, name: &str) -> bool {
        self.descriptor().name == name
    }

    fn check_permissions(&self, input: &PermissionInput) -> PermissionCheck {
        permissions::check(self.descriptor(), input)
    }

    async fn run(&self, ctx: CommandContext<T>) -> Result<(), Error>;
}
