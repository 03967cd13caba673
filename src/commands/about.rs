use serenity::async_trait;

use super::{Command, CommandContext, CommandDescriptor};
use crate::Error;

pub struct About {
    descriptor: CommandDescriptor,
}

impl About {
    pub fn new() -> Self {
        Self {
            descriptor: CommandDescriptor::new("about", "What this bot does"),
        }
    }
}

impl Default for About {
    fn default() -> Self {
        Self::new()
    }
}

fn about_text() -> String {
    format!(
        "I manage queries for University at Buffalo course schedules.\nVersion {}",
        env!("CARGO_PKG_VERSION"),
    )
}

#[async_trait]
impl<T: Send + Sync + 'static> Command<T> for About {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: CommandContext<T>) -> Result<(), Error> {
        ctx.say(about_text()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serenity::model::id::{ChannelId, UserId};

    use super::*;
    use crate::{
        commands::Args,
        dispatch::Invocation,
        testing::{FakeGateway, FakeResponder},
    };

    #[tokio::test]
    async fn replies_publicly() {
        let responder = FakeResponder::new(ChannelId(1));
        let ctx = CommandContext {
            invocation: Invocation {
                name: "about".to_owned(),
                args: Args::new(),
                user_id: UserId(2),
                guild_id: None,
                channel_id: ChannelId(1),
                member_permissions: None,
                bot_permissions: None,
                responder: responder.clone(),
            },
            services: (),
            gateway: FakeGateway::new(),
        };

        About::default().run(ctx).await.unwrap();

        let replies = responder.replies();
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].ephemeral);
        assert!(replies[0].content.as_deref().unwrap().contains("course schedules"));
    }
}
