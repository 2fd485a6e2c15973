mod commands;
mod poll;
mod survey;
mod utils;

use std::env;

use serenity::async_trait;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::{Command, Interaction};
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        match Command::set_global_commands(&ctx, vec![commands::schedule_survey::register()]).await
        {
            Ok(cmds) => info!("registered {} global slash commands", cmds.len()),
            Err(e) => error!("failed to register slash commands: {e}"),
        }
    }

    async fn interaction_create(&self, ctx: Context, inter: Interaction) {
        if let Interaction::Command(cmd) = inter {
            let name = cmd.data.name.clone();
            match name.as_str() {
                "schedule_survey" => {
                    // the survey stays open for its whole window, so it runs in
                    // its own task instead of holding up event dispatch
                    tokio::spawn(async move {
                        match survey::run(&ctx, &cmd).await {
                            Ok(s) => info!("/schedule_survey: {s}"),
                            Err(e) => error!("/schedule_survey error: {e}"),
                        }
                    });
                }
                other => {
                    let resp_msg = CreateInteractionResponseMessage::new()
                        .content("Not implemented :(")
                        .ephemeral(true);
                    let builder = CreateInteractionResponse::Message(resp_msg);
                    if let Err(why) = cmd.create_response(&ctx.http, builder).await {
                        error!("cannot respond to slash command {other}: {why}");
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Configure the client with your Discord bot token in the environment.
    let token = env::var("DISCORD_TOKEN").expect("Expected a token in the environment");
    // Slash commands and component interactions arrive regardless of intents;
    // GUILDS keeps channel metadata flowing for the channel-kind check.
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES;

    let mut client =
        Client::builder(&token, intents).event_handler(Handler).await.expect("Err creating client");

    if let Err(why) = client.start().await {
        error!("Client error: {why:?}");
    }
}
