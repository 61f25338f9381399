use std::sync::Arc;

use poise::serenity_prelude::{
    self as serenity, ExecuteWebhook, GatewayIntents, GuildId, UserId, Webhook,
};
use songbird::SerenityInit;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::bot::data::{Context, Data};
use crate::bot::error::{Error, ErrorKind};
use crate::commands;
use crate::config::Settings;
use crate::constants::embeds;
use crate::constants::timeouts::{INVOCATION_ERROR_TTL, SESSION_SWEEP_INTERVAL};
use crate::handlers::event_handler::event_handler;
use crate::services::audio::{controller, NodeSupervisor};
use crate::services::ui;

const APOLOGY: &str = "Something went wrong on our side. The error has been logged.";

pub async fn run(settings: Settings, pool: SqlitePool) -> Result<(), Error> {
    let data = Arc::new(Data::new(pool, settings.clone())?);

    // A missing runtime or a failed download aborts startup
    if settings.node.managed {
        let supervisor = NodeSupervisor::start(&data.http, &settings).await?;
        info!("Managed audio node {} running", supervisor.version());
        *data.supervisor.lock().await = Some(supervisor);
    }

    let owners = settings.owner_id.map(UserId::new).into_iter().collect();
    let setup_data = data.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            owners,
            prefix_options: poise::PrefixFrameworkOptions {
                dynamic_prefix: Some(|ctx| {
                    Box::pin(async move { Ok(Some(ctx.data.prefixes.get(ctx.guild_id))) })
                }),
                mention_as_prefix: true,
                case_insensitive_commands: true,
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    debug!(
                        "{} invoked by {} in {:?}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.guild_id()
                    );
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                let data = setup_data;
                info!("Bot connected as {}", ready.user.name);

                let events = data.node.spawn(ready.user.id);
                controller::spawn_event_loop(ctx.clone(), data.clone(), events);
                ui::spawn_sweeper(ctx.clone(), data.clone(), SESSION_SWEEP_INTERVAL);
                controller::set_idle_presence(ctx);

                let loaded = data.prefixes.load(&data.pool).await?;
                info!("Loaded {} custom prefixes", loaded);

                register_commands(ctx, framework, data.settings.guild_id).await?;

                let shard_manager = framework.shard_manager().clone();
                let ctx = ctx.clone();
                let signal_data = data.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupt received, shutting down");
                        shutdown(&ctx, &signal_data).await;
                        shard_manager.shutdown_all().await;
                    }
                });

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .map_err(Error::Serenity)?;

    info!("Starting Discord client...");
    let result = client.start().await.map_err(Error::Serenity);

    // The child is also killed on drop, this just makes the stop explicit
    if let Some(supervisor) = data.supervisor.lock().await.take() {
        supervisor.shutdown().await;
    }
    result
}

async fn register_commands(
    ctx: &serenity::Context,
    framework: &poise::Framework<Arc<Data>, Error>,
    guild_id: Option<u64>,
) -> Result<(), Error> {
    let commands = &framework.options().commands;
    match guild_id {
        Some(guild_id) => {
            let guild_id = GuildId::new(guild_id);
            poise::builtins::register_in_guild(ctx, commands, guild_id).await?;
            info!("Registered {} commands in guild {}", commands.len(), guild_id);
        }
        None => {
            poise::builtins::register_globally(ctx, commands).await?;
            info!(
                "Registered {} commands globally (may take up to an hour to appear)",
                commands.len()
            );
        }
    }
    Ok(())
}

/// Flush live UI sessions, leave voice, stop the managed node
pub async fn shutdown(ctx: &serenity::Context, data: &Arc<Data>) {
    data.ui.stop_all(ctx, data).await;

    for guild_id in data.voice.guilds() {
        data.voice.dispose(ctx, &data.node, guild_id).await;
    }

    if let Some(supervisor) = data.supervisor.lock().await.take() {
        supervisor.shutdown().await;
    }
}

async fn on_error(error: poise::FrameworkError<'_, Arc<Data>, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => report(ctx, error).await,
        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            let message = match input {
                Some(input) => format!("Couldn't understand `{}`: {}", input, error),
                None => format!("Missing argument: {}", error),
            };
            report(ctx, Error::Invocation(message)).await;
        }
        poise::FrameworkError::SubcommandRequired { ctx } => {
            let names: Vec<&str> = ctx
                .command()
                .subcommands
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            report(
                ctx,
                Error::invocation(format!("Pick one of: {}", names.join(", "))),
            )
            .await;
        }
        poise::FrameworkError::MissingUserPermissions { ctx, .. } => {
            report(ctx, Error::permission("You don't have permission to do that")).await;
        }
        poise::FrameworkError::NotAnOwner { ctx, .. } => {
            report(ctx, Error::permission("Only the bot owner can do that")).await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            report(ctx, Error::permission("This command only works in a server")).await;
        }
        poise::FrameworkError::UnknownCommand { ctx, msg, msg_content, .. } => {
            let name = msg_content.split_whitespace().next().unwrap_or_default();
            if name.is_empty() {
                return;
            }
            let text = format!("Unknown command `{}`", name);
            match msg.channel_id.say(&ctx.http, text).await {
                Ok(sent) => delete_later(ctx.http.clone(), sent),
                Err(e) => debug!("Failed to report unknown command: {}", e),
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Event handler error on {}: {:?}", event.snake_case_name(), error);
        }
        poise::FrameworkError::Setup { error, .. } => {
            error!("Setup failed: {:?}", error);
        }
        err => {
            if let Err(e) = poise::builtins::on_error(err).await {
                error!("Error while handling framework error: {}", e);
            }
        }
    }
}

/// Render a command error according to its kind
async fn report(ctx: Context<'_>, error: Error) {
    let kind = error.kind();
    let is_slash = matches!(ctx, poise::Context::Application(_));

    let reply = match kind {
        ErrorKind::Invocation => poise::CreateReply::default()
            .content(error.to_string())
            .ephemeral(true),
        ErrorKind::Permission => poise::CreateReply::default()
            .content(error.to_string())
            .ephemeral(true),
        ErrorKind::Domain | ErrorKind::Transient => {
            poise::CreateReply::default().embed(embeds::domain_error(error.to_string()))
        }
        ErrorKind::Fatal => {
            error!(
                "Command {} failed: {:?}",
                ctx.command().qualified_name,
                error
            );
            post_debug_webhook(ctx, &error).await;
            poise::CreateReply::default().embed(embeds::domain_error(APOLOGY))
        }
    };

    let handle = match ctx.send(reply).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Failed to report error to user: {}", e);
            return;
        }
    };

    // Ephemeral slash replies vanish on their own
    if kind == ErrorKind::Invocation && !is_slash {
        if let Ok(message) = handle.into_message().await {
            delete_later(ctx.serenity_context().http.clone(), message);
        }
    }
}

fn delete_later(http: Arc<serenity::Http>, message: serenity::Message) {
    tokio::spawn(async move {
        tokio::time::sleep(INVOCATION_ERROR_TTL).await;
        if let Err(e) = message.delete(&http).await {
            debug!("Failed to delete expired error message: {}", e);
        }
    });
}

async fn post_debug_webhook(ctx: Context<'_>, error: &Error) {
    let Some(url) = ctx.data().settings.debug_webhook_url.as_deref() else {
        return;
    };
    let http = &ctx.serenity_context().http;

    let embed = embeds::error_embed()
        .title(format!("`{}` failed", ctx.command().qualified_name))
        .description(format!("```\n{:?}\n```", error))
        .field("Invoked by", format!("{} ({})", ctx.author().name, ctx.author().id), true)
        .field("Guild", format!("{:?}", ctx.guild_id().map(|g| g.get())), true);

    let result = async {
        let webhook = Webhook::from_url(http, url).await?;
        webhook.execute(http, false, ExecuteWebhook::new().embed(embed)).await?;
        Ok::<_, serenity::Error>(())
    }
    .await;

    if let Err(e) = result {
        warn!("Failed to post to debug webhook: {}", e);
    }
}
