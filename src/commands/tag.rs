use std::time::Duration;

use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::{guild_id, reply};
use crate::components::paginator::{paginate, pages_from_lines};
use crate::constants::embeds;
use crate::constants::timeouts::{TAG_CONTENT_PROMPT, TAG_NAME_PROMPT};
use crate::services::tags::{self, Deleted};
use crate::utils::formatting::{mention_user, truncate};
use crate::utils::permissions::can_manage_guild;

const TAGS_PER_PAGE: usize = 10;

/// Show a tag; `tag <name>` works as a shortcut for `tag get <name>`
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("t"),
    subcommands("get", "create", "delete", "alias", "info", "list"),
    category = "Tags"
)]
pub async fn tag(
    ctx: Context<'_>,
    #[description = "Tag name"]
    #[rest]
    name: Option<String>,
) -> Result<(), Error> {
    match name {
        Some(name) => show(ctx, &name).await,
        None => Err(Error::invocation("Give me a tag name, or use one of: get, create, delete, alias, info, list")),
    }
}

async fn show(ctx: Context<'_>, name: &str) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let tag = tags::get(&ctx.data().pool, guild.get() as i64, name).await?;
    ctx.say(tag.content).await?;
    Ok(())
}

/// Ask the author a question and wait for their next message in this channel
async fn prompt(ctx: Context<'_>, question: &str, timeout: Duration) -> Result<String, Error> {
    ctx.say(question).await?;
    let answer = ctx
        .author()
        .await_reply(ctx.serenity_context())
        .channel_id(ctx.channel_id())
        .timeout(timeout)
        .await
        .ok_or_else(|| Error::invocation(format!("No answer within {}s, cancelled", timeout.as_secs())))?;
    Ok(answer.content)
}

#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn get(
    ctx: Context<'_>,
    #[description = "Tag name or alias"]
    #[rest]
    name: String,
) -> Result<(), Error> {
    show(ctx, &name).await
}

/// Create a tag; missing parts are asked for
#[poise::command(slash_command, prefix_command, guild_only, aliases("add"))]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Tag name"] name: Option<String>,
    #[description = "Tag content"]
    #[rest]
    content: Option<String>,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let name = match name {
        Some(name) => name,
        None => prompt(ctx, "What should the tag be called?", TAG_NAME_PROMPT).await?,
    };
    let name = tags::normalize_name(&name)?;
    let content = match content {
        Some(content) => content,
        None => prompt(ctx, &format!("What should `{}` say?", name), TAG_CONTENT_PROMPT).await?,
    };

    let prefix = ctx.data().prefixes.get(Some(guild));
    let tag = tags::create(
        &ctx.data().pool,
        guild.get() as i64,
        ctx.author().id.get() as i64,
        &name,
        &content,
        &prefix,
    )
    .await?;

    reply(
        ctx,
        embeds::success_embed().description(format!("Tag `{}` created", tag.name)),
    )
    .await
}

/// Delete a tag (with its aliases) or a single alias
#[poise::command(slash_command, prefix_command, guild_only, aliases("remove"))]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Tag name or alias"]
    #[rest]
    name: String,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let privileged = can_manage_guild(ctx.serenity_context(), guild, ctx.author().id).await;
    let deleted = tags::delete(
        &ctx.data().pool,
        guild.get() as i64,
        ctx.author().id.get() as i64,
        privileged,
        &name,
    )
    .await?;

    let message = match deleted {
        Deleted::Tag { name, aliases: 0 } => format!("Tag `{}` deleted", name),
        Deleted::Tag { name, aliases } => format!("Tag `{}` and its {} aliases deleted", name, aliases),
        Deleted::Alias { alias, target } => format!("Alias `{}` (for `{}`) deleted", alias, target),
    };
    reply(ctx, embeds::success_embed().description(message)).await
}

/// Make another name point at an existing tag
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn alias(
    ctx: Context<'_>,
    #[description = "New name"] alias: String,
    #[description = "Existing tag or alias"]
    #[rest]
    target: String,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let prefix = ctx.data().prefixes.get(Some(guild));
    let tag = tags::alias(
        &ctx.data().pool,
        guild.get() as i64,
        ctx.author().id.get() as i64,
        &alias,
        &target,
        &prefix,
    )
    .await?;

    reply(
        ctx,
        embeds::success_embed().description(format!(
            "`{}` now points to `{}`",
            tags::normalize_name(&alias)?,
            tag.name
        )),
    )
    .await
}

#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Tag name or alias"]
    #[rest]
    name: String,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let info = tags::info(&ctx.data().pool, guild.get() as i64, &name).await?;

    let mut embed = embeds::info_embed()
        .title(format!("Tag: {}", info.name))
        .field("Owner", mention_user((info.owner as u64).into()), true)
        .field("Uses", info.uses.to_string(), true)
        .field("Aliases", info.aliases.to_string(), true)
        .field("Created", format!("<t:{}:R>", info.created_at.timestamp()), true)
        .field("Preview", info.preview, false);
    if let Some(alias) = info.via_alias {
        embed = embed.description(format!("`{}` is an alias of `{}`", alias, info.name));
    }
    reply(ctx, embed).await
}

/// List this server's tags, or one member's
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Only tags owned by this member"] user: Option<User>,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let owner = user.as_ref().map(|u| u.id.get() as i64);
    let found = tags::list(&ctx.data().pool, guild.get() as i64, owner).await?;
    if found.is_empty() {
        return Err(Error::domain("No tags found"));
    }

    let lines: Vec<String> = found
        .iter()
        .enumerate()
        .map(|(i, t)| format!("`{}.` {} ({} uses)", i + 1, truncate(&t.name, 50), t.uses))
        .collect();
    let title = match &user {
        Some(user) => format!("Tags by {}", user.name),
        None => "Tags".to_string(),
    };
    paginate(ctx, pages_from_lines(&title, &lines, TAGS_PER_PAGE, embeds::info_embed)).await
}
