use std::time::Instant;

use poise::serenity_prelude::{CreateEmbed, Mentionable, User};
use tracing::info;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::bot::framework;
use crate::commands::{guild_id, reply};
use crate::components::paginator::paginate;
use crate::constants::embeds;
use crate::constants::timeouts::{format_duration, format_millis};
use crate::db::models::UserUid;
use crate::db::queries::users;
use crate::services::dictionary::{self, MeaningPage};
use crate::utils::formatting::truncate;
use crate::utils::permissions::can_manage_guild;

const SOURCE_URL: &str = env!("CARGO_PKG_REPOSITORY");

/// Gateway latency and message round trip
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let gateway = ctx.ping().await;
    let sent_at = Instant::now();
    let handle = ctx.say("Pinging...").await?;
    let round_trip = sent_at.elapsed();

    let mut embed = embeds::info_embed()
        .title("Pong!")
        .field("Gateway", format!("{} ms", gateway.as_millis()), true)
        .field("Round trip", format!("{} ms", round_trip.as_millis()), true)
        .field("Uptime", format_duration(ctx.data().uptime()), true);
    if let Some(stats) = ctx.data().node.stats().await {
        embed = embed.field(
            "Audio node",
            format!(
                "{} playing / {} players, up {}",
                stats.playing_players,
                stats.players,
                format_millis(stats.uptime)
            ),
            false,
        );
    }

    handle
        .edit(ctx, poise::CreateReply::default().content("").embed(embed))
        .await?;
    Ok(())
}

/// Show the command list or help for one command
#[poise::command(slash_command, prefix_command, track_edits, category = "Utility")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to explain"]
    #[rest]
    command: Option<String>,
) -> Result<(), Error> {
    let prefix = ctx.data().prefixes.get(ctx.guild_id());
    let footer = format!(
        "Type {}help <command> for details. Slash commands work too.",
        prefix
    );
    let config = poise::builtins::HelpConfiguration {
        extra_text_at_bottom: &footer,
        ephemeral: true,
        show_subcommands: true,
        ..Default::default()
    };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}

/// Show or change this server's command prefix
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands("prefix_reset"),
    category = "Utility"
)]
pub async fn prefix(
    ctx: Context<'_>,
    #[description = "New prefix (leave empty to see the current one)"] new: Option<String>,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let registry = &ctx.data().prefixes;

    let Some(new) = new else {
        let current = registry.get(Some(guild));
        return reply(
            ctx,
            embeds::info_embed().description(format!("The prefix here is `{}`", current)),
        )
        .await;
    };

    if !can_manage_guild(ctx.serenity_context(), guild, ctx.author().id).await {
        return Err(Error::permission("You need Manage Server to change the prefix"));
    }
    registry.set(&ctx.data().pool, guild, new.trim()).await?;
    info!("Prefix for guild {} set to {:?}", guild, new.trim());

    reply(
        ctx,
        embeds::success_embed().description(format!("Prefix set to `{}`", new.trim())),
    )
    .await
}

/// Go back to the default prefix
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "reset",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn prefix_reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let registry = &ctx.data().prefixes;
    let removed = registry.reset(&ctx.data().pool, guild).await?;

    let message = if removed {
        format!("Prefix reset to `{}`", registry.default_prefix())
    } else {
        format!("The prefix already is the default `{}`", registry.default_prefix())
    };
    reply(ctx, embeds::success_embed().description(message)).await
}

/// Where the code lives
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn source(ctx: Context<'_>) -> Result<(), Error> {
    reply(
        ctx,
        embeds::info_embed()
            .title("Source code")
            .url(SOURCE_URL)
            .description(SOURCE_URL),
    )
    .await
}

pub fn uid_lines(uids: &[UserUid]) -> String {
    if uids.is_empty() {
        return "None linked".to_string();
    }
    uids.iter()
        .map(|u| format!("**{}**: `{}`", u.service, u.uid))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Account and membership details
#[poise::command(slash_command, prefix_command, guild_only, aliases("whois"), category = "Utility")]
pub async fn userinfo(
    ctx: Context<'_>,
    #[description = "Member (defaults to you)"] user: Option<User>,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let member = guild.member(ctx.serenity_context(), user.id).await.ok();
    let uids = users::get_uids(&ctx.data().pool, user.id.get() as i64).await?;

    let mut embed = embeds::standard_embed()
        .title(user.tag())
        .thumbnail(user.face())
        .field("ID", user.id.to_string(), true)
        .field(
            "Account created",
            format!("<t:{}:D>", user.created_at().unix_timestamp()),
            true,
        );

    if let Some(member) = &member {
        if let Some(joined) = member.joined_at {
            embed = embed.field("Joined server", format!("<t:{}:D>", joined.unix_timestamp()), true);
        }
        let roles: Vec<String> = member.roles.iter().map(|r| r.mention().to_string()).collect();
        let roles = if roles.is_empty() {
            "None".to_string()
        } else {
            truncate(&roles.join(" "), 1000)
        };
        embed = embed.field(format!("Roles ({})", member.roles.len()), roles, false);
    }

    embed = embed.field("Linked accounts", uid_lines(&uids), false);
    reply(ctx, embed).await
}

/// Link your accounts on other services
#[poise::command(
    slash_command,
    prefix_command,
    subcommands("uid_set", "uid_remove"),
    subcommand_required,
    category = "Utility"
)]
pub async fn uid(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn normalize_service(service: &str) -> Result<String, Error> {
    let service = service.trim().to_lowercase();
    if service.is_empty() || service.chars().count() > 32 {
        return Err(Error::invocation("Service names are 1 to 32 characters"));
    }
    Ok(service)
}

#[poise::command(slash_command, prefix_command, rename = "set")]
pub async fn uid_set(
    ctx: Context<'_>,
    #[description = "Service, e.g. genshin or steam"] service: String,
    #[description = "Your id there"]
    #[rest]
    uid: String,
) -> Result<(), Error> {
    let service = normalize_service(&service)?;
    let uid = uid.trim();
    if uid.is_empty() || uid.chars().count() > 100 {
        return Err(Error::invocation("The id must be 1 to 100 characters"));
    }
    users::set_uid(&ctx.data().pool, ctx.author().id.get() as i64, &service, uid).await?;
    reply(
        ctx,
        embeds::success_embed().description(format!("Saved your **{}** id", service)),
    )
    .await
}

#[poise::command(slash_command, prefix_command, rename = "remove")]
pub async fn uid_remove(
    ctx: Context<'_>,
    #[description = "Service to unlink"] service: String,
) -> Result<(), Error> {
    let service = normalize_service(&service)?;
    if !users::remove_uid(&ctx.data().pool, ctx.author().id.get() as i64, &service).await? {
        return Err(Error::domain(format!("You have no **{}** id saved", service)));
    }
    reply(
        ctx,
        embeds::success_embed().description(format!("Removed your **{}** id", service)),
    )
    .await
}

pub fn meaning_embed(page: &MeaningPage) -> CreateEmbed {
    let title = match &page.phonetic {
        Some(phonetic) => format!("{} {}", page.word, phonetic),
        None => page.word.clone(),
    };
    let definitions = page
        .definitions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {}", i + 1, d))
        .collect::<Vec<_>>()
        .join("\n");

    let mut embed = embeds::info_embed()
        .title(title)
        .url(dictionary::public_page(&page.word))
        .field(
            format!("*{}*", page.part_of_speech),
            truncate(&definitions, 1024),
            false,
        );
    if let Some(example) = &page.example {
        embed = embed.field("Example", truncate(&format!("_{}_", example), 1024), false);
    }
    if !page.synonyms.is_empty() {
        embed = embed.field("Synonyms", page.synonyms.join(", "), false);
    }
    embed
}

/// Look up a word
#[poise::command(slash_command, prefix_command, aliases("define"), category = "Utility")]
pub async fn dictionary(
    ctx: Context<'_>,
    #[description = "Word to define"] word: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let entries = ctx.data().dictionary.lookup(word.trim()).await?;
    let pages: Vec<CreateEmbed> = dictionary::meaning_pages(&entries)
        .iter()
        .map(meaning_embed)
        .collect();
    if pages.is_empty() {
        return Err(Error::NoResults(word));
    }
    paginate(ctx, pages).await
}

/// Translate text into another language
#[poise::command(slash_command, prefix_command, aliases("tr"), category = "Utility")]
pub async fn translate(
    ctx: Context<'_>,
    #[description = "Target language code, e.g. en, de, ja"] to: String,
    #[description = "Text to translate"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let target = to.trim().to_lowercase();
    if target.is_empty() || target.len() > 8 {
        return Err(Error::invocation("Give a language code like `en` or `pt-br`"));
    }
    let translation = ctx.data().translator.translate(&target, &text).await?;

    let from = translation.source_lang.as_deref().unwrap_or("auto");
    reply(
        ctx,
        embeds::info_embed()
            .title(format!("{} → {}", from, target))
            .description(truncate(&translation.text, 4000))
            .footer(embeds::requested_by(&ctx.author().name)),
    )
    .await
}

/// Stop the bot
#[poise::command(prefix_command, slash_command, owners_only, hide_in_help, category = "Utility")]
pub async fn shutdown(ctx: Context<'_>) -> Result<(), Error> {
    info!("Shutdown requested by {}", ctx.author().name);
    ctx.say("Shutting down...").await?;
    framework::shutdown(ctx.serenity_context(), ctx.data()).await;
    ctx.framework().shard_manager().shutdown_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_lines() {
        assert_eq!(uid_lines(&[]), "None linked");
        let uids = vec![
            UserUid { user_id: 1, service: "genshin".into(), uid: "800".into() },
            UserUid { user_id: 1, service: "steam".into(), uid: "abc".into() },
        ];
        assert_eq!(uid_lines(&uids), "**genshin**: `800`\n**steam**: `abc`");
    }

    #[test]
    fn test_normalize_service() {
        assert_eq!(normalize_service("  Steam ").unwrap(), "steam");
        assert!(normalize_service("   ").is_err());
        assert!(normalize_service(&"x".repeat(40)).is_err());
    }

    #[test]
    fn test_meaning_embed_numbers_definitions() {
        let page = MeaningPage {
            word: "alloy".into(),
            phonetic: Some("/ˈæl.ɔɪ/".into()),
            part_of_speech: "noun".into(),
            definitions: vec!["A mixture of metals.".into(), "A compound.".into()],
            example: None,
            synonyms: Vec::new(),
        };
        let embed = serde_json::to_value(meaning_embed(&page)).unwrap();
        assert_eq!(embed["title"], "alloy /ˈæl.ɔɪ/");
        assert_eq!(embed["fields"][0]["name"], "*noun*");
        assert_eq!(
            embed["fields"][0]["value"],
            "1. A mixture of metals.\n2. A compound."
        );
        assert_eq!(embed["fields"].as_array().unwrap().len(), 1);
    }
}
