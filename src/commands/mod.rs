use std::sync::Arc;

use poise::serenity_prelude::{CreateEmbed, GuildId};

use crate::bot::data::{Context, Data};
use crate::bot::error::Error;

pub mod minigame;
pub mod music;
pub mod tag;
pub mod utility;

/// Guild of the invocation; every guild_only command goes through here
pub fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| Error::permission("This command only works in a server"))
}

pub async fn reply(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

pub fn all() -> Vec<poise::Command<Arc<Data>, Error>> {
    vec![
        music::play(),
        music::search(),
        music::pause(),
        music::resume(),
        music::skip(),
        music::stop(),
        music::queue(),
        music::nowplaying(),
        music::remove(),
        music::loop_mode(),
        music::connect(),
        music::disconnect(),
        music::autoplay(),
        music::volume(),
        music::shuffle(),
        music::musicchannel(),
        tag::tag(),
        minigame::minigame(),
        utility::ping(),
        utility::help(),
        utility::prefix(),
        utility::source(),
        utility::userinfo(),
        utility::uid(),
        utility::dictionary(),
        utility::translate(),
        utility::shutdown(),
    ]
}
